//! Demo command - manage demo mode

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use tronpay_core::config::Config;
use tronpay_core::ClientEvent;

use super::{get_tronpay_dir, open_event_log, record};

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode
    #[command(name = "on")]
    On,
    /// Disable demo mode
    #[command(name = "off")]
    Off,
    /// Show demo mode status
    Status,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let events = open_event_log();
    record(&events, ClientEvent::command("demo"));

    let tronpay_dir = get_tronpay_dir()?;
    std::fs::create_dir_all(&tronpay_dir)?;
    let mut config = Config::load(&tronpay_dir).unwrap_or_default();

    match command {
        Some(DemoCommands::On) => {
            config.enable_demo_mode();
            config.save(&tronpay_dir)?;
            println!("{}", "Demo mode enabled".green());
            println!("Requests now go to a simulated backend. Run 'tp login' with any email and password.");
        }
        Some(DemoCommands::Off) => {
            config.disable_demo_mode();
            config.save(&tronpay_dir)?;
            println!("{}", "Demo mode disabled".yellow());
        }
        Some(DemoCommands::Status) | None => {
            if config.demo_mode {
                println!("Demo mode is {}", "ON".green());
            } else {
                println!("Demo mode is {}", "OFF".yellow());
            }
        }
    }
    Ok(())
}
