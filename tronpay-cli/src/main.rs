//! TronPay CLI - USDT/TRX payments in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{auth, config, demo, logs, movement, status};

/// TronPay - deposit, withdraw and pay with USDT/TRX
#[derive(Parser)]
#[command(name = "tp", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the access token
    Login {
        /// Account email (prompted if omitted)
        email: Option<String>,
        /// Password (falls back to TRONPAY_PASSWORD, then a prompt)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget the stored access token
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deposit funds and wait for the deposit to settle
    Deposit {
        /// Amount, up to 6 decimal places
        amount: String,
        /// Asset (USDT or TRX)
        #[arg(long, default_value = "USDT")]
        asset: String,
        /// Optional memo
        #[arg(long)]
        memo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw to a TRON address and wait for it to settle
    Withdraw {
        /// Amount, up to 6 decimal places
        amount: String,
        /// Destination TRON address
        #[arg(long)]
        to: String,
        /// Asset (USDT or TRX)
        #[arg(long, default_value = "USDT")]
        asset: String,
        /// Available balance; larger withdrawals are refused locally
        #[arg(long)]
        balance: Option<String>,
        /// Optional memo
        #[arg(long)]
        memo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transfer funds to another user
    Pay {
        /// Amount, up to 6 decimal places
        amount: String,
        /// Recipient account
        #[arg(long)]
        to: String,
        /// Asset (USDT or TRX)
        #[arg(long, default_value = "USDT")]
        asset: String,
        /// Optional memo
        #[arg(long)]
        memo: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the status of a deposit or withdrawal
    Status {
        /// Transaction kind (deposit, withdraw)
        kind: String,
        /// Transaction id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View or change settings
    Config {
        #[command(subcommand)]
        command: Option<config::ConfigCommands>,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login { email, password, json } => auth::login(email, password, json),
        Commands::Logout { json } => auth::logout(json),
        Commands::Deposit { amount, asset, memo, json } => {
            movement::deposit(&amount, &asset, memo, json)
        }
        Commands::Withdraw { amount, to, asset, balance, memo, json } => {
            movement::withdraw(&amount, &to, &asset, balance.as_deref(), memo, json)
        }
        Commands::Pay { amount, to, asset, memo, json } => {
            movement::pay(&amount, &to, &asset, memo, json)
        }
        Commands::Status { kind, id, json } => status::run(&kind, &id, json),
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
        Commands::Demo { command } => demo::run(command),
    }
}
