//! Login/logout commands

use std::env;

use anyhow::Result;
use dialoguer::{Input, Password};
use tronpay_core::{ClientEvent, OperationResult};

use super::{get_context, open_event_log, record, runtime};
use crate::output;

/// Password from --password, TRONPAY_PASSWORD, or a prompt
fn get_password_or_prompt(password_flag: Option<String>) -> Result<String> {
    if let Some(p) = password_flag {
        return Ok(p);
    }
    if let Ok(p) = env::var("TRONPAY_PASSWORD") {
        return Ok(p);
    }
    let p = Password::new().with_prompt("Password").interact()?;
    Ok(p)
}

fn get_email_or_prompt(email: Option<String>) -> Result<String> {
    match email {
        Some(e) => Ok(e),
        None => Ok(Input::<String>::new().with_prompt("Email").interact_text()?),
    }
}

pub fn login(email: Option<String>, password: Option<String>, json: bool) -> Result<()> {
    let events = open_event_log();
    record(&events, ClientEvent::command("login"));

    let email = get_email_or_prompt(email)?;
    let password = get_password_or_prompt(password)?;

    let ctx = get_context(&events)?;
    let result = runtime()?.block_on(ctx.client.login(&email, &password));
    if let Err(e) = &result {
        record(
            &events,
            ClientEvent::new("login_failed")
                .with_error(e)
                .in_demo(ctx.config.demo_mode),
        );
    }

    if json {
        let report: OperationResult<serde_json::Value> = result
            .map(|()| serde_json::json!({ "authenticated": true }))
            .into();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    result?;
    output::success("Logged in");
    if ctx.config.demo_mode {
        output::info("Demo mode is on; no real funds will move.");
    }
    Ok(())
}

pub fn logout(json: bool) -> Result<()> {
    let events = open_event_log();
    record(&events, ClientEvent::command("logout"));

    let ctx = get_context(&events)?;
    let was_authenticated = ctx.client.is_authenticated();
    ctx.logout()?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "success": true, "was_authenticated": was_authenticated })
        );
    } else if was_authenticated {
        output::success("Logged out");
    } else {
        output::info("Not logged in");
    }
    Ok(())
}
