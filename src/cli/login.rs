//! Login command implementation

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use crate::cli::args::GlobalOptions;
use crate::cli::CommandContext;
use crate::error::Result;

/// Environment variable supplying the password non-interactively
pub const PASSWORD_ENV: &str = "TOKENPIPE_PASSWORD";

/// Run the login command
pub async fn run(opts: &GlobalOptions, email: Option<String>) -> Result<()> {
    let mut ctx = CommandContext::new(opts)?;

    let email = match email.or_else(|| ctx.config.email.clone()) {
        Some(email) => email,
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Email")
            .interact_text()?,
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Password for {}", email))
            .interact()?,
    };

    println!("{}", "Authenticating...".cyan());
    let pair = ctx.pipeline.login(&email, &password).await?;
    println!("{}", "✓ Logged in".green());

    if let Some(expires_at) = pair.expires_at {
        println!(
            "  Access token expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    if ctx.config.email.as_deref() != Some(email.as_str()) {
        ctx.config.email = Some(email);
        ctx.config.save_to(&ctx.config_path)?;
        log::debug!("Remembered login email in {}", ctx.config_path.display());
    }

    Ok(())
}
