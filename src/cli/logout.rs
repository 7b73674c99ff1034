//! Logout command implementation

use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::cli::CommandContext;
use crate::error::Result;

/// Run the logout command
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;

    if ctx.pipeline.credentials().await?.is_none() {
        println!("{} Not logged in", "○".dimmed());
        return Ok(());
    }

    ctx.pipeline.logout().await?;
    println!("{}", "✓ Logged out".green());
    Ok(())
}
