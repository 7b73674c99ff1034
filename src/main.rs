//! tokenpipe CLI - HTTP client with coordinated credential refresh

use clap::{CommandFactory, Parser};

mod cli;
mod client;
mod config;
mod credentials;
mod error;
mod pipeline;

use cli::args::GlobalOptions;
use cli::{Cli, Commands};
use client::ApiRequest;
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug when set
    let level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Login { email } => cli::login::run(&opts, email).await,
        Commands::Logout => cli::logout::run(&opts).await,
        Commands::Status => cli::status::run(&opts),
        Commands::Request {
            method,
            path,
            data,
            raw,
        } => {
            let request = cli::request::build(method, &path, data.as_deref())?;
            cli::request::run(&opts, request, raw).await
        }
        Commands::Get { path, raw } => cli::request::run(&opts, ApiRequest::get(path), raw).await,
        Commands::Version => {
            println!("tokenpipe version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Completion { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "tokenpipe", &mut std::io::stdout());
            Ok(())
        }
    }
}
