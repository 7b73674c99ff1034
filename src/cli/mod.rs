//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;
use reqwest::Method;

pub mod args;
pub mod context;
pub mod login;
pub mod logout;
pub mod request;
pub mod status;

pub use context::CommandContext;

/// tokenpipe - HTTP client that keeps its session alive
#[derive(Parser, Debug)]
#[command(name = "tokenpipe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Override config file location
    #[arg(long, global = true, env = "TOKENPIPE_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override the backend base URL
    #[arg(long, global = true, env = "TOKENPIPE_API_HOST", hide_env = true)]
    pub api_host: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "TOKENPIPE_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store a session
    Login {
        /// Account email (defaults to the configured one)
        #[arg(long)]
        email: Option<String>,
    },

    /// Revoke and forget the stored session
    Logout,

    /// Show configuration and session status
    Status,

    /// Send a request through the pipeline
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE, ...)
        #[arg(value_parser = parse_method)]
        method: Method,

        /// Path relative to the API host, e.g. /projects
        path: String,

        /// JSON request body
        #[arg(long, short = 'd')]
        data: Option<String>,

        /// Print the response body as received
        #[arg(long)]
        raw: bool,
    },

    /// Shorthand for `request GET <PATH>`
    Get {
        /// Path relative to the API host
        path: String,

        /// Print the response body as received
        #[arg(long)]
        raw: bool,
    },

    /// Display version information
    Version,

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   tokenpipe completion bash > /etc/bash_completion.d/tokenpipe
  zsh:    tokenpipe completion zsh > \"${fpath[1]}/_tokenpipe\"
  fish:   tokenpipe completion fish > ~/.config/fish/completions/tokenpipe.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_method(value: &str) -> Result<Method, String> {
    Method::from_bytes(value.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method: {}", value))
}
