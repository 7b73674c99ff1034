//! Command execution context
//!
//! Loads configuration, opens the credential store and builds the pipeline
//! every network command runs through.

use std::path::PathBuf;

use colored::Colorize;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::cli::args::GlobalOptions;
use crate::client::HttpTransport;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{SessionEvent, TokenPipeline};

/// Context for command execution containing config, pipeline, and session events.
pub struct CommandContext {
    /// Loaded configuration with CLI overrides applied
    pub config: Config,
    /// Where the configuration was loaded from
    pub config_path: PathBuf,
    /// Pipeline over the configured backend and credential store
    pub pipeline: TokenPipeline<HttpTransport>,
    events: broadcast::Receiver<SessionEvent>,
}

impl CommandContext {
    /// Create a new command context.
    ///
    /// # Errors
    /// Returns error if the config cannot be parsed or the store cannot be opened.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config_path = Config::resolve_path(opts.config_ref())?;
        let mut config = Config::load_from(&config_path)?;

        if let Some(host) = opts.api_host_ref() {
            config.api_host = host.to_string();
        }

        let transport =
            HttpTransport::with_timeout(&config.api_host, config.pipeline.request_timeout())?;
        log::debug!(
            "Using {} with {} storage",
            transport.base_url(),
            config.storage
        );

        let store = config.open_store()?;
        let pipeline = TokenPipeline::new(transport, store, config.pipeline.settings());
        let events = pipeline.subscribe();

        Ok(Self {
            config,
            config_path,
            pipeline,
            events,
        })
    }

    /// Tell the user to log in again if the session expired during this command.
    pub fn report_session_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::Expired) => {
                    eprintln!(
                        "{} Session expired. Run {} to sign in again.",
                        "⚠".yellow(),
                        "tokenpipe login".cyan()
                    );
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
