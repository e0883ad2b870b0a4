use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod dialect;
mod history;
mod llm;
mod pipeline;
mod sanitize;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::history::HistoryStore;
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm = match LlmManager::new(&config.llm) {
        Ok(llm) => llm,
        Err(e) => {
            error!("Failed to initialize LLM manager: {}", e);
            return Err(e.into());
        }
    };

    // Open the history store, creating the log table if absent
    info!("Opening history store at {}", config.history.path);
    let history = match HistoryStore::open(&config.history.path).await {
        Ok(history) => history,
        Err(e) => {
            error!("Failed to open history store: {}", e);
            return Err(e.into());
        }
    };

    let app_state = Arc::new(AppState::new(config.clone(), llm, history));

    // Start the web server
    info!("Starting nlquery server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(Box::new(e) as Box<dyn std::error::Error>);
        }
    }

    Ok(())
}
