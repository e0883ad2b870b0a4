use crate::config::AppConfig;
use crate::history::HistoryStore;
use crate::llm::LlmManager;

/// Shared application state for the web server.
///
/// Stateless across requests beyond the history store's durable log; the
/// LLM manager and config are read-only after startup.
pub struct AppState {
    pub config: AppConfig,
    pub llm: LlmManager,
    pub history: HistoryStore,
}

impl AppState {
    pub fn new(config: AppConfig, llm: LlmManager, history: HistoryStore) -> Self {
        Self {
            config,
            llm,
            history,
        }
    }
}
