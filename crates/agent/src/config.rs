use ferrocode_config::AppConfig;
use ferrocode_core::CallOptions;

/// Engine settings that do not change within a session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub options: CallOptions,
    /// Cap on concurrently running auto-approved calls (at least 1).
    pub max_parallel_tools: usize,
}

impl EngineConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            model: config.model.model.clone(),
            options: CallOptions {
                temperature: config.model.temperature,
                max_tokens: config.model.max_tokens,
                ..CallOptions::default()
            },
            max_parallel_tools: config.agent.max_parallel_tools,
        }
    }

    pub fn with_max_parallel_tools(mut self, n: usize) -> Self {
        self.max_parallel_tools = n;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}
