//! Assembles the engine stack both front-ends share.

use std::sync::Arc;

use anyhow::Context;
use ferrocode_agent::{AgentEngine, EngineConfig, EngineHooks, EngineState, StandardHooks};
use ferrocode_checkpoint::{CheckpointOrchestrator, CheckpointSettings, FileCheckpointStore};
use ferrocode_config::AppConfig;
use ferrocode_core::{InteractionSink, ModelTransport};
use ferrocode_policy::{ExecutionPolicy, PermissionGrants};
use ferrocode_providers::OpenAiCompatTransport;
use ferrocode_tools::default_registry;
use tracing::info;

/// One conversation: the engine plus the state it works on.
pub struct Session {
    pub engine: AgentEngine,
    pub state: EngineState,
}

/// Load the configuration and make sure a model can actually be reached.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let config = AppConfig::load().context("Failed to load config")?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export FERROCODE_API_KEY=sk-...");
        eprintln!("    export OPENAI_API_KEY=sk-...");
        eprintln!("    export OPENROUTER_API_KEY=sk-or-v1-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    }

    Ok(config)
}

/// Wire transport, tools, policy and checkpointing from `config`.
///
/// `wrap` receives the standard hooks and returns what the engine should
/// use, which lets the chat UI override `on_deny`.
pub async fn build(
    config: &AppConfig,
    sink: Arc<dyn InteractionSink>,
    safe_mode: bool,
    wrap: impl FnOnce(StandardHooks) -> Arc<dyn EngineHooks>,
) -> anyhow::Result<Session> {
    let transport: Arc<dyn ModelTransport> = Arc::new(
        OpenAiCompatTransport::from_config(&config.model)
            .context("Failed to create model transport")?,
    );

    let workspace = config.tools.resolved_workspace();
    let registry = Arc::new(default_registry(
        workspace.clone(),
        config.tools.shell_timeout_secs,
    ));
    let policy = Arc::new(
        ExecutionPolicy::new(registry, PermissionGrants::new(config.permissions.granted()))
            .with_safe_mode(safe_mode || config.permissions.safe_mode),
    );

    let store = Arc::new(FileCheckpointStore::new(config.checkpoint.resolved_path()));
    let checkpoint = Arc::new(
        CheckpointOrchestrator::open(
            store,
            CheckpointSettings {
                enabled: config.checkpoint.enabled,
                max_iterations: config.agent.max_iterations,
            },
        )
        .await
        .context("Failed to open checkpoint store")?,
    );

    info!(
        transport = transport.name(),
        model = %config.model.model,
        workspace = %workspace.display(),
        safe_mode = policy.safe_mode(),
        "Session ready"
    );

    let hooks = wrap(StandardHooks::new(transport, policy.clone(), sink));
    let engine = AgentEngine::new(hooks, policy, checkpoint, EngineConfig::from_app(config));

    Ok(Session {
        engine,
        state: EngineState::new(config.agent.system_prompt.clone()),
    })
}
