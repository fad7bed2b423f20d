use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use cartly_agent::{
    ActionValidator, DeliveryFeeTool, Director, FastLane, HttpLlmClient, LogUsageRecorder,
    Orchestrator, OrchestratorSettings, OrderStatusTool, ProcessingLockManager, StockLookupTool,
    ToolRegistry,
};
use cartly_core::audit::{AuditEvent, AuditSink};
use cartly_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use cartly_core::ports::{ConversationStore, OrderStore, ProductLookup};
use cartly_db::{
    connect_with_settings, migrations, DbPool, SqlConversationStore, SqlOrderStore,
    SqlProductLookup,
};

use crate::sender::HttpMessageSender;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
    pub lock_manager: Arc<ProcessingLockManager>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client construction failed: {0}")]
    Llm(String),
}

/// Audit sink for the running server: events become structured log lines.
struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            conversation_id = event
                .conversation_id
                .as_ref()
                .map(|id| id.0.as_str())
                .unwrap_or("unknown"),
            correlation_id = %event.correlation_id,
            category = ?event.category,
            outcome = ?event.outcome,
            actor = %event.actor,
            metadata = ?event.metadata,
            "audit event"
        );
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store: Arc<dyn ConversationStore> = Arc::new(SqlConversationStore::new(db_pool.clone()));
    let products: Arc<dyn ProductLookup> = Arc::new(SqlProductLookup::new(db_pool.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(SqlOrderStore::new(db_pool.clone()));

    let lock_manager = Arc::new(ProcessingLockManager::with_system_clock());

    let base_url = config.llm.base_url.clone().unwrap_or_else(|| match config.llm.provider {
        LlmProvider::OpenAi => "https://api.openai.com".to_string(),
        LlmProvider::Anthropic => "https://api.anthropic.com".to_string(),
        LlmProvider::Ollama => "http://localhost:11434".to_string(),
    });
    let llm = HttpLlmClient::new(
        base_url,
        config.llm.api_key.clone(),
        config.llm.model.clone(),
        Duration::from_secs(config.llm.timeout_secs),
        config.llm.max_retries,
    )
    .map_err(|error| BootstrapError::Llm(error.to_string()))?;

    let mut tools = ToolRegistry::default();
    tools.register(StockLookupTool::new(Arc::clone(&products)));
    tools.register(OrderStatusTool::new(Arc::clone(&orders)));
    tools.register(DeliveryFeeTool::new(config.delivery.clone()));

    let director = Director::new(
        Arc::new(llm),
        Arc::new(tools),
        Arc::new(LogUsageRecorder),
        config.llm.model.clone(),
        Duration::from_secs(config.llm.timeout_secs),
        config.llm.max_tokens,
    );

    let sender = Arc::new(HttpMessageSender::new(
        config.messaging.api_url.clone(),
        config.messaging.api_token.clone(),
        config.messaging.sender_id.clone(),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        Arc::clone(&products),
        orders,
        sender,
        Arc::new(TracingAuditSink),
        Arc::clone(&lock_manager),
        FastLane::new(config.delivery.clone()),
        director,
        ActionValidator::new(products),
        config.delivery.clone(),
        OrchestratorSettings {
            bot_lock_ttl: Duration::from_secs(config.agent.bot_lock_ttl_secs),
            owner_wait_timeout: Duration::from_millis(config.agent.owner_wait_timeout_ms),
            history_turns: config.agent.history_turns,
        },
    ));

    Ok(Application { config, db_pool, orchestrator, lock_manager })
}
