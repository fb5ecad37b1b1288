use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doodledash::{
    canvas::SnapshotCanvas,
    guess::LlmGuessSource,
    llm::{LlmConfig, LlmManager},
    prompt::{FallbackPromptSource, LlmPromptSource, PromptSource},
    router,
    state::{Collaborators, GameSession},
    store::FileStore,
    types::GameConfig,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doodledash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DoodleDash...");

    let config = GameConfig::from_env();
    tracing::info!(
        "{} guessing models, {}s per drawing",
        config.models.len(),
        config.drawing_seconds
    );

    let llm_config = LlmConfig::from_env();
    let manager = match llm_config.build_manager() {
        Ok(manager) => {
            tracing::info!("LLM providers initialized successfully");
            Some(Arc::new(manager))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize LLM providers: {}. Prompts come from the fallback list and every guess will fail.",
                e
            );
            None
        }
    };

    let prompts: Arc<dyn PromptSource> = match &manager {
        Some(manager) => Arc::new(LlmPromptSource::new(
            manager.clone(),
            llm_config.prompt_model.clone(),
            llm_config.default_timeout,
            llm_config.prompt_max_tokens,
        )),
        None => Arc::new(FallbackPromptSource),
    };
    let manager = manager.unwrap_or_else(|| Arc::new(LlmManager::new(Vec::new())));

    let guesser = LlmGuessSource::new(
        manager,
        llm_config.default_timeout,
        llm_config.guess_max_tokens,
    );

    let port = config.port;
    let store = FileStore::new(config.scores_path.clone());
    let session = GameSession::open(
        config,
        Collaborators {
            guesser: Arc::new(guesser),
            prompts,
            store: Arc::new(store),
            canvas: Arc::new(SnapshotCanvas::new()),
        },
    )
    .await;

    let app = router(session);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
