//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        content_llm::OpenAiContentAdapter, db::DbAdapter, extraction::SourceExtractor,
        storage::BucketStorageAdapter, structure_llm::OpenAiPlannerAdapter, tts::OpenAiTtsAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        delete_course_handler, generate_course_handler, get_course_handler, list_courses_handler,
        rest::ApiDoc, state::AppState,
    },
};
use async_openai::{
    config::OpenAIConfig,
    types::{SpeechModel, Voice},
    Client,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use coursegen_core::pipeline::GenerationServices;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let planner_adapter = Arc::new(OpenAiPlannerAdapter::new(
        openai_client.clone(),
        config.structure_model.clone(),
    ));
    let content_adapter = Arc::new(OpenAiContentAdapter::new(
        openai_client.clone(),
        config.summary_model.clone(),
        config.question_model.clone(),
    ));

    let tts_model = match config.tts_model.as_str() {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    };
    let tts_voice = match config.tts_voice.to_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => {
            return Err(ApiError::Internal(format!(
                "Invalid TTS voice specified in config: '{}'",
                config.tts_voice
            )))
        }
    };
    let tts_adapter = Arc::new(OpenAiTtsAdapter::new(
        openai_client.clone(),
        tts_model,
        tts_voice,
    ));

    let extractor_adapter = Arc::new(SourceExtractor::new(
        config.caption_primary_lang.clone(),
        config.caption_secondary_lang.clone(),
    ));
    let storage_adapter = Arc::new(BucketStorageAdapter::new(
        reqwest::Client::new(),
        config.storage_url.clone(),
        config.storage_api_key.clone(),
        config.audio_bucket.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let services = Arc::new(GenerationServices {
        db: db_adapter,
        extractor: extractor_adapter,
        planner: planner_adapter,
        content: content_adapter,
        tts: tts_adapter,
        storage: storage_adapter,
    });
    let app_state = Arc::new(AppState {
        config: config.clone(),
        services,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/courses/generate", post(generate_course_handler))
        .route("/courses", get(list_courses_handler))
        .route(
            "/courses/{id}",
            get(get_course_handler).delete(delete_course_handler),
        )
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
