use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tandem_api::{AppStateInner, router};
use tandem_gateway::{GeminiClient, Narrator};
use tandem_pipeline::TurnPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("TANDEM_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("TANDEM_DB_PATH").unwrap_or_else(|_| "tandem.db".into());
    let host = std::env::var("TANDEM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TANDEM_PORT")
        .unwrap_or_else(|_| "3001".into())
        .parse()?;
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;

    // Init database
    let db = Arc::new(tandem_db::Database::open(&PathBuf::from(&db_path))?);

    // Model gateway
    let mut gemini = GeminiClient::new(api_key)?;
    if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
        gemini = gemini.with_base_url(base_url);
    }
    let narrator: Arc<dyn Narrator> = Arc::new(gemini);

    // Shared state
    let state = Arc::new(AppStateInner {
        db: db.clone(),
        pipeline: TurnPipeline::new(db, narrator.clone()),
        narrator,
        jwt_secret,
    });

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Tandem server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
