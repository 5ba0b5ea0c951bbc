// FisioClinic - Web Server
// REST API with Axum over the local clinic store

use anyhow::{Context, Result};
use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use clap::Parser;
use fisio_clinic::api::{api_router, AppState};
use fisio_clinic::config::{init_logging, today, ServerArgs};
use fisio_clinic::{AuthState, ClinicStore, KvStorage, VERSION};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

#[derive(Parser, Debug)]
#[command(name = "fisio-server", version, about = "FisioClinic HTTP API")]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("info");

    println!("🌐 FisioClinic - Web Server v{}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let storage = KvStorage::open(&cli.server.data.data)?;
    let store = ClinicStore::load(storage.clone(), today())?;
    let auth = AuthState::load(storage)?;
    println!("✓ Data opened: {:?}", cli.server.data.data);

    let state = AppState::new(store, auth);

    // Build main router
    let app = Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_router(state))
        .nest_service("/static", ServeDir::new("web"))
        .layer(CorsLayer::permissive());

    let addr = cli.server.bind.as_str();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    log::info!("listening on {}", addr);
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/health (log in via POST /api/login)", addr);
    println!("   UI:  http://{}", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server stopped with an error")?;
    Ok(())
}
