// FormGrid - Web Server
// Serves the JSON API with permissive CORS

use anyhow::{Context, Result};
use formgrid::{api, init_tracing, AppConfig};
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    init_tracing(&config.log_filter);

    println!("🌐 FormGrid - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let app = api::router().layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;
    info!(addr = %config.server_addr, "listening");

    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   Health: /api/health");
    println!("   Form:   POST /api/submit-form");
    println!("   CSV:    POST /api/csv/parse, POST /api/csv/export");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
