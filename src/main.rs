use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("FOXHUB_HTTP_PORT").unwrap_or_else(|_| "3000".to_string());
    let data_folder = std::env::var("FOXHUB_DATA_FOLDER").unwrap_or_else(|_| "data".to_string());
    let pages_folder = std::env::var("FOXHUB_PAGES_FOLDER").unwrap_or_else(|_| "pages".to_string());
    let auth_mode = std::env::var("FOXHUB_AUTH").unwrap_or_else(|_| "store".to_string());
    info!(
        target: "foxhub",
        "foxhub starting: RUST_LOG='{}', http_port={}, auth={}, data_root='{}', pages_root='{}'",
        rust_log, http_port, auth_mode, data_folder, pages_folder
    );

    foxhub::server::run().await
}
