use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use demonlist_backend::config::Config;
use demonlist_backend::store::{JsonFileStore, Repository};
use demonlist_backend::{api, metrics};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    metrics::register_metrics();

    let store = JsonFileStore::new(&config.data_dir);
    let repo = Repository::new(Arc::new(store));
    let app = api::app(repo, config.static_dir.as_deref());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(
        data_dir = %config.data_dir.display(),
        "Demon list backend listening on port {}",
        config.port
    );
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
