use anyhow::Context;
use quit_store::config::StoreConfig;
use quit_store::http::HttpServer;
use quit_store::store::QuitStore;
use std::fs::File;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = StoreConfig::from_env().map_err(anyhow::Error::msg)?;

    match &config.logfile {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create logfile {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => tracing_subscriber::fmt::init(),
    }

    info!("Quit Store v{}", quit_store::version());
    info!("store directory: {}", config.target_dir.display());

    let port = config.port;
    let store = Arc::new(QuitStore::open(config).map_err(|e| anyhow::anyhow!("{}", e))?);
    info!("dataset loaded on branch {}", store.head_branch().map_err(|e| anyhow::anyhow!("{}", e))?);

    let server = HttpServer::new(store, port);
    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {}", e))?;
    Ok(())
}
