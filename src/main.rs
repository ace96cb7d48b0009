use axum::serve;
use log::{info, warn};
use model_deploy::api::routes::create_router;
use model_deploy::config::AppConfig;
use model_deploy::{
    load_models_snapshot, ModelDeployer, Models, ModelsMetaInfo, PlatformStore, PostgresStore,
    SparqlEndpointStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    info!("Connecting to PostgreSQL...");
    let postgres_store = PostgresStore::new(&config.database_url(), config.max_connections()).await?;
    postgres_store.migrate().await?;

    let semantic_store = SparqlEndpointStore::new(
        config.semantic.query_endpoint.clone(),
        config.semantic.update_endpoint.clone(),
    );
    let store = Arc::new(PlatformStore::new(postgres_store, semantic_store));

    let models = match &config.models.snapshot_path {
        Some(path) => load_models_snapshot(std::path::Path::new(path))?,
        None => {
            warn!("No models snapshot configured, starting with an empty models graph");
            Models::new(ModelsMetaInfo::standard())
        }
    };

    let deployer = Arc::new(ModelDeployer::new(models, store));
    let restored = deployer.restore_deployed_state().await?;
    info!(
        "Models graph ready at version {} ({} changes already deployed)",
        deployer.version().await,
        restored
    );

    let mut reloads = deployer.subscribe();
    tokio::spawn(async move {
        loop {
            match reloads.recv().await {
                Ok(_) => info!("Semantic model changed, dependent caches must be reloaded"),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} models reload signals", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    run_server(create_router().with_state(deployer), &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Model deployment server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
