pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

pub use api::routes;
pub use error::{DeployError, DeployResult};
pub use logic::{DeploymentRequest, ModelDeployer, ModelsReload, ReloadNotifier};
pub use model::*;
pub use store::{InMemoryStore, PlatformStore, PostgresStore, SparqlEndpointStore, Store};

/// Load a models graph snapshot written as JSON
pub fn load_models_snapshot(path: &std::path::Path) -> anyhow::Result<Models> {
    use anyhow::Context;

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read models snapshot {}", path.display()))?;
    let models = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse models snapshot {}", path.display()))?;
    Ok(models)
}
