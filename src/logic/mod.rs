pub mod aggregate;
pub mod deployer;
pub mod labels;
pub mod reload;
pub mod semantic;
pub mod steps;

pub use aggregate::{aggregate, AggregatedChange};
pub use deployer::{DeploymentRequest, ModelDeployer};
pub use labels::generate_label_id;
pub use reload::{ModelsReload, ReloadNotifier};
pub use semantic::{SemanticModelGenerator, StatementChanges};
pub use steps::{DeploymentStep, LabelCategory, StepOutcome, StepPayload, StepRegistry};
