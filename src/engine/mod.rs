pub mod orchestrator;
pub mod params;
pub mod pipeline;
pub mod report;

pub use orchestrator::{ModuleConfig, Orchestrator};
pub use params::parse_param_string;
pub use pipeline::{PipelineConfig, StepConfig};
pub use report::{Report, StepError, StepStats, StepStatus};
