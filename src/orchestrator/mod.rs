pub mod builder;
pub mod context;
pub mod core;
pub mod metrics;
pub mod pacemaker;
pub mod plugin;
pub mod plugins;
mod sweep;

pub use self::core::TaskOrchestrator;
pub use builder::OrchestratorBuilder;
pub use context::OrchestratorContext;
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pacemaker::{PacemakerEvent, SweepPacemaker};
pub use plugin::OrchestratorPlugin;
