mod loop_runner;
mod metrics;
mod simulation;

pub use loop_runner::{run_headless, LoopConfig, LoopSummary};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use simulation::{Simulation, TickReport};
