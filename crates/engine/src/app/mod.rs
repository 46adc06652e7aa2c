mod loop_runner;
mod metrics;

pub use loop_runner::{
    plan_sim_steps, run_headless, LoopConfig, LoopControl, LoopError, LoopSummary, Pacing,
    Simulation, StepPlan,
};
pub use metrics::LoopMetricsSnapshot;
