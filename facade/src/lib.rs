//! Vigil Facade
//!
//! One-stop entry point for a monitoring synthesis pass: monitors resources,
//! adds headers and widgets, combines alarms into composites and emits the
//! resulting alarms and dashboards through a backend.
//!
//! ## Inputs:
//! 1. **config**: alarm, metric, dashboard and backend defaults ([`VigilConfig`])
//! 2. **targets**: resources to monitor ([`MonitoringTarget`]), either built in
//!    code or read from a YAML [`SynthesisPlan`]
//!
//! ## Output:
//! - **ArtifactGraph**: every alarm, composite alarm and dashboard page definition

pub mod facade;
pub mod monitoring;
pub mod plan;

pub use facade::{MonitoringFacade, MonitoringFacadeBuilder};
pub use monitoring::{
    AlarmOptions, BaseMonitoringProps, CustomMonitoringProps, LambdaFunctionMonitoringProps, Monitoring,
    MonitoringScope, MonitoringTarget, SqsQueueMonitoringProps, ThresholdProps,
};
pub use plan::{PlanStep, SynthesisPlan};

pub use vigil_core::{ArtifactGraph, Result, VigilConfig, VigilError};

/// Version of the facade and the `vigil-synth` binary
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
