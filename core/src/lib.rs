//! Vigil Core
//!
//! Build-time alarm synthesis: turns monitoring intent into deterministic
//! alarm and composite alarm definitions.
//!
//! ## Inputs:
//! 1. **metrics**: metric references built through the [`MetricFactory`]
//! 2. **config**: global alarm, metric and backend defaults ([`VigilConfig`])
//!
//! ## Output:
//! - **Alarm / CompositeAlarm**: registered in the [`AlarmRegistry`] and handed
//!   to a [`MonitoringBackend`]

pub mod alarm;
pub mod backend;
pub mod config;
pub mod error;
pub mod layered;
pub mod metric;
pub mod strings;
pub mod types;

pub use alarm::{
    ActionStrategy, AddAlarmProps, AddCompositeAlarmProps, Alarm, AlarmFactory, AlarmId,
    AlarmRef, AlarmRegistry, AlarmSelector, CompositeAlarm, CompositeAlarmId,
    ScopedAlarmOverrides,
};
pub use backend::{ArtifactGraph, BackendHandle, InMemoryBackend, MonitoringBackend};
pub use config::{ActionsEnabled, AlarmFactoryDefaults, BackendLimits, DashboardRenderingPreference, DashboardsConfig, MetricFactoryDefaults, VigilConfig};
pub use error::{Result, VigilError};
pub use layered::Layered;
pub use metric::{Metric, MetricFactory, MetricStatistic, RateComputationMethod};
pub use types::*;

/// Version of the synthesis core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
