//! Vigil Dashboard
//!
//! Widget model and dashboard composition for a synthesis pass.
//!
//! ## Inputs:
//! 1. **segments**: what each monitored resource contributes ([`DashboardSegment`])
//! 2. **config**: dashboard names, time ranges and backend capacity limits
//!
//! ## Output:
//! - **Dashboards**: detail, summary and alarm dashboards, each split into as
//!   many pages as the backend limits require

pub mod factory;
pub mod layout;
pub mod segment;
pub mod widget;

pub use factory::{Dashboard, DashboardFactory, DashboardKind};
pub use layout::{Page, WidgetPlacement};
pub use segment::{DashboardPlacement, DashboardSegment, SingleWidgetDashboardSegment};
pub use widget::{
    AlarmStatusWidget, AlarmWidget, GraphWidget, HeaderLevel, HeaderWidget, Row, TextWidget, Widget,
};

/// Version of the dashboard composer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
