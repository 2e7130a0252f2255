//! Monitoring backend abstraction and the in-memory recorder

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alarm::AlarmActions;
use crate::config::BackendLimits;
use crate::metric::Metric;
use crate::types::{ComparisonOperator, TreatMissingData};
use crate::{Result, VigilError};

/// Opaque reference to an artifact created by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendHandle(String);

impl BackendHandle {
    pub fn new<S: Into<String>>(handle: S) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metric alarm as handed to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    pub name: String,
    pub description: String,
    pub metric: Metric,
    pub comparison_operator: ComparisonOperator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub datapoints_to_alarm: u32,
    pub treat_missing_data: TreatMissingData,
    /// `false` maps to the backend's "ignore" for low-sample percentiles
    pub evaluate_low_sample_count_percentile: bool,
    pub actions_enabled: bool,
    pub actions: AlarmActions,
}

/// Composite alarm as handed to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAlarmDefinition {
    pub name: String,
    pub description: String,
    pub rule: String,
    pub actions_enabled: bool,
    pub actions: AlarmActions,
}

/// One physical dashboard page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDefinition {
    pub name: String,
    pub start: String,
    pub body: serde_json::Value,
}

/// Accepts artifact definitions and returns handles to the created artifacts
#[cfg_attr(test, mockall::automock)]
pub trait MonitoringBackend {
    fn create_alarm(&mut self, definition: &AlarmDefinition) -> Result<BackendHandle>;

    fn create_composite_alarm(&mut self, definition: &CompositeAlarmDefinition) -> Result<BackendHandle>;

    fn create_dashboard(&mut self, definition: &DashboardDefinition) -> Result<BackendHandle>;
}

/// Everything a synthesis pass produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactGraph {
    pub alarms: Vec<AlarmDefinition>,
    pub composite_alarms: Vec<CompositeAlarmDefinition>,
    pub dashboards: Vec<DashboardDefinition>,
}

impl ArtifactGraph {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn dashboard(&self, name: &str) -> Option<&DashboardDefinition> {
        self.dashboards.iter().find(|d| d.name == name)
    }
}

/// Backend that records definitions instead of deploying them
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    limits: BackendLimits,
    graph: ArtifactGraph,
}

impl InMemoryBackend {
    pub fn new(limits: BackendLimits) -> Self {
        Self {
            limits,
            graph: ArtifactGraph::default(),
        }
    }

    pub fn graph(&self) -> &ArtifactGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ArtifactGraph {
        self.graph
    }

    fn check_name(name: &str, max: usize, kind: &str) -> Result<()> {
        if name.is_empty() {
            return Err(VigilError::backend(kind.to_string(), "name must not be empty".to_string()));
        }
        if name.chars().count() > max {
            return Err(VigilError::backend(
                name.to_string(),
                format!("{} name exceeds {} characters", kind, max),
            ));
        }
        Ok(())
    }
}

impl MonitoringBackend for InMemoryBackend {
    fn create_alarm(&mut self, definition: &AlarmDefinition) -> Result<BackendHandle> {
        Self::check_name(&definition.name, self.limits.max_alarm_name_length, "alarm")?;
        debug!(alarm = %definition.name, "Recording alarm");

        self.graph.alarms.push(definition.clone());
        Ok(BackendHandle::new(format!("alarm/{}", definition.name)))
    }

    fn create_composite_alarm(&mut self, definition: &CompositeAlarmDefinition) -> Result<BackendHandle> {
        Self::check_name(&definition.name, self.limits.max_alarm_name_length, "composite alarm")?;
        debug!(alarm = %definition.name, rule = %definition.rule, "Recording composite alarm");

        self.graph.composite_alarms.push(definition.clone());
        Ok(BackendHandle::new(format!("composite-alarm/{}", definition.name)))
    }

    fn create_dashboard(&mut self, definition: &DashboardDefinition) -> Result<BackendHandle> {
        Self::check_name(&definition.name, self.limits.max_dashboard_name_length, "dashboard")?;
        if self.graph.dashboard(&definition.name).is_some() {
            return Err(VigilError::backend(
                definition.name.clone(),
                "dashboard already exists".to_string(),
            ));
        }
        debug!(dashboard = %definition.name, "Recording dashboard");

        self.graph.dashboards.push(definition.clone());
        Ok(BackendHandle::new(format!("dashboard/{}", definition.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite(name: &str) -> CompositeAlarmDefinition {
        CompositeAlarmDefinition {
            name: name.to_string(),
            description: String::new(),
            rule: "ALARM(\"a\")".to_string(),
            actions_enabled: true,
            actions: AlarmActions::default(),
        }
    }

    #[test]
    fn test_in_memory_records_and_returns_handles() {
        let mut backend = InMemoryBackend::default();
        let handle = backend.create_composite_alarm(&composite("Svc-Composite")).unwrap();

        assert_eq!(handle.as_str(), "composite-alarm/Svc-Composite");
        assert_eq!(backend.graph().composite_alarms.len(), 1);
    }

    #[test]
    fn test_in_memory_enforces_limits() {
        let limits = BackendLimits {
            max_alarm_name_length: 5,
            ..BackendLimits::default()
        };
        let mut backend = InMemoryBackend::new(limits);
        let err = backend.create_composite_alarm(&composite("TooLongName")).unwrap_err();
        assert_eq!(err.category(), "backend");
    }

    #[test]
    fn test_duplicate_dashboard_rejected() {
        let mut backend = InMemoryBackend::default();
        let page = DashboardDefinition {
            name: "Svc".to_string(),
            start: "-PT8H".to_string(),
            body: serde_json::json!({ "widgets": [] }),
        };
        backend.create_dashboard(&page).unwrap();
        assert!(backend.create_dashboard(&page).is_err());

        let json = backend.into_graph().to_json_pretty().unwrap();
        assert!(json.contains("\"Svc\""));
    }

    #[test]
    fn test_mock_backend_sees_definition() {
        let mut mock = MockMonitoringBackend::new();
        mock.expect_create_composite_alarm()
            .withf(|definition| definition.rule.starts_with("ALARM"))
            .times(1)
            .returning(|definition| Ok(BackendHandle::new(definition.name.clone())));

        let handle = mock.create_composite_alarm(&composite("X")).unwrap();
        assert_eq!(handle.to_string(), "X");
    }
}
