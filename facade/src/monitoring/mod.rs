//! Monitorings: per-resource bundles of alarms and dashboard widgets
//!
//! Every monitoring is built in one go: its metrics are created, the alarms
//! it was asked for go through the scoped [`AlarmFactory`] into the registry,
//! and the resulting annotations end up on the widgets it contributes as a
//! [`DashboardSegment`].

pub mod custom;
pub mod lambda;
pub mod sqs;

pub use custom::{CustomMetric, CustomMetricGroup, CustomMonitoring, CustomMonitoringProps, MetricProps};
pub use lambda::{LambdaFunctionMonitoring, LambdaFunctionMonitoringProps};
pub use sqs::{SqsQueueMonitoring, SqsQueueMonitoringProps};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use vigil_core::{
    ActionStrategy, AddAlarmProps, Alarm, AlarmFactory, AlarmRegistry, ComparisonOperator, Metric,
    MetricFactory, MonitoringBackend, Result, ScopedAlarmOverrides, TreatMissingData, VigilError,
};
use vigil_dashboard::{AlarmWidget, DashboardPlacement, DashboardSegment, Widget};

static ALARM_FRIENDLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\-_]+$").expect("static regex"));

/// Naming, placement and alarm overrides shared by every monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseMonitoringProps {
    /// Name used in alarm names; must be alarm friendly
    pub alarm_friendly_name: Option<String>,

    /// Free-form caption of the dashboard section
    pub human_readable_name: Option<String>,

    /// Replaces the alarm friendly name as the local alarm name prefix
    pub local_alarm_name_prefix_override: Option<String>,

    #[serde(flatten)]
    pub placement: DashboardPlacement,

    pub alarm_overrides: ScopedAlarmOverrides,
}

impl BaseMonitoringProps {
    /// Explicit alarm friendly name, else `fallback` when it is alarm friendly
    pub fn resolve_alarm_friendly_name(&self, fallback: Option<&str>) -> Result<String> {
        if let Some(name) = &self.alarm_friendly_name {
            return Ok(name.clone());
        }
        match fallback {
            Some(name) if ALARM_FRIENDLY.is_match(name) => Ok(name.to_string()),
            _ => Err(VigilError::invalid_monitoring(
                fallback.unwrap_or("<unnamed>").to_string(),
                "insufficient information for naming alarms: provide alarm_friendly_name, \
                 human_readable_name or an alarm friendly resource name"
                    .to_string(),
            )),
        }
    }

    pub fn resolve_human_readable_name(&self, fallback: Option<&str>) -> Result<String> {
        if let Some(name) = &self.human_readable_name {
            return Ok(name.clone());
        }
        match fallback {
            Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
            _ => self.resolve_alarm_friendly_name(fallback),
        }
    }

    /// Alarm factory for this monitoring. The local prefix override replaces the
    /// friendly name instead of adding to it.
    pub fn alarm_factory(&self, global: &AlarmFactory, alarm_friendly_name: &str) -> AlarmFactory {
        match &self.local_alarm_name_prefix_override {
            Some(prefix) => global.scoped("", Some(prefix.clone()), self.alarm_overrides.clone()),
            None => global.scoped(alarm_friendly_name, None, self.alarm_overrides.clone()),
        }
    }
}

/// Options every threshold accepts on top of its value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmOptions {
    pub datapoints_to_alarm: Option<u32>,
    pub evaluation_periods: Option<u32>,
    /// Alarm-specific metric period in seconds
    pub period: Option<u64>,
    pub evaluate_low_sample_count_percentile: Option<bool>,
    pub treat_missing_data_override: Option<TreatMissingData>,
    pub comparison_operator_override: Option<ComparisonOperator>,
    pub actions_enabled: Option<bool>,
    pub action_override: Option<ActionStrategy>,
    pub alarm_name_override: Option<String>,
    pub alarm_description_override: Option<String>,
    pub dedupe_string_override: Option<String>,
    pub runbook_link: Option<String>,
    pub documentation_link: Option<String>,
    pub fill_alarm_range: Option<bool>,
    pub tags: Vec<String>,
}

impl AlarmOptions {
    /// Layer these options over a request built by a monitoring
    pub fn apply(&self, mut props: AddAlarmProps) -> AddAlarmProps {
        if let Some(operator) = self.comparison_operator_override {
            props.comparison_operator = operator;
        }
        if let Some(treat) = self.treat_missing_data_override {
            props.treat_missing_data = Some(treat);
        }
        props.datapoints_to_alarm = self.datapoints_to_alarm.or(props.datapoints_to_alarm);
        props.evaluation_periods = self.evaluation_periods.or(props.evaluation_periods);
        props.period = self.period.or(props.period);
        props.evaluate_low_sample_count_percentile = self
            .evaluate_low_sample_count_percentile
            .or(props.evaluate_low_sample_count_percentile);
        props.actions_enabled = self.actions_enabled.or(props.actions_enabled);
        props.action_override = self.action_override.clone().or(props.action_override);
        props.name_override = self.alarm_name_override.clone().or(props.name_override);
        props.description_override = self
            .alarm_description_override
            .clone()
            .or(props.description_override);
        props.dedupe_override = self.dedupe_string_override.clone().or(props.dedupe_override);
        props.runbook_link = self.runbook_link.clone().or(props.runbook_link);
        props.documentation_link = self.documentation_link.clone().or(props.documentation_link);
        props.fill_alarm_range = self.fill_alarm_range.or(props.fill_alarm_range);
        props.with_tags(self.tags.iter().cloned())
    }
}

/// A single threshold value with its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProps {
    pub threshold: f64,

    #[serde(flatten)]
    pub options: AlarmOptions,
}

/// Everything a monitoring needs while it is being built
pub struct MonitoringScope<'a> {
    pub alarm_factory: &'a AlarmFactory,
    pub metric_factory: &'a MetricFactory,
    pub registry: &'a mut AlarmRegistry,
    pub backend: &'a mut dyn MonitoringBackend,
}

impl MonitoringScope<'_> {
    pub fn add_alarm(&mut self, factory: &AlarmFactory, metric: &Metric, props: AddAlarmProps) -> Result<Arc<Alarm>> {
        factory.add_alarm(metric, props, &mut *self.registry, &mut *self.backend)
    }
}

/// A built monitoring
pub trait Monitoring: DashboardSegment {
    /// Caption of the monitoring's dashboard section
    fn title(&self) -> &str;

    fn created_alarms(&self) -> &[Arc<Alarm>];
}

/// One alarm widget per created alarm
pub(crate) fn alarm_widgets(alarms: &[Arc<Alarm>]) -> Vec<Arc<dyn Widget>> {
    alarms
        .iter()
        .map(|alarm| Arc::new(AlarmWidget::new(Arc::clone(alarm))) as Arc<dyn Widget>)
        .collect()
}

/// Resource kinds the facade can monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitoringTarget {
    Custom(CustomMonitoringProps),
    SqsQueue(SqsQueueMonitoringProps),
    LambdaFunction(LambdaFunctionMonitoringProps),
}

impl MonitoringTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringTarget::Custom(_) => "custom",
            MonitoringTarget::SqsQueue(_) => "sqs_queue",
            MonitoringTarget::LambdaFunction(_) => "lambda_function",
        }
    }

    pub fn base(&self) -> &BaseMonitoringProps {
        match self {
            MonitoringTarget::Custom(props) => &props.base,
            MonitoringTarget::SqsQueue(props) => &props.base,
            MonitoringTarget::LambdaFunction(props) => &props.base,
        }
    }

    /// Create the monitoring's metrics and alarms
    pub fn build(self, scope: &mut MonitoringScope<'_>) -> Result<Box<dyn Monitoring>> {
        Ok(match self {
            MonitoringTarget::Custom(props) => Box::new(CustomMonitoring::new(scope, props)?),
            MonitoringTarget::SqsQueue(props) => Box::new(SqsQueueMonitoring::new(scope, props)?),
            MonitoringTarget::LambdaFunction(props) => Box::new(LambdaFunctionMonitoring::new(scope, props)?),
        })
    }
}

impl std::fmt::Display for MonitoringTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{AlarmFactoryDefaults, BackendLimits};

    #[test]
    fn test_friendly_name_fallbacks() {
        let props = BaseMonitoringProps::default();
        assert_eq!(props.resolve_alarm_friendly_name(Some("orders-queue")).unwrap(), "orders-queue");
        assert!(props.resolve_alarm_friendly_name(Some("orders queue")).is_err());
        assert!(props.resolve_alarm_friendly_name(None).is_err());

        assert_eq!(props.resolve_human_readable_name(Some("Orders queue")).unwrap(), "Orders queue");

        let named = BaseMonitoringProps {
            alarm_friendly_name: Some("Orders".to_string()),
            ..Default::default()
        };
        assert_eq!(named.resolve_human_readable_name(None).unwrap(), "Orders");
    }

    #[test]
    fn test_options_override_monitoring_defaults() {
        let options = AlarmOptions {
            comparison_operator_override: Some(ComparisonOperator::GreaterThanOrEqualToThreshold),
            datapoints_to_alarm: Some(5),
            tags: vec!["svc-health".to_string()],
            ..Default::default()
        };
        let props = options.apply(
            AddAlarmProps::new("Queue-Message-Count-Max", 10.0, ComparisonOperator::GreaterThanThreshold)
                .with_treat_missing_data(TreatMissingData::NotBreaching),
        );

        assert_eq!(props.comparison_operator, ComparisonOperator::GreaterThanOrEqualToThreshold);
        assert_eq!(props.datapoints_to_alarm, Some(5));
        assert_eq!(props.treat_missing_data, Some(TreatMissingData::NotBreaching));
        assert!(props.tags.contains("svc-health"));
    }

    #[test]
    fn test_threshold_yaml_carries_period_and_percentile_evaluation() {
        let threshold: ThresholdProps =
            serde_yaml::from_str("threshold: 250\nperiod: 60\nevaluate_low_sample_count_percentile: false\n").unwrap();
        assert_eq!(threshold.options.period, Some(60));

        let props = threshold.options.apply(AddAlarmProps::new(
            "Latency-P99",
            threshold.threshold,
            ComparisonOperator::GreaterThanThreshold,
        ));
        assert_eq!(props.period, Some(60));
        assert_eq!(props.evaluate_low_sample_count_percentile, Some(false));
    }

    #[test]
    fn test_local_prefix_override_replaces_friendly_name() {
        let global = AlarmFactory::new(AlarmFactoryDefaults::default(), &BackendLimits::default());
        let props = BaseMonitoringProps {
            local_alarm_name_prefix_override: Some("Ingest".to_string()),
            ..Default::default()
        };
        let factory = props.alarm_factory(&global, "orders-queue");

        let mut registry = AlarmRegistry::new();
        let mut backend = vigil_core::InMemoryBackend::default();
        let metric = MetricFactory::new(Default::default())
            .create_metric(Some("AWS/SQS"), "NumberOfMessagesSent", vigil_core::MetricStatistic::Sum, "Incoming")
            .unwrap();
        let alarm = factory
            .add_alarm(
                &metric,
                AddAlarmProps::new("Queue-Incoming-Messages-Count-Max", 10.0, ComparisonOperator::GreaterThanThreshold),
                &mut registry,
                &mut backend,
            )
            .unwrap();

        assert_eq!(alarm.name, "Vigil-Ingest-Queue-Incoming-Messages-Count-Max");
    }

    #[test]
    fn test_target_is_tagged_by_type() {
        let yaml = r#"
type: sqs_queue
queue_name: orders
alarm_friendly_name: Orders
add_to_summary_dashboard: false
add_queue_max_size_alarm:
  Critical:
    threshold: 1000
"#;
        let target: MonitoringTarget = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(target.as_str(), "sqs_queue");
        assert_eq!(target.base().alarm_friendly_name.as_deref(), Some("Orders"));
        assert_eq!(target.base().placement.add_to_summary_dashboard, Some(false));
    }
}
