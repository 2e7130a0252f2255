//! Custom monitoring over arbitrary metric groups

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use vigil_core::alarm::Annotation;
use vigil_core::{
    AddAlarmProps, Alarm, AlarmFactory, ComparisonOperator, Metric, MetricFactory, MetricStatistic, Result,
    TreatMissingData, VigilError,
};
use vigil_dashboard::widget::{recommended_widget_width, DEFAULT_GRAPH_WIDGET_HEIGHT, DEFAULT_SUMMARY_WIDGET_HEIGHT, FULL_WIDTH};
use vigil_dashboard::{DashboardSegment, GraphWidget, HeaderWidget, Row, TextWidget, Widget};

use super::{alarm_widgets, AlarmOptions, BaseMonitoringProps, Monitoring, MonitoringScope};

fn default_statistic() -> MetricStatistic {
    MetricStatistic::Average
}

/// Plain metric reference as written in a synthesis plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricProps {
    #[serde(default)]
    pub namespace: Option<String>,
    pub metric_name: String,
    #[serde(default = "default_statistic")]
    pub statistic: MetricStatistic,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, String>,
    #[serde(default)]
    pub period_seconds: Option<u64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl MetricProps {
    pub fn build(&self, factory: &MetricFactory) -> Result<Metric> {
        let label = self.label.as_deref().unwrap_or(&self.metric_name);
        let mut metric = factory.create_metric(self.namespace.as_deref(), &self.metric_name, self.statistic, label)?;
        for (key, value) in &self.dimensions {
            metric = metric.with_dimension(key.as_str(), value.as_str());
        }
        if let Some(period) = self.period_seconds {
            metric = metric.with_period(period);
        }
        if let Some(unit) = &self.unit {
            metric = metric.with_unit(unit.as_str());
        }
        if let Some(color) = &self.color {
            metric = metric.with_color(color.as_str());
        }
        Ok(metric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomThreshold {
    pub threshold: f64,
    pub comparison_operator: ComparisonOperator,
    #[serde(flatten)]
    pub options: AlarmOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectionThreshold {
    pub standard_deviation_for_alarm: f64,
    #[serde(default)]
    pub alarm_when_above_the_band: bool,
    #[serde(default)]
    pub alarm_when_below_the_band: bool,
    #[serde(default)]
    pub additional_description: Option<String>,
    #[serde(flatten)]
    pub options: AlarmOptions,
}

impl AnomalyDetectionThreshold {
    fn operator_and_description(&self) -> Option<(ComparisonOperator, &'static str)> {
        match (self.alarm_when_above_the_band, self.alarm_when_below_the_band) {
            (true, true) => Some((
                ComparisonOperator::LessThanLowerOrGreaterThanUpperThreshold,
                "Anomaly detection: value is outside of the expected band.",
            )),
            (true, false) => Some((
                ComparisonOperator::GreaterThanUpperThreshold,
                "Anomaly detection: value is above the expected band.",
            )),
            (false, true) => Some((
                ComparisonOperator::LessThanLowerThreshold,
                "Anomaly detection: value is below the expected band.",
            )),
            (false, false) => None,
        }
    }
}

/// One metric of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomMetric {
    Plain {
        metric: MetricProps,
    },
    WithAlarm {
        metric: MetricProps,
        alarm_friendly_name: String,
        add_alarm: IndexMap<String, CustomThreshold>,
    },
    WithAnomalyDetection {
        metric: MetricProps,
        alarm_friendly_name: String,
        anomaly_detection_standard_deviation_to_render: f64,
        #[serde(default)]
        add_alarm_on_anomaly: IndexMap<String, AnomalyDetectionThreshold>,
    },
    Search {
        #[serde(default)]
        namespace: Option<String>,
        search_query: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        dimensions_map: BTreeMap<String, Option<String>>,
        #[serde(default = "default_statistic")]
        statistic: MetricStatistic,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetricGroup {
    pub title: String,
    #[serde(default)]
    pub important: Option<bool>,
    #[serde(default)]
    pub add_to_summary_dashboard: Option<bool>,
    #[serde(default)]
    pub graph_widget_width: Option<u32>,
    pub metrics: Vec<CustomMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMonitoringProps {
    #[serde(flatten)]
    pub base: BaseMonitoringProps,

    /// Markdown shown under the section header on the detail dashboard
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_widget_height: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub metric_groups: Vec<CustomMetricGroup>,
}

#[derive(Debug, Clone)]
struct AnnotatedGroup {
    title: String,
    width: Option<u32>,
    add_to_summary: bool,
    metrics: Vec<Metric>,
    annotations: Vec<Annotation>,
}

/// Graphs over user-supplied metric groups, with optional alarms and anomaly bands
#[derive(Debug, Clone)]
pub struct CustomMonitoring {
    title: String,
    description: Option<String>,
    description_widget_height: Option<u32>,
    height: Option<u32>,
    groups: Vec<AnnotatedGroup>,
    alarms: Vec<Arc<Alarm>>,
}

impl CustomMonitoring {
    pub fn new(scope: &mut MonitoringScope<'_>, props: CustomMonitoringProps) -> Result<Self> {
        let title = props.base.resolve_human_readable_name(None)?;
        let alarm_friendly_name = props.base.resolve_alarm_friendly_name(props.base.human_readable_name.as_deref())?;
        let factory = props.base.alarm_factory(scope.alarm_factory, &alarm_friendly_name);
        let summary_default = props.base.placement.add_to_summary_dashboard.unwrap_or(false);

        let mut monitoring = Self {
            title,
            description: props.description.clone(),
            description_widget_height: props.description_widget_height,
            height: props.height,
            groups: Vec::new(),
            alarms: Vec::new(),
        };

        for group in &props.metric_groups {
            let annotated = monitoring.build_group(scope, &factory, group, summary_default)?;
            monitoring.groups.push(annotated);
        }

        debug!(
            monitoring = %monitoring.title,
            groups = monitoring.groups.len(),
            alarms = monitoring.alarms.len(),
            "Built custom monitoring"
        );
        Ok(monitoring)
    }

    fn build_group(
        &mut self,
        scope: &mut MonitoringScope<'_>,
        factory: &AlarmFactory,
        group: &CustomMetricGroup,
        summary_default: bool,
    ) -> Result<AnnotatedGroup> {
        let mut annotated = AnnotatedGroup {
            title: group.title.clone(),
            width: group.graph_widget_width,
            add_to_summary: group
                .add_to_summary_dashboard
                .or(group.important)
                .unwrap_or(summary_default),
            metrics: Vec::new(),
            annotations: Vec::new(),
        };
        let mut alarm_std_devs: BTreeSet<String> = BTreeSet::new();

        for custom in &group.metrics {
            match custom {
                CustomMetric::Plain { metric } => {
                    annotated.metrics.push(metric.build(scope.metric_factory)?);
                }
                CustomMetric::WithAlarm {
                    metric,
                    alarm_friendly_name,
                    add_alarm,
                } => {
                    let metric = metric.build(scope.metric_factory)?;
                    for (disambiguator, threshold) in add_alarm {
                        let props = AddAlarmProps::new(
                            alarm_friendly_name.as_str(),
                            threshold.threshold,
                            threshold.comparison_operator,
                        )
                        .with_disambiguator(disambiguator.as_str())
                        .with_treat_missing_data(TreatMissingData::Missing);

                        let alarm = scope.add_alarm(factory, &metric, threshold.options.apply(props))?;
                        annotated.annotations.push(alarm.annotation.clone());
                        self.alarms.push(alarm);
                    }
                    annotated.metrics.push(metric);
                }
                CustomMetric::WithAnomalyDetection {
                    metric,
                    alarm_friendly_name,
                    anomaly_detection_standard_deviation_to_render,
                    add_alarm_on_anomaly,
                } => {
                    let metric = metric.build(scope.metric_factory)?;
                    for (disambiguator, threshold) in add_alarm_on_anomaly {
                        let (operator, default_description) =
                            threshold.operator_and_description().ok_or_else(|| {
                                VigilError::invalid_monitoring(
                                    alarm_friendly_name.clone(),
                                    "anomaly alarm must fire above the band, below the band, or both".to_string(),
                                )
                            })?;
                        let band = scope.metric_factory.create_metric_anomaly_detection(
                            metric.clone(),
                            threshold.standard_deviation_for_alarm,
                            &format!("Band (stdev {})", threshold.standard_deviation_for_alarm),
                        )?;
                        // band alarms compare against the band, the threshold is unused
                        let props = AddAlarmProps::new(alarm_friendly_name.as_str(), 0.0, operator)
                            .with_disambiguator(disambiguator.as_str())
                            .with_treat_missing_data(TreatMissingData::Missing)
                            .with_description(
                                threshold
                                    .additional_description
                                    .as_deref()
                                    .unwrap_or(default_description),
                            );

                        let alarm = scope.add_alarm(factory, &band, threshold.options.apply(props))?;
                        self.alarms.push(alarm);
                        alarm_std_devs.insert(threshold.standard_deviation_for_alarm.to_string());
                    }

                    let rendered = scope.metric_factory.create_metric_anomaly_detection(
                        metric.clone(),
                        *anomaly_detection_standard_deviation_to_render,
                        &format!("Expected (stdev = {})", anomaly_detection_standard_deviation_to_render),
                    )?;
                    annotated.metrics.push(metric);
                    annotated.metrics.push(rendered);
                }
                CustomMetric::Search {
                    namespace,
                    search_query,
                    label,
                    dimensions_map,
                    statistic,
                } => {
                    let search = scope.metric_factory.create_metric_search(
                        search_query,
                        dimensions_map,
                        *statistic,
                        namespace.as_deref(),
                        label.as_deref(),
                    )?;
                    annotated.metrics.push(search);
                }
            }
        }

        if !alarm_std_devs.is_empty() {
            let std_devs = alarm_std_devs.into_iter().collect::<Vec<_>>().join(", ");
            annotated.title = format!("{} (alarms with stdev {})", annotated.title, std_devs);
        }
        Ok(annotated)
    }

    fn all_widgets(&self, summary: bool) -> Vec<Arc<dyn Widget>> {
        let groups: Vec<&AnnotatedGroup> = self
            .groups
            .iter()
            .filter(|group| !summary || group.add_to_summary)
            .collect();
        if groups.is_empty() {
            return Vec::new();
        }

        let mut widgets: Vec<Arc<dyn Widget>> = vec![Arc::new(HeaderWidget::monitoring(None, &self.title, None))];
        if let (Some(description), false) = (&self.description, summary) {
            widgets.push(Arc::new(TextWidget::new(
                description.as_str(),
                FULL_WIDTH,
                self.description_widget_height.unwrap_or(1),
            )));
        }

        let default_height = if summary {
            DEFAULT_SUMMARY_WIDGET_HEIGHT
        } else {
            DEFAULT_GRAPH_WIDGET_HEIGHT
        };
        let height = self.height.unwrap_or(default_height);
        let recommended_width = recommended_widget_width(groups.len());

        let graphs = groups
            .iter()
            .map(|group| {
                let graph = group.metrics.iter().cloned().fold(
                    GraphWidget::new(group.title.as_str(), group.width.unwrap_or(recommended_width), height),
                    GraphWidget::metric,
                );
                Arc::new(graph.annotations(group.annotations.iter().cloned())) as Arc<dyn Widget>
            })
            .collect();
        widgets.push(Arc::new(Row::new(graphs)));
        widgets
    }
}

impl DashboardSegment for CustomMonitoring {
    fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        self.all_widgets(false)
    }

    fn summary_widgets(&self) -> Vec<Arc<dyn Widget>> {
        self.all_widgets(true)
    }

    fn alarm_widgets(&self) -> Vec<Arc<dyn Widget>> {
        alarm_widgets(&self.alarms)
    }
}

impl Monitoring for CustomMonitoring {
    fn title(&self) -> &str {
        &self.title
    }

    fn created_alarms(&self) -> &[Arc<Alarm>] {
        &self.alarms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{AlarmRegistry, InMemoryBackend, VigilConfig};

    const PROPS: &str = r#"
alarm_friendly_name: Checkout
human_readable_name: Checkout service
description: "Business metrics of the checkout flow"
metric_groups:
  - title: Orders
    important: true
    metrics:
      - kind: with_alarm
        alarm_friendly_name: LowOrders
        metric:
          namespace: Checkout
          metric_name: OrdersPlaced
          statistic: Sum
        add_alarm:
          Critical:
            threshold: 10
            comparison_operator: LessThanThreshold
  - title: Traffic
    metrics:
      - kind: with_anomaly_detection
        alarm_friendly_name: TrafficAnomaly
        anomaly_detection_standard_deviation_to_render: 3
        metric:
          namespace: Checkout
          metric_name: Requests
        add_alarm_on_anomaly:
          Warning:
            standard_deviation_for_alarm: 2
            alarm_when_above_the_band: true
      - kind: search
        namespace: Checkout
        search_query: Requests
        dimensions_map:
          Region: ~
"#;

    #[test]
    fn test_groups_alarms_and_summary_filter() {
        let config = VigilConfig::default();
        let global = AlarmFactory::new(config.alarms.clone(), &config.limits);
        let metrics = MetricFactory::new(config.metrics.clone());
        let mut registry = AlarmRegistry::new();
        let mut backend = InMemoryBackend::new(config.limits);
        let mut scope = MonitoringScope {
            alarm_factory: &global,
            metric_factory: &metrics,
            registry: &mut registry,
            backend: &mut backend,
        };

        let props: CustomMonitoringProps = serde_yaml::from_str(PROPS).unwrap();
        let monitoring = CustomMonitoring::new(&mut scope, props).unwrap();

        let alarms = monitoring.created_alarms();
        assert_eq!(alarms.len(), 2);
        assert_eq!(alarms[0].name, "Vigil-Checkout-Critical-LowOrders");
        assert_eq!(alarms[1].comparison_operator, ComparisonOperator::GreaterThanUpperThreshold);
        assert!(alarms[1].metric.is_anomaly_band());

        assert_eq!(monitoring.groups[1].title, "Traffic (alarms with stdev 2)");
        assert_eq!(monitoring.groups[1].metrics.len(), 3);

        // header, description, graphs
        assert_eq!(monitoring.widgets().len(), 3);
        // only the important group, no description
        let summary = monitoring.summary_widgets();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[1].widget_count(), 1);
    }

    #[test]
    fn test_anomaly_alarm_needs_a_direction() {
        let config = VigilConfig::default();
        let global = AlarmFactory::new(config.alarms.clone(), &config.limits);
        let metrics = MetricFactory::new(config.metrics.clone());
        let mut registry = AlarmRegistry::new();
        let mut backend = InMemoryBackend::new(config.limits);
        let mut scope = MonitoringScope {
            alarm_factory: &global,
            metric_factory: &metrics,
            registry: &mut registry,
            backend: &mut backend,
        };

        let mut props: CustomMonitoringProps = serde_yaml::from_str(PROPS).unwrap();
        if let CustomMetric::WithAnomalyDetection { add_alarm_on_anomaly, .. } = &mut props.metric_groups[1].metrics[0] {
            for threshold in add_alarm_on_anomaly.values_mut() {
                threshold.alarm_when_above_the_band = false;
            }
        }

        let err = CustomMonitoring::new(&mut scope, props).unwrap_err();
        assert_eq!(err.category(), "monitoring");
    }
}
