//! Lambda function monitoring

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use vigil_core::alarm::Annotation;
use vigil_core::{
    AddAlarmProps, Alarm, AlarmFactory, ComparisonOperator, Metric, MetricStatistic, RateComputationMethod, Result,
    TreatMissingData,
};
use vigil_dashboard::widget::{
    DEFAULT_GRAPH_WIDGET_HEIGHT, DEFAULT_SUMMARY_WIDGET_HEIGHT, QUARTER_WIDTH, THIRD_WIDTH,
};
use vigil_dashboard::{DashboardSegment, GraphWidget, HeaderWidget, Row, Widget};

use super::{alarm_widgets, BaseMonitoringProps, Monitoring, MonitoringScope, ThresholdProps};

const NAMESPACE: &str = "AWS/Lambda";
const FAMILY: &str = "Lambda Function";
const LATENCY_DEDUPE: &str = "AnyLatency";
const ERROR_DEDUPE: &str = "AnyError";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaFunctionMonitoringProps {
    pub function_name: String,

    #[serde(default)]
    pub function_url: Option<String>,

    #[serde(flatten)]
    pub base: BaseMonitoringProps,

    /// Latency thresholds in milliseconds, keyed by disambiguator
    #[serde(default)]
    pub add_latency_p50_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_latency_p90_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_latency_p99_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_fault_count_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_fault_rate_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_low_tps_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_high_tps_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_throttles_count_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_throttles_rate_alarm: IndexMap<String, ThresholdProps>,
}

impl LambdaFunctionMonitoringProps {
    pub fn new<S: Into<String>>(function_name: S) -> Self {
        Self {
            function_name: function_name.into(),
            function_url: None,
            base: BaseMonitoringProps::default(),
            add_latency_p50_alarm: IndexMap::new(),
            add_latency_p90_alarm: IndexMap::new(),
            add_latency_p99_alarm: IndexMap::new(),
            add_fault_count_alarm: IndexMap::new(),
            add_fault_rate_alarm: IndexMap::new(),
            add_low_tps_alarm: IndexMap::new(),
            add_high_tps_alarm: IndexMap::new(),
            add_throttles_count_alarm: IndexMap::new(),
            add_throttles_rate_alarm: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct FunctionMetrics {
    invocations: Metric,
    tps: Metric,
    faults: Metric,
    fault_rate: Metric,
    throttles: Metric,
    throttles_rate: Metric,
    latency_p50: Metric,
    latency_p90: Metric,
    latency_p99: Metric,
    iterator_age: Metric,
}

impl FunctionMetrics {
    fn new(scope: &MonitoringScope<'_>, function_name: &str) -> Result<Self> {
        let factory = scope.metric_factory;
        let metric = |name: &str, statistic: MetricStatistic, label: &str| -> Result<Metric> {
            Ok(factory
                .create_metric(Some(NAMESPACE), name, statistic, label)?
                .with_dimension("FunctionName", function_name))
        };

        let invocations = metric("Invocations", MetricStatistic::Sum, "Invocations")?;
        let faults = metric("Errors", MetricStatistic::Sum, "Faults")?;
        let throttles = metric("Throttles", MetricStatistic::Sum, "Throttles")?;

        Ok(Self {
            tps: factory.to_rate(invocations.clone(), RateComputationMethod::PerSecond, true, false)?,
            fault_rate: factory.to_rate(faults.clone(), RateComputationMethod::Average, false, false)?,
            throttles_rate: factory.to_rate(throttles.clone(), RateComputationMethod::Average, false, false)?,
            latency_p50: metric("Duration", MetricStatistic::P50, "P50 (avg: ${AVG})")?,
            latency_p90: metric("Duration", MetricStatistic::P90, "P90 (avg: ${AVG})")?,
            latency_p99: metric("Duration", MetricStatistic::P99, "P99 (avg: ${AVG})")?,
            iterator_age: metric("IteratorAge", MetricStatistic::Maximum, "Iterator Age")?,
            invocations,
            faults,
            throttles,
        })
    }
}

/// Throughput, latency, faults and throttling of one function
#[derive(Debug, Clone)]
pub struct LambdaFunctionMonitoring {
    title: String,
    function_url: Option<String>,
    metrics: FunctionMetrics,
    tps_annotations: Vec<Annotation>,
    latency_annotations: Vec<Annotation>,
    error_count_annotations: Vec<Annotation>,
    error_rate_annotations: Vec<Annotation>,
    invocation_count_annotations: Vec<Annotation>,
    invocation_rate_annotations: Vec<Annotation>,
    alarms: Vec<Arc<Alarm>>,
}

struct FunctionAlarm {
    local_name: &'static str,
    operator: ComparisonOperator,
    treat_missing_data: TreatMissingData,
    dedupe_suffix: Option<&'static str>,
    description: &'static str,
}

impl LambdaFunctionMonitoring {
    pub fn new(scope: &mut MonitoringScope<'_>, props: LambdaFunctionMonitoringProps) -> Result<Self> {
        let alarm_friendly_name = props.base.resolve_alarm_friendly_name(Some(&props.function_name))?;
        let title = props.base.resolve_human_readable_name(Some(&props.function_name))?;
        let factory = props.base.alarm_factory(scope.alarm_factory, &alarm_friendly_name);
        let metrics = FunctionMetrics::new(scope, &props.function_name)?;
        let latency_dedupe = factory.defaults().use_default_dedupe_for_latency.then_some(LATENCY_DEDUPE);
        let error_dedupe = factory.defaults().use_default_dedupe_for_error.then_some(ERROR_DEDUPE);

        let mut monitoring = Self {
            title,
            function_url: props.function_url.clone(),
            metrics: metrics.clone(),
            tps_annotations: Vec::new(),
            latency_annotations: Vec::new(),
            error_count_annotations: Vec::new(),
            error_rate_annotations: Vec::new(),
            invocation_count_annotations: Vec::new(),
            invocation_rate_annotations: Vec::new(),
            alarms: Vec::new(),
        };

        for (local_name, description, metric, thresholds) in [
            ("Latency-P50", "P50 latency is too high.", &metrics.latency_p50, &props.add_latency_p50_alarm),
            ("Latency-P90", "P90 latency is too high.", &metrics.latency_p90, &props.add_latency_p90_alarm),
            ("Latency-P99", "P99 latency is too high.", &metrics.latency_p99, &props.add_latency_p99_alarm),
        ] {
            let request = FunctionAlarm {
                local_name,
                operator: ComparisonOperator::GreaterThanThreshold,
                treat_missing_data: TreatMissingData::NotBreaching,
                dedupe_suffix: latency_dedupe,
                description,
            };
            let annotations = monitoring.add_alarms(scope, &factory, metric, &request, thresholds)?;
            monitoring.latency_annotations.extend(annotations);
        }

        let fault_count = FunctionAlarm {
            local_name: "Fault-Count",
            operator: ComparisonOperator::GreaterThanThreshold,
            treat_missing_data: TreatMissingData::NotBreaching,
            dedupe_suffix: error_dedupe,
            description: "Fault count is too high.",
        };
        let annotations = monitoring.add_alarms(scope, &factory, &metrics.faults, &fault_count, &props.add_fault_count_alarm)?;
        monitoring.error_count_annotations.extend(annotations);

        let fault_rate = FunctionAlarm {
            local_name: "Fault-Rate",
            description: "Fault rate is too high.",
            ..fault_count
        };
        let annotations =
            monitoring.add_alarms(scope, &factory, &metrics.fault_rate, &fault_rate, &props.add_fault_rate_alarm)?;
        monitoring.error_rate_annotations.extend(annotations);

        let low_tps = FunctionAlarm {
            local_name: "MinTPS",
            operator: ComparisonOperator::LessThanThreshold,
            treat_missing_data: TreatMissingData::Missing,
            dedupe_suffix: Some("Tps-Min"),
            description: "TPS is too low.",
        };
        let annotations = monitoring.add_alarms(scope, &factory, &metrics.tps, &low_tps, &props.add_low_tps_alarm)?;
        monitoring.tps_annotations.extend(annotations);

        let high_tps = FunctionAlarm {
            local_name: "MaxTPS",
            operator: ComparisonOperator::GreaterThanThreshold,
            treat_missing_data: TreatMissingData::Missing,
            dedupe_suffix: Some("Tps-Max"),
            description: "TPS is too high.",
        };
        let annotations = monitoring.add_alarms(scope, &factory, &metrics.tps, &high_tps, &props.add_high_tps_alarm)?;
        monitoring.tps_annotations.extend(annotations);

        let throttles_count = FunctionAlarm {
            local_name: "Throttled-Count",
            operator: ComparisonOperator::GreaterThanThreshold,
            treat_missing_data: TreatMissingData::NotBreaching,
            dedupe_suffix: error_dedupe,
            description: "Throttled count is too high.",
        };
        let annotations = monitoring.add_alarms(
            scope,
            &factory,
            &metrics.throttles,
            &throttles_count,
            &props.add_throttles_count_alarm,
        )?;
        monitoring.invocation_count_annotations.extend(annotations);

        let throttles_rate = FunctionAlarm {
            local_name: "Throttled-Rate",
            description: "Throttled rate is too high.",
            ..throttles_count
        };
        let annotations = monitoring.add_alarms(
            scope,
            &factory,
            &metrics.throttles_rate,
            &throttles_rate,
            &props.add_throttles_rate_alarm,
        )?;
        monitoring.invocation_rate_annotations.extend(annotations);

        debug!(function = %props.function_name, alarms = monitoring.alarms.len(), "Built Lambda function monitoring");
        Ok(monitoring)
    }

    fn add_alarms(
        &mut self,
        scope: &mut MonitoringScope<'_>,
        factory: &AlarmFactory,
        metric: &Metric,
        request: &FunctionAlarm,
        thresholds: &IndexMap<String, ThresholdProps>,
    ) -> Result<Vec<Annotation>> {
        let mut annotations = Vec::new();
        for (disambiguator, threshold) in thresholds {
            let mut props = AddAlarmProps::new(request.local_name, threshold.threshold, request.operator)
                .with_disambiguator(disambiguator.as_str())
                .with_treat_missing_data(request.treat_missing_data)
                .with_description(request.description);
            if let Some(suffix) = request.dedupe_suffix {
                props = props.with_dedupe_suffix(suffix);
            }

            let alarm = scope.add_alarm(factory, metric, threshold.options.apply(props))?;
            annotations.push(alarm.annotation.clone());
            self.alarms.push(alarm);
        }
        Ok(annotations)
    }

    fn title_widget(&self) -> Arc<dyn Widget> {
        Arc::new(HeaderWidget::monitoring(Some(FAMILY), &self.title, self.function_url.as_deref()))
    }

    fn tps_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("TPS", width, height)
                .metric(self.metrics.tps.clone())
                .annotations(self.tps_annotations.iter().cloned()),
        )
    }

    fn latency_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Latency", width, height)
                .metric(self.metrics.latency_p50.clone())
                .metric(self.metrics.latency_p90.clone())
                .metric(self.metrics.latency_p99.clone())
                .annotations(self.latency_annotations.iter().cloned()),
        )
    }

    fn error_count_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Errors", width, height)
                .metric(self.metrics.faults.clone())
                .annotations(self.error_count_annotations.iter().cloned()),
        )
    }

    fn error_rate_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Errors (rate)", width, height)
                .metric(self.metrics.fault_rate.clone())
                .annotations(self.error_rate_annotations.iter().cloned()),
        )
    }

    fn rate_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Rates", width, height)
                .metric(self.metrics.throttles_rate.clone())
                .annotations(self.invocation_rate_annotations.iter().cloned()),
        )
    }

    fn invocation_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Invocations", width, height)
                .metric(self.metrics.invocations.clone())
                .metric(self.metrics.throttles.clone())
                .annotations(self.invocation_count_annotations.iter().cloned()),
        )
    }

    fn iterator_age_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(GraphWidget::new("Iterator", width, height).metric(self.metrics.iterator_age.clone()))
    }
}

impl DashboardSegment for LambdaFunctionMonitoring {
    fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        let height = DEFAULT_GRAPH_WIDGET_HEIGHT;
        vec![
            self.title_widget(),
            Arc::new(Row::new(vec![
                self.tps_widget(QUARTER_WIDTH, height),
                self.latency_widget(QUARTER_WIDTH, height),
                self.error_rate_widget(QUARTER_WIDTH, height),
                self.rate_widget(QUARTER_WIDTH, height),
            ])),
            Arc::new(Row::new(vec![
                self.invocation_widget(THIRD_WIDTH, height),
                self.iterator_age_widget(THIRD_WIDTH, height),
                self.error_count_widget(THIRD_WIDTH, height),
            ])),
        ]
    }

    fn summary_widgets(&self) -> Vec<Arc<dyn Widget>> {
        let height = DEFAULT_SUMMARY_WIDGET_HEIGHT;
        vec![
            self.title_widget(),
            self.tps_widget(THIRD_WIDTH, height),
            self.latency_widget(THIRD_WIDTH, height),
            self.error_rate_widget(THIRD_WIDTH, height),
        ]
    }

    fn alarm_widgets(&self) -> Vec<Arc<dyn Widget>> {
        alarm_widgets(&self.alarms)
    }
}

impl Monitoring for LambdaFunctionMonitoring {
    fn title(&self) -> &str {
        &self.title
    }

    fn created_alarms(&self) -> &[Arc<Alarm>] {
        &self.alarms
    }
}
