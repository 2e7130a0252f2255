//! SQS queue monitoring

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use vigil_core::alarm::Annotation;
use vigil_core::{AddAlarmProps, Alarm, AlarmFactory, ComparisonOperator, Metric, MetricStatistic, Result, TreatMissingData};
use vigil_dashboard::widget::{DEFAULT_GRAPH_WIDGET_HEIGHT, DEFAULT_SUMMARY_WIDGET_HEIGHT, HALF_WIDTH, THIRD_WIDTH};
use vigil_dashboard::{DashboardSegment, GraphWidget, HeaderWidget, Row, Widget};

use super::{alarm_widgets, BaseMonitoringProps, Monitoring, MonitoringScope, ThresholdProps};

const NAMESPACE: &str = "AWS/SQS";
const FAMILY: &str = "SQS Queue";
const MESSAGE_COUNT_DEDUPE: &str = "AnyQueueMessageCount";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqsQueueMonitoringProps {
    pub queue_name: String,

    /// Link target of the section header
    #[serde(default)]
    pub queue_url: Option<String>,

    #[serde(flatten)]
    pub base: BaseMonitoringProps,

    /// Thresholds keyed by disambiguator
    #[serde(default)]
    pub add_queue_min_size_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_queue_max_size_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_queue_max_message_age_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_queue_max_time_to_drain_messages_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_queue_min_incoming_messages_alarm: IndexMap<String, ThresholdProps>,
    #[serde(default)]
    pub add_queue_max_incoming_messages_alarm: IndexMap<String, ThresholdProps>,
}

impl SqsQueueMonitoringProps {
    pub fn new<S: Into<String>>(queue_name: S) -> Self {
        Self {
            queue_name: queue_name.into(),
            queue_url: None,
            base: BaseMonitoringProps::default(),
            add_queue_min_size_alarm: IndexMap::new(),
            add_queue_max_size_alarm: IndexMap::new(),
            add_queue_max_message_age_alarm: IndexMap::new(),
            add_queue_max_time_to_drain_messages_alarm: IndexMap::new(),
            add_queue_min_incoming_messages_alarm: IndexMap::new(),
            add_queue_max_incoming_messages_alarm: IndexMap::new(),
        }
    }
}

/// Queue metrics used by the widgets and alarms
#[derive(Debug, Clone)]
struct QueueMetrics {
    visible: Metric,
    incoming: Metric,
    deleted: Metric,
    oldest_age: Metric,
    message_size: Metric,
    production_rate: Metric,
    consumption_rate: Metric,
    time_to_drain: Metric,
}

impl QueueMetrics {
    fn new(scope: &MonitoringScope<'_>, queue_name: &str) -> Result<Self> {
        let factory = scope.metric_factory;
        let metric = |name: &str, statistic: MetricStatistic, label: &str| -> Result<Metric> {
            Ok(factory
                .create_metric(Some(NAMESPACE), name, statistic, label)?
                .with_dimension("QueueName", queue_name))
        };

        let visible = metric("ApproximateNumberOfMessagesVisible", MetricStatistic::Maximum, "Visible")?;
        let incoming = metric("NumberOfMessagesSent", MetricStatistic::Sum, "Incoming")?;
        let deleted = metric("NumberOfMessagesDeleted", MetricStatistic::Sum, "Deleted")?;
        let oldest_age = metric("ApproximateAgeOfOldestMessage", MetricStatistic::Maximum, "Age")?;
        let message_size = metric("SentMessageSize", MetricStatistic::Average, "Size")?;

        let production_rate = factory.create_metric_math(
            "(productionVolume / PERIOD(productionVolume))",
            BTreeMap::from([("productionVolume".to_string(), incoming.clone())]),
            "Production TPS (avg: ${AVG}, max: ${MAX})",
        )?;
        let consumption_rate = factory.create_metric_math(
            "(consumptionVolume / PERIOD(consumptionVolume))",
            BTreeMap::from([("consumptionVolume".to_string(), deleted.clone())]),
            "Consumption TPS (avg: ${AVG}, max: ${MAX})",
        )?;
        let time_to_drain = factory.create_metric_math(
            "(visibleMessages / (consumptionVolume - incomingVolume)) * (PERIOD(consumptionVolume))",
            BTreeMap::from([
                ("visibleMessages".to_string(), visible.clone()),
                ("incomingVolume".to_string(), incoming.clone()),
                ("consumptionVolume".to_string(), deleted.clone()),
            ]),
            "Time to Drain (seconds) (avg: ${AVG}, max: ${MAX})",
        )?;

        Ok(Self {
            visible,
            incoming,
            deleted,
            oldest_age,
            message_size,
            production_rate,
            consumption_rate,
            time_to_drain,
        })
    }
}

/// Message counts, age, size, throughput and time to drain of one queue
#[derive(Debug, Clone)]
pub struct SqsQueueMonitoring {
    title: String,
    queue_url: Option<String>,
    metrics: QueueMetrics,
    count_annotations: Vec<Annotation>,
    age_annotations: Vec<Annotation>,
    time_to_drain_annotations: Vec<Annotation>,
    alarms: Vec<Arc<Alarm>>,
}

struct QueueAlarm<'a> {
    local_name: &'static str,
    operator: ComparisonOperator,
    description: &'static str,
    dedupe_suffix: Option<&'static str>,
    thresholds: &'a IndexMap<String, ThresholdProps>,
}

impl SqsQueueMonitoring {
    pub fn new(scope: &mut MonitoringScope<'_>, props: SqsQueueMonitoringProps) -> Result<Self> {
        let alarm_friendly_name = props.base.resolve_alarm_friendly_name(Some(&props.queue_name))?;
        let title = props.base.resolve_human_readable_name(Some(&props.queue_name))?;
        let factory = props.base.alarm_factory(scope.alarm_factory, &alarm_friendly_name);
        let metrics = QueueMetrics::new(scope, &props.queue_name)?;

        let mut monitoring = Self {
            title,
            queue_url: props.queue_url.clone(),
            metrics,
            count_annotations: Vec::new(),
            age_annotations: Vec::new(),
            time_to_drain_annotations: Vec::new(),
            alarms: Vec::new(),
        };

        let count_alarms = [
            QueueAlarm {
                local_name: "Queue-Message-Count-Min",
                operator: ComparisonOperator::LessThanThreshold,
                description: "Number of messages in the queue is too low.",
                dedupe_suffix: Some(MESSAGE_COUNT_DEDUPE),
                thresholds: &props.add_queue_min_size_alarm,
            },
            QueueAlarm {
                local_name: "Queue-Message-Count-Max",
                operator: ComparisonOperator::GreaterThanThreshold,
                description: "Number of messages in the queue is too high.",
                dedupe_suffix: Some(MESSAGE_COUNT_DEDUPE),
                thresholds: &props.add_queue_max_size_alarm,
            },
        ];
        let visible = monitoring.metrics.visible.clone();
        for request in &count_alarms {
            let annotations = monitoring.add_alarms(scope, &factory, &visible, request)?;
            monitoring.count_annotations.extend(annotations);
        }

        let age_alarm = QueueAlarm {
            local_name: "Queue-Message-Age-Max",
            operator: ComparisonOperator::GreaterThanThreshold,
            description: "Age of the oldest message in the queue is too high.",
            dedupe_suffix: None,
            thresholds: &props.add_queue_max_message_age_alarm,
        };
        let oldest_age = monitoring.metrics.oldest_age.clone();
        let annotations = monitoring.add_alarms(scope, &factory, &oldest_age, &age_alarm)?;
        monitoring.age_annotations.extend(annotations);

        let drain_alarm = QueueAlarm {
            local_name: "Queue-TimeToDrain-Max",
            operator: ComparisonOperator::GreaterThanThreshold,
            description: "Time to drain messages in the queue is too high.",
            dedupe_suffix: None,
            thresholds: &props.add_queue_max_time_to_drain_messages_alarm,
        };
        let time_to_drain = monitoring.metrics.time_to_drain.clone();
        let annotations = monitoring.add_alarms(scope, &factory, &time_to_drain, &drain_alarm)?;
        monitoring.time_to_drain_annotations.extend(annotations);

        let incoming_alarms = [
            QueueAlarm {
                local_name: "Queue-Incoming-Messages-Count-Min",
                operator: ComparisonOperator::LessThanThreshold,
                description: "Number of incoming messages into the queue is too low.",
                dedupe_suffix: None,
                thresholds: &props.add_queue_min_incoming_messages_alarm,
            },
            QueueAlarm {
                local_name: "Queue-Incoming-Messages-Count-Max",
                operator: ComparisonOperator::GreaterThanThreshold,
                description: "Number of incoming messages into the queue is too high.",
                dedupe_suffix: None,
                thresholds: &props.add_queue_max_incoming_messages_alarm,
            },
        ];
        let incoming = monitoring.metrics.incoming.clone();
        for request in &incoming_alarms {
            let annotations = monitoring.add_alarms(scope, &factory, &incoming, request)?;
            monitoring.count_annotations.extend(annotations);
        }

        debug!(queue = %props.queue_name, alarms = monitoring.alarms.len(), "Built SQS queue monitoring");
        Ok(monitoring)
    }

    fn add_alarms(
        &mut self,
        scope: &mut MonitoringScope<'_>,
        factory: &AlarmFactory,
        metric: &Metric,
        request: &QueueAlarm<'_>,
    ) -> Result<Vec<Annotation>> {
        let mut annotations = Vec::new();
        for (disambiguator, threshold) in request.thresholds {
            let mut props = AddAlarmProps::new(request.local_name, threshold.threshold, request.operator)
                .with_disambiguator(disambiguator.as_str())
                .with_treat_missing_data(TreatMissingData::Missing)
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
        Arc::new(HeaderWidget::monitoring(Some(FAMILY), &self.title, self.queue_url.as_deref()))
    }

    fn message_count_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Message Count", width, height)
                .metric(self.metrics.visible.clone())
                .metric(self.metrics.incoming.clone())
                .annotations(self.count_annotations.iter().cloned()),
        )
    }

    fn message_age_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Oldest Message Age", width, height)
                .metric(self.metrics.oldest_age.clone())
                .annotations(self.age_annotations.iter().cloned()),
        )
    }

    fn message_size_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(GraphWidget::new("Message Size", width, height).metric(self.metrics.message_size.clone()))
    }

    fn producer_and_consumer_rate_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Producer vs Consumer (rate)", width, height)
                .metric(self.metrics.production_rate.clone())
                .metric(self.metrics.consumption_rate.clone()),
        )
    }

    fn time_to_drain_widget(&self, width: u32, height: u32) -> Arc<dyn Widget> {
        Arc::new(
            GraphWidget::new("Time to drain", width, height)
                .metric(self.metrics.time_to_drain.clone())
                .annotations(self.time_to_drain_annotations.iter().cloned()),
        )
    }

    pub fn deleted_messages_metric(&self) -> &Metric {
        &self.metrics.deleted
    }
}

impl DashboardSegment for SqsQueueMonitoring {
    fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        let height = DEFAULT_GRAPH_WIDGET_HEIGHT;
        vec![
            self.title_widget(),
            Arc::new(Row::new(vec![
                self.message_count_widget(THIRD_WIDTH, height),
                self.message_age_widget(THIRD_WIDTH, height),
                self.message_size_widget(THIRD_WIDTH, height),
            ])),
            Arc::new(Row::new(vec![
                self.producer_and_consumer_rate_widget(HALF_WIDTH, height),
                self.time_to_drain_widget(HALF_WIDTH, height),
            ])),
        ]
    }

    fn summary_widgets(&self) -> Vec<Arc<dyn Widget>> {
        let height = DEFAULT_SUMMARY_WIDGET_HEIGHT;
        vec![
            self.title_widget(),
            Arc::new(Row::new(vec![
                self.producer_and_consumer_rate_widget(HALF_WIDTH, height),
                self.time_to_drain_widget(HALF_WIDTH, height),
            ])),
            Arc::new(Row::new(vec![
                self.message_count_widget(HALF_WIDTH, height),
                self.message_age_widget(HALF_WIDTH, height),
            ])),
        ]
    }

    fn alarm_widgets(&self) -> Vec<Arc<dyn Widget>> {
        alarm_widgets(&self.alarms)
    }
}

impl Monitoring for SqsQueueMonitoring {
    fn title(&self) -> &str {
        &self.title
    }

    fn created_alarms(&self) -> &[Arc<Alarm>] {
        &self.alarms
    }
}
