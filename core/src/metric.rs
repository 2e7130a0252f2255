//! Metric references and the factory that builds them

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::MetricFactoryDefaults;
use crate::strings::remove_brackets_with_dynamic_labels;
use crate::{Result, VigilError};

/// Default metric period, five minutes
pub const DEFAULT_METRIC_PERIOD_SECONDS: u64 = 300;

const DEFAULT_EXPRESSION_ID: &str = "m1";

static EXPRESSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-zA-Z0-9_]*$").expect("static regex"));

/// Metric statistics understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricStatistic {
    #[serde(rename = "Average")]
    Average,
    #[serde(rename = "Sum")]
    Sum,
    #[serde(rename = "Minimum")]
    Minimum,
    #[serde(rename = "Maximum")]
    Maximum,
    #[serde(rename = "SampleCount")]
    SampleCount,
    #[serde(rename = "p50")]
    P50,
    #[serde(rename = "p90")]
    P90,
    #[serde(rename = "p95")]
    P95,
    #[serde(rename = "p99")]
    P99,
    #[serde(rename = "p99.9")]
    P999,
    #[serde(rename = "p100")]
    P100,
    #[serde(rename = "tm99")]
    Tm99,
}

impl MetricStatistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricStatistic::Average => "Average",
            MetricStatistic::Sum => "Sum",
            MetricStatistic::Minimum => "Minimum",
            MetricStatistic::Maximum => "Maximum",
            MetricStatistic::SampleCount => "SampleCount",
            MetricStatistic::P50 => "p50",
            MetricStatistic::P90 => "p90",
            MetricStatistic::P95 => "p95",
            MetricStatistic::P99 => "p99",
            MetricStatistic::P999 => "p99.9",
            MetricStatistic::P100 => "p100",
            MetricStatistic::Tm99 => "tm99",
        }
    }
}

impl std::fmt::Display for MetricStatistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a count metric is turned into a rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateComputationMethod {
    Average,
    PerSecond,
    PerMinute,
    PerHour,
    PerDay,
}

/// Where the metric's datapoints come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricSource {
    Raw {
        namespace: String,
        metric_name: String,
        statistic: MetricStatistic,
        dimensions: BTreeMap<String, String>,
    },
    Math {
        expression: String,
        using: BTreeMap<String, Metric>,
    },
    Search {
        expression: String,
    },
    AnomalyBand {
        expression: String,
        base: Box<Metric>,
        std_dev: f64,
    },
}

/// A metric reference as consumed by alarms and graph widgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub source: MetricSource,
    pub label: String,
    pub period_seconds: u64,
    pub color: Option<String>,
    pub unit: Option<String>,
}

impl Metric {
    pub fn with_dimension<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        if let MetricSource::Raw { dimensions, .. } = &mut self.source {
            dimensions.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_color<S: Into<String>>(mut self, color: S) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_period(mut self, period_seconds: u64) -> Self {
        self.period_seconds = period_seconds;
        self
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }

    /// Label without dynamic-label brackets, used in alarm names and descriptions
    pub fn plain_label(&self) -> String {
        remove_brackets_with_dynamic_labels(&self.label)
    }

    pub fn is_anomaly_band(&self) -> bool {
        matches!(self.source, MetricSource::AnomalyBand { .. })
    }

    /// Expression text for math, search and anomaly band metrics
    pub fn expression(&self) -> Option<&str> {
        match &self.source {
            MetricSource::Raw { .. } => None,
            MetricSource::Math { expression, .. }
            | MetricSource::Search { expression }
            | MetricSource::AnomalyBand { expression, .. } => Some(expression),
        }
    }
}

/// Builds metrics using the configured defaults
#[derive(Debug, Clone, Default)]
pub struct MetricFactory {
    defaults: MetricFactoryDefaults,
}

impl MetricFactory {
    pub fn new(defaults: MetricFactoryDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &MetricFactoryDefaults {
        &self.defaults
    }

    fn period(&self) -> u64 {
        self.defaults
            .period_seconds
            .unwrap_or(DEFAULT_METRIC_PERIOD_SECONDS)
    }

    /// Namespace passed in, or the configured default namespace
    pub fn namespace_with_fallback(&self, namespace: Option<&str>) -> Result<String> {
        namespace
            .map(str::to_string)
            .or_else(|| self.defaults.namespace.clone())
            .ok_or_else(|| {
                VigilError::invalid_metric(
                    "<namespace>",
                    "no namespace given and no default namespace configured",
                )
            })
    }

    pub fn create_metric(
        &self,
        namespace: Option<&str>,
        metric_name: &str,
        statistic: MetricStatistic,
        label: &str,
    ) -> Result<Metric> {
        if metric_name.trim().is_empty() {
            return Err(VigilError::invalid_metric(label, "metric name must not be empty"));
        }
        let namespace = self.namespace_with_fallback(namespace)?;

        Ok(Metric {
            source: MetricSource::Raw {
                namespace,
                metric_name: metric_name.to_string(),
                statistic,
                dimensions: BTreeMap::new(),
            },
            label: label.to_string(),
            period_seconds: self.period(),
            color: None,
            unit: None,
        })
    }

    pub fn create_metric_math(
        &self,
        expression: &str,
        using: BTreeMap<String, Metric>,
        label: &str,
    ) -> Result<Metric> {
        if expression.trim().is_empty() {
            return Err(VigilError::invalid_metric(label, "math expression must not be empty"));
        }
        for id in using.keys() {
            if !EXPRESSION_ID.is_match(id) {
                return Err(VigilError::invalid_metric(
                    label.to_string(),
                    format!("invalid expression id '{}'", id),
                ));
            }
        }
        let period = using
            .values()
            .map(|metric| metric.period_seconds)
            .max()
            .unwrap_or_else(|| self.period());

        Ok(Metric {
            source: MetricSource::Math {
                expression: expression.to_string(),
                using,
            },
            label: label.to_string(),
            period_seconds: period,
            color: None,
            unit: None,
        })
    }

    /// Search expression over all metrics of a namespace with the given dimension keys.
    /// Dimensions with a value are narrowed to that value.
    pub fn create_metric_search(
        &self,
        query: &str,
        dimensions: &BTreeMap<String, Option<String>>,
        statistic: MetricStatistic,
        namespace: Option<&str>,
        label: Option<&str>,
    ) -> Result<Metric> {
        let namespace = self.namespace_with_fallback(namespace)?;
        let period = self.period();

        let schema = std::iter::once(namespace.as_str())
            .chain(dimensions.keys().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",");
        let narrowed = dimensions
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| format!("{}=\"{}\"", key, v)))
            .collect::<Vec<_>>()
            .join(" ");

        let expression = format!(
            "SEARCH('{{{}}} {} {}', '{}', {})",
            schema, narrowed, query, statistic, period
        );

        Ok(Metric {
            source: MetricSource::Search { expression },
            // label cannot be empty
            label: label.unwrap_or(" ").to_string(),
            period_seconds: period,
            color: None,
            unit: None,
        })
    }

    /// Anomaly detection band around `metric`, `std_dev` standard deviations wide
    pub fn create_metric_anomaly_detection(
        &self,
        metric: Metric,
        std_dev: f64,
        label: &str,
    ) -> Result<Metric> {
        if !std_dev.is_finite() || std_dev <= 0.0 {
            return Err(VigilError::invalid_metric(
                label.to_string(),
                format!("standard deviation must be positive, got {}", std_dev),
            ));
        }
        let period = metric.period_seconds;

        Ok(Metric {
            source: MetricSource::AnomalyBand {
                expression: format!("ANOMALY_DETECTION_BAND({},{})", DEFAULT_EXPRESSION_ID, std_dev),
                base: Box::new(metric),
                std_dev,
            },
            label: label.to_string(),
            period_seconds: period,
            color: None,
            unit: None,
        })
    }

    /// Turn a count metric into a rate
    pub fn to_rate(
        &self,
        metric: Metric,
        method: RateComputationMethod,
        add_stats_to_label: bool,
        fill_with_zeroes: bool,
    ) -> Result<Metric> {
        let id = DEFAULT_EXPRESSION_ID;
        let label_prefix = if metric.label.trim().is_empty() {
            "Rate".to_string()
        } else {
            metric.label.clone()
        };

        let mut stats = Vec::new();
        if add_stats_to_label {
            stats.push("min: ${MIN}");
            stats.push("max: ${MAX}");
            if method != RateComputationMethod::Average {
                stats.push("avg: ${AVG}");
            }
        }
        let appendix = if stats.is_empty() {
            String::new()
        } else {
            format!(" ({})", stats.join(", "))
        };
        let value = if fill_with_zeroes {
            format!("FILL({},0)", id)
        } else {
            id.to_string()
        };
        let color = metric.color.clone();

        let (expression, label) = match method {
            RateComputationMethod::Average => {
                let label = format!("{} (avg){}", label_prefix, appendix);
                let mut averaged = metric.with_label(label.clone());
                if let MetricSource::Raw { statistic, .. } = &mut averaged.source {
                    *statistic = MetricStatistic::Average;
                }
                if !fill_with_zeroes {
                    return Ok(averaged);
                }
                let using = BTreeMap::from([(id.to_string(), averaged)]);
                let math = self.create_metric_math(&value, using, &label)?;
                return Ok(with_optional_color(math, color));
            }
            RateComputationMethod::PerSecond => {
                let label = match label_prefix.as_str() {
                    "Requests" | "Invocations" | "Transactions" => format!("TPS{}", appendix),
                    _ => format!("{}/s{}", label_prefix, appendix),
                };
                (format!("{} / PERIOD({})", value, id), label)
            }
            RateComputationMethod::PerMinute => (
                format!("(60 * {}) / PERIOD({})", value, id),
                format!("{}/m{}", label_prefix, appendix),
            ),
            RateComputationMethod::PerHour => (
                format!("(3600 * {}) / PERIOD({})", value, id),
                format!("{}/h{}", label_prefix, appendix),
            ),
            RateComputationMethod::PerDay => (
                format!("(86400 * {}) / PERIOD({})", value, id),
                format!("{}/d{}", label_prefix, appendix),
            ),
        };

        let using = BTreeMap::from([(id.to_string(), metric)]);
        let math = self.create_metric_math(&expression, using, &label)?;
        Ok(with_optional_color(math, color))
    }

    /// Multiply a metric by a constant factor; a factor of one returns the metric unchanged
    pub fn multiply_metric(&self, metric: Metric, multiplier: f64, label: &str) -> Result<Metric> {
        self.scale_metric(metric, multiplier, label, "*", "multiplier")
    }

    /// Divide a metric by a constant; a divisor of one returns the metric unchanged
    pub fn divide_metric(&self, metric: Metric, divisor: f64, label: &str) -> Result<Metric> {
        self.scale_metric(metric, divisor, label, "/", "divisor")
    }

    fn scale_metric(
        &self,
        metric: Metric,
        factor: f64,
        label: &str,
        operator: &str,
        what: &str,
    ) -> Result<Metric> {
        if factor == 1.0 {
            return Ok(metric);
        }
        if !factor.is_finite() || factor < 1.0 {
            return Err(VigilError::invalid_metric(
                label.to_string(),
                format!("{} must be greater than one, got {}", what, factor),
            ));
        }
        debug!(label = label, factor = factor, operator = operator, "Scaling metric");

        let color = metric.color.clone();
        let expression = format!("{} {} {}", DEFAULT_EXPRESSION_ID, operator, factor);
        let using = BTreeMap::from([(DEFAULT_EXPRESSION_ID.to_string(), metric)]);
        let math = self.create_metric_math(&expression, using, label)?;
        Ok(with_optional_color(math, color))
    }
}

fn with_optional_color(metric: Metric, color: Option<String>) -> Metric {
    match color {
        Some(color) => metric.with_color(color),
        None => metric,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> MetricFactory {
        MetricFactory::new(MetricFactoryDefaults {
            namespace: Some("Svc".to_string()),
            period_seconds: None,
        })
    }

    #[test]
    fn test_create_metric_uses_default_namespace_and_period() {
        let metric = factory()
            .create_metric(None, "Latency", MetricStatistic::P99, "P99 Latency")
            .unwrap()
            .with_dimension("Operation", "Get");

        assert_eq!(metric.period_seconds, DEFAULT_METRIC_PERIOD_SECONDS);
        match &metric.source {
            MetricSource::Raw {
                namespace,
                dimensions,
                statistic,
                ..
            } => {
                assert_eq!(namespace, "Svc");
                assert_eq!(dimensions.get("Operation").map(String::as_str), Some("Get"));
                assert_eq!(*statistic, MetricStatistic::P99);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_missing_namespace_is_rejected() {
        let factory = MetricFactory::default();
        let err = factory
            .create_metric(None, "Latency", MetricStatistic::Average, "Latency")
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_search_expression() {
        let dimensions = BTreeMap::from([
            ("QueueName".to_string(), None),
            ("Stage".to_string(), Some("prod".to_string())),
        ]);
        let metric = factory()
            .create_metric_search("MetricName=\"Age\"", &dimensions, MetricStatistic::Maximum, None, None)
            .unwrap();

        assert_eq!(
            metric.expression(),
            Some("SEARCH('{Svc,QueueName,Stage} Stage=\"prod\" MetricName=\"Age\"', 'Maximum', 300)")
        );
        assert_eq!(metric.label, " ");
    }

    #[test]
    fn test_anomaly_band_expression() {
        let base = factory()
            .create_metric(None, "Requests", MetricStatistic::Sum, "Requests")
            .unwrap();
        let band = factory()
            .create_metric_anomaly_detection(base, 2.0, "Band")
            .unwrap();

        assert!(band.is_anomaly_band());
        assert_eq!(band.expression(), Some("ANOMALY_DETECTION_BAND(m1,2)"));
        assert!(factory()
            .create_metric_anomaly_detection(band, 0.0, "Band")
            .is_err());
    }

    #[test]
    fn test_to_rate_per_second_uses_tps_label() {
        let metric = factory()
            .create_metric(None, "Invocations", MetricStatistic::Sum, "Invocations")
            .unwrap();
        let rate = factory()
            .to_rate(metric, RateComputationMethod::PerSecond, true, true)
            .unwrap();

        assert_eq!(rate.expression(), Some("FILL(m1,0) / PERIOD(m1)"));
        assert_eq!(rate.label, "TPS (min: ${MIN}, max: ${MAX}, avg: ${AVG})");
        assert_eq!(rate.plain_label(), "TPS");
    }

    #[test]
    fn test_to_rate_average_keeps_raw_metric() {
        let metric = factory()
            .create_metric(None, "Bytes", MetricStatistic::Sum, "Bytes")
            .unwrap();
        let rate = factory()
            .to_rate(metric, RateComputationMethod::Average, false, false)
            .unwrap();

        assert_eq!(rate.label, "Bytes (avg)");
        assert!(matches!(
            rate.source,
            MetricSource::Raw {
                statistic: MetricStatistic::Average,
                ..
            }
        ));
    }

    #[test]
    fn test_multiply_and_divide() {
        let metric = factory()
            .create_metric(None, "Latency", MetricStatistic::Average, "Latency")
            .unwrap();

        let same = factory().multiply_metric(metric.clone(), 1.0, "Latency").unwrap();
        assert_eq!(same, metric);

        let scaled = factory().divide_metric(metric.clone(), 1000.0, "Latency (s)").unwrap();
        assert_eq!(scaled.expression(), Some("m1 / 1000"));

        assert!(factory().multiply_metric(metric, 0.5, "Half").is_err());
    }

    #[test]
    fn test_math_rejects_bad_expression_id() {
        let metric = factory()
            .create_metric(None, "Errors", MetricStatistic::Sum, "Errors")
            .unwrap();
        let using = BTreeMap::from([("Errors".to_string(), metric)]);
        assert!(factory().create_metric_math("Errors * 100", using, "Pct").is_err());
    }
}
