//! Graph annotations for alarm thresholds

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::types::{ComparisonOperator, Severity};

/// Side of the annotation line that gets shaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillDirection {
    Above,
    Below,
    None,
}

impl FillDirection {
    /// Fill direction for the alarming range of an operator
    pub fn for_operator(operator: ComparisonOperator) -> Self {
        if operator.is_greater_than() {
            FillDirection::Above
        } else if operator.is_less_than() {
            FillDirection::Below
        } else {
            FillDirection::None
        }
    }
}

/// Horizontal annotation rendered on graph widgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub value: f64,
    pub label: String,
    pub color: Option<String>,
    pub fill: FillDirection,
    pub visible: bool,
}

/// Inputs to annotation creation
#[derive(Debug, Clone)]
pub struct AnnotationProps {
    pub threshold: f64,
    pub operator: ComparisonOperator,
    pub metric_label: String,
    pub datapoints_to_alarm: u32,
    pub evaluation_periods: u32,
    pub period_seconds: u64,
    pub fill_alarm_range: bool,
    pub severity: Severity,
    pub override_color: Option<String>,
    pub override_label: Option<String>,
    pub override_visibility: Option<bool>,
}

impl AnnotationProps {
    fn default_label(&self) -> String {
        let window_minutes = (self.period_seconds * u64::from(self.evaluation_periods)) / 60;
        format!(
            "{} {} {} for {} datapoints within {} minutes",
            self.metric_label,
            self.operator.symbol(),
            self.threshold,
            self.datapoints_to_alarm,
            window_minutes
        )
    }

    fn apply_overrides(&self, mut annotation: Annotation) -> Annotation {
        if let Some(color) = &self.override_color {
            annotation.color = Some(color.clone());
        }
        if let Some(label) = &self.override_label {
            annotation.label = label.clone();
        }
        if let Some(visible) = self.override_visibility {
            annotation.visible = visible;
        }
        annotation
    }
}

/// Turns an alarm threshold into graph annotations
pub trait AnnotationStrategy: Debug + Send + Sync {
    fn create_annotation(&self, props: &AnnotationProps) -> Annotation;

    /// Optional second annotation bounding the shaded region
    fn fill_boundary(&self, _props: &AnnotationProps) -> Option<Annotation> {
        None
    }
}

/// One horizontal line, shaded only when the alarm asks for it
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAnnotationStrategy;

impl AnnotationStrategy for DefaultAnnotationStrategy {
    fn create_annotation(&self, props: &AnnotationProps) -> Annotation {
        let fill = if props.fill_alarm_range {
            FillDirection::for_operator(props.operator)
        } else {
            FillDirection::None
        };

        props.apply_overrides(Annotation {
            value: props.threshold,
            label: props.default_label(),
            color: None,
            fill,
            visible: true,
        })
    }
}

/// Y axis range the shaded region extends to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl Default for AxisRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f64::MAX,
        }
    }
}

/// Always shades the alarming range and colors it by severity
#[derive(Debug, Clone, Copy, Default)]
pub struct FillingAnnotationStrategy {
    axis: AxisRange,
}

impl FillingAnnotationStrategy {
    pub fn new(axis: AxisRange) -> Self {
        Self { axis }
    }

    /// Fixed translucent shade per severity
    pub fn alarming_range_shade(severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => "#d6272833",
            Severity::Warning => "#ff990033",
            Severity::Other => "#99999933",
        }
    }
}

impl AnnotationStrategy for FillingAnnotationStrategy {
    fn create_annotation(&self, props: &AnnotationProps) -> Annotation {
        props.apply_overrides(Annotation {
            value: props.threshold,
            label: props.default_label(),
            color: Some(Self::alarming_range_shade(props.severity).to_string()),
            fill: FillDirection::for_operator(props.operator),
            visible: true,
        })
    }

    fn fill_boundary(&self, props: &AnnotationProps) -> Option<Annotation> {
        let value = match FillDirection::for_operator(props.operator) {
            FillDirection::Above => self.axis.max,
            FillDirection::Below => self.axis.min,
            FillDirection::None => return None,
        };

        Some(Annotation {
            value,
            label: String::new(),
            color: Some(Self::alarming_range_shade(props.severity).to_string()),
            fill: FillDirection::None,
            visible: false,
        })
    }
}

/// Annotation strategy selection as it appears in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStrategyKind {
    #[default]
    Default,
    Filling,
}

impl AnnotationStrategyKind {
    pub fn build(&self) -> Arc<dyn AnnotationStrategy> {
        match self {
            AnnotationStrategyKind::Default => Arc::new(DefaultAnnotationStrategy),
            AnnotationStrategyKind::Filling => Arc::new(FillingAnnotationStrategy::default()),
        }
    }
}
