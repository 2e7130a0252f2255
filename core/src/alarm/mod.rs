//! Alarm synthesis: naming, dedupe, annotations, actions and the alarm index
//!
//! Alarm records are created once by the [`AlarmFactory`] and never mutated
//! afterwards. The [`AlarmRegistry`] indexes them by tag and disambiguator so
//! composite alarms can be assembled from alarms created anywhere earlier in
//! the synthesis pass.

pub mod action;
pub mod annotation;
pub mod dedupe;
pub mod factory;
pub mod naming;
pub mod registry;

// Re-export commonly used types
pub use action::{ActionStrategy, AlarmActions, OpsItemSeverity};
pub use annotation::{
    Annotation, AnnotationProps, AnnotationStrategy, AnnotationStrategyKind, AxisRange,
    DefaultAnnotationStrategy, FillDirection, FillingAnnotationStrategy,
};
pub use dedupe::{DedupeProcessorConfig, DedupeStringProcessor, DoNotModifyDedupeString, ExtendDedupeString};
pub use factory::{AddAlarmProps, AddCompositeAlarmProps, AlarmFactory, ScopedAlarmOverrides};
pub use naming::{AlarmNames, AlarmNamingStrategy, DescriptionInput, IssuedNames, NamingInput};
pub use registry::AlarmRegistry;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::backend::BackendHandle;
use crate::metric::Metric;
use crate::types::{ComparisonOperator, CompositeOperator, TreatMissingData};

/// Position of an alarm in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlarmId(pub usize);

/// Position of a composite alarm in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeAlarmId(pub usize);

/// Operand of a composite alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlarmRef {
    Alarm(AlarmId),
    Composite(CompositeAlarmId),
}

/// Selects composite alarm operands from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmSelector {
    Tag(String),
    Disambiguator(String),
    Alarm(AlarmId),
    Composite(CompositeAlarmId),
}

impl std::fmt::Display for AlarmSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmSelector::Tag(tag) => write!(f, "tag:{}", tag),
            AlarmSelector::Disambiguator(d) => write!(f, "disambiguator:{}", d),
            AlarmSelector::Alarm(id) => write!(f, "alarm:{}", id.0),
            AlarmSelector::Composite(id) => write!(f, "composite:{}", id.0),
        }
    }
}

/// A synthesized metric alarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub name: String,
    pub description: String,
    pub dedupe_string: String,
    pub widget_label: String,
    pub comparison_operator: ComparisonOperator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub datapoints_to_alarm: u32,
    pub treat_missing_data: TreatMissingData,
    pub actions_enabled: bool,
    pub actions: AlarmActions,
    pub tags: BTreeSet<String>,
    pub disambiguator: Option<String>,
    pub metric: Metric,
    pub annotation: Annotation,
    pub fill_boundary: Option<Annotation>,
    pub custom_params: BTreeMap<String, serde_json::Value>,
    pub backend_handle: BackendHandle,
}

/// A boolean combination of other alarms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeAlarm {
    pub id: CompositeAlarmId,
    pub name: String,
    pub description: String,
    pub dedupe_string: String,
    pub operator: CompositeOperator,
    pub operands: Vec<AlarmRef>,
    pub rule: String,
    pub actions_enabled: bool,
    pub actions: AlarmActions,
    pub disambiguator: Option<String>,
    pub backend_handle: BackendHandle,
}
