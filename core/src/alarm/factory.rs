//! Alarm factory: turns alarm requests into registered alarm records

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use super::action::ActionStrategy;
use super::annotation::{AnnotationProps, AnnotationStrategy};
use super::dedupe::{DedupeProcessorConfig, DedupeStringProcessor};
use super::naming::{AlarmNamingStrategy, DescriptionInput, NamingInput};
use super::registry::AlarmRegistry;
use super::{Alarm, AlarmRef, AlarmSelector, CompositeAlarm};
use crate::backend::{AlarmDefinition, CompositeAlarmDefinition, MonitoringBackend};
use crate::config::{AlarmFactoryDefaults, BackendLimits};
use crate::layered::Layered;
use crate::metric::Metric;
use crate::types::{ComparisonOperator, CompositeOperator, Severity, TreatMissingData};
use crate::{Result, VigilError};

/// Datapoints that must breach before an alarm triggers, unless configured otherwise
pub const DEFAULT_DATAPOINTS_TO_ALARM: u32 = 3;

const COMPOSITE_LOCAL_NAME: &str = "Composite";
const COMPOSITE_DESCRIPTION: &str = "Composite alarm";

/// Alarm settings of one monitoring, layered between global defaults and single alarms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopedAlarmOverrides {
    pub actions_enabled: Option<bool>,
    pub action: Option<ActionStrategy>,
    pub datapoints_to_alarm: Option<u32>,
    pub evaluation_periods: Option<u32>,
    pub runbook_link: Option<String>,
    pub documentation_link: Option<String>,
    pub fill_alarm_range: Option<bool>,
    pub dedupe: Option<DedupeProcessorConfig>,
}

/// Request for a single metric alarm
#[derive(Debug, Clone)]
pub struct AddAlarmProps {
    pub local_name: String,
    pub threshold: f64,
    pub comparison_operator: ComparisonOperator,
    pub treat_missing_data: Option<TreatMissingData>,
    pub disambiguator: Option<String>,
    pub tags: BTreeSet<String>,
    pub name_override: Option<String>,
    pub dedupe_suffix: Option<String>,
    pub dedupe_override: Option<String>,
    pub dedupe_processor: Option<Arc<dyn DedupeStringProcessor>>,
    pub description: Option<String>,
    pub description_override: Option<String>,
    pub datapoints_to_alarm: Option<u32>,
    pub evaluation_periods: Option<u32>,
    /// Alarm-specific metric period in seconds
    pub period: Option<u64>,
    /// Percentile alarms only; `false` keeps the state during low-sample periods
    pub evaluate_low_sample_count_percentile: Option<bool>,
    pub actions_enabled: Option<bool>,
    pub action_override: Option<ActionStrategy>,
    pub runbook_link: Option<String>,
    pub documentation_link: Option<String>,
    pub fill_alarm_range: Option<bool>,
    pub annotation_color: Option<String>,
    pub annotation_label: Option<String>,
    pub annotation_visible: Option<bool>,
    pub custom_params: BTreeMap<String, serde_json::Value>,
}

impl AddAlarmProps {
    pub fn new<S: Into<String>>(local_name: S, threshold: f64, comparison_operator: ComparisonOperator) -> Self {
        Self {
            local_name: local_name.into(),
            threshold,
            comparison_operator,
            treat_missing_data: None,
            disambiguator: None,
            tags: BTreeSet::new(),
            name_override: None,
            dedupe_suffix: None,
            dedupe_override: None,
            dedupe_processor: None,
            description: None,
            description_override: None,
            datapoints_to_alarm: None,
            evaluation_periods: None,
            period: None,
            evaluate_low_sample_count_percentile: None,
            actions_enabled: None,
            action_override: None,
            runbook_link: None,
            documentation_link: None,
            fill_alarm_range: None,
            annotation_color: None,
            annotation_label: None,
            annotation_visible: None,
            custom_params: BTreeMap::new(),
        }
    }

    pub fn with_disambiguator<S: Into<String>>(mut self, disambiguator: S) -> Self {
        self.disambiguator = Some(disambiguator.into());
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_name_override<S: Into<String>>(mut self, name: S) -> Self {
        self.name_override = Some(name.into());
        self
    }

    pub fn with_dedupe_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.dedupe_suffix = Some(suffix.into());
        self
    }

    pub fn with_dedupe_override<S: Into<String>>(mut self, dedupe: S) -> Self {
        self.dedupe_override = Some(dedupe.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_datapoints(mut self, datapoints_to_alarm: u32, evaluation_periods: Option<u32>) -> Self {
        self.datapoints_to_alarm = Some(datapoints_to_alarm);
        self.evaluation_periods = evaluation_periods;
        self
    }

    pub fn with_treat_missing_data(mut self, treat_missing_data: TreatMissingData) -> Self {
        self.treat_missing_data = Some(treat_missing_data);
        self
    }

    pub fn with_actions_enabled(mut self, enabled: bool) -> Self {
        self.actions_enabled = Some(enabled);
        self
    }

    pub fn with_action(mut self, action: ActionStrategy) -> Self {
        self.action_override = Some(action);
        self
    }

    pub fn with_runbook_link<S: Into<String>>(mut self, link: S) -> Self {
        self.runbook_link = Some(link.into());
        self
    }

    pub fn with_period(mut self, period_seconds: u64) -> Self {
        self.period = Some(period_seconds);
        self
    }

    pub fn with_evaluate_low_sample_count_percentile(mut self, evaluate: bool) -> Self {
        self.evaluate_low_sample_count_percentile = Some(evaluate);
        self
    }

    pub fn with_fill_alarm_range(mut self, fill: bool) -> Self {
        self.fill_alarm_range = Some(fill);
        self
    }

    pub fn with_custom_param<S: Into<String>>(mut self, key: S, value: serde_json::Value) -> Self {
        self.custom_params.insert(key.into(), value);
        self
    }
}

/// Request for a composite alarm over previously created alarms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddCompositeAlarmProps {
    pub selectors: Vec<AlarmSelector>,
    pub operator: CompositeOperator,
    pub local_name: Option<String>,
    pub disambiguator: Option<String>,
    pub name_override: Option<String>,
    pub dedupe_override: Option<String>,
    pub description: Option<String>,
    pub description_override: Option<String>,
    pub actions_enabled: Option<bool>,
    pub action_override: Option<ActionStrategy>,
    pub runbook_link: Option<String>,
    pub documentation_link: Option<String>,
}

impl AddCompositeAlarmProps {
    pub fn new(selectors: Vec<AlarmSelector>) -> Self {
        Self {
            selectors,
            ..Default::default()
        }
    }

    pub fn with_operator(mut self, operator: CompositeOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_disambiguator<S: Into<String>>(mut self, disambiguator: S) -> Self {
        self.disambiguator = Some(disambiguator.into());
        self
    }

    pub fn with_action(mut self, action: ActionStrategy) -> Self {
        self.action_override = Some(action);
        self
    }

    pub fn with_actions_enabled(mut self, enabled: bool) -> Self {
        self.actions_enabled = Some(enabled);
        self
    }
}

/// Creates alarms for one scope (the whole pass, or a single monitoring)
#[derive(Debug, Clone)]
pub struct AlarmFactory {
    defaults: AlarmFactoryDefaults,
    scoped: ScopedAlarmOverrides,
    resource_identifier: String,
    local_prefix: Option<String>,
    dedupe_processor: Arc<dyn DedupeStringProcessor>,
    annotation_strategy: Arc<dyn AnnotationStrategy>,
    max_name_length: usize,
}

impl AlarmFactory {
    pub fn new(defaults: AlarmFactoryDefaults, limits: &BackendLimits) -> Self {
        let dedupe_processor = defaults.dedupe.build();
        let annotation_strategy = defaults.annotation_strategy.build();
        Self {
            defaults,
            scoped: ScopedAlarmOverrides::default(),
            resource_identifier: String::new(),
            local_prefix: None,
            dedupe_processor,
            annotation_strategy,
            max_name_length: limits.max_alarm_name_length,
        }
    }

    pub fn with_dedupe_processor(mut self, processor: Arc<dyn DedupeStringProcessor>) -> Self {
        self.dedupe_processor = processor;
        self
    }

    pub fn with_annotation_strategy(mut self, strategy: Arc<dyn AnnotationStrategy>) -> Self {
        self.annotation_strategy = strategy;
        self
    }

    /// Factory for one monitoring, sharing the global defaults and strategies
    pub fn scoped<S: Into<String>>(
        &self,
        resource_identifier: S,
        local_prefix: Option<String>,
        overrides: ScopedAlarmOverrides,
    ) -> AlarmFactory {
        AlarmFactory {
            scoped: overrides,
            resource_identifier: resource_identifier.into(),
            local_prefix,
            ..self.clone()
        }
    }

    pub fn defaults(&self) -> &AlarmFactoryDefaults {
        &self.defaults
    }

    fn naming_input(&self, local_name: &str, disambiguator: Option<&String>) -> NamingInput {
        NamingInput {
            local_name: local_name.to_string(),
            global_prefix: Some(self.defaults.alarm_name_prefix.clone()),
            local_prefix: self.local_prefix.clone(),
            disambiguator: disambiguator.cloned(),
            resource_identifier: self.resource_identifier.clone(),
            ..Default::default()
        }
    }

    fn dedupe_processor(&self, call: Option<Arc<dyn DedupeStringProcessor>>) -> Arc<dyn DedupeStringProcessor> {
        Layered::new(Some(Arc::clone(&self.dedupe_processor)))
            .scoped(self.scoped.dedupe.as_ref().map(DedupeProcessorConfig::build))
            .call(call)
            .resolve_or(Arc::clone(&self.dedupe_processor))
    }

    fn actions_enabled(&self, call: Option<bool>, disambiguator: Option<&str>) -> bool {
        Layered::new(Some(self.defaults.actions_enabled.for_disambiguator(disambiguator)))
            .scoped(self.scoped.actions_enabled)
            .call(call)
            .resolve_or(true)
    }

    fn action(&self, call: Option<ActionStrategy>) -> ActionStrategy {
        Layered::new(self.defaults.action.clone())
            .scoped(self.scoped.action.clone())
            .call(call)
            .resolve_or(ActionStrategy::Noop)
    }

    fn links(&self, runbook: Option<String>, documentation: Option<String>) -> (Option<String>, Option<String>) {
        let runbook = Layered::new(self.defaults.runbook_link.clone())
            .scoped(self.scoped.runbook_link.clone())
            .call(runbook)
            .resolve();
        let documentation = Layered::new(self.defaults.documentation_link.clone())
            .scoped(self.scoped.documentation_link.clone())
            .call(documentation)
            .resolve();
        (runbook, documentation)
    }

    fn validate(&self, name: &str, metric: &Metric, props: &AddAlarmProps, datapoints: u32, periods: u32) -> Result<()> {
        if !props.threshold.is_finite() {
            return Err(VigilError::invalid_threshold(
                name.to_string(),
                format!("threshold must be finite, got {}", props.threshold),
            ));
        }
        if datapoints == 0 || periods == 0 {
            return Err(VigilError::invalid_threshold(
                name,
                "datapoints to alarm and evaluation periods must be greater than 0",
            ));
        }
        if props.period == Some(0) {
            return Err(VigilError::invalid_threshold(name, "alarm period must be greater than 0"));
        }
        if periods < datapoints {
            return Err(VigilError::invalid_threshold(
                name.to_string(),
                format!(
                    "evaluation periods ({}) must be greater than or equal to datapoints to alarm ({})",
                    periods, datapoints
                ),
            ));
        }
        let band_operator = props.comparison_operator.is_band();
        if band_operator != metric.is_anomaly_band() {
            return Err(VigilError::invalid_threshold(
                name.to_string(),
                format!(
                    "operator {} cannot be used with {} metric",
                    props.comparison_operator,
                    if metric.is_anomaly_band() { "an anomaly band" } else { "a plain" }
                ),
            ));
        }
        Ok(())
    }

    /// Create one metric alarm, register it and hand it to the backend
    pub fn add_alarm(
        &self,
        metric: &Metric,
        props: AddAlarmProps,
        registry: &mut AlarmRegistry,
        backend: &mut dyn MonitoringBackend,
    ) -> Result<Arc<Alarm>> {
        let mut naming_input = self.naming_input(&props.local_name, props.disambiguator.as_ref());
        naming_input.name_override = props.name_override.clone();
        naming_input.dedupe_suffix = props.dedupe_suffix.clone();
        naming_input.dedupe_override = props.dedupe_override.clone();

        let naming = AlarmNamingStrategy::new(
            self.dedupe_processor(props.dedupe_processor.clone()),
            self.max_name_length,
        );
        let candidate_name = naming.resolve_name(&naming_input);

        let datapoints = Layered::new(self.defaults.datapoints_to_alarm)
            .scoped(self.scoped.datapoints_to_alarm)
            .call(props.datapoints_to_alarm)
            .resolve_or(DEFAULT_DATAPOINTS_TO_ALARM);
        let periods = Layered::new(self.defaults.evaluation_periods)
            .scoped(self.scoped.evaluation_periods)
            .call(props.evaluation_periods)
            .resolve_or(datapoints);
        self.validate(&candidate_name, metric, &props, datapoints, periods)?;

        let mut metric = metric.clone().with_label(metric.plain_label());
        if let Some(period) = props.period {
            metric = metric.with_period(period);
        }
        let (runbook_link, documentation_link) =
            self.links(props.runbook_link.clone(), props.documentation_link.clone());
        let description = DescriptionInput {
            metric_label: metric.label.clone(),
            operator: props.comparison_operator,
            threshold: props.threshold,
            unit: metric.unit.clone(),
            description: props.description.clone(),
            description_override: props.description_override.clone(),
            runbook_link,
            documentation_link,
        };
        let names = naming.issue(&naming_input, &description, registry.issued_names_mut())?;

        let disambiguator = props.disambiguator.as_deref();
        let actions_enabled = self.actions_enabled(props.actions_enabled, disambiguator);
        let actions = self.action(props.action_override.clone()).actions();
        let treat_missing_data = props
            .treat_missing_data
            .unwrap_or(self.defaults.treat_missing_data);

        let fill_alarm_range = Layered::new(Some(self.defaults.fill_alarm_range))
            .scoped(self.scoped.fill_alarm_range)
            .call(props.fill_alarm_range)
            .resolve_or(false);
        let annotation_props = AnnotationProps {
            threshold: props.threshold,
            operator: props.comparison_operator,
            metric_label: metric.label.clone(),
            datapoints_to_alarm: datapoints,
            evaluation_periods: periods,
            period_seconds: metric.period_seconds,
            fill_alarm_range,
            severity: Severity::from_disambiguator(disambiguator),
            override_color: props.annotation_color.clone(),
            override_label: props.annotation_label.clone(),
            override_visibility: props.annotation_visible,
        };
        let annotation = self.annotation_strategy.create_annotation(&annotation_props);
        let fill_boundary = self.annotation_strategy.fill_boundary(&annotation_props);

        let definition = AlarmDefinition {
            name: names.alarm_name.clone(),
            description: names.description.clone(),
            metric: metric.clone(),
            comparison_operator: props.comparison_operator,
            threshold: props.threshold,
            evaluation_periods: periods,
            datapoints_to_alarm: datapoints,
            treat_missing_data,
            evaluate_low_sample_count_percentile: props.evaluate_low_sample_count_percentile.unwrap_or(true),
            actions_enabled,
            actions: actions.clone(),
        };
        let backend_handle = backend.create_alarm(&definition)?;

        let alarm = Alarm {
            id: registry.next_alarm_id(),
            name: names.alarm_name,
            description: names.description,
            dedupe_string: names.dedupe_string,
            widget_label: names.widget_label,
            comparison_operator: props.comparison_operator,
            threshold: props.threshold,
            evaluation_periods: periods,
            datapoints_to_alarm: datapoints,
            treat_missing_data,
            actions_enabled,
            actions,
            tags: props.tags,
            disambiguator: props.disambiguator,
            metric,
            annotation,
            fill_boundary,
            custom_params: props.custom_params,
            backend_handle,
        };
        debug!(
            alarm = %alarm.name,
            tags = ?alarm.tags,
            disambiguator = ?alarm.disambiguator,
            "Created alarm"
        );

        Ok(registry.register(alarm))
    }

    /// Create a composite alarm over every alarm the selectors match right now
    pub fn add_composite_alarm(
        &self,
        props: AddCompositeAlarmProps,
        registry: &mut AlarmRegistry,
        backend: &mut dyn MonitoringBackend,
    ) -> Result<Arc<CompositeAlarm>> {
        let local_name = props.local_name.as_deref().unwrap_or(COMPOSITE_LOCAL_NAME);
        let mut naming_input = self.naming_input(local_name, props.disambiguator.as_ref());
        naming_input.name_override = props.name_override.clone();
        naming_input.dedupe_override = props.dedupe_override.clone();

        let naming = AlarmNamingStrategy::new(self.dedupe_processor(None), self.max_name_length);
        let candidate_name = naming.resolve_name(&naming_input);

        if props.selectors.is_empty() {
            return Err(VigilError::invalid_monitoring(
                candidate_name,
                "composite alarm needs at least one selector".to_string(),
            ));
        }

        let mut operands: IndexSet<AlarmRef> = IndexSet::new();
        for selector in &props.selectors {
            let matched = registry.resolve(selector);
            if matched.is_empty() {
                return Err(VigilError::UnresolvedReference {
                    composite: candidate_name,
                    reference: selector.to_string(),
                });
            }
            operands.extend(matched);
        }

        let separator = format!(" {} ", props.operator.as_str());
        let rule = operands
            .iter()
            .map(|operand| {
                registry
                    .name_of(*operand)
                    .map(|name| format!("ALARM(\"{}\")", name))
                    .ok_or_else(|| VigilError::internal(format!("dangling operand {:?}", operand)))
            })
            .collect::<Result<Vec<_>>>()?
            .join(separator.as_str());

        let (runbook_link, documentation_link) =
            self.links(props.runbook_link.clone(), props.documentation_link.clone());
        let description = DescriptionInput {
            metric_label: String::new(),
            operator: ComparisonOperator::GreaterThanOrEqualToThreshold,
            threshold: 0.0,
            unit: None,
            description: Some(
                props
                    .description
                    .clone()
                    .unwrap_or_else(|| COMPOSITE_DESCRIPTION.to_string()),
            ),
            description_override: props.description_override.clone(),
            runbook_link,
            documentation_link,
        };
        let names = naming.issue(&naming_input, &description, registry.issued_names_mut())?;

        let actions_enabled = self.actions_enabled(props.actions_enabled, props.disambiguator.as_deref());
        let actions = self.action(props.action_override.clone()).actions();

        let definition = CompositeAlarmDefinition {
            name: names.alarm_name.clone(),
            description: names.description.clone(),
            rule: rule.clone(),
            actions_enabled,
            actions: actions.clone(),
        };
        let backend_handle = backend.create_composite_alarm(&definition)?;

        let composite = CompositeAlarm {
            id: registry.next_composite_id(),
            name: names.alarm_name,
            description: names.description,
            dedupe_string: names.dedupe_string,
            operator: props.operator,
            operands: operands.into_iter().collect(),
            rule,
            actions_enabled,
            actions,
            disambiguator: props.disambiguator,
            backend_handle,
        };
        debug!(
            alarm = %composite.name,
            operands = composite.operands.len(),
            "Created composite alarm"
        );

        Ok(registry.register_composite(composite))
    }
}
