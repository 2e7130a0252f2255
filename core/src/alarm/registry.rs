//! Index of every alarm created in a synthesis pass

use indexmap::IndexMap;
use std::sync::Arc;

use super::naming::IssuedNames;
use super::{Alarm, AlarmId, AlarmRef, AlarmSelector, CompositeAlarm, CompositeAlarmId};

/// Alarms and composite alarms in creation order, indexed by tag and disambiguator
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    alarms: Vec<Arc<Alarm>>,
    composites: Vec<Arc<CompositeAlarm>>,
    by_tag: IndexMap<String, Vec<AlarmId>>,
    by_disambiguator: IndexMap<String, Vec<AlarmId>>,
    issued: IssuedNames,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next registered alarm will get
    pub fn next_alarm_id(&self) -> AlarmId {
        AlarmId(self.alarms.len())
    }

    pub fn next_composite_id(&self) -> CompositeAlarmId {
        CompositeAlarmId(self.composites.len())
    }

    /// Names issued so far, shared by alarms and composite alarms
    pub fn issued_names(&self) -> &IssuedNames {
        &self.issued
    }

    pub fn issued_names_mut(&mut self) -> &mut IssuedNames {
        &mut self.issued
    }

    /// Store an alarm and index it under its tags and disambiguator
    pub fn register(&mut self, alarm: Alarm) -> Arc<Alarm> {
        let id = alarm.id;
        for tag in &alarm.tags {
            self.by_tag.entry(tag.clone()).or_default().push(id);
        }
        if let Some(disambiguator) = &alarm.disambiguator {
            self.by_disambiguator
                .entry(disambiguator.clone())
                .or_default()
                .push(id);
        }

        let alarm = Arc::new(alarm);
        self.alarms.push(Arc::clone(&alarm));
        alarm
    }

    pub fn register_composite(&mut self, composite: CompositeAlarm) -> Arc<CompositeAlarm> {
        let composite = Arc::new(composite);
        self.composites.push(Arc::clone(&composite));
        composite
    }

    pub fn alarms(&self) -> &[Arc<Alarm>] {
        &self.alarms
    }

    pub fn composites(&self) -> &[Arc<CompositeAlarm>] {
        &self.composites
    }

    pub fn alarm(&self, id: AlarmId) -> Option<&Arc<Alarm>> {
        self.alarms.get(id.0)
    }

    pub fn composite(&self, id: CompositeAlarmId) -> Option<&Arc<CompositeAlarm>> {
        self.composites.get(id.0)
    }

    pub fn with_tag(&self, tag: &str) -> Vec<Arc<Alarm>> {
        self.collect(self.by_tag.get(tag))
    }

    pub fn with_disambiguator(&self, disambiguator: &str) -> Vec<Arc<Alarm>> {
        self.collect(self.by_disambiguator.get(disambiguator))
    }

    /// Tags seen so far, in first-use order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }

    pub fn disambiguators(&self) -> impl Iterator<Item = &str> {
        self.by_disambiguator.keys().map(String::as_str)
    }

    fn collect(&self, ids: Option<&Vec<AlarmId>>) -> Vec<Arc<Alarm>> {
        ids.map(|ids| ids.iter().filter_map(|id| self.alarm(*id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Operands matched by a selector, in registration order. Empty when nothing matches.
    pub fn resolve(&self, selector: &AlarmSelector) -> Vec<AlarmRef> {
        match selector {
            AlarmSelector::Tag(tag) => self
                .with_tag(tag)
                .iter()
                .map(|alarm| AlarmRef::Alarm(alarm.id))
                .collect(),
            AlarmSelector::Disambiguator(disambiguator) => self
                .with_disambiguator(disambiguator)
                .iter()
                .map(|alarm| AlarmRef::Alarm(alarm.id))
                .collect(),
            AlarmSelector::Alarm(id) => self
                .alarm(*id)
                .map(|alarm| vec![AlarmRef::Alarm(alarm.id)])
                .unwrap_or_default(),
            AlarmSelector::Composite(id) => self
                .composite(*id)
                .map(|composite| vec![AlarmRef::Composite(composite.id)])
                .unwrap_or_default(),
        }
    }

    /// Name of a referenced alarm or composite alarm
    pub fn name_of(&self, reference: AlarmRef) -> Option<&str> {
        match reference {
            AlarmRef::Alarm(id) => self.alarm(id).map(|a| a.name.as_str()),
            AlarmRef::Composite(id) => self.composite(id).map(|c| c.name.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmActions, Annotation, FillDirection};
    use crate::backend::BackendHandle;
    use crate::metric::{Metric, MetricSource, MetricStatistic};
    use crate::types::{ComparisonOperator, TreatMissingData};
    use std::collections::{BTreeMap, BTreeSet};

    fn alarm(registry: &AlarmRegistry, name: &str, tags: &[&str], disambiguator: Option<&str>) -> Alarm {
        Alarm {
            id: registry.next_alarm_id(),
            name: name.to_string(),
            description: String::new(),
            dedupe_string: name.to_string(),
            widget_label: name.to_string(),
            comparison_operator: ComparisonOperator::GreaterThanThreshold,
            threshold: 1.0,
            evaluation_periods: 3,
            datapoints_to_alarm: 3,
            treat_missing_data: TreatMissingData::Missing,
            actions_enabled: true,
            actions: AlarmActions::default(),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            disambiguator: disambiguator.map(str::to_string),
            metric: Metric {
                source: MetricSource::Raw {
                    namespace: "Svc".to_string(),
                    metric_name: "Errors".to_string(),
                    statistic: MetricStatistic::Sum,
                    dimensions: BTreeMap::new(),
                },
                label: "Errors".to_string(),
                period_seconds: 300,
                color: None,
                unit: None,
            },
            annotation: Annotation {
                value: 1.0,
                label: String::new(),
                color: None,
                fill: FillDirection::None,
                visible: true,
            },
            fill_boundary: None,
            custom_params: BTreeMap::new(),
            backend_handle: BackendHandle::new(format!("alarm/{}", name)),
        }
    }

    #[test]
    fn test_index_by_tag_and_disambiguator() {
        let mut registry = AlarmRegistry::new();
        let a = alarm(&registry, "A", &["svc-health"], Some("Critical"));
        registry.register(a);
        let b = alarm(&registry, "B", &["other"], Some("Critical"));
        registry.register(b);
        let c = alarm(&registry, "C", &["svc-health"], None);
        registry.register(c);

        let names: Vec<_> = registry.with_tag("svc-health").iter().map(|a| a.name.clone()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(registry.with_disambiguator("Critical").len(), 2);
        assert!(registry.with_tag("missing").is_empty());
        assert_eq!(registry.tags().collect::<Vec<_>>(), vec!["svc-health", "other"]);
    }

    #[test]
    fn test_resolve_selectors() {
        let mut registry = AlarmRegistry::new();
        let a = alarm(&registry, "A", &["t"], None);
        let id = registry.register(a).id;

        assert_eq!(registry.resolve(&AlarmSelector::Alarm(id)), vec![AlarmRef::Alarm(id)]);
        assert!(registry.resolve(&AlarmSelector::Alarm(AlarmId(7))).is_empty());
        assert!(registry
            .resolve(&AlarmSelector::Composite(CompositeAlarmId(0)))
            .is_empty());
        assert_eq!(registry.name_of(AlarmRef::Alarm(id)), Some("A"));
    }
}
