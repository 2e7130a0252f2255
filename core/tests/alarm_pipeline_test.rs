//! Alarm factory, registry and backend working together

use std::collections::BTreeSet;

use proptest::prelude::*;
use vigil_core::*;

fn latency_metric(factory: &MetricFactory) -> Metric {
    factory
        .create_metric(Some("Svc"), "Latency", MetricStatistic::P99, "P99 Latency")
        .unwrap()
}

struct Request {
    resource: &'static str,
    local_name: &'static str,
    tagged: bool,
}

const REQUESTS: [Request; 4] = [
    Request { resource: "Orders", local_name: "HighLatency", tagged: true },
    Request { resource: "Orders", local_name: "HighErrorRate", tagged: true },
    Request { resource: "Billing", local_name: "Throttles", tagged: false },
    Request { resource: "Billing", local_name: "HighLatency", tagged: true },
];

fn composite_operand_names(order: &[usize]) -> Result<BTreeSet<String>> {
    let config = VigilConfig::default();
    let global = AlarmFactory::new(config.alarms.clone(), &config.limits);
    let metrics = MetricFactory::new(config.metrics.clone());
    let mut registry = AlarmRegistry::new();
    let mut backend = InMemoryBackend::new(config.limits);

    for index in order {
        let request = &REQUESTS[*index];
        let scoped = global.scoped(request.resource, None, ScopedAlarmOverrides::default());
        let mut props = AddAlarmProps::new(request.local_name, 100.0, ComparisonOperator::GreaterThanThreshold);
        if request.tagged {
            props = props.with_tag("svc-health");
        }
        scoped.add_alarm(&latency_metric(&metrics), props, &mut registry, &mut backend)?;
    }

    let composite = global
        .scoped("", Some("Composite".to_string()), ScopedAlarmOverrides::default())
        .add_composite_alarm(
            AddCompositeAlarmProps::new(vec![AlarmSelector::Tag("svc-health".to_string())])
                .with_disambiguator("svc-health"),
            &mut registry,
            &mut backend,
        )?;

    Ok(composite
        .operands
        .iter()
        .filter_map(|operand| registry.name_of(*operand).map(str::to_string))
        .collect())
}

#[test]
fn test_second_alarm_with_same_name_fails() {
    let config = VigilConfig::default();
    let factory = AlarmFactory::new(config.alarms.clone(), &config.limits).scoped(
        "Orders",
        None,
        ScopedAlarmOverrides::default(),
    );
    let metrics = MetricFactory::new(config.metrics.clone());
    let mut registry = AlarmRegistry::new();
    let mut backend = InMemoryBackend::new(config.limits);

    let props = AddAlarmProps::new("HighLatency", 100.0, ComparisonOperator::GreaterThanThreshold);
    factory
        .add_alarm(&latency_metric(&metrics), props.clone(), &mut registry, &mut backend)
        .unwrap();
    let err = factory
        .add_alarm(&latency_metric(&metrics), props, &mut registry, &mut backend)
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("Vigil-Orders-HighLatency"));
    assert_eq!(registry.alarms().len(), 1);
    assert_eq!(backend.graph().alarms.len(), 1);
}

#[test]
fn test_composite_operands_follow_registration_order() {
    let names = composite_operand_names(&[0, 1, 2, 3]).unwrap();
    assert_eq!(names.len(), 3);
    assert!(names.contains("Vigil-Orders-HighLatency"));
    assert!(names.contains("Vigil-Billing-HighLatency"));
    assert!(!names.iter().any(|name| name.contains("Throttles")));
}

#[test]
fn test_composite_snapshots_selection_at_creation() -> anyhow::Result<()> {
    let config = VigilConfig::default();
    let global = AlarmFactory::new(config.alarms.clone(), &config.limits);
    let scoped = global.scoped("Orders", None, ScopedAlarmOverrides::default());
    let metrics = MetricFactory::new(config.metrics.clone());
    let mut registry = AlarmRegistry::new();
    let mut backend = InMemoryBackend::new(config.limits);

    let first = scoped.add_alarm(
        &latency_metric(&metrics),
        AddAlarmProps::new("HighLatency", 100.0, ComparisonOperator::GreaterThanThreshold).with_tag("svc-health"),
        &mut registry,
        &mut backend,
    )?;
    let composite = global
        .scoped("", Some("Composite".to_string()), ScopedAlarmOverrides::default())
        .add_composite_alarm(
            AddCompositeAlarmProps::new(vec![AlarmSelector::Tag("svc-health".to_string())]),
            &mut registry,
            &mut backend,
        )?;
    let late = scoped.add_alarm(
        &latency_metric(&metrics),
        AddAlarmProps::new("HighErrorRate", 0.05, ComparisonOperator::GreaterThanThreshold).with_tag("svc-health"),
        &mut registry,
        &mut backend,
    )?;

    assert_eq!(composite.operands, vec![AlarmRef::Alarm(first.id)]);
    assert!(!composite.rule.contains(&late.name));
    assert_eq!(backend.graph().composite_alarms[0].rule, composite.rule);
    assert_eq!(registry.with_tag("svc-health").len(), 2);
    Ok(())
}

proptest! {
    #[test]
    fn composite_resolution_is_order_independent(order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
        let expected = composite_operand_names(&[0, 1, 2, 3]).unwrap();
        let actual = composite_operand_names(&order).unwrap();
        prop_assert_eq!(expected, actual);
    }
}
