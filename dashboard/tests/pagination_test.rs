use std::sync::Arc;

use proptest::prelude::*;
use vigil_core::{BackendLimits, DashboardsConfig, InMemoryBackend};
use vigil_dashboard::widget::{FULL_WIDTH, QUARTER_WIDTH};
use vigil_dashboard::{DashboardFactory, DashboardKind, GraphWidget, Row, Widget};

fn factory(max_widgets: usize) -> DashboardFactory {
    let config = DashboardsConfig {
        name: "Checkout".to_string(),
        ..DashboardsConfig::default()
    };
    let limits = BackendLimits {
        max_widgets_per_dashboard: max_widgets,
        ..BackendLimits::default()
    };
    DashboardFactory::new(config, limits)
}

fn graph(i: usize) -> Arc<dyn Widget> {
    Arc::new(GraphWidget::new(format!("graph-{}", i), QUARTER_WIDTH, 5))
}

#[test]
fn test_one_widget_over_capacity_spills_to_second_page() -> anyhow::Result<()> {
    let mut factory = factory(4);
    for i in 0..5 {
        factory.add_widget(DashboardKind::Detail, graph(i))?;
    }

    let mut backend = InMemoryBackend::default();
    let handles = factory.finalize(&mut backend)?;
    assert_eq!(handles.len(), 2);

    let graph = backend.into_graph();
    let first = graph.dashboard("Checkout").expect("first page");
    let second = graph.dashboard("Checkout-2").expect("second page");
    assert_eq!(first.body["widgets"].as_array().map(Vec::len), Some(4));
    assert_eq!(second.body["widgets"].as_array().map(Vec::len), Some(1));
    assert_eq!(second.body["widgets"][0]["y"], 0);
    Ok(())
}

#[test]
fn test_row_is_never_split() -> anyhow::Result<()> {
    let mut factory = factory(4);
    factory.add_widget(DashboardKind::Detail, graph(0))?;
    factory.add_widget(DashboardKind::Detail, graph(1))?;
    factory.add_widget(
        DashboardKind::Detail,
        Arc::new(Row::new(vec![graph(2), graph(3), graph(4)])),
    )?;

    let detail = factory.dashboard(DashboardKind::Detail).expect("detail dashboard");
    assert_eq!(detail.pages().len(), 2);
    assert_eq!(detail.pages()[0].widget_count(), 2);
    assert_eq!(detail.pages()[1].widget_count(), 3);
    Ok(())
}

#[test]
fn test_nothing_added_creates_nothing() -> anyhow::Result<()> {
    let factory = factory(4);
    assert!(!factory.any_dashboard_created());

    let mut backend = InMemoryBackend::default();
    assert!(factory.finalize(&mut backend)?.is_empty());
    assert!(backend.graph().dashboards.is_empty());
    Ok(())
}

proptest! {
    #[test]
    fn pages_respect_widget_limit(max in 1usize..8, count in 1usize..40) {
        let mut factory = factory(max);
        for i in 0..count {
            factory.add_widget(DashboardKind::Detail, Arc::new(GraphWidget::new(format!("g{}", i), FULL_WIDTH, 2))).unwrap();
        }

        let detail = factory.dashboard(DashboardKind::Detail).unwrap();
        prop_assert_eq!(detail.pages().len(), count.div_ceil(max));
        for page in detail.pages() {
            prop_assert!(page.widget_count() <= max);
        }
        let total: usize = detail.pages().iter().map(|p| p.widget_count()).sum();
        prop_assert_eq!(total, count);
    }
}
