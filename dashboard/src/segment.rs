//! Dashboard segments: what one monitored resource contributes to each dashboard

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::factory::DashboardKind;
use crate::widget::Widget;

/// Contributes widgets to the detail, summary and alarm dashboards
pub trait DashboardSegment: Debug {
    /// Widgets for the detail dashboard
    fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        Vec::new()
    }

    fn summary_widgets(&self) -> Vec<Arc<dyn Widget>> {
        Vec::new()
    }

    fn alarm_widgets(&self) -> Vec<Arc<dyn Widget>> {
        Vec::new()
    }

    fn widgets_for(&self, kind: DashboardKind) -> Vec<Arc<dyn Widget>> {
        match kind {
            DashboardKind::Detail => self.widgets(),
            DashboardKind::Summary => self.summary_widgets(),
            DashboardKind::AlarmStatus => self.alarm_widgets(),
        }
    }
}

/// Per-segment opt-out from individual dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardPlacement {
    pub add_to_detail_dashboard: Option<bool>,
    pub add_to_summary_dashboard: Option<bool>,
    pub add_to_alarm_dashboard: Option<bool>,
}

impl DashboardPlacement {
    pub fn allows(&self, kind: DashboardKind) -> bool {
        match kind {
            DashboardKind::Detail => self.add_to_detail_dashboard,
            DashboardKind::Summary => self.add_to_summary_dashboard,
            DashboardKind::AlarmStatus => self.add_to_alarm_dashboard,
        }
        .unwrap_or(true)
    }
}

/// Segment wrapping one widget
#[derive(Debug, Clone)]
pub struct SingleWidgetDashboardSegment {
    widget: Arc<dyn Widget>,
    add_to_summary: bool,
    add_to_alarm: bool,
}

impl SingleWidgetDashboardSegment {
    /// Shown on every dashboard
    pub fn new(widget: Arc<dyn Widget>) -> Self {
        Self::with_targets(widget, true, true)
    }

    pub fn with_targets(widget: Arc<dyn Widget>, add_to_summary: bool, add_to_alarm: bool) -> Self {
        Self {
            widget,
            add_to_summary,
            add_to_alarm,
        }
    }
}

impl DashboardSegment for SingleWidgetDashboardSegment {
    fn widgets(&self) -> Vec<Arc<dyn Widget>> {
        vec![Arc::clone(&self.widget)]
    }

    fn summary_widgets(&self) -> Vec<Arc<dyn Widget>> {
        if self.add_to_summary {
            vec![Arc::clone(&self.widget)]
        } else {
            Vec::new()
        }
    }

    fn alarm_widgets(&self) -> Vec<Arc<dyn Widget>> {
        if self.add_to_alarm {
            vec![Arc::clone(&self.widget)]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{HeaderLevel, HeaderWidget};

    #[derive(Debug)]
    struct DetailOnly;

    impl DashboardSegment for DetailOnly {
        fn widgets(&self) -> Vec<Arc<dyn Widget>> {
            vec![Arc::new(HeaderWidget::new("detail", HeaderLevel::Large))]
        }
    }

    #[test]
    fn test_default_capabilities_are_empty() {
        let segment = DetailOnly;
        assert_eq!(segment.widgets_for(DashboardKind::Detail).len(), 1);
        assert!(segment.widgets_for(DashboardKind::Summary).is_empty());
        assert!(segment.widgets_for(DashboardKind::AlarmStatus).is_empty());
    }

    #[test]
    fn test_single_widget_targets() {
        let header: Arc<dyn Widget> = Arc::new(HeaderWidget::new("Orders", HeaderLevel::Medium));
        let segment = SingleWidgetDashboardSegment::with_targets(header, false, true);

        assert_eq!(segment.widgets().len(), 1);
        assert!(segment.summary_widgets().is_empty());
        assert_eq!(segment.alarm_widgets().len(), 1);
    }

    #[test]
    fn test_placement_defaults_to_everywhere() {
        let placement = DashboardPlacement {
            add_to_summary_dashboard: Some(false),
            ..Default::default()
        };
        assert!(placement.allows(DashboardKind::Detail));
        assert!(!placement.allows(DashboardKind::Summary));
        assert!(placement.allows(DashboardKind::AlarmStatus));
    }
}
