//! Dashboard factory: routes segment widgets to dashboards and paginates them

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use vigil_core::backend::DashboardDefinition;
use vigil_core::{
    BackendHandle, BackendLimits, DashboardRenderingPreference, DashboardsConfig, MonitoringBackend, Result, VigilError,
};

use crate::layout::Page;
use crate::segment::{DashboardPlacement, DashboardSegment};
use crate::widget::{as_bitmap, Widget};

/// The three logical dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardKind {
    Detail,
    Summary,
    AlarmStatus,
}

impl DashboardKind {
    pub const ALL: [DashboardKind; 3] = [
        DashboardKind::Detail,
        DashboardKind::Summary,
        DashboardKind::AlarmStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardKind::Detail => "detail",
            DashboardKind::Summary => "summary",
            DashboardKind::AlarmStatus => "alarm_status",
        }
    }

    fn name_suffix(&self) -> &'static str {
        match self {
            DashboardKind::Detail => "",
            DashboardKind::Summary => "-Summary",
            DashboardKind::AlarmStatus => "-Alarms",
        }
    }
}

impl std::fmt::Display for DashboardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logical dashboard spread over one or more pages
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub kind: DashboardKind,
    pub name: String,
    pub start: String,
    pages: Vec<Page>,
}

impl Dashboard {
    fn new(kind: DashboardKind, name: String, start: String) -> Self {
        Self {
            kind,
            name,
            start,
            pages: vec![Page::new()],
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// First page keeps the base name; later pages get `-2`, `-3`, ...
    pub fn page_name(&self, index: usize) -> String {
        if index == 0 {
            self.name.clone()
        } else {
            format!("{}-{}", self.name, index + 1)
        }
    }

    /// Append a widget that is known to fit an empty page
    fn add_widget(&mut self, widget: Arc<dyn Widget>, limits: &BackendLimits) {
        let needs_new_page = match self.pages.last() {
            Some(page) => {
                !page.is_empty()
                    && (page.height_after(widget.as_ref()) > limits.max_dashboard_height
                        || page.widget_count() + widget.widget_count() > limits.max_widgets_per_dashboard)
            }
            None => true,
        };
        if needs_new_page {
            self.pages.push(Page::new());
            info!(
                dashboard = %self.page_name(self.pages.len() - 1),
                kind = %self.kind,
                "Starting new dashboard page"
            );
        }

        if let Some(page) = self.pages.last_mut() {
            let placement = page.place(widget);
            debug!(
                dashboard = %self.name,
                x = placement.x,
                y = placement.y,
                "Placed widget"
            );
        }
    }
}

/// Owns the detail, summary and alarm dashboards of a synthesis pass
#[derive(Debug, Clone)]
pub struct DashboardFactory {
    config: DashboardsConfig,
    limits: BackendLimits,
    detail: Option<Dashboard>,
    summary: Option<Dashboard>,
    alarm_status: Option<Dashboard>,
}

impl DashboardFactory {
    pub fn new(config: DashboardsConfig, limits: BackendLimits) -> Self {
        Self {
            config,
            limits,
            detail: None,
            summary: None,
            alarm_status: None,
        }
    }

    pub fn is_enabled(&self, kind: DashboardKind) -> bool {
        match kind {
            DashboardKind::Detail => self.config.create_dashboard,
            DashboardKind::Summary => self.config.create_summary_dashboard,
            DashboardKind::AlarmStatus => self.config.create_alarm_dashboard,
        }
    }

    pub fn dashboard(&self, kind: DashboardKind) -> Option<&Dashboard> {
        match kind {
            DashboardKind::Detail => self.detail.as_ref(),
            DashboardKind::Summary => self.summary.as_ref(),
            DashboardKind::AlarmStatus => self.alarm_status.as_ref(),
        }
    }

    /// Whether any widget was ever added
    pub fn any_dashboard_created(&self) -> bool {
        DashboardKind::ALL.iter().any(|kind| self.dashboard(*kind).is_some())
    }

    fn slot(&mut self, kind: DashboardKind) -> &mut Option<Dashboard> {
        match kind {
            DashboardKind::Detail => &mut self.detail,
            DashboardKind::Summary => &mut self.summary,
            DashboardKind::AlarmStatus => &mut self.alarm_status,
        }
    }

    /// Append one widget to a dashboard, creating the dashboard on first use
    pub fn add_widget(&mut self, kind: DashboardKind, widget: Arc<dyn Widget>) -> Result<()> {
        if !self.is_enabled(kind) {
            warn!(kind = %kind, widget = widget.kind(), "Dropping widget for disabled dashboard");
            return Ok(());
        }

        let name = format!("{}{}", self.config.name, kind.name_suffix());
        self.check_fits(&name, widget.as_ref())?;

        let start = match kind {
            DashboardKind::Summary => self.config.summary_start.clone(),
            DashboardKind::Detail | DashboardKind::AlarmStatus => self.config.detail_start.clone(),
        };
        let limits = self.limits;
        let dashboard = self.slot(kind).get_or_insert_with(|| {
            info!(dashboard = %name, kind = %kind, "Creating dashboard");
            Dashboard::new(kind, name, start)
        });
        dashboard.add_widget(widget, &limits);
        Ok(())
    }

    /// Reject a widget that would not fit even an empty page
    fn check_fits(&self, dashboard: &str, widget: &dyn Widget) -> Result<()> {
        let fits_alone = widget.height() <= self.limits.max_dashboard_height
            && widget.widget_count() <= self.limits.max_widgets_per_dashboard;
        if fits_alone {
            return Ok(());
        }
        Err(VigilError::invalid_monitoring(
            dashboard.to_string(),
            format!(
                "{} widget ({} high, {} widgets) exceeds one dashboard page",
                widget.kind(),
                widget.height(),
                widget.widget_count()
            ),
        ))
    }

    /// Route a segment's widgets to every dashboard its placement allows
    pub fn add_segment<S: DashboardSegment + ?Sized>(&mut self, segment: &S, placement: &DashboardPlacement) -> Result<()> {
        for kind in DashboardKind::ALL {
            if !placement.allows(kind) {
                continue;
            }
            for widget in segment.widgets_for(kind) {
                self.add_widget(kind, widget)?;
            }
        }
        Ok(())
    }

    /// Emit one backend dashboard per page, plus bitmap copies when configured
    pub fn finalize(self, backend: &mut dyn MonitoringBackend) -> Result<Vec<BackendHandle>> {
        let rendering = self.config.rendering_preference;
        let mut handles = Vec::new();

        for dashboard in [self.detail, self.summary, self.alarm_status].into_iter().flatten() {
            for (index, page) in dashboard.pages().iter().enumerate() {
                let name = dashboard.page_name(index);
                let widgets = page.render();

                if rendering.bitmap() {
                    let bitmap_name = match rendering {
                        DashboardRenderingPreference::InteractiveAndBitmap => format!("Bitmap-{}", name),
                        _ => name.clone(),
                    };
                    let bitmaps: Vec<_> = widgets.iter().cloned().map(as_bitmap).collect();
                    handles.push(backend.create_dashboard(&DashboardDefinition {
                        name: bitmap_name,
                        start: dashboard.start.clone(),
                        body: json!({ "widgets": bitmaps }),
                    })?);
                }
                if rendering.interactive() {
                    handles.push(backend.create_dashboard(&DashboardDefinition {
                        name,
                        start: dashboard.start.clone(),
                        body: json!({ "widgets": widgets }),
                    })?);
                }
            }
            info!(
                dashboard = %dashboard.name,
                pages = dashboard.pages().len(),
                rendering = %rendering,
                "Finalized dashboard"
            );
        }

        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SingleWidgetDashboardSegment;
    use crate::widget::{GraphWidget, HeaderLevel, HeaderWidget, FULL_WIDTH};
    use vigil_core::InMemoryBackend;

    fn config() -> DashboardsConfig {
        DashboardsConfig {
            name: "Orders".to_string(),
            create_summary_dashboard: true,
            ..DashboardsConfig::default()
        }
    }

    #[test]
    fn test_dashboards_created_lazily() {
        let mut factory = DashboardFactory::new(config(), BackendLimits::default());
        assert!(!factory.any_dashboard_created());

        factory
            .add_widget(DashboardKind::Summary, Arc::new(HeaderWidget::new("x", HeaderLevel::Large)))
            .unwrap();

        assert!(factory.any_dashboard_created());
        assert!(factory.dashboard(DashboardKind::Detail).is_none());
        let summary = factory.dashboard(DashboardKind::Summary).unwrap();
        assert_eq!(summary.name, "Orders-Summary");
        assert_eq!(summary.start, "-P14D");
    }

    #[test]
    fn test_disabled_dashboard_drops_widgets() {
        let mut factory = DashboardFactory::new(config(), BackendLimits::default());
        factory
            .add_widget(DashboardKind::AlarmStatus, Arc::new(HeaderWidget::new("x", HeaderLevel::Large)))
            .unwrap();
        assert!(!factory.any_dashboard_created());
    }

    #[test]
    fn test_height_limit_starts_new_page() {
        let limits = BackendLimits {
            max_dashboard_height: 10,
            ..BackendLimits::default()
        };
        let mut factory = DashboardFactory::new(config(), limits);
        for title in ["a", "b", "c"] {
            factory
                .add_widget(DashboardKind::Detail, Arc::new(GraphWidget::new(title, FULL_WIDTH, 5)))
                .unwrap();
        }

        let detail = factory.dashboard(DashboardKind::Detail).unwrap();
        assert_eq!(detail.pages().len(), 2);
        assert_eq!(detail.pages()[0].height(), 10);
        assert_eq!(detail.page_name(1), "Orders-2");
    }

    #[test]
    fn test_oversized_widget_rejected() {
        let limits = BackendLimits {
            max_dashboard_height: 4,
            ..BackendLimits::default()
        };
        let mut factory = DashboardFactory::new(config(), limits);
        let err = factory
            .add_widget(DashboardKind::Detail, Arc::new(GraphWidget::new("tall", FULL_WIDTH, 5)))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(!factory.any_dashboard_created());

        let mut backend = InMemoryBackend::default();
        assert!(factory.finalize(&mut backend).unwrap().is_empty());
        assert!(backend.graph().dashboards.is_empty());
    }

    #[test]
    fn test_segment_routing_and_finalize() {
        let mut factory = DashboardFactory::new(config(), BackendLimits::default());
        let header: Arc<dyn Widget> = Arc::new(HeaderWidget::new("Orders", HeaderLevel::Large));

        factory
            .add_segment(
                &SingleWidgetDashboardSegment::new(Arc::clone(&header)),
                &DashboardPlacement::default(),
            )
            .unwrap();
        factory
            .add_segment(
                &SingleWidgetDashboardSegment::new(header),
                &DashboardPlacement {
                    add_to_summary_dashboard: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let mut backend = InMemoryBackend::default();
        let handles = factory.finalize(&mut backend).unwrap();

        assert_eq!(handles.len(), 2);
        let graph = backend.graph();
        let detail = graph.dashboard("Orders").unwrap();
        assert_eq!(detail.body["widgets"].as_array().map(Vec::len), Some(2));
        assert_eq!(detail.start, "-PT8H");
        let summary = graph.dashboard("Orders-Summary").unwrap();
        assert_eq!(summary.body["widgets"].as_array().map(Vec::len), Some(1));
    }

    fn graph_and_header(rendering_preference: DashboardRenderingPreference) -> DashboardFactory {
        let mut factory = DashboardFactory::new(
            DashboardsConfig {
                rendering_preference,
                ..config()
            },
            BackendLimits::default(),
        );
        factory
            .add_widget(DashboardKind::Detail, Arc::new(HeaderWidget::new("Orders", HeaderLevel::Large)))
            .unwrap();
        factory
            .add_widget(DashboardKind::Detail, Arc::new(GraphWidget::new("Latency", FULL_WIDTH, 6)))
            .unwrap();
        factory
    }

    #[test]
    fn test_bitmap_only_replaces_graphs() {
        let mut backend = InMemoryBackend::default();
        let handles = graph_and_header(DashboardRenderingPreference::BitmapOnly)
            .finalize(&mut backend)
            .unwrap();

        assert_eq!(handles.len(), 1);
        let graph = backend.graph();
        assert!(graph.dashboard("Bitmap-Orders").is_none());
        let widgets = &graph.dashboard("Orders").unwrap().body["widgets"];
        assert_eq!(widgets[0]["type"], "text");
        assert_eq!(widgets[1]["type"], "custom");
        assert_eq!(widgets[1]["properties"]["title"], "Latency");
        assert_eq!(widgets[1]["properties"]["params"]["graph"]["title"], " ");
        assert_eq!(widgets[1]["height"], 6);
    }

    #[test]
    fn test_interactive_and_bitmap_emits_prefixed_copy() {
        let mut backend = InMemoryBackend::default();
        let handles = graph_and_header(DashboardRenderingPreference::InteractiveAndBitmap)
            .finalize(&mut backend)
            .unwrap();

        assert_eq!(handles.len(), 2);
        let graph = backend.graph();
        assert_eq!(graph.dashboard("Orders").unwrap().body["widgets"][1]["type"], "metric");
        let copy = graph.dashboard("Bitmap-Orders").unwrap();
        assert_eq!(copy.body["widgets"][1]["type"], "custom");
        assert_eq!(copy.start, "-PT8H");
    }
}
