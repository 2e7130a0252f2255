//! Dashboard widgets
//!
//! Every widget reports its own size on the 24 column grid and how many
//! backend widgets it occupies. Widgets are immutable once built and shared
//! between dashboards through `Arc<dyn Widget>`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::Arc;

use vigil_core::alarm::{Alarm, Annotation, FillDirection};
use vigil_core::Metric;

/// Grid width of a dashboard
pub const FULL_WIDTH: u32 = 24;
pub const HALF_WIDTH: u32 = FULL_WIDTH / 2;
pub const THIRD_WIDTH: u32 = FULL_WIDTH / 3;
pub const QUARTER_WIDTH: u32 = FULL_WIDTH / 4;

pub const DEFAULT_GRAPH_WIDGET_HEIGHT: u32 = 5;
pub const DEFAULT_SUMMARY_WIDGET_HEIGHT: u32 = 6;
pub const DEFAULT_ALARM_WIDGET_WIDTH: u32 = 6;
pub const DEFAULT_ALARM_WIDGET_HEIGHT: u32 = 4;

/// Standard metric colors
pub mod colors {
    pub const HEALTHY: &str = "#2ca02c";
    pub const UNHEALTHY: &str = "#d62728";
    pub const WARNING: &str = "#ff9900";
    pub const ERROR: &str = "#d13212";
    pub const NEUTRAL: &str = "#999999";
}

/// Widest width that still fits `count` widgets into the fewest rows
pub fn recommended_widget_width(count: usize) -> u32 {
    let rows = |width: u32| (count.max(1) as u32 * width).div_ceil(FULL_WIDTH);
    let widths = [QUARTER_WIDTH, THIRD_WIDTH, HALF_WIDTH, FULL_WIDTH];

    let mut i = 0;
    while i < widths.len() - 1 && rows(widths[i + 1]) == rows(widths[i]) {
        i += 1;
    }
    widths[i]
}

/// A unit of dashboard content
pub trait Widget: Debug + Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Backend widgets this occupies
    fn widget_count(&self) -> usize {
        1
    }

    fn kind(&self) -> &'static str;

    /// Render at grid position `(x, y)`
    fn render(&self, x: u32, y: u32) -> Vec<Value>;
}

fn placed(kind: &str, x: u32, y: u32, width: u32, height: u32, properties: Value) -> Value {
    json!({
        "type": kind,
        "x": x,
        "y": y,
        "width": width,
        "height": height,
        "properties": properties,
    })
}

/// Swap a rendered graph for a custom widget that draws it as an image.
/// Other widgets pass through unchanged.
pub fn as_bitmap(mut rendered: Value) -> Value {
    if rendered["type"] != "metric" {
        return rendered;
    }
    let mut graph = rendered["properties"].take();
    let title = graph["title"].take();
    // the outer widget carries the title
    graph["title"] = json!(" ");

    rendered["type"] = json!("custom");
    rendered["properties"] = json!({
        "title": title,
        "params": { "graph": graph },
        "updateOn": { "refresh": true, "resize": true, "timeRange": true },
    });
    rendered
}

/// Free-form markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWidget {
    markdown: String,
    width: u32,
    height: u32,
}

impl TextWidget {
    pub fn new<S: Into<String>>(markdown: S, width: u32, height: u32) -> Self {
        Self {
            markdown: markdown.into(),
            width,
            height,
        }
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }
}

impl Widget for TextWidget {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn kind(&self) -> &'static str {
        "text"
    }

    fn render(&self, x: u32, y: u32) -> Vec<Value> {
        vec![placed(
            "text",
            x,
            y,
            self.width,
            self.height,
            json!({ "markdown": self.markdown }),
        )]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderLevel {
    Large,
    Medium,
    Small,
}

impl HeaderLevel {
    fn hashes(&self) -> &'static str {
        match self {
            HeaderLevel::Large => "#",
            HeaderLevel::Medium => "##",
            HeaderLevel::Small => "###",
        }
    }
}

/// Full-width one-line markdown header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderWidget {
    text: TextWidget,
}

impl HeaderWidget {
    pub fn new(text: &str, level: HeaderLevel) -> Self {
        Self {
            text: TextWidget::new(format!("{} {}", level.hashes(), text), FULL_WIDTH, 1),
        }
    }

    /// Header of a monitored resource, e.g. `SQS Queue **[orders](link)**`
    pub fn monitoring(family: Option<&str>, title: &str, link: Option<&str>) -> Self {
        let title = match link {
            Some(link) => format!("[{}]({})", title, link),
            None => title.to_string(),
        };
        let text = match family {
            Some(family) => format!("{} **{}**", family, title),
            None => title,
        };
        Self::new(&text, HeaderLevel::Small)
    }

    pub fn markdown(&self) -> &str {
        self.text.markdown()
    }
}

impl Widget for HeaderWidget {
    fn width(&self) -> u32 {
        self.text.width()
    }

    fn height(&self) -> u32 {
        self.text.height()
    }

    fn kind(&self) -> &'static str {
        "header"
    }

    fn render(&self, x: u32, y: u32) -> Vec<Value> {
        self.text.render(x, y)
    }
}

/// Time series graph with optional threshold annotations
#[derive(Debug, Clone, PartialEq)]
pub struct GraphWidget {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub left: Vec<Metric>,
    pub left_annotations: Vec<Annotation>,
    pub left_axis_min: Option<f64>,
}

impl GraphWidget {
    pub fn new<S: Into<String>>(title: S, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            left: Vec::new(),
            left_annotations: Vec::new(),
            left_axis_min: Some(0.0),
        }
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.left.push(metric);
        self
    }

    pub fn annotations<I: IntoIterator<Item = Annotation>>(mut self, annotations: I) -> Self {
        self.left_annotations.extend(annotations);
        self
    }

    fn render_metric(metric: &Metric) -> Value {
        let mut rendered = json!({ "label": metric.label, "period": metric.period_seconds });
        if let Some(expression) = metric.expression() {
            rendered["expression"] = json!(expression);
        } else if let Ok(source) = serde_json::to_value(&metric.source) {
            rendered["source"] = source;
        }
        if let Some(color) = &metric.color {
            rendered["color"] = json!(color);
        }
        rendered
    }

    fn render_annotation(annotation: &Annotation) -> Value {
        let mut rendered = json!({
            "value": annotation.value,
            "label": annotation.label,
            "visible": annotation.visible,
        });
        if let Some(color) = &annotation.color {
            rendered["color"] = json!(color);
        }
        match annotation.fill {
            FillDirection::Above => rendered["fill"] = json!("above"),
            FillDirection::Below => rendered["fill"] = json!("below"),
            FillDirection::None => {}
        }
        rendered
    }
}

impl Widget for GraphWidget {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn kind(&self) -> &'static str {
        "graph"
    }

    fn render(&self, x: u32, y: u32) -> Vec<Value> {
        let properties = json!({
            "title": self.title,
            "view": "timeSeries",
            "metrics": self.left.iter().map(Self::render_metric).collect::<Vec<_>>(),
            "annotations": {
                "horizontal": self
                    .left_annotations
                    .iter()
                    .map(Self::render_annotation)
                    .collect::<Vec<_>>(),
            },
            "yAxis": { "left": { "min": self.left_axis_min } },
        });
        vec![placed("metric", x, y, self.width, self.height, properties)]
    }
}

/// Single alarm with its metric and threshold
#[derive(Debug, Clone)]
pub struct AlarmWidget {
    alarm: Arc<Alarm>,
    width: u32,
    height: u32,
}

impl AlarmWidget {
    pub fn new(alarm: Arc<Alarm>) -> Self {
        Self {
            alarm,
            width: DEFAULT_ALARM_WIDGET_WIDTH,
            height: DEFAULT_ALARM_WIDGET_HEIGHT,
        }
    }

    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }
}

impl Widget for AlarmWidget {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn kind(&self) -> &'static str {
        "alarm"
    }

    fn render(&self, x: u32, y: u32) -> Vec<Value> {
        let properties = json!({
            "title": self.alarm.widget_label,
            "annotations": { "alarms": [self.alarm.backend_handle.as_str()] },
        });
        vec![placed("metric", x, y, self.width, self.height, properties)]
    }
}

/// State overview over many alarms
#[derive(Debug, Clone)]
pub struct AlarmStatusWidget {
    title: String,
    alarms: Vec<Arc<Alarm>>,
    width: u32,
    height: u32,
}

impl AlarmStatusWidget {
    pub fn new<S: Into<String>>(title: S, alarms: Vec<Arc<Alarm>>) -> Self {
        let rows = alarms.len().div_ceil(4).max(1) as u32;
        Self {
            title: title.into(),
            alarms,
            width: FULL_WIDTH,
            height: rows + 1,
        }
    }
}

impl Widget for AlarmStatusWidget {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn kind(&self) -> &'static str {
        "alarm_status"
    }

    fn render(&self, x: u32, y: u32) -> Vec<Value> {
        let alarms: Vec<&str> = self.alarms.iter().map(|a| a.backend_handle.as_str()).collect();
        vec![placed(
            "alarm",
            x,
            y,
            self.width,
            self.height,
            json!({ "title": self.title, "alarms": alarms }),
        )]
    }
}

/// Widgets laid out left to right, wrapping at the grid width. Never split across pages.
#[derive(Debug, Clone)]
pub struct Row {
    children: Vec<Arc<dyn Widget>>,
}

impl Row {
    pub fn new(children: Vec<Arc<dyn Widget>>) -> Self {
        Self { children }
    }

    /// Child offsets relative to the row origin, plus the total height
    fn offsets(&self) -> (Vec<(u32, u32)>, u32) {
        let mut offsets = Vec::with_capacity(self.children.len());
        let (mut x, mut y, mut line_height) = (0, 0, 0);

        for child in &self.children {
            if x > 0 && x + child.width() > FULL_WIDTH {
                x = 0;
                y += line_height;
                line_height = 0;
            }
            offsets.push((x, y));
            x += child.width();
            line_height = line_height.max(child.height());
        }
        (offsets, y + line_height)
    }
}

impl Widget for Row {
    fn width(&self) -> u32 {
        let total: u32 = self.children.iter().map(|c| c.width()).sum();
        total.min(FULL_WIDTH)
    }

    fn height(&self) -> u32 {
        self.offsets().1
    }

    fn widget_count(&self) -> usize {
        self.children.iter().map(|c| c.widget_count()).sum()
    }

    fn kind(&self) -> &'static str {
        "row"
    }

    fn render(&self, x: u32, y: u32) -> Vec<Value> {
        let (offsets, _) = self.offsets();
        self.children
            .iter()
            .zip(offsets)
            .flat_map(|(child, (dx, dy))| child.render(x + dx, y + dy))
            .collect()
    }
}
