//! Left-to-right flow layout of widgets on one dashboard page

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::widget::{Widget, FULL_WIDTH};

/// Where a widget landed on its page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WidgetPlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One physical dashboard
#[derive(Debug, Clone, Default)]
pub struct Page {
    widgets: Vec<(Arc<dyn Widget>, WidgetPlacement)>,
    cursor_x: u32,
    cursor_y: u32,
    line_height: u32,
    widget_count: usize,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Backend widgets on this page
    pub fn widget_count(&self) -> usize {
        self.widget_count
    }

    pub fn height(&self) -> u32 {
        self.cursor_y + self.line_height
    }

    pub fn placements(&self) -> impl Iterator<Item = &WidgetPlacement> {
        self.widgets.iter().map(|(_, placement)| placement)
    }

    fn next_position(&self, widget: &dyn Widget) -> (u32, u32, u32) {
        if self.cursor_x > 0 && self.cursor_x + widget.width() > FULL_WIDTH {
            let y = self.cursor_y + self.line_height;
            (0, y, widget.height())
        } else {
            (self.cursor_x, self.cursor_y, self.line_height.max(widget.height()))
        }
    }

    /// Page height if `widget` were placed next
    pub fn height_after(&self, widget: &dyn Widget) -> u32 {
        let (_, y, line_height) = self.next_position(widget);
        y + line_height
    }

    pub fn place(&mut self, widget: Arc<dyn Widget>) -> WidgetPlacement {
        let (x, y, line_height) = self.next_position(widget.as_ref());
        let placement = WidgetPlacement {
            x,
            y,
            width: widget.width(),
            height: widget.height(),
        };

        self.cursor_x = x + widget.width();
        self.cursor_y = y;
        self.line_height = line_height;
        self.widget_count += widget.widget_count();
        self.widgets.push((widget, placement));
        placement
    }

    /// Backend widget definitions of the whole page
    pub fn render(&self) -> Vec<Value> {
        self.widgets
            .iter()
            .flat_map(|(widget, placement)| widget.render(placement.x, placement.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{GraphWidget, HeaderLevel, HeaderWidget, HALF_WIDTH, THIRD_WIDTH};

    #[test]
    fn test_flow_fills_rows_then_wraps() {
        let mut page = Page::new();
        let header = page.place(Arc::new(HeaderWidget::new("Orders", HeaderLevel::Large)));
        let a = page.place(Arc::new(GraphWidget::new("a", HALF_WIDTH, 5)));
        let b = page.place(Arc::new(GraphWidget::new("b", HALF_WIDTH, 6)));
        let c = page.place(Arc::new(GraphWidget::new("c", THIRD_WIDTH, 5)));

        assert_eq!((header.x, header.y), (0, 0));
        assert_eq!((a.x, a.y), (0, 1));
        assert_eq!((b.x, b.y), (12, 1));
        assert_eq!((c.x, c.y), (0, 7));
        assert_eq!(page.height(), 12);
        assert_eq!(page.widget_count(), 4);
        assert_eq!(page.render().len(), 4);
    }

    #[test]
    fn test_height_after_does_not_mutate() {
        let mut page = Page::new();
        page.place(Arc::new(GraphWidget::new("a", HALF_WIDTH, 5)));
        let next = GraphWidget::new("b", FULL_WIDTH, 4);

        assert_eq!(page.height_after(&next), 9);
        assert_eq!(page.height(), 5);
    }
}
