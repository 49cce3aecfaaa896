use crate::settings::ViewportSettings;
use crate::transform::{CoordinateTransform, Point, Size};

/// Scroll and zoom state of the visible area. A fresh [`CoordinateTransform`]
/// is derived from it for every draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom_scale: f64,
    pub content_offset: Point,
    pub size: Size,
    pub page_height: f64,
    limits: ViewportSettings,
}

impl Viewport {
    pub fn new(limits: ViewportSettings, page_height: f64) -> Self {
        Self {
            zoom_scale: limits.clamp_zoom(1.0),
            content_offset: Point::ZERO,
            size: Size::default(),
            page_height: page_height.max(0.0),
            limits,
        }
    }

    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(self.zoom_scale, self.content_offset, self.page_height)
    }

    pub fn resize(&mut self, width: f64, height: f64) -> bool {
        let size = Size::new(width.max(0.0), height.max(0.0));
        let changed = size != self.size;
        self.size = size;
        changed
    }

    pub fn scroll_by(&mut self, dx: f64, dy: f64) -> bool {
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        self.content_offset.x += dx;
        self.content_offset.y += dy;
        true
    }

    /// Sets the zoom, keeping the document point under the viewport centre in place.
    pub fn set_zoom(&mut self, scale: f64) -> bool {
        let scale = self.limits.clamp_zoom(scale);
        if (scale - self.zoom_scale).abs() < f64::EPSILON {
            return false;
        }
        let anchor = Point::new(self.size.width / 2.0, self.size.height / 2.0);
        let document_anchor = self.transform().view_to_document(anchor);
        self.zoom_scale = scale;
        let unshifted = CoordinateTransform::new(scale, Point::ZERO, self.page_height)
            .document_to_view(document_anchor);
        self.content_offset = Point::new(unshifted.x - anchor.x, unshifted.y - anchor.y);
        true
    }

    pub fn zoom_by(&mut self, factor: f64) -> bool {
        self.set_zoom(self.zoom_scale * factor)
    }

    /// Zoom that makes `document_width` fill the viewport width, or `1.0`
    /// while either width is unknown.
    pub fn fit_width_scale(&self, document_width: f64) -> f64 {
        if self.size.width <= 0.0 || document_width <= 0.0 {
            return self.limits.clamp_zoom(1.0);
        }
        self.limits.clamp_zoom(self.size.width / document_width)
    }

    pub fn fit_width(&mut self, document_width: f64) {
        self.zoom_scale = self.fit_width_scale(document_width);
        self.content_offset = Point::ZERO;
    }

    /// Scrolls vertically so the document-space `y` sits mid-viewport.
    pub fn center_on_document_y(&mut self, y: f64) -> bool {
        let unshifted =
            CoordinateTransform::new(self.zoom_scale, Point::ZERO, self.page_height)
                .document_to_view_y(y);
        let offset_y = unshifted - self.size.height / 2.0;
        if (offset_y - self.content_offset.y).abs() < f64::EPSILON {
            return false;
        }
        self.content_offset.y = offset_y;
        true
    }
}
