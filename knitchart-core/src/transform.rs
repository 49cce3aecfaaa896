use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x.min(self.origin.x + self.size.width)
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y.min(self.origin.y + self.size.height)
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y.max(self.origin.y + self.size.height)
    }

    pub fn width(&self) -> f64 {
        self.size.width.abs()
    }

    pub fn height(&self) -> f64 {
        self.size.height.abs()
    }
}

/// Maps between document space and view space.
///
/// Document space is intrinsic to the source: top-down for raster images,
/// bottom-up for PDF pages. View space has its origin at the viewport's top
/// left corner with Y growing downward.
///
/// `page_height` selects the convention: `0` keeps Y as is (image mode), any
/// positive value flips Y about the page height (PDF mode).
///
/// `zoom_scale` must be positive. Nothing here checks it; callers clamp
/// before constructing a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    pub zoom_scale: f64,
    pub content_offset: Point,
    pub page_height: f64,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            zoom_scale: 1.0,
            content_offset: Point::ZERO,
            page_height: 0.0,
        }
    }
}

impl CoordinateTransform {
    pub fn new(zoom_scale: f64, content_offset: Point, page_height: f64) -> Self {
        Self {
            zoom_scale,
            content_offset,
            page_height,
        }
    }

    pub fn image(zoom_scale: f64, content_offset: Point) -> Self {
        Self::new(zoom_scale, content_offset, 0.0)
    }

    pub fn pdf(zoom_scale: f64, content_offset: Point, page_height: f64) -> Self {
        Self::new(zoom_scale, content_offset, page_height)
    }

    pub fn is_flipped(&self) -> bool {
        self.page_height > 0.0
    }

    pub fn document_to_view(&self, point: Point) -> Point {
        Point {
            x: point.x * self.zoom_scale - self.content_offset.x,
            y: self.document_to_view_y(point.y),
        }
    }

    pub fn view_to_document(&self, point: Point) -> Point {
        Point {
            x: (point.x + self.content_offset.x) / self.zoom_scale,
            y: self.view_to_document_y(point.y),
        }
    }

    /// In PDF mode the rect's document-space top edge is `max_y`, which lands
    /// on the view-space top edge after the flip.
    pub fn document_to_view_rect(&self, rect: Rect) -> Rect {
        let anchor = if self.is_flipped() {
            Point::new(rect.min_x(), rect.max_y())
        } else {
            Point::new(rect.min_x(), rect.min_y())
        };
        Rect {
            origin: self.document_to_view(anchor),
            size: Size {
                width: rect.width() * self.zoom_scale,
                height: rect.height() * self.zoom_scale,
            },
        }
    }

    pub fn document_to_view_y(&self, y: f64) -> f64 {
        let content_y = if self.is_flipped() {
            self.page_height - y
        } else {
            y
        };
        content_y * self.zoom_scale - self.content_offset.y
    }

    pub fn view_to_document_y(&self, y: f64) -> f64 {
        let content_y = (y + self.content_offset.y) / self.zoom_scale;
        if self.is_flipped() {
            self.page_height - content_y
        } else {
            content_y
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOLERANCE: f64 = 1e-3;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < TOLERANCE, "{a} != {b}");
    }

    #[test]
    fn identity_transform_leaves_points_untouched() {
        let transform = CoordinateTransform::default();
        let point = Point::new(12.5, 80.0);
        assert_eq!(transform.document_to_view(point), point);
        assert_eq!(transform.view_to_document(point), point);
    }

    #[test]
    fn image_mode_scales_then_subtracts_offset() {
        let transform = CoordinateTransform::image(2.0, Point::new(10.0, 20.0));
        let view = transform.document_to_view(Point::new(100.0, 200.0));
        assert_close(view.x, 190.0);
        assert_close(view.y, 380.0);
    }

    #[test]
    fn pdf_mode_flips_y_about_page_height() {
        let transform = CoordinateTransform::pdf(1.0, Point::ZERO, 1000.0);
        assert_close(transform.document_to_view_y(0.0), 1000.0);
        assert_close(transform.document_to_view_y(1000.0), 0.0);
        assert_close(transform.document_to_view_y(250.0), 750.0);
    }

    #[test]
    fn pdf_mode_applies_zoom_after_flip() {
        let transform = CoordinateTransform::pdf(2.0, Point::new(50.0, 100.0), 1000.0);
        let view = transform.document_to_view(Point::new(100.0, 250.0));
        assert_close(view.x, 150.0);
        assert_close(view.y, (1000.0 - 250.0) * 2.0 - 100.0);
    }

    #[test]
    fn pdf_rect_anchors_on_document_top_edge() {
        let transform = CoordinateTransform::pdf(2.0, Point::new(50.0, 100.0), 1000.0);
        let rect = Rect::new(100.0, 200.0, 50.0, 50.0);
        let view = transform.document_to_view_rect(rect);
        let expected_origin = transform.document_to_view(Point::new(100.0, 250.0));
        assert_close(view.origin.x, expected_origin.x);
        assert_close(view.origin.y, expected_origin.y);
        assert_close(view.size.width, 100.0);
        assert_close(view.size.height, 100.0);

        let naive = transform.document_to_view(rect.origin);
        assert!((view.origin.y - naive.y).abs() > 1.0);
    }

    #[test]
    fn image_rect_anchors_on_origin() {
        let transform = CoordinateTransform::image(1.5, Point::new(5.0, 5.0));
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);
        let view = transform.document_to_view_rect(rect);
        assert_eq!(view.origin, transform.document_to_view(rect.origin));
        assert_close(view.size.width, 45.0);
        assert_close(view.size.height, 60.0);
    }

    #[test]
    fn y_fast_path_matches_point_form() {
        for transform in [
            CoordinateTransform::image(0.75, Point::new(3.0, 9.0)),
            CoordinateTransform::pdf(0.75, Point::new(3.0, 9.0), 842.0),
        ] {
            let point = Point::new(17.0, 311.0);
            assert_close(
                transform.document_to_view_y(point.y),
                transform.document_to_view(point).y,
            );
            assert_close(
                transform.view_to_document_y(point.y),
                transform.view_to_document(point).y,
            );
        }
    }

    proptest! {
        #[test]
        fn round_trip_recovers_document_point(
            zoom in 0.01f64..20.0,
            offset_x in -5_000.0f64..5_000.0,
            offset_y in -5_000.0f64..5_000.0,
            page_height in prop_oneof![Just(0.0f64), 1.0f64..5_000.0],
            x in -5_000.0f64..5_000.0,
            y in -5_000.0f64..5_000.0,
        ) {
            let transform = CoordinateTransform::new(zoom, Point::new(offset_x, offset_y), page_height);
            let back = transform.view_to_document(transform.document_to_view(Point::new(x, y)));
            prop_assert!((back.x - x).abs() < TOLERANCE);
            prop_assert!((back.y - y).abs() < TOLERANCE);
        }

        #[test]
        fn view_y_is_monotonic_in_document_y(
            zoom in 0.01f64..20.0,
            offset_y in -5_000.0f64..5_000.0,
            page_height in 1.0f64..5_000.0,
            y in -5_000.0f64..5_000.0,
            delta in 0.5f64..100.0,
        ) {
            let pdf = CoordinateTransform::pdf(zoom, Point::new(0.0, offset_y), page_height);
            prop_assert!(pdf.document_to_view_y(y + delta) < pdf.document_to_view_y(y));

            let image = CoordinateTransform::image(zoom, Point::new(0.0, offset_y));
            prop_assert!(image.document_to_view_y(y + delta) > image.document_to_view_y(y));
        }
    }
}
