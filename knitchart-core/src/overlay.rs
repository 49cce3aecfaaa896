use crate::marker::RowMarker;
use crate::transform::CoordinateTransform;

/// Markers this far outside the viewport are still emitted so lines do not
/// pop in at the edges while scrolling.
pub const CULL_MARGIN: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    Current,
    Checked,
    Unchecked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerLine {
    pub index: usize,
    pub view_y: f64,
    pub style: MarkerStyle,
}

/// View-space placement of every marker near the visible area.
pub fn marker_lines(
    markers: &[RowMarker],
    current_row_index: usize,
    transform: &CoordinateTransform,
    viewport_height: f64,
) -> Vec<MarkerLine> {
    markers
        .iter()
        .enumerate()
        .filter_map(|(index, marker)| {
            let view_y = transform.document_to_view_y(marker.y_position);
            if view_y <= -CULL_MARGIN || view_y >= viewport_height + CULL_MARGIN {
                return None;
            }
            let style = if index == current_row_index {
                MarkerStyle::Current
            } else if marker.is_checked {
                MarkerStyle::Checked
            } else {
                MarkerStyle::Unchecked
            };
            Some(MarkerLine {
                index,
                view_y,
                style,
            })
        })
        .collect()
}
