use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MarkerId = Uuid;

/// A horizontal line at a fixed document-space Y position, one per knitting row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMarker {
    pub id: MarkerId,
    pub y_position: f64,
    pub is_checked: bool,
}

impl RowMarker {
    pub fn new(y_position: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            y_position,
            is_checked: false,
        }
    }

    pub fn checked(mut self) -> Self {
        self.is_checked = true;
        self
    }
}

/// Upper bound on the markers generated for one document.
pub const MAX_MARKERS: usize = 10_000;

/// Places one marker every `row_height` units from `start_y` while the
/// position stays below `document_height`, at most [`MAX_MARKERS`] of them.
pub fn generate_markers(start_y: f64, row_height: f64, document_height: f64) -> Vec<RowMarker> {
    if !row_height.is_finite() || row_height <= 0.0 || !start_y.is_finite() {
        return Vec::new();
    }
    let span = document_height - start_y;
    if span.is_nan() || span <= 0.0 {
        return Vec::new();
    }

    // `as` saturates, so an infinite or huge quotient lands on the cap.
    let count = ((span / row_height).ceil() as usize).min(MAX_MARKERS);
    (0..count)
        .map(|i| start_y + i as f64 * row_height)
        .take_while(|&y| y < document_height)
        .map(RowMarker::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_evenly_spaced_unchecked_markers() {
        let markers = generate_markers(100.0, 40.0, 300.0);
        let positions: Vec<f64> = markers.iter().map(|m| m.y_position).collect();
        assert_eq!(positions, vec![100.0, 140.0, 180.0, 220.0, 260.0]);
        assert!(markers.iter().all(|m| !m.is_checked));
    }

    #[test]
    fn marker_ids_are_distinct() {
        let markers = generate_markers(0.0, 10.0, 50.0);
        assert_eq!(markers.len(), 5);
        for (i, a) in markers.iter().enumerate() {
            for b in markers.iter().skip(i + 1) {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn start_beyond_document_yields_nothing() {
        assert!(generate_markers(500.0, 40.0, 300.0).is_empty());
    }

    #[test]
    fn non_positive_row_height_yields_nothing() {
        assert!(generate_markers(0.0, 0.0, 300.0).is_empty());
        assert!(generate_markers(0.0, -5.0, 300.0).is_empty());
        assert!(generate_markers(0.0, f64::NAN, 300.0).is_empty());
        assert!(generate_markers(0.0, 10.0, f64::NAN).is_empty());
    }

    #[test]
    fn vanishing_row_height_is_capped() {
        let markers = generate_markers(100.0, 1e-20, 300.0);
        assert_eq!(markers.len(), MAX_MARKERS);
        assert!(markers.iter().all(|m| m.y_position < 300.0));
    }

    #[test]
    fn positions_do_not_accumulate_rounding() {
        let markers = generate_markers(0.0, 0.1, 1.0);
        assert_eq!(markers.len(), 10);
        assert_eq!(markers[9].y_position, 9.0 * 0.1);
    }
}
