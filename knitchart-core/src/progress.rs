use crate::marker::{generate_markers, RowMarker};
use crate::settings::RowSettings;
use crate::snapshot::ProgressSnapshot;
use crate::undo::{UndoStack, DEFAULT_MAX_DEPTH};
use crate::DocumentId;

/// Which of the three progress histories an undo targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UndoTarget {
    RowIndex,
    Markers,
    CheckCount,
}

/// Row progress for one open document.
///
/// Row index, markers and check count each have their own history. `advance`
/// pushes all three together; each undo pops exactly one of them, so the
/// histories can be walked back in any order. `reseed` and `restore` reset
/// all three and drop every history.
#[derive(Debug, Clone)]
pub struct ProgressCoordinator {
    document_id: DocumentId,
    row_index: UndoStack<usize>,
    markers: UndoStack<Vec<RowMarker>>,
    check_count: UndoStack<usize>,
    drawing: Option<Vec<u8>>,
    bookmark: Option<Vec<u8>>,
    source_key: Option<String>,
    revision: u64,
}

impl ProgressCoordinator {
    pub fn new(document_id: DocumentId) -> Self {
        Self::with_max_depth(document_id, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(document_id: DocumentId, max_depth: usize) -> Self {
        Self {
            document_id,
            row_index: UndoStack::with_max_depth(0, max_depth),
            markers: UndoStack::with_max_depth(Vec::new(), max_depth),
            check_count: UndoStack::with_max_depth(0, max_depth),
            drawing: None,
            bookmark: None,
            source_key: None,
            revision: 0,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn current_row_index(&self) -> usize {
        *self.row_index.current()
    }

    pub fn markers(&self) -> &[RowMarker] {
        self.markers.current()
    }

    pub fn check_count(&self) -> usize {
        *self.check_count.current()
    }

    pub fn drawing(&self) -> Option<&[u8]> {
        self.drawing.as_deref()
    }

    pub fn bookmark(&self) -> Option<&[u8]> {
        self.bookmark.as_deref()
    }

    pub fn source_key(&self) -> Option<&str> {
        self.source_key.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn can_undo(&self, target: UndoTarget) -> bool {
        match target {
            UndoTarget::RowIndex => self.row_index.can_undo(),
            UndoTarget::Markers => self.markers.can_undo(),
            UndoTarget::CheckCount => self.check_count.can_undo(),
        }
    }

    /// Moves forward by `step_count` rows.
    ///
    /// The marker at the row index held before the move is checked when it
    /// exists. Row index and check count advance either way, so both may run
    /// past the end of the marker list.
    pub fn advance(&mut self, step_count: usize) {
        let new_index = self.current_row_index().saturating_add(step_count);
        self.row_index.push(new_index);

        let mut updated = self.markers.current().clone();
        let prev_index = new_index - step_count;
        if let Some(marker) = updated.get_mut(prev_index) {
            marker.is_checked = true;
        }
        self.markers.push(updated);

        let count = self.check_count().saturating_add(1);
        self.check_count.push(count);
    }

    pub fn undo(&mut self, target: UndoTarget) -> bool {
        match target {
            UndoTarget::RowIndex => self.row_index.undo(),
            UndoTarget::Markers => self.markers.undo(),
            UndoTarget::CheckCount => self.check_count.undo(),
        }
    }

    pub fn undo_row_index(&mut self) -> bool {
        self.undo(UndoTarget::RowIndex)
    }

    pub fn undo_markers(&mut self) -> bool {
        self.undo(UndoTarget::Markers)
    }

    pub fn undo_check_count(&mut self) -> bool {
        self.undo(UndoTarget::CheckCount)
    }

    /// Starts over with `markers`: row index and check count go back to zero
    /// and every history is dropped.
    pub fn reseed(&mut self, markers: Vec<RowMarker>) {
        self.markers.reset(markers);
        self.row_index.reset(0);
        self.check_count.reset(0);
    }

    /// Regenerates markers for a document of `document_height` and reseeds.
    /// All prior progress is discarded.
    pub fn apply_row_settings(&mut self, settings: &RowSettings, document_height: f64) {
        let markers = generate_markers(settings.start_y, settings.row_height, document_height);
        self.reseed(markers);
    }

    /// Adopts a persisted snapshot, identity and side-channel payloads included.
    pub fn restore(&mut self, snapshot: ProgressSnapshot) {
        self.document_id = snapshot.document_id;
        self.markers.reset(snapshot.markers);
        self.row_index.reset(snapshot.current_row_index);
        self.check_count.reset(snapshot.check_count);
        self.drawing = snapshot.drawing;
        self.bookmark = snapshot.bookmark;
        self.source_key = snapshot.source_key;
        self.revision = self.revision.max(snapshot.revision);
    }

    pub fn set_drawing(&mut self, drawing: Option<Vec<u8>>) {
        self.drawing = drawing;
    }

    pub fn set_bookmark(&mut self, bookmark: Option<Vec<u8>>) {
        self.bookmark = bookmark;
    }

    pub fn set_source_key(&mut self, source_key: Option<String>) {
        self.source_key = source_key;
    }

    /// Current values of all three histories plus the side channel.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            document_id: self.document_id,
            current_row_index: self.current_row_index(),
            markers: self.markers().to_vec(),
            check_count: self.check_count(),
            bookmark: self.bookmark.clone(),
            drawing: self.drawing.clone(),
            source_key: self.source_key.clone(),
            revision: self.revision,
        }
    }

    /// Snapshot stamped with a fresh revision, for handing to a repository.
    pub fn next_snapshot(&mut self) -> ProgressSnapshot {
        self.revision += 1;
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn coordinator() -> ProgressCoordinator {
        let mut coordinator = ProgressCoordinator::new(Uuid::new_v4());
        coordinator.reseed(
            [100.0, 140.0, 180.0, 220.0, 260.0]
                .into_iter()
                .map(RowMarker::new)
                .collect(),
        );
        coordinator
    }

    fn checked_flags(coordinator: &ProgressCoordinator) -> Vec<bool> {
        coordinator.markers().iter().map(|m| m.is_checked).collect()
    }

    #[test]
    fn advance_updates_all_three_histories() {
        let mut coordinator = coordinator();
        coordinator.advance(1);

        assert_eq!(coordinator.current_row_index(), 1);
        assert_eq!(coordinator.check_count(), 1);
        assert_eq!(
            checked_flags(&coordinator),
            vec![true, false, false, false, false]
        );
        assert!(coordinator.can_undo(UndoTarget::RowIndex));
        assert!(coordinator.can_undo(UndoTarget::Markers));
        assert!(coordinator.can_undo(UndoTarget::CheckCount));
    }

    #[test]
    fn advance_twice_checks_first_two_rows() {
        let mut coordinator = coordinator();
        coordinator.advance(1);
        coordinator.advance(1);

        assert_eq!(coordinator.current_row_index(), 2);
        assert_eq!(coordinator.check_count(), 2);
        assert_eq!(
            checked_flags(&coordinator),
            vec![true, true, false, false, false]
        );
    }

    #[test]
    fn undo_row_index_leaves_other_histories() {
        let mut coordinator = coordinator();
        coordinator.advance(1);
        coordinator.advance(1);
        let markers = coordinator.markers().to_vec();

        assert!(coordinator.undo_row_index());
        assert_eq!(coordinator.current_row_index(), 1);
        assert_eq!(coordinator.check_count(), 2);
        assert_eq!(coordinator.markers(), markers.as_slice());
    }

    #[test]
    fn undo_markers_leaves_other_histories() {
        let mut coordinator = coordinator();
        coordinator.advance(1);

        assert!(coordinator.undo_markers());
        assert_eq!(coordinator.current_row_index(), 1);
        assert_eq!(coordinator.check_count(), 1);
        assert!(!coordinator.markers()[0].is_checked);
    }

    #[test]
    fn undo_check_count_leaves_other_histories() {
        let mut coordinator = coordinator();
        coordinator.advance(1);
        let markers = coordinator.markers().to_vec();

        assert!(coordinator.undo_check_count());
        assert_eq!(coordinator.check_count(), 0);
        assert_eq!(coordinator.current_row_index(), 1);
        assert_eq!(coordinator.markers(), markers.as_slice());
    }

    #[test]
    fn interleaved_undo_and_advance() {
        let mut coordinator = coordinator();
        coordinator.advance(1);
        coordinator.advance(1);

        coordinator.undo_row_index();
        assert_eq!(coordinator.current_row_index(), 1);
        assert_eq!(coordinator.check_count(), 2);

        coordinator.advance(1);
        assert_eq!(coordinator.current_row_index(), 2);
        assert_eq!(coordinator.check_count(), 3);
        assert_eq!(
            checked_flags(&coordinator),
            vec![true, true, false, false, false]
        );

        coordinator.undo_check_count();
        assert_eq!(coordinator.check_count(), 2);
        assert_eq!(coordinator.current_row_index(), 2);
        coordinator.undo_check_count();
        assert_eq!(coordinator.check_count(), 1);
    }

    #[test]
    fn undoing_everything_returns_to_seed() {
        let mut coordinator = coordinator();
        let seed = coordinator.markers().to_vec();
        coordinator.advance(1);
        coordinator.advance(1);

        while coordinator.undo_row_index() {}
        while coordinator.undo_markers() {}
        while coordinator.undo_check_count() {}

        assert_eq!(coordinator.current_row_index(), 0);
        assert_eq!(coordinator.check_count(), 0);
        assert_eq!(coordinator.markers(), seed.as_slice());
        assert!(!coordinator.undo(UndoTarget::RowIndex));
    }

    #[test]
    fn step_of_two_checks_only_the_starting_row() {
        let mut coordinator = coordinator();
        coordinator.advance(2);

        assert_eq!(coordinator.current_row_index(), 2);
        assert_eq!(coordinator.check_count(), 1);
        assert_eq!(
            checked_flags(&coordinator),
            vec![true, false, false, false, false]
        );
    }

    #[test]
    fn advancing_past_last_marker_keeps_counting() {
        let mut coordinator = coordinator();
        for _ in 0..7 {
            coordinator.advance(1);
        }

        assert_eq!(coordinator.current_row_index(), 7);
        assert_eq!(coordinator.check_count(), 7);
        assert!(coordinator.markers().iter().all(|m| m.is_checked));
        assert_eq!(coordinator.markers().len(), 5);
    }

    #[test]
    fn advance_without_markers_still_pushes_marker_history() {
        let mut coordinator = ProgressCoordinator::new(Uuid::new_v4());
        coordinator.advance(1);
        assert_eq!(coordinator.current_row_index(), 1);
        assert!(coordinator.can_undo(UndoTarget::Markers));
        assert!(coordinator.markers().is_empty());
    }

    #[test]
    fn reseed_discards_progress_and_history() {
        let mut coordinator = coordinator();
        coordinator.advance(1);
        coordinator.advance(1);

        coordinator.reseed(vec![RowMarker::new(5.0)]);
        assert_eq!(coordinator.current_row_index(), 0);
        assert_eq!(coordinator.check_count(), 0);
        assert_eq!(coordinator.markers().len(), 1);
        assert!(!coordinator.can_undo(UndoTarget::RowIndex));
        assert!(!coordinator.can_undo(UndoTarget::Markers));
        assert!(!coordinator.can_undo(UndoTarget::CheckCount));
    }

    #[test]
    fn apply_row_settings_regenerates_markers() {
        let mut coordinator = coordinator();
        coordinator.advance(1);

        let settings = RowSettings {
            start_y: 10.0,
            row_height: 20.0,
            step_count: 1,
        };
        coordinator.apply_row_settings(&settings, 70.0);

        let positions: Vec<f64> = coordinator.markers().iter().map(|m| m.y_position).collect();
        assert_eq!(positions, vec![10.0, 30.0, 50.0]);
        assert_eq!(coordinator.current_row_index(), 0);
        assert!(!coordinator.can_undo(UndoTarget::Markers));
    }

    #[test]
    fn snapshot_restore_round_trip_clears_history() {
        let mut coordinator = coordinator();
        coordinator.advance(1);
        coordinator.advance(2);
        coordinator.set_drawing(Some(vec![1, 2, 3]));
        coordinator.set_source_key(Some("/charts/a.png".into()));
        let snapshot = coordinator.snapshot();

        let mut restored = ProgressCoordinator::new(Uuid::new_v4());
        restored.restore(snapshot.clone());

        assert_eq!(restored.document_id(), coordinator.document_id());
        assert_eq!(restored.current_row_index(), 3);
        assert_eq!(restored.check_count(), 2);
        assert_eq!(restored.markers(), coordinator.markers());
        assert_eq!(restored.drawing(), Some(&[1u8, 2, 3][..]));
        assert_eq!(restored.snapshot(), snapshot);
        assert!(!restored.can_undo(UndoTarget::RowIndex));
        assert!(!restored.can_undo(UndoTarget::Markers));
        assert!(!restored.can_undo(UndoTarget::CheckCount));
    }

    #[test]
    fn snapshot_is_a_pure_read() {
        let mut coordinator = coordinator();
        coordinator.advance(1);
        let first = coordinator.snapshot();
        let second = coordinator.snapshot();
        assert_eq!(first, second);
        assert!(coordinator.can_undo(UndoTarget::RowIndex));
    }

    #[test]
    fn next_snapshot_increments_revision() {
        let mut coordinator = coordinator();
        let first = coordinator.next_snapshot();
        let second = coordinator.next_snapshot();
        assert!(second.revision > first.revision);
        assert_eq!(coordinator.revision(), second.revision);
    }

    #[test]
    fn restore_continues_revision_sequence() {
        let mut coordinator = coordinator();
        let mut snapshot = coordinator.snapshot();
        snapshot.revision = 41;
        coordinator.restore(snapshot);
        assert_eq!(coordinator.next_snapshot().revision, 42);
    }

    #[test]
    fn clearing_drawing_shows_up_in_snapshot() {
        let mut coordinator = coordinator();
        coordinator.set_drawing(Some(vec![1]));
        coordinator.set_drawing(None);
        assert!(coordinator.snapshot().drawing.is_none());
    }
}
