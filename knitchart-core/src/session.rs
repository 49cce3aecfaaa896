use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::progress::{ProgressCoordinator, UndoTarget};
use crate::repository::ProgressRepository;
use crate::settings::{AppConfig, RowSettings};
use crate::snapshot::ProgressSnapshot;
use crate::viewport::Viewport;
use crate::{ChartDocument, Command, DocumentId, DocumentProvider, SessionEvent};

/// Events kept for a consumer that has not drained them; older ones are dropped.
pub const MAX_QUEUED_EVENTS: usize = 256;
/// Advances carried out by a single `Command::Advance`.
pub const MAX_ADVANCES_PER_COMMAND: usize = 1_000;

/// The document currently on screen together with its progress and viewport.
pub struct OpenChart {
    pub document: ChartDocument,
    pub progress: ProgressCoordinator,
    pub viewport: Viewport,
}

/// Drives one chart at a time.
///
/// Commands run synchronously against the in-memory state. Whenever progress
/// changes, a snapshot is handed to the repository on a background task whose
/// failure is only logged; the in-memory state stays authoritative.
pub struct ChartSession {
    repository: Arc<dyn ProgressRepository>,
    config: AppConfig,
    row_settings: RowSettings,
    chart: Option<OpenChart>,
    events: Arc<Mutex<VecDeque<SessionEvent>>>,
    pending_saves: Vec<JoinHandle<()>>,
}

impl ChartSession {
    pub fn new(repository: Arc<dyn ProgressRepository>, config: AppConfig) -> Self {
        Self {
            repository,
            row_settings: config.rows,
            config,
            chart: None,
            events: Arc::new(Mutex::new(VecDeque::new())),
            pending_saves: Vec::new(),
        }
    }

    pub fn events(&self) -> Arc<Mutex<VecDeque<SessionEvent>>> {
        Arc::clone(&self.events)
    }

    /// Takes every queued event, oldest first.
    pub fn drain_events(&self) -> Vec<SessionEvent> {
        self.events.lock().drain(..).collect()
    }

    fn push_event(&self, event: SessionEvent) {
        let mut events = self.events.lock();
        if events.len() >= MAX_QUEUED_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn chart(&self) -> Option<&OpenChart> {
        self.chart.as_ref()
    }

    pub fn progress(&self) -> Option<&ProgressCoordinator> {
        self.chart.as_ref().map(|chart| &chart.progress)
    }

    pub fn row_settings(&self) -> RowSettings {
        self.row_settings
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Option<ProgressSnapshot> {
        self.progress().map(ProgressCoordinator::snapshot)
    }

    #[instrument(skip(self, provider))]
    pub async fn open_with<P: DocumentProvider + ?Sized>(
        &mut self,
        provider: &P,
        path: &Path,
    ) -> Result<()> {
        let document = provider.open(path).await?;
        self.open_document(document).await;
        Ok(())
    }

    /// Replaces the open chart with `document`.
    ///
    /// Saved progress is looked up by document id, then by source key. A match
    /// is restored; otherwise markers are generated from the current row
    /// settings. Lookup failures count as a first open.
    #[instrument(skip(self, document), fields(title = %document.title))]
    pub async fn open_document(&mut self, mut document: ChartDocument) {
        self.close();

        let source_key = document.source_key();
        let existing = self.lookup(document.id, &source_key).await;

        let mut progress =
            ProgressCoordinator::with_max_depth(document.id, self.config.history.max_depth);
        let mut viewport = Viewport::new(self.config.viewport, document.page_height());
        viewport.fit_width(document.size.width);

        let seeded = match existing {
            Some(snapshot) => {
                info!(
                    document = %snapshot.document_id,
                    row = snapshot.current_row_index,
                    "restoring saved progress"
                );
                progress.restore(snapshot);
                document.id = progress.document_id();
                false
            }
            None => {
                progress.set_source_key(Some(source_key));
                progress.apply_row_settings(&self.row_settings, document.size.height);
                info!(
                    document = %document.id,
                    markers = progress.markers().len(),
                    "seeded fresh progress"
                );
                true
            }
        };

        let id = document.id;
        self.chart = Some(OpenChart {
            document,
            progress,
            viewport,
        });

        self.push_event(SessionEvent::DocumentOpened(id));
        self.push_event(if seeded {
            SessionEvent::ProgressSeeded(id)
        } else {
            SessionEvent::ProgressRestored(id)
        });

        if seeded {
            self.schedule_save();
        }
    }

    async fn lookup(&self, id: DocumentId, source_key: &str) -> Option<ProgressSnapshot> {
        match self.repository.load_progress(id).await {
            Ok(Some(snapshot)) => return Some(snapshot),
            Ok(None) => {}
            Err(err) => warn!(?err, document = %id, "failed to load progress"),
        }
        match self.repository.find_progress(source_key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(?err, source_key, "failed to look up progress by source");
                None
            }
        }
    }

    /// Drops the open chart. Its last snapshot was already handed off.
    pub fn close(&mut self) {
        if let Some(chart) = self.chart.take() {
            self.push_event(SessionEvent::DocumentClosed(chart.document.id));
        }
    }

    /// Applies `command` to the open chart and reports whether anything changed.
    pub fn apply(&mut self, command: Command) -> Result<bool> {
        if let Command::ApplyRowSettings(settings) = &command {
            settings.validate()?;
            self.row_settings = *settings;
        }

        let step_count = self.row_settings.step_count;
        let Some(chart) = self.chart.as_mut() else {
            return Ok(matches!(command, Command::ApplyRowSettings(_)));
        };
        let id = chart.document.id;

        let (changed, progress_changed) = match command {
            Command::Advance { times } => {
                if times > MAX_ADVANCES_PER_COMMAND {
                    debug!(times, "capping advance count");
                }
                let times = times.min(MAX_ADVANCES_PER_COMMAND);
                for _ in 0..times {
                    chart.progress.advance(step_count);
                }
                (times > 0, times > 0)
            }
            Command::UndoRowIndex => {
                let undone = chart.progress.undo(UndoTarget::RowIndex);
                (undone, undone)
            }
            Command::UndoMarkers => {
                let undone = chart.progress.undo(UndoTarget::Markers);
                (undone, undone)
            }
            Command::UndoCheckCount => {
                let undone = chart.progress.undo(UndoTarget::CheckCount);
                (undone, undone)
            }
            Command::ApplyRowSettings(settings) => {
                chart
                    .progress
                    .apply_row_settings(&settings, chart.document.size.height);
                (true, true)
            }
            Command::SetDrawing(drawing) => {
                chart.progress.set_drawing(drawing);
                (true, true)
            }
            Command::SetBookmark(bookmark) => {
                chart.progress.set_bookmark(bookmark);
                (true, true)
            }
            Command::ZoomBy { factor } => (chart.viewport.zoom_by(factor), false),
            Command::ResetZoom => {
                let before = chart.viewport;
                chart.viewport.fit_width(chart.document.size.width);
                (before != chart.viewport, false)
            }
            Command::ScrollBy { dx, dy } => (chart.viewport.scroll_by(dx, dy), false),
            Command::ResizeViewport { width, height } => {
                (chart.viewport.resize(width, height), false)
            }
            Command::ScrollToCurrentRow => {
                let index = chart.progress.current_row_index();
                let changed = match chart.progress.markers().get(index) {
                    Some(marker) => chart.viewport.center_on_document_y(marker.y_position),
                    None => false,
                };
                (changed, false)
            }
        };

        if changed {
            if progress_changed {
                self.push_event(SessionEvent::ProgressChanged(id));
            }
            self.push_event(SessionEvent::RedrawNeeded(id));
        }
        if progress_changed {
            self.schedule_save();
        }
        Ok(changed)
    }

    fn schedule_save(&mut self) {
        let Some(chart) = self.chart.as_mut() else {
            return;
        };
        let snapshot = chart.progress.next_snapshot();
        let repository = Arc::clone(&self.repository);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                warn!(?err, document = %snapshot.document_id, "no runtime available, progress not saved");
                return;
            }
        };

        self.pending_saves.retain(|task| !task.is_finished());
        self.pending_saves.push(handle.spawn(async move {
            let id = snapshot.document_id;
            let revision = snapshot.revision;
            match repository.save_progress(&snapshot).await {
                Ok(()) => debug!(document = %id, revision, "progress saved"),
                Err(err) => warn!(?err, document = %id, revision, "failed to save progress"),
            }
        }));
    }

    /// Waits for every save issued so far.
    pub async fn flush(&mut self) {
        for task in self.pending_saves.drain(..) {
            if let Err(err) = task.await {
                warn!(?err, "progress save task did not complete");
            }
        }
    }
}
