use std::path::{Path, PathBuf};

use anyhow::Result;
use uuid::Uuid;

pub mod marker;
pub mod overlay;
pub mod progress;
pub mod repository;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod transform;
pub mod undo;
pub mod viewport;

pub use marker::{generate_markers, MarkerId, RowMarker, MAX_MARKERS};
pub use overlay::{marker_lines, MarkerLine, MarkerStyle};
pub use progress::{ProgressCoordinator, UndoTarget};
pub use repository::{
    FileProgressRepository, MemoryProgressRepository, ProgressRepository, RepositoryError,
};
pub use session::{ChartSession, OpenChart, MAX_ADVANCES_PER_COMMAND, MAX_QUEUED_EVENTS};
pub use settings::{
    AppConfig, ConfigError, HistorySettings, RowSettings, ViewportSettings, MIN_ROW_HEIGHT,
};
pub use snapshot::ProgressSnapshot;
pub use transform::{CoordinateTransform, Point, Rect, Size};
pub use undo::UndoStack;
pub use viewport::Viewport;

pub type DocumentId = Uuid;

/// Stable key for associating saved progress with a file across sessions.
pub fn source_key_for_path(path: &Path) -> String {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    resolved.to_string_lossy().into_owned()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartSource {
    Image(PathBuf),
    Pdf { path: PathBuf, page_index: usize },
}

impl ChartSource {
    pub fn path(&self) -> &Path {
        match self {
            ChartSource::Image(path) => path,
            ChartSource::Pdf { path, .. } => path,
        }
    }
}

/// A loaded chart and its intrinsic size in document units.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartDocument {
    pub id: DocumentId,
    pub title: String,
    pub size: Size,
    pub source: ChartSource,
}

impl ChartDocument {
    pub fn new(title: impl Into<String>, size: Size, source: ChartSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            size,
            source,
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self.source, ChartSource::Pdf { .. })
    }

    /// `0` for images; the page height for PDFs, which flips Y in
    /// [`CoordinateTransform`].
    pub fn page_height(&self) -> f64 {
        if self.is_pdf() {
            self.size.height
        } else {
            0.0
        }
    }

    pub fn source_key(&self) -> String {
        source_key_for_path(self.source.path())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Advance { times: usize },
    UndoRowIndex,
    UndoMarkers,
    UndoCheckCount,
    ApplyRowSettings(RowSettings),
    SetDrawing(Option<Vec<u8>>),
    SetBookmark(Option<Vec<u8>>),
    ZoomBy { factor: f64 },
    ResetZoom,
    ScrollBy { dx: f64, dy: f64 },
    ResizeViewport { width: f64, height: f64 },
    ScrollToCurrentRow,
}

impl Command {
    pub fn undo(target: UndoTarget) -> Self {
        match target {
            UndoTarget::RowIndex => Command::UndoRowIndex,
            UndoTarget::Markers => Command::UndoMarkers,
            UndoTarget::CheckCount => Command::UndoCheckCount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    DocumentOpened(DocumentId),
    DocumentClosed(DocumentId),
    ProgressSeeded(DocumentId),
    ProgressRestored(DocumentId),
    ProgressChanged(DocumentId),
    RedrawNeeded(DocumentId),
}

impl SessionEvent {
    pub fn needs_redraw(&self) -> bool {
        !matches!(self, SessionEvent::ProgressChanged(_))
    }
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<ChartDocument>;
}
