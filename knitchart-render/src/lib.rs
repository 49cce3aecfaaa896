use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use knitchart_core::{ChartDocument, ChartSource, DocumentProvider, Size};
use thiserror::Error;
use tracing::{debug, instrument};

#[cfg(feature = "pdf")]
mod pdf;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{path:?} is not a supported chart format")]
    UnsupportedFormat { path: std::path::PathBuf },
    #[error("built without PDF support, cannot open {path:?}")]
    PdfSupportDisabled { path: std::path::PathBuf },
    #[error("page {page} out of range, document has {count} pages")]
    PageOutOfRange { page: usize, count: usize },
    #[error("chart {path:?} has an empty size")]
    EmptyDocument { path: std::path::PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Pdf,
}

impl SourceKind {
    pub fn detect(path: &Path) -> SourceKind {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => SourceKind::Pdf,
            _ => SourceKind::Image,
        }
    }
}

/// Opens chart files and reports their size in document units.
///
/// Raster images are measured in pixels with a top-down Y axis. PDF pages
/// are measured in points from the media box, with Y growing upward.
pub struct ChartSourceFactory {
    page_index: usize,
    #[cfg(feature = "pdf")]
    pdfium: pdf::LazyPdfium,
}

impl ChartSourceFactory {
    pub fn new() -> Self {
        Self::with_page(0)
    }

    /// Selects the PDF page to open; ignored for images.
    pub fn with_page(page_index: usize) -> Self {
        Self {
            page_index,
            #[cfg(feature = "pdf")]
            pdfium: pdf::LazyPdfium::default(),
        }
    }

    fn open_image(&self, path: &Path) -> Result<ChartDocument> {
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("failed to read image dimensions of {:?}", path))?;
        debug!(width, height, "measured image chart");
        Ok(ChartDocument::new(
            document_title(path),
            Size::new(f64::from(width), f64::from(height)),
            ChartSource::Image(path.to_path_buf()),
        ))
    }

    #[cfg(feature = "pdf")]
    fn open_pdf(&self, path: &Path) -> Result<ChartDocument> {
        let size = self.pdfium.page_size(path, self.page_index)?;
        debug!(
            width = size.width,
            height = size.height,
            page = self.page_index,
            "measured pdf chart"
        );
        Ok(ChartDocument::new(
            document_title(path),
            size,
            ChartSource::Pdf {
                path: path.to_path_buf(),
                page_index: self.page_index,
            },
        ))
    }

    #[cfg(not(feature = "pdf"))]
    fn open_pdf(&self, path: &Path) -> Result<ChartDocument> {
        Err(SourceError::PdfSupportDisabled {
            path: path.to_path_buf(),
        }
        .into())
    }
}

impl Default for ChartSourceFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentProvider for ChartSourceFactory {
    #[instrument(skip(self))]
    async fn open(&self, path: &Path) -> Result<ChartDocument> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let document = match SourceKind::detect(&absolute) {
            SourceKind::Pdf => self.open_pdf(&absolute)?,
            SourceKind::Image => self.open_image(&absolute).map_err(|err| {
                if image::ImageFormat::from_path(&absolute).is_err() {
                    SourceError::UnsupportedFormat {
                        path: absolute.clone(),
                    }
                    .into()
                } else {
                    err
                }
            })?,
        };
        if document.size.width <= 0.0 || document.size.height <= 0.0 {
            return Err(SourceError::EmptyDocument { path: absolute }.into());
        }
        Ok(document)
    }
}

pub type ChartProvider = ChartSourceFactory;

fn document_title(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_pdf_by_extension() {
        assert_eq!(SourceKind::detect(Path::new("a/b.PDF")), SourceKind::Pdf);
        assert_eq!(SourceKind::detect(Path::new("a/b.png")), SourceKind::Image);
        assert_eq!(SourceKind::detect(Path::new("a/b")), SourceKind::Image);
    }

    #[tokio::test]
    async fn opens_png_with_pixel_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chart.png");
        image::RgbaImage::new(12, 34).save(&path).unwrap();

        let document = ChartSourceFactory::new().open(&path).await.unwrap();
        assert_eq!(document.size, Size::new(12.0, 34.0));
        assert_eq!(document.title, "chart.png");
        assert!(!document.is_pdf());
        assert_eq!(document.page_height(), 0.0);
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "knit 2, purl 2").unwrap();

        let err = ChartSourceFactory::new().open(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(ChartSourceFactory::new()
            .open(&dir.path().join("absent.png"))
            .await
            .is_err());
    }
}
