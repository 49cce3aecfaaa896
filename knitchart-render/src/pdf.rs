use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use knitchart_core::Size;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use tracing::warn;

use crate::SourceError;

/// Binds the Pdfium library on first use so image-only sessions never need it.
#[derive(Default)]
pub(crate) struct LazyPdfium {
    inner: Mutex<Option<Arc<Pdfium>>>,
}

impl LazyPdfium {
    fn get(&self) -> Result<Arc<Pdfium>> {
        let mut guard = self.inner.lock();
        if let Some(pdfium) = guard.as_ref() {
            return Ok(Arc::clone(pdfium));
        }
        let pdfium = match bind_pdfium_from_build_hint() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        let pdfium = Arc::new(pdfium);
        *guard = Some(Arc::clone(&pdfium));
        Ok(pdfium)
    }

    /// Media box size of `page_index` in PDF points.
    pub(crate) fn page_size(&self, path: &Path, page_index: usize) -> Result<Size> {
        let pdfium = self.get()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("failed to open {:?}", path))?;
        let pages = document.pages();
        let count = usize::try_from(pages.len()).unwrap_or_default();
        if page_index >= count {
            return Err(SourceError::PageOutOfRange {
                page: page_index,
                count,
            }
            .into());
        }

        let index: PdfPageIndex = page_index
            .try_into()
            .map_err(|_| anyhow!("page {} is out of supported range", page_index))?;
        let page = pages
            .get(index)
            .with_context(|| format!("page {} out of range", page_index))?;
        Ok(Size::new(
            f64::from(page.width().value),
            f64::from(page.height().value),
        ))
    }
}

fn bind_pdfium_from_build_hint() -> Option<Pdfium> {
    match option_env!("KNITCHART_PDFIUM_LIBRARY_PATH") {
        Some(path) if !path.is_empty() => match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!(
                    "failed to load Pdfium from build-provided path {}: {}",
                    path, err
                );
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");

    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}
