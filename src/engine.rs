use crate::canvas::{Canvas, Document};
use crate::debug::{BreakReason, DebugLogger};
use crate::error::DossierError;
use crate::finalize::{CoverPage, FinalizeContext, finalize_document};
use crate::font::FontRegistry;
use crate::geometry::{PageContext, PageGeometry, PageMargins};
use crate::lifecycle::{LifecycleState, PageLifecycle};
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::pdf;
use crate::theme::{DocumentKind, Theme};
use crate::toc::{TocEntry, TocTracker};
use crate::types::Pt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Drawing position, top-left based. Only primitives move it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CursorState {
    pub x: Pt,
    pub y: Pt,
}

#[derive(Debug, Clone)]
pub struct DocumentState {
    pub page_number: usize,
    /// Set by `finish` once the content page count exceeds the threshold and
    /// front matter has been inserted.
    pub structural: bool,
    pub toc: TocTracker,
    pub running_label: String,
}

#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    pub geometry: PageGeometry,
    pub threshold: usize,
    pub pdf_title: Option<String>,
}

/// Lays out exactly one document. Primitives live in `flow`, page furnishing
/// in `lifecycle`.
pub struct DocumentEngine {
    pub(crate) canvas: Canvas,
    pub(crate) fonts: Arc<FontRegistry>,
    pub(crate) geometry: PageGeometry,
    pub(crate) theme: Arc<dyn Theme>,
    pub(crate) lifecycle: PageLifecycle,
    pub(crate) state: DocumentState,
    pub(crate) cursor: CursorState,
    pub(crate) debug: Option<DebugLogger>,
    pub(crate) doc_id: usize,
    kind: DocumentKind,
    threshold: usize,
    pdf_title: Option<String>,
    started: Instant,
}

impl DocumentEngine {
    /// Opens the engine and primes page 1.
    pub(crate) fn new(
        config: EngineConfig,
        fonts: Arc<FontRegistry>,
        theme: Arc<dyn Theme>,
        kind: DocumentKind,
        running_label: String,
        debug: Option<DebugLogger>,
        doc_id: usize,
    ) -> Result<Self, DossierError> {
        let canvas = Canvas::new(config.geometry.page_size(), fonts.clone());
        let first_page = canvas.page_number();
        let mut engine = Self {
            canvas,
            fonts,
            geometry: config.geometry,
            theme,
            lifecycle: PageLifecycle::new(),
            state: DocumentState {
                page_number: 0,
                structural: false,
                toc: TocTracker::new(),
                running_label,
            },
            cursor: CursorState::default(),
            debug,
            doc_id,
            kind,
            threshold: config.threshold,
            pdf_title: config.pdf_title,
            started: Instant::now(),
        };
        engine.on_page_started(first_page)?;
        Ok(engine)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn theme(&self) -> &dyn Theme {
        self.theme.as_ref()
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn page_number(&self) -> usize {
        self.state.page_number
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut CursorState {
        &mut self.cursor
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn toc(&self) -> &TocTracker {
        &self.state.toc
    }

    pub fn page_context(&self) -> PageContext {
        // The engine only lays out content pages; structural ones come from the finalizer.
        PageContext::new(self.state.page_number, false)
    }

    /// Margins of the current page, recomputed on every call.
    pub fn margins(&self) -> PageMargins {
        self.geometry.margins(self.page_context())
    }

    pub fn remaining_height(&self) -> Pt {
        (self.geometry.content_bottom() - self.cursor.y).max(Pt::ZERO)
    }

    /// True while nothing has been placed below the furnishings of this page.
    pub fn at_page_top(&self) -> bool {
        self.cursor.y <= self.margins().top
    }

    /// Moves to the next page and furnishes it. Returns `false` when page breaks
    /// are suppressed because furnishings are being drawn.
    pub(crate) fn break_page(&mut self, reason: BreakReason) -> Result<bool, DossierError> {
        if self.lifecycle.is_furnishing() {
            return Ok(false);
        }
        let from = self.state.page_number;
        let to = self.canvas.begin_page();
        if let Some(debug) = &self.debug {
            debug.page_break(self.doc_id, reason, from, to);
        }
        self.on_page_started(to)?;
        Ok(true)
    }

    /// Closes the document, inserts structural pages when it is long enough
    /// and resolves page numbers. Nothing is drawn after this.
    pub fn finish(mut self, cover: CoverPage) -> Result<RenderedDocument, DossierError> {
        self.lifecycle.begin_finalizing()?;
        let document = self.canvas.finish();
        let content_pages = document.page_count();
        let finalized = finalize_document(
            document,
            std::mem::take(&mut self.state.toc).into_entries(),
            &cover,
            &FinalizeContext {
                fonts: &self.fonts,
                geometry: &self.geometry,
                theme: self.theme.as_ref(),
                threshold: self.threshold,
            },
        )?;

        if let Some(debug) = &self.debug {
            if finalized.structural_pages > 0 {
                debug.restructure(
                    self.doc_id,
                    content_pages,
                    finalized.structural_pages,
                    finalized.toc_pages,
                );
            }
            debug.emit_summary(self.doc_id);
            debug.flush();
        }

        let metrics = DocumentMetrics {
            pages: finalized
                .document
                .pages
                .iter()
                .enumerate()
                .map(|(index, page)| PageMetrics {
                    page_number: index + 1,
                    structural: page.structural,
                    command_count: page.commands.len(),
                    content_bytes: 0,
                })
                .collect(),
            toc_entries: finalized.toc.len(),
            structural_pages: finalized.structural_pages,
            layout_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            total_bytes: 0,
        };

        let mut toc = TocTracker::new();
        for entry in finalized.toc {
            toc.record(entry.title, entry.level, entry.page_number);
        }
        self.state.toc = toc;
        self.state.structural = finalized.structural_pages > 0;
        self.state.page_number = finalized.document.page_count();

        Ok(RenderedDocument {
            document: finalized.document,
            state: self.state,
            fonts: self.fonts,
            pdf_title: self.pdf_title,
            metrics,
        })
    }
}

/// A finished, restructured document held in memory until it is written.
pub struct RenderedDocument {
    document: Document,
    state: DocumentState,
    fonts: Arc<FontRegistry>,
    pdf_title: Option<String>,
    metrics: DocumentMetrics,
}

impl RenderedDocument {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }

    /// Entries with their final page numbers.
    pub fn toc(&self) -> &[TocEntry] {
        self.state.toc.entries()
    }

    /// Final state: page count, the structural flag and the renumbered contents.
    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn structural_pages(&self) -> usize {
        self.metrics.structural_pages
    }

    pub fn metrics(&self) -> &DocumentMetrics {
        &self.metrics
    }

    /// Streams the PDF. The result is reported once, after the last byte.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<DocumentMetrics, DossierError> {
        let stats = pdf::write_pdf(
            &self.document,
            &self.fonts,
            self.pdf_title.as_deref(),
            writer,
        )?;
        let mut metrics = self.metrics.clone();
        metrics.total_bytes = stats.total_bytes;
        for (page, bytes) in metrics.pages.iter_mut().zip(stats.page_content_bytes) {
            page.content_bytes = bytes;
        }
        Ok(metrics)
    }

    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>, DossierError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// A failed write leaves whatever was already written in place.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<DocumentMetrics, DossierError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let metrics = self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeSpec;
    use std::io;

    /// Accepts `budget` bytes, then fails every write.
    struct FailingWriter {
        budget: usize,
        written: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.budget - self.written;
            if room == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = room.min(buf.len());
            self.written += n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn rendered() -> RenderedDocument {
        let dossier = crate::Dossier::builder().build().unwrap();
        let mut engine = dossier
            .open(Arc::new(ThemeSpec::classic()), DocumentKind::Danger, "Bell")
            .unwrap();
        engine
            .paragraph("The bell rings by itself at the turn of the tide.", &Default::default())
            .unwrap();
        engine.page_break().unwrap();
        engine
            .paragraph("Nobody has climbed the tower since the flood.", &Default::default())
            .unwrap();
        engine.finish(CoverPage::new("Bell")).unwrap()
    }

    #[test]
    fn write_failure_mid_stream_is_the_single_result() {
        let doc = rendered();
        let full = doc.to_pdf_bytes().unwrap();
        let mut writer = FailingWriter {
            budget: full.len() / 2,
            written: 0,
        };
        let err = doc.write_to(&mut writer).expect_err("write must fail");
        assert!(matches!(err, DossierError::Io(_)), "{err}");
        assert_eq!(writer.written, full.len() / 2);

        // The document is untouched and can still be written in full.
        let again = doc.to_pdf_bytes().unwrap();
        assert_eq!(again, full);
    }

    #[test]
    fn finished_state_reflects_the_final_document() {
        let doc = rendered();
        assert_eq!(doc.state().page_number, 2);
        assert!(!doc.state().structural);
        assert_eq!(doc.state().running_label, "Danger: Bell");
        let metrics = doc.write_to(&mut Vec::new()).unwrap();
        assert!(metrics.total_bytes > 0);
        assert_eq!(metrics.pages.len(), 2);
    }
}
