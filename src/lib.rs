mod batch;
mod canvas;
mod debug;
mod engine;
mod error;
mod finalize;
mod flow;
mod font;
mod generator;
mod geometry;
mod inspect;
mod lifecycle;
mod metrics;
mod output;
mod pdf;
mod theme;
mod toc;
mod types;

pub use batch::{BatchJob, render_batch};
pub use canvas::{Canvas, Command, Document, Page, Paint};
pub use debug::BreakReason;
pub use engine::{CursorState, DocumentEngine, DocumentState, RenderedDocument};
pub use error::DossierError;
pub use finalize::{CoverPage, META_PAGE_ROLE_KEY};
pub use flow::{
    ListOptions, ParagraphOptions, StyledRun, TextAlign, TitleOptions, WrappedLine, wrap_words,
};
pub use font::{HELVETICA, HELVETICA_BOLD};
pub use generator::{Callout, ContentGenerator, DossierData, Section, SectionedDossier};
pub use geometry::{PageContext, PageGeometry, PageMargins, Parity};
pub use inspect::{PdfInspectReport, inspect_pdf_bytes, inspect_pdf_path, page_texts};
pub use lifecycle::LifecycleState;
pub use metrics::{DocumentMetrics, PageMetrics};
pub use output::{fingerprint, output_file_name, write_named};
pub use theme::{
    BoxStyle, CalloutSpec, DocumentKind, Labels, ParagraphKind, SidebarSpec, SidebarStyle,
    TextStyle, Theme, ThemeSpec, fallback_title_size,
};
pub use toc::{TocEntry, TocTracker};
pub use types::{Color, Margins, Pt, Rect, Size};

use debug::DebugLogger;
use engine::EngineConfig;
use font::FontRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared, validated layout setup. Every document gets its own engine, so one
/// `Dossier` can render many documents, also from several threads.
pub struct Dossier {
    fonts: Arc<FontRegistry>,
    geometry: PageGeometry,
    threshold: usize,
    debug: Option<DebugLogger>,
    pdf_title: Option<String>,
    next_doc: AtomicUsize,
}

pub struct DossierBuilder {
    page_size: Size,
    margins: Margins,
    sidebar_width: Pt,
    sidebar_gap: Pt,
    threshold: usize,
    font_files: Vec<(PathBuf, Option<String>)>,
    font_dirs: Vec<PathBuf>,
    debug_path: Option<PathBuf>,
    pdf_title: Option<String>,
}

impl Default for DossierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DossierBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::all(40.0),
            sidebar_width: Pt::from_i32(28),
            sidebar_gap: Pt::from_i32(14),
            threshold: 5,
            font_files: Vec::new(),
            font_dirs: Vec::new(),
            debug_path: None,
            pdf_title: None,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn sidebar_width(mut self, width: Pt) -> Self {
        self.sidebar_width = width;
        self
    }

    pub fn sidebar_gap(mut self, gap: Pt) -> Self {
        self.sidebar_gap = gap;
        self
    }

    /// Documents with more content pages than this get a cover and contents.
    pub fn structural_threshold(mut self, pages: usize) -> Self {
        self.threshold = pages;
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push((path.into(), None));
        self
    }

    /// Registers a font that themes refer to as `alias`.
    pub fn register_font_file_as(
        mut self,
        path: impl Into<PathBuf>,
        alias: impl Into<String>,
    ) -> Self {
        self.font_files.push((path.into(), Some(alias.into())));
        self
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn pdf_title(mut self, title: impl Into<String>) -> Self {
        self.pdf_title = Some(title.into());
        self
    }

    pub fn build(self) -> Result<Dossier, DossierError> {
        if self.sidebar_width < Pt::ZERO || self.sidebar_gap < Pt::ZERO {
            return Err(DossierError::InvalidConfiguration(
                "sidebar_width and sidebar_gap must not be negative".to_string(),
            ));
        }
        let m = self.margins;
        if [m.top, m.right, m.bottom, m.left]
            .iter()
            .any(|side| *side < Pt::ZERO)
        {
            return Err(DossierError::InvalidConfiguration(
                "margins must not be negative".to_string(),
            ));
        }
        if self.threshold == 0 {
            return Err(DossierError::InvalidConfiguration(
                "structural_threshold must be at least 1".to_string(),
            ));
        }
        let geometry = PageGeometry::new(
            self.page_size,
            self.margins,
            self.sidebar_width,
            self.sidebar_gap,
        );
        let sidebar_page = geometry.margins_for(1, false);
        if sidebar_page.content_width <= Pt::ZERO {
            return Err(DossierError::InvalidConfiguration(format!(
                "margins and sidebar leave no content width ({} pt) on a {} pt wide page",
                sidebar_page.content_width.to_f32(),
                self.page_size.width.to_f32()
            )));
        }
        if geometry.writable_height() <= Pt::ZERO {
            return Err(DossierError::InvalidConfiguration(
                "top and bottom margins leave no writable height".to_string(),
            ));
        }

        let mut registry = FontRegistry::new();
        for dir in &self.font_dirs {
            registry.register_dir(dir)?;
        }
        for (file, alias) in &self.font_files {
            registry.register_file(file, alias.as_deref())?;
        }
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        Ok(Dossier {
            fonts: Arc::new(registry),
            geometry,
            threshold: self.threshold,
            debug,
            pdf_title: self.pdf_title,
            next_doc: AtomicUsize::new(1),
        })
    }
}

impl Dossier {
    pub fn builder() -> DossierBuilder {
        DossierBuilder::new()
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Whether `name` can be used as a font by themes.
    pub fn has_font(&self, name: &str) -> bool {
        self.fonts.contains(name)
    }

    /// Primary names of every registered font, built-ins first.
    pub fn font_names(&self) -> Vec<String> {
        self.fonts.fonts().map(|font| font.name.clone()).collect()
    }

    /// Opens a fresh engine with page 1 furnished. The theme is checked first
    /// so a bad theme never produces a partial page.
    pub fn open(
        &self,
        theme: Arc<dyn Theme>,
        kind: DocumentKind,
        title: &str,
    ) -> Result<DocumentEngine, DossierError> {
        theme.validate()?;
        let missing: Vec<String> = theme
            .font_names()
            .into_iter()
            .filter(|name| !self.fonts.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(DossierError::Theme(format!(
                "{}: fonts not registered: {}",
                theme.id(),
                missing.join(", ")
            )));
        }
        let running_label = theme.running_label_for(kind, title);
        DocumentEngine::new(
            EngineConfig {
                geometry: self.geometry.clone(),
                threshold: self.threshold,
                pdf_title: self.pdf_title.clone().or_else(|| Some(title.to_string())),
            },
            self.fonts.clone(),
            theme,
            kind,
            running_label,
            self.debug.clone(),
            self.next_doc.fetch_add(1, Ordering::Relaxed),
        )
    }

    /// Runs `generator` on a fresh engine and finalizes the result.
    pub fn render(
        &self,
        generator: &dyn ContentGenerator,
        theme: Arc<dyn Theme>,
    ) -> Result<RenderedDocument, DossierError> {
        let mut engine = self.open(theme, generator.kind(), generator.title())?;
        generator.generate(&mut engine)?;
        engine.finish(generator.cover())
    }

    pub fn render_to_path(
        &self,
        generator: &dyn ContentGenerator,
        theme: Arc<dyn Theme>,
        path: impl AsRef<Path>,
    ) -> Result<DocumentMetrics, DossierError> {
        self.render(generator, theme)?.write_to_path(path)
    }

    pub fn render_batch(&self, jobs: &[BatchJob]) -> Vec<Result<RenderedDocument, DossierError>> {
        render_batch(self, jobs)
    }
}
