use crate::engine::{CursorState, DocumentEngine};
use crate::error::DossierError;
use crate::types::Pt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    BeforeFirstPage,
    OnPage(usize),
    Finalizing,
}

/// Tracks which page is open and whether furnishings are being drawn.
#[derive(Debug)]
pub(crate) struct PageLifecycle {
    state: LifecycleState,
    furnishing: bool,
}

impl PageLifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::BeforeFirstPage,
            furnishing: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Pages are entered strictly in order, starting at 1.
    pub fn enter_page(&mut self, page: usize) -> Result<(), DossierError> {
        let expected = match self.state {
            LifecycleState::BeforeFirstPage => 1,
            LifecycleState::OnPage(current) => current + 1,
            LifecycleState::Finalizing => {
                return Err(DossierError::Lifecycle(format!(
                    "cannot open page {page} after the document was finished"
                )));
            }
        };
        if page != expected {
            return Err(DossierError::Lifecycle(format!(
                "expected page {expected}, got page {page}"
            )));
        }
        self.state = LifecycleState::OnPage(page);
        Ok(())
    }

    pub fn begin_finalizing(&mut self) -> Result<usize, DossierError> {
        match self.state {
            LifecycleState::OnPage(page) => {
                self.state = LifecycleState::Finalizing;
                Ok(page)
            }
            LifecycleState::BeforeFirstPage => Err(DossierError::Lifecycle(
                "document was never opened".to_string(),
            )),
            LifecycleState::Finalizing => Err(DossierError::Lifecycle(
                "document is already finalizing".to_string(),
            )),
        }
    }

    pub fn is_furnishing(&self) -> bool {
        self.furnishing
    }

    pub(crate) fn set_furnishing(&mut self, furnishing: bool) {
        self.furnishing = furnishing;
    }
}

/// Label size that makes a label of `width` (measured at `size`) fit in
/// `available`, never going below `min_size`.
pub(crate) fn fit_label_size(width: Pt, available: Pt, size: Pt, min_size: Pt) -> Pt {
    if width <= available || width <= Pt::ZERO {
        return size;
    }
    let scaled = size.mul_ratio(
        available.to_milli().clamp(0, i32::MAX as i64) as i32,
        width.to_milli().clamp(1, i32::MAX as i64) as i32,
    );
    scaled.max(min_size)
}

impl DocumentEngine {
    /// Handles the page-break event for `page_number`: furnishes the page,
    /// restores the body style and puts the cursor at the top-left of the
    /// writable area.
    pub(crate) fn on_page_started(&mut self, page_number: usize) -> Result<(), DossierError> {
        self.lifecycle.enter_page(page_number)?;
        self.state.page_number = page_number;
        self.lifecycle.set_furnishing(true);
        let furnished = self.draw_furnishings();
        self.lifecycle.set_furnishing(false);
        furnished?;
        self.apply_body_style()?;
        let margins = self.margins();
        self.cursor = CursorState {
            x: margins.left,
            y: margins.top,
        };
        Ok(())
    }

    pub(crate) fn apply_body_style(&mut self) -> Result<(), DossierError> {
        let body = self.theme.body_style();
        self.canvas.set_font(&body.font, body.size)?;
        self.canvas.set_fill_color(body.color);
        Ok(())
    }

    fn draw_furnishings(&mut self) -> Result<(), DossierError> {
        let page = self.state.page_number;
        let band = self.geometry.sidebar_band(page);
        let style = self.theme.sidebar_style();

        self.canvas.set_fill_color(style.fill);
        self.canvas.fill_rect(band);

        self.canvas.set_font(&style.number.font, style.number.size)?;
        self.canvas.set_fill_color(style.number.color);
        self.canvas
            .page_number_slot(band.center_x(), band.y + style.padding);
        let number_height = self.canvas.line_height()?;

        let label = self.state.running_label.clone();
        if label.trim().is_empty() {
            return Ok(());
        }
        let start = band.y + style.padding + number_height + style.padding;
        let end = band.bottom() - style.padding;
        let available = (end - start).max(Pt::ZERO);
        let natural = self
            .canvas
            .measure_with(&style.label.font, style.label.size, &label)?;
        let size = fit_label_size(natural, available, style.label.size, style.label_min_size);
        let width = self.canvas.measure_with(&style.label.font, size, &label)?;
        let lead = (available - width).max(Pt::ZERO).mul_ratio(1, 2);

        // Text runs bottom-to-top, baseline on origin_x, glyphs centered on the band.
        let origin_x = band.center_x() + size.mul_ratio(7, 20);
        let origin_y = end - lead;
        self.canvas.save_state();
        self.canvas.rotate_about(90.0, origin_x, origin_y);
        self.canvas.set_font(&style.label.font, size)?;
        self.canvas.set_fill_color(style.label.color);
        self.canvas.draw_string(origin_x, origin_y - size, label.as_str());
        self.canvas.restore_state();

        if let Some(debug) = &self.debug {
            debug.furnish(self.doc_id, page, &label, size.to_f32());
        }
        Ok(())
    }
}
