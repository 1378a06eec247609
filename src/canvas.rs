use crate::error::DossierError;
use crate::font::{FontRegistry, HELVETICA};
use crate::types::{Color, Pt, Rect, Size};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Fill,
    Stroke,
    FillStroke,
}

/// Page coordinates are top-left based with y growing downward; the PDF writer
/// flips them on emission.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    /// Counter-clockwise rotation about a page point, until the next restore.
    Rotate {
        degrees: f32,
        origin_x: Pt,
        origin_y: Pt,
    },
    // Non-rendered metadata used for reporting. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    /// `y` is the top of the text line.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    Rect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        paint: Paint,
    },
    /// Page number whose value is only known once structural pages have been
    /// inserted. Resolved to a centered `DrawString` by the finalizer.
    PageNumberSlot {
        center_x: Pt,
        y: Pt,
        font: String,
        size: Pt,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
    pub structural: bool,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_i32(1),
            font_size: Pt::from_i32(12),
            font_name: HELVETICA.to_string(),
        }
    }
}

/// Recording drawing surface. Every page keeps its command list in memory so the
/// finished document can still be restructured before it is written.
pub struct Canvas {
    page_size: Size,
    fonts: Arc<FontRegistry>,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    state: GraphicsState,
}

impl Canvas {
    pub(crate) fn new(page_size: Size, fonts: Arc<FontRegistry>) -> Self {
        Self {
            page_size,
            fonts,
            pages: Vec::new(),
            current: Page::default(),
            state_stack: Vec::new(),
            state: GraphicsState::default(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    /// Number of the page currently being drawn (1-based).
    pub fn page_number(&self) -> usize {
        self.pages.len() + 1
    }

    pub fn current_commands(&self) -> &[Command] {
        &self.current.commands
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    /// Closes the current page and opens the next one, returning its number.
    /// Graphics state does not carry over page boundaries.
    pub(crate) fn begin_page(&mut self) -> usize {
        let done = std::mem::take(&mut self.current);
        self.pages.push(done);
        self.state_stack.clear();
        self.state = GraphicsState::default();
        self.page_number()
    }

    pub(crate) fn mark_structural(&mut self) {
        self.current.structural = true;
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    pub fn rotate_about(&mut self, degrees: f32, origin_x: Pt, origin_y: Pt) {
        self.current.commands.push(Command::Rotate {
            degrees,
            origin_x,
            origin_y,
        });
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.state.fill_color == color {
            return;
        }
        self.state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.state.stroke_color == color {
            return;
        }
        self.state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.state.line_width == width {
            return;
        }
        self.state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    /// Selects a font for subsequent text. Fails for fonts the registry cannot
    /// measure, before anything is drawn with them.
    pub fn set_font(&mut self, name: &str, size: Pt) -> Result<(), DossierError> {
        if !self.fonts.contains(name) {
            return Err(DossierError::Measurement(format!(
                "font {name:?} is not registered"
            )));
        }
        if self.state.font_name != name {
            self.state.font_name = name.to_string();
            self.current
                .commands
                .push(Command::SetFontName(name.to_string()));
        }
        if self.state.font_size != size {
            self.state.font_size = size;
            self.current.commands.push(Command::SetFontSize(size));
        }
        Ok(())
    }

    pub fn font_name(&self) -> &str {
        &self.state.font_name
    }

    pub fn font_size(&self) -> Pt {
        self.state.font_size
    }

    /// Width of `text` in the current font.
    pub fn measure(&self, text: &str) -> Result<Pt, DossierError> {
        self.fonts
            .measure(&self.state.font_name, self.state.font_size, text)
    }

    pub fn measure_with(&self, font: &str, size: Pt, text: &str) -> Result<Pt, DossierError> {
        self.fonts.measure(font, size, text)
    }

    pub fn line_height(&self) -> Result<Pt, DossierError> {
        self.fonts
            .line_height(&self.state.font_name, self.state.font_size)
    }

    pub fn line_height_with(&self, font: &str, size: Pt) -> Result<Pt, DossierError> {
        self.fonts.line_height(font, size)
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.current.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn rect(&mut self, rect: Rect, paint: Paint) {
        self.current.commands.push(Command::Rect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            paint,
        });
    }

    pub fn fill_rect(&mut self, rect: Rect) {
        self.rect(rect, Paint::Fill);
    }

    pub fn stroke_rect(&mut self, rect: Rect) {
        self.rect(rect, Paint::Stroke);
    }

    pub(crate) fn page_number_slot(&mut self, center_x: Pt, y: Pt) {
        self.current.commands.push(Command::PageNumberSlot {
            center_x,
            y,
            font: self.state.font_name.clone(),
            size: self.state.font_size,
        });
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            let done = std::mem::take(&mut self.current);
            self.pages.push(done);
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}
