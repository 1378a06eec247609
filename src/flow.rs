use crate::canvas::Paint;
use crate::debug::BreakReason;
use crate::engine::DocumentEngine;
use crate::error::DossierError;
use crate::theme::{ParagraphKind, TextStyle};
use crate::types::{Color, Pt, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Justify,
    Left,
    Center,
}

/// Text plus the resolved style it is drawn with, for the duration of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledRun {
    pub text: String,
    pub font: String,
    pub font_size: Pt,
    pub color: Color,
    pub align: TextAlign,
}

impl StyledRun {
    pub fn new(text: impl Into<String>, style: &TextStyle, align: TextAlign) -> Self {
        Self {
            text: text.into(),
            font: style.font.clone(),
            font_size: style.size,
            color: style.color,
            align,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrappedLine {
    pub words: Vec<String>,
    pub width: Pt,
}

impl WrappedLine {
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct TitleOptions {
    pub record_in_toc: bool,
    /// Room that must remain below the title, so it is not stranded at a page foot.
    pub keep_with_next: Pt,
    pub space_before: Pt,
    pub space_after: Pt,
}

impl Default for TitleOptions {
    fn default() -> Self {
        Self {
            record_in_toc: true,
            keep_with_next: Pt::from_i32(36),
            space_before: Pt::from_i32(8),
            space_after: Pt::from_i32(6),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParagraphOptions {
    pub align: TextAlign,
    /// First line only.
    pub indent: Pt,
    pub line_gap: Pt,
    pub space_after: Pt,
    pub kind: ParagraphKind,
}

impl Default for ParagraphOptions {
    fn default() -> Self {
        Self {
            align: TextAlign::Justify,
            indent: Pt::ZERO,
            line_gap: Pt::from_i32(2),
            space_after: Pt::from_i32(8),
            kind: ParagraphKind::Normal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Bullet position relative to the left margin.
    pub origin_offset: Pt,
    /// Item text position relative to the bullet.
    pub indent: Pt,
    pub line_gap: Pt,
    pub item_gap: Pt,
    pub space_after: Pt,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            origin_offset: Pt::from_i32(4),
            indent: Pt::from_i32(12),
            line_gap: Pt::from_i32(1),
            item_gap: Pt::from_i32(3),
            space_after: Pt::from_i32(6),
        }
    }
}

struct FlowLayout<'a> {
    offset: Pt,
    first_indent: Pt,
    line_gap: Pt,
    marker: Option<(&'a str, Pt)>,
    first_reason: BreakReason,
}

/// Greedy word wrap. A word wider than the line gets a line of its own.
pub fn wrap_words<F>(
    text: &str,
    first_width: Pt,
    width: Pt,
    mut measure: F,
) -> Result<Vec<WrappedLine>, DossierError>
where
    F: FnMut(&str) -> Result<Pt, DossierError>,
{
    let mut lines = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_width = Pt::ZERO;
    for word in text.split_whitespace() {
        if current.is_empty() {
            current_width = measure(word)?;
            current.push(word.to_string());
            continue;
        }
        let limit = if lines.is_empty() { first_width } else { width };
        let candidate = format!("{} {}", current.join(" "), word);
        let candidate_width = measure(&candidate)?;
        if candidate_width <= limit {
            current.push(word.to_string());
            current_width = candidate_width;
        } else {
            lines.push(WrappedLine {
                words: std::mem::take(&mut current),
                width: current_width,
            });
            current_width = measure(word)?;
            current.push(word.to_string());
        }
    }
    if !current.is_empty() {
        lines.push(WrappedLine {
            words: current,
            width: current_width,
        });
    }
    Ok(lines)
}

/// Shortens `text` with a trailing ellipsis until it fits `max_width`.
pub(crate) fn truncate_with_ellipsis<F>(
    text: &str,
    max_width: Pt,
    mut measure: F,
) -> Result<String, DossierError>
where
    F: FnMut(&str) -> Result<Pt, DossierError>,
{
    if text.is_empty() || measure(text)? <= max_width {
        return Ok(text.to_string());
    }
    let ellipsis = "\u{2026}";
    if max_width <= Pt::ZERO {
        return Ok(String::new());
    }
    if measure(ellipsis)? >= max_width {
        return Ok(ellipsis.to_string());
    }

    let boundaries: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
    let mut lo = 0usize;
    let mut hi = boundaries.len();
    // Largest prefix length (in chars) whose ellipsized form fits.
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        let end = boundaries.get(mid).copied().unwrap_or(text.len());
        let candidate = format!("{}{}", text[..end].trim_end(), ellipsis);
        if measure(&candidate)? <= max_width {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    let end = boundaries.get(lo).copied().unwrap_or(text.len());
    Ok(format!("{}{}", text[..end].trim_end(), ellipsis))
}

impl DocumentEngine {
    /// Starts a new page when `required` more points would cross the bottom
    /// margin. Returns whether a break happened.
    pub fn check_new_page(&mut self, required: Pt) -> Result<bool, DossierError> {
        self.ensure_space(required, BreakReason::Overflow)
    }

    pub(crate) fn ensure_space(
        &mut self,
        required: Pt,
        reason: BreakReason,
    ) -> Result<bool, DossierError> {
        if self.lifecycle.is_furnishing() {
            return Ok(false);
        }
        if self.cursor.y + required <= self.geometry.content_bottom() {
            return Ok(false);
        }
        // Nothing placed on this page yet; a fresh page would not have more room.
        if self.at_page_top() {
            return Ok(false);
        }
        self.break_page(reason)
    }

    pub fn page_break(&mut self) -> Result<(), DossierError> {
        self.break_page(BreakReason::Explicit)?;
        Ok(())
    }

    /// Vertical gap. Collapses into a page break when the page is full.
    pub fn space(&mut self, amount: Pt) -> Result<(), DossierError> {
        if !self.ensure_space(amount, BreakReason::Overflow)? {
            self.cursor.y += amount;
        }
        Ok(())
    }

    /// Label shown in the sidebar from the next page on.
    pub fn set_running_label(&mut self, label: impl Into<String>) {
        self.state.running_label = label.into();
    }

    pub fn title(
        &mut self,
        text: &str,
        level: u8,
        options: &TitleOptions,
    ) -> Result<(), DossierError> {
        let style = self.theme.title_style(level);
        let shown = if self.theme.uppercase_titles() {
            text.to_uppercase()
        } else {
            text.to_string()
        };
        let run = StyledRun::new(shown, &style, TextAlign::Left);
        let width = self.margins().content_width;
        let lines = self.wrap_run(&run, width, width)?;
        if lines.is_empty() {
            return Ok(());
        }
        let line_height = self.canvas.line_height_with(&run.font, run.font_size)?;

        if !self.at_page_top() {
            self.space(options.space_before)?;
        }
        let required = line_height * lines.len() as i32 + options.keep_with_next;
        self.ensure_space(required, BreakReason::KeepWithNext)?;

        if options.record_in_toc {
            let page = self.state.page_number;
            let title = text.trim();
            self.state.toc.record(title, level, page);
            if let Some(debug) = &self.debug {
                debug.toc_record(self.doc_id, title, level.clamp(1, 3), page);
            }
        }

        self.flow_run(
            &run,
            &FlowLayout {
                offset: Pt::ZERO,
                first_indent: Pt::ZERO,
                line_gap: Pt::ZERO,
                marker: None,
                first_reason: BreakReason::Overflow,
            },
        )?;
        self.cursor.y += options.space_after;
        self.apply_body_style()
    }

    pub fn paragraph(&mut self, text: &str, options: &ParagraphOptions) -> Result<(), DossierError> {
        let style = self.theme.paragraph_style(options.kind);
        let run = StyledRun::new(text, &style, options.align);
        self.flow_run(
            &run,
            &FlowLayout {
                offset: Pt::ZERO,
                first_indent: options.indent,
                line_gap: options.line_gap,
                marker: None,
                first_reason: BreakReason::Overflow,
            },
        )?;
        self.cursor.y += options.space_after;
        self.cursor.x = self.margins().left;
        self.apply_body_style()
    }

    pub fn bulleted_list<S: AsRef<str>>(
        &mut self,
        items: &[S],
        options: &ListOptions,
    ) -> Result<(), DossierError> {
        let style = self.theme.body_style();
        let bullet = self.theme.bullet_glyph().to_string();
        for item in items {
            // A blank item would leave an orphan gap with no bullet.
            if item.as_ref().trim().is_empty() {
                continue;
            }
            let run = StyledRun::new(item.as_ref(), &style, TextAlign::Left);
            self.flow_run(
                &run,
                &FlowLayout {
                    offset: options.origin_offset + options.indent,
                    first_indent: Pt::ZERO,
                    line_gap: options.line_gap,
                    marker: Some((bullet.as_str(), options.origin_offset)),
                    first_reason: BreakReason::ListItem,
                },
            )?;
            self.cursor.x = self.margins().left + options.origin_offset;
            self.cursor.y += options.item_gap;
        }
        self.cursor.y += options.space_after;
        self.cursor.x = self.margins().left;
        self.apply_body_style()
    }

    /// Framed box with a label chip on its top border. Measured in full before
    /// anything is drawn and never split across pages.
    pub fn callout_box(&mut self, kind: &str, text: &str) -> Result<(), DossierError> {
        let style = self.theme.box_style();
        let run = StyledRun::new(text, &style.text, TextAlign::Left);
        let interior = self.margins().content_width - style.padding_x * 2;
        let lines = self.wrap_run(&run, interior, interior)?;
        let line_height = self.canvas.line_height_with(&run.font, run.font_size)?;
        let height = line_height * lines.len() as i32 + style.padding_y * 2;

        self.ensure_space(height, BreakReason::Box)?;

        let margins = self.margins();
        let top = self.cursor.y;
        let frame = Rect {
            x: margins.left,
            y: top,
            width: margins.content_width,
            height,
        };
        self.canvas.set_line_width(style.border_width);
        self.canvas.set_stroke_color(style.border);
        match style.background {
            Some(background) => {
                self.canvas.set_fill_color(background);
                self.canvas.rect(frame, Paint::FillStroke);
            }
            None => self.canvas.stroke_rect(frame),
        }

        let chip_label = kind.trim().to_uppercase();
        if !chip_label.is_empty() {
            let chip_width = self
                .canvas
                .measure_with(&style.chip.font, style.chip.size, &chip_label)?
                + style.chip_padding * 2;
            let chip_height = self
                .canvas
                .line_height_with(&style.chip.font, style.chip.size)?;
            let chip = Rect {
                x: margins.left + style.padding_x,
                y: top - chip_height.mul_ratio(1, 2),
                width: chip_width,
                height: chip_height,
            };
            self.canvas.set_fill_color(style.chip_background);
            self.canvas.fill_rect(chip);
            self.canvas.set_font(&style.chip.font, style.chip.size)?;
            self.canvas.set_fill_color(style.chip.color);
            self.canvas.draw_string(
                chip.x + style.chip_padding,
                chip.y + (chip_height - style.chip.size).mul_ratio(1, 2),
                chip_label,
            );
        }

        self.canvas.set_font(&run.font, run.font_size)?;
        self.canvas.set_fill_color(run.color);
        let mut y = top + style.padding_y;
        for line in &lines {
            self.canvas
                .draw_string(margins.left + style.padding_x, y, line.text());
            y += line_height;
        }

        self.cursor.y = top + height + style.space_after;
        self.cursor.x = margins.left;
        self.apply_body_style()
    }

    fn wrap_run(
        &self,
        run: &StyledRun,
        first_width: Pt,
        width: Pt,
    ) -> Result<Vec<WrappedLine>, DossierError> {
        wrap_words(&run.text, first_width, width, |s| {
            self.canvas.measure_with(&run.font, run.font_size, s)
        })
    }

    /// Draws a run line by line, checking for a page break before each line.
    /// Content width is the same on every content page, so lines wrapped up
    /// front stay valid after a break; only the x origin is re-derived.
    fn flow_run(&mut self, run: &StyledRun, layout: &FlowLayout<'_>) -> Result<(), DossierError> {
        let width = self.margins().content_width - layout.offset;
        let lines = self.wrap_run(run, width - layout.first_indent, width)?;
        let line_height = self.canvas.line_height_with(&run.font, run.font_size)?;
        let last = lines.len().saturating_sub(1);

        for (index, line) in lines.iter().enumerate() {
            let reason = if index == 0 {
                layout.first_reason
            } else {
                BreakReason::Overflow
            };
            self.ensure_space(line_height, reason)?;
            self.canvas.set_font(&run.font, run.font_size)?;
            self.canvas.set_fill_color(run.color);

            let margins = self.margins();
            let y = self.cursor.y;
            if index == 0 {
                if let Some((marker, marker_offset)) = layout.marker {
                    self.canvas.draw_string(margins.left + marker_offset, y, marker);
                }
            }
            let indent = if index == 0 {
                layout.first_indent
            } else {
                Pt::ZERO
            };
            let x = margins.left + layout.offset + indent;
            self.draw_line(run, line, x, y, width - indent, index == last)?;
            self.cursor.y += line_height + layout.line_gap;
        }
        Ok(())
    }

    fn draw_line(
        &mut self,
        run: &StyledRun,
        line: &WrappedLine,
        x: Pt,
        y: Pt,
        available: Pt,
        is_last: bool,
    ) -> Result<(), DossierError> {
        match run.align {
            TextAlign::Justify if !is_last && line.words.len() > 1 => {
                let mut widths = Vec::with_capacity(line.words.len());
                for word in &line.words {
                    widths.push(self.canvas.measure_with(&run.font, run.font_size, word)?);
                }
                let spare = (available - widths.iter().copied().sum::<Pt>()).max(Pt::ZERO);
                let gaps = (line.words.len() - 1) as i32;
                // Word i sits after i shares of the spare width, so the last word
                // ends flush with the right edge.
                let mut used = Pt::ZERO;
                for (index, (word, word_width)) in line.words.iter().zip(widths).enumerate() {
                    let share = spare.mul_ratio(index as i32, gaps);
                    self.canvas.draw_string(x + used + share, y, word.as_str());
                    used += word_width;
                }
            }
            TextAlign::Center => {
                let lead = (available - line.width).max(Pt::ZERO).mul_ratio(1, 2);
                self.canvas.draw_string(x + lead, y, line.text());
            }
            _ => self.canvas.draw_string(x, y, line.text()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::theme::{DocumentKind, ThemeSpec};
    use std::sync::Arc;

    const HOLLOW: &str = "Travellers who reach the hollow before dusk are greeted by the \
        reeve, who asks their names, writes them in a ledger bound in eel skin, and \
        warns them never to answer the knocking that comes from the well after midnight.";

    fn open_engine() -> DocumentEngine {
        crate::Dossier::builder()
            .build()
            .unwrap()
            .open(Arc::new(ThemeSpec::classic()), DocumentKind::Town, "Hollow")
            .unwrap()
    }

    /// Strings drawn since `start`, grouped into lines by their y.
    fn lines_since(engine: &DocumentEngine, start: usize) -> Vec<Vec<(Pt, String)>> {
        let mut lines: Vec<(Pt, Vec<(Pt, String)>)> = Vec::new();
        for command in &engine.canvas().current_commands()[start..] {
            let Command::DrawString { x, y, text } = command else {
                continue;
            };
            let same_line = lines.last().is_some_and(|(line_y, _)| line_y == y);
            if !same_line {
                lines.push((*y, Vec::new()));
            }
            if let Some((_, words)) = lines.last_mut() {
                words.push((*x, text.clone()));
            }
        }
        lines.into_iter().map(|(_, words)| words).collect()
    }

    fn line_ys(engine: &DocumentEngine, start: usize) -> Vec<Pt> {
        engine.canvas().current_commands()[start..]
            .iter()
            .filter_map(|command| match command {
                Command::DrawString { y, .. } => Some(*y),
                _ => None,
            })
            .collect()
    }

    fn body_width(engine: &DocumentEngine, text: &str) -> Pt {
        let style = engine.theme().paragraph_style(ParagraphKind::Normal);
        engine.canvas().measure_with(&style.font, style.size, text).unwrap()
    }

    // Every character is 5pt wide.
    fn fixed(text: &str) -> Result<Pt, DossierError> {
        Ok(Pt::from_i32(5) * text.chars().count() as i32)
    }

    #[test]
    fn wraps_greedily_and_is_idempotent() {
        let text = "the  quick brown\tfox jumps\nover the lazy   dog";
        let width = Pt::from_i32(100);
        let lines = wrap_words(text, width, width, fixed).unwrap();
        let texts: Vec<String> = lines.iter().map(WrappedLine::text).collect();
        assert_eq!(texts, vec!["the quick brown fox", "jumps over the lazy", "dog"]);
        assert!(lines.iter().all(|line| line.width <= width));

        // Wrapping the joined output again reproduces the same line breaks.
        let rejoined = texts.join(" ");
        let again = wrap_words(&rejoined, width, width, fixed).unwrap();
        assert_eq!(lines, again);
    }

    #[test]
    fn first_line_may_be_narrower() {
        let lines = wrap_words("aaaa bbbb cccc", Pt::from_i32(25), Pt::from_i32(50), fixed).unwrap();
        let texts: Vec<String> = lines.iter().map(WrappedLine::text).collect();
        assert_eq!(texts, vec!["aaaa", "bbbb cccc"]);
    }

    #[test]
    fn overwide_word_gets_its_own_line() {
        let lines = wrap_words("a incomprehensibilities b", Pt::from_i32(40), Pt::from_i32(40), fixed)
            .unwrap();
        let texts: Vec<String> = lines.iter().map(WrappedLine::text).collect();
        assert_eq!(texts, vec!["a", "incomprehensibilities", "b"]);
        assert!(wrap_words("   ", Pt::from_i32(40), Pt::from_i32(40), fixed).unwrap().is_empty());
    }

    #[test]
    fn measurement_errors_propagate() {
        let err = wrap_words("x y", Pt::from_i32(40), Pt::from_i32(40), |_| {
            Err(DossierError::Measurement("no such font".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, DossierError::Measurement(_)));
    }

    #[test]
    fn truncation_keeps_the_longest_fitting_prefix() {
        assert_eq!(truncate_with_ellipsis("short", Pt::from_i32(100), fixed).unwrap(), "short");
        assert_eq!(
            truncate_with_ellipsis("abcdefghij", Pt::from_i32(30), fixed).unwrap(),
            "abcde\u{2026}"
        );
        assert_eq!(
            truncate_with_ellipsis("abcdefghij", Pt::from_i32(3), fixed).unwrap(),
            "\u{2026}"
        );
    }

    #[test]
    fn justified_lines_end_flush_and_the_last_line_stays_left() {
        let mut engine = open_engine();
        let start = engine.canvas().current_command_count();
        engine.paragraph(HOLLOW, &ParagraphOptions::default()).unwrap();

        let margins = engine.margins();
        let right = margins.left + margins.content_width;
        assert!((right.to_milli() - 555_280).abs() <= 1);
        let lines = lines_since(&engine, start);
        assert!(lines.len() >= 2);
        let (last, full) = lines.split_last().unwrap();
        for words in full {
            assert!(words.len() > 1);
            assert_eq!(words[0].0, margins.left);
            let (x, word) = words.last().unwrap();
            let end = *x + body_width(&engine, word);
            assert!((end.to_milli() - right.to_milli()).abs() <= 1, "{word} ends at {end:?}");
        }
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].0, margins.left);
        assert!(last[0].1.contains(' '));
        assert!(last[0].1.ends_with("midnight."));
    }

    #[test]
    fn centered_lines_split_the_spare_width() {
        let mut engine = open_engine();
        let start = engine.canvas().current_command_count();
        let options = ParagraphOptions {
            align: TextAlign::Center,
            ..ParagraphOptions::default()
        };
        engine.paragraph("The well is sealed.", &options).unwrap();

        let margins = engine.margins();
        let lines = lines_since(&engine, start);
        assert_eq!(lines.len(), 1);
        let (x, text) = &lines[0][0];
        let expected =
            margins.left + (margins.content_width - body_width(&engine, text)).mul_ratio(1, 2);
        assert!((x.to_milli() - expected.to_milli()).abs() <= 1);
        assert!(*x > margins.left);
    }

    #[test]
    fn left_aligned_paragraph_indents_the_first_line_and_adds_line_gap() {
        let mut engine = open_engine();
        let start = engine.canvas().current_command_count();
        let options = ParagraphOptions {
            align: TextAlign::Left,
            indent: Pt::from_i32(18),
            line_gap: Pt::from_i32(4),
            ..ParagraphOptions::default()
        };
        let top = engine.cursor().y;
        engine.paragraph(HOLLOW, &options).unwrap();

        let margins = engine.margins();
        let lines = lines_since(&engine, start);
        assert!(lines.len() >= 2);
        assert!(lines.iter().all(|words| words.len() == 1));
        assert_eq!(lines[0][0].0, margins.left + Pt::from_i32(18));
        assert!(lines[1..].iter().all(|words| words[0].0 == margins.left));

        // Helvetica 10 gives 12pt lines.
        let ys = line_ys(&engine, start);
        assert_eq!(ys[0], top);
        for pair in ys.windows(2) {
            assert_eq!(pair[1] - pair[0], Pt::from_i32(16));
        }
        let count = ys.len() as i32;
        assert_eq!(
            engine.cursor().y,
            top + Pt::from_i32(16) * count + options.space_after
        );
    }

    #[test]
    fn blank_list_items_are_skipped() {
        let mut engine = open_engine();
        let start = engine.canvas().current_command_count();
        let top = engine.cursor().y;
        let options = ListOptions::default();
        engine
            .bulleted_list(&["One", "   ", "", "Two"], &options)
            .unwrap();

        let bullets: Vec<Pt> = lines_since(&engine, start)
            .iter()
            .flatten()
            .filter(|(_, text)| text == "\u{2022}")
            .map(|(x, _)| *x)
            .collect();
        assert_eq!(bullets.len(), 2);
        let ys = line_ys(&engine, start);
        // Bullet and text of each item share a y.
        assert_eq!(ys.len(), 4);
        let step = Pt::from_i32(12) + options.line_gap + options.item_gap;
        assert_eq!(ys[2] - ys[0], step);
        assert_eq!(engine.cursor().y, top + step * 2 + options.space_after);
    }
}
