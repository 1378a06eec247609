use crate::canvas::{Canvas, Command, Document};
use crate::error::DossierError;
use crate::flow::{truncate_with_ellipsis, wrap_words};
use crate::font::FontRegistry;
use crate::geometry::{PageGeometry, PageMargins};
use crate::theme::{TextStyle, Theme};
use crate::toc::TocEntry;
use crate::types::{Color, Pt};
use chrono::{Local, NaiveDate};
use std::sync::Arc;

pub const META_PAGE_ROLE_KEY: &str = "dossier.page_role";

/// What the synthesized cover page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverPage {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub date: Option<NaiveDate>,
}

impl CoverPage {
    /// Dated today.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            author: None,
            date: Some(Local::now().date_naive()),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }
}

pub(crate) struct FinalizeContext<'a> {
    pub fonts: &'a Arc<FontRegistry>,
    pub geometry: &'a PageGeometry,
    pub theme: &'a dyn Theme,
    pub threshold: usize,
}

pub(crate) struct Finalized {
    pub document: Document,
    pub toc: Vec<TocEntry>,
    pub structural_pages: usize,
    pub toc_pages: usize,
}

/// Row metrics of the contents pages, fixed before anything is drawn so the
/// page count used for renumbering is the page count produced.
struct TocLayout {
    heading: TextStyle,
    heading_height: Pt,
    entry: TextStyle,
    entry_bold_font: String,
    row_height: Pt,
    first_page_rows: usize,
    rows_per_page: usize,
}

const TOC_HEADING_GAP: i32 = 12;
const TOC_ROW_GAP: i32 = 4;
const TOC_LEVEL_INDENT: i32 = 14;
const TOC_LEADER_GAP: i32 = 4;

impl TocLayout {
    fn new(ctx: &FinalizeContext<'_>) -> Result<Self, DossierError> {
        let heading = ctx.theme.title_style(1);
        let entry = ctx.theme.body_style();
        let heading_height =
            ctx.fonts.line_height(&heading.font, heading.size)? + Pt::from_i32(TOC_HEADING_GAP);
        let row_height = ctx.fonts.line_height(&entry.font, entry.size)? + Pt::from_i32(TOC_ROW_GAP);
        let writable = ctx.geometry.writable_height();
        Ok(Self {
            entry_bold_font: heading.font.clone(),
            first_page_rows: rows_in(writable - heading_height, row_height),
            rows_per_page: rows_in(writable, row_height),
            heading,
            heading_height,
            entry,
            row_height,
        })
    }

    fn pages_for(&self, entries: usize) -> usize {
        if entries <= self.first_page_rows {
            return 1;
        }
        let rest = entries - self.first_page_rows;
        1 + rest.div_ceil(self.rows_per_page)
    }
}

fn rows_in(height: Pt, row_height: Pt) -> usize {
    let row = row_height.to_milli();
    if row <= 0 {
        return 1;
    }
    usize::try_from(height.to_milli() / row).unwrap_or(0).max(1)
}

/// Second pass over a buffered document: prepends cover and contents pages when
/// the document is longer than the threshold, then writes final page numbers
/// into every deferred slot.
pub(crate) fn finalize_document(
    mut document: Document,
    mut toc: Vec<TocEntry>,
    cover: &CoverPage,
    ctx: &FinalizeContext<'_>,
) -> Result<Finalized, DossierError> {
    let mut structural_pages = 0;
    let mut toc_pages = 0;
    if document.page_count() > ctx.threshold {
        let layout = TocLayout::new(ctx)?;
        toc_pages = layout.pages_for(toc.len());
        structural_pages = 1 + toc_pages;
        // An even block keeps every content page on its original side.
        if structural_pages % 2 == 1 {
            structural_pages += 1;
        }
        for entry in &mut toc {
            entry.page_number += structural_pages;
        }

        let front = build_front_matter(cover, &toc, &layout, structural_pages, ctx)?;
        if front.page_count() != structural_pages {
            return Err(DossierError::Lifecycle(format!(
                "front matter produced {} pages, expected {}",
                front.page_count(),
                structural_pages
            )));
        }
        let mut pages = front.pages;
        pages.append(&mut document.pages);
        document.pages = pages;
    }

    resolve_page_numbers(&mut document, ctx.fonts)?;
    Ok(Finalized {
        document,
        toc,
        structural_pages,
        toc_pages,
    })
}

fn build_front_matter(
    cover: &CoverPage,
    toc: &[TocEntry],
    layout: &TocLayout,
    structural_pages: usize,
    ctx: &FinalizeContext<'_>,
) -> Result<Document, DossierError> {
    let mut canvas = Canvas::new(ctx.geometry.page_size(), ctx.fonts.clone());
    let margins = ctx.geometry.margins_for(1, true);

    canvas.mark_structural();
    canvas.meta(META_PAGE_ROLE_KEY, "cover");
    draw_cover(&mut canvas, cover, &margins, ctx)?;

    let mut remaining = toc;
    let mut first = true;
    loop {
        canvas.begin_page();
        canvas.mark_structural();
        canvas.meta(META_PAGE_ROLE_KEY, "toc");
        let mut y = margins.top;
        let rows = if first {
            let labels = ctx.theme.labels();
            canvas.set_font(&layout.heading.font, layout.heading.size)?;
            canvas.set_fill_color(layout.heading.color);
            canvas.draw_string(margins.left, y, labels.toc_title);
            y += layout.heading_height;
            layout.first_page_rows
        } else {
            layout.rows_per_page
        };
        first = false;
        let take = rows.min(remaining.len());
        for entry in &remaining[..take] {
            draw_toc_entry(&mut canvas, entry, &margins, y, layout)?;
            y += layout.row_height;
        }
        remaining = &remaining[take..];
        if remaining.is_empty() {
            break;
        }
    }

    while canvas.page_number() < structural_pages {
        canvas.begin_page();
        canvas.mark_structural();
        canvas.meta(META_PAGE_ROLE_KEY, "blank");
    }
    Ok(canvas.finish())
}

fn draw_cover(
    canvas: &mut Canvas,
    cover: &CoverPage,
    margins: &PageMargins,
    ctx: &FinalizeContext<'_>,
) -> Result<(), DossierError> {
    let title_style = ctx.theme.title_style(1);
    let title_size = title_style.size.mul_ratio(8, 5);
    let mut y = ctx.geometry.page_size().height.mul_ratio(1, 3);

    y = draw_centered(canvas, &cover.title, &title_style.font, title_size, title_style.color, margins, y)?;
    if let Some(subtitle) = &cover.subtitle {
        let style = ctx.theme.title_style(2);
        y += Pt::from_i32(6);
        y = draw_centered(canvas, subtitle, &style.font, style.size, style.color, margins, y)?;
    }

    let labels = ctx.theme.labels();
    let body = ctx.theme.body_style();
    y += Pt::from_i32(24);
    if let Some(author) = &cover.author {
        let line = format!("{}{}", labels.author_prefix, author);
        y = draw_centered(canvas, &line, &body.font, body.size, body.color, margins, y)?;
    }
    if let Some(date) = cover.date {
        let line = format!("{}{}", labels.date_prefix, date.format("%B %-d, %Y"));
        draw_centered(canvas, &line, &body.font, body.size, body.color, margins, y)?;
    }
    Ok(())
}

/// Wraps `text` to the content width and centers each line. Returns the y
/// below the last line.
fn draw_centered(
    canvas: &mut Canvas,
    text: &str,
    font: &str,
    size: Pt,
    color: Color,
    margins: &PageMargins,
    mut y: Pt,
) -> Result<Pt, DossierError> {
    canvas.set_font(font, size)?;
    canvas.set_fill_color(color);
    let width = margins.content_width;
    let lines = wrap_words(text, width, width, |s| canvas.measure(s))?;
    let line_height = canvas.line_height()?;
    for line in lines {
        let lead = (width - line.width).max(Pt::ZERO).mul_ratio(1, 2);
        canvas.draw_string(margins.left + lead, y, line.text());
        y += line_height;
    }
    Ok(y)
}

fn draw_toc_entry(
    canvas: &mut Canvas,
    entry: &TocEntry,
    margins: &PageMargins,
    y: Pt,
    layout: &TocLayout,
) -> Result<(), DossierError> {
    let font = if entry.level == 1 {
        layout.entry_bold_font.as_str()
    } else {
        layout.entry.font.as_str()
    };
    let size = layout.entry.size;
    canvas.set_font(font, size)?;
    canvas.set_fill_color(layout.entry.color);

    let indent = Pt::from_i32(TOC_LEVEL_INDENT) * (i32::from(entry.level) - 1);
    let gap = Pt::from_i32(TOC_LEADER_GAP);
    let number = entry.page_number.to_string();
    let number_width = canvas.measure(&number)?;
    let dot_width = canvas.measure(".")?;
    let right = margins.left + margins.content_width;

    let title_max = margins.content_width - indent - number_width - dot_width * 3 - gap * 2;
    let title = truncate_with_ellipsis(&entry.title, title_max, |s| canvas.measure(s))?;
    let title_width = canvas.measure(&title)?;
    let title_x = margins.left + indent;
    canvas.draw_string(title_x, y, title);

    let leader_start = title_x + title_width + gap;
    let leader_end = right - number_width - gap;
    let dots = if dot_width > Pt::ZERO && leader_end > leader_start {
        usize::try_from((leader_end - leader_start).to_milli() / dot_width.to_milli()).unwrap_or(0)
    } else {
        0
    };
    if dots > 0 {
        let leader_x = leader_end - dot_width * dots as i32;
        canvas.draw_string(leader_x, y, ".".repeat(dots));
    }
    canvas.draw_string(right - number_width, y, number);
    Ok(())
}

/// Replaces every page-number slot with its final, centered page number.
fn resolve_page_numbers(document: &mut Document, fonts: &FontRegistry) -> Result<(), DossierError> {
    for (index, page) in document.pages.iter_mut().enumerate() {
        let number = (index + 1).to_string();
        for cmd in page.commands.iter_mut() {
            let resolved = match &*cmd {
                Command::PageNumberSlot {
                    center_x,
                    y,
                    font,
                    size,
                } => {
                    let width = fonts.measure(font, *size, &number)?;
                    Some(Command::DrawString {
                        x: *center_x - width.mul_ratio(1, 2),
                        y: *y,
                        text: number.clone(),
                    })
                }
                _ => None,
            };
            if let Some(resolved) = resolved {
                *cmd = resolved;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Page;
    use crate::font::HELVETICA_BOLD;
    use crate::theme::ThemeSpec;
    use crate::types::{Margins, Size};

    struct Fixture {
        fonts: Arc<FontRegistry>,
        geometry: PageGeometry,
        theme: ThemeSpec,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                fonts: Arc::new(FontRegistry::new()),
                geometry: PageGeometry::new(
                    Size::a4(),
                    Margins::all(40.0),
                    Pt::from_i32(28),
                    Pt::from_i32(12),
                ),
                theme: ThemeSpec::classic(),
            }
        }

        fn ctx(&self) -> FinalizeContext<'_> {
            FinalizeContext {
                fonts: &self.fonts,
                geometry: &self.geometry,
                theme: &self.theme,
                threshold: 5,
            }
        }
    }

    fn content_document(pages: usize) -> Document {
        Document {
            page_size: Size::a4(),
            pages: (0..pages)
                .map(|_| Page {
                    commands: vec![
                        Command::SetFontName(HELVETICA_BOLD.to_string()),
                        Command::SetFontSize(Pt::from_i32(10)),
                        Command::PageNumberSlot {
                            center_x: Pt::from_i32(54),
                            y: Pt::from_i32(46),
                            font: HELVETICA_BOLD.to_string(),
                            size: Pt::from_i32(10),
                        },
                    ],
                    structural: false,
                })
                .collect(),
        }
    }

    fn entries(count: usize) -> Vec<TocEntry> {
        (0..count)
            .map(|index| TocEntry {
                title: format!("Section {}", index + 1),
                level: 1 + (index % 2) as u8,
                page_number: index + 1,
            })
            .collect()
    }

    fn page_contains_text(page: &Page, needle: &str) -> bool {
        page.commands.iter().any(|cmd| match cmd {
            Command::DrawString { text, .. } => text.contains(needle),
            _ => false,
        })
    }

    fn page_role(page: &Page) -> Option<&str> {
        page.commands.iter().find_map(|cmd| match cmd {
            Command::Meta { key, value } if key == META_PAGE_ROLE_KEY => Some(value.as_str()),
            _ => None,
        })
    }

    fn slot_numbers(doc: &Document) -> Vec<String> {
        doc.pages
            .iter()
            .filter(|page| !page.structural)
            .filter_map(|page| {
                page.commands.iter().find_map(|cmd| match cmd {
                    Command::DrawString { text, y, .. } if *y == Pt::from_i32(46) => {
                        Some(text.clone())
                    }
                    _ => None,
                })
            })
            .collect()
    }

    #[test]
    fn short_document_only_gets_page_numbers() {
        let fixture = Fixture::new();
        let cover = CoverPage::new("Brother Anselm");
        let out = finalize_document(content_document(5), entries(3), &cover, &fixture.ctx()).unwrap();
        assert_eq!(out.structural_pages, 0);
        assert_eq!(out.document.page_count(), 5);
        assert_eq!(slot_numbers(&out.document), vec!["1", "2", "3", "4", "5"]);
        let pages: Vec<usize> = out.toc.iter().map(|e| e.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert!(
            !out.document.pages.iter().flat_map(|p| &p.commands).any(|cmd| matches!(cmd, Command::PageNumberSlot { .. }))
        );
    }

    #[test]
    fn long_document_gets_cover_and_contents() {
        let fixture = Fixture::new();
        let cover = CoverPage::new("The Ash Guild").with_author("Mira");
        let out = finalize_document(content_document(6), entries(4), &cover, &fixture.ctx()).unwrap();
        assert_eq!(out.toc_pages, 1);
        assert_eq!(out.structural_pages, 2);
        assert_eq!(out.document.page_count(), 8);

        let first = &out.document.pages[0];
        assert!(first.structural);
        assert_eq!(page_role(first), Some("cover"));
        assert!(page_contains_text(first, "The Ash Guild"));
        assert!(page_contains_text(first, "Prepared by Mira"));

        let contents = &out.document.pages[1];
        assert_eq!(page_role(contents), Some("toc"));
        assert!(page_contains_text(contents, "Contents"));
        assert!(page_contains_text(contents, "Section 4"));

        let pages: Vec<usize> = out.toc.iter().map(|e| e.page_number).collect();
        assert_eq!(pages, vec![3, 4, 5, 6]);
        assert_eq!(slot_numbers(&out.document), vec!["3", "4", "5", "6", "7", "8"]);
    }

    #[test]
    fn contents_spill_onto_extra_pages_and_keep_parity() {
        let fixture = Fixture::new();
        let layout = TocLayout::new(&fixture.ctx()).unwrap();
        let count = layout.first_page_rows + 1;
        let cover = CoverPage::new("Crowded").with_date(None);
        let out = finalize_document(content_document(7), entries(count), &cover, &fixture.ctx()).unwrap();

        assert_eq!(out.toc_pages, 2);
        // cover + 2 contents pages, padded to an even block
        assert_eq!(out.structural_pages, 4);
        assert_eq!(page_role(&out.document.pages[3]), Some("blank"));
        assert!(!out.document.pages[4].structural);
        let last = format!("Section {count}");
        assert!(page_contains_text(&out.document.pages[2], &last));
        assert_eq!(out.toc[0].page_number, 5);
    }

    #[test]
    fn contents_rows_are_dot_led_and_right_aligned() {
        let fixture = Fixture::new();
        let cover = CoverPage::new("Dots");
        let out = finalize_document(content_document(6), entries(1), &cover, &fixture.ctx()).unwrap();
        let contents = &out.document.pages[1];
        let margins = fixture.geometry.margins_for(2, true);
        let right = margins.left + margins.content_width;
        let number = contents.commands.iter().rev().find_map(|cmd| match cmd {
            Command::DrawString { x, text, .. } if text == "3" => Some(*x),
            _ => None,
        });
        let width = fixture.fonts.measure(HELVETICA_BOLD, Pt::from_i32(10), "3").unwrap();
        assert_eq!(number, Some(right - width));
        assert!(page_contains_text(contents, "....."));
    }

    #[test]
    fn overlong_contents_titles_are_ellipsized() {
        let fixture = Fixture::new();
        let mut toc = entries(1);
        toc[0].title = "Very ".repeat(80);
        let cover = CoverPage::new("Long");
        let out = finalize_document(content_document(6), toc, &cover, &fixture.ctx()).unwrap();
        assert!(page_contains_text(&out.document.pages[1], "\u{2026}"));
    }

    #[test]
    fn pages_for_counts_first_page_heading() {
        let fixture = Fixture::new();
        let layout = TocLayout::new(&fixture.ctx()).unwrap();
        assert!(layout.first_page_rows < layout.rows_per_page);
        assert_eq!(layout.pages_for(0), 1);
        assert_eq!(layout.pages_for(layout.first_page_rows), 1);
        assert_eq!(layout.pages_for(layout.first_page_rows + layout.rows_per_page), 2);
        assert_eq!(layout.pages_for(layout.first_page_rows + layout.rows_per_page + 1), 3);
    }
}
