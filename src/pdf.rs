use crate::canvas::{Command, Document, Page, Paint};
use crate::font::{FontProgramKind, FontRegistry, FontSource, HELVETICA, RegisteredFont, winansi_byte};
use crate::types::{Color, Pt};
use fixed::types::I32F32;
use std::collections::BTreeMap;
use std::io::{self, Write};

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const INFO_ID: usize = 3;
const FIRST_FREE_ID: usize = 4;

/// Byte counts reported back to the caller once the file is complete.
#[derive(Debug, Clone, Default)]
pub(crate) struct PdfStats {
    pub total_bytes: usize,
    pub page_content_bytes: Vec<usize>,
}

struct FontResource {
    resource: String,
    object_id: usize,
    objects: Vec<(usize, String)>,
}

/// Writes `document` as a complete PDF. Page coordinates are flipped from the
/// canvas' top-left model here and nowhere else.
pub(crate) fn write_pdf<W: Write>(
    document: &Document,
    fonts: &FontRegistry,
    title: Option<&str>,
    writer: &mut W,
) -> io::Result<PdfStats> {
    let mut next_id = FIRST_FREE_ID;
    let font_resources = build_font_resources(document, fonts, &mut next_id);
    let resource_by_font: BTreeMap<String, String> = font_resources
        .iter()
        .map(|(name, res)| (name.clone(), res.resource.clone()))
        .collect();

    let page_ids: Vec<(usize, usize)> = document
        .pages
        .iter()
        .map(|_| {
            let content_id = next_id;
            next_id += 2;
            (content_id, content_id + 1)
        })
        .collect();

    let mut offsets = vec![0usize; next_id];
    let mut offset = 0usize;
    let mut stats = PdfStats::default();

    write_bytes(writer, b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n", &mut offset)?;
    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        CATALOG_ID,
        &format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID),
    )?;
    let kids = page_ids
        .iter()
        .map(|(_, page_id)| format!("{} 0 R", page_id))
        .collect::<Vec<_>>()
        .join(" ");
    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        PAGES_ID,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_ids.len()
        ),
    )?;
    write_pdf_object(writer, &mut offset, &mut offsets, INFO_ID, &info_object(title))?;

    for resource in font_resources.values() {
        for (id, body) in &resource.objects {
            write_pdf_object(writer, &mut offset, &mut offsets, *id, body)?;
        }
    }

    let font_dict = font_resource_dict(font_resources.values());
    let media_box = format!(
        "[0 0 {} {}]",
        fmt_pt(document.page_size.width),
        fmt_pt(document.page_size.height)
    );
    for (page, (content_id, page_id)) in document.pages.iter().zip(page_ids.iter()) {
        let content = render_page(page, document.page_size.height, fonts, &resource_by_font);
        stats.page_content_bytes.push(content.len());
        write_pdf_object(
            writer,
            &mut offset,
            &mut offsets,
            *content_id,
            &stream_object(&content),
        )?;
        write_pdf_object(
            writer,
            &mut offset,
            &mut offsets,
            *page_id,
            &format!(
                "<< /Type /Page /Parent {} 0 R /MediaBox {} /Resources << /Font {} >> /Contents {} 0 R >>",
                PAGES_ID, media_box, font_dict, content_id
            ),
        )?;
    }

    let xref_start = offset;
    write_str(writer, &format!("xref\n0 {}\n", next_id), &mut offset)?;
    write_str(writer, "0000000000 65535 f \n", &mut offset)?;
    for obj_offset in offsets.iter().skip(1) {
        write_str(writer, &format!("{:010} 00000 n \n", obj_offset), &mut offset)?;
    }
    write_str(
        writer,
        &format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
            next_id, CATALOG_ID, INFO_ID, xref_start
        ),
        &mut offset,
    )?;
    writer.flush()?;

    stats.total_bytes = offset;
    Ok(stats)
}

/// Fonts actually selected on some page, keyed by their registered name.
/// Helvetica is always present since it is every page's initial font.
fn build_font_resources(
    document: &Document,
    fonts: &FontRegistry,
    next_id: &mut usize,
) -> BTreeMap<String, FontResource> {
    let mut used: Vec<&RegisteredFont> = Vec::new();
    if let Some(font) = fonts.resolve(HELVETICA) {
        note_font(&mut used, font);
    }
    for page in &document.pages {
        for cmd in &page.commands {
            let name = match cmd {
                Command::SetFontName(name) => name,
                Command::PageNumberSlot { font, .. } => font,
                _ => continue,
            };
            if let Some(font) = fonts.resolve(name) {
                note_font(&mut used, font);
            }
        }
    }

    let mut map = BTreeMap::new();
    for (index, font) in used.into_iter().enumerate() {
        let resource = format!("F{}", index + 1);
        let entry = match &font.source {
            FontSource::Standard => {
                let id = *next_id;
                *next_id += 1;
                FontResource {
                    resource,
                    object_id: id,
                    objects: vec![(id, font_object(&font.name))],
                }
            }
            FontSource::Embedded { data, program } => {
                let file_id = *next_id;
                let descriptor_id = file_id + 1;
                let font_id = file_id + 2;
                *next_id += 3;
                FontResource {
                    resource,
                    object_id: font_id,
                    objects: vec![
                        (file_id, font_file_object(data, *program)),
                        (descriptor_id, font_descriptor_object(font, *program, file_id)),
                        (font_id, truetype_font_object(font, *program, descriptor_id)),
                    ],
                }
            }
        };
        map.insert(font.name.clone(), entry);
    }
    map
}

fn note_font<'a>(used: &mut Vec<&'a RegisteredFont>, font: &'a RegisteredFont) {
    if !used.iter().any(|seen| seen.name == font.name) {
        used.push(font);
    }
}

fn resource_for<'a>(
    fonts: &FontRegistry,
    resources: &'a BTreeMap<String, String>,
    name: &str,
) -> &'a str {
    fonts
        .resolve(name)
        .and_then(|font| resources.get(&font.name))
        .map(|res| res.as_str())
        .unwrap_or("F1")
}

fn render_page(
    page: &Page,
    page_height: Pt,
    fonts: &FontRegistry,
    resources: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    let mut font_name = HELVETICA.to_string();
    let mut font_size = Pt::from_i32(12);
    let mut saved: Vec<(String, Pt)> = Vec::new();

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                saved.push((font_name.clone(), font_size));
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some((name, size)) = saved.pop() {
                    font_name = name;
                    font_size = size;
                }
                out.push_str("Q\n");
            }
            Command::Rotate {
                degrees,
                origin_x,
                origin_y,
            } => {
                let radians = degrees.to_radians();
                let sin = libm::sinf(radians);
                let cos = libm::cosf(radians);
                let ox = fmt_pt(*origin_x);
                let oy = fmt_pt(page_height - *origin_y);
                out.push_str(&format!("1 0 0 1 {} {} cm\n", ox, oy));
                out.push_str(&format!(
                    "{} {} {} {} 0 0 cm\n",
                    fmt(cos),
                    fmt(sin),
                    fmt(-sin),
                    fmt(cos)
                ));
                out.push_str(&format!(
                    "1 0 0 1 {} {} cm\n",
                    fmt_pt(-*origin_x),
                    fmt_pt(*origin_y - page_height)
                ));
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => {
                out.push_str(&format!("{} rg\n", color_components(*color)));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!("{} RG\n", color_components(*color)));
            }
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => font_name = name.clone(),
            Command::SetFontSize(size) => font_size = *size,
            Command::DrawString { x, y, text } => {
                let resource = resource_for(fonts, resources, &font_name);
                push_text(&mut out, resource, font_size, *x, page_height - *y - font_size, text);
            }
            // Slots are resolved to text before a document is written.
            Command::PageNumberSlot { .. } => {}
            Command::Rect {
                x,
                y,
                width,
                height,
                paint,
            } => {
                let op = match paint {
                    Paint::Fill => "f",
                    Paint::Stroke => "S",
                    Paint::FillStroke => "B",
                };
                out.push_str(&format!(
                    "{} {} {} {} re\n{}\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height),
                    op
                ));
            }
        }
    }

    out
}

fn push_text(out: &mut String, resource: &str, size: Pt, x: Pt, baseline: Pt, text: &str) {
    out.push_str("BT\n");
    out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(size)));
    out.push_str(&format!("{} {} Td\n", fmt_pt(x), fmt_pt(baseline)));
    out.push_str(&format!("({}) Tj\n", encode_winansi_pdf_string(text)));
    out.push_str("ET\n");
}

/// Encodes text for a WinAnsi font. Characters outside the code page become `?`.
fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let byte = winansi_byte(ch).unwrap_or(b'?');
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    out
}

fn color_components(color: Color) -> String {
    format!(
        "{} {} {}",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec!["/Producer (dossier)".to_string()];
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi_pdf_string(title)));
    }
    format!("<< {} >>", entries.join(" "))
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn font_resource_dict<'a>(resources: impl Iterator<Item = &'a FontResource>) -> String {
    let entries = resources
        .map(|res| format!("/{} {} 0 R", res.resource, res.object_id))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn truetype_font_object(font: &RegisteredFont, program: FontProgramKind, descriptor_id: usize) -> String {
    let subtype = match program {
        FontProgramKind::OpenTypeCff => "Type1",
        FontProgramKind::TrueType => "TrueType",
    };
    let widths = font
        .metrics
        .widths
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /{} /BaseFont /{} /FirstChar 32 /LastChar 255 /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        subtype,
        sanitize_font_name(&font.name),
        widths,
        descriptor_id
    )
}

fn font_descriptor_object(font: &RegisteredFont, program: FontProgramKind, font_file_id: usize) -> String {
    let metrics = &font.metrics;
    let flags = if metrics.is_fixed_pitch { 33 } else { 32 };
    let font_file_entry = match program {
        FontProgramKind::OpenTypeCff => "FontFile3",
        FontProgramKind::TrueType => "FontFile2",
    };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV 80 /MissingWidth {} /{} {} 0 R >>",
        sanitize_font_name(&font.name),
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.missing_width,
        font_file_entry,
        font_file_id
    )
}

fn font_file_object(data: &[u8], program: FontProgramKind) -> String {
    let mut stream_data = ascii_hex_encode(data);
    stream_data.push_str(">\n");
    let mut dict = format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode",
        stream_data.len(),
        data.len()
    );
    if matches!(program, FontProgramKind::OpenTypeCff) {
        dict.push_str(" /Subtype /OpenType");
    }
    dict.push_str(" >>\nstream\n");
    format!("{}{}endstream", dict, stream_data)
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        HELVETICA.to_string()
    } else {
        out
    }
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &str,
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{} 0 obj\n", obj_id), offset)?;
    write_bytes(writer, body.as_bytes(), offset)?;
    write_bytes(writer, b"\nendobj\n", offset)?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::saturating_from_num(value);
    let milli: i64 = (fixed * I32F32::from_num(1000)).round().to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli())
}
