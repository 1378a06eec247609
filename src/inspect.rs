use crate::error::DossierError;
use crate::font::winansi_char;
use lopdf::Document as LoDocument;
use lopdf::Object as LoObject;
use lopdf::content::Content;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub title: Option<String>,
    pub file_size_bytes: usize,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, DossierError> {
    let pdf = LoDocument::load_mem(bytes)?;
    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        title: info_title(&pdf),
        file_size_bytes: bytes.len(),
    })
}

pub fn inspect_pdf_path(path: impl AsRef<Path>) -> Result<PdfInspectReport, DossierError> {
    let data = std::fs::read(path)?;
    inspect_pdf_bytes(&data)
}

/// Text shown on each page, one string per `Tj` operation, decoded as WinAnsi.
pub fn page_texts(bytes: &[u8]) -> Result<Vec<Vec<String>>, DossierError> {
    let pdf = LoDocument::load_mem(bytes)?;
    let mut pages = Vec::new();
    for (_, page_id) in pdf.get_pages() {
        let raw = pdf.get_page_content(page_id)?;
        let content = Content::decode(&raw)?;
        let texts = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(LoObject::String(bytes, _)) => Some(decode_winansi(bytes)),
                _ => None,
            })
            .collect();
        pages.push(texts);
    }
    Ok(pages)
}

fn info_title(pdf: &LoDocument) -> Option<String> {
    let info = match pdf.trailer.get(b"Info").ok()? {
        LoObject::Reference(id) => pdf.get_object(*id).ok()?.as_dict().ok()?,
        LoObject::Dictionary(dict) => dict,
        _ => return None,
    };
    match info.get(b"Title").ok()? {
        LoObject::String(bytes, _) => Some(decode_winansi(bytes)),
        _ => None,
    }
}

fn decode_winansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| winansi_char(*byte).unwrap_or('?'))
        .collect()
}
