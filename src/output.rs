use crate::engine::RenderedDocument;
use crate::error::DossierError;
use crate::theme::DocumentKind;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const FINGERPRINT_CHARS: usize = 12;

/// Hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// `<kind>_<theme>_<hash prefix>.pdf`, safe for any file system.
pub fn output_file_name(kind: DocumentKind, theme_id: &str, fingerprint: &str) -> String {
    let theme = slug(theme_id);
    let hash: String = fingerprint
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(FINGERPRINT_CHARS)
        .collect();
    format!(
        "{}_{}_{}.pdf",
        kind.as_str(),
        if theme.is_empty() { "theme" } else { &theme },
        hash
    )
}

/// Writes the document into `dir` under its conventional name.
pub fn write_named(
    rendered: &RenderedDocument,
    dir: impl AsRef<Path>,
    kind: DocumentKind,
    theme_id: &str,
) -> Result<PathBuf, DossierError> {
    let bytes = rendered.to_pdf_bytes()?;
    let name = output_file_name(kind, theme_id, &fingerprint(&bytes));
    let path = dir.as_ref().join(name);
    std::fs::write(&path, &bytes)?;
    Ok(path)
}

fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
