use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Why the engine moved to a new page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    Overflow,
    Explicit,
    KeepWithNext,
    Box,
    ListItem,
}

impl BreakReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakReason::Overflow => "overflow",
            BreakReason::Explicit => "explicit",
            BreakReason::KeepWithNext => "keep_with_next",
            BreakReason::Box => "box",
            BreakReason::ListItem => "list_item",
        }
    }
}

/// JSON-lines layout trace. Write failures are swallowed; tracing never fails a render.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    /// Counters per document id, drained by that document's summary.
    counters: HashMap<usize, HashMap<String, u64>>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, doc: usize, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state
                .counters
                .entry(doc)
                .or_default()
                .entry(key.to_string())
                .or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn page_break(&self, doc: usize, reason: BreakReason, from_page: usize, to_page: usize) {
        self.increment(doc, &format!("page_break.{}", reason.as_str()), 1);
        self.log_json(&format!(
            "{{\"type\":\"layout.page_break\",\"doc\":{},\"reason\":\"{}\",\"from_page\":{},\"to_page\":{}}}",
            doc,
            reason.as_str(),
            from_page,
            to_page
        ));
    }

    pub fn furnish(&self, doc: usize, page: usize, label: &str, label_size: f32) {
        self.log_json(&format!(
            "{{\"type\":\"layout.furnish\",\"doc\":{},\"page\":{},\"label\":\"{}\",\"label_size\":{:.2}}}",
            doc,
            page,
            json_escape(label),
            label_size
        ));
    }

    pub fn toc_record(&self, doc: usize, title: &str, level: u8, page: usize) {
        self.increment(doc, "toc.entries", 1);
        self.log_json(&format!(
            "{{\"type\":\"toc.record\",\"doc\":{},\"title\":\"{}\",\"level\":{},\"page\":{}}}",
            doc,
            json_escape(title),
            level,
            page
        ));
    }

    pub fn restructure(
        &self,
        doc: usize,
        content_pages: usize,
        structural_pages: usize,
        toc_pages: usize,
    ) {
        self.log_json(&format!(
            "{{\"type\":\"finalize.restructure\",\"doc\":{},\"content_pages\":{},\"structural_pages\":{},\"toc_pages\":{}}}",
            doc, content_pages, structural_pages, toc_pages
        ));
    }

    /// Writes and clears the counters of one document.
    pub fn emit_summary(&self, doc: usize) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state
                .counters
                .remove(&doc)
                .unwrap_or_default()
                .into_iter()
                .collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let mut counts_json = String::from("{");
            for (idx, (key, value)) in counters.iter().enumerate() {
                if idx > 0 {
                    counts_json.push(',');
                }
                counts_json.push_str(&format!("\"{}\":{}", json_escape(key), value));
            }
            counts_json.push('}');
            let json = format!(
                "{{\"type\":\"debug.summary\",\"doc\":{},\"context\":\"doc.{}\",\"counts\":{}}}",
                doc,
                doc,
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out
}
