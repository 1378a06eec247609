/// One heading captured for the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub level: u8,
    pub page_number: usize,
}

/// Append-only list of headings in document order.
#[derive(Debug, Clone, Default)]
pub struct TocTracker {
    entries: Vec<TocEntry>,
}

impl TocTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels outside 1..=3 are clamped into range.
    pub fn record(&mut self, title: impl Into<String>, level: u8, page_number: usize) {
        self.entries.push(TocEntry {
            title: title.into(),
            level: level.clamp(1, 3),
            page_number,
        });
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<TocEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut toc = TocTracker::new();
        toc.record("Late heading", 1, 9);
        toc.record("Early page, later call", 2, 3);
        let pages: Vec<usize> = toc.entries().iter().map(|e| e.page_number).collect();
        assert_eq!(pages, vec![9, 3]);
    }

    #[test]
    fn clamps_levels() {
        let mut toc = TocTracker::new();
        toc.record("a", 0, 1);
        toc.record("b", 7, 1);
        assert_eq!(toc.entries()[0].level, 1);
        assert_eq!(toc.entries()[1].level, 3);
        assert_eq!(toc.len(), 2);
        assert!(!toc.is_empty());
    }
}
