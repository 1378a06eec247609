#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub structural: bool,
    pub command_count: usize,
    pub content_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub toc_entries: usize,
    pub structural_pages: usize,
    pub layout_ms: f64,
    pub total_bytes: usize,
}

impl DocumentMetrics {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn content_pages(&self) -> usize {
        self.pages.len().saturating_sub(self.structural_pages)
    }
}
