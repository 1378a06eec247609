use crate::engine::DocumentEngine;
use crate::error::DossierError;
use crate::finalize::CoverPage;
use crate::flow::{ListOptions, ParagraphOptions, TitleOptions};
use crate::theme::{DocumentKind, ParagraphKind};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// Decides what a document says by driving the engine's primitives.
pub trait ContentGenerator {
    fn kind(&self) -> DocumentKind;
    fn title(&self) -> &str;
    fn cover(&self) -> CoverPage;
    fn generate(&self, engine: &mut DocumentEngine) -> Result<(), DossierError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Callout {
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Section {
    pub heading: String,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub page_break_before: bool,
    /// Replaces the sidebar label from the next page on.
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub intro: Option<String>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub callouts: Vec<Callout>,
}

fn default_level() -> u8 {
    1
}

/// Game data for one dossier, as exported by the character-sheet app.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DossierData {
    pub kind: DocumentKind,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Renders any document kind as a run of headed sections.
#[derive(Debug, Clone)]
pub struct SectionedDossier {
    data: DossierData,
}

impl SectionedDossier {
    pub fn new(data: DossierData) -> Self {
        Self { data }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DossierError> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DossierError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn data(&self) -> &DossierData {
        &self.data
    }
}

impl ContentGenerator for SectionedDossier {
    fn kind(&self) -> DocumentKind {
        self.data.kind
    }

    fn title(&self) -> &str {
        &self.data.title
    }

    fn cover(&self) -> CoverPage {
        let mut cover = CoverPage::new(self.data.title.clone());
        cover.subtitle = self.data.subtitle.clone();
        cover.author = self.data.author.clone();
        if self.data.date.is_some() {
            cover.date = self.data.date;
        }
        cover
    }

    fn generate(&self, engine: &mut DocumentEngine) -> Result<(), DossierError> {
        let title_options = TitleOptions::default();
        let body = ParagraphOptions::default();
        let intro = ParagraphOptions {
            kind: ParagraphKind::Intro,
            ..ParagraphOptions::default()
        };
        let list = ListOptions::default();

        for section in &self.data.sections {
            if section.page_break_before && !engine.at_page_top() {
                engine.page_break()?;
            }
            if let Some(chapter) = &section.chapter {
                engine.set_running_label(chapter.clone());
            }
            engine.title(&section.heading, section.level, &title_options)?;
            if let Some(text) = &section.intro {
                engine.paragraph(text, &intro)?;
            }
            for text in &section.paragraphs {
                engine.paragraph(text, &body)?;
            }
            if !section.bullets.is_empty() {
                engine.bulleted_list(&section.bullets, &list)?;
            }
            for callout in &section.callouts {
                engine.callout_box(&callout.kind, &callout.text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_and_full_sections() {
        let generator = SectionedDossier::from_json_str(
            r#"{
                "kind": "danger",
                "title": "The Drowned Bell",
                "date": "2024-03-09",
                "sections": [
                    { "heading": "Overview" },
                    { "heading": "Signs", "level": 2, "page_break_before": true,
                      "bullets": ["Salt on the stairs"],
                      "callouts": [{ "kind": "warning", "text": "Do not ring it." }] }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(generator.kind(), DocumentKind::Danger);
        assert_eq!(generator.title(), "The Drowned Bell");
        let sections = &generator.data().sections;
        assert_eq!(sections[0].level, 1);
        assert!(!sections[0].page_break_before);
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[1].callouts[0].kind, "warning");
        assert_eq!(
            generator.cover().date,
            NaiveDate::from_ymd_opt(2024, 3, 9)
        );
    }

    #[test]
    fn rejects_unknown_kinds_and_fields() {
        let err = SectionedDossier::from_json_str(r#"{ "kind": "dragon", "title": "x" }"#)
            .unwrap_err();
        assert!(matches!(err, DossierError::Data(_)));
        let err = SectionedDossier::from_json_str(
            r#"{ "kind": "town", "title": "x", "mayor": "Bob" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DossierError::Data(_)));
    }
}
