use crate::error::DossierError;
use crate::font::{HELVETICA, HELVETICA_BOLD};
use crate::types::{Color, Pt};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Character,
    Town,
    Organization,
    Danger,
    Group,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Character => "character",
            DocumentKind::Town => "town",
            DocumentKind::Organization => "organization",
            DocumentKind::Danger => "danger",
            DocumentKind::Group => "group",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Character => "Character",
            DocumentKind::Town => "Town",
            DocumentKind::Organization => "Organization",
            DocumentKind::Danger => "Danger",
            DocumentKind::Group => "Group",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParagraphKind {
    #[default]
    Normal,
    Intro,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: String,
    pub size: Pt,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStyle {
    pub text: TextStyle,
    pub border: Color,
    pub border_width: Pt,
    pub background: Option<Color>,
    pub padding_x: Pt,
    pub padding_y: Pt,
    pub chip: TextStyle,
    pub chip_background: Color,
    pub chip_padding: Pt,
    pub space_after: Pt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidebarStyle {
    pub fill: Color,
    pub number: TextStyle,
    pub label: TextStyle,
    /// Floor for the shrink-to-fit running label.
    pub label_min_size: Pt,
    pub padding: Pt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    pub toc_title: String,
    pub date_prefix: String,
    pub author_prefix: String,
}

/// Title size used when a theme has no entry for a level.
pub fn fallback_title_size(level: u8) -> Pt {
    match level {
        1 => Pt::from_i32(18),
        2 => Pt::from_i32(14),
        3 => Pt::from_i32(12),
        _ => Pt::from_i32(11),
    }
}

/// Visual decisions for one game system. The engine asks, it never decides.
pub trait Theme: Send + Sync {
    fn id(&self) -> &str;
    fn running_label_for(&self, kind: DocumentKind, title: &str) -> String;
    fn body_style(&self) -> TextStyle;
    fn title_size(&self, level: u8) -> Option<Pt>;
    fn title_style(&self, level: u8) -> TextStyle;
    fn uppercase_titles(&self) -> bool;
    fn box_style(&self) -> BoxStyle;
    fn bullet_glyph(&self) -> &str;
    fn sidebar_style(&self) -> SidebarStyle;
    fn labels(&self) -> Labels;

    fn paragraph_style(&self, kind: ParagraphKind) -> TextStyle {
        let _ = kind;
        self.body_style()
    }

    fn validate(&self) -> Result<(), DossierError> {
        Ok(())
    }

    /// Every font the theme may select. Checked against the registry before
    /// the first page is opened.
    fn font_names(&self) -> Vec<String> {
        let mut names = vec![
            self.body_style().font,
            self.paragraph_style(ParagraphKind::Intro).font,
            self.box_style().text.font,
            self.box_style().chip.font,
            self.sidebar_style().number.font,
            self.sidebar_style().label.font,
        ];
        names.extend((1..=3).map(|level| self.title_style(level).font));
        names.sort();
        names.dedup();
        names
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SidebarSpec {
    pub fill: Color,
    pub text_color: Color,
    pub number_size: f32,
    pub label_size: f32,
    pub label_min_size: f32,
    pub padding: f32,
}

impl Default for SidebarSpec {
    fn default() -> Self {
        Self {
            fill: Color::rgb(0.29, 0.2, 0.13),
            text_color: Color::WHITE,
            number_size: 10.0,
            label_size: 9.0,
            label_min_size: 4.5,
            padding: 6.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalloutSpec {
    pub size: f32,
    pub border: Color,
    pub border_width: f32,
    pub background: Option<Color>,
    pub chip_background: Color,
    pub chip_text: Color,
    pub chip_size: f32,
    pub chip_padding: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    pub space_after: f32,
}

impl Default for CalloutSpec {
    fn default() -> Self {
        Self {
            size: 10.0,
            border: Color::rgb(0.29, 0.2, 0.13),
            border_width: 1.0,
            background: Some(Color::rgb(0.97, 0.94, 0.87)),
            chip_background: Color::rgb(0.29, 0.2, 0.13),
            chip_text: Color::WHITE,
            chip_size: 8.0,
            chip_padding: 4.0,
            padding_x: 10.0,
            padding_y: 10.0,
            space_after: 12.0,
        }
    }
}

/// Data-driven theme, loadable from JSON.
///
/// ```json
/// { "id": "grimdark", "body_font": "Helvetica", "title_sizes": [20, 15, 12],
///   "running_label": "{kind} file: {title}", "sidebar": { "fill": "#000000" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeSpec {
    pub id: String,
    pub body_font: String,
    pub bold_font: String,
    pub body_size: f32,
    pub intro_size: f32,
    pub text_color: Color,
    pub heading_color: Color,
    /// Sizes for levels 1, 2, 3; missing levels use the fallback table.
    pub title_sizes: Vec<f32>,
    pub uppercase_titles: bool,
    /// `{kind}` and `{title}` are substituted.
    pub running_label: String,
    pub bullet: String,
    pub sidebar: SidebarSpec,
    pub callout: CalloutSpec,
    pub toc_title: String,
    pub date_prefix: String,
    pub author_prefix: String,
}

impl Default for ThemeSpec {
    fn default() -> Self {
        Self::classic()
    }
}

impl ThemeSpec {
    pub fn classic() -> Self {
        Self {
            id: "classic".to_string(),
            body_font: HELVETICA.to_string(),
            bold_font: HELVETICA_BOLD.to_string(),
            body_size: 10.0,
            intro_size: 11.0,
            text_color: Color::rgb(0.1, 0.1, 0.1),
            heading_color: Color::rgb(0.29, 0.2, 0.13),
            title_sizes: vec![18.0, 14.0, 12.0],
            uppercase_titles: false,
            running_label: "{kind}: {title}".to_string(),
            bullet: "\u{2022}".to_string(),
            sidebar: SidebarSpec::default(),
            callout: CalloutSpec::default(),
            toc_title: "Contents".to_string(),
            date_prefix: "Generated ".to_string(),
            author_prefix: "Prepared by ".to_string(),
        }
    }

    pub fn grimdark() -> Self {
        let ink = Color::rgb(0.55, 0.05, 0.05);
        Self {
            id: "grimdark".to_string(),
            body_size: 9.5,
            intro_size: 10.5,
            text_color: Color::rgb(0.08, 0.08, 0.08),
            heading_color: ink,
            title_sizes: vec![20.0, 15.0],
            uppercase_titles: true,
            running_label: "{kind} file // {title}".to_string(),
            bullet: "-".to_string(),
            sidebar: SidebarSpec {
                fill: Color::rgb(0.08, 0.08, 0.08),
                text_color: Color::rgb(0.9, 0.85, 0.75),
                ..SidebarSpec::default()
            },
            callout: CalloutSpec {
                border: ink,
                border_width: 1.5,
                background: None,
                chip_background: ink,
                ..CalloutSpec::default()
            },
            toc_title: "Index of Records".to_string(),
            ..Self::classic()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DossierError> {
        let spec: ThemeSpec = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DossierError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    fn style(&self, font: &str, size: f32, color: Color) -> TextStyle {
        TextStyle {
            font: font.to_string(),
            size: Pt::from_f32(size),
            color,
        }
    }
}

impl Theme for ThemeSpec {
    fn id(&self) -> &str {
        &self.id
    }

    fn running_label_for(&self, kind: DocumentKind, title: &str) -> String {
        self.running_label
            .replace("{kind}", kind.label())
            .replace("{title}", title)
    }

    fn body_style(&self) -> TextStyle {
        self.style(&self.body_font, self.body_size, self.text_color)
    }

    fn title_size(&self, level: u8) -> Option<Pt> {
        let index = usize::from(level).checked_sub(1)?;
        self.title_sizes.get(index).map(|size| Pt::from_f32(*size))
    }

    fn title_style(&self, level: u8) -> TextStyle {
        TextStyle {
            font: self.bold_font.clone(),
            size: self
                .title_size(level)
                .unwrap_or_else(|| fallback_title_size(level)),
            color: self.heading_color,
        }
    }

    fn uppercase_titles(&self) -> bool {
        self.uppercase_titles
    }

    fn paragraph_style(&self, kind: ParagraphKind) -> TextStyle {
        match kind {
            ParagraphKind::Normal => self.body_style(),
            ParagraphKind::Intro => self.style(&self.body_font, self.intro_size, self.heading_color),
        }
    }

    fn box_style(&self) -> BoxStyle {
        let c = &self.callout;
        BoxStyle {
            text: self.style(&self.body_font, c.size, self.text_color),
            border: c.border,
            border_width: Pt::from_f32(c.border_width),
            background: c.background,
            padding_x: Pt::from_f32(c.padding_x),
            padding_y: Pt::from_f32(c.padding_y),
            chip: self.style(&self.bold_font, c.chip_size, c.chip_text),
            chip_background: c.chip_background,
            chip_padding: Pt::from_f32(c.chip_padding),
            space_after: Pt::from_f32(c.space_after),
        }
    }

    fn bullet_glyph(&self) -> &str {
        &self.bullet
    }

    fn sidebar_style(&self) -> SidebarStyle {
        let s = &self.sidebar;
        SidebarStyle {
            fill: s.fill,
            number: self.style(&self.bold_font, s.number_size, s.text_color),
            label: self.style(&self.bold_font, s.label_size, s.text_color),
            label_min_size: Pt::from_f32(s.label_min_size),
            padding: Pt::from_f32(s.padding),
        }
    }

    fn labels(&self) -> Labels {
        Labels {
            toc_title: self.toc_title.clone(),
            date_prefix: self.date_prefix.clone(),
            author_prefix: self.author_prefix.clone(),
        }
    }

    fn validate(&self) -> Result<(), DossierError> {
        let fail = |message: String| Err(DossierError::Theme(message));
        if self.id.trim().is_empty() {
            return fail("theme id is empty".to_string());
        }
        if self.bullet.trim().is_empty() {
            return fail(format!("{}: bullet glyph is empty", self.id));
        }
        let mut sizes = vec![
            ("body_size", self.body_size),
            ("intro_size", self.intro_size),
            ("callout.size", self.callout.size),
            ("callout.chip_size", self.callout.chip_size),
            ("sidebar.number_size", self.sidebar.number_size),
            ("sidebar.label_size", self.sidebar.label_size),
            ("sidebar.label_min_size", self.sidebar.label_min_size),
        ];
        sizes.extend(self.title_sizes.iter().map(|size| ("title_sizes", *size)));
        for (field, value) in sizes {
            if !value.is_finite() || value <= 0.0 {
                return fail(format!("{}: {} must be positive, got {}", self.id, field, value));
            }
        }
        if self.sidebar.label_min_size > self.sidebar.label_size {
            return fail(format!(
                "{}: sidebar.label_min_size exceeds sidebar.label_size",
                self.id
            ));
        }
        let paddings = [
            ("callout.padding_x", self.callout.padding_x),
            ("callout.padding_y", self.callout.padding_y),
            ("callout.chip_padding", self.callout.chip_padding),
            ("callout.border_width", self.callout.border_width),
            ("sidebar.padding", self.sidebar.padding),
        ];
        for (field, value) in paddings {
            if !value.is_finite() || value < 0.0 {
                return fail(format!("{}: {} must not be negative", self.id, field));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_themes_validate() {
        ThemeSpec::classic().validate().unwrap();
        ThemeSpec::grimdark().validate().unwrap();
        assert_eq!(ThemeSpec::default().id, "classic");
    }

    #[test]
    fn title_sizes_fall_back_per_level() {
        let theme = ThemeSpec {
            title_sizes: Vec::new(),
            ..ThemeSpec::classic()
        };
        let sizes: Vec<i64> = (1..=4)
            .map(|level| theme.title_style(level).size.to_milli())
            .collect();
        assert_eq!(sizes, vec![18000, 14000, 12000, 11000]);
        assert_eq!(theme.title_size(0), None);

        let grim = ThemeSpec::grimdark();
        assert_eq!(grim.title_style(2).size, Pt::from_i32(15));
        assert_eq!(grim.title_style(3).size, Pt::from_i32(12));
    }

    #[test]
    fn running_label_substitutes_kind_and_title() {
        let theme = ThemeSpec::classic();
        assert_eq!(
            theme.running_label_for(DocumentKind::Town, "Saltmarsh"),
            "Town: Saltmarsh"
        );
    }

    #[test]
    fn json_theme_overrides_defaults() {
        let theme = ThemeSpec::from_json_str(
            r##"{ "id": "sea", "uppercase_titles": true,
                  "sidebar": { "fill": "#003366" },
                  "callout": { "background": null } }"##,
        )
        .unwrap();
        assert_eq!(theme.id(), "sea");
        assert!(theme.uppercase_titles());
        assert_eq!(theme.sidebar.fill, Color::from_hex("#003366").unwrap());
        assert_eq!(theme.sidebar.padding, 6.0);
        assert!(theme.box_style().background.is_none());
        assert_eq!(theme.body_style().font, HELVETICA);
    }

    #[test]
    fn json_theme_rejects_bad_values() {
        let err = ThemeSpec::from_json_str(r#"{ "body_size": 0 }"#).unwrap_err();
        assert!(matches!(err, DossierError::Theme(_)));
        let err = ThemeSpec::from_json_str(r#"{ "sidebar": { "fill": "blue" } }"#).unwrap_err();
        assert!(matches!(err, DossierError::Data(_)));
        let err = ThemeSpec::from_json_str(r##"{ "colour": "#fff" }"##).unwrap_err();
        assert!(matches!(err, DossierError::Data(_)));
        let err = ThemeSpec::from_json_str(r##"{ "sidebar": { "fill": "#1é234" } }"##)
            .unwrap_err();
        assert!(matches!(err, DossierError::Data(_)));
    }

    #[test]
    fn font_names_cover_every_style() {
        let names = ThemeSpec::classic().font_names();
        assert_eq!(names, vec![HELVETICA.to_string(), HELVETICA_BOLD.to_string()]);
    }
}
