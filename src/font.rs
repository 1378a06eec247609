use crate::error::DossierError;
use crate::types::Pt;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

pub const HELVETICA: &str = "Helvetica";
pub const HELVETICA_BOLD: &str = "Helvetica-Bold";

const FIRST_CODE: u8 = 32;
const CODE_COUNT: usize = 224;

// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, //
];

// WinAnsi code points that differ from Latin-1 (0x80..=0x9F).
const WINANSI_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

/// Maps a character to its WinAnsi byte, if it has one.
pub(crate) fn winansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    if (0x20..0x7F).contains(&code) || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    WINANSI_HIGH
        .iter()
        .find(|(_, c)| *c == ch)
        .map(|(byte, _)| *byte)
}

pub(crate) fn winansi_char(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E | 0xA0..=0xFF => Some(byte as char),
        _ => WINANSI_HIGH
            .iter()
            .find(|(b, _)| *b == byte)
            .map(|(_, ch)| *ch),
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct WidthKey {
    font_index: usize,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct WidthCache {
    map: HashMap<WidthKey, Pt>,
    order: VecDeque<WidthKey>,
    max_entries: usize,
}

impl WidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &WidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: WidthKey, value: Pt) {
        if self.map.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            let Some(old) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&old);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

#[derive(Debug)]
pub(crate) enum FontSource {
    /// One of the PDF standard fonts; referenced by name, never embedded.
    Standard,
    Embedded {
        data: Vec<u8>,
        program: FontProgramKind,
    },
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) line_gap: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

impl FontMetrics {
    fn standard(ascii: &[u16; 95], bold: bool) -> Self {
        let mut widths = vec![0u16; CODE_COUNT];
        widths[..ascii.len()].copy_from_slice(ascii);
        let lower = ascii[(b'e' - FIRST_CODE) as usize];
        let upper = if bold { 722 } else { 667 };
        for code in 0x80u16..=0xFF {
            let byte = code as u8;
            let Some(ch) = winansi_char(byte) else {
                continue;
            };
            // Accented Latin letters are approximated by a typical letter width.
            let width = match ch {
                '\u{2022}' => 350,
                '\u{2013}' | '\u{20AC}' => 556,
                '\u{2014}' | '\u{2026}' | '\u{2030}' => 1000,
                '\u{2018}' | '\u{2019}' | '\u{201A}' => {
                    if bold {
                        278
                    } else {
                        222
                    }
                }
                '\u{201C}' | '\u{201D}' | '\u{201E}' => {
                    if bold {
                        500
                    } else {
                        333
                    }
                }
                '\u{00A0}' => 278,
                c if c.is_uppercase() => upper,
                c if c.is_lowercase() => lower,
                _ => 556,
            };
            widths[(byte - FIRST_CODE) as usize] = width;
        }
        Self {
            widths,
            ascent: 718,
            descent: -207,
            line_gap: 0,
            cap_height: 718,
            italic_angle: 0,
            bbox: (-166, -225, 1000, 931),
            missing_width: 278,
            is_fixed_pitch: false,
        }
    }

    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let advance = |ch: char| {
            face.glyph_index(ch)
                .and_then(|id| face.glyph_hor_advance(id))
                .map(|w| ((w as f32 * scale).round() as i32).clamp(0, u16::MAX as i32) as u16)
        };
        let missing_width = advance(' ').unwrap_or(0);
        let widths = (0..CODE_COUNT)
            .map(|idx| {
                winansi_char(FIRST_CODE + idx as u8)
                    .and_then(advance)
                    .unwrap_or(missing_width)
            })
            .collect();
        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        Self {
            widths,
            ascent,
            descent: scale_i16(face.descender(), scale),
            line_gap: scale_i16(face.line_gap(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face
                .italic_angle()
                .map(|value| value.round() as i16)
                .unwrap_or(0),
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
        }
    }

    /// Width of `text` in 1/1000 em. Characters outside WinAnsi are measured as
    /// `?`, which is what the PDF writer substitutes for them.
    fn width_units(&self, text: &str) -> i32 {
        text.chars()
            .map(|ch| {
                let byte = winansi_byte(ch).unwrap_or(b'?');
                self.widths
                    .get((byte - FIRST_CODE) as usize)
                    .copied()
                    .unwrap_or(self.missing_width) as i32
            })
            .sum()
    }
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) metrics: FontMetrics,
    pub(crate) source: FontSource,
}

impl RegisteredFont {
    fn line_height(&self, font_size: Pt) -> Pt {
        match self.source {
            FontSource::Standard => font_size.mul_ratio(6, 5),
            FontSource::Embedded { .. } => {
                let m = &self.metrics;
                let units = m.ascent as i32 - m.descent as i32 + m.line_gap as i32;
                font_size.mul_ratio(units.max(0), 1000).max(font_size)
            }
        }
    }
}

/// Fonts known to one engine configuration. Measurement never guesses: an
/// unknown font name is an error, so box heights cannot drift from what is drawn.
#[derive(Debug)]
pub(crate) struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    width_cache: Mutex<WidthCache>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub(crate) fn new() -> Self {
        let mut registry = Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            width_cache: Mutex::new(WidthCache::new(20_000)),
        };
        registry.push(
            RegisteredFont {
                name: HELVETICA.to_string(),
                metrics: FontMetrics::standard(&HELVETICA_ASCII, false),
                source: FontSource::Standard,
            },
            &[],
        );
        registry.push(
            RegisteredFont {
                name: HELVETICA_BOLD.to_string(),
                metrics: FontMetrics::standard(&HELVETICA_BOLD_ASCII, true),
                source: FontSource::Standard,
            },
            &[],
        );
        registry
    }

    fn push(&mut self, font: RegisteredFont, aliases: &[String]) -> String {
        let index = self.fonts.len();
        let name = font.name.clone();
        self.fonts.push(font);
        for alias in std::iter::once(&name).chain(aliases.iter()) {
            let key = normalize_name(alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        name
    }

    /// Registers every `.ttf`/`.otf` file in `path`, returning the primary names.
    pub(crate) fn register_dir(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>, DossierError> {
        let mut names = Vec::new();
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && is_font_file(p))
            .collect();
        paths.sort();
        for path in paths {
            names.push(self.register_file(&path, None)?);
        }
        Ok(names)
    }

    pub(crate) fn register_file(
        &mut self,
        path: impl AsRef<Path>,
        alias: Option<&str>,
    ) -> Result<String, DossierError> {
        let path = path.as_ref();
        if !is_font_file(path) {
            return Err(DossierError::Font(format!(
                "{} is not a .ttf or .otf file",
                path.display()
            )));
        }
        let data = fs::read(path)?;
        self.register_bytes(data, path, alias)
    }

    pub(crate) fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source: &Path,
        alias: Option<&str>,
    ) -> Result<String, DossierError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| {
            DossierError::Font(format!("invalid font data in {}: {}", source.display(), err))
        })?;
        let (name, mut aliases) = font_names(&face, source);
        let metrics = FontMetrics::from_face(&face);
        let program = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };
        drop(face);
        if let Some(alias) = alias {
            aliases.insert(0, alias.to_string());
        }
        Ok(self.push(
            RegisteredFont {
                name,
                metrics,
                source: FontSource::Embedded { data, program },
            },
            &aliases,
        ))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(&normalize_name(name))
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&RegisteredFont> {
        self.lookup
            .get(&normalize_name(name))
            .and_then(|index| self.fonts.get(*index))
    }

    pub(crate) fn fonts(&self) -> impl Iterator<Item = &RegisteredFont> {
        self.fonts.iter()
    }

    pub(crate) fn measure(&self, name: &str, font_size: Pt, text: &str) -> Result<Pt, DossierError> {
        let Some(index) = self.lookup.get(&normalize_name(name)).copied() else {
            return Err(unknown_font(name));
        };
        let key = WidthKey {
            font_index: index,
            size_milli: font_size.to_milli(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.width_cache.lock() {
            if let Some(value) = cache.get(&key) {
                return Ok(value);
            }
        }
        let units = self.fonts[index].metrics.width_units(text);
        let value = font_size.mul_ratio(units, 1000);
        if let Ok(mut cache) = self.width_cache.lock() {
            cache.insert(key, value);
        }
        Ok(value)
    }

    pub(crate) fn line_height(&self, name: &str, font_size: Pt) -> Result<Pt, DossierError> {
        self.resolve(name)
            .map(|font| font.line_height(font_size))
            .ok_or_else(|| unknown_font(name))
    }
}

fn unknown_font(name: &str) -> DossierError {
    DossierError::Measurement(format!("font {name:?} is not registered"))
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|v| v.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        .unwrap_or(false)
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        let slot = match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => &mut family,
            name_id::FULL_NAME => &mut full,
            name_id::POST_SCRIPT_NAME => &mut post,
            _ => continue,
        };
        slot.get_or_insert(name);
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());
    let aliases = [family, full, post, stem]
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

/// Minimal TrueType face for tests: 1000 upem, ascender 800, descender -200,
/// line gap 100. Space advances 250, printable ASCII 600, everything else
/// falls back to the space width.
#[cfg(test)]
pub(crate) fn sample_truetype() -> Vec<u8> {
    fn be16(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_be_bytes());
    }
    fn be32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    let mut cmap = Vec::new();
    be16(&mut cmap, 0);
    be16(&mut cmap, 1);
    be16(&mut cmap, 0);
    be16(&mut cmap, 3);
    be32(&mut cmap, 12);
    be16(&mut cmap, 0);
    be16(&mut cmap, 262);
    be16(&mut cmap, 0);
    cmap.extend((0u16..256).map(|code| match code {
        0x20 => 1u8,
        0x21..=0x7E => 2,
        _ => 0,
    }));

    let mut head = Vec::new();
    be32(&mut head, 0x0001_0000);
    be32(&mut head, 0x0001_0000);
    be32(&mut head, 0);
    be32(&mut head, 0x5F0F_3CF5);
    be16(&mut head, 0);
    be16(&mut head, 1000);
    head.extend_from_slice(&[0; 16]);
    for value in [0i16, -200, 600, 800] {
        head.extend_from_slice(&value.to_be_bytes());
    }
    head.extend_from_slice(&[0; 6]);
    be16(&mut head, 0);
    be16(&mut head, 0);

    let mut hhea = Vec::new();
    be32(&mut hhea, 0x0001_0000);
    for value in [800i16, -200, 100] {
        hhea.extend_from_slice(&value.to_be_bytes());
    }
    be16(&mut hhea, 600);
    hhea.extend_from_slice(&[0; 22]);
    be16(&mut hhea, 3);

    let mut hmtx = Vec::new();
    for advance in [500u16, 250, 600] {
        be16(&mut hmtx, advance);
        be16(&mut hmtx, 0);
    }

    let mut maxp = Vec::new();
    be32(&mut maxp, 0x0000_5000);
    be16(&mut maxp, 3);

    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ];
    let mut out = Vec::new();
    be32(&mut out, 0x0001_0000);
    be16(&mut out, tables.len() as u16);
    be16(&mut out, 64);
    be16(&mut out, 2);
    be16(&mut out, 16);
    let mut offset = 12 + 16 * tables.len();
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        be32(&mut out, 0);
        be32(&mut out, offset as u32);
        be32(&mut out, data.len() as u32);
        offset += data.len().div_ceil(4) * 4;
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
        out.resize(out.len().div_ceil(4) * 4, 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_fonts_are_preregistered() {
        let fonts = FontRegistry::new();
        assert!(fonts.contains("helvetica"));
        assert!(fonts.contains(" 'Helvetica-Bold' "));
        assert!(!fonts.contains("Garamond"));
    }

    #[test]
    fn helvetica_widths_match_afm() {
        let fonts = FontRegistry::new();
        let size = Pt::from_i32(10);
        // H=722 e=556 l=222 l=222 o=556 -> 2278 units
        let width = fonts.measure(HELVETICA, size, "Hello").unwrap();
        assert_eq!(width.to_milli(), 22780);
        let bold = fonts.measure(HELVETICA_BOLD, size, "Hello").unwrap();
        assert!(bold > width);
        let bullet = fonts.measure(HELVETICA, size, "\u{2022}").unwrap();
        assert_eq!(bullet.to_milli(), 3500);
    }

    #[test]
    fn unknown_font_is_a_measurement_error() {
        let fonts = FontRegistry::new();
        let err = fonts
            .measure("Garamond", Pt::from_i32(10), "text")
            .expect_err("unregistered font must not be measured");
        assert!(matches!(err, DossierError::Measurement(_)));
        assert!(fonts.line_height("Garamond", Pt::from_i32(10)).is_err());
    }

    #[test]
    fn unencodable_text_measures_as_question_marks() {
        let fonts = FontRegistry::new();
        let size = Pt::from_i32(12);
        let cjk = fonts.measure(HELVETICA, size, "\u{4E2D}").unwrap();
        let question = fonts.measure(HELVETICA, size, "?").unwrap();
        assert_eq!(cjk, question);
    }

    #[test]
    fn winansi_round_trips_high_codes() {
        assert_eq!(winansi_byte('\u{2022}'), Some(0x95));
        assert_eq!(winansi_char(0x95), Some('\u{2022}'));
        assert_eq!(winansi_byte('\u{00E9}'), Some(0xE9));
        assert_eq!(winansi_byte('\u{4E2D}'), None);
        assert_eq!(winansi_char(0x81), None);
    }

    #[test]
    fn standard_line_height_is_six_fifths() {
        let fonts = FontRegistry::new();
        let lh = fonts.line_height(HELVETICA, Pt::from_i32(10)).unwrap();
        assert_eq!(lh.to_milli(), 12000);
    }

    #[test]
    fn rejects_non_font_files() {
        let mut fonts = FontRegistry::new();
        let err = fonts
            .register_file("/tmp/not-a-font.txt", None)
            .expect_err("txt is not a font");
        assert!(matches!(err, DossierError::Font(_)));
        let err = fonts
            .register_bytes(vec![0, 1, 2, 3], Path::new("broken.ttf"), None)
            .expect_err("garbage bytes are not a font");
        assert!(err.to_string().contains("broken.ttf"));
    }

    #[test]
    fn truetype_faces_register_under_stem_and_alias() {
        let mut fonts = FontRegistry::new();
        let name = fonts
            .register_bytes(sample_truetype(), Path::new("fonts/TestSans.ttf"), Some("Body"))
            .unwrap();
        assert_eq!(name, "TestSans");
        assert!(fonts.contains("testsans"));
        assert!(fonts.contains("Body"));

        let size = Pt::from_i32(10);
        // A=600 space=250 b=600
        assert_eq!(fonts.measure("Body", size, "A b").unwrap().to_milli(), 14500);
        // Unmapped WinAnsi letters take the space advance.
        assert_eq!(fonts.measure("Body", size, "\u{e9}").unwrap().to_milli(), 2500);
        // (800 + 200 + 100) / 1000 em
        assert_eq!(fonts.line_height("Body", size).unwrap().to_milli(), 11000);

        let font = fonts.resolve("Body").unwrap();
        assert!(matches!(
            font.source,
            FontSource::Embedded { program: FontProgramKind::TrueType, .. }
        ));
        assert_eq!(font.metrics.bbox, (0, -200, 600, 800));
    }

    #[test]
    fn font_files_register_from_disk_and_directories() {
        let dir = std::env::temp_dir().join(format!(
            "dossier_fonts_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Alpha.ttf"), sample_truetype()).unwrap();
        fs::write(dir.join("Beta.TTF"), sample_truetype()).unwrap();
        fs::write(dir.join("notes.txt"), b"not a font").unwrap();

        let mut fonts = FontRegistry::new();
        let names = fonts.register_dir(&dir).unwrap();
        assert_eq!(names, vec!["Alpha".to_string(), "Beta".to_string()]);

        let mut single = FontRegistry::new();
        let name = single.register_file(dir.join("Alpha.ttf"), Some("Heading")).unwrap();
        assert_eq!(name, "Alpha");
        assert!(single.contains("heading"));
        let _ = fs::remove_dir_all(&dir);
    }
}
