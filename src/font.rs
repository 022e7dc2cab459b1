use crate::error::ReportError;
use crate::types::Pt;
use std::path::Path;

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    Regular,
    Italic,
    Bold,
}

impl FontStyle {
    pub const ALL: [FontStyle; 3] = [FontStyle::Regular, FontStyle::Italic, FontStyle::Bold];

    pub(crate) fn resource_name(self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Italic => "F2",
            FontStyle::Bold => "F3",
        }
    }
}

/// Where the program of one font style comes from.
#[derive(Debug, Clone)]
pub enum FontSource {
    /// One of the standard Helvetica faces every PDF reader ships.
    Builtin,
    /// TrueType program bytes, embedded into the output.
    TrueType(Vec<u8>),
}

impl FontSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| {
            ReportError::Font(format!("cannot read font {}: {err}", path.display()))
        })?;
        Ok(FontSource::TrueType(data))
    }
}

#[derive(Debug, Clone)]
pub struct FontSet {
    pub regular: FontSource,
    pub italic: FontSource,
    pub bold: FontSource,
}

impl FontSet {
    pub fn helvetica() -> Self {
        Self {
            regular: FontSource::Builtin,
            italic: FontSource::Builtin,
            bold: FontSource::Builtin,
        }
    }

    fn source(&self, style: FontStyle) -> &FontSource {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Italic => &self.italic,
            FontStyle::Bold => &self.bold,
        }
    }
}

impl Default for FontSet {
    fn default() -> Self {
        Self::helvetica()
    }
}

/// Width measurement used by text fitting. Widths are in points.
pub trait TextMeasure {
    fn text_width(&self, text: &str, style: FontStyle, size: Pt) -> Pt;
}

#[derive(Debug)]
pub(crate) enum FontProgram {
    Base14(&'static str),
    TrueType(Vec<u8>),
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) program: FontProgram,
    pub(crate) metrics: FontMetrics,
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) widths: Vec<u16>,
    pub(crate) missing_width: u16,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) is_fixed_pitch: bool,
}

/// The three faces a report draws with, loaded once per engine.
#[derive(Debug)]
pub struct FontRegistry {
    regular: RegisteredFont,
    italic: RegisteredFont,
    bold: RegisteredFont,
}

impl FontRegistry {
    pub fn new(set: &FontSet) -> Result<Self, ReportError> {
        Ok(Self {
            regular: register(set.source(FontStyle::Regular), FontStyle::Regular)?,
            italic: register(set.source(FontStyle::Italic), FontStyle::Italic)?,
            bold: register(set.source(FontStyle::Bold), FontStyle::Bold)?,
        })
    }

    pub fn helvetica() -> Self {
        Self {
            regular: builtin_font(FontStyle::Regular),
            italic: builtin_font(FontStyle::Italic),
            bold: builtin_font(FontStyle::Bold),
        }
    }

    pub(crate) fn font(&self, style: FontStyle) -> &RegisteredFont {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Italic => &self.italic,
            FontStyle::Bold => &self.bold,
        }
    }

    pub fn measure_text_width(&self, style: FontStyle, size: Pt, text: &str) -> Pt {
        let metrics = &self.font(style).metrics;
        let mut total_units: i32 = 0;
        for ch in text.chars() {
            let code = winansi_byte(ch).unwrap_or(b'?');
            total_units = total_units.saturating_add(metrics.advance(code) as i32);
        }
        if total_units <= 0 {
            return Pt::ZERO;
        }
        size.mul_ratio(total_units, 1000)
    }

    /// Distance from the top of a line box to the baseline.
    pub fn ascent(&self, style: FontStyle, size: Pt) -> Pt {
        let ascent = self.font(style).metrics.ascent.max(0) as i32;
        size.mul_ratio(ascent, 1000)
    }

    pub fn descent(&self, style: FontStyle, size: Pt) -> Pt {
        let descent = -(self.font(style).metrics.descent.min(0) as i32);
        size.mul_ratio(descent, 1000)
    }
}

impl TextMeasure for FontRegistry {
    fn text_width(&self, text: &str, style: FontStyle, size: Pt) -> Pt {
        self.measure_text_width(style, size, text)
    }
}

impl FontMetrics {
    fn advance(&self, code: u8) -> u16 {
        if code < FIRST_CHAR {
            return self.missing_width;
        }
        self.widths
            .get((code - FIRST_CHAR) as usize)
            .copied()
            .unwrap_or(self.missing_width)
    }

    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let mut widths = Vec::with_capacity((LAST_CHAR - FIRST_CHAR) as usize + 1);
        for code in FIRST_CHAR..=LAST_CHAR {
            let width = winansi_char(code)
                .and_then(|ch| face.glyph_index(ch))
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(0);
            let scaled = (width as f32 * scale).round() as i32;
            widths.push(scaled.clamp(0, u16::MAX as i32) as u16);
        }
        let missing_width = widths.first().copied().unwrap_or(0);
        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        Self {
            widths,
            missing_width,
            ascent,
            descent,
            cap_height,
            italic_angle,
            stem_v: 80,
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            is_fixed_pitch: face.is_monospaced(),
        }
    }
}

fn register(source: &FontSource, style: FontStyle) -> Result<RegisteredFont, ReportError> {
    let data = match source {
        FontSource::Builtin => return Ok(builtin_font(style)),
        FontSource::TrueType(data) => data,
    };
    let face = ttf_parser::Face::parse(data, 0)
        .map_err(|err| ReportError::Font(format!("invalid font data for {style:?}: {err}")))?;
    if face.tables().cff.is_some() {
        return Err(ReportError::Font(format!(
            "OpenType CFF fonts cannot be embedded ({style:?}); use a TrueType font"
        )));
    }
    let name = postscript_name(&face).unwrap_or_else(|| format!("LedgerdocFont{style:?}"));
    Ok(RegisteredFont {
        name: sanitize_font_name(&name),
        metrics: FontMetrics::from_face(&face),
        program: FontProgram::TrueType(data.clone()),
    })
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
        .filter(|name| !name.trim().is_empty())
}

fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .collect();
    if cleaned.is_empty() {
        "Helvetica".to_string()
    } else {
        cleaned
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn builtin_font(style: FontStyle) -> RegisteredFont {
    let bold = style == FontStyle::Bold;
    let (name, bbox, italic_angle) = match style {
        FontStyle::Regular => ("Helvetica", (-166, -225, 1000, 931), 0),
        FontStyle::Italic => ("Helvetica-Oblique", (-170, -225, 1116, 931), -12),
        FontStyle::Bold => ("Helvetica-Bold", (-170, -228, 1003, 962), 0),
    };
    let ascii: &[u16; 95] = if bold {
        &HELVETICA_BOLD_ASCII
    } else {
        &HELVETICA_ASCII
    };
    let widths = (FIRST_CHAR..=LAST_CHAR)
        .map(|code| {
            if code <= 126 {
                ascii[(code - FIRST_CHAR) as usize]
            } else {
                builtin_extended_width(code, ascii, bold)
            }
        })
        .collect();
    RegisteredFont {
        name: name.to_string(),
        program: FontProgram::Base14(name),
        metrics: FontMetrics {
            widths,
            missing_width: 278,
            ascent: 718,
            descent: -207,
            cap_height: 718,
            italic_angle,
            stem_v: if bold { 140 } else { 88 },
            bbox,
            is_fixed_pitch: false,
        },
    }
}

// Helvetica advance widths for U+0020..=U+007E, from the standard AFM files.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

fn builtin_extended_width(code: u8, ascii: &[u16; 95], bold: bool) -> u16 {
    let quote = |regular: u16, bold_width: u16| if bold { bold_width } else { regular };
    match code {
        0x80 | 0x86 | 0x87 | 0x96 | 0xA7 => 556,
        0x82 | 0x91 | 0x92 => quote(222, 278),
        0x84 | 0x93 | 0x94 => quote(333, 500),
        0x85 | 0x89 | 0x97 | 0x99 | 0xC6 => 1000,
        0x95 => 350,
        0xA0 | 0xB7 => 278,
        0xB0 => 400,
        0xD7 | 0xF7 => 584,
        0xD8 => 778,
        0xDF | 0xF8 => 611,
        0xE6 => 889,
        0xEC..=0xEF => 278,
        _ => match fold_to_ascii(code) {
            Some(base) => ascii[(base - FIRST_CHAR) as usize],
            None => 556,
        },
    }
}

fn fold_to_ascii(code: u8) -> Option<u8> {
    let base = match code {
        0xC0..=0xC5 => b'A',
        0xC7 => b'C',
        0xC8..=0xCB => b'E',
        0xCC..=0xCF => b'I',
        0xD1 => b'N',
        0xD2..=0xD6 => b'O',
        0xD9..=0xDC => b'U',
        0xDD | 0x9F => b'Y',
        0x8A => b'S',
        0x8E => b'Z',
        0xE0..=0xE5 => b'a',
        0xE7 => b'c',
        0xE8..=0xEB => b'e',
        0xF1 => b'n',
        0xF2..=0xF6 => b'o',
        0xF9..=0xFC => b'u',
        0xFD | 0xFF => b'y',
        0x9A => b's',
        0x9E => b'z',
        _ => return None,
    };
    Some(base)
}

// cp1252 code points in 0x80..=0x9F that differ from Latin-1.
const WINANSI_EXTENSIONS: [(u8, char); 27] = [
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

/// Maps a character to its WinAnsiEncoding byte, if it has one.
pub(crate) fn winansi_byte(ch: char) -> Option<u8> {
    match ch {
        '\u{0020}'..='\u{007E}' | '\u{00A0}'..='\u{00FF}' => Some(ch as u32 as u8),
        _ => WINANSI_EXTENSIONS
            .iter()
            .find(|(_, candidate)| *candidate == ch)
            .map(|(byte, _)| *byte),
    }
}

pub(crate) fn winansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        _ => WINANSI_EXTENSIONS
            .iter()
            .find(|(byte, _)| *byte == code)
            .map(|(_, ch)| *ch),
    }
}

/// Encodes text as WinAnsi bytes; characters without a code become `?`.
pub(crate) fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| winansi_byte(ch).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths_match_afm_values() {
        let fonts = FontRegistry::helvetica();
        let size = Pt::from_f32(10.0);
        // "Hi" = 722 + 222 units.
        assert_eq!(
            fonts
                .measure_text_width(FontStyle::Regular, size, "Hi")
                .to_milli_i64(),
            9_440
        );
        // Bold "Hi" = 722 + 278 units.
        assert_eq!(
            fonts
                .measure_text_width(FontStyle::Bold, size, "Hi")
                .to_milli_i64(),
            10_000
        );
    }

    #[test]
    fn italic_shares_regular_advances() {
        let fonts = FontRegistry::helvetica();
        let size = Pt::from_f32(7.0);
        let text = "Rechnung 2023-10-01";
        assert_eq!(
            fonts.measure_text_width(FontStyle::Regular, size, text),
            fonts.measure_text_width(FontStyle::Italic, size, text)
        );
    }

    #[test]
    fn extended_characters_are_measured() {
        let fonts = FontRegistry::helvetica();
        let size = Pt::from_f32(10.0);
        let ellipsis = fonts.measure_text_width(FontStyle::Regular, size, "\u{2026}");
        assert_eq!(ellipsis.to_milli_i64(), 10_000);
        let umlaut = fonts.measure_text_width(FontStyle::Regular, size, "\u{00E4}");
        let plain = fonts.measure_text_width(FontStyle::Regular, size, "a");
        assert_eq!(umlaut, plain);
    }

    #[test]
    fn unmapped_characters_measure_as_question_mark() {
        let fonts = FontRegistry::helvetica();
        let size = Pt::from_f32(10.0);
        assert_eq!(
            fonts.measure_text_width(FontStyle::Regular, size, "\u{4E2D}"),
            fonts.measure_text_width(FontStyle::Regular, size, "?")
        );
    }

    #[test]
    fn winansi_round_trips_extensions() {
        for code in 0x20u8..=0xFF {
            if let Some(ch) = winansi_char(code) {
                assert_eq!(winansi_byte(ch), Some(code));
            }
        }
        assert_eq!(encode_winansi("1\u{2013}2 \u{20AC}"), vec![b'1', 0x96, b'2', b' ', 0x80]);
    }

    #[test]
    fn invalid_truetype_bytes_are_rejected() {
        let set = FontSet {
            regular: FontSource::TrueType(b"not a font".to_vec()),
            italic: FontSource::Builtin,
            bold: FontSource::Builtin,
        };
        let err = FontRegistry::new(&set).expect_err("invalid font");
        assert!(matches!(err, ReportError::Font(_)));
    }
}
