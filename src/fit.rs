//! Shrink-to-fit sizing, ellipsis truncation and word wrapping against
//! measured text widths.

use crate::font::{FontStyle, TextMeasure};
use crate::types::Pt;

pub const ELLIPSIS: char = '\u{2026}';

/// Decrement applied per fitting step.
pub const FONT_SIZE_STEP: f32 = 0.5;

/// Fitting never shrinks text below this size, so the loop always terminates.
pub const MIN_FONT_SIZE: f32 = 1.0;

/// Horizontal room a truncated table cell keeps free.
pub const TRUNCATE_INSET_MM: f32 = 1.5;

/// Largest size, starting at `base_size` and going down in half-point steps,
/// at which `text` fits into `max_width` minus the margin on both sides.
/// Stops at [`MIN_FONT_SIZE`] even if the text still overflows there.
pub fn fit_font_size<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    max_width: Pt,
    margin: Pt,
    base_size: Pt,
    style: FontStyle,
) -> Pt {
    let available = max_width - margin * 2;
    let floor = Pt::from_f32(MIN_FONT_SIZE);
    let step = Pt::from_f32(FONT_SIZE_STEP);
    let mut size = base_size;
    while size > floor && measure.text_width(text, style, size) > available {
        size = (size - step).max(floor);
    }
    size
}

/// Drops trailing characters and appends an ellipsis until the text fits
/// into `max_width` minus [`TRUNCATE_INSET_MM`]. Text that already fits is
/// returned unchanged, including text that itself ends in an ellipsis; if
/// nothing but the ellipsis is left, that is returned.
pub fn truncate_with_ellipsis<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    max_width: Pt,
    style: FontStyle,
    size: Pt,
) -> String {
    let limit = max_width - Pt::from_mm(TRUNCATE_INSET_MM);
    if measure.text_width(text, style, size) <= limit {
        return text.to_string();
    }
    let mut kept: Vec<char> = text.chars().collect();
    if kept.last() == Some(&ELLIPSIS) {
        kept.pop();
    }
    while kept.pop().is_some() {
        let candidate: String = kept.iter().chain(std::iter::once(&ELLIPSIS)).collect();
        if measure.text_width(&candidate, style, size) <= limit {
            return candidate;
        }
    }
    ELLIPSIS.to_string()
}

/// Collapses every run of spaces, tabs and line breaks into one space and
/// trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split([' ', '\t', '\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Greedy word wrap. Explicit line breaks are kept; words wider than the
/// line are broken between characters.
pub fn wrap_text<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    max_width: Pt,
    style: FontStyle,
    size: Pt,
) -> Vec<String> {
    let fits = |candidate: &str| measure.text_width(candidate, style, size) <= max_width;
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if fits(&candidate) {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if fits(word) {
                line = word.to_string();
                continue;
            }
            for ch in word.chars() {
                line.push(ch);
                if !fits(&line) && line.chars().count() > 1 {
                    line.pop();
                    lines.push(std::mem::take(&mut line));
                    line.push(ch);
                }
            }
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Every character is half the font size wide.
    struct HalfEm;

    impl TextMeasure for HalfEm {
        fn text_width(&self, text: &str, _style: FontStyle, size: Pt) -> Pt {
            (size * 0.5) * text.chars().count() as i32
        }
    }

    fn pt(value: f32) -> Pt {
        Pt::from_f32(value)
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(normalize_whitespace(" a \n\t b  c "), "a b c");
        assert_eq!(normalize_whitespace("\r\n"), "");
        assert_eq!(normalize_whitespace("single"), "single");
    }

    #[test]
    fn fitting_text_keeps_base_size() {
        let size = fit_font_size(&HalfEm, "abcd", pt(100.0), pt(1.5), pt(10.0), FontStyle::Regular);
        assert_eq!(size, pt(10.0));
    }

    #[test]
    fn overflowing_text_shrinks_in_half_point_steps() {
        // 10 chars at 0.5 em: fits 40pt - 2*0 at size <= 8.
        let size = fit_font_size(&HalfEm, "abcdefghij", pt(40.0), Pt::ZERO, pt(10.0), FontStyle::Bold);
        assert_eq!(size, pt(8.0));
    }

    #[test]
    fn fitting_stops_at_floor() {
        let text = "x".repeat(10_000);
        let size = fit_font_size(&HalfEm, &text, pt(10.0), pt(1.0), pt(18.0), FontStyle::Regular);
        assert_eq!(size, pt(MIN_FONT_SIZE));
    }

    #[test]
    fn margin_larger_than_width_still_terminates() {
        let size = fit_font_size(&HalfEm, "abc", pt(2.0), pt(5.0), pt(7.0), FontStyle::Regular);
        assert_eq!(size, pt(MIN_FONT_SIZE));
    }

    #[test]
    fn truncation_leaves_fitting_text_untouched() {
        let out = truncate_with_ellipsis(&HalfEm, "short", pt(100.0), FontStyle::Regular, pt(7.0));
        assert_eq!(out, "short");
    }

    #[test]
    fn truncation_appends_ellipsis() {
        // limit = 30pt - 1.5mm (4.252pt) = 25.748pt; 3.5pt per char -> 7 chars.
        let out = truncate_with_ellipsis(
            &HalfEm,
            "Hetzner Online GmbH",
            pt(30.0),
            FontStyle::Regular,
            pt(7.0),
        );
        assert_eq!(out, "Hetzne\u{2026}");
    }

    #[test]
    fn truncation_handles_multibyte_characters() {
        let out = truncate_with_ellipsis(&HalfEm, "ÄÖÜäöüß€", pt(20.0), FontStyle::Regular, pt(7.0));
        assert!(out.ends_with(ELLIPSIS));
        assert!(out.starts_with('Ä'));
    }

    #[test]
    fn fitting_text_with_its_own_ellipsis_is_kept() {
        let text = "see page 2\u{2026}";
        let out = truncate_with_ellipsis(&HalfEm, text, pt(100.0), FontStyle::Regular, pt(7.0));
        assert_eq!(out, text);

        let long = format!("{}\u{2026}", "x".repeat(40));
        let out = truncate_with_ellipsis(&HalfEm, &long, pt(40.0), FontStyle::Regular, pt(7.0));
        assert!(out.ends_with('\u{2026}'));
        assert_eq!(out.matches('\u{2026}').count(), 1);
        assert!(out.len() < long.len());
    }

    #[test]
    fn truncation_of_exhausted_text_yields_ellipsis() {
        let out = truncate_with_ellipsis(&HalfEm, "abc", pt(1.0), FontStyle::Regular, pt(7.0));
        assert_eq!(out, ELLIPSIS.to_string());
    }

    #[test]
    fn wrap_breaks_between_words() {
        // 2.5pt per char at size 5, 25pt -> 10 chars per line.
        let lines = wrap_text(&HalfEm, "aaa bbb ccc ddd", pt(25.0), FontStyle::Regular, pt(5.0));
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn wrap_keeps_explicit_breaks_and_splits_long_words() {
        let lines = wrap_text(
            &HalfEm,
            "head\n\nabcdefghijklmno",
            pt(25.0),
            FontStyle::Regular,
            pt(5.0),
        );
        assert_eq!(lines, vec!["head", "", "abcdefghij", "klmno"]);
    }

    proptest! {
        #[test]
        fn fit_never_grows_and_fits_when_possible(
            text in "[a-zA-Z0-9 ]{0,80}",
            width in 5.0f32..300.0,
            margin in 0.0f32..3.0,
            base in 1.0f32..30.0,
        ) {
            let base = pt(base);
            let size = fit_font_size(&HalfEm, &text, pt(width), pt(margin), base, FontStyle::Regular);
            prop_assert!(size <= base);
            if size > pt(MIN_FONT_SIZE) {
                prop_assert!(HalfEm.text_width(&text, FontStyle::Regular, size) <= pt(width) - pt(margin) * 2);
            }
        }

        #[test]
        fn truncation_fits_and_marks_changes(
            text in "[a-zA-Z0-9 äöü…]{0,60}",
            width in 10.0f32..200.0,
        ) {
            let size = pt(7.0);
            let out = truncate_with_ellipsis(&HalfEm, &text, pt(width), FontStyle::Regular, size);
            let limit = pt(width) - Pt::from_mm(TRUNCATE_INSET_MM);
            prop_assert!(HalfEm.text_width(&out, FontStyle::Regular, size) <= limit);
            let truncated = out != text;
            prop_assert_eq!(out.ends_with(ELLIPSIS), truncated || text.ends_with(ELLIPSIS));
            if truncated {
                let kept = out.trim_end_matches(ELLIPSIS);
                prop_assert!(text.starts_with(kept));
            }
        }
    }
}
