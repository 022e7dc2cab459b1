use crate::canvas::Canvas;
use crate::error::EmbedError;
use crate::fit::wrap_text;
use crate::font::{FontRegistry, FontStyle};
use crate::types::{Color, Pt, Rect};

pub const OVERLAY_HEADLINE: &str = "One or more error(s) occurred during embedding the file:";

const ICON_SIZE_MM: f32 = 40.0;
const TEXT_SIZE: f32 = 11.0;
const LINE_HEIGHT_MM: f32 = 5.0;
const GAP_MM: f32 = 5.0;

/// Draws the embed-failure placeholder into `region` and logs every failure.
/// Parts that do not fit the region are left out; the log entries are not.
pub fn draw_error_overlay(
    canvas: &mut Canvas,
    fonts: &FontRegistry,
    region: Rect,
    linked_path: &str,
    errors: &[EmbedError],
) {
    for err in errors {
        tracing::warn!(
            path = linked_path,
            stage = %err.stage,
            cause = %err.cause,
            "embedding source document failed"
        );
    }

    let size = Pt::from_f32(TEXT_SIZE);
    let line_height = Pt::from_mm(LINE_HEIGHT_MM);
    let mut lines = wrap_text(fonts, OVERLAY_HEADLINE, region.width, FontStyle::Regular, size);
    lines.push(String::new());
    for err in errors {
        lines.extend(wrap_text(
            fonts,
            &format!("- {err}"),
            region.width,
            FontStyle::Regular,
            size,
        ));
    }
    let text_height = line_height * lines.len() as i32;
    if region.height < text_height {
        return;
    }

    let icon = Pt::from_mm(ICON_SIZE_MM);
    let gap = Pt::from_mm(GAP_MM);
    let mut y = region.y;
    if region.height >= icon + gap + text_height && region.width >= icon {
        let x = region.x + (region.width - icon) / 2;
        draw_sad_document(canvas, Rect::new(x, y, icon, icon));
        y += icon + gap;
    }

    canvas.save_state();
    canvas.set_fill_color(Color::BLACK);
    canvas.set_font(FontStyle::Regular, size);
    let ascent = fonts.ascent(FontStyle::Regular, size);
    for line in lines {
        if !line.is_empty() {
            canvas.draw_string(region.x, y + ascent, line);
        }
        y += line_height;
    }
    canvas.restore_state();
}

/// Dog-eared sheet with a frowning face.
fn draw_sad_document(canvas: &mut Canvas, area: Rect) {
    let fx = |pct: i32| area.x + area.width.mul_ratio(pct, 100);
    let fy = |pct: i32| area.y + area.height.mul_ratio(pct, 100);

    canvas.save_state();
    canvas.set_line_width(Pt::from_f32(2.0));
    canvas.set_stroke_color(Color::gray(0.35));
    canvas.set_fill_color(Color::gray(0.95));

    canvas.move_to(fx(20), fy(5));
    canvas.line_to(fx(62), fy(5));
    canvas.line_to(fx(80), fy(23));
    canvas.line_to(fx(80), fy(95));
    canvas.line_to(fx(20), fy(95));
    canvas.close_path();
    canvas.fill_stroke();

    canvas.move_to(fx(62), fy(5));
    canvas.line_to(fx(62), fy(23));
    canvas.line_to(fx(80), fy(23));
    canvas.stroke();

    canvas.set_fill_color(Color::gray(0.35));
    let eye = area.width.mul_ratio(6, 100);
    canvas.draw_rect(Rect::new(fx(36), fy(45), eye, eye));
    canvas.draw_rect(Rect::new(fx(58), fy(45), eye, eye));

    canvas.move_to(fx(34), fy(78));
    canvas.curve_to(fx(42), fy(64), fx(58), fy(64), fx(66), fy(78));
    canvas.stroke();
    canvas.restore_state();
}
