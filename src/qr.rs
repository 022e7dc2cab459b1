use crate::canvas::Canvas;
use crate::types::{Color, Pt, Rect};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

/// Module grid of an encoded QR symbol, without quiet zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    pub fn encode(data: &str) -> Result<Self, QrError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)?;
        let width = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|color| color == qrcode::Color::Dark)
            .collect();
        Ok(Self { width, dark })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Horizontal runs of dark modules as `(row, first column, length)`.
    fn dark_runs(&self) -> Vec<(usize, usize, usize)> {
        let mut runs = Vec::new();
        for y in 0..self.width {
            let mut x = 0;
            while x < self.width {
                if !self.is_dark(x, y) {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < self.width && self.is_dark(x, y) {
                    x += 1;
                }
                runs.push((y, start, x - start));
            }
        }
        runs
    }
}

/// Draws `data` as a square QR symbol anchored at the top-left of `area`,
/// sized to the shorter side.
pub fn draw_qr(canvas: &mut Canvas, data: &str, area: Rect) -> Result<(), QrError> {
    let matrix = QrMatrix::encode(data)?;
    let modules = matrix.width().max(1) as i32;
    let module = area.width.min(area.height) / modules;
    if module <= Pt::ZERO {
        return Ok(());
    }

    canvas.save_state();
    canvas.set_fill_color(Color::BLACK);
    for (row, col, len) in matrix.dark_runs() {
        canvas.draw_rect(Rect::new(
            area.x + module * col as i32,
            area.y + module * row as i32,
            module * len as i32,
            module,
        ));
    }
    canvas.restore_state();
    Ok(())
}
