//! Page composer: turns a dossier into recorded canvas pages, one run of
//! pages per source document.

use crate::canvas::{self, Canvas};
use crate::embed::{ImportedPage, SourceCatalog, embed_page, scale_to_fit};
use crate::error::EmbedError;
use crate::fit::{fit_font_size, truncate_with_ellipsis};
use crate::font::{FontRegistry, FontStyle};
use crate::grouping::ident_group_starts;
use crate::model::{DATE_TIME_FORMAT, Document, Dossier, Transaction};
use crate::overlay::draw_error_overlay;
use crate::qr::draw_qr;
use crate::schema::{AccountingMode, Align, Column, ColumnKind, ColumnSchema, CurrencyTable};
use crate::types::{Color, DebugColor, Margins, Pt, Rect, Size};
use chrono::NaiveDateTime;

pub const HEADER_HEIGHT_MM: f32 = 15.0;
pub const FOOTER_HEIGHT_MM: f32 = 10.0;
pub const ROW_HEIGHT_MM: f32 = 5.0;

const TITLE_SIZE: f32 = 18.0;
const TITLE_TOP_MM: f32 = 1.5;
const TITLE_HEIGHT_MM: f32 = 6.5;
const BREADCRUMB_SIZE: f32 = 10.0;
const BREADCRUMB_TOP_MM: f32 = 8.5;
const BREADCRUMB_HEIGHT_MM: f32 = 5.0;
const HEADER_TEXT_MARGIN_MM: f32 = 1.5;
const QR_INSET_MM: f32 = 0.5;

const TABLE_SIZE: f32 = 7.0;
const SUB_AMOUNT_SIZE: f32 = 4.0;
const IDENT_MARGIN_MM: f32 = 1.5;
const DOT_MM: f32 = 0.6;
const IMMATERIAL_SHADE: f32 = 0.92;

const EMBED_INSET_MM: f32 = 1.0;
const MIN_EMBED_HEIGHT_MM: f32 = 20.0;
const OVERLAY_TOP_MM: f32 = 5.0;

const FOOTER_SIZE: f32 = 6.8;
const FOOTER_MARGIN_MM: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub page_size: Size,
    pub margins: Margins,
    pub mode: AccountingMode,
    pub debug_cells: bool,
    pub debug_lines: bool,
    pub generated_at: NaiveDateTime,
}

impl LayoutConfig {
    pub fn content_area(&self) -> Rect {
        Rect::new(
            self.margins.left,
            self.margins.top,
            self.page_size.width - self.margins.left - self.margins.right,
            self.page_size.height - self.margins.top - self.margins.bottom,
        )
    }

    /// Space a page needs before any table row or embed can be placed.
    pub fn fixed_bands(&self) -> Pt {
        Pt::from_mm(HEADER_HEIGHT_MM + FOOTER_HEIGHT_MM + ROW_HEIGHT_MM)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedFailure {
    pub path: String,
    pub page: usize,
    pub error: EmbedError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub documents: usize,
    pub pages: usize,
    pub embedded_pages: usize,
    pub overlays: usize,
    pub hidden_transactions: usize,
    pub failures: Vec<EmbedFailure>,
}

/// Canvas pages plus the sources they reference.
pub struct Composition {
    pub document: canvas::Document,
    pub catalog: SourceCatalog,
    pub summary: RenderSummary,
}

/// Per-page state; dropped when the page is finished.
#[derive(Debug, Clone, Copy)]
struct RenderCursor {
    y: Pt,
    embed_page: usize,
    page_number: usize,
    continued: bool,
}

/// What a finished page did with the requested source page. Both carry the
/// page count of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageOutcome {
    /// Placed, or replaced by the error overlay.
    Embedded(usize),
    /// The journal table left no room; the source page moves to the next page.
    Deferred(usize),
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    style: FontStyle,
    size: Pt,
    margin: Pt,
    align: Align,
}

pub struct ReportComposer<'a> {
    canvas: Canvas,
    fonts: &'a FontRegistry,
    currencies: &'a CurrencyTable,
    config: &'a LayoutConfig,
    schema: ColumnSchema,
    catalog: SourceCatalog,
    summary: RenderSummary,
}

impl<'a> ReportComposer<'a> {
    pub fn new(
        fonts: &'a FontRegistry,
        currencies: &'a CurrencyTable,
        config: &'a LayoutConfig,
    ) -> Self {
        Self {
            canvas: Canvas::new(config.page_size),
            fonts,
            currencies,
            config,
            schema: ColumnSchema::for_mode(config.mode),
            catalog: SourceCatalog::new(),
            summary: RenderSummary::default(),
        }
    }

    pub fn compose(mut self, dossier: &Dossier) -> Composition {
        for document in &dossier.documents {
            self.render_document(dossier, document);
        }
        let document = self.canvas.finish();
        self.summary.pages = document.pages.len();
        Composition {
            document,
            catalog: self.catalog,
            summary: self.summary,
        }
    }

    /// Emits one page per source page; at least one page even when the
    /// source cannot be embedded.
    pub fn render_document(&mut self, dossier: &Dossier, document: &Document) {
        tracing::debug!(
            path = %document.path,
            transactions = document.transactions.len(),
            "rendering document"
        );
        self.summary.documents += 1;
        let mut embed_page = 1;
        let mut total_pages = 1;
        let mut with_table = true;
        while embed_page <= total_pages {
            match self.render_page(dossier, document, embed_page, with_table) {
                PageOutcome::Embedded(total) => {
                    total_pages = total.max(1);
                    embed_page += 1;
                }
                PageOutcome::Deferred(total) => total_pages = total.max(1),
            }
            with_table = false;
        }
    }

    /// Draws one complete page. Only the first page of a document carries
    /// the journal table.
    fn render_page(
        &mut self,
        dossier: &Dossier,
        document: &Document,
        embed_page: usize,
        with_table: bool,
    ) -> PageOutcome {
        let content = self.config.content_area();
        let mut cursor = RenderCursor {
            y: content.y,
            embed_page,
            page_number: self.canvas.page_number(),
            continued: !with_table,
        };
        if self.config.debug_lines {
            self.with_stroke(DebugColor::Magenta.color(), |canvas| canvas.stroke_rect(content));
        }

        self.draw_header(document, &mut cursor);
        if with_table {
            self.draw_table_header(&mut cursor);
            self.draw_table_rows(&document.transactions, &dossier.base_currency, &mut cursor);
            if self.footer_top() - cursor.y < Pt::from_mm(MIN_EMBED_HEIGHT_MM) {
                let total_pages = document.page_count.max(1);
                tracing::debug!(path = %document.path, "journal table fills the page, source page moved to the next page");
                self.draw_footer(dossier, total_pages, &cursor);
                self.canvas.show_page();
                return PageOutcome::Deferred(total_pages);
            }
        }
        let total_pages = self.draw_embed(dossier, document, &cursor);
        self.draw_footer(dossier, total_pages, &cursor);
        self.canvas.show_page();
        PageOutcome::Embedded(total_pages)
    }

    fn footer_top(&self) -> Pt {
        self.config.content_area().bottom() - Pt::from_mm(FOOTER_HEIGHT_MM)
    }

    fn draw_header(&mut self, document: &Document, cursor: &mut RenderCursor) {
        let content = self.config.content_area();
        let band = Pt::from_mm(HEADER_HEIGHT_MM);
        let text_width = content.width - band;
        let margin = Pt::from_mm(HEADER_TEXT_MARGIN_MM);

        let mut title = document.title();
        if cursor.continued {
            title.push_str(" (cont.)");
        } else {
            self.canvas.bookmark(title.clone());
        }
        let title_size = fit_font_size(
            self.fonts,
            &title,
            text_width,
            margin,
            Pt::from_f32(TITLE_SIZE),
            FontStyle::Bold,
        );
        let title_cell = Rect::new(
            content.x,
            content.y + Pt::from_mm(TITLE_TOP_MM),
            text_width,
            Pt::from_mm(TITLE_HEIGHT_MM),
        );
        self.text_cell(
            title_cell,
            &title,
            TextStyle {
                style: FontStyle::Bold,
                size: title_size,
                margin,
                align: Align::Left,
            },
        );

        let lead = format!("{} \u{2014} ", document.path);
        let idents = document.ident_list();
        let crumb_size = fit_font_size(
            self.fonts,
            &format!("{lead}{idents}"),
            text_width,
            margin,
            Pt::from_f32(BREADCRUMB_SIZE),
            FontStyle::Bold,
        );
        let crumb_cell = Rect::new(
            content.x,
            content.y + Pt::from_mm(BREADCRUMB_TOP_MM),
            text_width,
            Pt::from_mm(BREADCRUMB_HEIGHT_MM),
        );
        let lead_width = self.fonts.measure_text_width(FontStyle::Regular, crumb_size, &lead);
        self.text_cell(
            crumb_cell,
            &lead,
            TextStyle {
                style: FontStyle::Regular,
                size: crumb_size,
                margin,
                align: Align::Left,
            },
        );
        let idents_cell = Rect::new(
            crumb_cell.x + lead_width,
            crumb_cell.y,
            (crumb_cell.width - lead_width).max(Pt::ZERO),
            crumb_cell.height,
        );
        self.text_cell(
            idents_cell,
            &idents,
            TextStyle {
                style: FontStyle::Bold,
                size: crumb_size,
                margin,
                align: Align::Left,
            },
        );

        let qr_x = content.x + text_width;
        self.canvas.line(qr_x, content.y, qr_x, content.y + band);
        let inset = Pt::from_mm(QR_INSET_MM);
        let qr_area = Rect::new(qr_x + inset, content.y + inset, band - inset * 2, band - inset * 2);
        if let Err(err) = draw_qr(&mut self.canvas, &document.path, qr_area) {
            tracing::warn!(path = %document.path, error = %err, "linked path cannot be encoded as QR code");
        }

        cursor.y = content.y + band;
        self.canvas.line(content.x, cursor.y, content.right(), cursor.y);
    }

    fn draw_table_header(&mut self, cursor: &mut RenderCursor) {
        let row_height = Pt::from_mm(ROW_HEIGHT_MM);
        let size = Pt::from_f32(TABLE_SIZE);
        let mut x = self.config.content_area().x;
        for column in self.schema.columns() {
            let cell = Rect::new(x, cursor.y, column.width(), row_height);
            self.text_cell(
                cell,
                column.header,
                TextStyle {
                    style: FontStyle::Bold,
                    size,
                    margin: column_margin(column),
                    align: column.align,
                },
            );
            x += column.width();
        }
        cursor.y += row_height;
        self.rule(cursor.y, Pt::ZERO, false, DebugColor::Teal);
    }

    fn draw_table_rows(&mut self, rows: &[Transaction], base_currency: &str, cursor: &mut RenderCursor) {
        let row_height = Pt::from_mm(ROW_HEIGHT_MM);
        let room = self.footer_top() - cursor.y;
        let capacity = if room > Pt::ZERO {
            (room.to_milli_i64() / row_height.to_milli_i64().max(1)) as usize
        } else {
            0
        };
        let (shown, hidden) = if rows.len() <= capacity {
            (rows.len(), 0)
        } else {
            let shown = capacity.saturating_sub(1);
            (shown, rows.len() - shown)
        };

        let starts = ident_group_starts(rows);
        for (index, tx) in rows.iter().take(shown).enumerate() {
            let first_of_group = starts[index];
            if first_of_group && index > 0 {
                self.rule(cursor.y, Pt::ZERO, false, DebugColor::Magenta);
            } else if !first_of_group {
                let ident_width = self.schema.ident_width();
                self.rule(cursor.y, ident_width, true, DebugColor::Green);
            }
            self.draw_row(tx, first_of_group, base_currency, cursor.y);
            cursor.y += row_height;
        }

        if hidden > 0 && capacity > 0 {
            tracing::warn!(hidden, "transactions do not fit on the page");
            self.summary.hidden_transactions += hidden;
            let content = self.config.content_area();
            self.rule(cursor.y, Pt::ZERO, false, DebugColor::Magenta);
            self.text_cell(
                Rect::new(content.x, cursor.y, content.width, row_height),
                &format!("+{hidden} more transaction(s) not shown"),
                TextStyle {
                    style: FontStyle::Italic,
                    size: Pt::from_f32(TABLE_SIZE),
                    margin: Pt::from_mm(IDENT_MARGIN_MM),
                    align: Align::Left,
                },
            );
            cursor.y += row_height;
        } else if hidden > 0 {
            self.summary.hidden_transactions += hidden;
        }
        if shown > 0 || hidden > 0 {
            self.rule(cursor.y, Pt::ZERO, false, DebugColor::Magenta);
        }
        if hidden > 0 {
            cursor.y = cursor.y.max(self.footer_top());
        }
    }

    fn draw_row(&mut self, tx: &Transaction, first_of_group: bool, base_currency: &str, top: Pt) {
        let row_height = Pt::from_mm(ROW_HEIGHT_MM);
        let immaterial = self.schema.is_immaterial(tx);
        let style = if immaterial {
            FontStyle::Italic
        } else {
            FontStyle::Regular
        };
        let content = self.config.content_area();
        if immaterial {
            self.canvas.save_state();
            self.canvas.set_fill_color(Color::gray(IMMATERIAL_SHADE));
            self.canvas.draw_rect(Rect::new(content.x, top, self.schema.total_width(), row_height));
            self.canvas.restore_state();
        }

        let size = Pt::from_f32(TABLE_SIZE);
        let mut x = content.x;
        for column in self.schema.columns() {
            let cell = Rect::new(x, top, column.width(), row_height);
            x += column.width();
            if column.kind == ColumnKind::Ident && !first_of_group {
                self.debug_outline(cell);
                continue;
            }
            if column.kind == ColumnKind::Amount
                && self.schema.shows_foreign_amounts()
                && tx.is_foreign(base_currency)
            {
                self.foreign_amount_cell(cell, tx, base_currency, style);
                continue;
            }
            let text = self.schema.cell_text(column.kind, tx, base_currency, self.currencies);
            let text = truncate_with_ellipsis(self.fonts, &text, column.width(), style, size);
            self.text_cell(
                cell,
                &text,
                TextStyle {
                    style,
                    size,
                    margin: column_margin(column),
                    align: column.align,
                },
            );
        }
    }

    /// Base amount above, native amount with exchange rate below.
    fn foreign_amount_cell(&mut self, cell: Rect, tx: &Transaction, base_currency: &str, style: FontStyle) {
        let upper = Pt::from_f32(TABLE_SIZE);
        let lower = Pt::from_f32(SUB_AMOUNT_SIZE);
        let spare = ((cell.height - upper - lower) / 2).max(Pt::ZERO);

        let amount = self.currencies.format_amount(&tx.amount, base_currency);
        let amount = truncate_with_ellipsis(self.fonts, &amount, cell.width, style, upper);
        let upper_baseline = cell.y + spare + upper - self.fonts.descent(style, upper);
        self.aligned_string(cell, &amount, style, upper, Pt::ZERO, Align::Right, upper_baseline);

        let detail = format!(
            "{} {} \u{2013} {}",
            tx.amount_currency.trim(),
            tx.exchange_currency.trim(),
            tx.short_exchange_rate()
        );
        let detail = truncate_with_ellipsis(self.fonts, &detail, cell.width, style, lower);
        let lower_baseline = cell.y + spare + upper + self.fonts.ascent(style, lower);
        self.aligned_string(cell, &detail, style, lower, Pt::ZERO, Align::Right, lower_baseline);
        self.debug_outline(cell);
    }

    /// Places the requested source page below the table, or the error
    /// overlay when that fails. Returns the page count of the source.
    fn draw_embed(&mut self, dossier: &Dossier, document: &Document, cursor: &RenderCursor) -> usize {
        let content = self.config.content_area();
        let region = Rect::new(
            content.x,
            cursor.y,
            content.width,
            (self.footer_top() - cursor.y).max(Pt::ZERO),
        );
        match embed_page(&mut self.catalog, dossier, &document.path, cursor.embed_page) {
            Ok(page) => {
                self.place_page(region, &page);
                page.total_pages
            }
            Err(errors) => {
                self.summary.overlays += 1;
                let overlay_top = Pt::from_mm(OVERLAY_TOP_MM).min(region.height);
                let margin = Pt::from_mm(HEADER_TEXT_MARGIN_MM);
                let area = Rect::new(
                    region.x + margin,
                    region.y + overlay_top,
                    (region.width - margin * 2).max(Pt::ZERO),
                    region.height - overlay_top,
                );
                draw_error_overlay(&mut self.canvas, self.fonts, area, &document.path, &errors);
                if self.config.debug_cells {
                    self.debug_outline(area);
                }
                self.summary
                    .failures
                    .extend(errors.into_iter().map(|error| EmbedFailure {
                        path: document.path.clone(),
                        page: cursor.embed_page,
                        error,
                    }));
                1
            }
        }
    }

    fn place_page(&mut self, region: Rect, page: &ImportedPage) {
        let inner = region.inset(Pt::from_mm(EMBED_INSET_MM));
        let (width, height) = scale_to_fit(
            page.page_size.width.to_f32(),
            page.page_size.height.to_f32(),
            inner.width.to_f32(),
            inner.height.to_f32(),
        );
        let width = Pt::from_f32(width);
        let height = Pt::from_f32(height);
        if width <= Pt::ZERO || height <= Pt::ZERO {
            tracing::warn!(resource = %page.resource_id, "source page has no drawable size");
            return;
        }
        let x = inner.x + (inner.width - width) / 2;
        self.canvas
            .draw_form(Rect::new(x, inner.y, width, height), page.resource_id.clone());
        self.summary.embedded_pages += 1;
    }

    fn draw_footer(&mut self, dossier: &Dossier, total_pages: usize, cursor: &RenderCursor) {
        let content = self.config.content_area();
        let top = self.footer_top();
        self.rule(top, Pt::ZERO, false, DebugColor::Magenta);

        let margin = Pt::from_mm(FOOTER_MARGIN_MM);
        let line_height = Pt::from_mm((FOOTER_HEIGHT_MM - 1.0) / 3.0);
        let cell_width = content.width / 3;
        let page_info = format!(
            "{}/{} \u{2013} Page {}",
            cursor.embed_page, total_pages, cursor.page_number
        );
        let cells: [[(String, FontStyle); 3]; 3] = [
            [
                (dossier.company_name.clone(), FontStyle::Regular),
                (page_info, FontStyle::Bold),
                (
                    format!("File: {}", dossier.accounting_file_name()),
                    FontStyle::Regular,
                ),
            ],
            [
                (dossier.street.clone(), FontStyle::Regular),
                (String::new(), FontStyle::Regular),
                (
                    format!("Accounting data as of: {}", dossier.display_last_saved()),
                    FontStyle::Regular,
                ),
            ],
            [
                (dossier.address_line(), FontStyle::Regular),
                (dossier.display_period(), FontStyle::Regular),
                (
                    format!(
                        "Report was created on: {}",
                        self.config.generated_at.format(DATE_TIME_FORMAT)
                    ),
                    FontStyle::Regular,
                ),
            ],
        ];

        let aligns = [Align::Left, Align::Center, Align::Right];
        let mut y = top + margin;
        for row in cells {
            let mut x = content.x;
            for ((text, style), align) in row.iter().zip(aligns) {
                let size = fit_font_size(
                    self.fonts,
                    text,
                    cell_width,
                    margin,
                    Pt::from_f32(FOOTER_SIZE),
                    *style,
                );
                self.text_cell(
                    Rect::new(x, y, cell_width, line_height),
                    text,
                    TextStyle {
                        style: *style,
                        size,
                        margin,
                        align,
                    },
                );
                x += cell_width;
            }
            y += line_height;
        }
    }

    /// Single-line text vertically centered in `cell`.
    fn text_cell(&mut self, cell: Rect, text: &str, style: TextStyle) {
        let ascent = self.fonts.ascent(style.style, style.size);
        let descent = self.fonts.descent(style.style, style.size);
        let baseline = cell.y + (cell.height - ascent - descent) / 2 + ascent;
        self.aligned_string(cell, text, style.style, style.size, style.margin, style.align, baseline);
        self.debug_outline(cell);
    }

    #[allow(clippy::too_many_arguments)]
    fn aligned_string(
        &mut self,
        cell: Rect,
        text: &str,
        style: FontStyle,
        size: Pt,
        margin: Pt,
        align: Align,
        baseline: Pt,
    ) {
        if text.is_empty() {
            return;
        }
        let width = self.fonts.measure_text_width(style, size, text);
        let x = match align {
            Align::Left => cell.x + margin,
            Align::Center => cell.x + (cell.width - width) / 2,
            Align::Right => cell.right() - margin - width,
        };
        self.canvas.set_font(style, size);
        self.canvas.draw_string(x, baseline, text);
    }

    /// Horizontal rule across the table width, starting `indent` from the left.
    fn rule(&mut self, y: Pt, indent: Pt, dotted: bool, debug: DebugColor) {
        let content = self.config.content_area();
        let color = if self.config.debug_lines {
            debug.color()
        } else {
            Color::BLACK
        };
        self.with_stroke(color, |canvas| {
            if dotted {
                let dot = Pt::from_mm(DOT_MM);
                canvas.set_dash(vec![dot, dot], Pt::ZERO);
            }
            canvas.line(content.x + indent, y, content.right(), y);
            if dotted {
                canvas.set_dash(Vec::new(), Pt::ZERO);
            }
        });
    }

    fn debug_outline(&mut self, cell: Rect) {
        if self.config.debug_cells {
            self.with_stroke(DebugColor::Vermilion.color(), |canvas| canvas.stroke_rect(cell));
        }
    }

    fn with_stroke(&mut self, color: Color, draw: impl FnOnce(&mut Canvas)) {
        if color == self.canvas.stroke_color() {
            draw(&mut self.canvas);
            return;
        }
        self.canvas.save_state();
        self.canvas.set_stroke_color(color);
        draw(&mut self.canvas);
        self.canvas.restore_state();
    }
}

fn column_margin(column: &Column) -> Pt {
    if column.kind == ColumnKind::Ident {
        Pt::from_mm(IDENT_MARGIN_MM)
    } else {
        Pt::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::error::EmbedStage;
    use crate::pdfinspect::tests::make_pdf_bytes;
    use chrono::NaiveDate;
    use std::path::Path;

    fn config(mode: AccountingMode) -> LayoutConfig {
        LayoutConfig {
            page_size: Size::a4(),
            margins: Margins::all_mm(10.0),
            mode,
            debug_cells: false,
            debug_lines: false,
            generated_at: NaiveDate::from_ymd_opt(2024, 1, 31)
                .and_then(|d| d.and_hms_opt(8, 30, 0))
                .expect("timestamp"),
        }
    }

    fn tx(ident: &str, path: &str) -> Transaction {
        Transaction {
            ident: ident.to_string(),
            path: path.to_string(),
            date: "2023-10-01".to_string(),
            description: "Server  rent\n October".to_string(),
            account_debit: "6500".to_string(),
            account_credit: "1020".to_string(),
            amount: "37.90".to_string(),
            ..Default::default()
        }
    }

    fn dossier_in(dir: &Path, documents: Vec<Document>) -> Dossier {
        let mut dossier = Dossier::new(dir.join("export.ac2.xml"));
        dossier.base_currency = "CHF".to_string();
        dossier.company_name = "Muster GmbH".to_string();
        dossier.documents = documents;
        dossier
    }

    fn write_pdf(dir: &Path, name: &str, pages: usize) {
        std::fs::write(dir.join(name), make_pdf_bytes(pages, 595, 842)).expect("write pdf");
    }

    fn compose(dossier: &Dossier, config: &LayoutConfig) -> Composition {
        let fonts = FontRegistry::helvetica();
        let currencies = CurrencyTable::default();
        ReportComposer::new(&fonts, &currencies, config).compose(dossier)
    }

    fn count_rules(page: &canvas::Page) -> usize {
        page.commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::Stroke))
            .count()
    }

    #[test]
    fn one_page_per_single_page_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "a.pdf", 1);
        let dossier = dossier_in(dir.path(), vec![Document::new("a.pdf", vec![tx("B1", "a.pdf")])]);
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        assert_eq!(out.summary.pages, 1);
        assert_eq!(out.summary.embedded_pages, 1);
        assert!(out.summary.failures.is_empty());
        let page = &out.document.pages[0];
        assert_eq!(page.bookmarks().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(page.form_resources().count(), 1);
        let strings: Vec<&str> = page.strings().collect();
        assert!(strings.contains(&"a"));
        assert!(strings.contains(&"Server rent October"));
        assert!(strings.contains(&"37.90 CHF"));
        assert!(strings.contains(&"01.10.2023"));
        assert!(strings.contains(&"1/1 \u{2013} Page 1"));
        assert!(strings.contains(&"Report was created on: 31.01.2024 08:30:00"));
    }

    #[test]
    fn multi_page_source_continues_on_following_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "long.pdf", 3);
        let dossier = dossier_in(
            dir.path(),
            vec![Document::new("long.pdf", vec![tx("B1", "long.pdf")])],
        );
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        assert_eq!(out.summary.pages, 3);
        assert_eq!(out.summary.embedded_pages, 3);

        let second: Vec<&str> = out.document.pages[1].strings().collect();
        assert!(second.contains(&"long (cont.)"));
        assert!(second.contains(&"2/3 \u{2013} Page 2"));
        assert!(!second.contains(&"Description"));
        assert_eq!(out.document.pages[1].bookmarks().count(), 0);
        assert_eq!(out.catalog.used_pages().count(), 3);
    }

    #[test]
    fn missing_source_gets_overlay_and_later_documents_still_render() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "b.pdf", 1);
        let dossier = dossier_in(
            dir.path(),
            vec![
                Document::new("a-missing.pdf", vec![tx("B1", "a-missing.pdf")]),
                Document::new("b.pdf", vec![tx("B2", "b.pdf")]),
            ],
        );
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        assert_eq!(out.summary.pages, 2);
        assert_eq!(out.summary.overlays, 1);
        assert_eq!(out.summary.embedded_pages, 1);
        assert_eq!(out.summary.failures.len(), 1);
        assert_eq!(out.summary.failures[0].error.stage, EmbedStage::Exists);
        assert_eq!(out.summary.failures[0].path, "a-missing.pdf");

        let first: Vec<&str> = out.document.pages[0].strings().collect();
        assert!(first.contains(&crate::overlay::OVERLAY_HEADLINE));
        assert!(first.contains(&"1/1 \u{2013} Page 1"));
        assert_eq!(out.document.pages[1].form_resources().count(), 1);
    }

    #[test]
    fn ident_groups_use_solid_and_dotted_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "g.pdf", 1);
        let rows: Vec<Transaction> = ["A", "A", "B", "B", "B", "C"]
            .iter()
            .map(|ident| tx(ident, "g.pdf"))
            .collect();
        let dossier = dossier_in(dir.path(), vec![Document::new("g.pdf", rows)]);
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        let page = &out.document.pages[0];

        let dashes = page
            .commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::SetDash { pattern, .. } if !pattern.is_empty()))
            .count();
        assert_eq!(dashes, 3);
        let idents: Vec<&str> = page
            .strings()
            .filter(|s| ["A", "B", "C"].contains(s))
            .collect();
        assert_eq!(idents, vec!["A", "B", "C"]);
        // Header band (vertical + closing), table header, 2 group rules,
        // 3 dotted rules, table close, footer.
        assert_eq!(count_rules(page), 2 + 1 + 2 + 3 + 1 + 1);
    }

    #[test]
    fn foreign_amounts_use_two_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "f.pdf", 1);
        let foreign = Transaction {
            amount_currency: "40.00".to_string(),
            exchange_currency: "EUR".to_string(),
            exchange_rate: "0.9475123".to_string(),
            ..tx("B1", "f.pdf")
        };
        let dossier = dossier_in(dir.path(), vec![Document::new("f.pdf", vec![foreign])]);
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        let strings: Vec<&str> = out.document.pages[0].strings().collect();
        assert!(strings.contains(&"37.90 CHF"));
        assert!(strings.contains(&"40.00 EUR \u{2013} 0.9475"));
    }

    #[test]
    fn cash_basis_immaterial_rows_are_shaded_italic() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "c.pdf", 1);
        let row = Transaction {
            ident: "K1".to_string(),
            path: "c.pdf".to_string(),
            description: "Cost center move".to_string(),
            cost_center: "P1".to_string(),
            expenses: "12.00".to_string(),
            ..Default::default()
        };
        let dossier = dossier_in(dir.path(), vec![Document::new("c.pdf", vec![row])]);
        let out = compose(&dossier, &config(AccountingMode::CashBasis));
        let page = &out.document.pages[0];
        assert!(page
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::SetFont { style: FontStyle::Italic, .. })));
        assert!(page
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::SetFillColor(c) if *c == Color::gray(IMMATERIAL_SHADE))));
        let strings: Vec<&str> = page.strings().collect();
        assert!(strings.contains(&"Expense"));
        assert!(strings.contains(&"12.00 CHF"));
    }

    #[test]
    fn overflowing_table_reports_hidden_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "many.pdf", 1);
        let rows: Vec<Transaction> = (0..80).map(|i| tx(&format!("B{i:03}"), "many.pdf")).collect();
        let dossier = dossier_in(dir.path(), vec![Document::new("many.pdf", rows)]);
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        assert!(out.summary.hidden_transactions > 0);
        let text = format!("+{} more transaction(s) not shown", out.summary.hidden_transactions);
        assert!(out.document.pages[0].strings().any(|s| s == text));

        assert_eq!(out.summary.pages, 2);
        assert_eq!(out.summary.embedded_pages, 1);
        assert_eq!(out.document.pages[0].form_resources().count(), 0);
        assert_eq!(out.document.pages[0].bookmarks().count(), 1);
        let second: Vec<&str> = out.document.pages[1].strings().collect();
        assert!(second.contains(&"many (cont.)"));
        assert!(second.contains(&"1/1 \u{2013} Page 2"));
        assert_eq!(out.document.pages[1].form_resources().collect::<Vec<_>>(), vec!["Src1p1"]);
    }

    #[test]
    fn every_source_page_lands_on_a_report_page_behind_a_full_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "pair.pdf", 2);
        let rows: Vec<Transaction> = (0..80).map(|i| tx(&format!("B{i:03}"), "pair.pdf")).collect();
        let mut document = Document::new("pair.pdf", rows);
        document.page_count = 2;
        document.is_valid_file = true;
        let dossier = dossier_in(dir.path(), vec![document]);
        let out = compose(&dossier, &config(AccountingMode::Accrual));

        assert_eq!(out.summary.pages, 3);
        assert_eq!(out.summary.embedded_pages, 2);
        assert!(out.summary.failures.is_empty());
        let placed: Vec<&str> = out
            .document
            .pages
            .iter()
            .flat_map(|page| page.form_resources())
            .collect();
        assert_eq!(placed, vec!["Src1p1", "Src1p2"]);
        let used: Vec<&str> = out.catalog.used_pages().map(|p| p.resource_id.as_str()).collect();
        assert_eq!(used, placed);
        let first: Vec<&str> = out.document.pages[0].strings().collect();
        assert!(first.contains(&"1/2 \u{2013} Page 1"));
    }

    #[test]
    fn short_table_keeps_source_on_the_same_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "few.pdf", 1);
        let rows: Vec<Transaction> = (0..30).map(|i| tx(&format!("B{i:03}"), "few.pdf")).collect();
        let dossier = dossier_in(dir.path(), vec![Document::new("few.pdf", rows)]);
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        assert_eq!(out.summary.pages, 1);
        assert_eq!(out.summary.hidden_transactions, 0);
        assert_eq!(out.document.pages[0].form_resources().count(), 1);
    }

    #[test]
    fn long_titles_shrink_and_cells_truncate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let name = format!("{}.pdf", "very_long_receipt_name_".repeat(8));
        let row = Transaction {
            description: "word ".repeat(80),
            ..tx("B1", &name)
        };
        let dossier = dossier_in(dir.path(), vec![Document::new(name.clone(), vec![row])]);
        let out = compose(&dossier, &config(AccountingMode::Accrual));
        let page = &out.document.pages[0];
        let title_size = page.commands.iter().find_map(|cmd| match cmd {
            Command::SetFont {
                style: FontStyle::Bold,
                size,
            } => Some(*size),
            _ => None,
        });
        assert!(title_size.expect("title font") < Pt::from_f32(TITLE_SIZE));
        assert!(page.strings().any(|s| s.starts_with("word word") && s.ends_with('\u{2026}')));
    }

    #[test]
    fn debug_modes_draw_in_palette_colors() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "d.pdf", 1);
        let dossier = dossier_in(dir.path(), vec![Document::new("d.pdf", vec![tx("B1", "d.pdf")])]);
        let mut cfg = config(AccountingMode::Accrual);
        cfg.debug_cells = true;
        cfg.debug_lines = true;
        let out = compose(&dossier, &cfg);
        let colors: Vec<Color> = out.document.pages[0]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::SetStrokeColor(c) => Some(*c),
                _ => None,
            })
            .collect();
        assert!(colors.contains(&DebugColor::Vermilion.color()));
        assert!(colors.contains(&DebugColor::Teal.color()));
        assert!(colors.contains(&DebugColor::Magenta.color()));
    }
}
