pub mod banana;
mod canvas;
mod embed;
mod error;
mod fit;
mod font;
mod grouping;
mod layout;
mod model;
mod overlay;
mod pdf;
mod pdfinspect;
mod qr;
mod schema;
mod types;

pub use canvas::{Canvas, Command, Document as CanvasDocument, Page};
pub use embed::{ImportedPage, SourceCatalog, UsedPage, embed_page, scale_to_fit};
pub use error::{EmbedError, EmbedStage, ReportError};
pub use fit::{MIN_FONT_SIZE, fit_font_size, normalize_whitespace, truncate_with_ellipsis};
pub use font::{FontRegistry, FontSet, FontSource, FontStyle, TextMeasure};
pub use grouping::{group_by_document, ident_group_starts};
pub use layout::{
    EmbedFailure, FOOTER_HEIGHT_MM, HEADER_HEIGHT_MM, LayoutConfig, ROW_HEIGHT_MM, RenderSummary,
};
pub use model::{Document, Dossier, Transaction, UNKNOWN};
pub use overlay::{OVERLAY_HEADLINE, draw_error_overlay};
pub use pdfinspect::{
    LopdfPageCounter, PageCounter, PdfInspectError, PdfInspectErrorCode, PdfInspectReport,
    inspect_pdf_bytes, inspect_pdf_path,
};
pub use qr::{QrMatrix, draw_qr};
pub use schema::{AccountingMode, Align, Column, ColumnKind, ColumnSchema, CurrencyTable};
pub use types::{Color, Margins, Pt, Rect, Size};

use chrono::NaiveDateTime;
use layout::ReportComposer;
use pdf::PdfMetadata;
use std::path::Path;

const DEFAULT_MARGIN_MM: f32 = 10.0;

/// Configured report engine. Fonts and currency symbols are loaded once and
/// shared by every render.
pub struct Report {
    fonts: FontRegistry,
    currencies: CurrencyTable,
    config: LayoutConfig,
    title: Option<String>,
    stop_on_embed_error: bool,
}

/// Finished PDF plus what happened while producing it.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub summary: RenderSummary,
}

#[derive(Clone)]
pub struct ReportBuilder {
    page_size: Size,
    margins: Margins,
    mode: AccountingMode,
    debug_cells: bool,
    debug_lines: bool,
    fonts: FontSet,
    currencies: CurrencyTable,
    generated_at: Option<NaiveDateTime>,
    title: Option<String>,
    stop_on_embed_error: bool,
}

impl Report {
    pub fn builder() -> ReportBuilder {
        ReportBuilder::new()
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn render(&self, dossier: &Dossier) -> Result<RenderedReport, ReportError> {
        let composition =
            ReportComposer::new(&self.fonts, &self.currencies, &self.config).compose(dossier);
        if self.stop_on_embed_error {
            if let Some(failure) = composition.summary.failures.first() {
                return Err(ReportError::EmbedAborted {
                    path: failure.path.clone(),
                    page: failure.page,
                    error: failure.error.clone(),
                });
            }
        }
        let meta = PdfMetadata {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| format!("Audit report {}", dossier.accounting_file_name())),
            created: self.config.generated_at,
        };
        let bytes = pdf::write_pdf(
            &composition.document,
            composition.catalog,
            &self.fonts,
            &meta,
        )?;
        let summary = composition.summary;
        tracing::info!(
            documents = summary.documents,
            pages = summary.pages,
            embedded = summary.embedded_pages,
            overlays = summary.overlays,
            failures = summary.failures.len(),
            bytes = bytes.len(),
            "report rendered"
        );
        Ok(RenderedReport { bytes, summary })
    }

    /// Streams the finished PDF into `writer`.
    pub fn render_to_writer<W: std::io::Write>(
        &self,
        dossier: &Dossier,
        writer: &mut W,
    ) -> Result<RenderSummary, ReportError> {
        let rendered = self.render(dossier)?;
        writer.write_all(&rendered.bytes)?;
        writer.flush()?;
        Ok(rendered.summary)
    }

    pub fn render_to_file(
        &self,
        dossier: &Dossier,
        path: impl AsRef<Path>,
    ) -> Result<RenderSummary, ReportError> {
        let path = path.as_ref();
        let rendered = self.render(dossier)?;
        std::fs::write(path, &rendered.bytes)
            .map_err(|err| ReportError::Output(format!("cannot write {}: {err}", path.display())))?;
        Ok(rendered.summary)
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::all_mm(DEFAULT_MARGIN_MM),
            mode: AccountingMode::default(),
            debug_cells: false,
            debug_lines: false,
            fonts: FontSet::helvetica(),
            currencies: CurrencyTable::default(),
            generated_at: None,
            title: None,
            stop_on_embed_error: false,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn margin_all_mm(mut self, value: f32) -> Self {
        self.margins = Margins::all_mm(value);
        self
    }

    pub fn accounting_mode(mut self, mode: AccountingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Outlines every table cell.
    pub fn debug_cells(mut self, enabled: bool) -> Self {
        self.debug_cells = enabled;
        self
    }

    /// Colors every rule by its role.
    pub fn debug_lines(mut self, enabled: bool) -> Self {
        self.debug_lines = enabled;
        self
    }

    pub fn fonts(mut self, fonts: FontSet) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn currencies(mut self, currencies: CurrencyTable) -> Self {
        self.currencies = currencies;
        self
    }

    /// Fixes the footer and metadata timestamp; defaults to the local time of
    /// `build()`.
    pub fn generated_at(mut self, timestamp: NaiveDateTime) -> Self {
        self.generated_at = Some(timestamp);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Turns the first embed failure into a fatal error instead of an overlay.
    pub fn stop_on_embed_error(mut self, enabled: bool) -> Self {
        self.stop_on_embed_error = enabled;
        self
    }

    pub fn build(self) -> Result<Report, ReportError> {
        let config = LayoutConfig {
            page_size: self.page_size,
            margins: self.margins,
            mode: self.mode,
            debug_cells: self.debug_cells,
            debug_lines: self.debug_lines,
            generated_at: self
                .generated_at
                .unwrap_or_else(|| chrono::Local::now().naive_local()),
        };
        let content = config.content_area();
        if content.width <= Pt::ZERO || content.height <= config.fixed_bands() {
            return Err(ReportError::InvalidConfiguration(format!(
                "margins leave {:.1}x{:.1} mm, need more than {:.1} mm of height",
                content.width.to_mm(),
                content.height.to_mm(),
                config.fixed_bands().to_mm()
            )));
        }
        let table_width = ColumnSchema::for_mode(config.mode).total_width();
        if content.width < table_width {
            return Err(ReportError::InvalidConfiguration(format!(
                "content width {:.1} mm is narrower than the {:.1} mm journal table",
                content.width.to_mm(),
                table_width.to_mm()
            )));
        }
        let fonts = FontRegistry::new(&self.fonts)?;
        Ok(Report {
            fonts,
            currencies: self.currencies,
            config,
            title: self.title,
            stop_on_embed_error: self.stop_on_embed_error,
        })
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
