use crate::fit::normalize_whitespace;
use crate::pdfinspect::PageCounter;
use chrono::{NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Placeholder for metadata the export did not provide.
pub const UNKNOWN: &str = "<ERROR>";

pub const DATE_FORMAT: &str = "%d.%m.%Y";
pub const DATE_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// One journal row that cites a source document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub unique: String,
    pub section: String,
    /// Booking date as exported (ISO `YYYY-MM-DD`).
    pub date: String,
    /// Voucher number; groups several rows under one receipt.
    pub ident: String,
    pub path: String,
    pub description: String,
    pub account_debit: String,
    pub account_credit: String,
    pub amount: String,
    pub amount_currency: String,
    pub exchange_currency: String,
    pub exchange_rate: String,
    pub cost_center: String,
    pub cost_center_description: String,
    // Cash-basis fields.
    pub income: String,
    pub expenses: String,
    pub account: String,
    pub category: String,
    pub category_description: String,
}

impl Transaction {
    /// Rows of the wildcard section or without a linked document never make
    /// it into a report.
    pub fn is_excluded(&self) -> bool {
        self.section.trim() == "*" || self.path.trim().is_empty()
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }

    pub fn display_date(&self) -> String {
        match self.parsed_date() {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => self.date.trim().to_string(),
        }
    }

    pub fn display_description(&self) -> String {
        normalize_whitespace(&self.description)
    }

    /// Booked in a currency other than the dossier's base currency.
    pub fn is_foreign(&self, base_currency: &str) -> bool {
        let exchange = self.exchange_currency.trim();
        !exchange.is_empty() && exchange != base_currency.trim()
    }

    /// Cash-basis rows that only move money between cost centers.
    pub fn is_immaterial(&self) -> bool {
        self.account.trim().is_empty()
            && self.category.trim().is_empty()
            && !self.cost_center.trim().is_empty()
    }

    /// Exchange rate shortened for the amount sub-line.
    pub fn short_exchange_rate(&self) -> String {
        self.exchange_rate.trim().chars().take(6).collect()
    }
}

/// All transactions that cite the same source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Linked path as written in the journal, trimmed.
    pub path: String,
    pub transactions: Vec<Transaction>,
    pub resolved_path: Option<PathBuf>,
    pub is_valid_file: bool,
    pub page_count: usize,
    /// Stable identifier derived from the linked path.
    pub staging_id: String,
}

impl Document {
    pub fn new(path: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let path = path.into().trim().to_string();
        let staging_id = staging_id(&path);
        Self {
            path,
            transactions,
            resolved_path: None,
            is_valid_file: false,
            page_count: 0,
            staging_id,
        }
    }

    pub fn base_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }

    /// File name without extension.
    pub fn title(&self) -> String {
        Path::new(&self.path)
            .file_stem()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }

    /// Distinct idents in table order.
    pub fn idents(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for tx in &self.transactions {
            if !out.contains(&tx.ident.as_str()) {
                out.push(tx.ident.as_str());
            }
        }
        out
    }

    pub fn ident_list(&self) -> String {
        self.idents().join(", ")
    }

    /// Resolves the linked path against `base_dir` and asks the page counter
    /// about the file. Never fails; an unusable file stays invalid with zero
    /// pages.
    pub fn probe(&mut self, base_dir: &Path, counter: &dyn PageCounter) {
        self.resolved_path = std::path::absolute(base_dir.join(&self.path)).ok();
        let Some(resolved) = self.resolved_path.as_deref() else {
            tracing::debug!(path = %self.path, "linked path cannot be resolved");
            return;
        };
        match counter.page_count(resolved) {
            Ok(count) => {
                self.page_count = count;
                self.is_valid_file = count > 0;
            }
            Err(err) => {
                tracing::debug!(path = %resolved.display(), error = %err, "source document unusable");
                self.page_count = 0;
                self.is_valid_file = false;
            }
        }
    }
}

fn staging_id(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Report context: company metadata plus the documents to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dossier {
    /// Location of the accounting export itself; linked paths are relative to it.
    pub source_path: PathBuf,
    pub accounting_file_path: String,
    pub company_name: String,
    pub street: String,
    pub zip_code: String,
    pub place: String,
    pub base_currency: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub last_saved: Option<NaiveDateTime>,
    pub documents: Vec<Document>,
}

impl Dossier {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            accounting_file_path: UNKNOWN.to_string(),
            company_name: UNKNOWN.to_string(),
            street: UNKNOWN.to_string(),
            zip_code: UNKNOWN.to_string(),
            place: UNKNOWN.to_string(),
            base_currency: UNKNOWN.to_string(),
            period_start: None,
            period_end: None,
            last_saved: None,
            documents: Vec::new(),
        }
    }

    pub fn base_dir(&self) -> PathBuf {
        match self.source_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn resolve_relative_path(&self, path: &str) -> std::io::Result<PathBuf> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "linked path is empty",
            ));
        }
        std::path::absolute(self.base_dir().join(trimmed))
    }

    pub fn probe_documents(&mut self, counter: &dyn PageCounter) {
        let base_dir = self.base_dir();
        for document in &mut self.documents {
            document.probe(&base_dir, counter);
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.documents.iter().map(|doc| doc.transactions.len()).sum()
    }

    pub fn accounting_file_name(&self) -> String {
        Path::new(&self.accounting_file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.accounting_file_path.clone())
    }

    pub fn address_line(&self) -> String {
        format!("{} {}", self.zip_code, self.place)
    }

    pub fn display_period(&self) -> String {
        let fmt = |date: Option<NaiveDate>| match date {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => UNKNOWN.to_string(),
        };
        format!(
            "Period: {} \u{2013} {}",
            fmt(self.period_start),
            fmt(self.period_end)
        )
    }

    pub fn display_last_saved(&self) -> String {
        match self.last_saved {
            Some(ts) => ts.format(DATE_TIME_FORMAT).to_string(),
            None => UNKNOWN.to_string(),
        }
    }
}
