use lopdf::Document as LoDocument;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfEncryptedUnsupported,
    PdfEmptyOrNoPages,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfEncryptedUnsupported => "PDF_ENCRYPTED_UNSUPPORTED",
            PdfInspectErrorCode::PdfEmptyOrNoPages => "PDF_EMPTY_OR_NO_PAGES",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

/// Why a source file cannot be counted or embedded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
}

/// Answers "how many pages does this source file have".
pub trait PageCounter {
    fn page_count(&self, path: &Path) -> Result<usize, PdfInspectError>;
}

/// Page counter that parses the file with lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfPageCounter;

impl PageCounter for LopdfPageCounter {
    fn page_count(&self, path: &Path) -> Result<usize, PdfInspectError> {
        let report = inspect_pdf_path(path)?;
        require_embeddable(&report)?;
        Ok(report.page_count)
    }
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    if bytes.is_empty() {
        return Err(PdfInspectError {
            code: PdfInspectErrorCode::PdfEmptyOrNoPages,
            message: "file is empty".to_string(),
        });
    }
    let pdf = LoDocument::load_mem(bytes).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfIoError,
        message: err.to_string(),
    })?;
    inspect_pdf_bytes(&data)
}

pub fn embed_compatibility_issues(report: &PdfInspectReport) -> Vec<PdfInspectErrorCode> {
    let mut issues = Vec::new();
    if report.encrypted {
        issues.push(PdfInspectErrorCode::PdfEncryptedUnsupported);
    }
    if report.page_count == 0 {
        issues.push(PdfInspectErrorCode::PdfEmptyOrNoPages);
    }
    issues
}

pub fn require_embeddable(report: &PdfInspectReport) -> Result<(), PdfInspectError> {
    for issue in embed_compatibility_issues(report) {
        match issue {
            PdfInspectErrorCode::PdfEncryptedUnsupported => {
                return Err(PdfInspectError {
                    code: PdfInspectErrorCode::PdfEncryptedUnsupported,
                    message: "encrypted source documents are not supported".to_string(),
                });
            }
            PdfInspectErrorCode::PdfEmptyOrNoPages => {
                return Err(PdfInspectError {
                    code: PdfInspectErrorCode::PdfEmptyOrNoPages,
                    message: "pdf has no pages".to_string(),
                });
            }
            PdfInspectErrorCode::PdfParseFailed | PdfInspectErrorCode::PdfIoError => {}
        }
    }
    Ok(())
}
