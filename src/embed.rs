//! Source-document import: resolves linked files, loads them once with lopdf
//! and hands out one form resource per used page.

use crate::error::{EmbedError, EmbedStage};
use crate::model::Dossier;
use crate::types::{Pt, Size};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

/// A source page ready to be placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedPage {
    pub resource_id: String,
    pub page_size: Size,
    pub total_pages: usize,
}

/// One imported page the writer has to turn into a form XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedPage {
    pub resource_id: String,
    /// 1-based page number inside the source.
    pub page_number: usize,
}

#[derive(Debug)]
pub(crate) struct LoadedSource {
    pub(crate) path: PathBuf,
    pub(crate) doc: LoDocument,
    page_ids: Vec<LoObjectId>,
    pub(crate) used: Vec<UsedPage>,
}

impl LoadedSource {
    fn load(path: &Path) -> Result<Self, String> {
        let doc = LoDocument::load(path).map_err(|err| err.to_string())?;
        if doc.is_encrypted() {
            return Err("source document is encrypted".to_string());
        }
        let page_ids: Vec<LoObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err("source document has no pages".to_string());
        }
        Ok(Self {
            path: path.to_path_buf(),
            doc,
            page_ids,
            used: Vec::new(),
        })
    }

    fn page_size(&self, page_id: LoObjectId) -> Result<Size, String> {
        self.doc
            .get_page_content(page_id)
            .map_err(|err| format!("page content unreadable: {err}"))?;
        let page = self
            .doc
            .get_object(page_id)
            .and_then(LoObject::as_dict)
            .map_err(|err| err.to_string())?;
        Ok(page_box(&self.doc, page)
            .and_then(|bbox| box_size(&bbox))
            .unwrap_or_else(Size::a4))
    }
}

/// Every source loaded during a run, keyed by resolved path. Failed loads are
/// cached too so a broken file is parsed once.
#[derive(Debug, Default)]
pub struct SourceCatalog {
    sources: Vec<LoadedSource>,
    by_path: BTreeMap<PathBuf, Result<usize, String>>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn used_pages(&self) -> impl Iterator<Item = &UsedPage> {
        self.sources.iter().flat_map(|source| source.used.iter())
    }

    /// Imports page `page_number` (1-based) of the file at `path`. Every lopdf
    /// call runs behind a panic guard; a panic becomes an `Import` failure.
    pub fn import_page(
        &mut self,
        path: &Path,
        page_number: usize,
    ) -> Result<ImportedPage, EmbedError> {
        let index = self.load(path)?;
        let source = &mut self.sources[index];
        let total_pages = source.page_ids.len();
        if page_number == 0 || page_number > total_pages {
            return Err(EmbedError::new(
                EmbedStage::Import,
                format!("page {page_number} out of range (1..={total_pages})"),
            ));
        }
        let page_id = source.page_ids[page_number - 1];
        let page_size = guarded(|| source.page_size(page_id))
            .map_err(|cause| EmbedError::new(EmbedStage::Import, cause))?;

        let resource_id = format!("Src{}p{}", index + 1, page_number);
        if !source.used.iter().any(|used| used.resource_id == resource_id) {
            source.used.push(UsedPage {
                resource_id: resource_id.clone(),
                page_number,
            });
        }
        Ok(ImportedPage {
            resource_id,
            page_size,
            total_pages,
        })
    }

    fn load(&mut self, path: &Path) -> Result<usize, EmbedError> {
        if let Some(cached) = self.by_path.get(path) {
            return cached
                .clone()
                .map_err(|cause| EmbedError::new(EmbedStage::Import, cause));
        }
        tracing::debug!(path = %path.display(), "loading source document");
        let loaded = guarded(|| LoadedSource::load(path)).map(|source| {
            self.sources.push(source);
            self.sources.len() - 1
        });
        self.by_path.insert(path.to_path_buf(), loaded.clone());
        loaded.map_err(|cause| EmbedError::new(EmbedStage::Import, cause))
    }

    /// Sources with at least one used page, in load order.
    pub(crate) fn into_used_sources(self) -> Vec<LoadedSource> {
        self.sources
            .into_iter()
            .filter(|source| !source.used.is_empty())
            .collect()
    }
}

fn guarded<T>(op: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("importer panicked: {message}"))
        }
    }
}

/// Resolves the linked path of a document, checks the file and imports one
/// of its pages. Stops at the first failing stage.
pub fn embed_page(
    catalog: &mut SourceCatalog,
    dossier: &Dossier,
    linked_path: &str,
    page_number: usize,
) -> Result<ImportedPage, Vec<EmbedError>> {
    let resolved = dossier
        .resolve_relative_path(linked_path)
        .map_err(|err| vec![EmbedError::new(EmbedStage::Resolve, err.to_string())])?;
    check_exists(&resolved).map_err(|err| vec![err])?;
    catalog
        .import_page(&resolved, page_number)
        .map_err(|err| vec![err])
}

fn check_exists(path: &Path) -> Result<(), EmbedError> {
    let meta = std::fs::metadata(path)
        .map_err(|err| EmbedError::new(EmbedStage::Exists, format!("{}: {err}", path.display())))?;
    if !meta.is_file() {
        return Err(EmbedError::new(
            EmbedStage::Exists,
            format!("{} is not a regular file", path.display()),
        ));
    }
    if meta.len() == 0 {
        return Err(EmbedError::new(
            EmbedStage::Exists,
            format!("{} is empty", path.display()),
        ));
    }
    Ok(())
}

/// Largest size with the aspect ratio of `src` that fits into `bounds`.
/// Any non-positive input yields a zero size.
pub fn scale_to_fit(src_w: f32, src_h: f32, box_w: f32, box_h: f32) -> (f32, f32) {
    if src_w <= 0.0 || src_h <= 0.0 || box_w <= 0.0 || box_h <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (box_w / src_w).min(box_h / src_h);
    (src_w * scale, src_h * scale)
}

const MAX_INHERIT_DEPTH: usize = 32;

/// Looks up a page attribute, following `Parent` links for inherited keys.
pub(crate) fn inherited_attr(
    doc: &LoDocument,
    page: &lopdf::Dictionary,
    key: &[u8],
) -> Option<LoObject> {
    let mut current = page.clone();
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(match value {
                LoObject::Reference(id) => doc.get_object(*id).ok()?.clone(),
                other => other.clone(),
            });
        }
        let parent = current.get(b"Parent").and_then(LoObject::as_reference).ok()?;
        current = doc.get_object(parent).and_then(LoObject::as_dict).ok()?.clone();
    }
    None
}

/// CropBox, else MediaBox, as four numbers.
pub(crate) fn page_box(doc: &LoDocument, page: &lopdf::Dictionary) -> Option<[f32; 4]> {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .into_iter()
        .find_map(|key| {
            let arr = inherited_attr(doc, page, key)?;
            let arr = arr.as_array().ok()?;
            if arr.len() != 4 {
                return None;
            }
            let mut out = [0.0f32; 4];
            for (slot, value) in out.iter_mut().zip(arr) {
                *slot = number(value)?;
            }
            Some(out)
        })
}

fn number(obj: &LoObject) -> Option<f32> {
    match obj {
        LoObject::Integer(v) => Some(*v as f32),
        LoObject::Real(v) => Some(*v as f32),
        _ => None,
    }
}

fn box_size(bbox: &[f32; 4]) -> Option<Size> {
    let width = (bbox[2] - bbox[0]).abs();
    let height = (bbox[3] - bbox[1]).abs();
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(Size {
        width: Pt::from_f32(width),
        height: Pt::from_f32(height),
    })
}
