//! Reader for Banana Accounting AC2 XML exports.

use crate::error::ReportError;
use crate::grouping::group_by_document;
use crate::model::{Dossier, Transaction, UNKNOWN};
use crate::pdfinspect::{LopdfPageCounter, PageCounter};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use roxmltree::{Document as XmlDocument, Node};
use std::collections::BTreeMap;
use std::path::Path;

const ROOT_TAG: &str = "AC2";
const JOURNAL_TABLE: &str = "Journal";
const FILE_INFO_TABLE: &str = "FileInfo";

const KEY_FILE_NAME: &str = "Dateiname";
const KEY_COMPANY: &str = "Firma";
const KEY_STREET: &str = "Adresse1";
const KEY_ZIP: &str = "Postleitzahl";
const KEY_PLACE: &str = "Ort";
const KEY_BASE_CURRENCY: &str = "Basiswaehrung";
const KEY_OPENING_DATE: &str = "Eroeffnungsdatum";
const KEY_CLOSURE_DATE: &str = "Abschlussdatum";
const KEY_SAVED_DATE: &str = "DatumLetzteSpeicherung";
const KEY_SAVED_TIME: &str = "ZeitLetzteSpeicherung";

const EXPORT_DATE_FORMAT: &str = "%d.%m.%Y";
const EXPORT_TIME_FORMAT: &str = "%H:%M:%S";

/// Reads an export, groups its journal by linked document and probes every
/// linked file with lopdf.
pub fn dossier_from_path(path: &Path) -> Result<Dossier, ReportError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ReportError::Input(format!("cannot read {}: {err}", path.display())))?;
    let mut dossier = dossier_from_str(&raw, path)?;
    dossier.probe_documents(&LopdfPageCounter as &dyn PageCounter);
    let valid = dossier.documents.iter().filter(|doc| doc.is_valid_file).count();
    tracing::info!(
        documents = dossier.documents.len(),
        valid,
        transactions = dossier.transaction_count(),
        "export loaded"
    );
    Ok(dossier)
}

/// Parses export XML. `source_path` is where the export lives; linked paths
/// are relative to its directory. Linked files are not touched.
pub fn dossier_from_str(xml: &str, source_path: &Path) -> Result<Dossier, ReportError> {
    let doc = XmlDocument::parse(xml)
        .map_err(|err| ReportError::Input(format!("malformed export XML: {err}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != ROOT_TAG {
        return Err(ReportError::Input(format!(
            "expected <{ROOT_TAG}> root element, found <{}>",
            root.tag_name().name()
        )));
    }

    let journal = find_table(root, JOURNAL_TABLE)?;
    let transactions: Vec<Transaction> = table_rows(journal)
        .map(transaction_from_row)
        .filter(|tx| !tx.is_excluded())
        .collect();

    let info = FileInfo::from_table(find_table(root, FILE_INFO_TABLE)?);
    let mut dossier = Dossier::new(source_path);
    dossier.accounting_file_path = info.guarded_value(KEY_FILE_NAME);
    dossier.company_name = info.guarded_value(KEY_COMPANY);
    dossier.street = info.guarded_value(KEY_STREET);
    dossier.zip_code = info.guarded_value(KEY_ZIP);
    dossier.place = info.guarded_value(KEY_PLACE);
    dossier.base_currency = info.guarded_value(KEY_BASE_CURRENCY);
    dossier.period_start = info.guarded_date(KEY_OPENING_DATE);
    dossier.period_end = info.guarded_date(KEY_CLOSURE_DATE);
    dossier.last_saved = match (info.guarded_date(KEY_SAVED_DATE), info.guarded_time(KEY_SAVED_TIME)) {
        (Some(date), Some(time)) => Some(NaiveDateTime::new(date, time)),
        _ => None,
    };
    dossier.documents = group_by_document(transactions);
    Ok(dossier)
}

fn find_table<'a, 'input>(root: Node<'a, 'input>, id: &str) -> Result<Node<'a, 'input>, ReportError> {
    root.children()
        .find(|node| node.has_tag_name("Table") && node.attribute("ID") == Some(id))
        .ok_or_else(|| ReportError::Input(format!("no Table for ID '{id}' found")))
}

fn table_rows<'a, 'input>(table: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    table
        .children()
        .filter(|node| node.has_tag_name("RowList"))
        .flat_map(|list| list.children().filter(|node| node.has_tag_name("Row")))
}

fn field(row: Node<'_, '_>, name: &str) -> String {
    row.children()
        .find(|node| node.has_tag_name(name))
        .and_then(|node| node.text())
        .unwrap_or_default()
        .to_string()
}

fn transaction_from_row(row: Node<'_, '_>) -> Transaction {
    Transaction {
        unique: field(row, "Unique"),
        section: field(row, "Section"),
        date: field(row, "Date"),
        ident: field(row, "Doc"),
        path: field(row, "DocLink"),
        description: field(row, "Description"),
        account_debit: field(row, "AccountDebit"),
        account_credit: field(row, "AccountCredit"),
        amount: field(row, "Amount"),
        amount_currency: field(row, "AmountCurrency"),
        exchange_currency: field(row, "ExchangeCurrency"),
        exchange_rate: field(row, "ExchangeRate"),
        cost_center: field(row, "Cc3"),
        cost_center_description: field(row, "Cc3Des"),
        income: field(row, "Income"),
        expenses: field(row, "Expenses"),
        account: field(row, "Account"),
        category: field(row, "Category"),
        category_description: field(row, "CategoryDes"),
    }
}

/// `IdXml` → `Value` pairs of the file information table.
struct FileInfo {
    values: BTreeMap<String, String>,
}

impl FileInfo {
    fn from_table(table: Node<'_, '_>) -> Self {
        let mut values = BTreeMap::new();
        for row in table_rows(table) {
            let key = field(row, "IdXml");
            let value = field(row, "Value");
            if key.is_empty() || value.is_empty() {
                continue;
            }
            values.entry(key).or_insert(value);
        }
        Self { values }
    }

    fn value(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    fn guarded_value(&self, id: &str) -> String {
        match self.value(id) {
            Some(value) => value.to_string(),
            None => {
                tracing::warn!(key = id, "file info value missing");
                UNKNOWN.to_string()
            }
        }
    }

    fn guarded_date(&self, id: &str) -> Option<NaiveDate> {
        let Some(raw) = self.value(id) else {
            tracing::warn!(key = id, "file info date missing");
            return None;
        };
        NaiveDate::parse_from_str(raw.trim(), EXPORT_DATE_FORMAT)
            .inspect_err(|err| tracing::warn!(key = id, value = raw, error = %err, "file info date unreadable"))
            .ok()
    }

    fn guarded_time(&self, id: &str) -> Option<NaiveTime> {
        let Some(raw) = self.value(id) else {
            tracing::warn!(key = id, "file info time missing");
            return None;
        };
        NaiveTime::parse_from_str(raw.trim(), EXPORT_TIME_FORMAT)
            .inspect_err(|err| tracing::warn!(key = id, value = raw, error = %err, "file info time unreadable"))
            .ok()
    }
}
