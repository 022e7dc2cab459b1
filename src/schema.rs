//! Ledger table columns for each accounting mode.

use crate::model::Transaction;
use crate::types::Pt;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountingMode {
    /// Double-entry bookkeeping with debit and credit accounts.
    #[default]
    Accrual,
    /// Income/expense bookkeeping with account and category columns.
    CashBasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Ident,
    Date,
    Description,
    DebitAccount,
    CreditAccount,
    Amount,
    Account,
    Category,
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub kind: ColumnKind,
    pub header: &'static str,
    pub width_mm: f32,
    pub align: Align,
}

impl Column {
    const fn new(kind: ColumnKind, header: &'static str, width_mm: f32, align: Align) -> Self {
        Self {
            kind,
            header,
            width_mm,
            align,
        }
    }

    pub fn width(&self) -> Pt {
        Pt::from_mm(self.width_mm)
    }
}

const ACCRUAL_COLUMNS: [Column; 6] = [
    Column::new(ColumnKind::Ident, "Ident", 23.0, Align::Left),
    Column::new(ColumnKind::Date, "Date", 14.0, Align::Left),
    Column::new(ColumnKind::Description, "Description", 103.49, Align::Left),
    Column::new(ColumnKind::DebitAccount, "Debit", 14.0, Align::Right),
    Column::new(ColumnKind::CreditAccount, "Credit", 14.0, Align::Right),
    Column::new(ColumnKind::Amount, "Amount", 20.0, Align::Right),
];

const CASH_BASIS_COLUMNS: [Column; 7] = [
    Column::new(ColumnKind::Ident, "Ident", 23.0, Align::Left),
    Column::new(ColumnKind::Date, "Date", 14.0, Align::Left),
    Column::new(ColumnKind::Description, "Description", 83.49, Align::Left),
    Column::new(ColumnKind::Account, "Account", 14.0, Align::Right),
    Column::new(ColumnKind::Category, "Category", 14.0, Align::Right),
    Column::new(ColumnKind::Income, "Income", 20.0, Align::Right),
    Column::new(ColumnKind::Expense, "Expense", 20.0, Align::Right),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    mode: AccountingMode,
    columns: &'static [Column],
}

impl ColumnSchema {
    pub fn for_mode(mode: AccountingMode) -> Self {
        let columns: &'static [Column] = match mode {
            AccountingMode::Accrual => &ACCRUAL_COLUMNS,
            AccountingMode::CashBasis => &CASH_BASIS_COLUMNS,
        };
        Self { mode, columns }
    }

    pub fn mode(&self) -> AccountingMode {
        self.mode
    }

    pub fn columns(&self) -> &'static [Column] {
        self.columns
    }

    pub fn total_width(&self) -> Pt {
        self.columns.iter().map(Column::width).sum()
    }

    /// Offset where the dotted separator between rows of one ident starts.
    pub fn ident_width(&self) -> Pt {
        self.columns
            .iter()
            .find(|col| col.kind == ColumnKind::Ident)
            .map(Column::width)
            .unwrap_or(Pt::ZERO)
    }

    /// Only the double-entry schema shows converted amounts.
    pub fn shows_foreign_amounts(&self) -> bool {
        self.mode == AccountingMode::Accrual
    }

    /// Rows drawn in the immaterial style.
    pub fn is_immaterial(&self, tx: &Transaction) -> bool {
        self.mode == AccountingMode::CashBasis && tx.is_immaterial()
    }

    /// Plain single-line text for a cell.
    pub fn cell_text(
        &self,
        kind: ColumnKind,
        tx: &Transaction,
        base_currency: &str,
        currencies: &CurrencyTable,
    ) -> String {
        match kind {
            ColumnKind::Ident => tx.ident.clone(),
            ColumnKind::Date => tx.display_date(),
            ColumnKind::Description => tx.display_description(),
            ColumnKind::DebitAccount => tx.account_debit.clone(),
            ColumnKind::CreditAccount => tx.account_credit.clone(),
            ColumnKind::Amount => currencies.format_amount(&tx.amount, base_currency),
            ColumnKind::Account => tx.account.clone(),
            ColumnKind::Category => tx.category.clone(),
            ColumnKind::Income => currencies.format_optional_amount(&tx.income, base_currency),
            ColumnKind::Expense => currencies.format_optional_amount(&tx.expenses, base_currency),
        }
    }
}

/// Display symbols for currency codes. Codes without an entry print as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyTable {
    symbols: BTreeMap<String, String>,
}

impl CurrencyTable {
    pub fn empty() -> Self {
        Self {
            symbols: BTreeMap::new(),
        }
    }

    pub fn with_symbol(mut self, code: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.symbols.insert(code.into(), symbol.into());
        self
    }

    pub fn symbol<'a>(&'a self, code: &'a str) -> &'a str {
        let code = code.trim();
        self.symbols.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn format_amount(&self, amount: &str, code: &str) -> String {
        format!("{} {}", amount.trim(), self.symbol(code))
    }

    fn format_optional_amount(&self, amount: &str, code: &str) -> String {
        if amount.trim().is_empty() {
            String::new()
        } else {
            self.format_amount(amount, code)
        }
    }
}

impl Default for CurrencyTable {
    fn default() -> Self {
        Self::empty()
            .with_symbol("EUR", "\u{20AC}")
            .with_symbol("USD", "$")
            .with_symbol("GBP", "\u{00A3}")
            .with_symbol("JPY", "\u{00A5}")
    }
}
