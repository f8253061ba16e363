use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use tempfile::Builder;

use crate::error::OrganizerError;
use crate::identifier::SubjectKey;

pub const SUBJECT_COLUMN: &str = "Vault_UID";
pub const SCAN_COLUMN: &str = "Vault_ScanID";
pub const CREATED_COLUMN: &str = "created_at";
pub const UPDATED_COLUMN: &str = "updated_at";
pub const PROCESSED_COLUMN: &str = "data_organize_date";
pub const EXISTS_SUFFIX: &str = "_exists";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whole ledger held in memory; every cell is text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self, OrganizerError> {
        let mut table = Self::new(headers);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Adds a column filled with empty cells unless it already exists.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column(name) {
            return index;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
    }

    pub fn set(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|cells| cells.get_mut(column)) {
            *cell = value.into();
        }
    }

    /// Short rows are padded; rows wider than the header are rejected.
    pub fn push_row(&mut self, mut cells: Vec<String>) -> Result<usize, OrganizerError> {
        if cells.len() > self.headers.len() {
            return Err(OrganizerError::LedgerFormat(format!(
                "row {} has {} cells but only {} columns",
                self.rows.len() + 1,
                cells.len(),
                self.headers.len()
            )));
        }
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
        Ok(self.rows.len() - 1)
    }
}

pub trait LedgerStore {
    fn load(&self) -> Result<Table, OrganizerError>;
    fn save(&self, table: &Table) -> Result<(), OrganizerError>;
}

#[derive(Debug, Clone)]
pub struct CsvLedgerStore {
    path: Utf8PathBuf,
}

impl CsvLedgerStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn read_error(&self, message: impl ToString) -> OrganizerError {
        OrganizerError::LedgerRead {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }

    fn write_error(&self, message: impl ToString) -> OrganizerError {
        OrganizerError::LedgerWrite {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

impl LedgerStore for CsvLedgerStore {
    fn load(&self) -> Result<Table, OrganizerError> {
        if !self.path.as_std_path().exists() {
            tracing::info!(path = %self.path, "ledger does not exist yet, starting empty");
            return Ok(Table::new(identity_headers()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(self.path.as_std_path())
            .map_err(|err| self.read_error(err))?;
        let headers = reader
            .headers()
            .map_err(|err| self.read_error(err))?
            .iter()
            .map(|header| header.trim().to_string())
            .collect::<Vec<_>>();

        let mut table = Table::new(headers);
        for record in reader.records() {
            let record = record.map_err(|err| self.read_error(err))?;
            table.push_row(record.iter().map(str::to_string).collect())?;
        }
        Ok(table)
    }

    /// Writes next to the ledger and renames over it, so readers never see a
    /// half-written table.
    fn save(&self, table: &Table) -> Result<(), OrganizerError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path()).map_err(|err| self.write_error(err))?;
        let mut temp = Builder::new()
            .prefix("nifti-org-ledger")
            .suffix(".csv.tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| self.write_error(err))?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file_mut());
            writer
                .write_record(table.headers())
                .map_err(|err| self.write_error(err))?;
            for row in table.rows() {
                writer
                    .write_record(row)
                    .map_err(|err| self.write_error(err))?;
            }
            writer.flush().map_err(|err| self.write_error(err))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|err| self.write_error(err))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| self.write_error(err))?;
        Ok(())
    }
}

/// Ledger kept in memory; clones share state so tests can inspect what was
/// saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    table: Arc<Mutex<Option<Table>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryLedgerStore {
    pub fn new(table: Table) -> Self {
        Self {
            table: Arc::new(Mutex::new(Some(table))),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn snapshot(&self) -> Option<Table> {
        self.table.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<Table, OrganizerError> {
        let guard = self
            .table
            .lock()
            .map_err(|_| OrganizerError::LedgerFormat("ledger lock poisoned".to_string()))?;
        Ok(guard
            .clone()
            .unwrap_or_else(|| Table::new(identity_headers())))
    }

    fn save(&self, table: &Table) -> Result<(), OrganizerError> {
        let mut guard = self
            .table
            .lock()
            .map_err(|_| OrganizerError::LedgerFormat("ledger lock poisoned".to_string()))?;
        *guard = Some(table.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionRow {
    Appended(usize),
    Refreshed(usize),
}

pub struct Ledger<S: LedgerStore> {
    store: S,
    table: Table,
    dirty: bool,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn open(store: S) -> Result<Self, OrganizerError> {
        let mut table = store.load()?;
        let before = table.headers().len();
        for header in identity_headers() {
            table.ensure_column(&header);
        }
        let dirty = table.headers().len() != before;
        Ok(Self {
            store,
            table,
            dirty,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn lookup(&self, key: &SubjectKey) -> Option<usize> {
        let subject_col = self.table.column(SUBJECT_COLUMN)?;
        let scan_col = self.table.column(SCAN_COLUMN)?;
        self.table.rows().iter().position(|row| {
            coerce_cell(&row[subject_col]) == coerce_cell(key.subject_id())
                && coerce_cell(&row[scan_col]) == coerce_cell(key.scan_id())
        })
    }

    pub fn is_processed(&self, row: usize) -> bool {
        self.table
            .column(PROCESSED_COLUMN)
            .and_then(|col| self.table.get(row, col))
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn record_existence(&mut self, row: usize, folder: &str, found: bool) {
        let col = self.table.ensure_column(&exists_column(folder));
        self.table.set(row, col, if found { "1" } else { "0" });
        self.dirty = true;
    }

    pub fn existence(&self, row: usize, folder: &str) -> Option<bool> {
        let col = self.table.column(&exists_column(folder))?;
        match coerce_cell(self.table.get(row, col)?) {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        }
    }

    pub fn mark_processed(&mut self, row: usize, timestamp: NaiveDateTime) {
        let col = self.table.ensure_column(PROCESSED_COLUMN);
        self.table.set(row, col, format_timestamp(timestamp));
        self.dirty = true;
    }

    /// Conversion-stage bookkeeping under the baseline/follow-up key.
    ///
    /// This is not a pure append log: when a row for the normalized key
    /// already exists only its `updated_at` is refreshed, so a re-conversion
    /// never produces a second row that [`Ledger::lookup`] could not reach.
    pub fn record_conversion(
        &mut self,
        key: &SubjectKey,
        timestamp: NaiveDateTime,
    ) -> Result<ConversionRow, OrganizerError> {
        let key = key.normalized();
        let stamp = format_timestamp(timestamp);
        let created_col = self.table.ensure_column(CREATED_COLUMN);
        let updated_col = self.table.ensure_column(UPDATED_COLUMN);
        self.dirty = true;

        if let Some(row) = self.lookup(&key) {
            self.table.set(row, updated_col, stamp);
            return Ok(ConversionRow::Refreshed(row));
        }

        let mut cells = vec![String::new(); self.table.headers().len()];
        if let Some(col) = self.table.column(SUBJECT_COLUMN) {
            cells[col] = key.subject_id().to_string();
        }
        if let Some(col) = self.table.column(SCAN_COLUMN) {
            cells[col] = key.scan_id().to_string();
        }
        cells[created_col] = stamp.clone();
        cells[updated_col] = stamp;
        Ok(ConversionRow::Appended(self.table.push_row(cells)?))
    }

    /// Persists the table if anything changed since the last flush.
    pub fn flush(&mut self) -> Result<(), OrganizerError> {
        if !self.dirty {
            return Ok(());
        }
        self.store.save(&self.table)?;
        self.dirty = false;
        Ok(())
    }
}

pub fn exists_column(folder: &str) -> String {
    format!("{folder}{EXISTS_SUFFIX}")
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

fn identity_headers() -> Vec<String> {
    vec![SUBJECT_COLUMN.to_string(), SCAN_COLUMN.to_string()]
}

/// Spreadsheet exports may store ids as numbers (`1.0`); compare them as the
/// integer text.
fn coerce_cell(value: &str) -> &str {
    let value = value.trim();
    match value.split_once('.') {
        Some((int, frac))
            if !int.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && !frac.is_empty()
                && frac.bytes().all(|b| b == b'0') =>
        {
            int
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn coerce_numeric_text() {
        assert_eq!(coerce_cell("1.0"), "1");
        assert_eq!(coerce_cell(" 2 "), "2");
        assert_eq!(coerce_cell("1.5"), "1.5");
        assert_eq!(coerce_cell("SP000"), "SP000");
        assert_eq!(coerce_cell(".0"), ".0");
    }

    #[test]
    fn ensure_column_pads_existing_rows() {
        let mut table = Table::with_rows(
            vec!["a".to_string()],
            vec![vec!["1".to_string()], vec![]],
        )
        .unwrap();
        let col = table.ensure_column("b");
        assert_eq!(col, 1);
        assert_eq!(table.get(0, 1), Some(""));
        assert_eq!(table.get(1, 0), Some(""));
        assert_eq!(table.ensure_column("a"), 0);
    }

    #[test]
    fn wide_rows_rejected() {
        let err = Table::with_rows(
            vec!["a".to_string()],
            vec![vec!["1".to_string(), "2".to_string()]],
        )
        .unwrap_err();
        assert!(matches!(err, OrganizerError::LedgerFormat(_)));
    }

    #[test]
    fn conversion_row_is_not_duplicated() {
        let mut ledger = Ledger::open(MemoryLedgerStore::default()).unwrap();
        let first = ledger
            .record_conversion(&SubjectKey::new("SP000", "3"), stamp())
            .unwrap();
        let second = ledger
            .record_conversion(&SubjectKey::new("SP000", "2"), stamp())
            .unwrap();
        assert_eq!(first, ConversionRow::Appended(0));
        assert_eq!(second, ConversionRow::Refreshed(0));
        assert_eq!(ledger.lookup(&SubjectKey::new("SP000", "2")), Some(0));
    }

    #[test]
    fn flush_skips_clean_table() {
        let store = MemoryLedgerStore::new(Table::new(identity_headers()));
        let mut ledger = Ledger::open(store.clone()).unwrap();
        ledger.flush().unwrap();
        assert_eq!(store.save_count(), 0);
    }
}
