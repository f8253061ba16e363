use std::fs;

use camino::Utf8PathBuf;
use chrono::{NaiveDate, NaiveDateTime};

use nifti_organizer::identifier::SubjectKey;
use nifti_organizer::ledger::{
    ConversionRow, CsvLedgerStore, Ledger, LedgerStore, PROCESSED_COLUMN, SCAN_COLUMN,
    SUBJECT_COLUMN,
};

fn stamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 5)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

fn temp_ledger(content: Option<&str>) -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("master.csv")).unwrap();
    if let Some(content) = content {
        fs::write(path.as_std_path(), content).unwrap();
    }
    (dir, path)
}

#[test]
fn missing_ledger_is_created_on_flush() {
    let (_dir, path) = temp_ledger(None);
    let mut ledger = Ledger::open(CsvLedgerStore::new(path.clone())).unwrap();
    assert!(ledger.table().is_empty());

    let row = ledger
        .record_conversion(&SubjectKey::new("SP000", "1"), stamp())
        .unwrap();
    assert_eq!(row, ConversionRow::Appended(0));
    ledger.flush().unwrap();

    let content = fs::read_to_string(path.as_std_path()).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some("Vault_UID,Vault_ScanID,created_at,updated_at")
    );
    assert_eq!(
        lines.next(),
        Some("SP000,1,2024-01-05 09:30:00,2024-01-05 09:30:00")
    );
}

#[test]
fn lookup_and_processed_state() {
    let (_dir, path) = temp_ledger(Some(
        "Vault_UID,Vault_ScanID,data_organize_date\n\
         SP000,1,2024-01-05 09:30:00\n\
         SP001,2,\n\
         SP002,1.0,\n",
    ));
    let ledger = Ledger::open(CsvLedgerStore::new(path)).unwrap();

    let processed = ledger.lookup(&SubjectKey::new("SP000", "1")).unwrap();
    assert!(ledger.is_processed(processed));
    let open = ledger.lookup(&SubjectKey::new("SP001", "2")).unwrap();
    assert!(!ledger.is_processed(open));
    assert_eq!(ledger.lookup(&SubjectKey::new("SP002", "1")), Some(2));
    assert_eq!(ledger.lookup(&SubjectKey::new("SP001", "1")), None);
    assert!(!ledger.is_dirty());
}

#[test]
fn existence_columns_are_added_lazily() {
    let (_dir, path) = temp_ledger(Some(
        "Vault_UID,Vault_ScanID,Notes\n\
         SP000,1,baseline\n\
         SP001,1,\n",
    ));
    let store = CsvLedgerStore::new(path);
    let mut ledger = Ledger::open(store.clone()).unwrap();
    let row = ledger.lookup(&SubjectKey::new("SP001", "1")).unwrap();

    ledger.record_existence(row, "anat", true);
    ledger.record_existence(row, "dwi", false);
    ledger.mark_processed(row, stamp());
    ledger.flush().unwrap();

    let table = store.load().unwrap();
    assert_eq!(
        table.headers(),
        &[
            SUBJECT_COLUMN,
            SCAN_COLUMN,
            "Notes",
            "anat_exists",
            "dwi_exists",
            PROCESSED_COLUMN
        ]
    );
    assert_eq!(table.rows()[0], vec!["SP000", "1", "baseline", "", "", ""]);
    assert_eq!(
        table.rows()[1],
        vec!["SP001", "1", "", "1", "0", "2024-01-05 09:30:00"]
    );

    let reopened = Ledger::open(store).unwrap();
    assert_eq!(reopened.existence(1, "anat"), Some(true));
    assert_eq!(reopened.existence(1, "dwi"), Some(false));
    assert_eq!(reopened.existence(0, "anat"), None);
    assert!(reopened.is_processed(1));
}

#[test]
fn flush_leaves_no_temporary_files() {
    let (dir, path) = temp_ledger(Some("Vault_UID,Vault_ScanID\nSP000,1\n"));
    let mut ledger = Ledger::open(CsvLedgerStore::new(path)).unwrap();
    ledger.record_existence(0, "anat", true);
    ledger.flush().unwrap();

    let names = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["master.csv"]);
}

#[test]
fn ledger_missing_identity_columns_gains_them() {
    let (_dir, path) = temp_ledger(Some("Notes\nhello\n"));
    let ledger = Ledger::open(CsvLedgerStore::new(path)).unwrap();
    assert!(ledger.is_dirty());
    assert_eq!(ledger.table().column(SUBJECT_COLUMN), Some(1));
    assert_eq!(ledger.table().get(0, 1), Some(""));
}
