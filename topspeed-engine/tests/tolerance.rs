use std::io::Cursor;

use topspeed_engine::{ErrorKind, Policy, TpsFile, Value};

mod common;

fn corrupt() -> TpsFile<Cursor<Vec<u8>>> {
    TpsFile::open(Cursor::new(common::corrupt_tps())).unwrap()
}

#[test]
fn test_strict_stops_at_damaged_page() {
    let mut tps = corrupt();
    let table = tps.table("PICTURES", Policy::Strict).unwrap();

    let results: Vec<_> = tps.rows(&table, Policy::Strict).collect();
    let (ok, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    assert_eq!(ok.len(), 6);
    assert_eq!(failed.len(), 1);
    let err = failed.into_iter().next().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatMismatch);
}

#[test]
fn test_tolerant_skips_damaged_page() {
    let mut tps = corrupt();
    let table = tps.table("PICTURES", Policy::Tolerant).unwrap();

    let rows = tps
        .rows(&table, Policy::Tolerant)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let numbers: Vec<_> = rows.iter().map(|r| r.record_number).collect();
    assert_eq!(numbers, [1, 2, 3, 4, 5, 6]);
    assert_eq!(
        rows[5].get("CAPTION").and_then(Value::as_str),
        Some("Caption for picture 6")
    );
}

#[test]
fn test_damage_outside_range_is_never_read() {
    // Memos sit in other leaves, so a targeted fetch succeeds even strictly
    let mut tps = corrupt();
    let table = tps.table("PICTURES", Policy::Strict).unwrap();
    let image = tps.memo(&table.definition, 11, 1, Policy::Strict).unwrap();
    assert!(image.as_ref().and_then(Value::as_bytes).is_some());

    let memos = tps
        .memo_records(&table.definition, Policy::Strict)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(memos.len(), 14);
}
