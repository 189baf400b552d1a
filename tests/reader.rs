mod common;

use common::TestWorkspace;
use sheet_ingest::{
    columns::SourceConfig,
    data::{CellValue, Record},
    error::IngestError,
    reader::TabularReader,
    source::SpreadsheetSource,
};

fn config_for(path: &std::path::Path) -> SourceConfig {
    SourceConfig {
        file: Some(path.to_path_buf()),
        ..SourceConfig::default()
    }
}

fn collect(source: &mut SpreadsheetSource) -> Vec<Record> {
    source
        .records()
        .expect("records")
        .collect::<anyhow::Result<Vec<_>>>()
        .expect("rows")
}

fn ingest_error(err: &anyhow::Error) -> &IngestError {
    err.downcast_ref::<IngestError>()
        .expect("ingest error in chain")
}

#[test]
fn csv_rows_become_records_with_row_index() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "items.csv",
        "\u{feff}title,date\nFirst,2020-01-01\nSecond,2021-06-30\n",
    );
    let mut config = config_for(&path);
    config.row_index_column = Some("row".into());
    config.worksheet = Some("Whatever".into());
    let mut source = SpreadsheetSource::new(config).expect("source");

    assert_eq!(source.fields().expect("fields"), ["title", "date", "row"]);
    let records = collect(&mut source);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["title"], CellValue::from("First"));
    assert_eq!(records[0]["date"], CellValue::from("2020-01-01"));
    assert_eq!(records[0]["row"], CellValue::Integer(1));
    assert_eq!(records[1]["row"], CellValue::Integer(2));

    let ids = source.ids().expect("ids");
    assert_eq!(ids.keys().map(String::as_str).collect::<Vec<_>>(), ["row"]);
    assert_eq!(ids["row"].key_type, "integer");
}

#[test]
fn short_rows_are_padded_with_empty_cells() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("ragged.csv", "a,b,c\n1\n1,2,3,4\n");
    let mut source = SpreadsheetSource::new(config_for(&path)).expect("source");
    let records = collect(&mut source);
    assert_eq!(records[0]["b"], CellValue::Empty);
    assert_eq!(records[0]["c"], CellValue::Empty);
    assert_eq!(records[1].len(), 3);
    assert_eq!(records[1]["c"], CellValue::from("3"));
}

#[test]
fn tsv_extension_selects_tab_delimiter() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("items.tsv", "id\tname\n1\tAlpha, Beta\n");
    let mut source = SpreadsheetSource::new(config_for(&path)).expect("source");
    let records = collect(&mut source);
    assert_eq!(records[0]["name"], CellValue::from("Alpha, Beta"));
}

#[test]
fn workbook_sheet_yields_typed_cells() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_workbook(
        "items.xlsx",
        "Items",
        &[&["id", "title", "weight"], &["7", "Widget", "2.5"], &["8", "Gadget", ""]],
    );
    let mut config = config_for(&path);
    config.worksheet = Some("Items".into());
    let mut source = SpreadsheetSource::new(config).expect("source");

    let records = collect(&mut source);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], CellValue::Integer(7));
    assert_eq!(records[0]["title"], CellValue::from("Widget"));
    assert_eq!(records[0]["weight"], CellValue::Float(2.5));
    assert!(records[1]["weight"].is_empty());
}

#[test]
fn workbook_rows_above_the_data_are_empty() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_workbook(
        "offset.xlsx",
        "Sheet",
        &[&[], &["a", "b"], &["1", "x"]],
    );
    let mut reader = TabularReader::new(&path, Some("Sheet".into()));
    let first = reader.next_row().expect("row").expect("some row");
    assert_eq!(first.index, 0);
    assert!(first.cells.iter().all(CellValue::is_empty));

    let mut config = config_for(&path);
    config.worksheet = Some("Sheet".into());
    config.header_row = 1;
    let mut source = SpreadsheetSource::new(config).expect("source");
    let records = collect(&mut source);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["a"], CellValue::Integer(1));
    assert_eq!(records[0]["b"], CellValue::from("x"));
}

#[test]
fn missing_worksheet_is_reported_by_name() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_workbook("items.xlsx", "Items", &[&["id"], &["1"]]);
    let mut config = config_for(&path);
    config.worksheet = Some("Nope".into());
    let mut source = SpreadsheetSource::new(config).expect("source");

    let err = source.fields().expect_err("unknown sheet");
    assert!(matches!(
        ingest_error(&err),
        IngestError::WorksheetNotFound(name) if name == "Nope"
    ));
}

#[test]
fn header_row_past_the_end_is_an_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("short.csv", "a,b\n1,2\n");
    let mut config = config_for(&path);
    config.header_row = 5;
    let mut source = SpreadsheetSource::new(config).expect("source");
    let err = source.fields().expect_err("no header");
    assert!(matches!(ingest_error(&err), IngestError::HeaderRowNotFound(5)));
}

#[test]
fn explicit_columns_skip_header_discovery() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("plain.csv", "ignored,header\n1,2\n");
    let mut config = config_for(&path);
    config.columns = vec!["left".into(), "right".into()];
    let mut source = SpreadsheetSource::new(config).expect("source");
    let records = collect(&mut source);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["left"], CellValue::from("1"));
}

fn assert_rewind_after_one_record_matches_fresh(config: SourceConfig) {
    let mut source = SpreadsheetSource::new(config.clone()).expect("source");
    let first = source
        .records()
        .expect("records")
        .next()
        .expect("one record")
        .expect("row");

    source.rewind();
    let replayed = collect(&mut source);

    let mut fresh = SpreadsheetSource::new(config).expect("source");
    let expected = collect(&mut fresh);
    assert_eq!(replayed, expected);
    assert_eq!(replayed[0], first);
    assert_eq!(replayed.len(), 3);
}

#[test]
fn rewind_replays_the_same_records() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("items.csv", "id,name\n1,a\n2,b\n3,c\n");
    let mut source = SpreadsheetSource::new(config_for(&path)).expect("source");

    let first_pass = collect(&mut source);
    source.rewind();
    let second_pass = collect(&mut source);
    assert_eq!(first_pass, second_pass);

    let mut fresh = SpreadsheetSource::new(config_for(&path)).expect("source");
    assert_eq!(collect(&mut fresh), first_pass);
}

#[test]
fn rewind_mid_csv_restarts_from_the_first_record() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("items.csv", "id,name\n1,a\n2,b\n3,c\n");
    let mut config = config_for(&path);
    config.row_index_column = Some("row".into());
    assert_rewind_after_one_record_matches_fresh(config);
}

#[test]
fn rewind_mid_workbook_restarts_from_the_first_record() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_workbook(
        "items.xlsx",
        "Items",
        &[&["id", "name"], &["1", "a"], &["2", "b"], &["3", "c"]],
    );
    let mut config = config_for(&path);
    config.worksheet = Some("Items".into());
    assert_rewind_after_one_record_matches_fresh(config);
}

#[test]
fn worksheet_is_selected_by_name() {
    let workspace = TestWorkspace::new();
    let one: &[&[&str]] = &[&["x"], &["one"]];
    let two: &[&[&str]] = &[&["y"], &["two"], &["2"]];
    let path = workspace.write_workbook_sheets("multi.xlsx", &[("One", one), ("Two", two)]);
    let mut config = config_for(&path);
    config.worksheet = Some("Two".into());
    let mut source = SpreadsheetSource::new(config).expect("source");

    assert_eq!(source.fields().expect("fields"), ["y"]);
    let records = collect(&mut source);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["y"], CellValue::from("two"));
    assert_eq!(records[1]["y"], CellValue::Integer(2));

    let mut config = config_for(&path);
    config.worksheet = Some("One".into());
    let mut first = SpreadsheetSource::new(config).expect("source");
    assert_eq!(collect(&mut first)[0]["x"], CellValue::from("one"));
}

#[test]
fn reader_reopens_after_reset() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("items.csv", "id\n1\n");
    let mut reader = TabularReader::new(&path, None);
    assert!(!reader.is_open());
    assert_eq!(reader.next_row().expect("row").map(|row| row.index), Some(0));
    assert!(reader.is_open());
    reader.reset();
    assert!(!reader.is_open());
    assert_eq!(reader.rows().count(), 2);
}

#[test]
fn source_without_keys_cannot_identify_rows() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("items.csv", "id\n1\n");
    let source = SpreadsheetSource::new(config_for(&path)).expect("source");
    let err = source.ids().expect_err("no keys");
    assert!(matches!(ingest_error(&err), IngestError::MissingKeyConfiguration));
}

#[test]
fn source_without_file_fails_to_open() {
    let err = SpreadsheetSource::new(SourceConfig::default())
        .err()
        .expect("no file");
    assert!(matches!(ingest_error(&err), IngestError::MissingFile));
}

#[test]
fn header_at_row_zero_names_the_text_columns() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("scenario.csv", "title,date\nA,2020\nB,2021\n");
    let mut source = SpreadsheetSource::new(config_for(&path)).expect("source");
    let records = collect(&mut source);
    let pairs: Vec<Vec<(&str, String)>> = records
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(field, value)| (field.as_str(), value.as_display()))
                .collect()
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            vec![("title", "A".to_string()), ("date", "2020".to_string())],
            vec![("title", "B".to_string()), ("date", "2021".to_string())],
        ]
    );
}

#[test]
fn ascii_incompatible_encodings_are_refused_up_front() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("items.csv", "id\n1\n");
    let mut config = config_for(&path);
    config.encoding = Some("utf-16le".into());
    let err = SpreadsheetSource::new(config).err().expect("refused");
    assert!(matches!(
        ingest_error(&err),
        IngestError::UnsupportedEncoding(name) if *name == "UTF-16LE"
    ));
}
