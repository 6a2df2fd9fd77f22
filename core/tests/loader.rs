use potential_core::{
    config::LoaderConfig,
    error::PotentialError,
    event::PipelineEvent,
    loader::{
        discover_csv_sources, import_csv_parts, load_rows, load_sources, MemorySource, RowSource,
        SqliteSource,
    },
    record::RawRow,
    store::RecordStore,
    types::Relationship,
};
use std::fs;
use std::path::Path;

// ── Helpers ──────────────────────────────────────────────────────────────────

const HEADER: &str = "id_lvl_1,id_lvl_2,parameter_id,fact_amt,fact_amt_2,field_1_value_s,\
field_3_value_s,field_4_value_s,field_5_value_s,field_6_value_s,field_7_value_s,field_8_value_s,\
field_9_value_s,field_10_value_s,field_11_value_n,field_12_value_n,field_13_value_d,load_id,\
load_date,field_2_value_s,date_act";

/// Full-width positional fields with the given segment, relationship and amount.
fn row_fields(id: u32, segment: &str, relationship: &str, amount: &str) -> Vec<String> {
    let mut fields = vec![String::new(); 21];
    fields[0] = id.to_string();
    fields[3] = amount.to_string();
    fields[5] = segment.to_string();
    fields[7] = relationship.to_string();
    fields[19] = "Московский".to_string();
    fields
}

/// The same row as a CSV line; fields holding a comma are quoted.
fn csv_line(id: u32, segment: &str, relationship: &str, amount: &str) -> String {
    row_fields(id, segment, relationship, amount)
        .into_iter()
        .map(|f| if f.contains(',') { format!("\"{f}\"") } else { f })
        .collect::<Vec<_>>()
        .join(",")
}

fn write_part(dir: &Path, name: &str, lines: &[String]) {
    let mut content = String::from(HEADER);
    content.push('\n');
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(dir.join(name), content).unwrap();
}

fn dropped_count(events: &[PipelineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::RowDropped { .. }))
        .count()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Parts load in file-name order, then in-file order; non-part files are ignored.
#[test]
fn csv_parts_load_in_file_then_row_order() {
    let dir = tempfile::tempdir().unwrap();
    write_part(dir.path(), "output_excel_part_2.csv", &[csv_line(3, "КСБ", "Клиент", "5")]);
    write_part(
        dir.path(),
        "output_excel_part_1.csv",
        &[csv_line(1, "ММБ", "Рынок", "10"), csv_line(2, "ММБ", "НеКлиент", "2,5")],
    );
    write_part(dir.path(), "notes.csv", &[csv_line(99, "X", "Рынок", "1")]);

    let mut events: Vec<PipelineEvent> = Vec::new();
    let config = LoaderConfig::default();
    let mut sources: Vec<Box<dyn RowSource>> = discover_csv_sources(dir.path(), &config, &mut events)
        .unwrap()
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn RowSource>)
        .collect();
    assert_eq!(sources.len(), 2);

    let records = load_sources(&mut sources, &mut events).unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.id_lvl_1).collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(records[1].amount, Some(2.5), "comma is a decimal separator");
    assert_eq!(records[1].relationship, Some(Relationship::NonClient));
    assert_eq!(records[2].region.as_deref(), Some("Московский"));
    assert_eq!(dropped_count(&events), 0);
}

/// Rows shorter than 21 fields are padded, never rejected.
#[test]
fn short_csv_rows_are_padded() {
    let dir = tempfile::tempdir().unwrap();
    write_part(
        dir.path(),
        "output_excel_part_1.csv",
        &["7,8,p1,12".to_string(), "9".to_string()],
    );

    let mut events: Vec<PipelineEvent> = Vec::new();
    let mut sources = discover_csv_sources(dir.path(), &LoaderConfig::default(), &mut events).unwrap();
    let rows = sources[0].read_rows().unwrap();
    let records = load_rows("part", rows, &mut events);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].amount, Some(12.0));
    assert_eq!(records[0].segment, None);
    assert_eq!(records[1].id_lvl_1, Some(9));
}

/// A row the reader cannot decode is dropped; the rest still load.
#[test]
fn undecodable_row_is_dropped_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = format!("{HEADER}\n{}\n", csv_line(1, "ММБ", "Рынок", "10")).into_bytes();
    bytes.extend_from_slice(b"2,0,p,\xff\xfe,0\n");
    bytes.extend_from_slice(format!("{}\n", csv_line(3, "ММБ", "Рынок", "20")).as_bytes());
    fs::write(dir.path().join("output_excel_part_1.csv"), bytes).unwrap();

    let mut events: Vec<PipelineEvent> = Vec::new();
    let mut sources: Vec<Box<dyn RowSource>> = discover_csv_sources(dir.path(), &LoaderConfig::default(), &mut events)
        .unwrap()
        .into_iter()
        .map(|s| Box::new(s) as Box<dyn RowSource>)
        .collect();
    let records = load_sources(&mut sources, &mut events).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(dropped_count(&events), 1);
    assert!(events.contains(&PipelineEvent::SourceLoaded {
        source: "output_excel_part_1.csv".into(),
        loaded: 2,
        dropped: 1,
    }));
}

/// Values that cannot be represented fail only their own row.
#[test]
fn unrepresentable_values_drop_the_row() {
    let rows = vec![
        Ok(RawRow::from_iter(["1", "", "", "inf"])),
        Ok(RawRow::from_iter(["1e300", "", "", "5"])),
        Ok(RawRow::from_iter(["abc", "", "", "5"])),
    ];
    let mut events: Vec<PipelineEvent> = Vec::new();
    let records = load_rows("mem", rows, &mut events);

    assert_eq!(records.len(), 1, "only the row with unparsable text survives");
    assert_eq!(records[0].id_lvl_1, None, "unparsable text is null, not zero");
    assert_eq!(records[0].amount, Some(5.0));
    assert_eq!(dropped_count(&events), 2);
}

/// An empty directory yields no sources and a report, not an error.
#[test]
fn empty_directory_has_no_sources() {
    let dir = tempfile::tempdir().unwrap();
    let mut events: Vec<PipelineEvent> = Vec::new();
    let sources = discover_csv_sources(dir.path(), &LoaderConfig::default(), &mut events).unwrap();
    assert!(sources.is_empty());
    assert!(matches!(events[0], PipelineEvent::NoSourcesFound { .. }));
}

/// A directory that does not exist is an I/O-boundary failure.
#[test]
fn missing_directory_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let mut events: Vec<PipelineEvent> = Vec::new();
    let err = discover_csv_sources(&missing, &LoaderConfig::default(), &mut events).unwrap_err();
    assert!(matches!(err, PotentialError::SourceUnreadable { .. }));
}

/// Semicolon-delimited exports load when the config says so.
#[test]
fn custom_delimiter() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("output_excel_part_1.csv"),
        "h\n4;5;p;1,5;2,5;ММБ;;Рынок\n",
    )
    .unwrap();
    let config = LoaderConfig {
        delimiter: ';',
        ..LoaderConfig::default()
    };
    let mut events: Vec<PipelineEvent> = Vec::new();
    let mut sources = discover_csv_sources(dir.path(), &config, &mut events).unwrap();
    let records = load_rows("semi", sources[0].read_rows().unwrap(), &mut events);

    assert_eq!(records[0].amount, Some(1.5));
    assert_eq!(records[0].secondary_amount, Some(2.5));
    assert_eq!(records[0].relationship, Some(Relationship::Market));
}

/// Rows imported into SQLite come back through the same parser.
#[test]
fn sqlite_source_feeds_the_loader() {
    let store = RecordStore::in_memory().unwrap();
    store.migrate().unwrap();
    let row = RawRow::new(row_fields(42, "СКМ", "Клиент", "3,25"));
    store.insert_raw_rows(&[row], "2026-10-19T00:00:00Z").unwrap();

    let mut events: Vec<PipelineEvent> = Vec::new();
    let mut sources: Vec<Box<dyn RowSource + '_>> = vec![
        Box::new(SqliteSource::new(&store)),
        Box::new(MemorySource::new("mem", vec![RawRow::from_iter(["43"])])),
    ];
    let records = load_sources(&mut sources, &mut events).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id_lvl_1, Some(42));
    assert_eq!(records[0].segment.as_deref(), Some("СКМ"));
    assert_eq!(records[0].amount, Some(3.25));
    assert_eq!(records[1].id_lvl_1, Some(43));
}

/// Import honours the configured delimiter, stores rows verbatim and
/// reports rows the reader rejects.
#[test]
fn import_stores_parts_with_configured_delimiter() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = "h\n4;5;p;1,5;2,5;ММБ;;Рынок\n".as_bytes().to_vec();
    bytes.extend_from_slice(b"6;0;p;\xff\xfe\n");
    fs::write(dir.path().join("output_excel_part_1.csv"), bytes).unwrap();
    let config = LoaderConfig {
        delimiter: ';',
        ..LoaderConfig::default()
    };

    let store = RecordStore::in_memory().unwrap();
    store.migrate().unwrap();
    let mut events: Vec<PipelineEvent> = Vec::new();
    let imported = import_csv_parts(dir.path(), &config, &store, "2026-10-19T00:00:00Z", &mut events).unwrap();

    assert_eq!(imported, 1);
    assert_eq!(dropped_count(&events), 1);
    assert!(events.contains(&PipelineEvent::SourceLoaded {
        source: "output_excel_part_1.csv".into(),
        loaded: 1,
        dropped: 1,
    }));

    let rows = store.raw_rows().unwrap();
    assert_eq!(rows[0].field(0), "4");
    assert_eq!(rows[0].field(3), "1,5");
    assert_eq!(rows[0].field(5), "ММБ");

    let records = load_rows("db", rows.into_iter().map(Ok), &mut events);
    assert_eq!(records[0].amount, Some(1.5));
    assert_eq!(records[0].relationship, Some(Relationship::Market));
}
