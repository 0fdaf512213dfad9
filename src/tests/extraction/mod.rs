use serde_json::json;

use super::{FEES, Fixture, LAW, PEOPLE, table};
use crate::{
    ErrorDetail,
    table::{TableHash, hash_structure},
};

fn people_hash() -> TableHash {
    hash_structure(&PEOPLE.iter().map(|row| row.iter().map(|c| c.to_string()).collect()).collect())
}

#[test]
fn same_table_in_first_and_last_version_deduplicates() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "9", &[table("1", 2, PEOPLE)]);
    fixture.write_version(LAW, "10", &[table("1", 2, FEES)]);
    // Different id, page and surrounding whitespace: same content.
    fixture.write_artifact(
        LAW,
        "11",
        &json!({ "elements": [
            { "Text": " Name ", "Path": "//Document/Sect/Table/TR/TD/Span", "Page": 7, "Bounds": [10.0, 700.0, 50.0, 710.0], "attributes": { "TableID": 42 } },
            { "Text": "Age", "Path": "//Document/Sect/Table/TR/TD[2]", "Page": 7, "attributes": { "TableID": 42 } },
            { "Text": "Ana", "Path": "//Document/Sect/Table/TR[2]/TD", "Page": 7, "attributes": { "TableID": 42 } },
            { "Text": "30", "Path": "//Document/Sect/Table/TR[2]/TD[2]", "Page": 8, "attributes": { "TableID": 42 } },
            { "Text": "Bo", "Path": "//Document/Sect/Table/TR[3]/TD", "Page": 8, "attributes": { "TableID": 42 } },
            { "Text": "25 ", "Path": "//Document/Sect/Table/TR[3]/TD[2]", "Page": 8, "attributes": { "TableID": 42 } }
        ]}),
    );

    let unique = fixture.extractor.extract_unique_tables_from_law(LAW).unwrap();
    assert_eq!(unique.len(), 2);
    let people = &unique[&people_hash()];
    assert_eq!(people.found_in_versions, vec!["9", "11"]);
    assert_eq!(people.pages["9"], vec![2]);
    assert_eq!(people.pages["11"], vec![7, 8]);
    assert!(people.pdf_paths["11"].ends_with("131.1-11-original.pdf"));
    assert_eq!(people.original_structure[1], vec!["Ana", "30"]);
}

#[test]
fn versions_sort_numerically() {
    let fixture = Fixture::new();
    for version in ["100", "9", "10"] {
        fixture.write_version(LAW, version, &[]);
    }
    assert_eq!(fixture.extractor.list_versions(LAW).unwrap(), vec!["9", "10", "100"]);
    assert_eq!(fixture.extractor.list_laws().unwrap(), vec![LAW]);
}

#[test]
fn missing_artifact_is_an_empty_version() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    std::fs::create_dir_all(fixture.extractor.version_dir(LAW, "2")).unwrap();

    assert!(fixture.extractor.extract_tables_from_version(LAW, "2").unwrap().is_empty());
    let unique = fixture.extractor.extract_unique_tables_from_law(LAW).unwrap();
    assert_eq!(unique[&people_hash()].found_in_versions, vec!["1"]);
}

#[test]
fn malformed_artifact_fails_only_its_version() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    let broken = fixture.extractor.artifact_path(LAW, "2");
    std::fs::create_dir_all(broken.parent().unwrap()).unwrap();
    std::fs::write(&broken, "{ \"elements\": [").unwrap();

    let error = fixture.extractor.extract_tables_from_version(LAW, "2").unwrap_err();
    assert!(matches!(*error.detail, ErrorDetail::ParseJson(_)));
    assert_eq!(error.context.version.as_deref(), Some("2"));
    assert_eq!(fixture.extractor.extract_unique_tables_from_law(LAW).unwrap().len(), 1);
}

#[test]
fn source_link_comes_from_metadata() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    std::fs::write(
        fixture.extractor.version_dir(LAW, "1").join("131.1-1-metadata.json"),
        json!({ "doc_info": { "law_text_url": "https://example.org/131.1-1.pdf" } }).to_string(),
    )
    .unwrap();
    let tables = fixture.extractor.extract_tables_from_version(LAW, "1").unwrap();
    let entry = &tables[&people_hash()];
    assert_eq!(entry.source_link, "https://example.org/131.1-1.pdf");
    assert_eq!(entry.table_id, "1");
}

#[test]
fn missing_data_root_is_a_setup_error() {
    let fixture = Fixture::new();
    let error = fixture.extractor.list_laws().unwrap_err();
    assert!(matches!(*error.detail, ErrorDetail::MissingDataRoot));
}
