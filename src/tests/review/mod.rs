use indexmap::IndexMap;
use serde_json::json;

use super::{FEES, FOLDER, Fixture, LAW, PEOPLE, RATES, table};
use crate::{
    ErrorDetail,
    correction::{
        NEW_TABLE_REASON, ResetScope, ReviewStatus, TableCorrection, TableStatus,
    },
    table::TableHash,
};

/// Decide every extracted table of the law with `status`.
fn decide_all(fixture: &Fixture, version: Option<&str>, status: TableStatus) -> IndexMap<TableHash, TableCorrection> {
    fixture
        .extractor
        .extract_scope(LAW, version)
        .unwrap()
        .values()
        .map(|table| {
            (
                table.hash.clone(),
                TableCorrection::undecided(table).with_status(status.clone()),
            )
        })
        .collect()
}

#[test]
fn invalid_save_writes_nothing() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    let path = fixture.store.correction_path(LAW, Some("1"), FOLDER);

    let broken = decide_all(&fixture, Some("1"), TableStatus::ConfirmedWithChanges);
    let error = fixture.store.save(LAW, broken.clone(), Some("1"), FOLDER).unwrap_err();
    let ErrorDetail::Validation(errors) = &*error.detail else {
        panic!("expected a validation error, got {error}");
    };
    assert!(errors.iter().any(|e| e.contains("corrected_structure")), "{errors:?}");
    assert!(!path.exists());

    let good = decide_all(&fixture, Some("1"), TableStatus::Rejected);
    fixture.store.save(LAW, good, Some("1"), FOLDER).unwrap();
    let before = std::fs::read(&path).unwrap();
    assert!(fixture.store.save(LAW, broken, Some("1"), FOLDER).is_err());
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn saved_review_round_trips() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 3, FEES)]);
    let mut tables = decide_all(&fixture, Some("1"), TableStatus::ConfirmedWithoutChanges);
    let (fees, correction) = tables.pop().unwrap();
    tables.insert(
        fees.clone(),
        correction.with_corrected(vec![
            vec!["Fee".into(), "CHF".into()],
            vec!["Permit".into(), "150".into()],
        ]),
    );
    fixture.store.save(LAW, tables, Some("1"), FOLDER).unwrap();

    let file = fixture.store.get(LAW, Some("1"), FOLDER).unwrap();
    assert_eq!(file.status, ReviewStatus::Completed);
    assert_eq!(file.reviewer, "tester");
    assert_eq!(file.version.as_deref(), Some("1"));
    assert_eq!(file.tables.len(), 2);
    assert_eq!(file.tables[&fees].status, TableStatus::ConfirmedWithChanges);
    assert!(!fixture.store.correction_path(LAW, None, FOLDER).exists());
}

#[test]
fn sanitizing_fills_missing_fields() {
    let fixture = Fixture::new();
    let tables = json!({
        "aaaaaaaaaaaaaaaa": { "status": "rejected", "found_in_versions": ["1"] },
        "bbbbbbbbbbbbbbbb": "garbage"
    });
    let serde_json::Value::Object(tables) = tables else {
        unreachable!()
    };
    let path = fixture.store.save_json(LAW, tables, None, FOLDER).unwrap();
    let stored = fixture.read_json(&path);
    assert_eq!(stored["tables"]["aaaaaaaaaaaaaaaa"]["hash"], "aaaaaaaaaaaaaaaa");
    assert_eq!(stored["tables"]["aaaaaaaaaaaaaaaa"]["pages"], json!({ "1": [] }));
    assert!(stored["tables"].get("bbbbbbbbbbbbbbbb").is_none());
}

#[test]
fn hash_mismatch_is_never_repaired() {
    let fixture = Fixture::new();
    let tables = json!({
        "aaaaaaaaaaaaaaaa": {
            "hash": "cccccccccccccccc", "status": "rejected",
            "found_in_versions": ["1"], "pages": { "1": [1] }
        }
    });
    let serde_json::Value::Object(tables) = tables else {
        unreachable!()
    };
    assert!(fixture.store.save_json(LAW, tables, None, FOLDER).is_err());
    assert!(!fixture.store.correction_path(LAW, None, FOLDER).exists());
}

#[test]
fn new_tables_are_appended_only() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    assert!(fixture.store.update_with_new_tables(LAW, None, FOLDER, &fixture.extractor).unwrap().is_empty());
    assert!(!fixture.store.correction_path(LAW, None, FOLDER).exists());

    let decided = decide_all(&fixture, None, TableStatus::Rejected);
    fixture.store.save(LAW, decided.clone(), None, FOLDER).unwrap();
    for _ in 0..2 {
        let added = fixture.store.update_with_new_tables(LAW, None, FOLDER, &fixture.extractor).unwrap();
        assert!(added.is_empty());
    }

    fixture.write_version(LAW, "2", &[table("1", 1, PEOPLE), table("5", 4, RATES)]);
    let added = fixture.store.update_with_new_tables(LAW, None, FOLDER, &fixture.extractor).unwrap();
    assert_eq!(added.len(), 1);

    let file = fixture.store.get(LAW, None, FOLDER).unwrap();
    assert_eq!(file.tables.len(), 3);
    for hash in decided.keys() {
        let stored = &file.tables[hash];
        assert_eq!(stored.status, TableStatus::Rejected);
        // Entries are kept as they were saved, even though the people table
        // now also occurs in version 2.
        assert_eq!(stored.found_in_versions, decided[hash].found_in_versions);
    }
    let new = &file.tables[&added[0]];
    assert_eq!(new.status, TableStatus::Undefined);
    assert_eq!(new.reason.as_deref(), Some(NEW_TABLE_REASON));
    assert!(new.discovered_at.is_some());
}

#[test]
fn update_keeps_legacy_labels_untouched() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    let people = fixture.extractor.extract_scope(LAW, None).unwrap()[0].hash.clone();
    let path = fixture.store.correction_path(LAW, None, FOLDER);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        json!({
            "law_id": LAW,
            "reviewed_at": "2023-05-01T12:00:00",
            "reviewer": "legacy-tool",
            "status": "completed",
            "tables": {
                people.as_str(): {
                    "hash": people.as_str(), "status": "confirmed",
                    "found_in_versions": ["1"], "pages": { "1": [1] }
                }
            }
        })
        .to_string(),
    )
    .unwrap();

    let added = fixture.store.update_with_new_tables(LAW, None, FOLDER, &fixture.extractor).unwrap();
    assert_eq!(added.len(), 1);
    let raw = fixture.read_json(&path);
    assert_eq!(raw["tables"][people.as_str()]["status"], "confirmed");
    assert_eq!(raw["reviewer"], "legacy-tool");
    assert_eq!(
        fixture.store.get(LAW, None, FOLDER).unwrap().tables[&people].status,
        TableStatus::ConfirmedWithoutChanges
    );
}

/// Write a law-level file by hand, as an older review tool would have.
fn write_raw(fixture: &Fixture, file: serde_json::Value) -> std::path::PathBuf {
    let path = fixture.store.correction_path(LAW, None, FOLDER);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, file.to_string()).unwrap();
    path
}

#[test]
fn update_appends_next_to_unrecognized_entries() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    let people = fixture.extractor.extract_scope(LAW, None).unwrap()[0].hash.clone();
    let entry = json!({
        "hash": people.as_str(), "status": "approved",
        "found_in_versions": ["1"], "pages": { "1": [1] }
    });
    let path = write_raw(
        &fixture,
        json!({
            "law_id": LAW, "reviewed_at": "", "reviewer": "legacy-tool",
            "status": "completed", "tables": { people.as_str(): entry.clone() }
        }),
    );

    let added = fixture.store.update_with_new_tables(LAW, None, FOLDER, &fixture.extractor).unwrap();
    assert_eq!(added.len(), 1);
    let raw = fixture.read_json(&path);
    assert_eq!(raw["tables"][people.as_str()], entry);
    assert!(raw["tables"].get(added[0].as_str()).is_some());
    assert_eq!(
        fixture.store.get(LAW, None, FOLDER).unwrap().tables[&people].status,
        TableStatus::Undefined
    );
}

#[test]
fn update_leaves_hashless_entries_as_they_are() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    let people = fixture.extractor.extract_scope(LAW, None).unwrap()[0].hash.clone();
    let entry = json!({ "status": "rejected", "found_in_versions": ["1"] });
    let path = write_raw(
        &fixture,
        json!({
            "law_id": LAW, "reviewed_at": "", "reviewer": "legacy-tool",
            "status": "completed", "tables": { people.as_str(): entry.clone() }
        }),
    );

    let added = fixture.store.update_with_new_tables(LAW, None, FOLDER, &fixture.extractor).unwrap();
    assert_eq!(added.len(), 1);
    let raw = fixture.read_json(&path);
    assert_eq!(raw["tables"][people.as_str()], entry);
    assert_eq!(raw["tables"].as_object().unwrap().len(), 2);
}

#[test]
fn unknown_file_status_keeps_decisions_effective() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    let people = fixture.extractor.extract_scope(LAW, None).unwrap()[0].hash.clone();
    write_raw(
        &fixture,
        json!({
            "law_id": LAW, "reviewed_at": "", "reviewer": "legacy-tool",
            "status": "pending",
            "tables": {
                people.as_str(): {
                    "hash": people.as_str(), "status": "rejected",
                    "found_in_versions": ["1"], "pages": { "1": [1] }
                }
            }
        }),
    );

    let file = fixture.store.get_effective(LAW, "1", FOLDER).unwrap();
    assert_eq!(file.status, ReviewStatus::NotStarted);
    assert_eq!(file.tables[&people].status, TableStatus::Rejected);
}

#[test]
fn completion_is_monotonic() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    let store = &fixture.store;
    let extractor = &fixture.extractor;

    let (complete, undecided) = store.validate_law_completion(LAW, None, FOLDER, extractor).unwrap();
    assert!(!complete);
    assert_eq!(undecided.len(), 2);

    assert!(store.initialize(LAW, None, FOLDER, extractor).unwrap());
    assert!(!store.initialize(LAW, None, FOLDER, extractor).unwrap());
    assert_eq!(store.get(LAW, None, FOLDER).unwrap().status, ReviewStatus::NotStarted);
    assert!(!store.validate_law_completion(LAW, None, FOLDER, extractor).unwrap().0);

    let mut decided = decide_all(&fixture, None, TableStatus::ConfirmedWithoutChanges);
    let first = decided.keys().next().unwrap().clone();
    let second = decided.keys().nth(1).unwrap().clone();
    decided.insert(
        second.clone(),
        decided[&second].clone().with_status(TableStatus::Merged(first)),
    );
    store.save(LAW, decided, None, FOLDER).unwrap();
    assert_eq!(
        store.validate_law_completion(LAW, None, FOLDER, extractor).unwrap(),
        (true, vec![])
    );

    store.update_with_new_tables(LAW, None, FOLDER, extractor).unwrap();
    assert!(store.validate_law_completion(LAW, None, FOLDER, extractor).unwrap().0);

    fixture.write_version(LAW, "2", &[table("9", 1, RATES)]);
    let (complete, undecided) = store.validate_law_completion(LAW, None, FOLDER, extractor).unwrap();
    assert!(!complete);
    assert_eq!(undecided.len(), 1);
    store.update_with_new_tables(LAW, None, FOLDER, extractor).unwrap();
    assert!(!store.validate_law_completion(LAW, None, FOLDER, extractor).unwrap().0);
}

#[test]
fn per_version_file_shadows_law_level_file() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    fixture.write_version(LAW, "2", &[table("1", 1, PEOPLE)]);

    fixture
        .store
        .save(LAW, decide_all(&fixture, None, TableStatus::Rejected), None, FOLDER)
        .unwrap();
    let effective = fixture.store.get_effective(LAW, "2", FOLDER).unwrap();
    assert_eq!(effective.version, None);

    fixture
        .store
        .save(
            LAW,
            decide_all(&fixture, Some("2"), TableStatus::ConfirmedWithoutChanges),
            Some("2"),
            FOLDER,
        )
        .unwrap();
    let effective = fixture.store.get_effective(LAW, "2", FOLDER).unwrap();
    assert_eq!(effective.version.as_deref(), Some("2"));
    assert_eq!(
        effective.tables.values().next().unwrap().status,
        TableStatus::ConfirmedWithoutChanges
    );
    assert_eq!(fixture.store.get_effective(LAW, "1", FOLDER).unwrap().version, None);
    assert!(
        fixture
            .store
            .validate_law_completion(LAW, Some("2"), FOLDER, &fixture.extractor)
            .unwrap()
            .0
    );
}

#[test]
fn migration_splits_by_version_and_keeps_existing_decisions() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    fixture.write_version(LAW, "2", &[table("1", 1, PEOPLE)]);
    let store = &fixture.store;

    store
        .save(LAW, decide_all(&fixture, None, TableStatus::Rejected), None, FOLDER)
        .unwrap();
    store
        .save(
            LAW,
            decide_all(&fixture, Some("2"), TableStatus::ConfirmedWithoutChanges),
            Some("2"),
            FOLDER,
        )
        .unwrap();

    let mut written = store.migrate_law_to_per_version(LAW, FOLDER).unwrap();
    written.sort();
    assert_eq!(written, vec!["1"]);

    let first = store.get(LAW, Some("1"), FOLDER).unwrap();
    assert_eq!(first.tables.len(), 2);
    assert!(first.tables.values().all(|t| t.status == TableStatus::Rejected));
    let second = store.get(LAW, Some("2"), FOLDER).unwrap();
    assert_eq!(second.tables.len(), 1);
    assert_eq!(
        second.tables.values().next().unwrap().status,
        TableStatus::ConfirmedWithoutChanges
    );
    assert!(store.correction_path(LAW, None, FOLDER).exists());
    assert_eq!(store.list_versions(LAW, FOLDER).unwrap(), vec!["1", "2"]);
}

#[test]
fn resets_by_scope() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    fixture.write_version("211.1", "1", &[table("1", 1, FEES)]);
    let store = &fixture.store;
    let extractor = &fixture.extractor;
    for law in [LAW, "211.1"] {
        store.initialize(law, None, FOLDER, extractor).unwrap();
        store.initialize(law, Some("1"), FOLDER, extractor).unwrap();
    }
    assert_eq!(store.list_laws(FOLDER).unwrap(), vec![LAW, "211.1"]);

    let removed = store.reset_law(LAW, FOLDER, ResetScope::Legacy).unwrap();
    assert_eq!(removed, vec![store.correction_path(LAW, None, FOLDER)]);
    assert!(store.correction_path(LAW, Some("1"), FOLDER).exists());
    store.reset_law(LAW, FOLDER, ResetScope::PerVersion).unwrap();
    assert_eq!(store.list_laws(FOLDER).unwrap(), vec!["211.1"]);

    let report = store.reset_folder(FOLDER, ResetScope::All).unwrap();
    assert_eq!(report.succeeded, vec!["211.1"]);
    assert!(report.is_success());
    assert!(store.list_laws(FOLDER).unwrap().is_empty());
    assert!(store.reset_law(LAW, FOLDER, ResetScope::All).unwrap().is_empty());
}
