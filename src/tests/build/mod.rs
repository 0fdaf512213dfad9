use indexmap::IndexMap;

use super::{FEES, FOLDER, Fixture, LAW, PEOPLE, table};
use crate::{
    apply::{HASH_ATTRIBUTE, apply_corrections_to_html, apply_stored_corrections, resolve_tables},
    correction::{TableCorrection, TableStatus},
    html::{HtmlDocument, Node, render_nodes, table_children},
    table::{TableHash, TableStructure, hash_html_table},
};

fn owned(rows: &[&[&str]]) -> TableStructure {
    rows.iter()
        .map(|row| row.iter().map(|cell| (*cell).to_owned()).collect())
        .collect()
}

/// Render a page the way the site generator does: every table tagged with
/// its hash.
fn page(tables: &[(&TableHash, &[&[&str]])]) -> String {
    let body = tables
        .iter()
        .map(|(hash, rows)| {
            let mut attrs = IndexMap::new();
            attrs.insert(HASH_ATTRIBUTE.to_owned(), Some(hash.to_string()));
            Node::Element {
                tag: "table".to_owned(),
                attrs,
                children: table_children(&owned(rows)),
            }
        })
        .collect::<Vec<_>>();
    format!(
        "<!DOCTYPE html><html><head><title>{LAW}</title></head><body><h1>Gesetz</h1>{}</body></html>",
        render_nodes(&body)
    )
}

fn paragraphs(nodes: &[Node], out: &mut Vec<String>) {
    for node in nodes {
        if node.is_element("p") {
            out.push(node.text_content());
        }
        paragraphs(node.children(), out);
    }
}

fn count_tables(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| usize::from(node.is_element("table")) + count_tables(node.children()))
        .sum()
}

#[test]
fn extracted_and_rendered_hashes_agree() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    let tables = fixture.extractor.extract_tables_from_version(LAW, "1").unwrap();
    for (hash, entry) in &tables {
        let rendered = Node::element("table", table_children(&entry.structure));
        assert_eq!(&hash_html_table(&rendered), hash);
    }
}

#[test]
fn rejected_table_becomes_one_paragraph_per_row() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE)]);
    let extracted = fixture.extractor.extract_scope(LAW, Some("1")).unwrap();
    let (hash, people) = extracted.first().unwrap();
    let corrections = [(
        hash.clone(),
        TableCorrection::undecided(people).with_status(TableStatus::Rejected),
    )]
    .into_iter()
    .collect();
    fixture.store.save(LAW, corrections, Some("1"), FOLDER).unwrap();

    let path = fixture.html_path(LAW, "1");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, page(&[(hash, PEOPLE)])).unwrap();

    let report = apply_stored_corrections(&fixture.store, FOLDER, LAW, "1", &path)
        .unwrap()
        .unwrap();
    assert_eq!(report.rejected, 1);

    let document = HtmlDocument::parse(&std::fs::read_to_string(&path).unwrap());
    let mut texts = Vec::new();
    paragraphs(&document.children, &mut texts);
    assert_eq!(texts, vec!["Name Age", "Ana 30", "Bo 25"]);
    assert_eq!(count_tables(&document.children), 0);
    assert!(document.doctype.is_some());
}

#[test]
fn build_is_idempotent() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    let extracted = fixture.extractor.extract_scope(LAW, Some("1")).unwrap();
    let people = &extracted[0];
    let fees = &extracted[1];
    let corrections = [
        (
            people.hash.clone(),
            TableCorrection::undecided(people).with_corrected(owned(&[
                &["Name", "Age"],
                &["Ana", "31"],
                &["Bo", "25"],
            ])),
        ),
        (
            fees.hash.clone(),
            TableCorrection::undecided(fees).with_status(TableStatus::Merged(people.hash.clone())),
        ),
    ]
    .into_iter()
    .collect();
    fixture.store.save(LAW, corrections, Some("1"), FOLDER).unwrap();

    let path = fixture.html_path(LAW, "1");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, page(&[(&people.hash, PEOPLE), (&fees.hash, FEES)])).unwrap();

    let first = apply_stored_corrections(&fixture.store, FOLDER, LAW, "1", &path)
        .unwrap()
        .unwrap();
    assert_eq!((first.rebuilt, first.removed), (1, 1));
    let once = std::fs::read_to_string(&path).unwrap();
    assert!(once.contains(">31<"));
    assert!(!once.contains(fees.hash.as_str()));

    let second = apply_stored_corrections(&fixture.store, FOLDER, LAW, "1", &path)
        .unwrap()
        .unwrap();
    assert_eq!(second.rebuilt, 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), once);

    let file = fixture.store.get(LAW, Some("1"), FOLDER).unwrap();
    let (again, _) = apply_corrections_to_html(&once, &file);
    assert_eq!(again, once);
}

#[test]
fn pages_without_corrections_are_left_alone() {
    let fixture = Fixture::new();
    let path = fixture.html_path(LAW, "1");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let src = "<html><body><table><tr><td>x</td></tr></table></body></html>";
    std::fs::write(&path, src).unwrap();
    assert!(
        apply_stored_corrections(&fixture.store, FOLDER, LAW, "1", &path)
            .unwrap()
            .is_none()
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), src);
}

#[test]
fn json_side_matches_html_side() {
    let fixture = Fixture::new();
    fixture.write_version(LAW, "1", &[table("1", 1, PEOPLE), table("2", 2, FEES)]);
    let tables = fixture.extractor.extract_tables_from_version(LAW, "1").unwrap();
    let hashes = tables.keys().cloned().collect::<Vec<_>>();
    let unique = fixture.extractor.extract_scope(LAW, Some("1")).unwrap();
    let corrections = [(
        hashes[0].clone(),
        TableCorrection::undecided(&unique[&hashes[0]]).with_status(TableStatus::Rejected),
    )]
    .into_iter()
    .collect();
    fixture.store.save(LAW, corrections, Some("1"), FOLDER).unwrap();
    let file = fixture.store.get_effective(LAW, "1", FOLDER);

    let resolved = resolve_tables(&tables, file.as_ref());
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].table_id, "1");
    assert!(matches!(
        &resolved[0].content,
        crate::apply::ResolvedContent::Paragraphs { texts } if texts.len() == 3
    ));
    assert!(matches!(
        resolved[1].content,
        crate::apply::ResolvedContent::Table { .. }
    ));
}
