//! Re-applying stored decisions to regenerated pages
//!
//! Pages are regenerated from scratch on every build, so corrections are
//! replayed onto fresh HTML each time. Every table is looked up by its
//! `data-table-hash` attribute, or by the hash of its content when the
//! attribute is missing.

use std::{collections::HashSet, path::Path};

use tracing::{debug, error, info, warn};

use crate::{
    Error, ErrorContext, ErrorDetail,
    correction::{CorrectionFile, CorrectionStore, TableAction, is_safe_to_apply, plan, row_paragraphs},
    html::{HtmlDocument, Node, paragraph, table_children, table_rows},
    table::{TableHash, hash_html_table},
};

mod json;

pub use json::{ResolvedContent, ResolvedTable, rendered_tables, resolve_tables};

pub const HASH_ATTRIBUTE: &str = "data-table-hash";

/// What a pass over one page did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub tables: usize,
    pub rebuilt: usize,
    pub rejected: usize,
    pub removed: usize,
    /// Merge targets that are neither on the page nor in the corrections.
    pub missing_targets: Vec<TableHash>,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        self.rebuilt + self.rejected + self.removed > 0
    }
}

fn table_key(table: &Node) -> TableHash {
    match table.attr(HASH_ATTRIBUTE) {
        Some(hash) if !hash.trim().is_empty() => hash.trim().into(),
        _ => hash_html_table(table),
    }
}

fn collect_keys(out: &mut Vec<TableHash>, nodes: &[Node]) {
    for node in nodes {
        if node.is_element("table") {
            out.push(table_key(node));
        }
        collect_keys(out, node.children());
    }
}

struct Applier<'a> {
    corrections: &'a CorrectionFile,
    on_page: HashSet<TableHash>,
    report: ApplyReport,
}

impl Applier<'_> {
    fn target_known(&self, target: &TableHash) -> bool {
        self.on_page.contains(target) || self.corrections.tables.contains_key(target)
    }

    fn rewrite(&mut self, nodes: Vec<Node>) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Element { tag, attrs, children } if tag.eq_ignore_ascii_case("table") => {
                    let table = Node::Element { tag, attrs, children };
                    self.table(table, &mut out);
                }
                Node::Element { tag, attrs, children } => out.push(Node::Element {
                    tag,
                    attrs,
                    children: self.rewrite(children),
                }),
                other => out.push(other),
            }
        }
        out
    }

    fn table(&mut self, table: Node, out: &mut Vec<Node>) {
        self.report.tables += 1;
        let key = table_key(&table);
        let corrections = self.corrections;
        match plan(corrections.get(key.as_str())) {
            TableAction::Keep => out.push(self.keep(table)),
            TableAction::Rebuild(structure) => {
                debug!(hash = %key, "rebuilding corrected table");
                self.report.rebuilt += 1;
                if let Node::Element { tag, attrs, .. } = table {
                    out.push(Node::Element {
                        tag,
                        attrs,
                        children: table_children(structure),
                    });
                }
            }
            TableAction::Paragraphs => {
                debug!(hash = %key, "replacing rejected table with paragraphs");
                self.report.rejected += 1;
                out.extend(row_paragraphs(table_rows(&table)).into_iter().map(paragraph));
            }
            TableAction::Remove { target } if self.target_known(target) => {
                debug!(hash = %key, %target, "removing merged table");
                self.report.removed += 1;
            }
            TableAction::Remove { target } => {
                error!(hash = %key, %target, "merge target missing, keeping table");
                self.report.missing_targets.push(target.clone());
                out.push(self.keep(table));
            }
        }
    }

    /// Keep a table as is, but still visit tables nested in it.
    fn keep(&mut self, table: Node) -> Node {
        match table {
            Node::Element { tag, attrs, children } => Node::Element {
                tag,
                attrs,
                children: self.rewrite(children),
            },
            other => other,
        }
    }
}

/// Apply `corrections` to a parsed node list in place.
pub fn apply_corrections_to_nodes(nodes: &mut Vec<Node>, corrections: &CorrectionFile) -> ApplyReport {
    let mut keys = Vec::new();
    collect_keys(&mut keys, nodes);
    let (_, warnings) = is_safe_to_apply(keys.iter(), &corrections.tables);
    for warning in warnings {
        warn!(law_id = %corrections.law_id, "{warning}");
    }

    let mut applier = Applier {
        corrections,
        on_page: keys.into_iter().collect(),
        report: ApplyReport::default(),
    };
    *nodes = applier.rewrite(std::mem::take(nodes));
    applier.report
}

/// Apply `corrections` to an HTML page and render the result.
pub fn apply_corrections_to_html(src: &str, corrections: &CorrectionFile) -> (String, ApplyReport) {
    let mut document = HtmlDocument::parse(src);
    let report = apply_corrections_to_nodes(&mut document.children, corrections);
    (document.render(), report)
}

/// Apply `corrections` to the page at `path`. The file is rewritten only
/// when a table changed.
pub fn apply_corrections_to_file(path: &Path, corrections: &CorrectionFile) -> Result<ApplyReport, Error> {
    let ctx = ErrorContext::new(path).with_law(&corrections.law_id, corrections.version.as_deref());
    let src = std::fs::read_to_string(path).map_err(|e| ctx.error(ErrorDetail::ReadDocument(e)))?;
    let (rendered, report) = apply_corrections_to_html(&src, corrections);
    if report.changed() {
        std::fs::write(path, rendered).map_err(|e| ctx.error(ErrorDetail::WriteDocument(e)))?;
    }
    Ok(report)
}

/// Build step for one rendered version page: apply the version's effective
/// corrections if there are any.
pub fn apply_stored_corrections(
    store: &CorrectionStore,
    folder: &str,
    law_id: &str,
    version: &str,
    path: &Path,
) -> Result<Option<ApplyReport>, Error> {
    let Some(corrections) = store.get_effective(law_id, version, folder) else {
        debug!(%law_id, %version, "no corrections for page");
        return Ok(None);
    };
    let report = apply_corrections_to_file(path, &corrections)?;
    info!(
        %law_id,
        %version,
        rebuilt = report.rebuilt,
        rejected = report.rejected,
        removed = report.removed,
        "applied corrections"
    );
    Ok(Some(report))
}
