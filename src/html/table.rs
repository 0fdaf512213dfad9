//! Reading and writing `<table>` elements

use indexmap::IndexMap;

use super::Node;
use crate::table::TableStructure;

fn is_cell(node: &Node) -> bool {
    node.is_element("td") || node.is_element("th")
}

/// Text of a cell, leaving out any table nested inside it.
fn cell_text(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element { children, .. } if !node.is_element("table") => {
                // Block-level children would otherwise glue words together.
                if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
                cell_text(out, children);
            }
            _ => {}
        }
    }
}

fn collect_rows<'a>(out: &mut Vec<&'a Node>, nodes: &'a [Node]) {
    for node in nodes {
        if node.is_element("tr") {
            out.push(node);
        } else if node.is_element("table") {
            continue;
        } else if let Node::Element { children, .. } = node {
            collect_rows(out, children);
        }
    }
}

/// Rows of this table in document order, each a list of its `<td>`/`<th>`
/// texts. Rows of nested tables are not included.
pub fn table_rows(table: &Node) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    collect_rows(&mut rows, table.children());
    rows.into_iter()
        .map(|row| {
            row.children()
                .iter()
                .filter(|child| is_cell(child))
                .map(|cell| {
                    let mut text = String::new();
                    cell_text(&mut text, cell.children());
                    text
                })
                .collect()
        })
        .collect()
}

fn row(cell_tag: &str, cells: &[String]) -> Node {
    Node::element(
        "tr",
        cells
            .iter()
            .map(|cell| Node::element(cell_tag, vec![Node::Text(cell.clone())]))
            .collect(),
    )
}

/// Fresh table children for `structure`: the first row becomes `<thead>`
/// when there are at least two rows, the rest goes into `<tbody>`.
pub fn table_children(structure: &TableStructure) -> Vec<Node> {
    let (head, body) = match structure.split_first() {
        Some((first, rest)) if !rest.is_empty() => (Some(first), rest),
        _ => (None, structure.as_slice()),
    };
    let mut children = Vec::with_capacity(2);
    if let Some(head) = head {
        children.push(Node::element("thead", vec![row("th", head)]));
    }
    children.push(Node::element(
        "tbody",
        body.iter().map(|cells| row("td", cells)).collect(),
    ));
    children
}

/// A paragraph holding the given text.
pub fn paragraph(text: String) -> Node {
    Node::Element {
        tag: "p".to_owned(),
        attrs: IndexMap::new(),
        children: vec![Node::Text(text)],
    }
}
