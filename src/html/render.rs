//! HTML serialization

use super::{HtmlDocument, Node, RAW_TEXT_ELEMENTS};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_one_of(tag: &str, names: &[&str]) -> bool {
    names.iter().any(|name| tag.eq_ignore_ascii_case(name))
}

pub fn render_document(document: &HtmlDocument) -> String {
    let mut out = String::new();
    if let Some(doctype) = &document.doctype {
        out.push_str(doctype);
    }
    render_into(&mut out, &document.children, false);
    out
}

pub fn render_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_into(&mut out, nodes, false);
    out
}

fn render_into(out: &mut String, nodes: &[Node], raw_text: bool) {
    for node in nodes {
        match node {
            Node::Text(text) if raw_text => out.push_str(text),
            Node::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    if let Some(value) = value {
                        out.push_str("=\"");
                        out.push_str(&html_escape::encode_double_quoted_attribute(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_one_of(tag, VOID_ELEMENTS) {
                    continue;
                }
                render_into(out, children, is_one_of(tag, RAW_TEXT_ELEMENTS));
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}
