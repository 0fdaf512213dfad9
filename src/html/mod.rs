//! Owned HTML tree
//!
//! Rendered pages are parsed with `scraper` (an HTML5 tree builder, so
//! optional end tags and mixed-case tags come out as the browser sees them)
//! and copied into an owned node tree that can be rewritten in place and
//! serialized back. Reparsing and re-rendering a rendered page is a fixed
//! point.

use std::sync::LazyLock;

use indexmap::IndexMap;
use scraper::ElementRef;

mod render;
mod table;

pub use render::{render_document, render_nodes};
pub use table::{paragraph, table_children, table_rows};

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

static DOCTYPE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)^\s*(<!doctype[^>]*>)").unwrap());

/// Sources that carry document structure are parsed as whole documents,
/// anything else as a body fragment.
static DOCUMENT_MARKUP: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?i)<(?:!doctype|html|head|body)[\s>/]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element {
        tag: String,
        attrs: IndexMap<String, Option<String>>,
        children: Vec<Node>,
    },
    Text(String),
    Comment(String),
}

impl Node {
    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Self::Element {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn is_element(&self, name: &str) -> bool {
        self.tag().is_some_and(|tag| tag.eq_ignore_ascii_case(name))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element { attrs, .. } => attrs.get(name).and_then(|value| value.as_deref()),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Self::Element { children, .. } => children.as_slice(),
            _ => &[],
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        text_content(&mut out, std::slice::from_ref(self));
        out
    }
}

pub fn text_content(out: &mut String, src: &[Node]) {
    for child in src {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element { children, .. } => text_content(out, children),
            Node::Comment(_) => {}
        }
    }
}

/// A parsed page: the optional doctype line and the top-level nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlDocument {
    pub doctype: Option<String>,
    pub children: Vec<Node>,
}

impl HtmlDocument {
    pub fn parse(src: &str) -> Self {
        let doctype = DOCTYPE
            .captures(src)
            .and_then(|captures| captures.get(1))
            .map(|doctype| doctype.as_str().to_owned());
        let children = if DOCUMENT_MARKUP.is_match(src) {
            let html = scraper::Html::parse_document(src);
            html.tree
                .root()
                .children()
                .filter_map(|child| convert(child.value(), ElementRef::wrap(child)))
                .collect()
        } else {
            // Fragments hang off a synthetic `<html>` root.
            let html = scraper::Html::parse_fragment(src);
            convert_children(html.root_element())
        };
        Self { doctype, children }
    }

    pub fn render(&self) -> String {
        render_document(self)
    }
}

fn convert_children(element: ElementRef<'_>) -> Vec<Node> {
    element
        .children()
        .filter_map(|child| convert(child.value(), ElementRef::wrap(child)))
        .collect()
}

/// `element` is set exactly when `node` is an element.
fn convert(node: &scraper::Node, element: Option<ElementRef<'_>>) -> Option<Node> {
    match node {
        scraper::Node::Text(text) => Some(Node::Text(String::from(&*text.text))),
        scraper::Node::Comment(comment) => Some(Node::Comment(String::from(&*comment.comment))),
        scraper::Node::Element(value) => {
            let attrs = value
                .attrs()
                .map(|(name, value)| (name.to_owned(), Some(value.to_owned())))
                .collect();
            Some(Node::Element {
                tag: value.name().to_owned(),
                attrs,
                children: element.map(convert_children).unwrap_or_default(),
            })
        }
        // The doctype is carried verbatim on the document.
        _ => None,
    }
}
