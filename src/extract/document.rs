//! Extraction API output
//!
//! Only `Text`, `Path`, `Page`, `Bounds` and `attributes.TableID` are read;
//! everything else the extraction wrapper writes is ignored.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::table::{Bounds, TableFragment};

#[derive(Deserialize, Debug, Default)]
pub struct ExtractionDocument {
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Deserialize, Debug)]
pub struct Element {
    #[serde(rename = "Text", default)]
    pub text: Option<String>,
    #[serde(rename = "Path", default)]
    pub path: String,
    #[serde(rename = "Page", default)]
    pub page: Option<u32>,
    #[serde(rename = "Bounds", default)]
    pub bounds: Option<[f64; 4]>,
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

#[derive(Deserialize, Debug)]
pub struct Attributes {
    #[serde(rename = "TableID", default)]
    pub table_id: Option<serde_json::Value>,
}

impl Element {
    fn table_id(&self) -> Option<String> {
        match self.attributes.as_ref()?.table_id.as_ref()? {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl ExtractionDocument {
    /// Table fragments grouped by table id, tables in first-seen order.
    pub fn table_fragments(&self) -> IndexMap<String, Vec<TableFragment>> {
        let mut tables: IndexMap<String, Vec<TableFragment>> = IndexMap::new();
        for element in &self.elements {
            let Some(table_id) = element.table_id() else {
                continue;
            };
            let Some(text) = &element.text else {
                continue;
            };
            tables.entry(table_id.clone()).or_default().push(TableFragment {
                table_id,
                path: element.path.clone(),
                text: text.clone(),
                page: element.page,
                bounds: element.bounds.map(Bounds),
            });
        }
        tables
    }
}

/// Version metadata written by the scraper next to the PDF.
#[derive(Deserialize, Debug, Default)]
pub struct VersionMetadata {
    #[serde(default)]
    pub doc_info: DocInfo,
}

#[derive(Deserialize, Debug, Default)]
pub struct DocInfo {
    #[serde(default)]
    pub law_text_url: Option<String>,
}
