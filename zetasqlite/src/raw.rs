//! The raw resolved-plan shape handed across the analyzer boundary
//! (`spec.md §1`'s "opaque resolved plan tree"). Mirrors the tagged-object
//! JSON an analyzer binding would hand across an FFI boundary:
//! `{"kind": "ResolvedProjectScan", ...}`. Nothing outside `extract` is
//! allowed to read this shape directly — see `spec.md §4.5`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Json>,
}

impl RawNode {
    pub fn new(kind: impl Into<String>) -> Self {
        RawNode {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Json) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    fn missing(&self, field: &str) -> Error {
        Error::Extraction {
            shape: self.kind.clone(),
            message: format!("missing field '{field}'"),
        }
    }

    pub fn str_field(&self, field: &str) -> Result<String> {
        self.fields
            .get(field)
            .and_then(Json::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.missing(field))
    }

    pub fn opt_str_field(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(Json::as_str).map(str::to_string)
    }

    pub fn int_field(&self, field: &str) -> Result<i64> {
        self.fields
            .get(field)
            .and_then(Json::as_i64)
            .ok_or_else(|| self.missing(field))
    }

    pub fn opt_int_field(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(Json::as_i64)
    }

    pub fn bool_field(&self, field: &str) -> bool {
        self.fields.get(field).and_then(Json::as_bool).unwrap_or(false)
    }

    pub fn node_field(&self, field: &str) -> Result<RawNode> {
        let value = self.fields.get(field).ok_or_else(|| self.missing(field))?;
        serde_json::from_value(value.clone()).map_err(|e| Error::Extraction {
            shape: self.kind.clone(),
            message: format!("field '{field}' is not a node: {e}"),
        })
    }

    pub fn opt_node_field(&self, field: &str) -> Result<Option<RawNode>> {
        match self.fields.get(field) {
            None | Some(Json::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone()).map_err(|e| {
                Error::Extraction {
                    shape: self.kind.clone(),
                    message: format!("field '{field}' is not a node: {e}"),
                }
            })?)),
        }
    }

    pub fn node_list_field(&self, field: &str) -> Result<Vec<RawNode>> {
        match self.fields.get(field) {
            None | Some(Json::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| Error::Extraction {
                shape: self.kind.clone(),
                message: format!("field '{field}' is not a node list: {e}"),
            }),
        }
    }

    pub fn raw_field(&self, field: &str) -> Option<&Json> {
        self.fields.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_field_reports_missing_field_with_kind() {
        let node = RawNode::new("ResolvedTableScan");
        let err = node.str_field("table").unwrap_err();
        assert!(err.to_string().contains("ResolvedTableScan"));
    }

    #[test]
    fn node_list_field_defaults_to_empty_when_absent() {
        let node = RawNode::new("ResolvedProjectScan");
        assert!(node.node_list_field("expr_list").unwrap().is_empty());
    }
}
