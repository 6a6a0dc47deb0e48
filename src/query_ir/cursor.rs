//! Opaque connection cursors.
//!
//! A cursor is base64-encoded JSON `{"offset": n, "sort": [...]}`: the edge's
//! sort key values plus its offset in the ordering, which disambiguates rows
//! with equal keys. `after: cursor` resumes at `offset + 1`; the sort values
//! must match the shape of the ordering they are used with.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query_ir::errors::{QueryIrError, QueryIrResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
}

impl Cursor {
    pub fn at(offset: u64) -> Self {
        Cursor {
            offset,
            sort: Vec::new(),
        }
    }

    pub fn with_sort_values(mut self, values: Vec<Value>) -> Self {
        self.sort = values;
        self
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of integers and JSON values cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(cursor: &str) -> QueryIrResult<Cursor> {
        let invalid = |reason: String| QueryIrError::InvalidCursor {
            cursor: cursor.to_string(),
            reason,
        };
        let bytes = STANDARD
            .decode(cursor.trim())
            .map_err(|e| invalid(format!("not base64: {}", e)))?;
        serde_json::from_slice(&bytes).map_err(|e| invalid(format!("malformed payload: {}", e)))
    }
}

fn cursor_at(skip: u64, position: usize, sort_values: &[Vec<Value>]) -> QueryIrResult<String> {
    let offset = u64::try_from(position)
        .ok()
        .and_then(|position| skip.checked_add(position))
        .ok_or_else(|| QueryIrError::InvalidCursor {
            cursor: format!("{}+{}", skip, position),
            reason: "offset out of range".to_string(),
        })?;
    let values = sort_values.get(position).cloned().unwrap_or_default();
    Ok(Cursor::at(offset).with_sort_values(values).encode())
}

/// Cursors for the `edge_count` edges of a page beginning at `skip`.
/// `sort_values` is a sorted connection's `pageInfo.sortValues`; pass an empty
/// slice for unsorted pages.
pub fn edge_cursors(
    skip: u64,
    edge_count: usize,
    sort_values: &[Vec<Value>],
) -> QueryIrResult<Vec<String>> {
    (0..edge_count)
        .map(|position| cursor_at(skip, position, sort_values))
        .collect()
}

/// Start and end cursors of a page, `None` for an empty page
pub fn page_cursors(
    skip: u64,
    edge_count: usize,
    sort_values: &[Vec<Value>],
) -> QueryIrResult<(Option<String>, Option<String>)> {
    if edge_count == 0 {
        return Ok((None, None));
    }
    Ok((
        Some(cursor_at(skip, 0, sort_values)?),
        Some(cursor_at(skip, edge_count - 1, sort_values)?),
    ))
}
