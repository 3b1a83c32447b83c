//! Domain types shared by the store, the aggregator and the HTTP layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Label of the multi-select field that claims block coverage
pub const BLOCK_LABEL: &str = "Block";

/// Input kind of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Radio,
    Checkbox,
    Date,
    #[serde(rename = "Image Upload")]
    ImageUpload,
    #[serde(rename = "File Upload")]
    FileUpload,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Radio => "Radio",
            FieldType::Checkbox => "Checkbox",
            FieldType::Date => "Date",
            FieldType::ImageUpload => "Image Upload",
            FieldType::FileUpload => "File Upload",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Text" => Ok(FieldType::Text),
            "Radio" => Ok(FieldType::Radio),
            "Checkbox" => Ok(FieldType::Checkbox),
            "Date" => Ok(FieldType::Date),
            "Image Upload" => Ok(FieldType::ImageUpload),
            "File Upload" => Ok(FieldType::FileUpload),
            other => Err(other.to_string()),
        }
    }
}

/// One input on a dynamic form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub id: i64,
    pub form_id: i64,
    pub label: String,
    pub kind: FieldType,
    /// Ordered choices, only meaningful for Radio and Checkbox fields
    pub options: Vec<String>,
}

impl FieldDefinition {
    /// True for the Checkbox field labelled "Block"
    pub fn is_block_field(&self) -> bool {
        self.label == BLOCK_LABEL && self.kind == FieldType::Checkbox
    }
}

/// An active (not soft-deleted) form response with its submitter resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub id: i64,
    pub user_id: i64,
    pub user_display_name: String,
    pub created_at: DateTime<Utc>,
    /// Answers keyed by field label
    pub values: serde_json::Map<String, serde_json::Value>,
}

/// Form definition plus its active responses, as resolved by the store
#[derive(Debug, Clone)]
pub struct FormWithResponses {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub responses: Vec<ResponseRecord>,
}

/// Display name for a submitter, falling back to "User {id}"
pub fn display_name(name: Option<&str>, user_id: i64) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("User {}", user_id),
    }
}

/// One response that claimed a given block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockResponseDetail {
    pub response_id: i64,
    pub user_id: i64,
    pub user_display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Per-form aggregation over active responses. Computed per request, never stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockSummary {
    pub form_name: String,
    pub total_blocks: usize,
    pub filled_counts: BTreeMap<String, usize>,
    pub responded_block_numbers: BTreeSet<i64>,
    pub block_details: BTreeMap<i64, Vec<BlockResponseDetail>>,
}

impl BlockSummary {
    /// Blocks claimed by more than one response, ascending
    pub fn duplicated_blocks(&self) -> Vec<i64> {
        self.block_details
            .iter()
            .filter(|(_, details)| details.len() > 1)
            .map(|(block, _)| *block)
            .collect()
    }

    /// Blocks no response has claimed yet, ascending
    pub fn missing_blocks(&self) -> Vec<i64> {
        self.block_details
            .iter()
            .filter(|(_, details)| details.is_empty())
            .map(|(block, _)| *block)
            .collect()
    }
}
