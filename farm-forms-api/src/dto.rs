//! JSON request and response bodies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::types::{BlockResponseDetail, BlockSummary, FieldDefinition, FieldType, ResponseRecord};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Field definition as sent to clients. Ids are strings for client consistency.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub id: String,
    pub form_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl From<&FieldDefinition> for FieldView {
    fn from(field: &FieldDefinition) -> Self {
        FieldView {
            id: field.id.to_string(),
            form_id: field.form_id.to_string(),
            label: field.label.clone(),
            kind: field.kind,
            options: field.options.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormView {
    pub id: String,
    pub name: String,
    pub options: Vec<FieldView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDetailView {
    pub response_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub created_at: String,
}

impl From<&BlockResponseDetail> for BlockDetailView {
    fn from(detail: &BlockResponseDetail) -> Self {
        BlockDetailView {
            response_id: detail.response_id,
            user_id: detail.user_id,
            user_name: detail.user_display_name.clone(),
            created_at: detail.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummaryResponse {
    pub form_name: String,
    pub total_blocks: usize,
    pub filled_blocks: BTreeMap<String, usize>,
    pub options: Vec<FieldView>,
    pub responded_block_numbers_for_block_label: Vec<i64>,
    /// Keyed by block number, serialized as a string
    pub block_response_details: BTreeMap<i64, Vec<BlockDetailView>>,
    pub duplicated_blocks: Vec<i64>,
    pub missing_blocks: Vec<i64>,
}

impl BlockSummaryResponse {
    pub fn new(summary: BlockSummary, fields: &[FieldDefinition]) -> Self {
        let duplicated_blocks = summary.duplicated_blocks();
        let missing_blocks = summary.missing_blocks();
        BlockSummaryResponse {
            form_name: summary.form_name,
            total_blocks: summary.total_blocks,
            filled_blocks: summary.filled_counts,
            options: fields.iter().map(FieldView::from).collect(),
            responded_block_numbers_for_block_label: summary.responded_block_numbers.into_iter().collect(),
            block_response_details: summary
                .block_details
                .iter()
                .map(|(block, details)| (*block, details.iter().map(BlockDetailView::from).collect()))
                .collect(),
            duplicated_blocks,
            missing_blocks,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView {
    pub id: String,
    pub user_id: i64,
    pub user_name: String,
    pub created_at: String,
    pub values: Map<String, Value>,
}

impl From<ResponseRecord> for ResponseView {
    fn from(record: ResponseRecord) -> Self {
        ResponseView {
            id: record.id.to_string(),
            user_id: record.user_id,
            user_name: record.user_display_name,
            created_at: record.created_at.to_rfc3339(),
            values: record.values,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponseRequest {
    pub user_id: i64,
    pub values: Value,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: String,
    pub deleted: bool,
}
