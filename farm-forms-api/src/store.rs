//! Persistence for forms, field definitions and responses

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow, PgPool};
use std::future::Future;

use crate::error::StoreError;
use crate::types::{display_name, FieldDefinition, FormWithResponses, ResponseRecord};

/// PostgreSQL foreign key violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Storage backend used by the HTTP handlers
pub trait FormStore: Send + Sync + 'static {
    /// Form name and field definitions. Soft-deleted forms are not found.
    fn form(&self, form_id: i64) -> impl Future<Output = Result<(String, Vec<FieldDefinition>), StoreError>> + Send;

    /// Form plus its active responses in submission order, with display names resolved
    fn form_with_active_responses(
        &self,
        form_id: i64,
    ) -> impl Future<Output = Result<FormWithResponses, StoreError>> + Send;

    /// Store a new response and return its id
    fn create_response(
        &self,
        form_id: i64,
        user_id: i64,
        values: Map<String, Value>,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Mark an active response as deleted
    fn soft_delete_response(&self, response_id: i64) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ==================== Rows ====================

#[derive(Debug, FromRow)]
struct FormRow {
    name: String,
}

#[derive(Debug, FromRow)]
struct FieldRow {
    id: i64,
    form_id: i64,
    label: String,
    field_type: String,
    options: Option<Json<Vec<String>>>,
}

impl TryFrom<FieldRow> for FieldDefinition {
    type Error = StoreError;

    fn try_from(row: FieldRow) -> Result<Self, Self::Error> {
        let kind = row.field_type.parse().map_err(StoreError::InvalidFieldType)?;
        Ok(FieldDefinition {
            id: row.id,
            form_id: row.form_id,
            label: row.label,
            kind,
            options: row.options.map(|Json(options)| options).unwrap_or_default(),
        })
    }
}

#[derive(Debug, FromRow)]
struct ResponseRow {
    id: i64,
    user_id: i64,
    user_name: Option<String>,
    answers: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
}

impl From<ResponseRow> for ResponseRecord {
    fn from(row: ResponseRow) -> Self {
        ResponseRecord {
            id: row.id,
            user_id: row.user_id,
            user_display_name: display_name(row.user_name.as_deref(), row.user_id),
            created_at: row.created_at,
            values: row.answers.0,
        }
    }
}

// ==================== Postgres ====================

#[derive(Clone)]
pub struct PgFormStore {
    pool: PgPool,
}

impl PgFormStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fields(&self, form_id: i64) -> Result<Vec<FieldDefinition>, StoreError> {
        let rows = sqlx::query_as::<_, FieldRow>(
            "SELECT id, form_id, label, field_type, options FROM form_options
             WHERE form_id = $1 ORDER BY position, id",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FieldDefinition::try_from).collect()
    }
}

impl FormStore for PgFormStore {
    async fn form(&self, form_id: i64) -> Result<(String, Vec<FieldDefinition>), StoreError> {
        let form = sqlx::query_as::<_, FormRow>("SELECT name FROM forms WHERE id = $1 AND deleted_at IS NULL")
            .bind(form_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::FormNotFound)?;

        let fields = self.fields(form_id).await?;
        Ok((form.name, fields))
    }

    async fn form_with_active_responses(&self, form_id: i64) -> Result<FormWithResponses, StoreError> {
        let (name, fields) = self.form(form_id).await?;

        let responses = sqlx::query_as::<_, ResponseRow>(
            "SELECT r.id, r.user_id, u.name AS user_name, r.answers, r.created_at
             FROM form_responses r
             LEFT JOIN users u ON u.id = r.user_id
             WHERE r.form_id = $1 AND r.deleted_at IS NULL
             ORDER BY r.created_at ASC, r.id ASC",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(FormWithResponses {
            name,
            fields,
            responses: responses.into_iter().map(ResponseRecord::from).collect(),
        })
    }

    async fn create_response(&self, form_id: i64, user_id: i64, values: Map<String, Value>) -> Result<i64, StoreError> {
        let form_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM forms WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(form_id)
        .fetch_one(&self.pool)
        .await?;

        if !form_exists {
            return Err(StoreError::FormNotFound);
        }

        sqlx::query_scalar::<_, i64>(
            "INSERT INTO form_responses (form_id, user_id, answers, created_at)
             VALUES ($1, $2, $3, NOW()) RETURNING id",
        )
        .bind(form_id)
        .bind(user_id)
        .bind(Json(values))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                    return StoreError::UnknownUser(user_id);
                }
            }
            StoreError::Database(e)
        })
    }

    async fn soft_delete_response(&self, response_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE form_responses SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(response_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ResponseNotFound);
        }
        Ok(())
    }
}
