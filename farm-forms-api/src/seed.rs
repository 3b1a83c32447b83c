//! Schema migrations and the built-in form definitions

use serde::Deserialize;
use sqlx::{types::Json, PgPool};
use tracing::info;

use crate::types::FieldType;

// Compile-time embed of the built-in forms
const FORMS_JSON: &str = include_str!("../seed/forms.json");

#[derive(Debug, Deserialize)]
struct SeedForm {
    name: String,
    fields: Vec<SeedField>,
}

#[derive(Debug, Deserialize)]
struct SeedField {
    label: String,
    #[serde(rename = "type")]
    kind: FieldType,
    #[serde(default)]
    options: Option<Vec<String>>,
}

/// Run migrations and seed the built-in forms
pub async fn init_database(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    sqlx::migrate!("./migrations").run(pool).await?;
    seed_forms(pool).await
}

/// Insert each built-in form by name. Existing forms and their fields are left untouched.
pub async fn seed_forms(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let forms: Vec<SeedForm> =
        serde_json::from_str(FORMS_JSON).map_err(|e| format!("Invalid forms.json: {}", e))?;

    for form in forms {
        let mut tx = pool.begin().await?;

        let form_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO forms (name, created_at) VALUES ($1, NOW())
             ON CONFLICT (name) DO NOTHING RETURNING id",
        )
        .bind(&form.name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(form_id) = form_id else {
            tx.rollback().await?;
            continue;
        };

        for (position, field) in form.fields.iter().enumerate() {
            sqlx::query(
                "INSERT INTO form_options (form_id, label, field_type, options, position)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(form_id)
            .bind(&field.label)
            .bind(field.kind.as_str())
            .bind(field.options.clone().map(Json))
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Seeded form {} '{}' with {} fields", form_id, form.name, form.fields.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_forms_parse() {
        let forms: Vec<SeedForm> = serde_json::from_str(FORMS_JSON).unwrap();
        assert!(!forms.is_empty());

        let survey = &forms[0];
        let blocks: Vec<&SeedField> = survey
            .fields
            .iter()
            .filter(|f| f.label == crate::types::BLOCK_LABEL && f.kind == FieldType::Checkbox)
            .collect();
        assert_eq!(blocks.len(), 1);
        let options = blocks[0].options.as_ref().unwrap();
        assert_eq!(options.len(), 20);
        assert!(options.iter().all(|o| o.parse::<i64>().is_ok()));
    }
}
