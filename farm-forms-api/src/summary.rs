//! Block coverage aggregation over a form's active responses
//!
//! Pure and synchronous: the caller resolves the form and filters out
//! soft-deleted responses before calling [`compute`].

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::types::{BlockResponseDetail, BlockSummary, FieldDefinition, ResponseRecord};

/// Everything counts as filled except null, "" and [].
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Parse one block identifier. Unparseable entries yield `None` and are skipped by callers.
pub fn parse_block_number(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Build the summary for one form.
///
/// `block_details[n]` lists responses in the order they were supplied.
pub fn compute(form_name: &str, fields: &[FieldDefinition], responses: &[ResponseRecord]) -> BlockSummary {
    let mut filled_counts: BTreeMap<String, usize> = fields
        .iter()
        .map(|field| (field.label.clone(), 0))
        .collect();

    let mut block_fields = fields.iter().filter(|field| field.is_block_field());
    let block_field = block_fields.next();
    if block_fields.next().is_some() {
        warn!(
            "Form '{}' has more than one Block checkbox field; using the first",
            form_name
        );
    }

    let mut block_details: BTreeMap<i64, Vec<BlockResponseDetail>> = BTreeMap::new();
    let mut total_blocks = 0;
    if let Some(field) = block_field {
        for option in &field.options {
            if let Ok(block) = option.trim().parse::<i64>() {
                total_blocks += 1;
                block_details.entry(block).or_default();
            }
        }
    }

    let mut responded_block_numbers = BTreeSet::new();

    for response in responses {
        for field in fields {
            let Some(value) = response.values.get(&field.label) else {
                continue;
            };

            let is_block = block_field.is_some_and(|block| std::ptr::eq(block, field));
            // Duplicate Block fields are ignored entirely
            if field.is_block_field() && !is_block {
                continue;
            }
            if is_block {
                if let Value::Array(selected) = value {
                    for block in selected.iter().filter_map(parse_block_number) {
                        responded_block_numbers.insert(block);
                        block_details.entry(block).or_default().push(BlockResponseDetail {
                            response_id: response.id,
                            user_id: response.user_id,
                            user_display_name: response.user_display_name.clone(),
                            created_at: response.created_at,
                        });
                    }
                }
            }

            if is_filled(value) {
                if let Some(count) = filled_counts.get_mut(&field.label) {
                    *count += 1;
                }
            }
        }
    }

    BlockSummary {
        form_name: form_name.to_string(),
        total_blocks,
        filled_counts,
        responded_block_numbers,
        block_details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    fn field(id: i64, label: &str, kind: FieldType, options: &[&str]) -> FieldDefinition {
        FieldDefinition {
            id,
            form_id: 1,
            label: label.to_string(),
            kind,
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    fn response(id: i64, user_id: i64, name: &str, created_at: DateTime<Utc>, values: Value) -> ResponseRecord {
        let Value::Object(values) = values else {
            panic!("values must be an object");
        };
        ResponseRecord {
            id,
            user_id,
            user_display_name: name.to_string(),
            created_at,
            values,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn survey_fields() -> Vec<FieldDefinition> {
        vec![
            field(1, "Block", FieldType::Checkbox, &["1", "2", "3"]),
            field(2, "Notes", FieldType::Text, &[]),
        ]
    }

    #[test]
    fn worked_example() {
        let responses = vec![
            response(1, 10, "A", day(1), json!({"Block": ["1", "2"], "Notes": "hi"})),
            response(2, 11, "B", day(2), json!({"Block": ["1"], "Notes": ""})),
        ];

        let summary = compute("Survey", &survey_fields(), &responses);

        assert_eq!(summary.form_name, "Survey");
        assert_eq!(summary.total_blocks, 3);
        assert_eq!(summary.filled_counts["Block"], 2);
        assert_eq!(summary.filled_counts["Notes"], 1);
        assert_eq!(summary.responded_block_numbers.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(summary.block_details.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        let block_one: Vec<i64> = summary.block_details[&1].iter().map(|d| d.response_id).collect();
        assert_eq!(block_one, vec![1, 2]);
        let second = &summary.block_details[&1][1];
        assert_eq!(second.user_id, 11);
        assert_eq!(second.user_display_name, "B");
        assert_eq!(second.created_at, day(2));
        assert_eq!(summary.block_details[&2].len(), 1);
        assert!(summary.block_details[&3].is_empty());

        assert_eq!(summary.duplicated_blocks(), vec![1]);
        assert_eq!(summary.missing_blocks(), vec![3]);
    }

    #[test]
    fn no_responses_seeds_every_label_and_block() {
        let summary = compute("Survey", &survey_fields(), &[]);

        assert_eq!(summary.filled_counts.len(), 2);
        assert!(summary.filled_counts.values().all(|count| *count == 0));
        assert!(summary.responded_block_numbers.is_empty());
        assert_eq!(summary.block_details.len(), 3);
        assert!(summary.block_details.values().all(Vec::is_empty));
        assert!(summary.duplicated_blocks().is_empty());
    }

    #[test]
    fn empty_form_is_valid() {
        let responses = vec![response(1, 10, "A", day(1), json!({"Stray": "value"}))];

        let summary = compute("Empty", &[], &responses);

        assert_eq!(summary.total_blocks, 0);
        assert!(summary.filled_counts.is_empty());
        assert!(summary.responded_block_numbers.is_empty());
        assert!(summary.block_details.is_empty());
    }

    #[test]
    fn form_without_block_field_still_counts_other_fields() {
        let fields = vec![
            field(1, "Crop", FieldType::Radio, &["Maize", "Rice"]),
            // Same label, wrong type: not a block field
            field(2, "Block", FieldType::Text, &[]),
        ];
        let responses = vec![
            response(1, 10, "A", day(1), json!({"Crop": "Maize", "Block": "4"})),
            response(2, 11, "B", day(2), json!({"Crop": null})),
        ];

        let summary = compute("Crops", &fields, &responses);

        assert_eq!(summary.total_blocks, 0);
        assert!(summary.responded_block_numbers.is_empty());
        assert!(summary.block_details.is_empty());
        assert_eq!(summary.filled_counts["Crop"], 1);
        assert_eq!(summary.filled_counts["Block"], 1);
    }

    #[test]
    fn single_selection_adds_one_detail() {
        let fields = vec![field(1, "Block", FieldType::Checkbox, &["4", "5", "6"])];
        let responses = vec![response(7, 3, "Ravi", day(5), json!({"Block": ["5"]}))];

        let summary = compute("Survey", &fields, &responses);

        assert!(summary.responded_block_numbers.contains(&5));
        assert_eq!(
            summary.block_details[&5],
            vec![BlockResponseDetail {
                response_id: 7,
                user_id: 3,
                user_display_name: "Ravi".to_string(),
                created_at: day(5),
            }]
        );
        assert!(summary.duplicated_blocks().is_empty());
    }

    #[test]
    fn empty_block_selection_is_not_filled() {
        let responses = vec![response(1, 10, "A", day(1), json!({"Block": [], "Notes": null}))];

        let summary = compute("Survey", &survey_fields(), &responses);

        assert_eq!(summary.filled_counts["Block"], 0);
        assert_eq!(summary.filled_counts["Notes"], 0);
        assert!(summary.responded_block_numbers.is_empty());
    }

    #[test]
    fn non_numeric_options_are_skipped() {
        let fields = vec![field(1, "Block", FieldType::Checkbox, &["1", "x", "3"])];

        let summary = compute("Survey", &fields, &[]);

        assert_eq!(summary.total_blocks, 2);
        assert_eq!(summary.block_details.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn malformed_selections_are_skipped_but_still_filled() {
        let responses = vec![
            response(1, 10, "A", day(1), json!({"Block": ["abc", "2", 3, true]})),
            response(2, 11, "B", day(2), json!({"Block": "2"})),
        ];

        let summary = compute("Survey", &survey_fields(), &responses);

        assert_eq!(summary.responded_block_numbers.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(summary.block_details[&2].len(), 1);
        assert_eq!(summary.block_details[&3].len(), 1);
        // A non-list Block answer is still a non-empty value
        assert_eq!(summary.filled_counts["Block"], 2);
    }

    #[test]
    fn selection_outside_options_gets_its_own_entry() {
        let responses = vec![response(1, 10, "A", day(1), json!({"Block": ["9"]}))];

        let summary = compute("Survey", &survey_fields(), &responses);

        assert_eq!(summary.total_blocks, 3);
        assert_eq!(summary.block_details[&9].len(), 1);
        assert!(summary.responded_block_numbers.contains(&9));
    }

    #[test]
    fn second_block_field_is_ignored() {
        let fields = vec![
            field(1, "Block", FieldType::Checkbox, &["1", "2"]),
            field(2, "Block", FieldType::Checkbox, &["1", "2", "3", "4"]),
        ];
        let responses = vec![response(1, 10, "A", day(1), json!({"Block": ["2"]}))];

        let summary = compute("Survey", &fields, &responses);

        assert_eq!(summary.total_blocks, 2);
        assert_eq!(summary.block_details[&2].len(), 1);
        assert_eq!(summary.filled_counts["Block"], 1);
        assert_eq!(summary.filled_counts.len(), 1);
    }

    #[test]
    fn responded_blocks_are_sorted_regardless_of_order() {
        let fields = vec![field(1, "Block", FieldType::Checkbox, &["1", "2", "3", "10"])];
        let responses = vec![
            response(1, 10, "A", day(1), json!({"Block": ["10", "3"]})),
            response(2, 11, "B", day(2), json!({"Block": ["2", "10"]})),
        ];

        let summary = compute("Survey", &fields, &responses);

        assert_eq!(summary.responded_block_numbers.iter().copied().collect::<Vec<_>>(), vec![2, 3, 10]);
        assert_eq!(summary.duplicated_blocks(), vec![10]);
        assert_eq!(summary.missing_blocks(), vec![1]);
    }

    #[test]
    fn is_filled_rules() {
        assert!(!is_filled(&Value::Null));
        assert!(!is_filled(&json!("")));
        assert!(!is_filled(&json!([])));
        assert!(is_filled(&json!(" ")));
        assert!(is_filled(&json!(0)));
        assert!(is_filled(&json!(false)));
        assert!(is_filled(&json!({})));
        assert!(is_filled(&json!([""])));
    }
}
