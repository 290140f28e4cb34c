use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::models::form::{FieldType, FormField};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct SchemaErrors(Vec<SchemaViolation>);

impl SchemaErrors {
    pub fn violations(&self) -> &[SchemaViolation] {
        &self.0
    }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| match &v.field {
                Some(field) => format!("{}: {}", field, v.message),
                None => v.message.clone(),
            })
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

pub struct SchemaService;

impl SchemaService {
    /// Checks a field list before it is saved. All violations are reported at once.
    pub fn validate(fields: &[FormField]) -> std::result::Result<(), SchemaErrors> {
        let mut violations = Vec::new();
        let mut push = |field: Option<&str>, message: String| {
            violations.push(SchemaViolation {
                field: field.map(str::to_string),
                message,
            });
        };

        if fields.is_empty() {
            push(None, "A form needs at least one field".into());
        }

        let mut names = HashSet::new();
        let mut orders = HashSet::new();
        for field in fields {
            let name = field.name.as_str();
            if !is_identifier(name) {
                push(
                    Some(name),
                    "Field names must start with a letter or underscore and contain only letters, digits and underscores".into(),
                );
            }
            if !names.insert(name) {
                push(Some(name), "Field names must be unique".into());
            }
            if !orders.insert(field.display_order) {
                push(
                    Some(name),
                    format!("Display order {} is used by more than one field", field.display_order),
                );
            }
            if field.label.trim().is_empty() {
                push(Some(name), "Label must not be empty".into());
            }
            if let (Some(min), Some(max)) = (field.min_length, field.max_length) {
                if min > max {
                    push(Some(name), "min_length exceeds max_length".into());
                }
            }
            if let (Some(min), Some(max)) = (field.min_value, field.max_value) {
                if min > max {
                    push(Some(name), "min_value exceeds max_value".into());
                }
            }
            if let Some(pattern) = field.pattern.as_deref().filter(|p| !p.is_empty()) {
                if let Err(e) = Regex::new(pattern) {
                    push(Some(name), format!("Invalid pattern: {}", e));
                }
            }

            match (field.autofill, field.autofill_attribute) {
                (true, None) => push(
                    Some(name),
                    "Autofill is enabled but no identity attribute is mapped".into(),
                ),
                (_, Some(attribute)) if !attribute.accepts(field.field_type) => push(
                    Some(name),
                    format!("Identity attribute {:?} cannot fill a {:?} field", attribute, field.field_type),
                ),
                _ => {}
            }

            match field.field_type {
                FieldType::Select => {
                    if field.options.is_empty() {
                        push(Some(name), "A select field needs at least one option".into());
                    }
                    let mut values = HashSet::new();
                    for option in &field.options {
                        if !values.insert(option.value()) {
                            push(Some(name), format!("Duplicate option '{}'", option.value()));
                        }
                    }
                    if let Some(default) = field.default_value.as_deref().filter(|d| !d.is_empty()) {
                        if !field.options.iter().any(|o| o.matches(default)) {
                            push(Some(name), "Default value is not one of the options".into());
                        }
                    }
                }
                FieldType::Number => {
                    if let Some(default) = field.default_value.as_deref().filter(|d| !d.is_empty()) {
                        if default.trim().parse::<f64>().is_err() {
                            push(Some(name), "Default value is not a number".into());
                        }
                    }
                }
                FieldType::FileUpload => {
                    if field.max_file_size_mb == Some(0) {
                        push(Some(name), "max_file_size_mb must be positive".into());
                    }
                }
                _ => {}
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaErrors(violations))
        }
    }

    /// Keeps ids of persisted fields and numbers new ones from `next_id`.
    /// Returns the next free id.
    pub fn assign_field_ids(fields: &mut [FormField], next_id: i32) -> i32 {
        let mut next = fields
            .iter()
            .filter_map(|f| f.id)
            .map(|id| id + 1)
            .fold(next_id.max(1), i32::max);
        for field in fields.iter_mut().filter(|f| f.id.is_none()) {
            field.id = Some(next);
            next += 1;
        }
        next
    }

    /// Fields in ascending display order.
    pub fn sorted(fields: &[FormField]) -> Vec<FormField> {
        let mut sorted = fields.to_vec();
        sorted.sort_by_key(|f| f.display_order);
        sorted
    }

    /// Swaps a field with its neighbour in display order. The returned list is sorted,
    /// and exactly the two display orders involved are exchanged.
    pub fn move_field(fields: &[FormField], field_id: i32, direction: Direction) -> Result<Vec<FormField>> {
        let mut sorted = Self::sorted(fields);
        let index = sorted
            .iter()
            .position(|f| f.id == Some(field_id))
            .ok_or_else(|| Error::NotFound(format!("Field {} not found", field_id)))?;

        let neighbour = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < sorted.len() => index + 1,
            _ => {
                return Err(Error::BadRequest(format!(
                    "Field {} cannot move {:?}",
                    field_id, direction
                )))
            }
        };

        let order_a = sorted[index].display_order;
        let order_b = sorted[neighbour].display_order;
        sorted[index].display_order = order_b;
        sorted[neighbour].display_order = order_a;
        sorted.swap(index, neighbour);
        Ok(sorted)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::form::{IdentityAttribute, SelectOption};

    fn field(name: &str, field_type: FieldType, order: i32) -> FormField {
        FormField::new(name, field_type, name, order)
    }

    fn messages(err: &SchemaErrors) -> Vec<String> {
        err.violations().iter().map(|v| v.message.clone()).collect()
    }

    #[test]
    fn duplicate_email_fields_are_rejected() {
        let fields = vec![field("email", FieldType::Email, 0), field("email", FieldType::Email, 1)];
        let err = SchemaService::validate(&fields).unwrap_err();
        assert!(messages(&err).iter().any(|m| m.contains("unique")));
    }

    #[test]
    fn empty_field_list_is_rejected() {
        let err = SchemaService::validate(&[]).unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert!(err.violations()[0].field.is_none());
    }

    #[test]
    fn field_names_must_be_identifiers() {
        let fields = vec![
            field("first name", FieldType::Text, 0),
            field("1st", FieldType::Text, 1),
            field("_ok_2", FieldType::Text, 2),
        ];
        let err = SchemaService::validate(&fields).unwrap_err();
        let offending: Vec<_> = err.violations().iter().filter_map(|v| v.field.clone()).collect();
        assert_eq!(offending, vec!["first name".to_string(), "1st".to_string()]);
    }

    #[test]
    fn duplicate_display_order_is_rejected() {
        let fields = vec![field("a", FieldType::Text, 4), field("b", FieldType::Text, 4)];
        assert!(SchemaService::validate(&fields).is_err());
    }

    #[test]
    fn non_contiguous_orders_are_fine() {
        let fields = vec![field("a", FieldType::Text, 10), field("b", FieldType::Text, 3)];
        assert!(SchemaService::validate(&fields).is_ok());
    }

    #[test]
    fn unmapped_autofill_is_rejected() {
        let mut f = field("contact", FieldType::Text, 0);
        f.autofill = true;
        assert!(SchemaService::validate(&[f.clone()]).is_err());

        f.autofill_attribute = Some(IdentityAttribute::Name);
        assert!(SchemaService::validate(&[f]).is_ok());
    }

    #[test]
    fn mismatched_autofill_attribute_is_rejected() {
        let mut f = field("age", FieldType::Number, 0);
        f.autofill = true;
        f.autofill_attribute = Some(IdentityAttribute::Email);
        assert!(SchemaService::validate(&[f]).is_err());
    }

    #[test]
    fn select_needs_options_and_a_matching_default() {
        let mut f = field("choice", FieldType::Select, 0);
        assert!(SchemaService::validate(&[f.clone()]).is_err());

        f.options = vec![SelectOption::Plain("A".into()), SelectOption::Plain("B".into())];
        f.default_value = Some("C".into());
        assert!(SchemaService::validate(&[f.clone()]).is_err());

        f.default_value = Some("B".into());
        assert!(SchemaService::validate(&[f]).is_ok());
    }

    #[test]
    fn bounds_and_pattern_are_checked() {
        let mut f = field("code", FieldType::Text, 0);
        f.min_length = Some(5);
        f.max_length = Some(2);
        f.pattern = Some("([a-z".into());
        let err = SchemaService::validate(&[f]).unwrap_err();
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn ids_are_kept_and_new_ones_follow_the_sequence() {
        let mut fields = vec![field("a", FieldType::Text, 0), field("b", FieldType::Text, 1)];
        fields[0].id = Some(7);
        let next = SchemaService::assign_field_ids(&mut fields, 3);
        assert_eq!(fields[0].id, Some(7));
        assert_eq!(fields[1].id, Some(8));
        assert_eq!(next, 9);
    }

    fn ordered_fields() -> Vec<FormField> {
        let mut fields = vec![
            field("a", FieldType::Text, 10),
            field("b", FieldType::Text, 20),
            field("c", FieldType::Text, 30),
        ];
        SchemaService::assign_field_ids(&mut fields, 1);
        fields
    }

    #[test]
    fn moving_up_swaps_exactly_two_orders() {
        let fields = ordered_fields();
        let moved = SchemaService::move_field(&fields, 3, Direction::Up).unwrap();

        let names: Vec<_> = moved.iter().map(|f| f.name.as_str()).collect();
        let orders: Vec<_> = moved.iter().map(|f| f.display_order).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
        assert_eq!(orders, vec![10, 20, 30]);

        let before: HashSet<_> = fields.iter().map(|f| f.name.clone()).collect();
        let after: HashSet<_> = moved.iter().map(|f| f.name.clone()).collect();
        assert_eq!(before, after);

        let changed = fields
            .iter()
            .filter(|f| {
                moved
                    .iter()
                    .find(|m| m.id == f.id)
                    .map(|m| m.display_order != f.display_order)
                    .unwrap_or(true)
            })
            .count();
        assert_eq!(changed, 2);
    }

    #[test]
    fn moving_past_the_edges_fails() {
        let fields = ordered_fields();
        assert!(SchemaService::move_field(&fields, 1, Direction::Up).is_err());
        assert!(SchemaService::move_field(&fields, 3, Direction::Down).is_err());
        assert!(matches!(
            SchemaService::move_field(&fields, 99, Direction::Down),
            Err(Error::NotFound(_))
        ));
    }
}
