//! Reusable field validators
//!
//! Used by stores in `full_clean` and by the converter for String
//! constraints. Each validator only judges the values it understands and
//! lets everything else through.

use crate::core::field::FieldValue;

/// Validator: a value must be present and not blank
pub fn required() -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    |_: &str, value: &FieldValue| {
        let blank = match value {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            _ => false,
        };
        if blank {
            Err("This field cannot be blank.".to_string())
        } else {
            Ok(())
        }
    }
}

/// Validator: string must not exceed `max` characters
pub fn max_length(max: usize) -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |_: &str, value: &FieldValue| {
        if let FieldValue::String(s) = value {
            let len = s.chars().count();
            if len > max {
                return Err(format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    max, len
                ));
            }
        }
        Ok(())
    }
}

/// Validator: value must be one of the declared choices
pub fn in_choices(
    allowed: Vec<FieldValue>,
) -> impl Fn(&str, &FieldValue) -> Result<(), String> + Send + Sync + Clone {
    move |_: &str, value: &FieldValue| {
        if value.is_null() || allowed.contains(value) {
            Ok(())
        } else {
            Err(format!("Value '{}' is not a valid choice.", value))
        }
    }
}
