//! Field validation
//!
//! Applies the constraints a host field declares (required, max length,
//! choices) to a value and collects the messages into a field-keyed
//! [`ValidationError`].

pub mod validators;

use crate::core::error::ValidationError;
use crate::core::field::FieldValue;
use crate::core::host::HostField;

/// Check one value against the constraints declared on `field`
///
/// Many-to-many fields are skipped: their association set lives outside the
/// instance and is validated by the relation itself.
pub fn validate_field(field: &HostField, value: Option<&FieldValue>, errors: &mut ValidationError) {
    if field.is_many_to_many() {
        return;
    }

    let value = value.unwrap_or(&FieldValue::Null);

    // Generated keys are filled in by the store
    if field.is_required() && !field.auto_created {
        if let Err(message) = validators::required()(&field.name, value) {
            errors.add(&field.name, message);
            return;
        }
    }

    if let Some(max) = field.max_length {
        if let Err(message) = validators::max_length(max)(&field.name, value) {
            errors.add(&field.name, message);
        }
    }

    if let Some(choices) = &field.choices {
        if let Err(message) = validators::in_choices(choices.clone())(&field.name, value) {
            errors.add(&field.name, message);
        }
    }
}
