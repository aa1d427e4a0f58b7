use std::collections::BTreeMap;

use quill_core::QuillError;
use serde_json::{json, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "length" => Some("has invalid length"),
        "range" => Some("is out of range"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn collect(out: &mut BTreeMap<String, Vec<String>>, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(str::to_string))
                        .unwrap_or_else(|| e.code.to_string());
                    out.entry(key.clone()).or_default().push(msg);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                collect(out, &join_path(prefix, field), nested.as_ref());
            }
            ValidationErrorsKind::List(items) => {
                let base = join_path(prefix, field);
                for (idx, nested) in items {
                    collect(out, &format!("{base}[{idx}]"), nested.as_ref());
                }
            }
        }
    }
}

/// Field-keyed error map, e.g. `{"filename": ["has invalid length"]}`
pub fn validation_errors_to_json(errs: &ValidationErrors) -> Value {
    let mut out = BTreeMap::new();
    collect(&mut out, "", errs);
    json!(out)
}

/// Run `validator` rules, mapping failures to a 422 with per-field errors
pub fn validate_body<T: Validate>(body: &T) -> Result<(), QuillError> {
    body.validate().map_err(|e| {
        QuillError::unprocessable("Invalid request body").with_errors(validation_errors_to_json(&e))
    })
}
