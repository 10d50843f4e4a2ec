//! Schema validation
//!
//! Checks a resource instance against its declared constraints before it is
//! expanded, and fills in declared defaults. Every problem is collected so the
//! caller can report them all at once.

use super::registry::{AttrKind, Attribute, Validation};
use super::state::{ResourceData, StateError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// A single constraint violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("{0}: required attribute is not set")]
    Missing(String),
    #[error("{path}: expected a value between {min} and {max}, got {value}")]
    OutOfRange {
        path: String,
        min: i64,
        max: i64,
        value: i64,
    },
    #[error("{path}: expected length between {min} and {max}, got {len}")]
    BadLength {
        path: String,
        min: usize,
        max: usize,
        len: usize,
    },
    #[error("{path}: expected one of [{allowed}], got {value:?}")]
    NotAllowed {
        path: String,
        allowed: String,
        value: String,
    },
}

fn check_rule(path: &str, rule: &Validation, value: &Value, errors: &mut Vec<ValidationError>) {
    match (rule, value) {
        (Validation::IntBetween(min, max), Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                if v < *min || v > *max {
                    errors.push(ValidationError::OutOfRange {
                        path: path.to_string(),
                        min: *min,
                        max: *max,
                        value: v,
                    });
                }
            }
        }
        (Validation::StringLenBetween(min, max), Value::String(s)) => {
            let len = s.chars().count();
            if len < *min || len > *max {
                errors.push(ValidationError::BadLength {
                    path: path.to_string(),
                    min: *min,
                    max: *max,
                    len,
                });
            }
        }
        (Validation::StringInSlice(allowed), Value::String(s)) => {
            if !allowed.iter().any(|a| a == s) {
                errors.push(ValidationError::NotAllowed {
                    path: path.to_string(),
                    allowed: allowed.join(", "),
                    value: s.clone(),
                });
            }
        }
        _ => {}
    }
}

fn check_value(path: &str, attr: &Attribute, value: &Value, errors: &mut Vec<ValidationError>) {
    match attr.kind {
        AttrKind::String | AttrKind::Int => {
            if let Some(rule) = &attr.validate {
                check_rule(path, rule, value, errors);
            }
        }
        AttrKind::List => {
            if let (Some(rule), Value::Array(items)) = (&attr.validate, value) {
                for (i, item) in items.iter().enumerate() {
                    check_rule(&format!("{}.{}", path, i), rule, item, errors);
                }
            }
        }
        AttrKind::Table | AttrKind::Complex => {
            let Value::Array(rows) = value else {
                return;
            };
            for (i, row) in rows.iter().enumerate() {
                let prefix = format!("{}.{}", path, i);
                let fields = row.as_object();
                check_block(&prefix, &attr.elem, fields, errors);
            }
        }
    }
}

fn check_block(
    prefix: &str,
    attrs: &BTreeMap<String, Attribute>,
    fields: Option<&Map<String, Value>>,
    errors: &mut Vec<ValidationError>,
) {
    for (name, attr) in attrs {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };

        match fields.and_then(|f| f.get(name)).filter(|v| !v.is_null()) {
            Some(value) => check_value(&path, attr, value, errors),
            None if attr.required => errors.push(ValidationError::Missing(path)),
            None => {}
        }
    }
}

/// Validate every attribute of a resource instance
pub fn validate(d: &ResourceData) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_block("", &d.resource().attributes, Some(d.attributes()), &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn fill_defaults(attrs: &BTreeMap<String, Attribute>, fields: &mut Map<String, Value>) {
    for (name, attr) in attrs {
        match fields.get_mut(name) {
            None | Some(Value::Null) => {
                if let Some(default) = &attr.default {
                    fields.insert(name.clone(), default.clone());
                }
            }
            Some(Value::Array(rows)) if attr.is_nested() => {
                for row in rows.iter_mut() {
                    if let Value::Object(sub) = row {
                        fill_defaults(&attr.elem, sub);
                    }
                }
            }
            Some(_) => {}
        }
    }
}

/// Fill in declared defaults for every unset attribute, nested rows included
pub fn apply_defaults(d: &mut ResourceData) -> Result<(), StateError> {
    let resource = d.resource();
    let mut fields = d.attributes().clone();
    fill_defaults(&resource.attributes, &mut fields);

    for (name, value) in fields {
        if d.attributes().get(&name) != Some(&value) {
            d.set(&name, value)?;
        }
    }
    Ok(())
}
