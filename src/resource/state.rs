//! Resource state
//!
//! `ResourceData` is the attribute tree of one resource instance together with
//! its ID, bound to the schema it was declared with. Nested blocks are arrays
//! of objects; a complex block is a one-element array.

use super::registry::{AttrKind, Attribute, ResourceDef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised when a value does not fit the declared schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{0}: attribute is not declared")]
    UnknownAttribute(String),
    #[error("{path}: expected {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: String,
    },
    #[error("{path}: at most {max} element(s) allowed, got {found}")]
    TooManyItems {
        path: String,
        max: usize,
        found: usize,
    },
}

/// Serialized form of a resource instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// One resource instance: ID plus attribute tree
#[derive(Debug, Clone)]
pub struct ResourceData {
    resource: &'static ResourceDef,
    id: String,
    attributes: Map<String, Value>,
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(a) => format!("list of {}", a.len()),
        Value::Object(_) => "object".to_string(),
    }
}

/// Check that `value` has the shape `attr` declares. Null is always accepted.
pub(crate) fn check_type(path: &str, attr: &Attribute, value: &Value) -> Result<(), StateError> {
    let mismatch = || StateError::TypeMismatch {
        path: path.to_string(),
        expected: attr.kind.as_str(),
        found: describe(value),
    };

    match (attr.kind, value) {
        (_, Value::Null) => Ok(()),
        (AttrKind::String, Value::String(_)) => Ok(()),
        (AttrKind::Int, Value::Number(n)) if n.is_i64() => Ok(()),
        (AttrKind::List, Value::Array(items)) => {
            if items.iter().all(|v| v.is_string()) {
                Ok(())
            } else {
                Err(mismatch())
            }
        }
        (AttrKind::Table | AttrKind::Complex, Value::Array(rows)) => {
            if let Some(max) = attr.max_items {
                if rows.len() > max {
                    return Err(StateError::TooManyItems {
                        path: path.to_string(),
                        max,
                        found: rows.len(),
                    });
                }
            }
            for (i, row) in rows.iter().enumerate() {
                let Value::Object(fields) = row else {
                    return Err(mismatch());
                };
                for (name, field) in fields {
                    let field_path = format!("{}.{}.{}", path, i, name);
                    let Some(sub) = attr.elem.get(name) else {
                        return Err(StateError::UnknownAttribute(field_path));
                    };
                    check_type(&field_path, sub, field)?;
                }
            }
            Ok(())
        }
        _ => Err(mismatch()),
    }
}

/// Terraform's notion of a "set" value: present and not the zero value
fn is_non_zero(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

impl ResourceData {
    /// Empty instance of a resource
    pub fn new(resource: &'static ResourceDef) -> Self {
        Self {
            resource,
            id: String::new(),
            attributes: Map::new(),
        }
    }

    /// Build an instance from a state document, checking every attribute's shape
    pub fn from_document(
        resource: &'static ResourceDef,
        doc: StateDocument,
    ) -> Result<Self, StateError> {
        let mut data = Self::new(resource);
        data.id = doc.id;
        for (key, value) in doc.attributes {
            data.set(&key, value)?;
        }
        Ok(data)
    }

    pub fn to_document(&self) -> StateDocument {
        StateDocument {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
        }
    }

    pub fn resource(&self) -> &'static ResourceDef {
        self.resource
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// An empty ID tells the caller the resource no longer exists
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Look up a dotted, index-qualified path such as `srcintf.0.name`
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.attributes.get(parts.next()?)?;

        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                Value::Object(fields) => fields.get(part)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Value at `path` if it is set to something other than its zero value
    pub fn get_ok(&self, path: &str) -> Option<&Value> {
        self.get(path).filter(|v| is_non_zero(v))
    }

    /// Value at `path` if it is present at all, zero values included
    pub fn get_ok_exists(&self, path: &str) -> Option<&Value> {
        self.get(path).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Set a top-level attribute. Null removes it.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), StateError> {
        let Some(attr) = self.resource.attributes.get(key) else {
            return Err(StateError::UnknownAttribute(key.to_string()));
        };
        check_type(key, attr, &value)?;

        if value.is_null() {
            self.attributes.remove(key);
        } else {
            self.attributes.insert(key.to_string(), value);
        }
        Ok(())
    }
}
