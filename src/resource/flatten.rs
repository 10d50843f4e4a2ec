//! Flatten: wire → state
//!
//! The inverse of [`super::expand`]. A CMDB object is converted back into the
//! attribute tree, tables are ordered according to `dynamic_sort_subtable`, and
//! complex blocks are wrapped in one-element lists.

use super::naming::api_field;
use super::registry::{AttrKind, Attribute, DYNAMIC_SORT_SUBTABLE, GET_ALL_TABLES};
use super::sort::{sort_table, SortMode};
use super::state::{ResourceData, StateError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Copy a device response into state. A field the device does not send
/// (older or newer firmware) flattens to null and clears the attribute; only a
/// field that is present with the wrong shape is an error.
pub fn refresh_object(d: &mut ResourceData, o: &Map<String, Value>) -> Result<(), StateError> {
    let get_all_tables = d.get_str(GET_ALL_TABLES) == Some("true");
    let mode = SortMode::from_setting(d.get_str(DYNAMIC_SORT_SUBTABLE));

    for (name, attr) in d.resource().api_attributes() {
        if attr.sensitive {
            continue;
        }
        if attr.is_nested() && !get_all_tables && d.get_ok(name).is_none() {
            continue;
        }

        let wire = o.get(&api_field(name, attr));
        if wire.is_none() {
            tracing::debug!("{} missing from response", name);
        }
        let value = flatten_value(d, name, attr, wire, mode);
        d.set(name, value)?;
    }

    Ok(())
}

fn flatten_value(
    d: &ResourceData,
    pre: &str,
    attr: &Attribute,
    wire: Option<&Value>,
    mode: SortMode,
) -> Value {
    let Some(v) = wire.filter(|v| !v.is_null()) else {
        return Value::Null;
    };

    match attr.kind {
        AttrKind::String => match v {
            Value::Number(n) => Value::String(n.to_string()),
            other => other.clone(),
        },
        AttrKind::Int => match v {
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| v.clone()),
            other => other.clone(),
        },
        AttrKind::List => match v {
            Value::String(s) => s.split_whitespace().map(Value::from).collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Number(n) => Value::String(n.to_string()),
                    other => other.clone(),
                })
                .collect(),
            other => other.clone(),
        },
        AttrKind::Table => flatten_table(d, pre, attr, v, mode),
        AttrKind::Complex => {
            let block = match v {
                Value::Object(fields) => fields,
                Value::Array(items) => match items.first() {
                    Some(Value::Object(fields)) => fields,
                    _ => return Value::Null,
                },
                _ => return Value::Null,
            };
            let flat = flatten_block(d, &format!("{}.0", pre), &attr.elem, block, mode);
            Value::Array(vec![Value::Object(flat)])
        }
    }
}

/// Split a legacy quoted-name string back into `{name}` rows
pub fn decode_legacy_names(s: &str) -> Vec<Value> {
    let names: Vec<&str> = if s.contains('"') {
        s.split('"')
            .skip(1)
            .step_by(2)
            .filter(|n| !n.is_empty())
            .collect()
    } else {
        s.split_whitespace().collect()
    };

    names
        .into_iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect()
}

fn flatten_table(
    d: &ResourceData,
    pre: &str,
    attr: &Attribute,
    v: &Value,
    mode: SortMode,
) -> Value {
    let mut result = match v {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(con, item)| {
                let row = item.as_object()?;
                let row_pre = format!("{}.{}", pre, con);
                Some(Value::Object(flatten_block(d, &row_pre, &attr.elem, row, mode)))
            })
            .collect::<Vec<_>>(),
        Value::String(s) if attr.legacy_string_before.is_some() => decode_legacy_names(s),
        _ => {
            tracing::debug!("{}: expected a list from the API, got {}", pre, v);
            return Value::Null;
        }
    };

    if let Some(key) = &attr.sort_key {
        sort_table(&mut result, key, mode);
    }
    Value::Array(result)
}

fn flatten_block(
    d: &ResourceData,
    row_pre: &str,
    elem: &BTreeMap<String, Attribute>,
    row: &Map<String, Value>,
    mode: SortMode,
) -> Map<String, Value> {
    let mut tmp = Map::new();

    for (name, sub) in elem {
        let pre_append = format!("{}.{}", row_pre, name);

        // The device only ever returns an encrypted placeholder
        if sub.sensitive {
            if let Some(current) = d.get_ok(&pre_append) {
                tmp.insert(name.clone(), current.clone());
            }
            continue;
        }

        let value = flatten_value(d, &pre_append, sub, row.get(&api_field(name, sub)), mode);
        if !value.is_null() {
            tmp.insert(name.clone(), value);
        }
    }

    tmp
}
