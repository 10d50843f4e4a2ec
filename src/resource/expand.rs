//! Expand: state → wire
//!
//! Walks a resource instance following its schema and builds the JSON object
//! the CMDB API expects. Existence checks go through index-qualified paths
//! (`srcintf.0.name`) so zero values inside rows are handled the same way as
//! at the top level.

use super::naming::api_field;
use super::registry::{AttrKind, Attribute};
use super::state::{ResourceData, StateError};
use crate::forti::version::DeviceVersion;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Build the wire object for a resource instance
pub fn get_object(
    d: &ResourceData,
    sv: Option<&DeviceVersion>,
) -> Result<Map<String, Value>, StateError> {
    let mut obj = Map::new();

    for (name, attr) in d.resource().api_attributes() {
        if attr.is_computed_only() {
            continue;
        }
        let field = api_field(name, attr);

        if attr.kind == AttrKind::Table {
            let value = match d.get_ok(name) {
                Some(v) => expand_table(d, name, attr, v, sv)?,
                None => Value::Array(Vec::new()),
            };
            obj.insert(field, value);
        } else if let Some(v) = present(d, name, attr) {
            obj.insert(field, expand_value(d, name, attr, v, sv)?);
        }
    }

    Ok(obj)
}

/// Integers are meaningful at zero; everything else must be non-empty
fn present<'a>(d: &'a ResourceData, path: &str, attr: &Attribute) -> Option<&'a Value> {
    match attr.kind {
        AttrKind::Int => d.get_ok_exists(path),
        _ => d.get_ok(path),
    }
}

fn rows<'a>(path: &str, attr: &Attribute, v: &'a Value) -> Result<&'a Vec<Value>, StateError> {
    v.as_array().ok_or_else(|| StateError::TypeMismatch {
        path: path.to_string(),
        expected: attr.kind.as_str(),
        found: "non-list value".to_string(),
    })
}

fn expand_value(
    d: &ResourceData,
    pre: &str,
    attr: &Attribute,
    v: &Value,
    sv: Option<&DeviceVersion>,
) -> Result<Value, StateError> {
    match attr.kind {
        AttrKind::String | AttrKind::Int | AttrKind::List => Ok(v.clone()),
        AttrKind::Table => expand_table(d, pre, attr, v, sv),
        AttrKind::Complex => {
            rows(pre, attr, v)?;
            let block = expand_block(d, &format!("{}.0", pre), &attr.elem, sv)?;
            Ok(Value::Object(block))
        }
    }
}

fn uses_legacy_string(attr: &Attribute, sv: Option<&DeviceVersion>) -> bool {
    match (attr.legacy_string_before.as_deref(), sv) {
        (Some(threshold), Some(sv)) => sv.is_older_than(threshold),
        _ => false,
    }
}

/// Older firmware takes a list of names as one string: `"a" "b"`
pub fn encode_legacy_names(rows: &[Value]) -> String {
    rows.iter()
        .filter_map(|row| row.get("name").and_then(|n| n.as_str()))
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(" ")
}

fn expand_table(
    d: &ResourceData,
    pre: &str,
    attr: &Attribute,
    v: &Value,
    sv: Option<&DeviceVersion>,
) -> Result<Value, StateError> {
    let items = rows(pre, attr, v)?;

    if uses_legacy_string(attr, sv) {
        return Ok(Value::String(encode_legacy_names(items)));
    }

    let mut result = Vec::with_capacity(items.len());
    for i in 0..items.len() {
        let row_pre = format!("{}.{}", pre, i);
        result.push(Value::Object(expand_block(d, &row_pre, &attr.elem, sv)?));
    }
    Ok(Value::Array(result))
}

fn expand_block(
    d: &ResourceData,
    row_pre: &str,
    elem: &BTreeMap<String, Attribute>,
    sv: Option<&DeviceVersion>,
) -> Result<Map<String, Value>, StateError> {
    let mut tmp = Map::new();

    for (name, sub) in elem {
        if sub.is_computed_only() {
            continue;
        }
        let pre_append = format!("{}.{}", row_pre, name);
        if let Some(v) = present(d, &pre_append, sub) {
            tmp.insert(api_field(name, sub), expand_value(d, &pre_append, sub, v, sv)?);
        }
    }

    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::registry::get_resource;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn data(key: &str, attrs: Value) -> ResourceData {
        let mut d = ResourceData::new(get_resource(key).unwrap());
        for (k, v) in attrs.as_object().unwrap() {
            d.set(k, v.clone()).unwrap();
        }
        d
    }

    #[test]
    fn test_srcintf_expands_to_name_maps() {
        let d = data(
            "firewall_policy6",
            json!({"srcintf": [{"name": "port1"}, {"name": "port2"}]}),
        );
        let obj = get_object(&d, None).unwrap();
        assert_eq!(obj["srcintf"], json!([{"name": "port1"}, {"name": "port2"}]));
    }

    #[test]
    fn test_absent_tables_become_empty_lists() {
        let d = data("firewall_policy6", json!({"schedule": "always"}));
        let obj = get_object(&d, None).unwrap();
        assert_eq!(obj["service"], json!([]));
        assert_eq!(obj["users"], json!([]));
        assert_eq!(obj["schedule"], json!("always"));
    }

    #[test]
    fn test_zero_values() {
        let d = data(
            "firewall_policy6",
            json!({"name": "", "vlan_cos_fwd": 0, "dynamic_sort_subtable": "true"}),
        );
        let obj = get_object(&d, None).unwrap();
        assert!(!obj.contains_key("name"));
        assert_eq!(obj["vlan-cos-fwd"], json!(0));
        assert!(!obj.contains_key("dynamic-sort-subtable"));
    }

    #[test]
    fn test_complex_block_expands_to_object() {
        let d = data(
            "extension_controller_extender_profile",
            json!({
                "name": "lte",
                "fosid": 7,
                "cellular": [{
                    "controller_report": [{"status": "enable", "signal_threshold": 10}],
                    "sms_notification": [{
                        "receiver": [{"name": "ops", "phone_number": "+15550100", "status": ""}]
                    }]
                }]
            }),
        );
        let obj = get_object(&d, None).unwrap();
        assert_eq!(obj["id"], json!(7));
        assert_eq!(
            obj["cellular"],
            json!({
                "controller-report": {"status": "enable", "signal-threshold": 10},
                "sms-notification": {
                    "receiver": [{"name": "ops", "phone-number": "+15550100"}]
                }
            })
        );
        assert!(!obj.contains_key("fosid"));
    }

    #[test]
    fn test_nested_tables_keep_order() {
        let d = data(
            "firewall_address",
            json!({"name": "web", "tagging": [
                {"name": "t2", "tags": [{"name": "z"}, {"name": "a"}]},
                {"name": "t1"}
            ]}),
        );
        let obj = get_object(&d, None).unwrap();
        assert_eq!(
            obj["tagging"],
            json!([
                {"name": "t2", "tags": [{"name": "z"}, {"name": "a"}]},
                {"name": "t1"}
            ])
        );
    }

    #[test]
    fn test_monitor_legacy_string_on_old_firmware() {
        let d = data(
            "vpn_ipsec_phase1interface",
            json!({"name": "hub", "monitor": [{"name": "spoke1"}, {"name": "spoke2"}]}),
        );

        let old = DeviceVersion::new(6, 4, 9);
        let obj = get_object(&d, Some(&old)).unwrap();
        assert_eq!(obj["monitor"], json!("\"spoke1\" \"spoke2\""));

        let new = DeviceVersion::new(7, 2, 0);
        let obj = get_object(&d, Some(&new)).unwrap();
        assert_eq!(obj["monitor"], json!([{"name": "spoke1"}, {"name": "spoke2"}]));

        let obj = get_object(&d, None).unwrap();
        assert!(obj["monitor"].is_array());
    }

    #[test]
    fn test_singleton_has_no_meta_fields() {
        let d = data(
            "system_global",
            json!({"hostname": "fgt-a", "admintimeout": 30, "vdomparam": "root"}),
        );
        let obj = get_object(&d, None).unwrap();
        assert_eq!(obj["hostname"], json!("fgt-a"));
        assert_eq!(obj["admintimeout"], json!(30));
        assert!(!obj.contains_key("vdomparam"));
    }

    #[test]
    fn test_list_sent_in_order() {
        let d = data(
            "vpn_ipsec_phase1interface",
            json!({"name": "hub", "dhgrp": ["21", "14", "5"]}),
        );
        let obj = get_object(&d, None).unwrap();
        assert_eq!(obj["dhgrp"], json!(["21", "14", "5"]));

        let d = data("vpn_ipsec_phase1interface", json!({"name": "hub", "dhgrp": []}));
        assert!(!get_object(&d, None).unwrap().contains_key("dhgrp"));
    }
}
