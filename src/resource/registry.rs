//! Resource Registry - Load resource schemas from JSON
//!
//! Every FortiOS object this provider manages is declared in an embedded JSON
//! file. The registry parses them once and hands out `'static` references to
//! the rest of the crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/firewall.json"),
    include_str!("../resources/vpn.json"),
    include_str!("../resources/extension_controller.json"),
    include_str!("../resources/system.json"),
];

/// Attribute holding the VDOM a resource lives in
pub const VDOM_PARAM: &str = "vdomparam";
/// Attribute selecting the ordering applied to flattened tables
pub const DYNAMIC_SORT_SUBTABLE: &str = "dynamic_sort_subtable";
/// Attribute forcing every table to be read back, configured or not
pub const GET_ALL_TABLES: &str = "get_all_tables";

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    String,
    Int,
    /// List of strings
    List,
    /// Repeated nested block
    Table,
    /// Singleton nested block, a one-element list in state
    Complex,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::String => "string",
            AttrKind::Int => "int",
            AttrKind::List => "list",
            AttrKind::Table => "table",
            AttrKind::Complex => "complex",
        }
    }
}

/// Validation rule attached to an attribute
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    IntBetween(i64, i64),
    StringLenBetween(usize, usize),
    StringInSlice(Vec<String>),
}

/// Attribute definition from JSON
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: AttrKind,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub computed: bool,
    /// Never read back from the device (it returns encrypted placeholders)
    #[serde(default, skip_serializing_if = "is_false")]
    pub sensitive: bool,
    /// Provider-side meta attribute, never sent to the API
    #[serde(default, skip_serializing_if = "is_false")]
    pub local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<Validation>,
    /// API field name when it is not the kebab-case form of the attribute name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
    /// Nested attributes of a table or complex block
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub elem: BTreeMap<String, Attribute>,
    /// Field used to order the rows of a table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Devices older than this version expect the table as one quoted string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_string_before: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Attribute {
    fn meta(default: Option<&str>, allowed: Option<&[&str]>) -> Self {
        Self {
            kind: AttrKind::String,
            required: false,
            optional: true,
            computed: default.is_none(),
            sensitive: false,
            local: true,
            default: default.map(|d| Value::String(d.to_string())),
            validate: allowed.map(|values| {
                Validation::StringInSlice(values.iter().map(|v| v.to_string()).collect())
            }),
            api_name: None,
            elem: BTreeMap::new(),
            sort_key: None,
            max_items: None,
            legacy_string_before: None,
        }
    }

    /// Table or complex block
    pub fn is_nested(&self) -> bool {
        matches!(self.kind, AttrKind::Table | AttrKind::Complex)
    }

    /// Set by the device only, never by the user
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceDef {
    /// CamelCase name used in messages and as the fallback resource ID
    pub display_name: String,
    /// CMDB path, e.g. `firewall/policy6`
    pub path: String,
    /// Attribute holding the primary key
    #[serde(default)]
    pub mkey: Option<String>,
    /// Object exists exactly once per VDOM and cannot be deleted
    #[serde(default)]
    pub singleton: bool,
    pub attributes: BTreeMap<String, Attribute>,
}

impl ResourceDef {
    /// Attributes that travel over the wire
    pub fn api_attributes(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter().filter(|(_, attr)| !attr.local)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

fn meta_attributes() -> [(&'static str, Attribute); 3] {
    [
        (VDOM_PARAM, Attribute::meta(None, None)),
        (
            DYNAMIC_SORT_SUBTABLE,
            Attribute::meta(Some("false"), Some(&["true", "false", "natural"])),
        ),
        (
            GET_ALL_TABLES,
            Attribute::meta(Some("false"), Some(&["true", "false"])),
        ),
    ]
}

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: BTreeMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        for resource in final_config.resources.values_mut() {
            for (name, attr) in meta_attributes() {
                resource.attributes.insert(name.to_string(), attr);
            }
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect()
}
