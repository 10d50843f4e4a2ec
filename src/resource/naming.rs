//! Attribute naming
//!
//! State attributes are snake_case, FortiOS CMDB fields are kebab-case.
//! A handful of attributes collide with names reserved by the state model
//! (`id` most notably) and carry an explicit `api_name` override instead.

use super::registry::Attribute;

/// Convert a snake_case state attribute name to its kebab-case API field name
pub fn to_api_name(attr: &str) -> String {
    attr.replace('_', "-")
}

/// Resolve the API field name for an attribute, honouring `api_name` overrides
pub fn api_field(name: &str, attr: &Attribute) -> String {
    attr.api_name
        .clone()
        .unwrap_or_else(|| to_api_name(name))
}
