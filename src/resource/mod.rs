//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing FortiOS objects.
//! Resource schemas are loaded from JSON files at compile time, allowing
//! new resource types to be added without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource schemas from embedded JSON
//! - [`state`] - Attribute tree of one resource instance
//! - [`validate`] - Schema constraints and defaults
//! - [`expand`] / [`flatten`] - State ↔ CMDB object translation
//! - [`sort`] - Deterministic ordering of table rows
//! - [`dispatch`] - Create, read, update, delete and import
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `firewall.json` - IPv6 policies, addresses
//! - `vpn.json` - IPsec phase1 interfaces
//! - `extension_controller.json` - FortiExtender profiles
//! - `system.json` - global system settings
//!
//! # Example
//!
//! ```ignore
//! use fortios_provider::resource::{dispatch, get_resource, ResourceData};
//!
//! async fn create_address(client: &FortiClient) -> anyhow::Result<()> {
//!     let mut d = ResourceData::new(get_resource("firewall_address").unwrap());
//!     d.set("name", "web".into())?;
//!     d.set("subnet", "192.0.2.10 255.255.255.255".into())?;
//!     dispatch::create(client, &mut d).await
//! }
//! ```

pub mod dispatch;
pub mod expand;
pub mod flatten;
mod naming;
mod registry;
pub mod sort;
mod state;
pub mod validate;

pub use naming::{api_field, to_api_name};
pub use registry::*;
pub use state::{ResourceData, StateDocument, StateError};
