//! FortiOS API interaction module
//!
//! This module provides the transport used by resource operations: the REST
//! client, HTTP utilities and firmware version handling.
//!
//! # Module Structure
//!
//! - [`client`] - Main FortiOS client with per-call options and CMDB helpers
//! - [`http`] - HTTP utilities, retries and FortiOS error formatting
//! - [`version`] - Firmware version parsing and comparison
//!
//! # Example
//!
//! ```ignore
//! use fortios_provider::config::ProviderConfig;
//! use fortios_provider::forti::client::{CallOptions, FortiClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = FortiClient::new(&ProviderConfig::load().with_env())?;
//!     let policy = client.read("firewall/policy6", Some("12"), CallOptions::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod version;
