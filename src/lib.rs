//! Schema-driven provider for FortiOS configuration objects.
//!
//! Every FortiGate CMDB object is declared once as a schema; a generic engine
//! expands state into API objects, flattens API responses back into state and
//! dispatches create/read/update/delete calls over the REST API.

pub mod config;
pub mod forti;
pub mod resource;
