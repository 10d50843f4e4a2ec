//! FortiOS Client
//!
//! Main client for the FortiGate CMDB API, combining connection settings and
//! HTTP functionality. The client is shared between resource operations and is
//! never mutated by them; per-call settings travel in [`CallOptions`].

use super::http::FortiHttpClient;
use super::version::DeviceVersion;
use crate::config::ProviderConfig;
use anyhow::{bail, Context, Result};
use reqwest::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use url::Url;

/// Settings for a single API call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// VDOM to address; the client's default when `None`
    pub vdom: Option<String>,
    /// Extra attempts after a transport failure
    pub retries: u32,
}

/// Main FortiOS client
#[derive(Clone)]
pub struct FortiClient {
    http: FortiHttpClient,
    base_url: String,
    token: String,
    vdom: Option<String>,
    version: Arc<OnceCell<DeviceVersion>>,
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl FortiClient {
    /// Create a new client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let token = config.effective_token()?;
        let http = FortiHttpClient::new(
            config.insecure.unwrap_or(false),
            config.cabundlefile.as_deref(),
        )?;

        Ok(Self {
            http,
            base_url,
            token: token.to_string(),
            vdom: config.vdom.clone().filter(|v| !v.is_empty()),
            version: Arc::new(OnceCell::new()),
        })
    }

    /// VDOM from the provider configuration
    pub fn default_vdom(&self) -> Option<&str> {
        self.vdom.as_deref()
    }

    /// Build a CMDB URL: `/api/v2/cmdb/<path>[/<mkey>][?vdom=<vdom>]`
    pub fn cmdb_url(&self, path: &str, mkey: Option<&str>, vdom: Option<&str>) -> Result<String> {
        let mut raw = format!("{}/api/v2/cmdb/{}", self.base_url, path.trim_matches('/'));
        if let Some(mkey) = mkey {
            if mkey.is_empty() {
                bail!("Empty mkey for {}", path);
            }
            raw.push('/');
            raw.push_str(&urlencoding::encode(mkey));
        }

        let mut url = Url::parse(&raw).with_context(|| format!("Invalid API URL {}", raw))?;
        if let Some(vdom) = vdom.or(self.vdom.as_deref()) {
            url.query_pairs_mut().append_pair("vdom", vdom);
        }
        Ok(url.into())
    }

    /// Build a monitor API URL: `/api/v2/monitor/<path>`
    pub fn monitor_url(&self, path: &str) -> String {
        format!("{}/api/v2/monitor/{}", self.base_url, path.trim_matches('/'))
    }

    // =========================================================================
    // CMDB operations
    // =========================================================================

    /// Create an object; the response carries the new `mkey`
    pub async fn create(
        &self,
        path: &str,
        obj: &Map<String, Value>,
        opts: CallOptions,
    ) -> Result<Map<String, Value>> {
        let url = self.cmdb_url(path, None, opts.vdom.as_deref())?;
        let body = Value::Object(obj.clone());
        let response = self
            .http
            .request(Method::POST, &url, &self.token, Some(&body), opts.retries)
            .await?;
        Ok(object(response.into_result()?))
    }

    /// Read an object. `Ok(None)` when the device does not have it.
    pub async fn read(
        &self,
        path: &str,
        mkey: Option<&str>,
        opts: CallOptions,
    ) -> Result<Option<Map<String, Value>>> {
        let url = self.cmdb_url(path, mkey, opts.vdom.as_deref())?;
        let response = self
            .http
            .request(Method::GET, &url, &self.token, None, opts.retries)
            .await?;

        if response.is_not_found() {
            return Ok(None);
        }

        let body = response.into_result()?;
        match body.get("results") {
            Some(Value::Array(results)) => Ok(results.first().cloned().map(object)),
            Some(Value::Object(result)) => Ok(Some(result.clone())),
            _ => {
                tracing::warn!("No results in response from {}", url);
                Ok(None)
            }
        }
    }

    /// Replace an object
    pub async fn update(
        &self,
        path: &str,
        mkey: Option<&str>,
        obj: &Map<String, Value>,
        opts: CallOptions,
    ) -> Result<Map<String, Value>> {
        let url = self.cmdb_url(path, mkey, opts.vdom.as_deref())?;
        let body = Value::Object(obj.clone());
        let response = self
            .http
            .request(Method::PUT, &url, &self.token, Some(&body), opts.retries)
            .await?;
        Ok(object(response.into_result()?))
    }

    /// Delete an object
    pub async fn delete(&self, path: &str, mkey: Option<&str>, opts: CallOptions) -> Result<()> {
        let url = self.cmdb_url(path, mkey, opts.vdom.as_deref())?;
        self.http
            .request(Method::DELETE, &url, &self.token, None, opts.retries)
            .await?
            .into_result()?;
        Ok(())
    }

    // =========================================================================
    // Device information
    // =========================================================================

    /// Firmware version of the device, fetched once per client
    pub async fn update_device_version(&self) -> Result<DeviceVersion> {
        let version = self
            .version
            .get_or_try_init(|| async {
                let url = self.monitor_url("system/status");
                let body = self
                    .http
                    .request(Method::GET, &url, &self.token, None, 1)
                    .await?
                    .into_result()?;

                let raw = body
                    .get("version")
                    .and_then(|v| v.as_str())
                    .context("Device status carries no version")?;
                let version: DeviceVersion = raw.parse()?;
                tracing::info!("FortiOS version {}", version);
                Ok::<_, anyhow::Error>(version)
            })
            .await?;

        Ok(*version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(vdom: Option<&str>) -> FortiClient {
        FortiClient::new(&ProviderConfig {
            hostname: Some("fgt.example.net".to_string()),
            token: Some("t0ken".to_string()),
            vdom: vdom.map(|v| v.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_cmdb_url_escapes_mkey() {
        let c = client(None);
        assert_eq!(
            c.cmdb_url("firewall/address", Some("web srv/1"), None).unwrap(),
            "https://fgt.example.net/api/v2/cmdb/firewall/address/web%20srv%2F1"
        );
    }

    #[test]
    fn test_cmdb_url_vdom() {
        let c = client(Some("root"));
        assert_eq!(
            c.cmdb_url("vpn.ipsec/phase1-interface", None, None).unwrap(),
            "https://fgt.example.net/api/v2/cmdb/vpn.ipsec/phase1-interface?vdom=root"
        );
        assert_eq!(
            c.cmdb_url("system/global", None, Some("customer1")).unwrap(),
            "https://fgt.example.net/api/v2/cmdb/system/global?vdom=customer1"
        );
    }

    #[test]
    fn test_cmdb_url_rejects_empty_mkey() {
        let c = client(None);
        assert!(c.cmdb_url("firewall/address", Some(""), None).is_err());
        assert!(c.cmdb_url("firewall/address", None, None).is_ok());
    }

    #[test]
    fn test_new_requires_token() {
        let err = FortiClient::new(&ProviderConfig {
            hostname: Some("fgt".to_string()),
            ..Default::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_monitor_url() {
        assert_eq!(
            client(None).monitor_url("/system/status"),
            "https://fgt.example.net/api/v2/monitor/system/status"
        );
    }
}
