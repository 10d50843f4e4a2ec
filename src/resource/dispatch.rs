//! CRUD Dispatch
//!
//! Create, read, update, delete and import for any declared resource. Each
//! operation is one expand → API call → flatten round trip; errors are wrapped
//! with the resource's display name and returned to the caller.

use super::expand::get_object;
use super::flatten::refresh_object;
use super::registry::{ResourceDef, GET_ALL_TABLES, VDOM_PARAM};
use super::state::ResourceData;
use super::validate::{apply_defaults, validate};
use crate::forti::client::{CallOptions, FortiClient};
use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

/// The VDOM an operation targets. A VDOM inherited from the provider
/// configuration is recorded in the state.
fn call_options(client: &FortiClient, d: &mut ResourceData) -> Result<CallOptions> {
    let vdom = match d.get_ok(VDOM_PARAM).and_then(|v| v.as_str()) {
        Some(v) => Some(v.to_string()),
        None => match client.default_vdom() {
            Some(v) => {
                d.set(VDOM_PARAM, Value::String(v.to_string()))?;
                Some(v.to_string())
            }
            None => None,
        },
    };

    Ok(CallOptions { vdom, retries: 1 })
}

/// Singleton objects are addressed by path alone. Any other object needs an
/// ID, or the call would address the whole table.
fn mkey_of(d: &ResourceData, action: &str) -> Result<Option<String>> {
    if d.resource().singleton {
        return Ok(None);
    }
    if d.id().is_empty() {
        return Err(anyhow!(
            "Error {} {} resource: no ID in state",
            action,
            d.resource().display_name
        ));
    }
    Ok(Some(d.id().to_string()))
}

fn mkey_from_response(o: &Map<String, Value>) -> Option<String> {
    match o.get("mkey") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn set_id_from_response(d: &mut ResourceData, o: &Map<String, Value>) {
    let id = mkey_from_response(o).unwrap_or_else(|| d.resource().display_name.clone());
    d.set_id(id);
}

fn check_config(d: &mut ResourceData) -> Result<()> {
    let name = &d.resource().display_name;
    apply_defaults(d).map_err(|e| anyhow!("Invalid {} configuration: {}", name, e))?;

    validate(d).map_err(|errors| {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow!("Invalid {} configuration: {}", name, details.join("; "))
    })
}

/// Create the object and read it back
pub async fn create(client: &FortiClient, d: &mut ResourceData) -> Result<()> {
    let resource = d.resource();
    let name = &resource.display_name;
    tracing::info!("Creating {} resource", name);

    check_config(d)?;
    let opts = call_options(client, d)?;
    let sv = client
        .update_device_version()
        .await
        .map_err(|e| anyhow!("Error creating {} resource: {:#}", name, e))?;

    let obj = get_object(d, Some(&sv))
        .map_err(|e| anyhow!("Error creating {} resource while getting object: {}", name, e))?;

    let o = if resource.singleton {
        client.update(&resource.path, None, &obj, opts).await
    } else {
        client.create(&resource.path, &obj, opts).await
    }
    .map_err(|e| anyhow!("Error creating {} resource: {:#}", name, e))?;

    set_id_from_response(d, &o);
    read(client, d).await
}

/// Refresh state from the device. A missing object clears the ID.
pub async fn read(client: &FortiClient, d: &mut ResourceData) -> Result<()> {
    let resource = d.resource();
    let name = &resource.display_name;
    let mkey = mkey_of(d, "reading")?;
    let opts = call_options(client, d)?;

    let o = client
        .read(&resource.path, mkey.as_deref(), opts)
        .await
        .map_err(|e| anyhow!("Error reading {} resource: {:#}", name, e))?;

    let Some(o) = o else {
        tracing::warn!("resource ({}) not found, removing from state", d.id());
        d.set_id("");
        return Ok(());
    };

    refresh_object(d, &o).map_err(|e| anyhow!("Error reading {} resource from API: {}", name, e))
}

/// Push the current configuration and read it back
pub async fn update(client: &FortiClient, d: &mut ResourceData) -> Result<()> {
    let resource = d.resource();
    let name = &resource.display_name;
    tracing::info!("Updating {} resource {}", name, d.id());

    let mkey = mkey_of(d, "updating")?;
    check_config(d)?;
    let opts = call_options(client, d)?;
    let sv = client
        .update_device_version()
        .await
        .map_err(|e| anyhow!("Error updating {} resource: {:#}", name, e))?;

    let obj = get_object(d, Some(&sv))
        .map_err(|e| anyhow!("Error updating {} resource while getting object: {}", name, e))?;

    let o = client
        .update(&resource.path, mkey.as_deref(), &obj, opts)
        .await
        .map_err(|e| anyhow!("Error updating {} resource: {:#}", name, e))?;

    set_id_from_response(d, &o);
    read(client, d).await
}

/// Remove the object. Singletons cannot be removed and are only dropped from state.
pub async fn delete(client: &FortiClient, d: &mut ResourceData) -> Result<()> {
    let resource = d.resource();
    let name = &resource.display_name;
    tracing::info!("Deleting {} resource {}", name, d.id());

    if !resource.singleton {
        let mkey = mkey_of(d, "deleting")?;
        let opts = call_options(client, d)?;
        client
            .delete(&resource.path, mkey.as_deref(), opts)
            .await
            .map_err(|e| anyhow!("Error deleting {} resource: {:#}", name, e))?;
    }

    d.set_id("");
    Ok(())
}

/// Adopt an existing object, reading every table it has
pub async fn import(
    client: &FortiClient,
    resource: &'static ResourceDef,
    mkey: &str,
) -> Result<ResourceData> {
    let mut d = ResourceData::new(resource);
    d.set_id(if resource.singleton {
        resource.display_name.as_str()
    } else {
        mkey
    });
    d.set(GET_ALL_TABLES, Value::from("true"))?;

    read(client, &mut d).await?;
    if d.id().is_empty() {
        return Err(anyhow!(
            "Cannot import non-existent remote object {} {}",
            resource.display_name,
            mkey
        ));
    }

    d.set(GET_ALL_TABLES, Value::from("false"))?;
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::resource::registry::get_resource;
    use serde_json::json;

    fn client(vdom: Option<&str>) -> FortiClient {
        FortiClient::new(&ProviderConfig {
            hostname: Some("127.0.0.1:9".to_string()),
            token: Some("t".to_string()),
            vdom: vdom.map(|v| v.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_mkey_from_response() {
        let o = json!({"mkey": 12}).as_object().unwrap().clone();
        assert_eq!(mkey_from_response(&o), Some("12".to_string()));
        let o = json!({"mkey": ""}).as_object().unwrap().clone();
        assert_eq!(mkey_from_response(&o), None);
        assert_eq!(mkey_from_response(&Map::new()), None);
    }

    #[test]
    fn test_fallback_id() {
        let mut d = ResourceData::new(get_resource("firewall_policy6").unwrap());
        set_id_from_response(&mut d, &Map::new());
        assert_eq!(d.id(), "FirewallPolicy6");
    }

    #[test]
    fn test_vdom_inherited_from_provider() {
        let mut d = ResourceData::new(get_resource("firewall_address").unwrap());
        let opts = call_options(&client(Some("root")), &mut d).unwrap();
        assert_eq!(opts.vdom.as_deref(), Some("root"));
        assert_eq!(opts.retries, 1);
        assert_eq!(d.get_str(VDOM_PARAM), Some("root"));
    }

    #[test]
    fn test_vdom_from_state_wins() {
        let mut d = ResourceData::new(get_resource("firewall_address").unwrap());
        d.set(VDOM_PARAM, json!("customer1")).unwrap();
        let opts = call_options(&client(Some("root")), &mut d).unwrap();
        assert_eq!(opts.vdom.as_deref(), Some("customer1"));
    }

    #[test]
    fn test_singleton_has_no_mkey() {
        let mut d = ResourceData::new(get_resource("system_global").unwrap());
        d.set_id("SystemGlobal");
        assert_eq!(mkey_of(&d, "reading").unwrap(), None);
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let mut d = ResourceData::new(get_resource("firewall_address").unwrap());
        let err = mkey_of(&d, "deleting").unwrap_err();
        assert_eq!(err.to_string(), "Error deleting FirewallAddress resource: no ID in state");

        d.set_id("web");
        assert_eq!(mkey_of(&d, "deleting").unwrap().as_deref(), Some("web"));
    }

    #[test]
    fn test_invalid_config_rejected_before_any_call() {
        let mut d = ResourceData::new(get_resource("firewall_policy6").unwrap());
        d.set("schedule", json!("always")).unwrap();
        let err = check_config(&mut d).unwrap_err();
        assert!(err.to_string().starts_with("Invalid FirewallPolicy6 configuration:"));
        assert!(err.to_string().contains("srcintf: required attribute is not set"));
    }
}
