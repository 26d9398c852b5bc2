//! Terraform-style resources backed by the HCP network service.
//!
//! Each resource maps between JSON configuration/state and the typed models
//! in [`crate::network`]. State `id`s are encoded [`Link`]s.

use std::time::Duration;

use serde_json::Value;

use crate::client::HcpClient;
use crate::error::HcpError;
use crate::link::{self, Link, Location};
use crate::schema::Schema;
use crate::validation::parse_timeout;

pub mod hvn;
pub mod peering;

/// Resource type name of an HVN.
pub const HVN: &str = "hcp_hvn";

/// Resource type name of an AWS network peering.
pub const AWS_NETWORK_PEERING: &str = "hcp_aws_network_peering";

/// How long create and delete may wait on HCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Deadline for create, including waiting on the operation.
    pub create: Duration,
    /// Deadline for delete.
    pub delete: Duration,
}

impl Timeouts {
    /// Read the `timeouts` block of `config`, using `defaults` for anything unset.
    pub fn from_config(config: &Value, defaults: Timeouts) -> Result<Self, HcpError> {
        let block = config.get("timeouts");
        Ok(Self {
            create: timeout_field(block, "create", defaults.create)?,
            delete: timeout_field(block, "delete", defaults.delete)?,
        })
    }
}

fn timeout_field(
    block: Option<&Value>,
    name: &str,
    default: Duration,
) -> Result<Duration, HcpError> {
    match block.and_then(|b| b.get(name)).and_then(Value::as_str) {
        Some(raw) => parse_timeout(raw)
            .map_err(|e| HcpError::Validation(format!("timeouts.{}: {}", name, e))),
        None => Ok(default),
    }
}

/// The client's location, with the project overridden when one is given.
pub(crate) fn resolve_location(client: &HcpClient, project_id: Option<&str>) -> Location {
    let mut location = client.location().clone();
    if let Some(project) = project_id.filter(|p| !p.is_empty()) {
        location.project_id = project.to_string();
    }
    location
}

/// Decode the `id` of a resource state.
pub(crate) fn link_from_state(
    client: &HcpClient,
    state: &Value,
    resource_type: &str,
) -> Result<(Link, Location), HcpError> {
    let id = state
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| HcpError::Validation("state has no id".to_string()))?;
    let link = link::decode_with_org(id, resource_type, &client.location().organization_id)?;
    let location = link
        .location
        .clone()
        .ok_or_else(|| HcpError::InvalidLink(format!("{} has no location", id)))?;
    Ok((link, location))
}

/// A string attribute of `value`.
pub(crate) fn string_attr<'a>(value: &'a Value, name: &str) -> Result<&'a str, HcpError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HcpError::Validation(format!("missing attribute '{}'", name)))
}

/// Copy the user's `timeouts` block onto freshly built state.
pub(crate) fn carry_timeouts(from: &Value, to: &mut Value) {
    if let (Some(timeouts), Some(state)) = (
        from.get("timeouts").filter(|t| !t.is_null()),
        to.as_object_mut(),
    ) {
        state.insert("timeouts".to_string(), timeouts.clone());
    }
}

/// Apply an update that only touches attributes which do not force replacement.
///
/// Every HCP network attribute forces replacement, so in practice only the
/// `timeouts` block can change in place.
pub(crate) fn update_in_place(
    schema: &Schema,
    prior: &Value,
    planned: &Value,
) -> Result<Value, HcpError> {
    for (name, attr) in &schema.block.attributes {
        if !attr.force_new {
            continue;
        }
        let wanted = match planned.get(name) {
            None | Some(Value::Null) => continue,
            Some(v) => v,
        };
        if prior.get(name) != Some(wanted) {
            return Err(HcpError::Validation(format!(
                "changing '{}' requires replacing the resource",
                name
            )));
        }
    }

    let mut state = prior.clone();
    if let Some(obj) = state.as_object_mut() {
        obj.remove("timeouts");
    }
    carry_timeouts(planned, &mut state);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    const DEFAULTS: Timeouts = Timeouts {
        create: Duration::from_secs(1200),
        delete: Duration::from_secs(600),
    };

    #[test]
    fn test_timeouts_defaults_and_overrides() {
        assert_eq!(Timeouts::from_config(&json!({}), DEFAULTS).unwrap(), DEFAULTS);

        let timeouts =
            Timeouts::from_config(&json!({"timeouts": {"create": "45s"}}), DEFAULTS).unwrap();
        assert_eq!(timeouts.create, Duration::from_secs(45));
        assert_eq!(timeouts.delete, DEFAULTS.delete);

        let err = Timeouts::from_config(&json!({"timeouts": {"delete": "later"}}), DEFAULTS)
            .unwrap_err();
        assert!(err.to_string().contains("timeouts.delete"));
    }

    #[test]
    fn test_timeouts_extreme_values() {
        let huge = Timeouts::from_config(
            &json!({"timeouts": {"create": "18446744073709551615s"}}),
            DEFAULTS,
        )
        .unwrap();
        assert_eq!(huge.create, Duration::from_secs(u64::MAX));

        for bad in ["0s", "5124095576030432h", "18446744073709551615s1s"] {
            let err = Timeouts::from_config(&json!({"timeouts": {"create": bad}}), DEFAULTS)
                .unwrap_err();
            assert!(matches!(err, HcpError::Validation(_)), "{}: {:?}", bad, err);
            assert!(err.to_string().contains("timeouts.create"));
        }
    }

    #[test]
    fn test_carry_timeouts() {
        let mut state = json!({"id": "x"});
        carry_timeouts(&json!({"timeouts": {"create": "1m"}}), &mut state);
        assert_eq!(state["timeouts"]["create"], "1m");

        let mut state = json!({"id": "x"});
        carry_timeouts(&json!({"timeouts": null}), &mut state);
        assert!(state.get("timeouts").is_none());
    }

    #[test]
    fn test_update_in_place() {
        let schema = Schema::v0()
            .with_attribute("hvn_id", Attribute::required_string().with_force_new())
            .with_attribute("state", Attribute::computed_string());
        let prior = json!({"hvn_id": "main-hvn", "state": "STABLE"});

        let updated = update_in_place(
            &schema,
            &prior,
            &json!({"hvn_id": "main-hvn", "timeouts": {"delete": "5m"}}),
        )
        .unwrap();
        assert_eq!(updated["state"], "STABLE");
        assert_eq!(updated["timeouts"]["delete"], "5m");

        let err = update_in_place(&schema, &prior, &json!({"hvn_id": "other-hvn"})).unwrap_err();
        assert!(err.to_string().contains("requires replacing"));
    }

    #[test]
    fn test_string_attr() {
        let value = json!({"hvn_id": "main-hvn", "empty": ""});
        assert_eq!(string_attr(&value, "hvn_id").unwrap(), "main-hvn");
        assert!(string_attr(&value, "empty").is_err());
        assert!(string_attr(&value, "missing").is_err());
    }
}
