//! The `hcp_aws_network_peering` resource.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::HcpClient;
use crate::error::HcpError;
use crate::link::{self, Link, Location, HVN_TYPE, PEERING_TYPE};
use crate::network::{AwsPeeringTarget, NetworkService, Peering, PeeringState, PeeringTarget};
use crate::resources::{
    carry_timeouts, link_from_state, resolve_location, string_attr, Timeouts, AWS_NETWORK_PEERING,
};
use crate::schema::{Attribute, Schema, Validator};
use crate::types::ImportedResource;
use crate::wait::{wait_for_operation, NotFoundPolicy, WaitContext, WaitOutcome};

/// Default deadlines for peering create and delete.
pub const DEFAULT_TIMEOUTS: Timeouts = Timeouts {
    create: Duration::from_secs(35 * 60),
    delete: Duration::from_secs(35 * 60),
};

/// States in which a new AWS peering is considered created.
///
/// AWS peerings sit in `PendingAcceptance` until the peer account accepts
/// them, which happens outside HCP.
pub const CREATED_STATES: [PeeringState; 2] =
    [PeeringState::PendingAcceptance, PeeringState::Active];

/// Schema of the `hcp_aws_network_peering` resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "hvn_id",
            Attribute::required_string()
                .with_description("The ID of the HVN to peer from.")
                .with_force_new()
                .with_validator(Validator::Slug),
        )
        .with_attribute(
            "peering_id",
            Attribute::required_string()
                .with_description("The ID of the network peering.")
                .with_force_new()
                .with_validator(Validator::Slug),
        )
        .with_attribute(
            "peer_account_id",
            Attribute::required_string()
                .with_description("The account ID of the peer VPC in AWS.")
                .with_force_new(),
        )
        .with_attribute(
            "peer_vpc_id",
            Attribute::required_string()
                .with_description("The ID of the peer VPC in AWS.")
                .with_force_new(),
        )
        .with_attribute(
            "peer_vpc_region",
            Attribute::required_string()
                .with_description("The region of the peer VPC in AWS.")
                .with_force_new(),
        )
        .with_attribute(
            "project_id",
            Attribute::optional_computed_string().with_force_new(),
        )
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("organization_id", Attribute::computed_string())
        .with_attribute("provider_peering_id", Attribute::computed_string())
        .with_attribute("state", Attribute::computed_string())
        .with_attribute("created_at", Attribute::computed_string())
        .with_attribute("expires_at", Attribute::computed_string())
        .with_attribute("self_link", Attribute::computed_string())
        .with_timeouts(&["create", "delete"])
}

#[derive(Debug, Deserialize)]
struct PeeringConfig {
    hvn_id: String,
    peering_id: String,
    peer_account_id: String,
    peer_vpc_id: String,
    peer_vpc_region: String,
    #[serde(default)]
    project_id: Option<String>,
}

fn peering_link(peering_id: &str, location: Location) -> Result<String, HcpError> {
    link::encode(&Link::new(PEERING_TYPE, peering_id, location))
}

/// Build resource state from an AWS peering.
pub fn to_state(peering: &Peering) -> Result<Value, HcpError> {
    let aws = match &peering.target {
        PeeringTarget::Aws(aws) => aws,
        other @ (PeeringTarget::Azure(_) | PeeringTarget::Hvn(_)) => {
            return Err(HcpError::Validation(format!(
                "peering {} targets {} rather than an AWS VPC",
                peering.id,
                other.provider()
            )))
        },
    };
    let location = peering
        .hvn
        .location
        .clone()
        .ok_or_else(|| {
            HcpError::InvalidLink(format!("peering {} has no HVN location", peering.id))
        })?;
    let self_link = peering_link(&peering.id, location.clone())?;
    let lifecycle = serde_json::to_value(peering.state)?;

    Ok(json!({
        "id": self_link,
        "hvn_id": peering.hvn.id,
        "peering_id": peering.id,
        "peer_account_id": aws.account_id,
        "peer_vpc_id": aws.vpc_id,
        "peer_vpc_region": aws.region,
        "organization_id": location.organization_id,
        "project_id": location.project_id,
        "provider_peering_id": peering.provider_peering_id,
        "state": lifecycle,
        "created_at": peering.created_at,
        "expires_at": peering.expires_at,
        "self_link": self_link,
    }))
}

/// Request a peering and wait until it is ready for the peer to accept.
pub async fn create(
    client: &HcpClient,
    config: &Value,
    cancel: &CancellationToken,
) -> Result<Value, HcpError> {
    let input: PeeringConfig = serde_json::from_value(config.clone())?;
    let timeouts = Timeouts::from_config(config, DEFAULT_TIMEOUTS)?;
    let location = resolve_location(client, input.project_id.as_deref());
    let network = NetworkService::new(client);
    let ctx = WaitContext::with_timeout(timeouts.create).with_cancel(cancel.child_token());
    let action = format!("create peering {}", input.peering_id);

    let hvn = ctx
        .run(&action, network.get_hvn(&input.hvn_id, &location))
        .await
        .map_err(|e| match e {
            HcpError::NotFound(_) => {
                HcpError::Validation(format!("unable to find HVN {}", input.hvn_id))
            },
            other => other,
        })?;

    let peering = Peering {
        id: input.peering_id,
        hvn: Link::new(HVN_TYPE, &hvn.id, hvn.location.clone()),
        target: PeeringTarget::Aws(AwsPeeringTarget {
            account_id: input.peer_account_id,
            vpc_id: input.peer_vpc_id,
            region: input.peer_vpc_region,
            cidr: String::new(),
        }),
        state: PeeringState::default(),
        provider_peering_id: String::new(),
        expires_at: String::new(),
        created_at: String::new(),
    };

    let (_, mut operation) = ctx
        .run(&action, network.create_peering(&peering, &location))
        .await?;
    operation.location.get_or_insert_with(|| location.clone());
    wait_for_operation(client, &ctx, &operation, &action).await?;

    let created = match network
        .wait_for_peering(
            &ctx,
            &hvn.id,
            &peering.id,
            &location,
            &CREATED_STATES,
            NotFoundPolicy::Continue,
        )
        .await?
    {
        WaitOutcome::Reached(created) => created,
        WaitOutcome::Gone => return Err(HcpError::NotFound(format!("peering {}", peering.id))),
    };
    info!(peering_id = %created.id, state = ?created.state, "Peering created");

    let mut state = to_state(&created)?;
    carry_timeouts(config, &mut state);
    Ok(state)
}

/// Refresh state. `Ok(None)` means the peering no longer exists.
pub async fn read(client: &HcpClient, state: &Value) -> Result<Option<Value>, HcpError> {
    let (link, location) = link_from_state(client, state, PEERING_TYPE)?;
    let hvn_id = string_attr(state, "hvn_id")?;

    match NetworkService::new(client)
        .get_peering(hvn_id, &link.id, &location)
        .await
    {
        Ok(peering) => {
            let mut refreshed = to_state(&peering)?;
            carry_timeouts(state, &mut refreshed);
            Ok(Some(refreshed))
        },
        Err(e) if e.is_not_found() => {
            warn!(peering_id = %link.id, hvn_id, "Peering not found, removing from state");
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

/// Delete a peering and wait for the deletion to finish.
pub async fn delete(
    client: &HcpClient,
    state: &Value,
    cancel: &CancellationToken,
) -> Result<(), HcpError> {
    let (link, location) = link_from_state(client, state, PEERING_TYPE)?;
    let hvn_id = string_attr(state, "hvn_id")?;
    let timeouts = Timeouts::from_config(state, DEFAULT_TIMEOUTS)?;
    let ctx = WaitContext::with_timeout(timeouts.delete).with_cancel(cancel.child_token());
    let action = format!("delete peering {}", link.id);

    let network = NetworkService::new(client);
    let mut operation = match ctx
        .run(&action, network.delete_peering(hvn_id, &link.id, &location))
        .await
    {
        Ok(operation) => operation,
        Err(e) if e.is_not_found() => {
            info!(peering_id = %link.id, "Peering already deleted");
            return Ok(());
        },
        Err(e) => return Err(e),
    };

    operation.location.get_or_insert(location);
    wait_for_operation(client, &ctx, &operation, &action).await?;
    info!(peering_id = %link.id, "Peering deleted");
    Ok(())
}

/// Import a peering by `{hvn_id}:{peering_id}`.
pub async fn import(client: &HcpClient, id: &str) -> Result<ImportedResource, HcpError> {
    let mut parts = link::parse_import_id(id, 2)?;
    let peering_id = parts.remove(1);
    let hvn_id = parts.remove(0);

    let stub = json!({
        "id": peering_link(&peering_id, client.location().clone())?,
        "hvn_id": hvn_id,
    });
    let state = read(client, &stub)
        .await?
        .ok_or_else(|| HcpError::NotFound(format!("peering {} on HVN {}", peering_id, hvn_id)))?;
    Ok(ImportedResource::new(AWS_NETWORK_PEERING, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{AzurePeeringTarget, HvnPeeringTarget};

    fn aws_peering() -> Peering {
        Peering {
            id: "main-peering".to_string(),
            hvn: Link::new(HVN_TYPE, "main-hvn", Location::new("org-1", "proj-1")),
            target: PeeringTarget::Aws(AwsPeeringTarget {
                account_id: "123456789012".to_string(),
                vpc_id: "vpc-1".to_string(),
                region: "us-west-2".to_string(),
                cidr: "10.0.0.0/16".to_string(),
            }),
            state: PeeringState::PendingAcceptance,
            provider_peering_id: "pcx-1".to_string(),
            expires_at: "2021-01-08T00:00:00Z".to_string(),
            created_at: "2021-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_to_state() {
        let state = to_state(&aws_peering()).unwrap();
        assert_eq!(
            state["id"],
            "/project/proj-1/hashicorp.network.peering/main-peering"
        );
        assert_eq!(state["hvn_id"], "main-hvn");
        assert_eq!(state["peer_vpc_id"], "vpc-1");
        assert_eq!(state["provider_peering_id"], "pcx-1");
        assert_eq!(state["state"], "PENDING_ACCEPTANCE");
    }

    #[test]
    fn test_to_state_rejects_other_targets() {
        let mut peering = aws_peering();
        peering.target = PeeringTarget::Azure(AzurePeeringTarget::default());
        assert!(to_state(&peering).unwrap_err().to_string().contains("azure"));

        peering.target = PeeringTarget::Hvn(HvnPeeringTarget::default());
        assert!(to_state(&peering).is_err());
    }

    #[test]
    fn test_created_states() {
        assert!(CREATED_STATES.contains(&PeeringState::PendingAcceptance));
        assert!(!CREATED_STATES
            .iter()
            .any(|s| PeeringState::FAILURES.contains(s)));
    }
}
