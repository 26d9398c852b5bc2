//! The `hcp_hvn` resource and data source.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::HcpClient;
use crate::error::HcpError;
use crate::link::{self, Link, Region, HVN_TYPE};
use crate::network::{Hvn, NetworkService};
use crate::resources::{carry_timeouts, link_from_state, resolve_location, Timeouts};
use crate::schema::{Attribute, Schema, Validator};
use crate::types::ImportedResource;
use crate::wait::{wait_for_operation, WaitContext};

/// CIDR used when the configuration does not set one.
pub const DEFAULT_CIDR_BLOCK: &str = "172.25.16.0/20";

/// Default deadlines for HVN create and delete.
pub const DEFAULT_TIMEOUTS: Timeouts = Timeouts {
    create: Duration::from_secs(20 * 60),
    delete: Duration::from_secs(20 * 60),
};

/// Schema of the `hcp_hvn` resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "hvn_id",
            Attribute::required_string()
                .with_description("The ID of the HashiCorp Virtual Network (HVN).")
                .with_force_new()
                .with_validator(Validator::Slug),
        )
        .with_attribute(
            "cloud_provider",
            Attribute::required_string()
                .with_description("The provider where the HVN is located.")
                .with_force_new()
                .with_validator(Validator::one_of(&["aws", "azure"])),
        )
        .with_attribute(
            "region",
            Attribute::required_string()
                .with_description("The region where the HVN is located.")
                .with_force_new(),
        )
        .with_attribute(
            "cidr_block",
            Attribute::optional_computed_string()
                .with_description("The CIDR range of the HVN.")
                .with_force_new()
                .with_validator(Validator::PrivateCidr),
        )
        .with_attribute(
            "project_id",
            Attribute::optional_computed_string()
                .with_description("The ID of the HCP project where the HVN is located.")
                .with_force_new(),
        )
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("organization_id", Attribute::computed_string())
        .with_attribute("provider_account_id", Attribute::computed_string())
        .with_attribute("state", Attribute::computed_string())
        .with_attribute("created_at", Attribute::computed_string())
        .with_attribute("self_link", Attribute::computed_string())
        .with_timeouts(&["create", "delete"])
}

/// Schema of the `hcp_hvn` data source.
pub fn data_source_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "hvn_id",
            Attribute::required_string().with_validator(Validator::Slug),
        )
        .with_attribute("project_id", Attribute::optional_computed_string())
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("cloud_provider", Attribute::computed_string())
        .with_attribute("region", Attribute::computed_string())
        .with_attribute("cidr_block", Attribute::computed_string())
        .with_attribute("organization_id", Attribute::computed_string())
        .with_attribute("provider_account_id", Attribute::computed_string())
        .with_attribute("state", Attribute::computed_string())
        .with_attribute("created_at", Attribute::computed_string())
        .with_attribute("self_link", Attribute::computed_string())
}

#[derive(Debug, Deserialize)]
struct HvnConfig {
    hvn_id: String,
    cloud_provider: String,
    region: String,
    #[serde(default)]
    cidr_block: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
}

/// Build resource state from an HVN.
pub fn to_state(hvn: &Hvn) -> Result<Value, HcpError> {
    let self_link = link::encode(&Link::new(HVN_TYPE, &hvn.id, hvn.location.clone()))?;
    let (cloud_provider, region) = hvn
        .location
        .region
        .as_ref()
        .map(|r| (r.provider.as_str(), r.region.as_str()))
        .unwrap_or_default();
    let lifecycle = serde_json::to_value(hvn.state)?;
    Ok(json!({
        "id": self_link,
        "hvn_id": hvn.id,
        "cloud_provider": cloud_provider,
        "region": region,
        "cidr_block": hvn.cidr_block,
        "organization_id": hvn.location.organization_id,
        "project_id": hvn.location.project_id,
        "provider_account_id": hvn.provider_account_id().unwrap_or_default(),
        "state": lifecycle,
        "created_at": hvn.created_at,
        "self_link": self_link,
    }))
}

/// Create an HVN and wait for it to become usable.
pub async fn create(
    client: &HcpClient,
    config: &Value,
    cancel: &CancellationToken,
) -> Result<Value, HcpError> {
    let input: HvnConfig = serde_json::from_value(config.clone())?;
    let timeouts = Timeouts::from_config(config, DEFAULT_TIMEOUTS)?;
    let location = resolve_location(client, input.project_id.as_deref())
        .with_region(Region::new(&input.cloud_provider, &input.region));
    let network = NetworkService::new(client);
    let ctx = WaitContext::with_timeout(timeouts.create).with_cancel(cancel.child_token());
    let action = format!("create HVN {}", input.hvn_id);

    match ctx.run(&action, network.get_hvn(&input.hvn_id, &location)).await {
        Ok(_) => {
            return Err(HcpError::Validation(format!(
                "HVN {} already exists; import it to manage it here",
                input.hvn_id
            )));
        },
        Err(e) if e.is_not_found() => {},
        Err(e) => return Err(e),
    }

    let hvn = Hvn {
        id: input.hvn_id,
        cidr_block: input
            .cidr_block
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CIDR_BLOCK.to_string()),
        location,
        ..Default::default()
    };

    let (_, mut operation) = ctx.run(&action, network.create_hvn(&hvn)).await?;
    operation.location.get_or_insert_with(|| hvn.location.clone());
    wait_for_operation(client, &ctx, &operation, &action).await?;

    let created = ctx.run(&action, network.get_hvn(&hvn.id, &hvn.location)).await?;
    info!(hvn_id = %created.id, cidr_block = %created.cidr_block, "HVN created");

    let mut state = to_state(&created)?;
    carry_timeouts(config, &mut state);
    Ok(state)
}

/// Refresh state. `Ok(None)` means the HVN no longer exists.
pub async fn read(client: &HcpClient, state: &Value) -> Result<Option<Value>, HcpError> {
    let (link, location) = link_from_state(client, state, HVN_TYPE)?;
    match NetworkService::new(client).get_hvn(&link.id, &location).await {
        Ok(hvn) => {
            let mut refreshed = to_state(&hvn)?;
            carry_timeouts(state, &mut refreshed);
            Ok(Some(refreshed))
        },
        Err(e) if e.is_not_found() => {
            warn!(hvn_id = %link.id, "HVN not found, removing from state");
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

/// Delete an HVN and wait for the deletion to finish.
pub async fn delete(
    client: &HcpClient,
    state: &Value,
    cancel: &CancellationToken,
) -> Result<(), HcpError> {
    let (link, location) = link_from_state(client, state, HVN_TYPE)?;
    let timeouts = Timeouts::from_config(state, DEFAULT_TIMEOUTS)?;
    let ctx = WaitContext::with_timeout(timeouts.delete).with_cancel(cancel.child_token());
    let action = format!("delete HVN {}", link.id);

    let network = NetworkService::new(client);
    let mut operation = match ctx.run(&action, network.delete_hvn(&link.id, &location)).await {
        Ok(operation) => operation,
        Err(e) if e.is_not_found() => {
            info!(hvn_id = %link.id, "HVN already deleted");
            return Ok(());
        },
        Err(e) => return Err(e),
    };

    operation.location.get_or_insert(location);
    wait_for_operation(client, &ctx, &operation, &action).await?;
    info!(hvn_id = %link.id, "HVN deleted");
    Ok(())
}

/// Import an HVN by `{hvn_id}`.
pub async fn import(client: &HcpClient, id: &str) -> Result<ImportedResource, HcpError> {
    let hvn_id = link::parse_import_id(id, 1)?.remove(0);
    let link = Link::new(HVN_TYPE, &hvn_id, client.location().clone());
    let stub = json!({ "id": link::encode(&link)?, "hvn_id": hvn_id });

    let state = read(client, &stub)
        .await?
        .ok_or_else(|| HcpError::NotFound(format!("HVN {}", hvn_id)))?;
    Ok(ImportedResource::new(crate::resources::HVN, state))
}

/// Look up an existing HVN for the data source.
pub async fn read_data_source(client: &HcpClient, config: &Value) -> Result<Value, HcpError> {
    let hvn_id = crate::resources::string_attr(config, "hvn_id")?;
    let project_id = config.get("project_id").and_then(Value::as_str);
    let location = resolve_location(client, project_id);

    let hvn = NetworkService::new(client).get_hvn(hvn_id, &location).await?;
    to_state(&hvn)
}
