//! Wire models for the HCP network service.

use serde::{Deserialize, Serialize};

use crate::link::{Link, Location};
use crate::wait::{Operation, Stateful};

/// Lifecycle state of an HVN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HvnState {
    /// Being provisioned.
    #[default]
    Creating,
    /// Ready for use.
    Stable,
    /// Being torn down.
    Deleting,
    /// Provisioning failed.
    Failed,
    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Cloud-provider details of an HVN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderNetworkData {
    /// Present for AWS-backed HVNs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNetworkData>,
}

/// AWS details of an HVN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AwsNetworkData {
    /// AWS account that hosts the HVN's VPC.
    #[serde(default)]
    pub account_id: String,
}

/// A HashiCorp Virtual Network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Hvn {
    /// HVN id (slug).
    pub id: String,
    /// IPv4 CIDR of the network.
    pub cidr_block: String,
    /// Organization, project and region.
    pub location: Location,
    /// Current state.
    #[serde(default, skip_serializing)]
    pub state: HvnState,
    /// Cloud-provider details.
    #[serde(default, skip_serializing)]
    pub provider_network_data: Option<ProviderNetworkData>,
    /// Creation timestamp (RFC 3339).
    #[serde(default, skip_serializing)]
    pub created_at: String,
}

impl Hvn {
    /// AWS account id hosting the HVN, if known.
    pub fn provider_account_id(&self) -> Option<&str> {
        self.provider_network_data
            .as_ref()
            .and_then(|d| d.aws.as_ref())
            .map(|aws| aws.account_id.as_str())
    }
}

impl Stateful for Hvn {
    type State = HvnState;

    fn state(&self) -> HvnState {
        self.state
    }
}

/// Lifecycle state of a peering connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeeringState {
    /// Being set up on the HCP side.
    #[default]
    Creating,
    /// Waiting for the peer to accept.
    PendingAcceptance,
    /// Accepted; routes are being configured.
    Accepted,
    /// Traffic can flow.
    Active,
    /// Setup failed.
    Failed,
    /// The peer rejected the request.
    Rejected,
    /// The peer did not accept in time.
    Expired,
    /// Being torn down.
    Deleting,
    /// Gone.
    Deleted,
    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl PeeringState {
    /// States a peering never leaves, apart from deletion.
    pub const FAILURES: [PeeringState; 3] = [Self::Failed, Self::Rejected, Self::Expired];
}

/// AWS VPC on the other side of a peering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AwsPeeringTarget {
    /// Account owning the VPC.
    pub account_id: String,
    /// VPC id.
    pub vpc_id: String,
    /// VPC region.
    pub region: String,
    /// VPC CIDR.
    #[serde(default)]
    pub cidr: String,
}

/// Azure VNet on the other side of a peering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AzurePeeringTarget {
    /// Azure AD tenant.
    pub tenant_id: String,
    /// Subscription owning the VNet.
    pub subscription_id: String,
    /// Resource group of the VNet.
    pub resource_group_name: String,
    /// VNet name.
    pub vnet_name: String,
    /// VNet region.
    pub region: String,
}

/// Another HVN on the other side of a peering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HvnPeeringTarget {
    /// Link to the peer HVN.
    pub hvn: Link,
}

/// What an HVN is peered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeeringTarget {
    /// An AWS VPC.
    #[serde(rename = "aws_target")]
    Aws(AwsPeeringTarget),
    /// An Azure VNet.
    #[serde(rename = "azure_target")]
    Azure(AzurePeeringTarget),
    /// Another HVN.
    #[serde(rename = "hvn_target")]
    Hvn(HvnPeeringTarget),
}

impl PeeringTarget {
    /// The cloud provider the target lives in.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Aws(_) => "aws",
            Self::Azure(_) => "azure",
            Self::Hvn(_) => "hcp",
        }
    }
}

/// A peering connection between an HVN and a target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peering {
    /// Peering id.
    pub id: String,
    /// The HVN side.
    pub hvn: Link,
    /// The other side.
    pub target: PeeringTarget,
    /// Current state.
    #[serde(default, skip_serializing)]
    pub state: PeeringState,
    /// Peering id in the target cloud.
    #[serde(default, skip_serializing)]
    pub provider_peering_id: String,
    /// When an unaccepted peering expires (RFC 3339).
    #[serde(default, skip_serializing)]
    pub expires_at: String,
    /// Creation timestamp (RFC 3339).
    #[serde(default, skip_serializing)]
    pub created_at: String,
}

impl Stateful for Peering {
    type State = PeeringState;

    fn state(&self) -> PeeringState {
        self.state
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateHvnRequest<'a> {
    pub network: &'a Hvn,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HvnResponse {
    pub network: Hvn,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateHvnResponse {
    pub network: Hvn,
    pub operation: Operation,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePeeringRequest<'a> {
    pub peering: &'a Peering,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PeeringResponse {
    pub peering: Peering,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePeeringResponse {
    pub peering: Peering,
    pub operation: Operation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::HVN_TYPE;
    use serde_json::json;

    #[test]
    fn test_hvn_deserialize() {
        let hvn: Hvn = serde_json::from_value(json!({
            "id": "main-hvn",
            "cidr_block": "172.25.16.0/20",
            "location": {
                "organization_id": "org-1",
                "project_id": "proj-1",
                "region": {"provider": "aws", "region": "us-west-2"}
            },
            "state": "STABLE",
            "provider_network_data": {"aws": {"account_id": "123456789012"}},
            "created_at": "2021-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(hvn.state, HvnState::Stable);
        assert_eq!(hvn.provider_account_id(), Some("123456789012"));
        assert_eq!(hvn.location.region.as_ref().unwrap().region, "us-west-2");
    }

    #[test]
    fn test_hvn_request_omits_output_fields() {
        let hvn = Hvn {
            id: "main-hvn".to_string(),
            cidr_block: "172.25.16.0/20".to_string(),
            state: HvnState::Stable,
            created_at: "now".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(CreateHvnRequest { network: &hvn }).unwrap();
        assert_eq!(json["network"]["id"], "main-hvn");
        assert!(json["network"].get("state").is_none());
        assert!(json["network"].get("created_at").is_none());
    }

    #[test]
    fn test_peering_target_variants() {
        let peering: Peering = serde_json::from_value(json!({
            "id": "p1",
            "hvn": {"type": HVN_TYPE, "id": "main-hvn", "location": {"project_id": "proj-1"}},
            "target": {"aws_target": {
                "account_id": "123456789012",
                "vpc_id": "vpc-1",
                "region": "us-west-2",
                "cidr": "10.0.0.0/16"
            }},
            "state": "PENDING_ACCEPTANCE"
        }))
        .unwrap();
        assert_eq!(peering.state, PeeringState::PendingAcceptance);
        match &peering.target {
            PeeringTarget::Aws(aws) => assert_eq!(aws.vpc_id, "vpc-1"),
            other => panic!("unexpected target: {:?}", other),
        }
        assert_eq!(peering.target.provider(), "aws");

        let target: PeeringTarget = serde_json::from_value(json!({"azure_target": {
            "tenant_id": "t",
            "subscription_id": "s",
            "resource_group_name": "rg",
            "vnet_name": "vnet",
            "region": "eastus"
        }}))
        .unwrap();
        assert_eq!(target.provider(), "azure");

        let target: PeeringTarget =
            serde_json::from_value(json!({"hvn_target": {"hvn": {"type": HVN_TYPE, "id": "peer"}}}))
                .unwrap();
        assert_eq!(target.provider(), "hcp");
    }

    #[test]
    fn test_unknown_peering_state() {
        let state: PeeringState = serde_json::from_value(json!("SOMETHING_NEW")).unwrap();
        assert_eq!(state, PeeringState::Unknown);
    }
}
