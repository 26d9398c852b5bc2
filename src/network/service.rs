//! Typed calls against the HCP network service.

use tracing::{debug, instrument};

use crate::client::HcpClient;
use crate::error::HcpError;
use crate::link::Location;
use crate::network::models::{
    CreateHvnRequest, CreateHvnResponse, CreatePeeringRequest, CreatePeeringResponse, Hvn,
    HvnResponse, Peering, PeeringResponse, PeeringState,
};
use crate::wait::operation::OperationResponse;
use crate::wait::{NotFoundPolicy, Operation, StateWaiter, WaitContext, WaitOutcome};

const API_VERSION: &str = "2020-09-07";

/// HVN and peering operations for one client.
#[derive(Debug, Clone, Copy)]
pub struct NetworkService<'a> {
    client: &'a HcpClient,
}

impl<'a> NetworkService<'a> {
    /// Wrap a client.
    pub fn new(client: &'a HcpClient) -> Self {
        Self { client }
    }

    fn networks_path(location: &Location) -> String {
        format!(
            "/network/{}/organizations/{}/projects/{}/networks",
            API_VERSION, location.organization_id, location.project_id
        )
    }

    fn peerings_path(location: &Location, hvn_id: &str) -> String {
        format!("{}/{}/peerings", Self::networks_path(location), hvn_id)
    }

    /// Start creating an HVN. Returns the pending HVN and the operation to wait on.
    #[instrument(skip(self, hvn), fields(hvn_id = %hvn.id))]
    pub async fn create_hvn(&self, hvn: &Hvn) -> Result<(Hvn, Operation), HcpError> {
        let path = Self::networks_path(&hvn.location);
        let response: CreateHvnResponse = self
            .client
            .post(&path, &CreateHvnRequest { network: hvn })
            .await?;
        debug!(operation_id = %response.operation.id, "HVN create started");
        Ok((response.network, response.operation))
    }

    /// Fetch an HVN.
    pub async fn get_hvn(&self, hvn_id: &str, location: &Location) -> Result<Hvn, HcpError> {
        let path = format!("{}/{}", Self::networks_path(location), hvn_id);
        let response: HvnResponse = self.client.get(&path).await?;
        Ok(response.network)
    }

    /// Start deleting an HVN.
    #[instrument(skip(self, location))]
    pub async fn delete_hvn(
        &self,
        hvn_id: &str,
        location: &Location,
    ) -> Result<Operation, HcpError> {
        let path = format!("{}/{}", Self::networks_path(location), hvn_id);
        let response: OperationResponse = self.client.delete(&path).await?;
        Ok(response.operation)
    }

    /// Start creating a peering from `peering.hvn`.
    #[instrument(
        skip(self, peering, location),
        fields(peering_id = %peering.id, target = peering.target.provider())
    )]
    pub async fn create_peering(
        &self,
        peering: &Peering,
        location: &Location,
    ) -> Result<(Peering, Operation), HcpError> {
        let path = Self::peerings_path(location, &peering.hvn.id);
        let response: CreatePeeringResponse = self
            .client
            .post(&path, &CreatePeeringRequest { peering })
            .await?;
        Ok((response.peering, response.operation))
    }

    /// Fetch a peering.
    pub async fn get_peering(
        &self,
        hvn_id: &str,
        peering_id: &str,
        location: &Location,
    ) -> Result<Peering, HcpError> {
        let path = format!("{}/{}", Self::peerings_path(location, hvn_id), peering_id);
        let response: PeeringResponse = self.client.get(&path).await?;
        Ok(response.peering)
    }

    /// Start deleting a peering.
    #[instrument(skip(self, location))]
    pub async fn delete_peering(
        &self,
        hvn_id: &str,
        peering_id: &str,
        location: &Location,
    ) -> Result<Operation, HcpError> {
        let path = format!("{}/{}", Self::peerings_path(location, hvn_id), peering_id);
        let response: OperationResponse = self.client.delete(&path).await?;
        Ok(response.operation)
    }

    /// Wait until a peering reaches one of `targets`.
    ///
    /// Failed, rejected and expired peerings end the wait with an error.
    pub async fn wait_for_peering(
        &self,
        ctx: &WaitContext,
        hvn_id: &str,
        peering_id: &str,
        location: &Location,
        targets: &[PeeringState],
        not_found: NotFoundPolicy,
    ) -> Result<WaitOutcome<Peering>, HcpError> {
        let action = format!("wait for peering {} to become {:?}", peering_id, targets);
        StateWaiter::new(targets.iter().copied())
            .with_failures(PeeringState::FAILURES)
            .with_poll_interval(self.client.poll_interval())
            .with_not_found(not_found)
            .wait(ctx, &action, || self.get_peering(hvn_id, peering_id, location))
            .await
    }
}
