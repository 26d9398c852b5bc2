//! The provider surface: a CRUD trait over JSON state and its HCP implementation.
//!
//! [`ProviderService`] is the seam a plugin transport would drive. It uses
//! plain Rust types so it can be exercised directly, see
//! [`ProviderTester`](crate::testing::ProviderTester).

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{ClientConfig, HcpClient};
use crate::error::HcpError;
use crate::resources::{self, hvn, peering, AWS_NETWORK_PEERING, HVN};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::types::{ImportedResource, ProviderMetadata};
use crate::validation::validate;

/// Operations a provider implements.
///
/// `read` returns `Ok(None)` when the remote object is gone, which tells the
/// caller to drop it from state.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Schemas of the provider config, resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    /// Check provider configuration without applying it.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, HcpError> {
        Ok(validate(&self.schema().provider, &config))
    }

    /// Apply provider configuration (credentials, organization, project).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, HcpError>;

    /// Stop the provider, cancelling any in-flight waits.
    async fn stop(&self) -> Result<(), HcpError> {
        Ok(())
    }

    /// Check a resource configuration against its schema.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, HcpError> {
        let schema = self.schema();
        let resource = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| HcpError::UnknownResource(resource_type.to_string()))?;
        Ok(validate(resource, &config))
    }

    /// Create a resource and return its state.
    async fn create(&self, resource_type: &str, config: Value) -> Result<Value, HcpError>;

    /// Refresh a resource. `Ok(None)` means it no longer exists.
    async fn read(&self, resource_type: &str, state: Value) -> Result<Option<Value>, HcpError>;

    /// Update a resource in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, HcpError>;

    /// Delete a resource. Deleting something already gone succeeds.
    async fn delete(&self, resource_type: &str, state: Value) -> Result<(), HcpError>;

    /// Bring existing infrastructure under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, HcpError> {
        Err(HcpError::UnknownResource(format!(
            "import is not supported for {}",
            resource_type
        )))
    }

    /// Check a data source configuration against its schema.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, HcpError> {
        let schema = self.schema();
        let data_source = schema
            .data_sources
            .get(data_source_type)
            .ok_or_else(|| HcpError::UnknownResource(data_source_type.to_string()))?;
        Ok(validate(data_source, &config))
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, HcpError> {
        Err(HcpError::UnknownResource(data_source_type.to_string()))
    }
}

/// HCP provider serving HVNs and AWS network peerings.
#[derive(Debug, Default)]
pub struct HcpProvider {
    client: RwLock<Option<Arc<HcpClient>>>,
    shutdown: CancellationToken,
}

impl HcpProvider {
    /// An unconfigured provider. Call [`ProviderService::configure`] before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that uses an already-built client.
    pub fn with_client(client: HcpClient) -> Self {
        Self {
            client: RwLock::new(Some(Arc::new(client))),
            shutdown: CancellationToken::new(),
        }
    }

    async fn client(&self) -> Result<Arc<HcpClient>, HcpError> {
        self.client.read().await.clone().ok_or_else(|| {
            HcpError::Configuration("provider is not configured".to_string())
        })
    }

    /// Reject malformed input before anything is sent to HCP.
    fn check_config(&self, resource_type: &str, config: &Value) -> Result<(), HcpError> {
        let schema = resource_schema(resource_type)?;
        let problems: Vec<String> = validate(&schema, config)
            .into_iter()
            .filter(Diagnostic::is_error)
            .map(|d| match d.detail {
                Some(detail) => format!("{}: {}", d.summary, detail),
                None => d.summary,
            })
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(HcpError::Validation(problems.join("; ")))
        }
    }
}

fn resource_schema(resource_type: &str) -> Result<Schema, HcpError> {
    match resource_type {
        HVN => Ok(hvn::schema()),
        AWS_NETWORK_PEERING => Ok(peering::schema()),
        other => Err(HcpError::UnknownResource(other.to_string())),
    }
}

/// Schema of the provider block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute("client_id", Attribute::optional_string())
        .with_attribute("client_secret", Attribute::optional_string().sensitive())
        .with_attribute("access_token", Attribute::optional_string().sensitive())
        .with_attribute("organization_id", Attribute::optional_string())
        .with_attribute("project_id", Attribute::optional_string())
        .with_attribute("api_url", Attribute::optional_string())
        .with_attribute("auth_url", Attribute::optional_string())
        .with_attribute("poll_interval_secs", Attribute::optional_int64())
        .with_attribute("max_read_attempts", Attribute::optional_int64())
}

#[async_trait::async_trait]
impl ProviderService for HcpProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(HVN, hvn::schema())
            .with_resource(AWS_NETWORK_PEERING, peering::schema())
            .with_data_source(HVN, hvn::data_source_schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, HcpError> {
        let mut diagnostics = validate(&provider_config_schema(), &config);
        if diagnostics.is_empty() {
            if let Err(e) = ClientConfig::from_value(config).and_then(|c| c.validate()) {
                diagnostics.push(e.into());
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, HcpError> {
        let config = ClientConfig::from_value(config)?;
        match HcpClient::new(&config) {
            Ok(client) => {
                info!(
                    organization_id = %config.organization_id,
                    project_id = %config.project_id,
                    "Provider configured"
                );
                *self.client.write().await = Some(Arc::new(client));
                Ok(vec![])
            },
            Err(e) => {
                warn!(error = %e, "Provider configuration rejected");
                Ok(vec![e.into()])
            },
        }
    }

    async fn stop(&self) -> Result<(), HcpError> {
        info!("Stopping provider, cancelling in-flight waits");
        self.shutdown.cancel();
        Ok(())
    }

    #[instrument(skip(self, config))]
    async fn create(&self, resource_type: &str, config: Value) -> Result<Value, HcpError> {
        self.check_config(resource_type, &config)?;
        let client = self.client().await?;
        let result = match resource_type {
            HVN => hvn::create(&client, &config, &self.shutdown).await,
            AWS_NETWORK_PEERING => peering::create(&client, &config, &self.shutdown).await,
            other => Err(HcpError::UnknownResource(other.to_string())),
        };
        if let Err(e) = &result {
            error!(error = %e, "Create failed");
        }
        result
    }

    #[instrument(skip(self, state))]
    async fn read(&self, resource_type: &str, state: Value) -> Result<Option<Value>, HcpError> {
        let client = self.client().await?;
        debug!("Refreshing resource");
        match resource_type {
            HVN => hvn::read(&client, &state).await,
            AWS_NETWORK_PEERING => peering::read(&client, &state).await,
            other => Err(HcpError::UnknownResource(other.to_string())),
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, HcpError> {
        self.check_config(resource_type, &planned_state)?;
        let schema = resource_schema(resource_type)?;
        resources::update_in_place(&schema, &prior_state, &planned_state)
    }

    #[instrument(skip(self, state))]
    async fn delete(&self, resource_type: &str, state: Value) -> Result<(), HcpError> {
        let client = self.client().await?;
        let result = match resource_type {
            HVN => hvn::delete(&client, &state, &self.shutdown).await,
            AWS_NETWORK_PEERING => peering::delete(&client, &state, &self.shutdown).await,
            other => Err(HcpError::UnknownResource(other.to_string())),
        };
        if let Err(e) = &result {
            error!(error = %e, "Delete failed");
        }
        result
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, HcpError> {
        let client = self.client().await?;
        let imported = match resource_type {
            HVN => hvn::import(&client, id).await?,
            AWS_NETWORK_PEERING => peering::import(&client, id).await?,
            other => return Err(HcpError::UnknownResource(other.to_string())),
        };
        info!("Import completed");
        Ok(vec![imported])
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, HcpError> {
        let client = self.client().await?;
        match data_source_type {
            HVN => hvn::read_data_source(&client, &config).await,
            other => Err(HcpError::UnknownResource(other.to_string())),
        }
    }
}
