//! Test harness for [`ProviderService`] implementations.
//!
//! Drives a provider the way a plugin host would, without any transport.
//!
//! # Example
//!
//! ```ignore
//! use hcp_provider::testing::ProviderTester;
//! use hcp_provider::HcpProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_hvn() {
//!     let tester = ProviderTester::new(HcpProvider::new());
//!     tester.configure(json!({"access_token": "t", "organization_id": "o", "project_id": "p"}))
//!         .await
//!         .unwrap();
//!
//!     let state = tester
//!         .lifecycle_create(
//!             "hcp_hvn",
//!             json!({"hvn_id": "main-hvn", "cloud_provider": "aws", "region": "us-west-2"}),
//!         )
//!         .await
//!         .unwrap();
//!     assert_eq!(state["hvn_id"], "main-hvn");
//! }
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::HcpError;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::ImportedResource;

/// Wraps a provider and exposes its operations with test-friendly results.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate provider configuration. Fails on any error diagnostic.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider. Fails on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), HcpError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration. Fails on any error diagnostic.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Create a resource.
    pub async fn create(&self, resource_type: &str, config: Value) -> Result<Value, HcpError> {
        self.provider.create(resource_type, config).await
    }

    /// Refresh a resource.
    pub async fn read(&self, resource_type: &str, state: Value) -> Result<Option<Value>, HcpError> {
        self.provider.read(resource_type, state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, HcpError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), HcpError> {
        self.provider.delete(resource_type, state).await
    }

    /// Import a resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, HcpError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, HcpError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Validate, create, then read back. Returns the state after the read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let created = self.create(resource_type, config).await?;
        self.read(resource_type, created)
            .await?
            .ok_or(TestError::Missing)
    }

    /// Delete, then check that a read reports the resource gone.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<(), TestError> {
        self.delete(resource_type, state.clone()).await?;
        match self.read(resource_type, state).await? {
            None => Ok(()),
            Some(remaining) => Err(TestError::StillPresent(remaining)),
        }
    }

    /// Import, then check the imported state reads back unchanged.
    pub async fn lifecycle_import(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Value, TestError> {
        let mut imported = self.import_resource(resource_type, id).await?;
        let state = match imported.pop() {
            Some(resource) if imported.is_empty() => resource.state,
            _ => return Err(TestError::Missing),
        };
        let refreshed = self
            .read(resource_type, state.clone())
            .await?
            .ok_or(TestError::Missing)?;
        if refreshed != state {
            return Err(TestError::Drift {
                expected: state,
                actual: refreshed,
            });
        }
        Ok(state)
    }
}

/// Failure of a [`ProviderTester`] call.
#[derive(Debug)]
pub enum TestError {
    /// The operation returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The provider returned an error.
    Provider(HcpError),
    /// A read after create or import found nothing.
    Missing,
    /// A read after delete still found the resource.
    StillPresent(Value),
    /// A read returned different state than the preceding operation.
    Drift {
        /// State from the operation.
        expected: Value,
        /// State from the read.
        actual: Value,
    },
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
            TestError::Missing => write!(f, "Resource not found after the operation"),
            TestError::StillPresent(state) => {
                write!(f, "Resource still present after delete: {}", state)
            },
            TestError::Drift { expected, actual } => {
                write!(f, "State drifted on read: expected {}, got {}", expected, actual)
            },
        }
    }
}

impl std::error::Error for TestError {}

impl From<HcpError> for TestError {
    fn from(e: HcpError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that some error diagnostic is attached to `attribute`.
///
/// # Panics
///
/// Panics if no error diagnostic names the attribute.
pub fn assert_error_on(diagnostics: &[Diagnostic], attribute: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.is_error() && d.attribute.as_deref() == Some(attribute));
    assert!(
        found,
        "Expected an error on '{}', but got errors on {:?}",
        attribute,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.attribute.as_deref().unwrap_or("<root>"))
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Schema};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Keeps state in memory, keyed by `name`.
    #[derive(Default)]
    struct MemoryProvider {
        objects: Mutex<HashMap<String, Value>>,
    }

    #[async_trait::async_trait]
    impl ProviderService for MemoryProvider {
        fn schema(&self) -> ProviderSchema {
            ProviderSchema::new().with_resource(
                "memory_object",
                Schema::v0()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("id", Attribute::computed_string()),
            )
        }

        async fn configure(&self, _config: Value) -> Result<Vec<Diagnostic>, HcpError> {
            Ok(vec![])
        }

        async fn create(&self, _resource_type: &str, config: Value) -> Result<Value, HcpError> {
            let name = config["name"].as_str().unwrap_or_default().to_string();
            let state = json!({"name": name, "id": format!("obj-{}", name)});
            self.objects.lock().unwrap().insert(name, state.clone());
            Ok(state)
        }

        async fn read(
            &self,
            _resource_type: &str,
            state: Value,
        ) -> Result<Option<Value>, HcpError> {
            let name = state["name"].as_str().unwrap_or_default();
            Ok(self.objects.lock().unwrap().get(name).cloned())
        }

        async fn update(
            &self,
            _resource_type: &str,
            _prior_state: Value,
            planned_state: Value,
        ) -> Result<Value, HcpError> {
            Ok(planned_state)
        }

        async fn delete(&self, _resource_type: &str, state: Value) -> Result<(), HcpError> {
            let name = state["name"].as_str().unwrap_or_default();
            self.objects.lock().unwrap().remove(name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lifecycle_create_and_delete() {
        let tester = ProviderTester::new(MemoryProvider::default());
        let state = tester
            .lifecycle_create("memory_object", json!({"name": "a"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "obj-a");

        tester.lifecycle_delete("memory_object", state).await.unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_create_rejects_invalid_config() {
        let tester = ProviderTester::new(MemoryProvider::default());
        let err = tester
            .lifecycle_create("memory_object", json!({}))
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diags) => assert_error_on(&diags, "name"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_default_import_is_unsupported() {
        let tester = ProviderTester::new(MemoryProvider::default());
        let err = tester.lifecycle_import("memory_object", "a").await.unwrap_err();
        assert!(matches!(err, TestError::Provider(HcpError::UnknownResource(_))));
    }

    #[tokio::test]
    async fn test_resource_types() {
        let tester = ProviderTester::new(MemoryProvider::default());
        assert_eq!(tester.resource_types(), vec!["memory_object"]);
        assert!(tester.data_source_types().is_empty());
    }

    #[test]
    fn test_assert_no_errors() {
        assert_no_errors(&[Diagnostic::warning("Just a warning")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("An error")]);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("hvn_id"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("First error"));
        assert!(display.contains("Second error"));
        assert!(display.contains("hvn_id"));
        assert!(display.contains("More info"));

        let drift = TestError::Drift {
            expected: json!({"state": "STABLE"}),
            actual: json!({"state": "DELETING"}),
        };
        assert!(drift.to_string().contains("DELETING"));
    }
}
