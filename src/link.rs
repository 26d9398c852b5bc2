//! Resource locations and links.
//!
//! A [`Link`] identifies an HCP resource by type, id and [`Location`]. Its
//! string form is what gets persisted as the resource id in state:
//!
//! ```text
//! /project/{project_id}/{type}/{id}
//! ```
//!
//! The organization is not part of that string, so decoding needs it supplied
//! separately (see [`decode_with_org`]). The older preview API embedded the
//! organization instead; [`LinkVersion::Preview`] speaks that format.
//!
//! # Example
//!
//! ```
//! use hcp_provider::link::{decode, encode, Link, Location};
//!
//! let link = Link::new(
//!     "hashicorp.network.hvn",
//!     "test-hvn",
//!     Location::new("", "proj-1"),
//! );
//! let url = encode(&link).unwrap();
//! assert_eq!(url, "/project/proj-1/hashicorp.network.hvn/test-hvn");
//!
//! let back = decode(&url, "hashicorp.network.hvn").unwrap();
//! assert_eq!(back.id, "test-hvn");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::HcpError;

/// Resource type tag for HashiCorp Virtual Networks.
pub const HVN_TYPE: &str = "hashicorp.network.hvn";

/// Resource type tag for network peerings.
pub const PEERING_TYPE: &str = "hashicorp.network.peering";

/// Cloud provider and region a resource lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Region {
    /// Cloud provider, e.g. `aws` or `azure`.
    pub provider: String,
    /// Provider region, e.g. `us-west-2`.
    pub region: String,
}

impl Region {
    /// Create a new region.
    pub fn new(provider: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
        }
    }
}

/// The scope a resource belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Location {
    /// Owning organization.
    #[serde(default)]
    pub organization_id: String,
    /// Owning project.
    #[serde(default)]
    pub project_id: String,
    /// Region, for regional resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

impl Location {
    /// Create a location without a region.
    pub fn new(organization_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            project_id: project_id.into(),
            region: None,
        }
    }

    /// Attach a region to this location.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }
}

/// A typed reference to an HCP resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Link {
    /// Resource type tag, e.g. `hashicorp.network.hvn`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource id.
    pub id: String,
    /// Where the resource lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Link {
    /// Create a link with a location.
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            location: Some(location),
        }
    }

    /// The organization id, or an empty string if there is no location.
    pub fn organization_id(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.organization_id.as_str())
            .unwrap_or_default()
    }

    /// The project id, or an empty string if there is no location.
    pub fn project_id(&self) -> &str {
        self.location
            .as_ref()
            .map(|l| l.project_id.as_str())
            .unwrap_or_default()
    }
}

/// Which string format a link is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkVersion {
    /// `/project/{project_id}/{type}/{id}`.
    #[default]
    Stable,
    /// `/organization/{organization_id}/project/{project_id}/{type}/{id}`.
    Preview,
}

impl LinkVersion {
    /// Encode a link in this format.
    pub fn encode(self, link: &Link) -> Result<String, HcpError> {
        let location = link
            .location
            .as_ref()
            .ok_or_else(|| HcpError::InvalidLink("location must not be empty".to_string()))?;

        if location.project_id.is_empty() {
            return Err(HcpError::InvalidLink(
                "project id must not be empty".to_string(),
            ));
        }
        if link.resource_type.is_empty() {
            return Err(HcpError::InvalidLink("type must not be empty".to_string()));
        }
        if link.id.is_empty() {
            return Err(HcpError::InvalidLink("id must not be empty".to_string()));
        }

        match self {
            Self::Stable => Ok(format!(
                "/project/{}/{}/{}",
                location.project_id, link.resource_type, link.id
            )),
            Self::Preview => {
                if location.organization_id.is_empty() {
                    return Err(HcpError::InvalidLink(
                        "organization id must not be empty".to_string(),
                    ));
                }
                Ok(format!(
                    "/organization/{}/project/{}/{}/{}",
                    location.organization_id, location.project_id, link.resource_type, link.id
                ))
            },
        }
    }

    /// Decode a link from this format.
    ///
    /// An empty `expected_type` accepts any resource type.
    pub fn decode(self, url: &str, expected_type: &str) -> Result<Link, HcpError> {
        let malformed = || {
            HcpError::MalformedLink(format!(
                "{:?} does not match {}",
                url,
                self.pattern(expected_type)
            ))
        };

        let rest = url.strip_prefix('/').ok_or_else(malformed)?;
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(malformed());
        }

        let (organization_id, project_id, resource_type, id) = match (self, segments.as_slice()) {
            (Self::Stable, ["project", project, ty, id]) => ("", *project, *ty, *id),
            (Self::Preview, ["organization", org, "project", project, ty, id]) => {
                (*org, *project, *ty, *id)
            },
            _ => return Err(malformed()),
        };

        if !expected_type.is_empty() && resource_type != expected_type {
            return Err(malformed());
        }

        Ok(Link {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            location: Some(Location::new(organization_id, project_id)),
        })
    }

    fn pattern(self, expected_type: &str) -> String {
        let ty = if expected_type.is_empty() {
            "{type}"
        } else {
            expected_type
        };
        match self {
            Self::Stable => format!("/project/{{project_id}}/{}/{{id}}", ty),
            Self::Preview => format!(
                "/organization/{{organization_id}}/project/{{project_id}}/{}/{{id}}",
                ty
            ),
        }
    }
}

/// Encode a link as `/project/{project_id}/{type}/{id}`.
pub fn encode(link: &Link) -> Result<String, HcpError> {
    LinkVersion::Stable.encode(link)
}

/// Decode a `/project/{project_id}/{type}/{id}` string.
///
/// The returned link's `organization_id` is empty.
pub fn decode(url: &str, expected_type: &str) -> Result<Link, HcpError> {
    LinkVersion::Stable.decode(url, expected_type)
}

/// Decode a link and fill in the organization id, which the string form lacks.
pub fn decode_with_org(
    url: &str,
    expected_type: &str,
    organization_id: &str,
) -> Result<Link, HcpError> {
    let mut link = decode(url, expected_type)?;
    if let Some(location) = link.location.as_mut() {
        location.organization_id = organization_id.to_string();
    }
    Ok(link)
}

/// Split a colon-delimited import id into exactly `parts` non-empty pieces.
///
/// ```
/// use hcp_provider::link::parse_import_id;
///
/// let parts = parse_import_id("my-hvn:my-peering", 2).unwrap();
/// assert_eq!(parts, vec!["my-hvn", "my-peering"]);
/// assert!(parse_import_id("my-hvn", 2).is_err());
/// ```
pub fn parse_import_id(id: &str, parts: usize) -> Result<Vec<String>, HcpError> {
    let pieces: Vec<&str> = id.split(':').collect();
    if pieces.len() != parts || pieces.iter().any(|p| p.is_empty()) {
        let expected = (1..=parts)
            .map(|i| format!("{{part{}}}", i))
            .collect::<Vec<_>>()
            .join(":");
        return Err(HcpError::MalformedImportId(format!(
            "expected {}, got {:?}",
            expected, id
        )));
    }
    Ok(pieces.into_iter().map(str::to_string).collect())
}
