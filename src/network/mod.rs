//! HCP network service: HashiCorp Virtual Networks and peerings.

pub mod models;
pub mod service;

pub use models::{
    AwsPeeringTarget, AzurePeeringTarget, Hvn, HvnPeeringTarget, HvnState, Peering, PeeringState,
    PeeringTarget,
};
pub use service::NetworkService;
