//! hostforge-hcloud: Hetzner Cloud API collaborator
//!
//! Typed models and a bearer-token client for the subset of the cloud
//! API this tool consumes: servers, locations, server types, firewalls
//! and SSH keys. Responses are treated as sources of a host address and
//! key material; resource lifecycle beyond that is the provider's
//! concern.

pub mod client;
pub mod error;
pub mod firewall;
pub mod types;

pub use client::{HcloudClient, discover_public_ip};
pub use error::ClientError;
pub use firewall::{all_sources, build_firewall_rules};
pub use types::{
    CreateServerRequest, Firewall, FirewallRule, Location, Server, ServerType, SshKey,
};
