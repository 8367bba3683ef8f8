//! Wire models for the cloud API subset hostforge consumes

use serde::{Deserialize, Serialize};

/// Data-center location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    pub name: String,
    pub description: String,
}

/// Per-location pricing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub location: String,
    pub price_monthly: PriceValue,
}

/// Net/gross price pair; the API serializes amounts as strings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceValue {
    pub net: String,
}

/// Server type (hardware plan)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerType {
    pub id: u64,
    pub name: String,
    pub cores: u32,
    pub memory: f64,
    pub disk: u64,
    pub architecture: String,
    pub prices: Vec<Price>,
}

impl ServerType {
    /// Monthly net price at the first listed location, if parseable
    #[must_use]
    pub fn monthly_price(&self) -> Option<f64> {
        self.prices.first()?.price_monthly.net.parse().ok()
    }

    /// Whether this type is priced (offered) at `location`
    #[must_use]
    pub fn available_at(&self, location: &str) -> bool {
        self.prices.iter().any(|p| p.location == location)
    }
}

/// Firewall rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallRule {
    pub direction: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub source_ips: Vec<String>,
}

/// Firewall resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Firewall {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
}

/// Registered SSH public key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    pub id: u64,
    pub name: String,
}

/// Public network attachment of a server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicNet {
    pub ipv4: Ipv4Address,
}

/// IPv4 assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ipv4Address {
    pub ip: String,
}

/// Cloud server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: u64,
    pub name: String,
    pub public_net: PublicNet,
}

impl Server {
    /// Public IPv4 address of the server
    #[must_use]
    pub fn ipv4(&self) -> &str {
        &self.public_net.ipv4.ip
    }
}

/// Firewall attachment in a create-server request
#[derive(Debug, Clone, Serialize)]
pub struct FirewallAttachment {
    pub firewall: u64,
}

/// Request body for server creation
#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub server_type: u64,
    pub image: String,
    pub location: String,
    pub firewalls: Vec<FirewallAttachment>,
    pub ssh_keys: Vec<u64>,
}

// Response envelopes

#[derive(Debug, Deserialize)]
pub(crate) struct LocationsResponse {
    pub locations: Vec<Location>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerTypesResponse {
    pub server_types: Vec<ServerType>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FirewallsResponse {
    pub firewalls: Vec<Firewall>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FirewallResponse {
    pub firewall: Firewall,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SshKeysResponse {
    pub ssh_keys: Vec<SshKey>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SshKeyResponse {
    pub ssh_key: SshKey,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServersResponse {
    pub servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerResponse {
    pub server: Server,
}
