//! HTTP client for the cloud API

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use hostforge_core::ApiSession;

use crate::error::{ClientError, Result};
use crate::types::{
    CreateServerRequest, Firewall, FirewallAttachment, FirewallResponse, FirewallRule,
    FirewallsResponse, Location, LocationsResponse, Server, ServerResponse, ServerType,
    ServerTypesResponse, ServersResponse, SshKey, SshKeyResponse, SshKeysResponse,
};

const DEFAULT_BASE_URL: &str = "https://api.hetzner.cloud/v1/";
const PUBLIC_IP_URL: &str = "https://ipv4.icanhazip.com";

/// Bearer-token client for the cloud provider's REST API
#[derive(Debug, Clone)]
pub struct HcloudClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HcloudClient {
    /// Create a client from a validated operator session
    ///
    /// # Errors
    /// Returns an error if the base URL constant fails to parse, which
    /// would be a programming error surfaced at startup.
    pub fn new(session: &ApiSession) -> Result<Self> {
        Self::with_base_url(session, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint (used by tests)
    ///
    /// # Errors
    /// Returns an error if `base_url` is invalid.
    pub fn with_base_url(session: &ApiSession, base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref())?;
        Ok(Self {
            client: Client::new(),
            base_url,
            token: session.token().to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(ClientError::Url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: impl serde::Serialize) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn put<T: DeserializeOwned>(&self, path: &str, body: impl serde::Serialize) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, message });
        }
        Ok(response.json().await?)
    }

    /// List data-center locations
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        let response: LocationsResponse = self.get("locations").await?;
        Ok(response.locations)
    }

    /// List server types offered at `location`, x86 only, cheapest first
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    pub async fn list_server_types(&self, location: &str) -> Result<Vec<ServerType>> {
        let response: ServerTypesResponse = self.get("server_types").await?;
        let mut types: Vec<ServerType> = response
            .server_types
            .into_iter()
            .filter(|st| {
                st.available_at(location) && matches!(st.architecture.as_str(), "x86" | "x64")
            })
            .collect();
        types.sort_by(|a, b| {
            a.monthly_price()
                .unwrap_or(f64::MAX)
                .total_cmp(&b.monthly_price().unwrap_or(f64::MAX))
        });
        Ok(types)
    }

    /// Whether no existing server already uses `name`
    ///
    /// # Errors
    /// Returns an error if the server list cannot be fetched.
    pub async fn server_name_available(&self, name: &str) -> Result<bool> {
        let response: ServersResponse = self.get("servers").await?;
        Ok(!response.servers.iter().any(|s| s.name == name))
    }

    /// List firewalls
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    pub async fn list_firewalls(&self) -> Result<Vec<Firewall>> {
        let response: FirewallsResponse = self.get("firewalls").await?;
        Ok(response.firewalls)
    }

    /// Create the named firewall with `rules`, or replace the rule set of
    /// an existing firewall of the same name. Returns the firewall id.
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self, rules))]
    pub async fn create_or_update_firewall(
        &self,
        name: &str,
        rules: &[FirewallRule],
    ) -> Result<u64> {
        let existing = self
            .list_firewalls()
            .await?
            .into_iter()
            .find(|fw| fw.name == name);

        let firewall: FirewallResponse = match existing {
            Some(firewall) => {
                debug!(id = firewall.id, "updating existing firewall");
                self.put(
                    &format!("firewalls/{}", firewall.id),
                    serde_json::json!({ "rules": rules }),
                )
                .await?
            }
            None => {
                self.post(
                    "firewalls",
                    serde_json::json!({ "name": name, "rules": rules }),
                )
                .await?
            }
        };
        Ok(firewall.firewall.id)
    }

    /// List registered SSH keys
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    pub async fn list_ssh_keys(&self) -> Result<Vec<SshKey>> {
        let response: SshKeysResponse = self.get("ssh_keys").await?;
        Ok(response.ssh_keys)
    }

    /// Find a registered SSH key by name
    ///
    /// # Errors
    /// Returns an error if the key list cannot be fetched.
    pub async fn find_ssh_key(&self, name: &str) -> Result<Option<SshKey>> {
        Ok(self
            .list_ssh_keys()
            .await?
            .into_iter()
            .find(|key| key.name == name))
    }

    /// Register a public key under `name`
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    pub async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKey> {
        let response: SshKeyResponse = self
            .post(
                "ssh_keys",
                serde_json::json!({ "name": name, "public_key": public_key }),
            )
            .await?;
        Ok(response.ssh_key)
    }

    /// Create a server and return it (including its public IPv4)
    ///
    /// # Errors
    /// Returns an error if the request fails or the API rejects it.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_server(&self, request: &CreateServerRequest) -> Result<Server> {
        let response: ServerResponse = self.post("servers", request).await?;
        Ok(response.server)
    }
}

impl CreateServerRequest {
    /// Assemble a create request for one node
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        server_type: u64,
        image: impl Into<String>,
        location: impl Into<String>,
        firewall_id: u64,
        ssh_key_id: u64,
    ) -> Self {
        Self {
            name: name.into(),
            server_type,
            image: image.into(),
            location: location.into(),
            firewalls: vec![FirewallAttachment {
                firewall: firewall_id,
            }],
            ssh_keys: vec![ssh_key_id],
        }
    }
}

/// Discover the operator's public IPv4, used to restrict SSH sources
///
/// # Errors
/// Returns an error if the lookup service is unreachable.
pub async fn discover_public_ip(client: &Client) -> Result<String> {
    let ip = client
        .get(PUBLIC_IP_URL)
        .send()
        .await?
        .text()
        .await?
        .trim()
        .to_string();
    Ok(ip)
}
