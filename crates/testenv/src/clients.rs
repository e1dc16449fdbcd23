//! Account-bound clients over both chain transports.
//!
//! Client construction is injected through [`ClientFactory`]. The provisioner
//! calls it once per (account, transport) pair and has no contract logic of
//! its own.

use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    transports::ws::WsConnect,
};
use async_trait::async_trait;
use serde::Serialize;
use std::{fmt, time::Duration};
use tracing::debug;
use url::Url;

use crate::{
    accounts::Account,
    error::{Result, TestEnvError},
    registry::AddressRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Polling request/response.
    Http,
    /// Push-based streaming.
    Ws,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Ws => "ws",
        })
    }
}

/// Where a client connects. Both transports of one environment point at the
/// same chain process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub transport: Transport,
    pub url: String,
}

impl Endpoint {
    pub fn new(transport: Transport, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

/// An account paired with the endpoint its client talks to.
#[derive(Debug, Clone)]
pub struct AccountBinding {
    pub account: Account,
    pub endpoint: Endpoint,
    pub poll_interval: Duration,
}

impl AccountBinding {
    /// Wallet provider signing as the bound account.
    pub async fn connect(&self) -> Result<DynProvider> {
        let builder = ProviderBuilder::new().wallet(self.account.wallet());

        let provider = match self.endpoint.transport {
            Transport::Http => {
                let url: Url = self.endpoint.url.parse().map_err(|e| {
                    TestEnvError::Client(format!("invalid endpoint {}: {e}", self.endpoint.url))
                })?;
                builder.connect_http(url).erased()
            }
            Transport::Ws => builder
                .connect_ws(WsConnect::new(self.endpoint.url.clone()))
                .await
                .map_err(|e| {
                    TestEnvError::Client(format!("connect {}: {e}", self.endpoint.url))
                })?
                .erased(),
        };

        provider.client().set_poll_interval(self.poll_interval);
        Ok(provider)
    }
}

/// Builds one client for an account on one transport.
///
/// Returning `Ok(None)` is valid and means the caller only needs wallet-level
/// access.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    type Client: Send + Sync;

    async fn make_client(
        &self,
        binding: &AccountBinding,
        registry: &AddressRegistry,
    ) -> Result<Option<Self::Client>>;
}

/// Factory that never builds a client.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClients;

#[async_trait]
impl ClientFactory for NoClients {
    type Client = ();

    async fn make_client(
        &self,
        _binding: &AccountBinding,
        _registry: &AddressRegistry,
    ) -> Result<Option<()>> {
        Ok(None)
    }
}

/// Factory returning a plain wallet provider per binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalletClients;

#[async_trait]
impl ClientFactory for WalletClients {
    type Client = DynProvider;

    async fn make_client(
        &self,
        binding: &AccountBinding,
        _registry: &AddressRegistry,
    ) -> Result<Option<DynProvider>> {
        binding.connect().await.map(Some)
    }
}

/// The clients of one account, one per transport.
#[derive(Debug, Clone)]
pub struct PartyClients<C> {
    pub http: Option<C>,
    pub ws: Option<C>,
}

impl<C> Default for PartyClients<C> {
    fn default() -> Self {
        Self {
            http: None,
            ws: None,
        }
    }
}

impl<C> PartyClients<C> {
    pub fn get(&self, transport: Transport) -> Option<&C> {
        match transport {
            Transport::Http => self.http.as_ref(),
            Transport::Ws => self.ws.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.ws.is_none()
    }
}

/// Invoke `factory` once per endpoint for `account`.
pub async fn make_clients<F: ClientFactory + ?Sized>(
    factory: &F,
    account: &Account,
    endpoints: &[Endpoint],
    registry: &AddressRegistry,
    poll_interval: Duration,
) -> Result<PartyClients<F::Client>> {
    let mut clients = PartyClients::default();

    for endpoint in endpoints {
        let binding = AccountBinding {
            account: account.clone(),
            endpoint: endpoint.clone(),
            poll_interval,
        };
        let client = factory.make_client(&binding, registry).await?;
        debug!(
            account = %account.address(),
            transport = %endpoint.transport,
            built = client.is_some(),
            "client provisioned"
        );

        match endpoint.transport {
            Transport::Http => clients.http = client,
            Transport::Ws => clients.ws = client,
        }
    }

    Ok(clients)
}
