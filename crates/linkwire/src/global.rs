//! The process-wide client.
//!
//! Applications that want a single shared client call [`init`] once at
//! startup and reach it from anywhere with [`client`]. The instance lives for
//! the rest of the process.

use std::sync::OnceLock;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::{Result, RpcError};

static GLOBAL_CLIENT: OnceLock<Client> = OnceLock::new();

/// Create the process-wide client from `config`.
///
/// # Errors
///
/// [`RpcError::AlreadyInitialized`] if a client was already installed, or
/// any error from [`Client::new`].
pub fn init(config: ClientConfig) -> Result<&'static Client> {
    if GLOBAL_CLIENT.get().is_some() {
        return Err(RpcError::AlreadyInitialized);
    }
    install(Client::new(config)?)
}

/// Install an already built client as the process-wide client.
pub fn install(client: Client) -> Result<&'static Client> {
    GLOBAL_CLIENT
        .set(client)
        .map_err(|_| RpcError::AlreadyInitialized)?;
    tracing::debug!(target: "linkwire::client", "global client installed");
    GLOBAL_CLIENT.get().ok_or(RpcError::AlreadyInitialized)
}

/// The process-wide client, if [`init`] or [`install`] has run.
pub fn client() -> Option<&'static Client> {
    GLOBAL_CLIENT.get()
}
