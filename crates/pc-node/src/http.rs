//! Outbound HTTP: the peer client used for consensus and announcement, and
//! a typed client for a node's public API.
use std::{fmt::Display, time::Duration};

use async_trait::async_trait;
use pc_blockchain::{Block, NewTransaction, Transaction};
use pc_sync::{
    ChainDump, PeerNetwork, PushOutcome, RegisterRequest, RegisterResponse, SyncError,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::NodeError,
    protocol::{ChainView, ConsensusResponse, ErrorResponse, MineResponse, NodeStatus},
};

/// Join a peer address and an endpoint path, assuming `http://` when the
/// address carries no scheme.
pub fn endpoint(address: &str, path: &str) -> String {
    let base = address.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{path}")
    } else {
        format!("http://{base}{path}")
    }
}

fn build_client(timeout: Duration) -> Result<Client, NodeError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| NodeError::Transport(e.to_string()))
}

/// [`PeerNetwork`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpPeerNetwork {
    client: Client,
}

impl HttpPeerNetwork {
    /// Every call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, NodeError> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

fn unreachable(peer: &str, reason: impl Display) -> SyncError {
    SyncError::PeerUnreachable {
        peer: peer.to_string(),
        reason: reason.to_string(),
    }
}

async fn read_body<T: DeserializeOwned>(peer: &str, response: Response) -> Result<T, SyncError> {
    let response = response
        .error_for_status()
        .map_err(|e| unreachable(peer, e))?;
    let body = response.bytes().await.map_err(|e| unreachable(peer, e))?;
    serde_json::from_slice(&body).map_err(|e| SyncError::Decode {
        peer: peer.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl PeerNetwork for HttpPeerNetwork {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainDump, SyncError> {
        let response = self
            .client
            .get(endpoint(peer, "/chain"))
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        read_body(peer, response).await
    }

    async fn push_block(&self, peer: &str, block: &Block) -> Result<PushOutcome, SyncError> {
        let response = self
            .client
            .post(endpoint(peer, "/add_block"))
            .json(block)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(PushOutcome::Accepted)
        } else if status.is_client_error() {
            let reason = response.text().await.unwrap_or_default();
            debug!(%peer, %status, %reason, "block push refused");
            Ok(PushOutcome::Rejected(reason))
        } else {
            Err(unreachable(peer, format!("status {status}")))
        }
    }

    async fn register(
        &self,
        peer: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterResponse, SyncError> {
        let response = self
            .client
            .post(endpoint(peer, "/register_node"))
            .json(request)
            .send()
            .await
            .map_err(|e| unreachable(peer, e))?;
        read_body(peer, response).await
    }
}

/// Typed client for one node's HTTP API.
#[derive(Debug, Clone)]
pub struct NodeClient {
    client: Client,
    address: String,
}

impl NodeClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Result<Self, NodeError> {
        Ok(Self {
            client: build_client(timeout)?,
            address: address.into(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.address, path)
    }

    pub async fn chain(&self) -> Result<ChainView, NodeError> {
        self.get("/chain").await
    }

    pub async fn status(&self) -> Result<NodeStatus, NodeError> {
        self.get("/status").await
    }

    pub async fn pending(&self) -> Result<Vec<Transaction>, NodeError> {
        self.get("/pending_tx").await
    }

    pub async fn mine(&self) -> Result<MineResponse, NodeError> {
        self.get("/mine").await
    }

    pub async fn consensus(&self) -> Result<ConsensusResponse, NodeError> {
        self.get("/consensus").await
    }

    pub async fn submit(
        &self,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), NodeError> {
        let body = NewTransaction::new(author, content);
        let response = self
            .client
            .post(self.url("/new_transaction"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(drop)
    }

    /// Ask the node to register itself with `bootstrap`.
    pub async fn register_with(&self, bootstrap: impl Into<String>) -> Result<(), NodeError> {
        let body = RegisterRequest::new(bootstrap);
        let response = self
            .client
            .post(self.url("/register_with"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(drop)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NodeError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        let body = check(response).await?.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|e| NodeError::Serialisation(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> NodeError {
    NodeError::Transport(e.to_string())
}

/// Turn a non-2xx answer into [`NodeError::Rejected`], carrying the node's
/// `{error}` message when it sent one.
async fn check(response: Response) -> Result<Response, NodeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|e| e.error)
        .unwrap_or_else(|_| describe(status, text));
    Err(NodeError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn describe(status: StatusCode, text: String) -> String {
    if text.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_adds_missing_scheme() {
        assert_eq!(endpoint("127.0.0.1:8001", "/chain"), "http://127.0.0.1:8001/chain");
        assert_eq!(endpoint("http://a:8000/", "/chain"), "http://a:8000/chain");
        assert_eq!(endpoint("https://a", "/mine"), "https://a/mine");
    }

    #[tokio::test]
    async fn unreachable_peer_is_reported_not_fatal() {
        use pc_sync::longest_valid_chain;

        let network = HttpPeerNetwork::new(Duration::from_millis(200)).unwrap();
        // Bind then release a port so nothing is listening on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let peers = vec![format!("http://127.0.0.1:{port}")];
        assert!(network.fetch_chain(&peers[0]).await.is_err());
        assert!(longest_valid_chain(&network, &peers, 1, 2).await.is_none());
    }
}
