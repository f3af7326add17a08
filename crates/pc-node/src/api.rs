//! The node's HTTP API.
use std::{future::Future, time::Instant};

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header::HOST, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pc_blockchain::{Block, BlockchainError, NewTransaction, Transaction};
use pc_sync::{RegisterRequest, RegisterResponse, SyncError};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    error::NodeError,
    node::{MineOutcome, Node},
    protocol::{
        ChainView, ConsensusResponse, ErrorResponse, MessageResponse, MineResponse, NodeStatus,
    },
};

/// Error answer of a handler: a status code plus `{error}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        let status = match &err {
            NodeError::Blockchain(BlockchainError::MiningCancelled) | NodeError::TipMoved { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            NodeError::Blockchain(_)
            | NodeError::Transaction(_)
            | NodeError::EmptyPeerAddress => StatusCode::BAD_REQUEST,
            NodeError::Sync(SyncError::PeerUnreachable { .. } | SyncError::Decode { .. })
            | NodeError::UntrustedBootstrap { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status.as_u16(), error = %self.message, "request failed");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Logs method, path, status, duration and node state of every request.
async fn log_requests(State(node): State<Node>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        node_state = node.state().label(),
        "api.request"
    );
    response
}

pub fn router(node: Node) -> Router {
    Router::new()
        .route("/new_transaction", post(new_transaction))
        .route("/chain", get(chain))
        .route("/mine", get(mine))
        .route("/pending_tx", get(pending_tx))
        .route("/add_block", post(add_block))
        .route("/register_node", post(register_node))
        .route("/register_with", post(register_with))
        .route("/consensus", get(consensus))
        .route("/status", get(status))
        .layer(middleware::from_fn_with_state(node.clone(), log_requests))
        .with_state(node)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(node: Node, listener: TcpListener, shutdown: F) -> Result<(), NodeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP API listening");
    }
    axum::serve(listener, router(node))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────────────

async fn new_transaction(
    State(node): State<Node>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(new_tx) = payload?;
    node.submit_transaction(new_tx).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("Success"))))
}

async fn chain(State(node): State<Node>) -> Json<ChainView> {
    Json(node.chain_view().await)
}

async fn mine(State(node): State<Node>) -> Result<Json<MineResponse>, ApiError> {
    let response = match node.mine().await? {
        MineOutcome::NothingToMine => MineResponse {
            message: "No transactions to mine".into(),
            chain_length: node.len().await,
            transactions: Vec::new(),
        },
        MineOutcome::Mined { block, kept } => MineResponse {
            message: if kept {
                format!("Block #{} mined", block.index)
            } else {
                format!(
                    "Block #{} mined but replaced by a longer peer chain",
                    block.index
                )
            },
            chain_length: node.len().await,
            transactions: block.transactions,
        },
    };
    Ok(Json(response))
}

async fn pending_tx(State(node): State<Node>) -> Json<Vec<Transaction>> {
    Json(node.pending().await)
}

async fn add_block(
    State(node): State<Node>,
    payload: Result<Json<Block>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(block) = payload?;
    node.accept_block(block).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Block added to the chain")),
    ))
}

async fn register_node(
    State(node): State<Node>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(request) = payload?;
    let response = node.register_peer(&request.node_address).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Register this node with the bootstrap node named in the body.
///
/// Without a configured public address we advertise the host the client
/// used to reach us.
async fn register_with(
    State(node): State<Node>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload?;
    let own = node.config().public_address.clone().or_else(|| {
        headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("http://{host}"))
    });
    let length = node.register_with(&request.node_address, own).await?;
    Ok(Json(MessageResponse::new(format!(
        "Registration successful, chain length {length}"
    ))))
}

async fn consensus(State(node): State<Node>) -> Json<ConsensusResponse> {
    let replaced = node.consensus().await;
    Json(ConsensusResponse {
        replaced,
        chain_length: node.len().await,
    })
}

async fn status(State(node): State<Node>) -> Json<NodeStatus> {
    Json(node.status().await)
}
