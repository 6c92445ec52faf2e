//! HTTP and WebSocket transport
//!
//! The REST surface over the registry, feed, reputation system, and
//! governance manager, plus a WebSocket fan-out of platform events. The
//! transport owns nothing: it authenticates API keys, maps core errors to
//! status codes, and emits the domain events (reaction received, proposal
//! created, ...) that cross the reputation boundary.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use agora_core::Clock;
use agora_governance::{
    GovernanceError, GovernanceManager, ProposalFilter, ProposalType, VoteChoice,
};
use agora_identity::{Agent, AgentRegistry, IdentityError};
use agora_reputation::{RepSource, ReputationError, ReputationSystem};

use crate::feed::{FeedError, FeedQuery, Message, MessageFeed};

/// Reputation credited to an author per reaction from another agent
const REACTION_CREDIT: f64 = 1.0;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub reputation: Arc<ReputationSystem>,
    pub governance: Arc<GovernanceManager>,
    pub feed: Arc<MessageFeed>,
    pub clock: Arc<dyn Clock>,
    started_at: u64,
    events: broadcast::Sender<String>,
}

impl AppState {
    /// Wire up the shared state; the event channel is created here
    pub fn new(
        clock: Arc<dyn Clock>,
        registry: Arc<AgentRegistry>,
        reputation: Arc<ReputationSystem>,
        governance: Arc<GovernanceManager>,
        feed: Arc<MessageFeed>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            registry,
            reputation,
            governance,
            feed,
            started_at: clock.now_ms(),
            clock,
            events,
        }
    }
}

/// An error ready to be rendered as a JSON response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        let status = match err {
            IdentityError::AlreadyExists(_) => StatusCode::CONFLICT,
            IdentityError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        Self::new(status, err.to_string())
    }
}

impl From<ReputationError> for ApiError {
    fn from(err: ReputationError) -> Self {
        let status = match err {
            ReputationError::NotFound(_) => StatusCode::NOT_FOUND,
            ReputationError::DuplicateVouch { .. } => StatusCode::CONFLICT,
            ReputationError::SelfReference(_)
            | ReputationError::InsufficientReputation { .. }
            | ReputationError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl From<GovernanceError> for ApiError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::Reputation(inner) => inner.into(),
            GovernanceError::ProposalNotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            GovernanceError::Unauthorized(_) | GovernanceError::VetoExpired => {
                Self::new(StatusCode::FORBIDDEN, err.to_string())
            }
            GovernanceError::WrongPhase(_) | GovernanceError::WrongType(_) => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
        }
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        Self::new(StatusCode::NOT_FOUND, err.to_string())
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/agents", post(register_agent).get(list_agents))
        .route("/agents/:id", get(get_agent))
        .route("/agents/:id/vouch", post(vouch_for_agent))
        .route("/mentorships", post(record_mentorship))
        .route("/messages", post(post_message))
        .route("/messages/:id", get(get_message))
        .route("/messages/:id/react", post(react_to_message))
        .route("/feed", get(get_feed))
        .route("/proposals", post(create_proposal).get(list_proposals))
        .route("/proposals/:id", get(get_proposal))
        .route("/proposals/:id/vote", post(cast_vote))
        .route("/proposals/:id/object", post(object_to_proposal))
        .route("/proposals/:id/veto", post(veto_proposal))
        .route("/governance/stats", get(governance_stats))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolve the X-API-Key header to an agent
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Agent, ApiError> {
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthenticated("Missing X-API-Key header"))?;

    state
        .registry
        .agent_by_api_key(api_key)
        .await
        .ok_or_else(|| ApiError::unauthenticated("Invalid API key"))
}

/// Publish an event to all WebSocket subscribers
fn broadcast_event(state: &AppState, event: Value) {
    // Send only fails when nobody is subscribed
    let _ = state.events.send(event.to_string());
}

async fn platform_stats(state: &AppState) -> Value {
    json!({
        "total_agents": state.registry.count().await,
        "total_messages": state.feed.message_count().await,
        "uptime_ms": state.clock.now_ms().saturating_sub(state.started_at),
    })
}

// === Handlers ===

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "Agora",
        "version": agora_core::VERSION,
        "status": "alive",
        "stats": platform_stats(&state).await,
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    id: String,
    name: Option<String>,
    description: Option<String>,
}

async fn register_agent(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.id.trim().is_empty() {
        return Err(ApiError::bad_request("Agent id required"));
    }

    let (agent, api_key) = state
        .registry
        .register(&body.id, body.name, body.description)
        .await?;
    state
        .reputation
        .register_agent(&agent.id, agent.created_at)
        .await;

    broadcast_event(
        &state,
        json!({ "type": "agent_joined", "agent": { "id": &agent.id, "name": &agent.name } }),
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "agent": agent,
            "api_key": api_key,
            "warning": "Save your API key - it cannot be recovered",
        })),
    ))
}

async fn list_agents(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut agents = Vec::new();
    for agent in state.registry.list().await {
        let record = state.reputation.record(&agent.id).await?;
        agents.push(json!({
            "id": agent.id,
            "name": agent.name,
            "description": agent.description,
            "reputation": record.reputation,
            "created_at": agent.created_at,
        }));
    }
    Ok(Json(json!({ "agents": agents })))
}

async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent = state.registry.get(&id).await?;
    let record = state.reputation.record(&id).await?;
    let lineage = state.reputation.lineage(&id).await?;
    let achievements = state.reputation.achievements(&id).await;
    let breakdown: HashMap<RepSource, f64> = record.breakdown.clone();

    Ok(Json(json!({
        "agent": agent,
        "reputation": record.reputation,
        "breakdown": breakdown,
        "staked": record.staked,
        "available_to_stake": record.available_to_stake(),
        "voting_weight": state.governance.voting_weight(&id).await?,
        "last_active_at": record.last_active_at,
        "achievements": achievements,
        "lineage": lineage,
    })))
}

async fn vouch_for_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let voucher = authenticate(&state, &headers).await?;
    let outcome = state.reputation.vouch_for(&voucher.id, &id).await?;

    broadcast_event(
        &state,
        json!({
            "type": "vouch",
            "voucher_id": voucher.id,
            "target_id": id,
            "stake_amount": outcome.stake_amount,
        }),
    );
    Ok(Json(json!({ "vouch": outcome })))
}

#[derive(Debug, Deserialize)]
struct MentorshipRequest {
    student_id: String,
}

async fn record_mentorship(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MentorshipRequest>,
) -> Result<Json<Value>, ApiError> {
    let mentor = authenticate(&state, &headers).await?;
    let outcome = state
        .reputation
        .record_mentorship(&mentor.id, &body.student_id)
        .await?;
    Ok(Json(json!({ "mentorship": outcome })))
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    content: String,
    metadata: Option<Value>,
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = authenticate(&state, &headers).await?;
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content required"));
    }

    let message = state
        .feed
        .post_message(
            &agent.id,
            &agent.name,
            &body.content,
            body.metadata.unwrap_or_else(|| json!({})),
        )
        .await;

    broadcast_event(&state, json!({ "type": "new_message", "message": &message }));
    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Json<Value> {
    let feed = state.feed.feed(&query).await;
    Json(json!({ "count": feed.len(), "feed": feed }))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let message = state.feed.message(&id).await?;
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
struct ReactionRequest {
    emoji: String,
}

/// Record a reaction and credit the author at the reputation boundary
///
/// Reactions from the author themselves are recorded on the message but
/// grant nothing.
pub async fn react_and_credit(
    state: &AppState,
    message_id: &str,
    reactor: &Agent,
    emoji: &str,
) -> Result<Message, ApiError> {
    let message = state.feed.add_reaction(message_id, &reactor.id, emoji).await?;

    if message.agent_id != reactor.id {
        state
            .reputation
            .credit(&message.agent_id, REACTION_CREDIT, RepSource::Upvotes)
            .await?;
    } else {
        debug!("Agent {} reacted to their own message", reactor.id);
    }

    Ok(message)
}

async fn react_to_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ReactionRequest>,
) -> Result<Json<Value>, ApiError> {
    let reactor = authenticate(&state, &headers).await?;
    let message = react_and_credit(&state, &id, &reactor, &body.emoji).await?;

    broadcast_event(
        &state,
        json!({
            "type": "reaction",
            "message_id": &message.id,
            "agent_id": &reactor.id,
            "emoji": &body.emoji,
        }),
    );
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
struct ProposalRequest {
    title: String,
    description: String,
    #[serde(rename = "type")]
    proposal_type: ProposalType,
}

async fn create_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProposalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author = authenticate(&state, &headers).await?;
    let proposal = state
        .governance
        .create_proposal(&author.id, &body.title, &body.description, body.proposal_type)
        .await?;

    broadcast_event(
        &state,
        json!({
            "type": "proposal_created",
            "proposal_id": &proposal.id,
            "title": &proposal.title,
            "proposal_type": proposal.proposal_type,
        }),
    );
    Ok((StatusCode::CREATED, Json(json!({ "proposal": proposal }))))
}

async fn list_proposals(
    State(state): State<AppState>,
    Query(filter): Query<ProposalFilter>,
) -> Json<Value> {
    let proposals = state.governance.list_proposals(&filter).await;
    Json(json!({ "count": proposals.len(), "proposals": proposals }))
}

async fn get_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let proposal = state.governance.get_proposal(&id).await?;
    Ok(Json(json!({ "proposal": proposal })))
}

#[derive(Debug, Deserialize)]
struct VoteRequest {
    choice: VoteChoice,
}

async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<VoteRequest>,
) -> Result<Json<Value>, ApiError> {
    let voter = authenticate(&state, &headers).await?;
    let proposal = state
        .governance
        .cast_vote(&id, &voter.id, body.choice)
        .await?;

    broadcast_event(
        &state,
        json!({
            "type": "vote_cast",
            "proposal_id": &proposal.id,
            "agent_id": &voter.id,
            "choice": body.choice,
        }),
    );
    Ok(Json(json!({ "proposal": proposal })))
}

#[derive(Debug, Deserialize)]
struct ObjectionRequest {
    reason: String,
}

async fn object_to_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ObjectionRequest>,
) -> Result<Json<Value>, ApiError> {
    let objector = authenticate(&state, &headers).await?;
    let proposal = state
        .governance
        .object_to_proposal(&id, &objector.id, &body.reason)
        .await?;

    broadcast_event(
        &state,
        json!({
            "type": "objection",
            "proposal_id": &proposal.id,
            "agent_id": &objector.id,
        }),
    );
    Ok(Json(json!({ "proposal": proposal })))
}

#[derive(Debug, Deserialize)]
struct VetoRequest {
    reason: String,
}

async fn veto_proposal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<VetoRequest>,
) -> Result<Json<Value>, ApiError> {
    let founder = authenticate(&state, &headers).await?;
    let proposal = state
        .governance
        .veto_proposal(&id, &founder.id, &body.reason)
        .await?;

    broadcast_event(
        &state,
        json!({
            "type": "proposal_vetoed",
            "proposal_id": &proposal.id,
            "founder_id": &founder.id,
        }),
    );
    Ok(Json(json!({ "proposal": proposal })))
}

async fn governance_stats(State(state): State<AppState>) -> Json<Value> {
    let stats = state.governance.stats().await;
    Json(json!({ "stats": stats }))
}

// === WebSocket ===

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let welcome = json!({
        "type": "connected",
        "message": "Welcome to Agora",
        "stats": platform_stats(&state).await,
    });
    if sender
        .send(WsMessage::Text(welcome.to_string()))
        .await
        .is_err()
    {
        return;
    }
    debug!("WebSocket client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(payload) => {
                    if sender.send(WsMessage::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // A slow client that missed events just keeps going
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                // Inbound frames are ignored; the feed is broadcast-only
                Some(Ok(_)) => continue,
                _ => break,
            },
        }
    }

    debug!("WebSocket client disconnected");
}
