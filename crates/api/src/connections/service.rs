use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use kinship_core::connection::{
    reasons, ConnectionStatus, InteractionKind, RequestStatus, RespondAction,
    MAX_REQUEST_NOTE_CHARS,
};
use kinship_core::discovery::{normalize_email, pin_candidate, Pin, QrPayload};
use kinship_core::error::CoreError;
use kinship_core::trust::{
    Capability, ConsentState, InteractionMetrics, LevelUpDecision, TrustLadder, TrustLevel,
};
use kinship_core::types::{DbId, Timestamp};
use kinship_db::models::connection::Connection;
use kinship_db::models::connection_request::{ConnectionRequest, CreateConnectionRequest};
use kinship_db::{ConnectionStore, DirectChatProvisioner, StoreError, UserDirectory};
use kinship_events::bus::activity;
use kinship_events::{ActivityEvent, EventBus, RealtimeEvent};

use crate::ws::{DeliveryOutcome, EventRouter};

/// Attempts at drawing an unused PIN before giving up.
const MAX_PIN_ATTEMPTS: usize = 10;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of answering a request.
#[derive(Debug, Clone, Serialize)]
pub struct RespondOutcome {
    pub request: ConnectionRequest,
    /// Set on accept.
    pub connection: Option<Connection>,
    /// The direct chat opened on accept. `None` when provisioning failed; the
    /// chat is then opened by the first relayed message.
    pub chat_id: Option<DbId>,
}

/// Result of a level-up proposal.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LevelUpOutcome {
    /// The stored level advanced.
    Changed { connection: Connection },
    /// Consent recorded; waiting for the counterpart to propose the same level.
    AwaitingConsent {
        connection_id: DbId,
        target_level: TrustLevel,
    },
    /// Already at the top level; nothing changed.
    AtCap { connection: Connection },
}

/// Result of relaying a text message.
#[derive(Debug, Clone, Serialize)]
pub struct RelayOutcome {
    pub connection: Connection,
    pub chat_id: DbId,
    pub delivery: DeliveryOutcome,
}

/// One accepted connection as seen by one participant.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub connection_id: DbId,
    pub counterpart_id: DbId,
    pub trust_level: TrustLevel,
    pub level_name: String,
    pub capabilities: BTreeSet<Capability>,
    pub message_count: i64,
    pub voice_call_count: i64,
    pub video_call_count: i64,
    pub accepted_at: Option<Timestamp>,
    pub last_interaction_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// ConnectionService
// ---------------------------------------------------------------------------

/// Orchestrates discovery, requests, trust transitions and interactions.
///
/// Holds no in-process lock; concurrent calls are serialized by the store's
/// compare-and-set updates.
pub struct ConnectionService {
    store: Arc<dyn ConnectionStore>,
    directory: Arc<dyn UserDirectory>,
    chats: Arc<dyn DirectChatProvisioner>,
    ladder: Arc<TrustLadder>,
    router: EventRouter,
    event_bus: Arc<EventBus>,
}

impl ConnectionService {
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        directory: Arc<dyn UserDirectory>,
        chats: Arc<dyn DirectChatProvisioner>,
        ladder: Arc<TrustLadder>,
        router: EventRouter,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            directory,
            chats,
            ladder,
            router,
            event_bus,
        }
    }

    /// Build the service over one backend implementing every collaborator.
    pub fn with_backend<B>(
        backend: Arc<B>,
        ladder: Arc<TrustLadder>,
        router: EventRouter,
        event_bus: Arc<EventBus>,
    ) -> Self
    where
        B: ConnectionStore + UserDirectory + DirectChatProvisioner + 'static,
    {
        Self::new(
            backend.clone(),
            backend.clone(),
            backend,
            ladder,
            router,
            event_bus,
        )
    }

    pub fn ladder(&self) -> &TrustLadder {
        &self.ladder
    }

    /// Liveness of the backing store.
    pub async fn ping(&self) -> Result<(), CoreError> {
        Ok(self.store.ping().await?)
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    pub async fn request_by_pin(
        &self,
        requester: DbId,
        pin: &str,
        message: Option<String>,
    ) -> Result<ConnectionRequest, CoreError> {
        let pin = Pin::parse(pin)?;
        let target = self
            .directory
            .resolve_pin(&pin)
            .await?
            .ok_or_else(|| CoreError::not_found("PIN", &pin))?;
        self.send_request(requester, target, message, "pin").await
    }

    pub async fn request_by_email(
        &self,
        requester: DbId,
        email: &str,
        message: Option<String>,
    ) -> Result<ConnectionRequest, CoreError> {
        let email = normalize_email(email)?;
        let target = self
            .directory
            .resolve_email(&email)
            .await?
            .ok_or_else(|| CoreError::not_found("Email", &email))?;
        self.send_request(requester, target, message, "email").await
    }

    /// `payload` is the raw JSON text scanned from the code.
    pub async fn request_by_qr(
        &self,
        requester: DbId,
        payload: &str,
        message: Option<String>,
    ) -> Result<ConnectionRequest, CoreError> {
        let payload = QrPayload::parse(payload)?;
        let target = self
            .directory
            .resolve_pin(&payload.pin)
            .await?
            .ok_or_else(|| CoreError::not_found("PIN", &payload.pin))?;
        self.send_request(requester, target, message, "qr").await
    }

    async fn send_request(
        &self,
        requester: DbId,
        target: DbId,
        message: Option<String>,
        via: &'static str,
    ) -> Result<ConnectionRequest, CoreError> {
        if requester == target {
            return Err(CoreError::Conflict(reasons::CANNOT_CONNECT_TO_SELF.into()));
        }
        let message = normalize_note(message)?;

        if self.directory.get_user(requester).await?.is_none() {
            return Err(CoreError::not_found("User", requester));
        }
        self.ensure_not_blocked(requester, target).await?;

        if let Some(existing) = self.store.find_connection(requester, target).await? {
            match existing.status {
                ConnectionStatus::Accepted => {
                    return Err(CoreError::Conflict(reasons::ALREADY_CONNECTED.into()))
                }
                ConnectionStatus::Blocked => {
                    return Err(CoreError::Forbidden(reasons::BLOCKED.into()))
                }
                ConnectionStatus::Pending | ConnectionStatus::Declined => {}
            }
        }
        if self.store.find_pending_request(requester, target).await?.is_some() {
            return Err(CoreError::Conflict(reasons::ALREADY_SENT.into()));
        }
        if self.store.find_pending_request(target, requester).await?.is_some() {
            return Err(CoreError::Conflict(reasons::ALREADY_PENDING_FROM_TARGET.into()));
        }

        let input = CreateConnectionRequest {
            sender_id: requester,
            receiver_id: target,
            message,
        };
        // The partial unique index catches a concurrent duplicate.
        let request = self.store.create_request(&input).await.map_err(|e| match e {
            StoreError::Duplicate(_) => CoreError::Conflict(reasons::ALREADY_SENT.into()),
            other => other.into(),
        })?;

        tracing::info!(
            request_id = request.id,
            sender_id = requester,
            receiver_id = target,
            via,
            "Connection request created"
        );

        self.router
            .deliver(
                target,
                &RealtimeEvent::ConnectionRequest {
                    request_id: request.id,
                    sender: requester,
                    message: request.message.clone(),
                },
            )
            .await;
        self.event_bus.publish(
            ActivityEvent::new(activity::REQUEST_SENT)
                .with_request(request.id)
                .with_actor(requester)
                .with_target(target)
                .with_payload(json!({ "via": via })),
        );

        Ok(request)
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Accept, decline, or block a pending request addressed to `responder`.
    ///
    /// The request update is a compare-and-set, so of two racing calls only
    /// the first gets past it. A block is recorded before that update, so a
    /// failed block leaves the request pending and the call can be retried.
    /// On accept the connection row follows the request update; the direct
    /// chat is best effort and is provisioned again on the first message.
    pub async fn respond(
        &self,
        request_id: DbId,
        responder: DbId,
        action: RespondAction,
    ) -> Result<RespondOutcome, CoreError> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Connection request", request_id))?;
        if request.receiver_id != responder {
            return Err(CoreError::Forbidden(reasons::NOT_ADDRESSED_TO_YOU.into()));
        }
        if request.status != RequestStatus::Pending {
            return Err(CoreError::Conflict(reasons::ALREADY_RESPONDED.into()));
        }
        if action == RespondAction::Block {
            self.store.create_block(responder, request.sender_id).await?;
        }

        let request = self
            .store
            .update_request_status(request_id, RequestStatus::Pending, action.resulting_status())
            .await?
            .ok_or_else(|| CoreError::Conflict(reasons::ALREADY_RESPONDED.into()))?;
        let sender = request.sender_id;

        match action {
            RespondAction::Accept => {
                let connection = self
                    .store
                    .create_connection_pair(sender, responder, TrustLevel::INITIAL)
                    .await
                    .map_err(|e| match e {
                        StoreError::Duplicate(_) => {
                            CoreError::Conflict(reasons::ALREADY_CONNECTED.into())
                        }
                        other => other.into(),
                    })?;
                let chat_id = match self.chats.ensure_direct_chat(sender, responder).await {
                    Ok(chat_id) => Some(chat_id),
                    Err(e) => {
                        tracing::warn!(
                            request_id,
                            error = %e,
                            "Direct chat not provisioned, deferring to first message"
                        );
                        None
                    }
                };

                tracing::info!(
                    request_id,
                    connection_id = connection.id,
                    chat_id,
                    "Connection request accepted"
                );

                self.router
                    .deliver(
                        sender,
                        &RealtimeEvent::ConnectionAccepted {
                            request_id,
                            accepter: responder,
                            chat_id,
                        },
                    )
                    .await;
                self.event_bus.publish(
                    ActivityEvent::new(activity::REQUEST_ACCEPTED)
                        .with_request(request_id)
                        .with_connection(connection.id)
                        .with_actor(responder)
                        .with_target(sender)
                        .with_payload(json!({ "chat_id": chat_id })),
                );

                Ok(RespondOutcome {
                    request,
                    connection: Some(connection),
                    chat_id,
                })
            }
            RespondAction::Decline => {
                tracing::info!(request_id, "Connection request declined");
                self.event_bus.publish(
                    ActivityEvent::new(activity::REQUEST_DECLINED)
                        .with_request(request_id)
                        .with_actor(responder)
                        .with_target(sender),
                );
                Ok(RespondOutcome {
                    request,
                    connection: None,
                    chat_id: None,
                })
            }
            RespondAction::Block => {
                tracing::info!(request_id, blocker_id = responder, blocked_id = sender, "Connection request blocked");
                self.event_bus.publish(
                    ActivityEvent::new(activity::REQUEST_BLOCKED)
                        .with_request(request_id)
                        .with_actor(responder)
                        .with_target(sender),
                );
                Ok(RespondOutcome {
                    request,
                    connection: None,
                    chat_id: None,
                })
            }
        }
    }

    /// Pending requests addressed to `user_id`.
    pub async fn incoming_requests(&self, user_id: DbId) -> Result<Vec<ConnectionRequest>, CoreError> {
        Ok(self.store.list_incoming_requests(user_id).await?)
    }

    /// Pending requests sent by `user_id`.
    pub async fn outgoing_requests(&self, user_id: DbId) -> Result<Vec<ConnectionRequest>, CoreError> {
        Ok(self.store.list_outgoing_requests(user_id).await?)
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Accepted connections of `user_id` with their active capabilities.
    pub async fn connections_for(&self, user_id: DbId) -> Result<Vec<ConnectionSummary>, CoreError> {
        let connections = self.store.list_connections(user_id).await?;
        Ok(connections
            .iter()
            .filter_map(|c| self.summarize(c, user_id))
            .collect())
    }

    /// Load a connection and check `user_id` is part of it. Returns the
    /// connection and the other participant.
    pub async fn connection_for_participant(
        &self,
        connection_id: DbId,
        user_id: DbId,
    ) -> Result<(Connection, DbId), CoreError> {
        let connection = self
            .store
            .get_connection(connection_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Connection", connection_id))?;
        let counterpart = connection
            .counterpart(user_id)
            .ok_or_else(|| CoreError::Forbidden(reasons::NOT_A_PARTICIPANT.into()))?;
        Ok((connection, counterpart))
    }

    /// Whether `capability` is unlocked on an accepted connection.
    pub async fn has_capability(
        &self,
        connection_id: DbId,
        capability: Capability,
    ) -> Result<bool, CoreError> {
        let connection = self
            .store
            .get_connection(connection_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Connection", connection_id))?;
        Ok(connection.status == ConnectionStatus::Accepted
            && self.ladder.has_capability(connection.trust_level, capability))
    }

    /// Block an established connection from one side.
    ///
    /// The blocker's other sessions are told so they can drop the
    /// conversation; the blocked party is not notified.
    pub async fn block_connection(
        &self,
        connection_id: DbId,
        blocker: DbId,
    ) -> Result<Connection, CoreError> {
        let (connection, blocked) = self.connection_for_participant(connection_id, blocker).await?;
        let connection = match connection.status {
            ConnectionStatus::Blocked => connection,
            ConnectionStatus::Accepted => self
                .store
                .update_connection_status(connection_id, ConnectionStatus::Blocked)
                .await?
                .ok_or_else(|| CoreError::not_found("Connection", connection_id))?,
            ConnectionStatus::Pending | ConnectionStatus::Declined => {
                return Err(CoreError::InvalidState(reasons::NOT_ACCEPTED.into()))
            }
        };
        self.store.create_block(blocker, blocked).await?;

        tracing::info!(connection_id, blocker_id = blocker, blocked_id = blocked, "Connection blocked");

        self.router
            .deliver(
                blocker,
                &RealtimeEvent::ConnectionBlocked {
                    connection_id,
                    blocked_by: blocker,
                },
            )
            .await;
        self.event_bus.publish(
            ActivityEvent::new(activity::CONNECTION_BLOCKED)
                .with_connection(connection_id)
                .with_actor(blocker)
                .with_target(blocked),
        );

        Ok(connection)
    }

    // -----------------------------------------------------------------------
    // Trust levels
    // -----------------------------------------------------------------------

    /// Record `proposer`'s wish to move the connection to `target_level`.
    ///
    /// Levels without a consent requirement advance immediately once the
    /// thresholds are met. Consent-gated levels advance when both participants
    /// have proposed the same target; until then the counterpart is told a
    /// proposal is waiting.
    pub async fn propose_level_up(
        &self,
        connection_id: DbId,
        proposer: DbId,
        target_level: i32,
    ) -> Result<LevelUpOutcome, CoreError> {
        let (connection, counterpart) =
            self.connection_for_participant(connection_id, proposer).await?;
        let snapshot = connection.snapshot();

        let target = match self.ladder.validate_target(&snapshot, target_level)? {
            LevelUpDecision::AtCap => return Ok(LevelUpOutcome::AtCap { connection }),
            LevelUpDecision::Advance(target) => target,
        };

        let metrics = InteractionMetrics::from_snapshot(&snapshot, Utc::now());
        if !self.ladder.thresholds_met(target, &metrics) {
            return Err(CoreError::InvalidState(reasons::REQUIREMENTS_NOT_MET.into()));
        }

        let consent = if self.ladder.requires_mutual_consent(target) {
            self.store
                .record_trust_proposal(connection_id, proposer, target)
                .await?;
            let proposals = self.store.list_trust_proposals(connection_id).await?;
            let consent = proposals
                .iter()
                .filter(|p| p.target_level == target)
                .fold(
                    ConsentState::new(target, connection.participants()),
                    |state, p| state.with_consent(p.user_id),
                );
            Some(consent)
        } else {
            None
        };

        match self.ladder.check_level_up(&snapshot, &metrics, consent.as_ref()) {
            Ok(LevelUpDecision::Advance(level)) => {
                self.finalize_level(connection, level, proposer).await
            }
            Ok(LevelUpDecision::AtCap) => Ok(LevelUpOutcome::AtCap { connection }),
            Err(CoreError::Forbidden(_)) if consent.is_some() => {
                tracing::info!(
                    connection_id,
                    proposer_id = proposer,
                    target_level = %target,
                    "Level-up proposal awaiting consent"
                );
                self.router
                    .deliver(
                        counterpart,
                        &RealtimeEvent::TrustLevelProposed {
                            connection_id,
                            proposer,
                            target_level: target,
                        },
                    )
                    .await;
                self.event_bus.publish(
                    ActivityEvent::new(activity::LEVEL_PROPOSED)
                        .with_connection(connection_id)
                        .with_actor(proposer)
                        .with_target(counterpart)
                        .with_payload(json!({ "target_level": target })),
                );
                Ok(LevelUpOutcome::AwaitingConsent {
                    connection_id,
                    target_level: target,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn finalize_level(
        &self,
        connection: Connection,
        level: TrustLevel,
        actor: DbId,
    ) -> Result<LevelUpOutcome, CoreError> {
        let updated = match self
            .store
            .update_trust_level(connection.id, connection.trust_level, level, actor)
            .await?
        {
            Some(updated) => updated,
            None => {
                let current = self
                    .store
                    .get_connection(connection.id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Connection", connection.id))?;
                // Lost the race; the winner already broadcast the change.
                if current.status == ConnectionStatus::Accepted && current.trust_level >= level {
                    return Ok(LevelUpOutcome::Changed {
                        connection: current,
                    });
                }
                return Err(CoreError::Conflict(reasons::CONCURRENT_UPDATE.into()));
            }
        };

        // Stale proposals target levels at or below the new one and are
        // ignored by later consent checks, so a failed cleanup is not fatal.
        if let Err(e) = self.store.clear_trust_proposals(updated.id).await {
            tracing::warn!(connection_id = updated.id, error = %e, "Failed to clear trust proposals");
        }

        tracing::info!(
            connection_id = updated.id,
            from = %connection.trust_level,
            to = %updated.trust_level,
            "Trust level changed"
        );

        let event = RealtimeEvent::TrustLevelChanged {
            connection_id: updated.id,
            new_level: updated.trust_level,
        };
        let (user_a, user_b) = updated.participants();
        self.router.deliver(user_a, &event).await;
        self.router.deliver(user_b, &event).await;
        self.event_bus.publish(
            ActivityEvent::new(activity::LEVEL_CHANGED)
                .with_connection(updated.id)
                .with_actor(actor)
                .with_payload(json!({
                    "from": connection.trust_level,
                    "to": updated.trust_level,
                })),
        );

        Ok(LevelUpOutcome::Changed {
            connection: updated,
        })
    }

    // -----------------------------------------------------------------------
    // Interactions
    // -----------------------------------------------------------------------

    /// Relay a text message to the counterpart's sessions.
    ///
    /// Level 1 allows short messages only; full text chat lifts the limit.
    pub async fn relay_message(
        &self,
        connection_id: DbId,
        sender: DbId,
        text: &str,
    ) -> Result<RelayOutcome, CoreError> {
        let (connection, recipient) = self.connection_for_participant(connection_id, sender).await?;
        ensure_active(&connection)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation(reasons::EMPTY_MESSAGE.into()));
        }
        let allowance = self
            .ladder
            .text_allowance(connection.trust_level)
            .ok_or_else(|| CoreError::Forbidden(reasons::CAPABILITY_LOCKED.into()))?;
        let chars = text.chars().count();
        if chars > allowance {
            return Err(CoreError::Forbidden(reasons::MESSAGE_TOO_LONG.into()));
        }

        let chat_id = self.chats.ensure_direct_chat(sender, recipient).await?;
        let connection = self
            .store
            .increment_interaction(connection_id, InteractionKind::Message)
            .await?
            .ok_or_else(|| CoreError::not_found("Connection", connection_id))?;

        let delivery = self
            .router
            .deliver(
                recipient,
                &RealtimeEvent::NewMessage {
                    connection_id,
                    sender,
                    text: text.to_string(),
                },
            )
            .await;
        self.event_bus.publish(
            ActivityEvent::new(activity::MESSAGE_RELAYED)
                .with_connection(connection_id)
                .with_actor(sender)
                .with_target(recipient)
                .with_payload(json!({ "chars": chars, "delivered_to": delivery.delivered_to })),
        );

        Ok(RelayOutcome {
            connection,
            chat_id,
            delivery,
        })
    }

    /// Count a completed voice or video call.
    pub async fn record_call(
        &self,
        connection_id: DbId,
        caller: DbId,
        kind: InteractionKind,
    ) -> Result<Connection, CoreError> {
        let capability = match kind {
            InteractionKind::VoiceCall => Capability::VoiceCall,
            InteractionKind::VideoCall => Capability::VideoCall,
            InteractionKind::Message => {
                return Err(CoreError::Validation(reasons::NOT_A_CALL.into()))
            }
        };
        let (connection, callee) = self.connection_for_participant(connection_id, caller).await?;
        ensure_active(&connection)?;
        if !self.ladder.has_capability(connection.trust_level, capability) {
            return Err(CoreError::Forbidden(reasons::CAPABILITY_LOCKED.into()));
        }

        let connection = self
            .store
            .increment_interaction(connection_id, kind)
            .await?
            .ok_or_else(|| CoreError::not_found("Connection", connection_id))?;

        tracing::debug!(connection_id, kind = %kind, "Call recorded");
        self.event_bus.publish(
            ActivityEvent::new(activity::CALL_RECORDED)
                .with_connection(connection_id)
                .with_actor(caller)
                .with_target(callee)
                .with_payload(json!({ "kind": kind })),
        );

        Ok(connection)
    }

    // -----------------------------------------------------------------------
    // PIN
    // -----------------------------------------------------------------------

    /// Replace `user_id`'s PIN with a fresh one derived from the display name.
    pub async fn regenerate_pin(&self, user_id: DbId) -> Result<Pin, CoreError> {
        let user = self
            .directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("User", user_id))?;

        for attempt in 1..=MAX_PIN_ATTEMPTS {
            let candidate = pin_candidate(&user.display_name, &mut rand::rng());
            match self.directory.assign_pin(user_id, &candidate).await {
                Ok(true) => {
                    tracing::info!(user_id, attempt, "PIN regenerated");
                    self.event_bus.publish(
                        ActivityEvent::new(activity::PIN_REGENERATED).with_actor(user_id),
                    );
                    return Ok(candidate);
                }
                Ok(false) => return Err(CoreError::not_found("User", user_id)),
                Err(StoreError::Duplicate(_)) => {
                    tracing::debug!(user_id, attempt, "PIN collision, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        tracing::warn!(user_id, attempts = MAX_PIN_ATTEMPTS, "PIN regeneration exhausted");
        Err(CoreError::Conflict(reasons::DUPLICATE_PIN.into()))
    }

    fn summarize(&self, connection: &Connection, viewer: DbId) -> Option<ConnectionSummary> {
        let counterpart_id = connection.counterpart(viewer)?;
        Some(ConnectionSummary {
            connection_id: connection.id,
            counterpart_id,
            trust_level: connection.trust_level,
            level_name: self.ladder.definition(connection.trust_level).name.clone(),
            capabilities: self.ladder.capabilities_at(connection.trust_level),
            message_count: connection.message_count,
            voice_call_count: connection.voice_call_count,
            video_call_count: connection.video_call_count,
            accepted_at: connection.accepted_at,
            last_interaction_at: connection.last_interaction_at,
        })
    }

    async fn ensure_not_blocked(&self, a: DbId, b: DbId) -> Result<(), CoreError> {
        if self.store.find_block(a, b).await?.is_some()
            || self.store.find_block(b, a).await?.is_some()
        {
            return Err(CoreError::Forbidden(reasons::BLOCKED.into()));
        }
        Ok(())
    }
}

/// Interactions are only allowed on accepted connections.
fn ensure_active(connection: &Connection) -> Result<(), CoreError> {
    match connection.status {
        ConnectionStatus::Accepted => Ok(()),
        ConnectionStatus::Blocked => Err(CoreError::Forbidden(reasons::BLOCKED.into())),
        ConnectionStatus::Pending | ConnectionStatus::Declined => {
            Err(CoreError::InvalidState(reasons::NOT_ACCEPTED.into()))
        }
    }
}

/// Trim the optional request note; blank notes become `None`.
fn normalize_note(message: Option<String>) -> Result<Option<String>, CoreError> {
    let Some(text) = message else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if text.chars().count() > MAX_REQUEST_NOTE_CHARS {
        return Err(CoreError::Validation(reasons::REQUEST_NOTE_TOO_LONG.into()));
    }
    Ok(Some(text.to_string()))
}
