//! Service-level tests for `ConnectionService` over the in-memory store.
//!
//! Sessions are registered directly on the shared registry so tests can
//! observe exactly which real-time events each user receives.

mod common;

use assert_matches::assert_matches;
use kinship_api::connections::LevelUpOutcome;
use kinship_core::connection::{
    reasons, ConnectionStatus, InteractionKind, RequestStatus, RespondAction,
};
use kinship_core::error::CoreError;
use kinship_core::trust::{Capability, TrustLevel};
use kinship_events::bus::activity;

use common::{
    build_faulty_app, build_test_app, connect, drain_events, seed_users, TestApp, BOB_PIN,
};

fn level(n: u8) -> TrustLevel {
    TrustLevel::new(n).unwrap()
}

/// Drive a connection from level 1 to `target` with both parties proposing
/// each consent-gated step. Counters are set high enough for every level.
async fn climb_to(app: &TestApp, connection_id: i64, a: i64, b: i64, target: u8) {
    app.store.backdate_connection(connection_id, 30);
    app.store.set_interaction_counts(connection_id, 100, 5, 5);
    for next in 2..=target {
        let first = app
            .state
            .connections
            .propose_level_up(connection_id, a, i32::from(next))
            .await
            .unwrap();
        if matches!(first, LevelUpOutcome::AwaitingConsent { .. }) {
            app.state
                .connections
                .propose_level_up(connection_id, b, i32::from(next))
                .await
                .unwrap();
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_by_pin_creates_pending_request_and_notifies_target() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let mut bob_session = app.state.sessions.register(users.bob).await;

    let request = app
        .state
        .connections
        .request_by_pin(users.alice, "pin-bob002", Some("  hi Bob  ".into()))
        .await
        .unwrap();

    assert_eq!(request.sender_id, users.alice);
    assert_eq!(request.receiver_id, users.bob);
    assert_eq!(request.message.as_deref(), Some("hi Bob"));

    let events = drain_events(&mut bob_session.receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "connection_request");
    assert_eq!(events[0]["data"]["request_id"], request.id);
    assert_eq!(events[0]["data"]["sender"], users.alice);
}

#[tokio::test]
async fn request_by_email_is_case_insensitive() {
    let app = build_test_app();
    let users = seed_users(&app.store);

    let request = app
        .state
        .connections
        .request_by_email(users.alice, "  BOB@Example.com ", None)
        .await
        .unwrap();

    assert_eq!(request.receiver_id, users.bob);
}

#[tokio::test]
async fn request_by_qr_resolves_embedded_pin() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let payload = serde_json::json!({ "pin": BOB_PIN, "display_name": "Bob" }).to_string();

    let request = app
        .state
        .connections
        .request_by_qr(users.alice, &payload, None)
        .await
        .unwrap();

    assert_eq!(request.receiver_id, users.bob);
}

#[tokio::test]
async fn malformed_identifiers_are_validation_errors() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let err = svc.request_by_pin(users.alice, "BOB002", None).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(ref m) if m == reasons::INVALID_PIN);

    let err = svc.request_by_email(users.alice, "not-an-email", None).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(ref m) if m == reasons::INVALID_EMAIL);

    let err = svc.request_by_qr(users.alice, "{oops", None).await.unwrap_err();
    assert_matches!(err, CoreError::Validation(ref m) if m == reasons::INVALID_QR);
}

#[tokio::test]
async fn unknown_pin_or_email_is_not_found() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let err = svc.request_by_pin(users.alice, "PIN-ZZZ999", None).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
    assert_eq!(err.reason(), "pin not found");

    let err = svc
        .request_by_email(users.alice, "nobody@example.com", None)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "email not found");
}

#[tokio::test]
async fn overlong_request_note_is_rejected() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let note = "x".repeat(501);

    let err = app
        .state
        .connections
        .request_by_pin(users.alice, BOB_PIN, Some(note))
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::Validation(ref m) if m == reasons::REQUEST_NOTE_TOO_LONG);
    assert_eq!(app.store.request_count(), 0);
}

// ---------------------------------------------------------------------------
// Request rules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn self_request_is_conflict() {
    let app = build_test_app();
    let users = seed_users(&app.store);

    let err = app
        .state
        .connections
        .request_by_pin(users.alice, common::ALICE_PIN, None)
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::Conflict(ref m) if m == reasons::CANNOT_CONNECT_TO_SELF);
    assert_eq!(app.store.request_count(), 0);
}

#[tokio::test]
async fn second_request_is_already_sent() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    let err = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap_err();

    assert_matches!(err, CoreError::Conflict(ref m) if m == reasons::ALREADY_SENT);
    assert_eq!(app.store.request_count(), 1);
}

#[tokio::test]
async fn reverse_request_reports_pending_from_target() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    let err = svc
        .request_by_pin(users.bob, common::ALICE_PIN, None)
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::Conflict(ref m) if m == reasons::ALREADY_PENDING_FROM_TARGET);
}

#[tokio::test]
async fn request_to_existing_connection_is_conflict() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    connect(&app, users.alice, users.bob, BOB_PIN).await;

    let err = app
        .state
        .connections
        .request_by_pin(users.alice, BOB_PIN, None)
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::Conflict(ref m) if m == reasons::ALREADY_CONNECTED);
}

// ---------------------------------------------------------------------------
// Responding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accept_creates_connection_chat_and_notifies_sender() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;
    let mut alice_session = app.state.sessions.register(users.alice).await;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    let outcome = svc
        .respond(request.id, users.bob, RespondAction::Accept)
        .await
        .unwrap();

    let connection = outcome.connection.unwrap();
    assert_eq!(connection.status, ConnectionStatus::Accepted);
    assert_eq!(connection.trust_level, TrustLevel::INITIAL);
    assert!(connection.involves(users.alice) && connection.involves(users.bob));
    assert!(connection.accepted_at.is_some());
    assert_eq!(app.store.connection_count(), 1);
    assert_eq!(app.store.chat_count(), 1);

    let events = drain_events(&mut alice_session.receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "connection_accepted");
    assert_eq!(events[0]["data"]["accepter"], users.bob);
    assert_eq!(events[0]["data"]["chat_id"], outcome.chat_id.unwrap());

    assert!(svc.incoming_requests(users.bob).await.unwrap().is_empty());
    assert!(svc.outgoing_requests(users.alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn responding_twice_fails() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    svc.respond(request.id, users.bob, RespondAction::Accept)
        .await
        .unwrap();

    for action in [RespondAction::Accept, RespondAction::Decline, RespondAction::Block] {
        let err = svc.respond(request.id, users.bob, action).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(ref m) if m == reasons::ALREADY_RESPONDED);
    }
    assert_eq!(app.store.connection_count(), 1);
}

#[tokio::test]
async fn concurrent_accepts_create_one_connection() {
    let (app, faulty) = build_faulty_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    faulty.interleave(true);
    let (first, second) = tokio::join!(
        svc.respond(request.id, users.bob, RespondAction::Accept),
        svc.respond(request.id, users.bob, RespondAction::Accept),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.into_iter().find_map(Result::err).unwrap();
    assert_matches!(loser, CoreError::Conflict(ref m) if m == reasons::ALREADY_RESPONDED);
    assert_eq!(app.store.connection_count(), 1);
    assert_eq!(app.store.chat_count(), 1);
}

#[tokio::test]
async fn accept_survives_chat_outage_and_first_message_opens_the_chat() {
    let (app, faulty) = build_faulty_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;
    let mut alice_session = app.state.sessions.register(users.alice).await;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    faulty.fail_chats(1);
    let outcome = svc
        .respond(request.id, users.bob, RespondAction::Accept)
        .await
        .unwrap();

    let connection = outcome.connection.unwrap();
    assert!(outcome.chat_id.is_none());
    assert_eq!(app.store.connection_count(), 1);
    assert_eq!(app.store.chat_count(), 0);

    let events = drain_events(&mut alice_session.receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "connection_accepted");
    assert!(events[0]["data"]["chat_id"].is_null());

    let first = svc
        .relay_message(connection.id, users.alice, "hello")
        .await
        .unwrap();
    assert_eq!(app.store.chat_count(), 1);
    let reply = svc
        .relay_message(connection.id, users.bob, "hi")
        .await
        .unwrap();
    assert_eq!(reply.chat_id, first.chat_id);
    assert_eq!(app.store.chat_count(), 1);
}

#[tokio::test]
async fn only_the_receiver_may_respond() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();

    for stranger in [users.alice, users.carol] {
        let err = svc
            .respond(request.id, stranger, RespondAction::Accept)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::NOT_ADDRESSED_TO_YOU);
    }

    let err = svc
        .respond(9_999, users.bob, RespondAction::Accept)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
}

#[tokio::test]
async fn decline_leaves_no_connection_and_allows_a_new_request() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    let outcome = svc
        .respond(request.id, users.bob, RespondAction::Decline)
        .await
        .unwrap();

    assert!(outcome.connection.is_none());
    assert_eq!(app.store.connection_count(), 0);
    svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
}

#[tokio::test]
async fn block_response_prevents_requests_both_ways() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    svc.respond(request.id, users.bob, RespondAction::Block)
        .await
        .unwrap();

    let err = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::BLOCKED);

    let err = svc
        .request_by_pin(users.bob, common::ALICE_PIN, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::BLOCKED);
}

#[tokio::test]
async fn failed_block_leaves_request_pending_and_retry_blocks() {
    let (app, faulty) = build_faulty_app();
    let users = seed_users(&app.store);
    let svc = &app.state.connections;

    let request = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap();
    faulty.fail_blocks(1);
    let err = svc
        .respond(request.id, users.bob, RespondAction::Block)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Unavailable(_));

    let incoming = svc.incoming_requests(users.bob).await.unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].status, RequestStatus::Pending);

    let outcome = svc
        .respond(request.id, users.bob, RespondAction::Block)
        .await
        .unwrap();
    assert_eq!(outcome.request.status, RequestStatus::Blocked);

    let err = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::BLOCKED);
}

// ---------------------------------------------------------------------------
// Listing and capabilities
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connections_for_reports_level_and_capabilities() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;

    let list = app.state.connections.connections_for(users.bob).await.unwrap();

    assert_eq!(list.len(), 1);
    let summary = &list[0];
    assert_eq!(summary.connection_id, connection_id);
    assert_eq!(summary.counterpart_id, users.alice);
    assert_eq!(summary.trust_level, level(1));
    assert_eq!(summary.level_name, "Discovery");
    assert!(summary.capabilities.contains(&Capability::LimitedText));
    assert!(!summary.capabilities.contains(&Capability::TextChat));
    assert!(app.state.connections.connections_for(users.carol).await.unwrap().is_empty());
}

#[tokio::test]
async fn capabilities_follow_the_trust_level() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;

    assert!(svc.has_capability(connection_id, Capability::Discovery).await.unwrap());
    assert!(!svc.has_capability(connection_id, Capability::VoiceCall).await.unwrap());

    climb_to(&app, connection_id, users.alice, users.bob, 3).await;

    assert!(svc.has_capability(connection_id, Capability::VoiceCall).await.unwrap());
    assert!(svc.has_capability(connection_id, Capability::TextChat).await.unwrap());
    assert!(!svc.has_capability(connection_id, Capability::VideoCall).await.unwrap());
}

#[tokio::test]
async fn participant_check_rejects_outsiders() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;

    let err = app
        .state
        .connections
        .connection_for_participant(connection_id, users.carol)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::NOT_A_PARTICIPANT);
}

// ---------------------------------------------------------------------------
// Trust levels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn level_two_needs_thresholds_then_applies_immediately() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;

    let err = svc
        .propose_level_up(connection_id, users.alice, 2)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidState(ref m) if m == reasons::REQUIREMENTS_NOT_MET);

    app.store.backdate_connection(connection_id, 2);
    app.store.set_interaction_counts(connection_id, 10, 0, 0);
    let mut alice_session = app.state.sessions.register(users.alice).await;
    let mut bob_session = app.state.sessions.register(users.bob).await;

    let outcome = svc
        .propose_level_up(connection_id, users.alice, 2)
        .await
        .unwrap();
    assert_matches!(outcome, LevelUpOutcome::Changed { ref connection } if connection.trust_level == level(2));

    for rx in [&mut alice_session.receiver, &mut bob_session.receiver] {
        let events = drain_events(rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "trust_level_changed");
        assert_eq!(events[0]["data"]["new_level"], 2);
    }
}

#[tokio::test]
async fn level_targets_must_be_the_next_step() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;
    app.store.backdate_connection(connection_id, 30);
    app.store.set_interaction_counts(connection_id, 100, 5, 5);

    let err = svc.propose_level_up(connection_id, users.alice, 3).await.unwrap_err();
    assert_matches!(err, CoreError::InvalidState(ref m) if m == reasons::LEVEL_SKIP);

    let err = svc.propose_level_up(connection_id, users.alice, 1).await.unwrap_err();
    assert_matches!(err, CoreError::InvalidState(ref m) if m == reasons::ALREADY_AT_LEVEL);

    svc.propose_level_up(connection_id, users.alice, 2).await.unwrap();
    let err = svc.propose_level_up(connection_id, users.bob, 1).await.unwrap_err();
    assert_matches!(err, CoreError::InvalidState(ref m) if m == reasons::DOWNGRADE_NOT_PERMITTED);
}

#[tokio::test]
async fn consent_gated_level_waits_for_both_parties() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;
    climb_to(&app, connection_id, users.alice, users.bob, 2).await;
    let mut bob_session = app.state.sessions.register(users.bob).await;

    let first = svc
        .propose_level_up(connection_id, users.alice, 3)
        .await
        .unwrap();
    assert_matches!(
        first,
        LevelUpOutcome::AwaitingConsent { target_level, .. } if target_level == level(3)
    );

    let events = drain_events(&mut bob_session.receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "trust_level_proposed");
    assert_eq!(events[0]["data"]["proposer"], users.alice);
    assert_eq!(events[0]["data"]["target_level"], 3);

    // Proposing again from the same side does not count twice.
    let repeat = svc
        .propose_level_up(connection_id, users.alice, 3)
        .await
        .unwrap();
    assert_matches!(repeat, LevelUpOutcome::AwaitingConsent { .. });

    let second = svc
        .propose_level_up(connection_id, users.bob, 3)
        .await
        .unwrap();
    assert_matches!(second, LevelUpOutcome::Changed { ref connection } if connection.trust_level == level(3));
}

#[tokio::test]
async fn simultaneous_final_consents_advance_once() {
    let (app, faulty) = build_faulty_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    climb_to(&app, connection_id, users.alice, users.bob, 2).await;
    let svc = &app.state.connections;
    let mut alice_session = app.state.sessions.register(users.alice).await;
    let mut bob_session = app.state.sessions.register(users.bob).await;

    faulty.interleave(true);
    let (from_alice, from_bob) = tokio::join!(
        svc.propose_level_up(connection_id, users.alice, 3),
        svc.propose_level_up(connection_id, users.bob, 3),
    );
    faulty.interleave(false);

    for outcome in [from_alice.unwrap(), from_bob.unwrap()] {
        assert_matches!(
            outcome,
            LevelUpOutcome::Changed { ref connection } if connection.trust_level == level(3)
        );
    }

    for session in [&mut alice_session, &mut bob_session] {
        let events = drain_events(&mut session.receiver);
        let changed: Vec<_> = events
            .iter()
            .filter(|e| e["type"] == "trust_level_changed")
            .collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0]["data"]["new_level"], 3);
        assert!(events.iter().all(|e| e["type"] != "trust_level_proposed"));
    }

    let list = svc.connections_for(users.alice).await.unwrap();
    assert_eq!(list[0].trust_level, level(3));
}

#[tokio::test]
async fn level_never_decreases_and_caps_at_five() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;

    climb_to(&app, connection_id, users.alice, users.bob, 5).await;

    let (connection, _) = svc
        .connection_for_participant(connection_id, users.alice)
        .await
        .unwrap();
    assert_eq!(connection.trust_level, TrustLevel::MAX);

    for target in [1, 4, 5, 6] {
        let outcome = svc
            .propose_level_up(connection_id, users.bob, target)
            .await
            .unwrap();
        assert_matches!(outcome, LevelUpOutcome::AtCap { ref connection } if connection.trust_level == TrustLevel::MAX);
    }
}

#[tokio::test]
async fn level_up_on_blocked_connection_is_invalid_state() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;

    svc.block_connection(connection_id, users.bob).await.unwrap();

    let err = svc.propose_level_up(connection_id, users.alice, 2).await.unwrap_err();
    assert_matches!(err, CoreError::InvalidState(ref m) if m == reasons::NOT_ACCEPTED);
}

// ---------------------------------------------------------------------------
// Interactions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn limited_text_enforces_length() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;

    let err = svc
        .relay_message(connection_id, users.alice, &"a".repeat(281))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::MESSAGE_TOO_LONG);

    let err = svc.relay_message(connection_id, users.alice, "   ").await.unwrap_err();
    assert_matches!(err, CoreError::Validation(ref m) if m == reasons::EMPTY_MESSAGE);

    let outcome = svc
        .relay_message(connection_id, users.alice, &"a".repeat(280))
        .await
        .unwrap();
    assert_eq!(outcome.connection.message_count, 1);
    assert!(outcome.connection.last_interaction_at.is_some());
    assert!(!outcome.delivery.was_online);
}

#[tokio::test]
async fn text_chat_lifts_the_length_limit() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    climb_to(&app, connection_id, users.alice, users.bob, 2).await;

    let outcome = app
        .state
        .connections
        .relay_message(connection_id, users.bob, &"b".repeat(2_000))
        .await
        .unwrap();

    assert_eq!(outcome.connection.message_count, 101);
}

#[tokio::test]
async fn relayed_message_reaches_every_recipient_session() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let mut phone = app.state.sessions.register(users.bob).await;
    let mut laptop = app.state.sessions.register(users.bob).await;
    let mut sender_session = app.state.sessions.register(users.alice).await;

    let outcome = app
        .state
        .connections
        .relay_message(connection_id, users.alice, "hello")
        .await
        .unwrap();

    assert_eq!(outcome.delivery.delivered_to, 2);
    for rx in [&mut phone.receiver, &mut laptop.receiver] {
        let events = drain_events(rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["type"], "new_message");
        assert_eq!(events[0]["data"]["text"], "hello");
    }
    assert!(drain_events(&mut sender_session.receiver).is_empty());
}

#[tokio::test]
async fn calls_require_the_matching_capability() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;

    let err = svc
        .record_call(connection_id, users.alice, InteractionKind::VoiceCall)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::CAPABILITY_LOCKED);

    let err = svc
        .record_call(connection_id, users.alice, InteractionKind::Message)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation(ref m) if m == reasons::NOT_A_CALL);

    climb_to(&app, connection_id, users.alice, users.bob, 3).await;
    let connection = svc
        .record_call(connection_id, users.alice, InteractionKind::VoiceCall)
        .await
        .unwrap();
    assert_eq!(connection.voice_call_count, 6);

    let err = svc
        .record_call(connection_id, users.alice, InteractionKind::VideoCall)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::CAPABILITY_LOCKED);
}

// ---------------------------------------------------------------------------
// Blocking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocking_a_connection_stops_interaction() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;
    let svc = &app.state.connections;
    let mut bob_other_device = app.state.sessions.register(users.bob).await;
    let mut alice_session = app.state.sessions.register(users.alice).await;

    let connection = svc.block_connection(connection_id, users.bob).await.unwrap();
    assert_eq!(connection.status, ConnectionStatus::Blocked);

    let events = drain_events(&mut bob_other_device.receiver);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "connection_blocked");
    assert_eq!(events[0]["data"]["blocked_by"], users.bob);
    assert!(drain_events(&mut alice_session.receiver).is_empty());

    let err = svc.relay_message(connection_id, users.alice, "hi").await.unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::BLOCKED);
    assert!(!svc.has_capability(connection_id, Capability::Discovery).await.unwrap());
    assert!(svc.connections_for(users.alice).await.unwrap().is_empty());

    let err = svc.request_by_pin(users.alice, BOB_PIN, None).await.unwrap_err();
    assert_matches!(err, CoreError::Forbidden(ref m) if m == reasons::BLOCKED);

    // Blocking again is idempotent.
    svc.block_connection(connection_id, users.bob).await.unwrap();
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unavailable_store_fails_without_side_effects() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let mut bob_session = app.state.sessions.register(users.bob).await;
    let mut activity_rx = app.state.event_bus.subscribe();

    app.store.set_unavailable(true);
    let err = app
        .state
        .connections
        .request_by_pin(users.alice, BOB_PIN, None)
        .await
        .unwrap_err();

    assert_matches!(err, CoreError::Unavailable(_));
    assert!(err.is_retryable());
    assert!(drain_events(&mut bob_session.receiver).is_empty());
    assert!(activity_rx.try_recv().is_err());

    app.store.set_unavailable(false);
    assert_eq!(app.store.request_count(), 0);
    assert!(app.state.connections.ping().await.is_ok());
}

#[tokio::test]
async fn activity_events_follow_the_lifecycle() {
    let app = build_test_app();
    let users = seed_users(&app.store);
    let mut activity_rx = app.state.event_bus.subscribe();

    let connection_id = connect(&app, users.alice, users.bob, BOB_PIN).await;

    let sent = activity_rx.try_recv().unwrap();
    assert_eq!(sent.event_type, activity::REQUEST_SENT);
    assert_eq!(sent.actor_user_id, Some(users.alice));
    assert_eq!(sent.target_user_id, Some(users.bob));
    assert_eq!(sent.payload["via"], "pin");

    let accepted = activity_rx.try_recv().unwrap();
    assert_eq!(accepted.event_type, activity::REQUEST_ACCEPTED);
    assert_eq!(accepted.connection_id, Some(connection_id));
    assert_eq!(accepted.actor_user_id, Some(users.bob));
}

// ---------------------------------------------------------------------------
// PIN regeneration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn regenerate_pin_derives_from_display_name() {
    let app = build_test_app();
    let users = seed_users(&app.store);

    let pin = app.state.connections.regenerate_pin(users.alice).await.unwrap();

    assert!(pin.as_str().starts_with("PIN-ALI"));
    let request = app
        .state
        .connections
        .request_by_pin(users.bob, pin.as_str(), None)
        .await
        .unwrap();
    assert_eq!(request.receiver_id, users.alice);
}

#[tokio::test]
async fn regenerate_pin_gives_up_when_every_candidate_is_taken() {
    let app = build_test_app();
    let user = app.store.add_user("Al", "al@example.com", None);
    for n in 0..1000 {
        let pin = format!("PIN-ALX{n:03}");
        app.store
            .add_user("Other", &format!("other{n}@example.com"), Some(&pin));
    }

    let err = app.state.connections.regenerate_pin(user).await.unwrap_err();

    assert_matches!(err, CoreError::Conflict(ref m) if m == reasons::DUPLICATE_PIN);
}

#[tokio::test]
async fn regenerate_pin_for_unknown_user_is_not_found() {
    let app = build_test_app();

    let err = app.state.connections.regenerate_pin(404).await.unwrap_err();

    assert_matches!(err, CoreError::NotFound { .. });
}
