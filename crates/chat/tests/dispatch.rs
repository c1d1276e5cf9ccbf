mod common;

use std::sync::Arc;

use common::{
    dispatcher_over, repository_assets, Harness, RecordingTransport, RejectingTransport,
    UnavailableSessionStore,
};
use taskbot_chat::{DispatchOutcome, DropReason, InboundEvent, Resolution};
use taskbot_core::commands::{CallbackKey, CommandKey};
use taskbot_core::labels::{CommandTable, LabelCatalog};
use taskbot_core::domain::UserId;
use taskbot_core::flows::DialogEvent;
use taskbot_core::session::{
    InMemorySessionStore, SessionKey, SessionStore, DEFAULT_SESSION_TTL,
};

const ALICE: UserId = UserId(1001);

#[tokio::test]
async fn literal_command_wins_over_cursor() {
    let harness = Harness::new();
    harness.sessions.advance(ALICE, DialogEvent::SignUpStarted).await.expect("advance");

    let outcome = harness.say(ALICE, "/team").await;

    assert_eq!(outcome, DispatchOutcome::Handled(Resolution::Literal(CommandKey::Team)));
    assert!(harness.sessions.pending_login(ALICE).await.expect("read").is_none());
}

#[tokio::test]
async fn free_text_goes_to_the_cursor_handler() {
    let harness = Harness::new();
    harness.sessions.advance(ALICE, DialogEvent::SignUpStarted).await.expect("advance");

    let outcome = harness.say(ALICE, "alice").await;

    assert_eq!(outcome, DispatchOutcome::Handled(Resolution::Cursor(CommandKey::Login)));
    assert_eq!(harness.sessions.pending_login(ALICE).await.expect("read").as_deref(), Some("alice"));
}

#[tokio::test]
async fn localized_label_resolves_through_command_table() {
    let harness = Harness::new();

    let outcome = harness.say(ALICE, &harness.label("team")).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Handled(Resolution::Label {
            label_key: "team".to_owned(),
            command: CommandKey::Team,
        })
    );
    let sent = harness.transport.last_to(ALICE).await.expect("reply sent");
    assert_eq!(sent.text, harness.label("choose"));
    assert!(sent.markup.is_some());
}

#[tokio::test]
async fn label_mapped_to_renamed_command() {
    let harness = Harness::new();

    let outcome = harness.say(ALICE, &harness.label("delete_task")).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Handled(Resolution::Label {
            label_key: "delete_task".to_owned(),
            command: CommandKey::TaskDelete,
        })
    );
    assert_eq!(
        harness.sessions.raw_cursor(ALICE).await.expect("read").as_deref(),
        Some("/task_deleted")
    );
}

#[tokio::test]
async fn shared_label_text_resolves_through_any_translated_key() {
    let labels = LabelCatalog::from_pairs([("heading", "Team"), ("team", "Team")]);
    let commands = CommandTable::from_pairs([("team", CommandKey::Team)]);
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher =
        dispatcher_over(Arc::new(InMemorySessionStore::new()), transport.clone(), labels, commands);

    let outcome = dispatcher.dispatch(InboundEvent::text(ALICE, "Team")).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Handled(Resolution::Label {
            label_key: "team".to_owned(),
            command: CommandKey::Team,
        })
    );
    assert_eq!(transport.texts_to(ALICE).await, vec!["choose".to_owned()]);
}

#[tokio::test]
async fn invite_link_routes_to_join_handler() {
    let harness = Harness::new();

    let outcome = harness.say(ALICE, "/start new_team_user_42").await;

    assert_eq!(outcome, DispatchOutcome::Handled(Resolution::Invite));
    assert_eq!(harness.transport.texts_to(ALICE).await, vec![harness.label("not_registered")]);
}

#[tokio::test]
async fn malformed_invite_invokes_nothing() {
    let harness = Harness::new();

    let outcome = harness.say(ALICE, "/start new_team_user_abc").await;

    assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::MalformedInvite));
    assert!(harness.transport.all().await.is_empty());
}

#[tokio::test]
async fn absent_cursor_differs_from_empty_cursor() {
    let harness = Harness::new();
    assert_eq!(harness.sessions.raw_cursor(ALICE).await.expect("read"), None);

    harness
        .store
        .set(&SessionKey::Cursor(ALICE), "", DEFAULT_SESSION_TTL)
        .await
        .expect("write");

    assert_eq!(harness.sessions.raw_cursor(ALICE).await.expect("read"), Some(String::new()));
    assert_eq!(harness.sessions.cursor(ALICE).await.expect("read"), None);
    assert_eq!(harness.say(ALICE, "hello").await, DispatchOutcome::Dropped(DropReason::NoHandler));
}

#[tokio::test]
async fn unknown_persisted_cursor_falls_through_to_labels() {
    let harness = Harness::new();
    harness
        .store
        .set(&SessionKey::Cursor(ALICE), "check_tasks", DEFAULT_SESSION_TTL)
        .await
        .expect("write");

    let outcome = harness.say(ALICE, &harness.label("team")).await;

    assert!(matches!(outcome, DispatchOutcome::Handled(Resolution::Label { .. })));
}

#[tokio::test]
async fn unresolved_text_is_dropped_unless_notification_enabled() {
    let silent = Harness::new();
    assert_eq!(silent.say(ALICE, "what?").await, DispatchOutcome::Dropped(DropReason::NoHandler));
    assert!(silent.transport.all().await.is_empty());

    let chatty = Harness::notifying_unrecognized();
    assert_eq!(chatty.say(ALICE, "what?").await, DispatchOutcome::Handled(Resolution::Unrecognized));
    assert_eq!(chatty.transport.texts_to(ALICE).await, vec![chatty.label("unrecognized")]);
}

#[tokio::test]
async fn non_numeric_step_input_is_dropped_silently() {
    let harness = Harness::new();
    harness.sessions.advance(ALICE, DialogEvent::TaskDeletionStarted).await.expect("advance");

    let outcome = harness.say(ALICE, "first one").await;

    assert_eq!(outcome, DispatchOutcome::Failed(Resolution::Cursor(CommandKey::TaskDeleted)));
    assert!(harness.transport.all().await.is_empty());
    assert_eq!(
        harness.sessions.raw_cursor(ALICE).await.expect("read").as_deref(),
        Some("/task_deleted")
    );
}

#[tokio::test]
async fn callbacks_resolve_by_exact_payload() {
    let harness = Harness::new();

    assert_eq!(
        harness.press(ALICE, "/no").await,
        DispatchOutcome::Handled(Resolution::Callback(CallbackKey::CancelExitTeam))
    );
    assert_eq!(
        harness.press(ALICE, "/maybe").await,
        DispatchOutcome::Dropped(DropReason::UnknownCallback)
    );
}

#[tokio::test]
async fn every_command_and_callback_has_a_handler() {
    let harness = Harness::new();
    assert_eq!(harness.dispatcher.message_handler_count(), CommandKey::ALL.len());
    assert_eq!(harness.dispatcher.callback_handler_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rapid_events_for_one_user_do_not_deadlock() {
    let harness = Harness::new();
    let mut handles = Vec::new();

    for index in 0..64 {
        let dispatcher = Arc::clone(&harness.dispatcher);
        let text = match index % 4 {
            0 => "/sign_up".to_owned(),
            1 => format!("login{index}"),
            2 => "/start".to_owned(),
            _ => "/check_tasks".to_owned(),
        };
        handles.push(tokio::spawn(async move {
            dispatcher.dispatch(InboundEvent::text(ALICE, text)).await
        }));
    }

    for handle in handles {
        handle.await.expect("dispatch task completes");
    }

    assert!(!harness.transport.all().await.is_empty());
}

#[tokio::test]
async fn store_outage_fails_the_event_without_crashing() {
    let (labels, commands) = repository_assets();
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher =
        dispatcher_over(Arc::new(UnavailableSessionStore), transport.clone(), labels, commands);

    let literal = dispatcher.dispatch(InboundEvent::text(ALICE, "/start")).await;
    assert_eq!(literal, DispatchOutcome::Failed(Resolution::Literal(CommandKey::Start)));

    let free_text = dispatcher.dispatch(InboundEvent::text(ALICE, "alice")).await;
    assert_eq!(free_text, DispatchOutcome::Dropped(DropReason::NoHandler));

    assert!(transport.all().await.is_empty());
}

#[tokio::test]
async fn transport_failure_fails_the_event_and_later_events_still_dispatch() {
    let (labels, commands) = repository_assets();
    let team_label = labels.text("team");
    let dispatcher = dispatcher_over(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(RejectingTransport),
        labels,
        commands,
    );

    let first = dispatcher.dispatch(InboundEvent::text(ALICE, "/team")).await;
    assert_eq!(first, DispatchOutcome::Failed(Resolution::Literal(CommandKey::Team)));

    let second = dispatcher.dispatch(InboundEvent::text(ALICE, team_label)).await;
    assert!(matches!(second, DispatchOutcome::Failed(Resolution::Label { .. })));
}
