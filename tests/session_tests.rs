#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! End-to-end session tests.
//!
//! A [`Session`] runs against the scripted `MockConnector` from
//! `tests/common`; the remote end plays the server by pushing frames, and the
//! assertions look at the published state, the event history and the frames
//! the client sent back.

mod common;

use std::time::Duration;

use serde_json::json;
use werewolf_client::{
    ActionKind, ActionRequirement, ClientError, ConnectionConfig, ConnectionState, GameResult,
    GameState, Phase, Role, Session,
};

use common::{game_created, role_assigned, targets_requirement, MockConnector, Remote};

const SETTLE: Duration = Duration::from_secs(5);

async fn connected_session() -> (Session, Remote) {
    common::init_tracing();
    let (connector, remote) = MockConnector::accepting();
    let session = Session::start(connector, ConnectionConfig::new("ws://test/ws"));
    session.connect().unwrap();
    session.wait_connected().await.unwrap();
    (session, remote)
}

/// Wait until the published state satisfies `pred`.
async fn settle(session: &Session, pred: impl FnMut(&GameState) -> bool) -> GameState {
    let mut changes = session.state_changes();
    let state = tokio::time::timeout(SETTLE, changes.wait_for(pred))
        .await
        .expect("state never settled")
        .expect("reducer task exited")
        .clone();
    state
}

async fn seat_seven(session: &Session, remote: &Remote, role: &str) -> GameState {
    remote.event("game_created", game_created(7));
    remote.event("role_assigned", role_assigned(role, &[]));
    remote.event("game_started", json!({"round": 1, "phase": "night"}));
    settle(session, |s| s.is_running && s.phase == Phase::Night).await
}

// ════════════════════════════════════════════════════════════════════
// Game flow
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn game_created_seats_seven_alive_players() {
    let (mut session, remote) = connected_session().await;

    remote.event("game_created", game_created(7));
    let state = settle(&session, |s| !s.players.is_empty()).await;

    assert_eq!(state.players.len(), 7);
    assert!(state.players.iter().all(|p| p.is_alive));
    assert!(state.players.iter().all(|p| p.role.is_none()));
    assert_eq!(state.game_id.as_deref(), Some("game-1"));
    assert_eq!(state.human_player().unwrap().name, "P1");

    session.shutdown().await;
}

#[tokio::test]
async fn a_full_day_is_mirrored() {
    let (mut session, remote) = connected_session().await;
    seat_seven(&session, &remote, "villager").await;

    remote.event(
        "night_result",
        json!({
            "messages": ["昨晚 P6 死了"],
            "dead_announcement": "P6",
            "players": [{"id": 6, "is_alive": false}]
        }),
    );
    remote.event("phase_change", json!({"phase": "day_discuss", "message": "讨论开始"}));
    remote.event("speaker_turn", json!({"speaker_id": 2, "speaker_name": "P2"}));
    remote.event(
        "player_speech",
        json!({"speaker_id": 2, "speaker_name": "P2", "content": "I trust P3"}),
    );
    remote.event("phase_change", json!({"phase": "day_vote"}));
    remote.event("reset_vote", json!({}));
    remote.event("player_voted", json!({"player_id": 2}));
    remote.event("player_voted", json!({"player_id": 3}));

    let state = settle(&session, |s| s.voted_ids.len() == 2).await;
    assert_eq!(state.phase, Phase::DayVote);
    assert!(!state.is_alive(6));
    assert_eq!(state.speeches.len(), 1);
    assert_eq!(state.speeches[0].phase, Phase::DayDiscuss);
    assert!(state.current_speaker.is_none());
    assert_eq!(
        state.voting_thinking_ids.iter().copied().collect::<Vec<_>>(),
        vec![1, 4, 5, 7]
    );

    remote.event(
        "vote_result",
        json!({"executed_id": 4, "executed_name": "P4", "is_tie": false,
               "vote_details": [{"target_id": 4, "votes": 3}]}),
    );
    let state = settle(&session, |s| !s.is_alive(4)).await;
    assert_eq!(state.system_messages.last().unwrap(), "P4 was voted out");

    session.shutdown().await;
}

#[tokio::test]
async fn game_over_is_terminal_for_requirements() {
    let (mut session, remote) = connected_session().await;
    seat_seven(&session, &remote, "werewolf").await;

    remote.event(
        "game_over",
        json!({
            "result": "wolves_win",
            "winner": "狼人",
            "roles": [{"id": 1, "name": "P1", "role": "werewolf", "is_alive": true}],
            "message": "狼人胜利"
        }),
    );
    remote.event("action_required", targets_requirement("vote", &[2]));
    remote.event("announcement", json!({"content": "游戏结束"}));

    let state = settle(&session, |s| s.announcement.is_some()).await;
    assert_eq!(state.result, GameResult::WolvesWin);
    assert_eq!(state.phase, Phase::GameOver);
    assert!(state.action_required.is_none());
    assert!(state.player(1).unwrap().is_human);
    assert_eq!(state.player(1).unwrap().role, Some(Role::Werewolf));
    assert_eq!(state.players.len(), 7);

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Commands
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn commands_use_the_wire_format() {
    let (mut session, remote) = connected_session().await;
    let commands = session.commands();

    commands.create_game("Alice").unwrap();
    commands.start_game().unwrap();
    commands.confirm_role().unwrap();
    commands.wolf_kill(3).unwrap();
    commands.witch_action(true, None).unwrap();
    commands.witch_action(false, Some(5)).unwrap();
    commands.speak("I am the seer").unwrap();
    commands.vote(2).unwrap();
    commands.hunter_shoot(6).unwrap();

    tokio::time::timeout(SETTLE, async {
        while remote.sent().len() < 9 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(
        remote.sent_json(),
        vec![
            json!({"type": "create_game", "data": {"player_name": "Alice"}}),
            json!({"type": "start_game"}),
            json!({"type": "action", "data": {"action": "role_confirmed", "data": {}}}),
            json!({"type": "action", "data": {"action": "wolf_kill", "data": {"target_id": 3}}}),
            json!({"type": "action", "data": {"action": "witch_action", "data": {"save": true}}}),
            json!({"type": "action", "data": {"action": "witch_action",
                   "data": {"save": false, "poison_target": 5}}}),
            json!({"type": "action", "data": {"action": "speak",
                   "data": {"content": "I am the seer"}}}),
            json!({"type": "action", "data": {"action": "vote", "data": {"target_id": 2}}}),
            json!({"type": "action", "data": {"action": "hunter_shoot", "data": {"target_id": 6}}}),
        ]
    );

    session.shutdown().await;
}

#[tokio::test]
async fn answering_clears_the_requirement_locally() {
    let (mut session, remote) = connected_session().await;
    seat_seven(&session, &remote, "villager").await;

    remote.event("action_required", targets_requirement("vote", &[2, 3, 4]));
    let state = settle(&session, |s| s.action_required.is_some()).await;
    assert_eq!(
        state.action_required.unwrap().valid_targets().unwrap().len(),
        3
    );

    session.commands().vote(3).unwrap();
    settle(&session, |s| s.action_required.is_none()).await;

    session.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn instant_server_reply_survives_the_local_clear() {
    let (mut session, remote) = connected_session().await;
    seat_seven(&session, &remote, "villager").await;
    remote.reply_on(
        r#""action":"vote""#,
        common::frame(
            "action_required",
            json!({"action": "wait", "message": "waiting for the others"}),
        ),
    );

    for round in 0..20 {
        remote.event("action_required", targets_requirement("vote", &[2, 3]));
        settle(&session, |s| s.action_kind() == Some(ActionKind::Vote)).await;

        session.commands().vote(2).unwrap();
        settle(&session, |s| s.action_kind() == Some(ActionKind::Wait)).await;

        // Barrier: anything queued before this event has been applied.
        remote.event("announcement", json!({"content": format!("round {round}")}));
        let state = settle(&session, |s| {
            s.announcement.as_deref() == Some(format!("round {round}").as_str())
        })
        .await;
        assert_eq!(state.action_kind(), Some(ActionKind::Wait), "round {round}");
    }

    session.shutdown().await;
}

#[tokio::test]
async fn seer_check_keeps_prompt_until_eyes_close() {
    let (mut session, remote) = connected_session().await;
    seat_seven(&session, &remote, "seer").await;
    let mut reveals = session.subscribe_seer_results();

    remote.event("action_required", targets_requirement("seer_check", &[2, 3]));
    settle(&session, |s| s.action_required.is_some()).await;

    session.commands().seer_check(2).unwrap();
    remote.event(
        "seer_result",
        json!({"target_id": 2, "target_name": "P2", "is_good": false}),
    );

    let reveal = tokio::time::timeout(SETTLE, reveals.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reveal.target_id, Some(2));
    assert_eq!(reveal.is_good, Some(false));

    let state = settle(&session, |s| s.system_messages.len() == 1).await;
    assert_eq!(state.action_kind(), Some(ActionKind::SeerCheck));

    remote.event("announcement", json!({"content": "预言家请闭眼"}));
    settle(&session, |s| s.action_required.is_none()).await;

    session.shutdown().await;
}

#[tokio::test]
async fn refused_command_leaves_requirement_in_place() {
    let (mut session, remote) = connected_session().await;
    seat_seven(&session, &remote, "hunter").await;

    remote.event("action_required", targets_requirement("hunter_shoot", &[2]));
    settle(&session, |s| s.action_required.is_some()).await;

    session.disconnect().unwrap();
    let mut changes = session.connection_changes();
    changes
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .unwrap();

    let err = session.commands().hunter_shoot(2).unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        session.state().action_required,
        Some(ActionRequirement::HunterShoot {
            message: Some("hunter_shoot?".into()),
            valid_targets: [2].into(),
        })
    );
    assert!(remote.sent().is_empty());

    session.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Local state and history
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn reset_keeps_connection_and_history() {
    let (mut session, remote) = connected_session().await;
    seat_seven(&session, &remote, "witch").await;

    session.reset_local_state().unwrap();
    let state = settle(&session, |s| s.players.is_empty()).await;
    assert_eq!(state, GameState::default());
    assert!(session.is_connected());
    assert_eq!(session.event_count().await, 3);

    remote.event("game_created", game_created(7));
    settle(&session, |s| s.players.len() == 7).await;
    assert_eq!(session.event_count().await, 4);

    session.shutdown().await;
}

#[tokio::test]
async fn history_keeps_every_event_including_unknown_kinds() {
    let (mut session, remote) = connected_session().await;

    remote.event("game_created", game_created(7));
    remote.event("sheriff_elected", json!({"player_id": 2}));
    remote.event("announcement", json!({"content": "天黑请闭眼"}));
    settle(&session, |s| s.announcement.is_some()).await;

    let kinds: Vec<_> = session
        .event_history()
        .await
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, ["game_created", "sheriff_elected", "announcement"]);

    let tail = session.events_since(1).await;
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].payload["player_id"], 2);
    assert_eq!(session.latest_event().await.unwrap().kind, "announcement");
    assert!(session.events_since(10).await.is_empty());

    session.shutdown().await;
}

#[tokio::test]
async fn shutdown_applies_received_events_then_closes() {
    let (mut session, remote) = connected_session().await;
    remote.event("game_created", game_created(5));
    settle(&session, |s| s.players.len() == 5).await;

    session.shutdown().await;
    assert!(remote.was_closed());
    assert!(!session.is_connected());
    assert_eq!(session.state().players.len(), 5);
    assert!(matches!(
        session.reset_local_state(),
        Err(ClientError::SessionClosed)
    ));
}
