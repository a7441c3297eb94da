//! Event-driven state reducer.
//!
//! [`apply`] maps `(state, event)` to the next state. It is pure and
//! deterministic: the same event sequence from the same starting state always
//! produces the same final state. It never fails; unknown kinds and malformed
//! payloads leave the state unchanged and are only logged.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::event::GameEvent;
use crate::protocol::{
    ActionKind, AnnouncementPayload, GameCreatedPayload, GameOverPayload, GameStartedPayload,
    HunterShootResultPayload, NightActionChangePayload, NightResultPayload, PhaseChangePayload,
    PlayerSpeechPayload, PlayerVotedPayload, RoleAssignedPayload, RosterEntry, SeerResultPayload,
    ServerEvent, SpeakerTurnPayload, ThinkingStartPayload, VoteResultPayload,
};
use crate::protocol::{ActionRequirement, Phase, PlayerId};
use crate::state::{GameState, Player, SeerReveal, SpeechRecord};

/// Apply one server event.
pub fn apply(state: GameState, event: &GameEvent) -> GameState {
    apply_with_reveal(state, event).0
}

/// Apply one server event and also hand back the seer reveal it carried, if any.
///
/// The reveal is the only piece of reducer output that has to reach the UI
/// out-of-band; the session publishes it on a dedicated channel.
pub fn apply_with_reveal(state: GameState, event: &GameEvent) -> (GameState, Option<SeerReveal>) {
    let parsed = match ServerEvent::interpret(event) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            debug!(kind = %event.kind, "ignoring unknown event kind");
            return (state, None);
        }
        Err(e) => {
            warn!(kind = %event.kind, "ignoring event with malformed payload: {e}");
            return (state, None);
        }
    };
    reduce(state, parsed)
}

/// Optimistically drop the active requirement after the player answered it.
pub fn clear_action_required(mut state: GameState) -> GameState {
    state.action_required = None;
    state
}

fn reduce(mut state: GameState, event: ServerEvent) -> (GameState, Option<SeerReveal>) {
    let mut reveal = None;
    match event {
        ServerEvent::GameCreated(p) => game_created(&mut state, p),
        ServerEvent::RoleAssigned(p) => role_assigned(&mut state, p),
        ServerEvent::GameStarted(p) => game_started(&mut state, p),
        ServerEvent::PhaseChange(p) => phase_change(&mut state, p),
        ServerEvent::ResetVote => {
            state.voted_ids.clear();
            state.voting_thinking_ids = state.alive_ids();
        }
        ServerEvent::ActionRequired(requirement) => action_required(&mut state, requirement),
        ServerEvent::SpeakerTurn(SpeakerTurnPayload { speaker_id, .. }) => {
            state.current_speaker = speaker_id;
        }
        ServerEvent::ThinkingStart(p) => thinking_start(&mut state, p),
        ServerEvent::PlayerVoted(p) => player_voted(&mut state, p),
        ServerEvent::NightActionChange(NightActionChangePayload { action, message }) => {
            state.night_action = action;
            state.night_action_message = message;
        }
        ServerEvent::PlayerSpeech(p) => player_speech(&mut state, p),
        ServerEvent::NightResult(p) => night_result(&mut state, p),
        ServerEvent::VoteResult(p) => vote_result(&mut state, p),
        ServerEvent::SeerResult(p) => reveal = Some(seer_result(&mut state, p)),
        ServerEvent::HunterShootResult(p) => hunter_shoot_result(&mut state, p),
        ServerEvent::GameOver(p) => game_over(&mut state, p),
        ServerEvent::Announcement(p) => announcement(&mut state, p),
    }
    (state, reveal)
}

fn game_created(state: &mut GameState, p: GameCreatedPayload) {
    state.game_id = p.game_id;
    state.players = p
        .players
        .into_iter()
        .map(|entry| Player {
            id: entry.id,
            name: entry.name.unwrap_or_default(),
            role: None,
            role_name: None,
            is_human: entry.is_human.unwrap_or(false),
            is_alive: true,
        })
        .collect();
    if let Some(human) = state.players.iter().find(|p| p.is_human) {
        state.human_player_id = Some(human.id);
    }
}

fn role_assigned(state: &mut GameState, p: RoleAssignedPayload) {
    if p.player_id.is_some() {
        state.human_player_id = p.player_id;
    }
    state.teammates = match &p.role {
        Some(role) if role.is_werewolf() => p.teammates,
        _ => BTreeSet::new(),
    };
    if let Some(player) = p.player_id.and_then(|id| state.player_mut(id)) {
        player.is_human = true;
        if p.role.is_some() {
            player.role.clone_from(&p.role);
            player.role_name.clone_from(&p.role_name);
        }
    }
    state.human_role = p.role;
    state.human_role_name = p.role_name;
    state.human_role_description = p.role_description;
    state.is_running = true;
}

fn game_started(state: &mut GameState, p: GameStartedPayload) {
    if let Some(round) = p.round {
        state.round = round;
    }
    if let Some(phase) = p.phase {
        state.phase = phase;
    }
    state.is_running = true;
}

/// Phase boundaries are hard resets of per-phase transient state.
fn phase_change(state: &mut GameState, p: PhaseChangePayload) {
    if let Some(phase) = p.phase {
        state.phase = phase;
    }
    if let Some(round) = p.round {
        state.round = round;
    }
    state.action_required = None;
    state.current_speaker = None;
    state.voted_ids.clear();
    state.voting_thinking_ids.clear();
}

fn action_required(state: &mut GameState, requirement: ActionRequirement) {
    if state.is_over() {
        debug!(
            action = %requirement.kind(),
            "ignoring action requirement after game over"
        );
        return;
    }
    state.action_required = Some(requirement);
}

fn thinking_start(state: &mut GameState, p: ThinkingStartPayload) {
    // Voting indicators are seeded by `reset_vote`, not per player.
    if p.action.as_deref() == Some(ActionKind::Vote.as_str()) {
        return;
    }
    state.thinking_player_id = p.player_id;
}

fn player_voted(state: &mut GameState, p: PlayerVotedPayload) {
    let Some(id) = p.player_id else {
        warn!("player_voted without player_id");
        return;
    };
    if state.voted_ids.contains(&id) {
        return;
    }
    if !state.is_alive(id) {
        debug!(player_id = id, "ignoring vote from unknown or dead player");
        return;
    }
    state.voted_ids.insert(id);
    state.voting_thinking_ids.remove(&id);
}

fn player_speech(state: &mut GameState, p: PlayerSpeechPayload) {
    match (p.speaker_id, p.content) {
        (Some(player_id), Some(content)) => {
            let replayed = state
                .speeches
                .iter()
                .any(|s| s.player_id == player_id && s.content == content);
            if replayed {
                debug!(player_id, "dropping replayed speech");
            } else {
                let player_name = p
                    .speaker_name
                    .unwrap_or_else(|| state.player_name(player_id));
                state.speeches.push(SpeechRecord {
                    player_id,
                    player_name,
                    content,
                    round: state.round,
                    phase: state.phase.clone(),
                });
            }
        }
        _ => warn!("player_speech without speaker_id or content"),
    }
    state.thinking_player_id = None;
    if state.action_kind() == Some(ActionKind::Speak) {
        state.action_required = None;
    }
}

fn night_result(state: &mut GameState, p: NightResultPayload) {
    state.system_messages.extend(p.messages);
    if let Some(roster) = p.players {
        merge_liveness(&mut state.players, roster);
        prune_dead(state);
    }
}

/// Fold a liveness roster into the known players.
///
/// Revealed roles are never erased: an entry without a role leaves the known
/// one in place. Ids the roster does not mention are kept as they are.
fn merge_liveness(players: &mut Vec<Player>, roster: Vec<RosterEntry>) {
    for entry in roster {
        let alive = entry.liveness();
        match players.iter_mut().find(|p| p.id == entry.id) {
            Some(player) => {
                if let Some(alive) = alive {
                    player.is_alive = alive;
                }
                if player.role.is_none() {
                    player.role = entry.role;
                }
                if player.role_name.is_none() {
                    player.role_name = entry.role_name;
                }
                if let Some(name) = entry.name {
                    player.name = name;
                }
                player.is_human |= entry.is_human.unwrap_or(false);
            }
            None => players.push(Player {
                id: entry.id,
                name: entry.name.unwrap_or_default(),
                role: entry.role,
                role_name: entry.role_name,
                is_human: entry.is_human.unwrap_or(false),
                is_alive: alive.unwrap_or(true),
            }),
        }
    }
}

fn vote_result(state: &mut GameState, p: VoteResultPayload) {
    match p.executed_id.filter(|_| !p.is_tie) {
        Some(id) => {
            let message = p.message.unwrap_or_else(|| {
                let name = p.executed_name.unwrap_or_else(|| state.player_name(id));
                format!("{name} was voted out")
            });
            state.system_messages.push(message);
            mark_dead(state, id);
        }
        None => {
            let message = p
                .message
                .unwrap_or_else(|| "Tie vote, nobody was eliminated".to_owned());
            state.system_messages.push(message);
        }
    }
}

fn seer_result(state: &mut GameState, p: SeerResultPayload) -> SeerReveal {
    let name = p
        .target_name
        .clone()
        .or_else(|| p.target_id.map(|id| state.player_name(id)))
        .unwrap_or_else(|| "unknown player".to_owned());
    let verdict = match p.is_good {
        Some(true) => "is on the good side",
        Some(false) => "is a werewolf",
        None => "could not be read",
    };
    state
        .system_messages
        .push(format!("Inspection: {name} {verdict}"));
    SeerReveal {
        target_id: p.target_id,
        target_name: p.target_name,
        is_good: p.is_good,
    }
}

fn hunter_shoot_result(state: &mut GameState, p: HunterShootResultPayload) {
    let hunter = p
        .hunter_id
        .map(|id| state.player_name(id))
        .unwrap_or_else(|| "The hunter".to_owned());
    let target = p
        .target_name
        .or_else(|| p.target_id.map(|id| state.player_name(id)))
        .unwrap_or_else(|| "unknown player".to_owned());
    state.system_messages.push(format!("{hunter} shot {target}"));
    if let Some(id) = p.target_id {
        mark_dead(state, id);
    }
}

fn game_over(state: &mut GameState, p: GameOverPayload) {
    state.phase = Phase::GameOver;
    if let Some(result) = p.result {
        state.result = result;
    }
    if !p.roles.is_empty() {
        let previous = std::mem::take(&mut state.players);
        state.players = p
            .roles
            .into_iter()
            .map(|entry| final_reveal(&previous, entry))
            .collect();
        // Seats the final roster omits are kept rather than dropped.
        for player in previous {
            if state.player(player.id).is_none() {
                state.players.push(player);
            }
        }
    }
    state.action_required = None;
    state.current_speaker = None;
    state.thinking_player_id = None;
    state.voting_thinking_ids.clear();
    state.is_running = false;
    if let Some(message) = p.message {
        state.system_messages.push(message);
    }
}

fn final_reveal(previous: &[Player], entry: RosterEntry) -> Player {
    let known = previous.iter().find(|p| p.id == entry.id);
    let alive = entry.liveness();
    Player {
        id: entry.id,
        name: entry
            .name
            .or_else(|| known.map(|p| p.name.clone()))
            .unwrap_or_default(),
        role: entry.role.or_else(|| known.and_then(|p| p.role.clone())),
        role_name: entry
            .role_name
            .or_else(|| known.and_then(|p| p.role_name.clone())),
        is_human: known.is_some_and(|p| p.is_human) || entry.is_human.unwrap_or(false),
        is_alive: alive.or_else(|| known.map(|p| p.is_alive)).unwrap_or(true),
    }
}

fn announcement(state: &mut GameState, p: AnnouncementPayload) {
    // Announcements and phase changes are not ordered relative to each other,
    // so the close marker has to clear the requirement on its own.
    if p.clears_action() {
        state.action_required = None;
    }
    state.announcement = p.content;
}

fn mark_dead(state: &mut GameState, id: PlayerId) {
    match state.player_mut(id) {
        Some(player) => player.is_alive = false,
        None => debug!(player_id = id, "death of a player not on the roster"),
    }
    prune_dead(state);
}

/// Vote bookkeeping only ever refers to alive players.
fn prune_dead(state: &mut GameState) {
    let alive = state.alive_ids();
    state.voted_ids.retain(|id| alive.contains(id));
    state.voting_thinking_ids.retain(|id| alive.contains(id));
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{GameResult, Role};
    use serde_json::{json, Value};

    fn ev(kind: &str, data: Value) -> GameEvent {
        GameEvent::from_parts(kind, data).unwrap()
    }

    fn run(events: &[GameEvent]) -> GameState {
        events.iter().fold(GameState::default(), apply)
    }

    fn seven_players() -> GameEvent {
        let players: Vec<Value> = (1..=7)
            .map(|id| json!({"id": id, "name": format!("P{id}"), "is_human": id == 1}))
            .collect();
        ev("game_created", json!({"game_id": "g1", "players": players}))
    }

    fn started() -> Vec<GameEvent> {
        vec![
            seven_players(),
            ev(
                "role_assigned",
                json!({
                    "player_id": 1,
                    "role": "seer",
                    "role_name": "预言家",
                    "role_description": "每晚可以查验一名玩家",
                    "teammates": []
                }),
            ),
            ev("game_started", json!({"round": 1, "phase": "night"})),
        ]
    }

    #[test]
    fn game_created_seats_everyone_alive() {
        let state = run(&[seven_players()]);
        assert_eq!(state.game_id.as_deref(), Some("g1"));
        assert_eq!(state.players.len(), 7);
        assert!(state.players.iter().all(|p| p.is_alive && p.role.is_none()));
        assert_eq!(state.human_player_id, Some(1));
    }

    #[test]
    fn role_assigned_reveals_own_role_only() {
        let state = run(&started());
        assert_eq!(state.human_role, Some(Role::Seer));
        assert_eq!(state.human_role_name.as_deref(), Some("预言家"));
        assert!(state.teammates.is_empty());
        assert!(state.is_running);
        assert_eq!(state.player(1).unwrap().role, Some(Role::Seer));
        assert!(state.players.iter().skip(1).all(|p| p.role.is_none()));
        assert_eq!(state.round, 1);
        assert_eq!(state.phase, Phase::Night);
    }

    #[test]
    fn teammates_only_kept_for_werewolves() {
        let wolf = ev(
            "role_assigned",
            json!({"player_id": 1, "role": "werewolf", "teammates": [4]}),
        );
        let state = run(&[seven_players(), wolf]);
        assert_eq!(state.teammates.iter().copied().collect::<Vec<_>>(), vec![4]);

        let villager = ev(
            "role_assigned",
            json!({"player_id": 1, "role": "villager", "teammates": [4]}),
        );
        let state = run(&[seven_players(), villager]);
        assert!(state.teammates.is_empty());
    }

    #[test]
    fn phase_change_resets_transient_state() {
        let mut events = started();
        events.push(ev("phase_change", json!({"phase": "day_discuss"})));
        events.push(ev("speaker_turn", json!({"speaker_id": 3})));
        events.push(ev("action_required", json!({"action": "speak", "time_limit": 30})));
        events.push(ev("reset_vote", json!({})));
        events.push(ev("player_voted", json!({"player_id": 2})));
        let before = run(&events);
        assert!(before.action_required.is_some());
        assert_eq!(before.current_speaker, Some(3));
        assert!(!before.voted_ids.is_empty());

        events.push(ev("phase_change", json!({"phase": "day_vote", "message": "投票阶段开始"})));
        let after = run(&events);
        assert_eq!(after.phase, Phase::DayVote);
        assert!(after.action_required.is_none());
        assert!(after.current_speaker.is_none());
        assert!(after.voted_ids.is_empty());
        assert!(after.voting_thinking_ids.is_empty());
    }

    #[test]
    fn phase_change_without_phase_keeps_phase_but_resets() {
        let mut events = started();
        events.push(ev("speaker_turn", json!({"speaker_id": 2})));
        events.push(ev("phase_change", json!({})));
        let state = run(&events);
        assert_eq!(state.phase, Phase::Night);
        assert!(state.current_speaker.is_none());
    }

    #[test]
    fn reset_vote_then_votes_keep_sets_disjoint() {
        let mut events = started();
        events.push(ev("phase_change", json!({"phase": "day_vote"})));
        events.push(ev("reset_vote", json!({})));
        for id in [2, 5, 7] {
            events.push(ev("player_voted", json!({"player_id": id})));
        }
        let state = run(&events);
        assert_eq!(state.voted_ids.len(), 3);
        assert!(state.voted_ids.is_disjoint(&state.voting_thinking_ids));
        assert_eq!(
            state.voting_thinking_ids.iter().copied().collect::<Vec<_>>(),
            vec![1, 3, 4, 6]
        );
    }

    #[test]
    fn reset_vote_seeds_only_alive_players() {
        let mut events = started();
        events.push(ev(
            "vote_result",
            json!({"executed_id": 4, "executed_name": "P4", "is_tie": false}),
        ));
        events.push(ev("reset_vote", json!({})));
        let state = run(&events);
        assert!(!state.voting_thinking_ids.contains(&4));
        assert_eq!(state.voting_thinking_ids.len(), 6);
    }

    #[test]
    fn duplicate_votes_are_idempotent() {
        let mut events = started();
        events.push(ev("reset_vote", json!({})));
        events.push(ev("player_voted", json!({"player_id": 3})));
        events.push(ev("player_voted", json!({"player_id": 3})));
        let state = run(&events);
        assert_eq!(state.voted_ids.len(), 1);
        assert!(!state.voting_thinking_ids.contains(&3));
    }

    #[test]
    fn votes_from_unknown_players_are_ignored() {
        let mut events = started();
        events.push(ev("reset_vote", json!({})));
        events.push(ev("player_voted", json!({"player_id": 42})));
        let state = run(&events);
        assert!(state.voted_ids.is_empty());
    }

    #[test]
    fn vote_thinking_is_owned_by_reset_vote() {
        let mut events = started();
        events.push(ev("thinking_start", json!({"player_id": 4, "action": "vote"})));
        let state = run(&events);
        assert!(state.thinking_player_id.is_none());

        events.push(ev("thinking_start", json!({"player_id": 4, "action": "speak"})));
        let state = run(&events);
        assert_eq!(state.thinking_player_id, Some(4));
    }

    #[test]
    fn replayed_speech_is_deduplicated() {
        let mut events = started();
        events.push(ev("phase_change", json!({"phase": "day_discuss"})));
        let speech = ev(
            "player_speech",
            json!({"speaker_id": 2, "speaker_name": "P2", "content": "I am a villager"}),
        );
        events.push(speech.clone());
        events.push(speech);
        let state = run(&events);
        assert_eq!(state.speeches.len(), 1);
        let record = &state.speeches[0];
        assert_eq!(record.player_id, 2);
        assert_eq!(record.round, 1);
        assert_eq!(record.phase, Phase::DayDiscuss);
    }

    #[test]
    fn same_content_from_another_speaker_is_kept() {
        let mut events = started();
        events.push(ev("player_speech", json!({"speaker_id": 2, "content": "pass"})));
        events.push(ev("player_speech", json!({"speaker_id": 3, "content": "pass"})));
        let state = run(&events);
        assert_eq!(state.speeches.len(), 2);
        assert_eq!(state.speeches[1].player_name, "P3");
    }

    #[test]
    fn speech_clears_thinking_and_only_speak_requirement() {
        let mut events = started();
        events.push(ev("thinking_start", json!({"player_id": 3, "action": "speak"})));
        events.push(ev("action_required", json!({"action": "speak", "time_limit": 30})));
        events.push(ev("player_speech", json!({"speaker_id": 3, "content": "hello"})));
        let state = run(&events);
        assert!(state.thinking_player_id.is_none());
        assert!(state.action_required.is_none());

        let mut events = started();
        events.push(ev("action_required", json!({"action": "vote", "valid_targets": [2]})));
        events.push(ev("player_speech", json!({"speaker_id": 3, "content": "hello"})));
        let state = run(&events);
        assert_eq!(state.action_kind(), Some(ActionKind::Vote));
    }

    #[test]
    fn action_required_replaces_wholesale() {
        let mut events = started();
        events.push(ev(
            "action_required",
            json!({"action": "wolf_kill", "valid_targets": [2, 3], "teammates": [4]}),
        ));
        events.push(ev("action_required", json!({"action": "wait", "message": "等待"})));
        let state = run(&events);
        assert_eq!(
            state.action_required,
            Some(ActionRequirement::Wait {
                message: Some("等待".into())
            })
        );
    }

    #[test]
    fn night_result_merges_liveness_and_keeps_roles() {
        let mut events = started();
        let players: Vec<Value> = (1..=7)
            .map(|id| json!({"id": id, "name": format!("P{id}"), "is_human": id == 1, "is_alive": id != 5}))
            .collect();
        events.push(ev(
            "night_result",
            json!({
                "messages": ["P5 死了"],
                "dead_announcement": "昨晚的死亡公告",
                "players": players
            }),
        ));
        let state = run(&events);
        assert_eq!(state.system_messages, vec!["P5 死了".to_owned()]);
        assert!(!state.player(5).unwrap().is_alive);
        assert_eq!(state.player(1).unwrap().role, Some(Role::Seer));
        assert_eq!(state.player(1).unwrap().role_name.as_deref(), Some("预言家"));
        assert_eq!(state.players.len(), 7);
    }

    #[test]
    fn night_result_without_roster_only_logs() {
        let mut events = started();
        events.push(ev(
            "night_result",
            json!({"messages": ["昨晚是平安夜，没有人死亡"], "dead_announcement": "平安夜"}),
        ));
        let state = run(&events);
        assert_eq!(state.system_messages.len(), 1);
        assert!(state.players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn vote_result_marks_executed_dead() {
        let mut events = started();
        events.push(ev(
            "vote_result",
            json!({
                "executed_id": 6,
                "executed_name": "P6",
                "vote_details": [{"target_id": 6, "votes": 4}],
                "is_tie": false
            }),
        ));
        let state = run(&events);
        assert!(!state.player(6).unwrap().is_alive);
        assert_eq!(state.system_messages.last().unwrap(), "P6 was voted out");
    }

    #[test]
    fn vote_result_prefers_server_text() {
        let mut events = started();
        events.push(ev(
            "vote_result",
            json!({
                "executed_id": 6,
                "executed_name": "P6",
                "is_tie": false,
                "message": "P6 被公投出局"
            }),
        ));
        let state = run(&events);
        assert!(!state.player(6).unwrap().is_alive);
        assert_eq!(state.system_messages.last().unwrap(), "P6 被公投出局");
        assert!(!state.system_messages.iter().any(|m| m == "P6 was voted out"));
    }

    #[test]
    fn tie_vote_kills_nobody() {
        let mut events = started();
        events.push(ev(
            "vote_result",
            json!({"executed_id": null, "is_tie": true, "message": "平票，直接进入夜晚"}),
        ));
        let state = run(&events);
        assert!(state.players.iter().all(|p| p.is_alive));
        assert_eq!(state.system_messages.last().unwrap(), "平票，直接进入夜晚");
    }

    #[test]
    fn seer_result_logs_and_reveals() {
        let state = run(&started());
        let (state, reveal) = apply_with_reveal(
            state,
            &ev(
                "seer_result",
                json!({"target_id": 4, "target_name": "P4", "is_good": false}),
            ),
        );
        assert_eq!(
            reveal,
            Some(SeerReveal {
                target_id: Some(4),
                target_name: Some("P4".into()),
                is_good: Some(false),
            })
        );
        assert_eq!(
            state.system_messages.last().unwrap(),
            "Inspection: P4 is a werewolf"
        );

        let (_, reveal) = apply_with_reveal(state, &ev("announcement", json!({"content": "x"})));
        assert!(reveal.is_none());
    }

    #[test]
    fn hunter_shot_marks_target_dead() {
        let mut events = started();
        events.push(ev(
            "hunter_shoot_result",
            json!({"hunter_id": 3, "target_id": 7, "target_name": "P7"}),
        ));
        let state = run(&events);
        assert!(!state.player(7).unwrap().is_alive);
        assert_eq!(state.system_messages.last().unwrap(), "P3 shot P7");
    }

    #[test]
    fn deaths_are_pruned_from_vote_sets() {
        let mut events = started();
        events.push(ev("reset_vote", json!({})));
        events.push(ev("player_voted", json!({"player_id": 7})));
        events.push(ev("hunter_shoot_result", json!({"hunter_id": 3, "target_id": 7})));
        let state = run(&events);
        assert!(!state.voted_ids.contains(&7));
        assert!(!state.voting_thinking_ids.contains(&7));
    }

    #[test]
    fn game_over_reveals_roles_and_keeps_human_flag() {
        let mut events = started();
        events.push(ev("action_required", json!({"action": "vote", "valid_targets": [2]})));
        let roles: Vec<Value> = (1..=7)
            .map(|id| {
                let role = if id <= 2 { "werewolf" } else { "villager" };
                json!({"id": id, "name": format!("P{id}"), "role": role, "role_name": role, "is_alive": id != 2})
            })
            .collect();
        events.push(ev(
            "game_over",
            json!({"result": "villagers_win", "winner": "好人", "roles": roles, "message": "好人胜利"}),
        ));
        let state = run(&events);
        assert_eq!(state.phase, Phase::GameOver);
        assert_eq!(state.result, GameResult::VillagersWin);
        assert!(state.is_over());
        assert!(state.action_required.is_none());
        assert!(state.player(1).unwrap().is_human);
        assert_eq!(state.player(2).unwrap().role, Some(Role::Werewolf));
        assert!(!state.player(2).unwrap().is_alive);
        assert_eq!(state.system_messages.last().unwrap(), "好人胜利");
    }

    #[test]
    fn action_requirements_after_game_over_are_ignored() {
        let mut events = started();
        events.push(ev("game_over", json!({"result": "wolves_win", "roles": []})));
        events.push(ev("action_required", json!({"action": "vote", "valid_targets": [2]})));
        events.push(ev("announcement", json!({"content": "游戏结束 - 狼人胜利"})));
        let state = run(&events);
        assert!(state.action_required.is_none());
        assert_eq!(state.players.len(), 7);
        assert_eq!(state.announcement.as_deref(), Some("游戏结束 - 狼人胜利"));
    }

    #[test]
    fn close_eyes_announcement_clears_requirement() {
        let mut events = started();
        events.push(ev("action_required", json!({"action": "seer_check", "valid_targets": [2, 3]})));
        events.push(ev("announcement", json!({"content": "预言家正在行动"})));
        let state = run(&events);
        assert!(state.action_required.is_some());

        events.push(ev("announcement", json!({"content": "预言家请闭眼..."})));
        let state = run(&events);
        assert!(state.action_required.is_none());
        assert_eq!(state.announcement.as_deref(), Some("预言家请闭眼..."));
    }

    #[test]
    fn structured_clear_flag_wins() {
        let mut events = started();
        events.push(ev("action_required", json!({"action": "vote", "valid_targets": [2]})));
        events.push(ev(
            "announcement",
            json!({"content": "time is up", "clears_action": true}),
        ));
        assert!(run(&events).action_required.is_none());
    }

    #[test]
    fn night_action_change_sets_overlay_text() {
        let mut events = started();
        events.push(ev(
            "night_action_change",
            json!({"action": "wolf_kill", "message": "狼人正在行动"}),
        ));
        let state = run(&events);
        assert_eq!(state.night_action, Some(ActionKind::WolfKill));
        assert_eq!(state.night_action_message.as_deref(), Some("狼人正在行动"));

        events.push(ev("night_action_change", json!({"action": null, "message": "天亮了"})));
        let state = run(&events);
        assert!(state.night_action.is_none());
    }

    #[test]
    fn unknown_and_malformed_events_leave_state_unchanged() {
        let base = run(&started());
        let unknown = apply(base.clone(), &ev("sheriff_elected", json!({"player_id": 3})));
        assert_eq!(unknown, base);
        let malformed = apply(base.clone(), &ev("speaker_turn", json!({"speaker_id": "x"})));
        assert_eq!(malformed, base);
    }

    #[test]
    fn round_and_phase_only_move_on_phase_events() {
        let mut events = started();
        events.push(ev("speaker_turn", json!({"speaker_id": 2, "phase": "day_vote", "round": 9})));
        events.push(ev("vote_result", json!({"executed_id": 3, "round": 9})));
        let state = run(&events);
        assert_eq!(state.round, 1);
        assert_eq!(state.phase, Phase::Night);
    }

    #[test]
    fn replaying_a_sequence_is_deterministic() {
        let mut events = started();
        events.extend([
            ev("phase_change", json!({"phase": "day_discuss"})),
            ev("speaker_turn", json!({"speaker_id": 2})),
            ev("player_speech", json!({"speaker_id": 2, "content": "hi"})),
            ev("phase_change", json!({"phase": "day_vote"})),
            ev("reset_vote", json!({})),
            ev("player_voted", json!({"player_id": 2})),
            ev("vote_result", json!({"executed_id": 2, "is_tie": false})),
        ]);
        assert_eq!(run(&events), run(&events));
    }

    #[test]
    fn clear_action_required_only_touches_requirement() {
        let mut events = started();
        events.push(ev("action_required", json!({"action": "vote", "valid_targets": [2]})));
        let state = run(&events);
        let cleared = clear_action_required(state.clone());
        assert!(cleared.action_required.is_none());
        assert_eq!(cleared.players, state.players);
        assert_eq!(cleared.phase, state.phase);
    }
}
