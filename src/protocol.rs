//! Wire-compatible protocol types for the werewolf game server.
//!
//! Every frame in both directions is a JSON object `{"type": ..., "data": ...}`.
//! Outbound frames are modelled by [`ClientMessage`]. Inbound frames are first
//! decoded into a generic [`GameEvent`](crate::event::GameEvent) (kind plus flat
//! payload map) and only interpreted into a typed [`ServerEvent`] by the
//! reducer, so an unknown kind or a sloppy payload never prevents the event
//! from reaching the event history.
//!
//! Payload fields are optional almost everywhere: the server is the authority
//! and the client mirrors whatever subset of a payload actually arrived.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::GameEvent;

// ── Type aliases ────────────────────────────────────────────────────

/// Seat number assigned by the server (`1..=N`), stable for a whole game.
pub type PlayerId = u32;

/// Kind tag of the heartbeat acknowledgment, consumed by the connection layer.
pub const PONG: &str = "pong";

/// Action name sent once the human has seen their role card.
pub const ROLE_CONFIRMED: &str = "role_confirmed";

/// Substring the server puts in announcements that end the current actor's turn
/// ("请闭眼", close your eyes).
const CLOSE_EYES_MARKER: &str = "请闭眼";

// ── Open tag sets ───────────────────────────────────────────────────

/// Stage of the game's turn structure.
///
/// Unknown tags are kept verbatim in [`Phase::Other`] so a newer server never
/// breaks an older client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    #[default]
    Waiting,
    Night,
    NightWolf,
    NightSeer,
    NightWitch,
    Day,
    DayAnnounce,
    DayDiscuss,
    DayVote,
    LastWords,
    HunterShoot,
    GameOver,
    Other(String),
}

impl Phase {
    /// Wire tag for this phase.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Waiting => "waiting",
            Self::Night => "night",
            Self::NightWolf => "night_wolf",
            Self::NightSeer => "night_seer",
            Self::NightWitch => "night_witch",
            Self::Day => "day",
            Self::DayAnnounce => "day_announce",
            Self::DayDiscuss => "day_discuss",
            Self::DayVote => "day_vote",
            Self::LastWords => "last_words",
            Self::HunterShoot => "hunter_shoot",
            Self::GameOver => "game_over",
            Self::Other(tag) => tag,
        }
    }

    /// Returns `true` for the terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver)
    }

    /// Returns `true` for the night sub-stages.
    pub fn is_night(&self) -> bool {
        matches!(
            self,
            Self::Night | Self::NightWolf | Self::NightSeer | Self::NightWitch
        )
    }
}

impl From<String> for Phase {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "waiting" => Self::Waiting,
            "night" => Self::Night,
            "night_wolf" => Self::NightWolf,
            "night_seer" => Self::NightSeer,
            "night_witch" => Self::NightWitch,
            "day" => Self::Day,
            "day_announce" => Self::DayAnnounce,
            "day_discuss" => Self::DayDiscuss,
            "day_vote" => Self::DayVote,
            "last_words" => Self::LastWords,
            "hunter_shoot" => Self::HunterShoot,
            "game_over" => Self::GameOver,
            _ => Self::Other(tag),
        }
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret role of a player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Werewolf,
    Seer,
    Witch,
    Hunter,
    Villager,
    Other(String),
}

impl Role {
    /// Wire tag for this role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Werewolf => "werewolf",
            Self::Seer => "seer",
            Self::Witch => "witch",
            Self::Hunter => "hunter",
            Self::Villager => "villager",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_werewolf(&self) -> bool {
        matches!(self, Self::Werewolf)
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "werewolf" => Self::Werewolf,
            "seer" => Self::Seer,
            "witch" => Self::Witch,
            "hunter" => Self::Hunter,
            "villager" => Self::Villager,
            _ => Self::Other(tag),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Closed tag sets ─────────────────────────────────────────────────

/// Outcome of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    #[default]
    Ongoing,
    WolvesWin,
    VillagersWin,
}

impl GameResult {
    pub fn is_over(self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

/// Kind of input the server can ask the human player for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    WolfKill,
    SeerCheck,
    WitchAction,
    Vote,
    HunterShoot,
    Speak,
    Wait,
}

impl ActionKind {
    /// Wire tag for this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WolfKill => "wolf_kill",
            Self::SeerCheck => "seer_check",
            Self::WitchAction => "witch_action",
            Self::Vote => "vote",
            Self::HunterShoot => "hunter_shoot",
            Self::Speak => "speak",
            Self::Wait => "wait",
        }
    }

    /// The inspection action keeps its requirement on screen after the player
    /// answers, so the result can be revealed inline before the panel goes away.
    pub fn is_two_step(self) -> bool {
        matches!(self, Self::SeerCheck)
    }
}

impl FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "wolf_kill" => Self::WolfKill,
            "seer_check" => Self::SeerCheck,
            "witch_action" => Self::WitchAction,
            "vote" => Self::Vote,
            "hunter_shoot" => Self::HunterShoot,
            "speak" => Self::Speak,
            "wait" => Self::Wait,
            other => return Err(UnknownActionKind(other.to_owned())),
        })
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`ActionKind::from_str`] for tags outside the known set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActionKind(pub String);

impl fmt::Display for UnknownActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action kind `{}`", self.0)
    }
}

impl std::error::Error for UnknownActionKind {}

// ── Action requirement ──────────────────────────────────────────────

/// A server-declared prompt the human player must answer.
///
/// Each variant carries only the fields relevant to its kind. At most one is
/// active at a time and it is always replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequirement {
    WolfKill {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        valid_targets: BTreeSet<PlayerId>,
        #[serde(default)]
        teammates: BTreeSet<PlayerId>,
    },
    SeerCheck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        valid_targets: BTreeSet<PlayerId>,
    },
    WitchAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        valid_targets: BTreeSet<PlayerId>,
        #[serde(default)]
        can_save: bool,
        #[serde(default)]
        has_antidote: bool,
        #[serde(default)]
        has_poison: bool,
        #[serde(default)]
        can_poison: bool,
        /// Tonight's wolf victim, shown so the witch can decide on the antidote.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wolf_target: Option<PlayerId>,
    },
    Vote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        valid_targets: BTreeSet<PlayerId>,
    },
    HunterShoot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        valid_targets: BTreeSet<PlayerId>,
    },
    Speak {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Seconds allowed for the speech.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_limit: Option<u32>,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ActionRequirement {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::WolfKill { .. } => ActionKind::WolfKill,
            Self::SeerCheck { .. } => ActionKind::SeerCheck,
            Self::WitchAction { .. } => ActionKind::WitchAction,
            Self::Vote { .. } => ActionKind::Vote,
            Self::HunterShoot { .. } => ActionKind::HunterShoot,
            Self::Speak { .. } => ActionKind::Speak,
            Self::Wait { .. } => ActionKind::Wait,
        }
    }

    /// Prompt text supplied by the server, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::WolfKill { message, .. }
            | Self::SeerCheck { message, .. }
            | Self::WitchAction { message, .. }
            | Self::Vote { message, .. }
            | Self::HunterShoot { message, .. }
            | Self::Speak { message, .. }
            | Self::Wait { message } => message.as_deref(),
        }
    }

    /// Ids the player may pick from. Empty for kinds without a target.
    pub fn valid_targets(&self) -> Option<&BTreeSet<PlayerId>> {
        match self {
            Self::WolfKill { valid_targets, .. }
            | Self::SeerCheck { valid_targets, .. }
            | Self::WitchAction { valid_targets, .. }
            | Self::Vote { valid_targets, .. }
            | Self::HunterShoot { valid_targets, .. } => Some(valid_targets),
            Self::Speak { .. } | Self::Wait { .. } => None,
        }
    }
}

// ── Outbound messages ───────────────────────────────────────────────

/// Commands sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new game with the human seated under `player_name`.
    CreateGame { player_name: String },
    /// Assign roles and start the game.
    StartGame,
    /// Answer an action requirement (or confirm the role card).
    Action {
        action: String,
        #[serde(default)]
        data: serde_json::Map<String, serde_json::Value>,
    },
    /// Heartbeat; answered with a `pong` frame.
    Ping,
}

impl ClientMessage {
    /// The `type` tag this message is sent under.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => "create_game",
            Self::StartGame => "start_game",
            Self::Action { .. } => "action",
            Self::Ping => "ping",
        }
    }
}

// ── Inbound payloads ────────────────────────────────────────────────

/// One seat in a roster carried by `game_created`, `night_result` or `game_over`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_human: Option<bool>,
    #[serde(default)]
    pub is_alive: Option<bool>,
    /// `alive`, `dead` or `poisoned`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub role_name: Option<String>,
}

impl RosterEntry {
    /// Liveness carried by this entry: `is_alive` wins, then `status`.
    pub fn liveness(&self) -> Option<bool> {
        self.is_alive
            .or_else(|| self.status.as_deref().map(|status| status == "alive"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GameCreatedPayload {
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub players: Vec<RosterEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoleAssignedPayload {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub role_description: Option<String>,
    #[serde(default)]
    pub teammates: BTreeSet<PlayerId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GameStartedPayload {
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PhaseChangePayload {
    #[serde(default)]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnnouncementPayload {
    #[serde(default)]
    pub content: Option<String>,
    /// Structured replacement for the close-eyes marker.
    #[serde(default)]
    pub clears_action: Option<bool>,
}

impl AnnouncementPayload {
    /// Whether this announcement ends the human's current action.
    ///
    /// An explicit `clears_action` flag takes precedence over the text marker.
    pub fn clears_action(&self) -> bool {
        self.clears_action.unwrap_or_else(|| {
            self.content
                .as_deref()
                .is_some_and(announcement_closes_action)
        })
    }
}

/// Returns `true` when announcement text tells the current actor their turn
/// is over.
pub fn announcement_closes_action(content: &str) -> bool {
    content.contains(CLOSE_EYES_MARKER)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NightActionChangePayload {
    #[serde(default)]
    pub action: Option<ActionKind>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SpeakerTurnPayload {
    #[serde(default)]
    pub speaker_id: Option<PlayerId>,
    #[serde(default)]
    pub speaker_name: Option<String>,
    #[serde(default)]
    pub is_human: Option<bool>,
    #[serde(default)]
    pub time_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ThinkingStartPayload {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    /// Kept as a raw tag: only `vote` changes the reducer's behavior.
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayerSpeechPayload {
    #[serde(default)]
    pub speaker_id: Option<PlayerId>,
    #[serde(default)]
    pub speaker_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayerVotedPayload {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDetail {
    pub target_id: PlayerId,
    pub votes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VoteResultPayload {
    #[serde(default)]
    pub executed_id: Option<PlayerId>,
    #[serde(default)]
    pub executed_name: Option<String>,
    #[serde(default)]
    pub vote_details: Vec<VoteDetail>,
    #[serde(default)]
    pub is_tie: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NightResultPayload {
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub dead_announcement: Option<String>,
    #[serde(default)]
    pub players: Option<Vec<RosterEntry>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SeerResultPayload {
    #[serde(default)]
    pub target_id: Option<PlayerId>,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub is_good: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HunterShootResultPayload {
    #[serde(default)]
    pub hunter_id: Option<PlayerId>,
    #[serde(default)]
    pub target_id: Option<PlayerId>,
    #[serde(default)]
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GameOverPayload {
    #[serde(default)]
    pub result: Option<GameResult>,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub roles: Vec<RosterEntry>,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Typed inbound events ────────────────────────────────────────────

/// A [`GameEvent`] interpreted against the known event kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    GameCreated(GameCreatedPayload),
    RoleAssigned(RoleAssignedPayload),
    GameStarted(GameStartedPayload),
    PhaseChange(PhaseChangePayload),
    ResetVote,
    ActionRequired(ActionRequirement),
    SpeakerTurn(SpeakerTurnPayload),
    ThinkingStart(ThinkingStartPayload),
    PlayerVoted(PlayerVotedPayload),
    NightActionChange(NightActionChangePayload),
    PlayerSpeech(PlayerSpeechPayload),
    NightResult(NightResultPayload),
    VoteResult(VoteResultPayload),
    SeerResult(SeerResultPayload),
    HunterShootResult(HunterShootResultPayload),
    GameOver(GameOverPayload),
    Announcement(AnnouncementPayload),
}

impl ServerEvent {
    /// Interpret a raw event.
    ///
    /// Returns `Ok(None)` for kinds this client does not know, and an error
    /// when a known kind carries a payload of the wrong shape.
    pub fn interpret(event: &GameEvent) -> Result<Option<Self>, serde_json::Error> {
        let parsed = match event.kind.as_str() {
            "game_created" => Self::GameCreated(payload(event)?),
            "role_assigned" => Self::RoleAssigned(payload(event)?),
            "game_started" => Self::GameStarted(payload(event)?),
            "phase_change" => Self::PhaseChange(payload(event)?),
            "reset_vote" => Self::ResetVote,
            "action_required" => Self::ActionRequired(payload(event)?),
            "speaker_turn" => Self::SpeakerTurn(payload(event)?),
            "thinking_start" => Self::ThinkingStart(payload(event)?),
            "player_voted" => Self::PlayerVoted(payload(event)?),
            "night_action_change" => Self::NightActionChange(payload(event)?),
            "player_speech" => Self::PlayerSpeech(payload(event)?),
            "night_result" => Self::NightResult(payload(event)?),
            "vote_result" => Self::VoteResult(payload(event)?),
            "seer_result" => Self::SeerResult(payload(event)?),
            "hunter_shoot_result" => Self::HunterShootResult(payload(event)?),
            "game_over" => Self::GameOver(payload(event)?),
            "announcement" => Self::Announcement(payload(event)?),
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}

fn payload<T: serde::de::DeserializeOwned>(event: &GameEvent) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::Object(event.payload.clone()))
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
    use serde_json::json;

    fn event(kind: &str, data: serde_json::Value) -> GameEvent {
        GameEvent::from_parts(kind, data).unwrap()
    }

    #[test]
    fn phase_tags_round_trip_including_unknown() {
        let phase: Phase = serde_json::from_value(json!("night_witch")).unwrap();
        assert_eq!(phase, Phase::NightWitch);
        let phase: Phase = serde_json::from_value(json!("sheriff_election")).unwrap();
        assert_eq!(phase, Phase::Other("sheriff_election".into()));
        assert_eq!(
            serde_json::to_value(&phase).unwrap(),
            json!("sheriff_election")
        );
        assert_eq!(serde_json::to_value(Phase::DayVote).unwrap(), json!("day_vote"));
    }

    #[test]
    fn role_tags_keep_unknown_roles() {
        let role: Role = serde_json::from_value(json!("guard")).unwrap();
        assert_eq!(role, Role::Other("guard".into()));
        assert!(!role.is_werewolf());
        let role: Role = serde_json::from_value(json!("werewolf")).unwrap();
        assert!(role.is_werewolf());
    }

    #[test]
    fn action_kind_parses_wire_tags() {
        assert_eq!("seer_check".parse::<ActionKind>(), Ok(ActionKind::SeerCheck));
        assert!("dance".parse::<ActionKind>().is_err());
        assert!(ActionKind::SeerCheck.is_two_step());
        assert!(!ActionKind::Vote.is_two_step());
    }

    #[test]
    fn client_message_wire_format() {
        let json = serde_json::to_value(ClientMessage::CreateGame {
            player_name: "Alice".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"type": "create_game", "data": {"player_name": "Alice"}})
        );

        let json = serde_json::to_value(ClientMessage::Ping).unwrap();
        assert_eq!(json, json!({"type": "ping"}));

        let json = serde_json::to_value(ClientMessage::StartGame).unwrap();
        assert_eq!(json, json!({"type": "start_game"}));

        let mut data = serde_json::Map::new();
        data.insert("target_id".into(), json!(3));
        let json = serde_json::to_value(ClientMessage::Action {
            action: "vote".into(),
            data,
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"type": "action", "data": {"action": "vote", "data": {"target_id": 3}}})
        );
    }

    #[test]
    fn witch_requirement_decodes_with_extra_fields() {
        let ev = event(
            "action_required",
            json!({
                "action": "witch_action",
                "message": "女巫请选择行动",
                "valid_targets": [1, 2, 4],
                "can_save": true,
                "has_antidote": true,
                "has_poison": false,
                "can_poison": false,
                "night_kill": false,
                "wolf_target": 4
            }),
        );
        let Some(ServerEvent::ActionRequired(req)) = ServerEvent::interpret(&ev).unwrap() else {
            panic!("expected ActionRequired");
        };
        assert_eq!(req.kind(), ActionKind::WitchAction);
        assert_eq!(req.message(), Some("女巫请选择行动"));
        if let ActionRequirement::WitchAction {
            can_save,
            has_poison,
            wolf_target,
            valid_targets,
            ..
        } = req
        {
            assert!(can_save);
            assert!(!has_poison);
            assert_eq!(wolf_target, Some(4));
            assert_eq!(valid_targets.into_iter().collect::<Vec<_>>(), vec![1, 2, 4]);
        }
    }

    #[test]
    fn requirement_without_optional_fields_decodes() {
        let ev = event("action_required", json!({"action": "wait"}));
        let parsed = ServerEvent::interpret(&ev).unwrap();
        assert_eq!(
            parsed,
            Some(ServerEvent::ActionRequired(ActionRequirement::Wait {
                message: None
            }))
        );
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        let ev = event("sheriff_elected", json!({"player_id": 3}));
        assert_eq!(ServerEvent::interpret(&ev).unwrap(), None);
    }

    #[test]
    fn wrong_payload_shape_is_an_error() {
        let ev = event("player_voted", json!({"player_id": "three"}));
        assert!(ServerEvent::interpret(&ev).is_err());
    }

    #[test]
    fn missing_fields_propagate_as_absent() {
        let ev = event("seer_result", json!({}));
        assert_eq!(
            ServerEvent::interpret(&ev).unwrap(),
            Some(ServerEvent::SeerResult(SeerResultPayload::default()))
        );
    }

    #[test]
    fn close_eyes_marker_and_explicit_flag() {
        assert!(announcement_closes_action("狼人请闭眼..."));
        assert!(!announcement_closes_action("天亮了"));

        let marked = AnnouncementPayload {
            content: Some("预言家请闭眼".into()),
            clears_action: None,
        };
        assert!(marked.clears_action());

        let overridden = AnnouncementPayload {
            content: Some("预言家请闭眼".into()),
            clears_action: Some(false),
        };
        assert!(!overridden.clears_action());

        let flagged = AnnouncementPayload {
            content: Some("time is up".into()),
            clears_action: Some(true),
        };
        assert!(flagged.clears_action());
    }

    #[test]
    fn roster_liveness_prefers_flag_over_status() {
        let entry: RosterEntry =
            serde_json::from_value(json!({"id": 2, "status": "poisoned"})).unwrap();
        assert_eq!(entry.liveness(), Some(false));
        let entry: RosterEntry =
            serde_json::from_value(json!({"id": 2, "status": "dead", "is_alive": true})).unwrap();
        assert_eq!(entry.liveness(), Some(true));
        let entry: RosterEntry = serde_json::from_value(json!({"id": 2})).unwrap();
        assert_eq!(entry.liveness(), None);
    }
}
