//! Client-side mirror of the game.
//!
//! [`GameState`] is the aggregate root the reducer produces. It is only ever
//! replaced wholesale by a local reset or advanced one event at a time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::protocol::{ActionKind, ActionRequirement, GameResult, Phase, PlayerId, Role};

/// A seat at the table.
///
/// `role` is `None` while the role is unknown to this client, which is not the
/// same as the player having no role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: Option<Role>,
    pub role_name: Option<String>,
    pub is_human: bool,
    pub is_alive: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: None,
            role_name: None,
            is_human: false,
            is_alive: true,
        }
    }
}

/// One entry of the speech log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRecord {
    pub player_id: PlayerId,
    pub player_name: String,
    pub content: String,
    pub round: u32,
    pub phase: Phase,
}

/// Outcome of the human seer's inspection, delivered out-of-band so the
/// action panel can animate the reveal against the still-visible requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeerReveal {
    pub target_id: Option<PlayerId>,
    pub target_name: Option<String>,
    pub is_good: Option<bool>,
}

/// Everything the client knows about the current game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: Option<String>,
    /// Seats in server order. Never shrinks; dead players stay with `is_alive = false`.
    pub players: Vec<Player>,
    pub phase: Phase,
    pub round: u32,
    pub is_running: bool,
    pub current_speaker: Option<PlayerId>,
    pub human_player_id: Option<PlayerId>,
    pub human_role: Option<Role>,
    pub human_role_name: Option<String>,
    pub human_role_description: Option<String>,
    /// Fellow werewolves; empty unless the human is a werewolf.
    pub teammates: BTreeSet<PlayerId>,
    pub result: GameResult,
    pub speeches: Vec<SpeechRecord>,
    /// Append-only notification log.
    pub system_messages: Vec<String>,
    pub action_required: Option<ActionRequirement>,
    /// Alive players whose vote is still outstanding.
    pub voting_thinking_ids: BTreeSet<PlayerId>,
    pub voted_ids: BTreeSet<PlayerId>,
    pub thinking_player_id: Option<PlayerId>,
    pub announcement: Option<String>,
    pub night_action: Option<ActionKind>,
    pub night_action_message: Option<String>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    pub fn alive_ids(&self) -> BTreeSet<PlayerId> {
        self.alive_players().map(|p| p.id).collect()
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.player(id).is_some_and(|p| p.is_alive)
    }

    /// The local human's seat, once known.
    pub fn human_player(&self) -> Option<&Player> {
        match self.human_player_id {
            Some(id) => self.player(id),
            None => self.players.iter().find(|p| p.is_human),
        }
    }

    /// Display name for `id`, falling back to the seat number.
    pub fn player_name(&self, id: PlayerId) -> String {
        self.player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    pub fn is_over(&self) -> bool {
        self.result.is_over()
    }

    pub fn action_kind(&self) -> Option<ActionKind> {
        self.action_required.as_ref().map(ActionRequirement::kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn table() -> GameState {
        let mut state = GameState::new();
        state.players = vec![Player::new(1, "Ann"), Player::new(2, "Bo"), Player::new(3, "Cy")];
        state.players.get_mut(1).unwrap().is_alive = false;
        state.players.get_mut(2).unwrap().is_human = true;
        state
    }

    #[test]
    fn defaults_are_the_initial_state() {
        let state = GameState::default();
        assert_eq!(state.phase, Phase::Waiting);
        assert_eq!(state.round, 0);
        assert_eq!(state.result, GameResult::Ongoing);
        assert!(state.players.is_empty());
        assert!(state.action_required.is_none());
        assert!(!state.is_running);
    }

    #[test]
    fn alive_ids_skip_dead_players() {
        let state = table();
        assert_eq!(state.alive_ids().into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(state.is_alive(1));
        assert!(!state.is_alive(2));
        assert!(!state.is_alive(42));
    }

    #[test]
    fn human_player_falls_back_to_flag() {
        let mut state = table();
        assert_eq!(state.human_player().unwrap().id, 3);
        state.human_player_id = Some(1);
        assert_eq!(state.human_player().unwrap().id, 1);
    }

    #[test]
    fn player_name_falls_back_to_seat() {
        let state = table();
        assert_eq!(state.player_name(2), "Bo");
        assert_eq!(state.player_name(9), "#9");
    }
}
