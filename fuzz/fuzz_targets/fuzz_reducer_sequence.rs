#![no_main]

use libfuzzer_sys::fuzz_target;
use werewolf_client::{reducer, GameEvent, GameState};

// Newline-separated frames applied in order; replaying the same input twice
// must land on the same state.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let events: Vec<GameEvent> = text
        .lines()
        .filter_map(|line| GameEvent::decode(line).ok())
        .collect();

    let first = events
        .iter()
        .fold(GameState::default(), |state, event| reducer::apply(state, event));
    let second = events
        .iter()
        .fold(GameState::default(), |state, event| reducer::apply(state, event));
    assert_eq!(first, second);
});
