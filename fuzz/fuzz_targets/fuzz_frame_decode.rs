#![no_main]

use libfuzzer_sys::fuzz_target;
use werewolf_client::protocol::ServerEvent;
use werewolf_client::{reducer, GameEvent, GameState};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(event) = GameEvent::decode(text) else {
        return;
    };

    // Interpretation may fail, the reducer must not.
    let _ = ServerEvent::interpret(&event);
    let _ = reducer::apply(GameState::default(), &event);
});
