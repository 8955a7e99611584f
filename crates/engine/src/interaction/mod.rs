mod arbiter;
mod electric;
mod events;
mod player;

pub use arbiter::{
    run_electrify_tick, run_hud_tick, run_interaction_tick, update_player_frame,
    ArbitratedAction, InteractionConfig, InteractionContext,
};
pub use electric::{Electrifiable, ElectrifyRoute};
pub use events::{InteractionEvent, InteractionEventKind, InteractionEvents};
pub use player::{MotionLock, PlayerState};

#[cfg(test)]
mod tests;
