use std::fmt;

use crate::app::EntityId;

/// Something that reacts to the player's electricity.
///
/// Receivers are registered on the [`SceneWorld`](crate::SceneWorld) by
/// entity id and found by range, never by probing arbitrary entities.
pub trait Electrifiable: fmt::Debug {
    fn electrify(&mut self, source: EntityId);

    /// Context interaction; returns whether anything happened.
    fn interact(&mut self, _source: EntityId) -> bool {
        false
    }

    fn is_powered(&self) -> bool {
        false
    }
}

/// Where one tick's electricity went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectrifyRoute {
    HeldItem(EntityId),
    Grabbed(EntityId),
    /// Every receiver hit around the electrify point, possibly none.
    Broadcast(Vec<EntityId>),
}
