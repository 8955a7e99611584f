use tracing::debug;

use crate::app::{EntityId, SceneWorld, Vec3};

use super::arbiter::InteractionConfig;
use super::events::{InteractionEvent, InteractionEvents};

/// Why the movement layer must not take free input this frame, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionLock {
    HudOpen,
    Grabbing,
    Talking,
    AutoMove,
}

/// Everything the arbiter knows about one player.
///
/// Relations to other entities are ids; an id that no longer resolves in the
/// world counts as absent and is dropped on the next check.
#[derive(Debug, Clone)]
pub struct PlayerState {
    id: EntityId,
    pub(super) talking_to: Option<EntityId>,
    pub(super) equipped: Option<EntityId>,
    pub(super) grabbed: Option<EntityId>,
    hud_open: bool,
    auto_move_towards: Option<Vec3>,
    /// Anchor of the held item, relative to the player origin.
    equipped_anchor: Vec3,
    arms_up_last: bool,
    hover: Option<EntityId>,
    electrifying: bool,
}

impl PlayerState {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            talking_to: None,
            equipped: None,
            grabbed: None,
            hud_open: false,
            auto_move_towards: None,
            equipped_anchor: Vec3::ZERO,
            arms_up_last: false,
            hover: None,
            electrifying: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn talking_to(&self) -> Option<EntityId> {
        self.talking_to
    }

    pub fn equipped(&self) -> Option<EntityId> {
        self.equipped
    }

    pub fn grabbed(&self) -> Option<EntityId> {
        self.grabbed
    }

    pub fn hud_open(&self) -> bool {
        self.hud_open
    }

    pub fn hover(&self) -> Option<EntityId> {
        self.hover
    }

    /// Electrify input held and not talking; arms may still be down.
    pub fn is_electrifying(&self) -> bool {
        self.electrifying
    }

    pub(super) fn set_electrifying(&mut self, electrifying: bool) {
        self.electrifying = electrifying;
    }

    pub fn auto_move_towards(&self) -> Option<Vec3> {
        self.auto_move_towards
    }

    pub fn set_auto_move_towards(&mut self, target: Option<Vec3>) {
        self.auto_move_towards = target;
    }

    pub fn set_equipped_anchor(&mut self, anchor: Vec3) {
        self.equipped_anchor = anchor;
    }

    pub fn is_talking(&self) -> bool {
        self.talking_to.is_some()
    }

    pub fn motion_lock(&self) -> Option<MotionLock> {
        if self.hud_open {
            Some(MotionLock::HudOpen)
        } else if self.grabbed.is_some() {
            Some(MotionLock::Grabbing)
        } else if self.talking_to.is_some() {
            Some(MotionLock::Talking)
        } else if self.auto_move_towards.is_some() {
            Some(MotionLock::AutoMove)
        } else {
            None
        }
    }

    /// Ground-plane direction the body should face instead of free input.
    /// Nothing while the HUD is open; the body holds still.
    pub fn facing_override(&self, world: &SceneWorld) -> Option<Vec3> {
        if self.hud_open {
            return None;
        }
        let position = world.position_of(self.id)?;
        if let Some(npc_id) = self.talking_to {
            let npc_position = world.position_of(npc_id)?;
            return world
                .npc(npc_id)
                .map(|npc| npc.axis_from(npc_position, position));
        }
        self.auto_move_towards
            .map(|target| (target - position).with_y(0.0).normalized_or_zero())
    }

    pub fn pickup_point(&self, world: &SceneWorld, config: &InteractionConfig) -> Option<Vec3> {
        world
            .position_of(self.id)
            .map(|position| position + config.pickup_offset)
    }

    pub fn electric_point(&self, world: &SceneWorld, config: &InteractionConfig) -> Option<Vec3> {
        world
            .position_of(self.id)
            .map(|position| position + config.electric_offset)
    }

    /// Held-item anchor above the electrify point.
    pub fn arms_up(&self, world: &SceneWorld, config: &InteractionConfig) -> bool {
        world.position_of(self.id).is_some_and(|position| {
            let anchor = position + self.equipped_anchor;
            let electric_point = position + config.electric_offset;
            anchor.y - electric_point.y > 0.0
        })
    }

    /// Item that a pickup would take right now.
    pub fn item_in_range(&self, world: &SceneWorld, config: &InteractionConfig) -> Option<EntityId> {
        if self.equipped.is_some() || self.grabbed.is_some() {
            return None;
        }
        let point = self.pickup_point(world, config)?;
        world.closest_item_within(point, config.pickup_radius, config.ignore_y_axis, None)
    }

    /// Opens or closes the radial inventory.
    ///
    /// Opening is refused (and an open HUD closes) while grabbing, talking or
    /// auto-moving. Opening stows a held core item. Returns whether the HUD
    /// changed.
    pub fn set_hud_open(
        &mut self,
        open: bool,
        world: &SceneWorld,
        events: &mut InteractionEvents,
    ) -> bool {
        self.forget_stale(world);
        let blocked =
            self.grabbed.is_some() || self.talking_to.is_some() || self.auto_move_towards.is_some();
        let open = open && !blocked;
        if self.hud_open == open {
            return false;
        }

        if open {
            self.stow_core_item(world, events);
        }
        self.hud_open = open;
        events.emit(InteractionEvent::HudToggled {
            player_id: self.id,
            open,
        });
        debug!(player = %self.id, open, "hud_toggled");
        true
    }

    /// Inventory button released: close the HUD and stow a held core item.
    pub fn release_inventory(&mut self, world: &SceneWorld, events: &mut InteractionEvents) {
        if !self.hud_open {
            return;
        }
        self.set_hud_open(false, world, events);
        self.stow_core_item(world, events);
    }

    pub(super) fn equip(&mut self, item_id: EntityId, events: &mut InteractionEvents) {
        self.equipped = Some(item_id);
        events.emit(InteractionEvent::ItemEquipped {
            player_id: self.id,
            item_id,
        });
    }

    /// Lets go of the held item; core items are stowed, others dropped.
    pub(super) fn unequip(&mut self, world: &SceneWorld, events: &mut InteractionEvents) {
        let Some(item_id) = self.equipped.take() else {
            return;
        };
        let core = world.item(item_id).is_some_and(|item| item.core);
        events.emit(if core {
            InteractionEvent::ItemStowed {
                player_id: self.id,
                item_id,
            }
        } else {
            InteractionEvent::ItemDropped {
                player_id: self.id,
                item_id,
            }
        });
    }

    fn stow_core_item(&mut self, world: &SceneWorld, events: &mut InteractionEvents) {
        let core_equipped = self
            .equipped
            .and_then(|item_id| world.item(item_id))
            .is_some_and(|item| item.core);
        if core_equipped {
            self.unequip(world, events);
        }
    }

    /// Drops relations whose target no longer exists.
    pub(super) fn forget_stale(&mut self, world: &SceneWorld) {
        if let Some(npc_id) = self.talking_to {
            if world.npc(npc_id).is_none() || world.find_entity(npc_id).is_none() {
                debug!(player = %self.id, npc = %npc_id, "stale_conversation_dropped");
                self.talking_to = None;
            }
        }
        if self
            .equipped
            .is_some_and(|item_id| world.find_entity(item_id).is_none())
        {
            self.equipped = None;
        }
        if self
            .grabbed
            .is_some_and(|target_id| world.find_entity(target_id).is_none())
        {
            self.grabbed = None;
        }
    }

    pub(super) fn set_hover(&mut self, hover: Option<EntityId>, events: &mut InteractionEvents) {
        if self.hover == hover {
            return;
        }
        self.hover = hover;
        events.emit(InteractionEvent::HoverChanged {
            player_id: self.id,
            item_id: hover,
        });
    }

    /// Records the arms state; `Some(raised)` on a transition.
    pub(super) fn latch_arms(&mut self, arms_up: bool) -> Option<bool> {
        if arms_up == self.arms_up_last {
            return None;
        }
        self.arms_up_last = arms_up;
        Some(arms_up)
    }

    pub(super) fn equipped_anchor(&self) -> Vec3 {
        self.equipped_anchor
    }
}
