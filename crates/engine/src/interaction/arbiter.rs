use rand::Rng;
use tracing::{debug, info};

use crate::app::{EntityId, InputSnapshot, SceneWorld, Vec3};
use crate::conversation::{PresentationSurface, PulseOutcome};

use super::electric::ElectrifyRoute;
use super::events::{InteractionEvent, InteractionEvents};
use super::player::PlayerState;

#[derive(Debug, Clone)]
pub struct InteractionConfig {
    /// Pickup sphere centre relative to the player origin.
    pub pickup_offset: Vec3,
    pub pickup_radius: f32,
    /// Measure pickup distance on the ground plane.
    pub ignore_y_axis: bool,
    /// Electrify point relative to the player origin.
    pub electric_offset: Vec3,
    pub electrify_radius: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            pickup_offset: Vec3::new(0.0, 0.5, 0.6),
            pickup_radius: 1.0,
            ignore_y_axis: false,
            electric_offset: Vec3::new(0.0, 1.2, 0.4),
            electrify_radius: 1.5,
        }
    }
}

/// The single action an interact press resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitratedAction {
    AdvanceDialog {
        npc_id: EntityId,
        outcome: PulseOutcome,
    },
    ReleaseGrab {
        target_id: EntityId,
    },
    PickUp {
        item_id: EntityId,
    },
    Interact {
        target_id: EntityId,
    },
    Drop {
        item_id: EntityId,
    },
    Grab {
        target_id: EntityId,
    },
}

/// Collaborators borrowed for one interaction tick.
pub struct InteractionContext<'a, R: Rng + ?Sized> {
    pub world: &'a mut SceneWorld,
    pub surface: &'a mut dyn PresentationSurface,
    pub rng: &'a mut R,
    pub config: &'a InteractionConfig,
    pub events: &'a mut InteractionEvents,
}

/// Resolves this tick's interact edge to at most one action.
///
/// Priority, first match wins: advance dialog, release grab, pick up,
/// world interaction, drop, grab. A match ends the tick even if it did
/// nothing useful.
pub fn run_interaction_tick<R: Rng + ?Sized>(
    player: &mut PlayerState,
    ctx: &mut InteractionContext<'_, R>,
    input: &InputSnapshot,
) -> Option<ArbitratedAction> {
    if !input.interact_pressed() {
        return None;
    }
    player.forget_stale(ctx.world);
    let action = arbitrate(player, ctx);
    if let Some(action) = action {
        debug!(player = %player.id(), action = ?action, "interaction_resolved");
    }
    action
}

fn arbitrate<R: Rng + ?Sized>(
    player: &mut PlayerState,
    ctx: &mut InteractionContext<'_, R>,
) -> Option<ArbitratedAction> {
    if let Some(npc_id) = player.talking_to {
        let outcome = pulse_npc(player, npc_id, ctx)?;
        return Some(ArbitratedAction::AdvanceDialog { npc_id, outcome });
    }

    if let Some(target_id) = player.grabbed.take() {
        ctx.events.emit(InteractionEvent::GrabReleased {
            player_id: player.id(),
            target_id,
        });
        return Some(ArbitratedAction::ReleaseGrab { target_id });
    }

    if player.equipped.is_none() {
        if let Some(item_id) = player.item_in_range(ctx.world, ctx.config) {
            player.equip(item_id, ctx.events);
            info!(player = %player.id(), item = %item_id, "item_picked_up");
            return Some(ArbitratedAction::PickUp { item_id });
        }
    }

    if player.hud_open() {
        return None;
    }

    if let Some(target_id) = interact_at_electric_point(player, ctx) {
        return Some(ArbitratedAction::Interact { target_id });
    }

    if let Some(item_id) = player.equipped {
        let core = ctx.world.item(item_id).is_some_and(|item| item.core);
        if core {
            return None;
        }
        player.unequip(ctx.world, ctx.events);
        info!(player = %player.id(), item = %item_id, "item_dropped");
        return Some(ArbitratedAction::Drop { item_id });
    }

    let point = player.pickup_point(ctx.world, ctx.config)?;
    let target_id = ctx.world.closest_pushable_within(
        point,
        ctx.config.pickup_radius,
        ctx.config.ignore_y_axis,
    )?;
    player.grabbed = Some(target_id);
    ctx.events.emit(InteractionEvent::Grabbed {
        player_id: player.id(),
        target_id,
    });
    Some(ArbitratedAction::Grab { target_id })
}

/// Context interaction with whatever covers the electrify point.
fn interact_at_electric_point<R: Rng + ?Sized>(
    player: &mut PlayerState,
    ctx: &mut InteractionContext<'_, R>,
) -> Option<EntityId> {
    let point = player.electric_point(ctx.world, ctx.config)?;
    let target_id = ctx.world.closest_interactable_at(point)?;

    let handled = if ctx.world.npc(target_id).is_some() {
        pulse_npc(player, target_id, ctx).is_some()
    } else {
        ctx.world.interact_receiver(target_id, player.id())
    };
    if !handled {
        return None;
    }
    ctx.events.emit(InteractionEvent::Interacted {
        player_id: player.id(),
        target_id,
    });
    Some(target_id)
}

/// Forwards a pulse to an NPC and updates the player's engagement.
fn pulse_npc<R: Rng + ?Sized>(
    player: &mut PlayerState,
    npc_id: EntityId,
    ctx: &mut InteractionContext<'_, R>,
) -> Option<PulseOutcome> {
    let npc_position = ctx.world.position_of(npc_id)?;
    let npc = ctx.world.npc_mut(npc_id)?;
    let outcome = npc.on_interaction_pulse(npc_id, npc_position, &mut *ctx.surface, &mut *ctx.rng);
    let shown = matches!(outcome, PulseOutcome::Started | PulseOutcome::Continued)
        .then(|| npc.library().active_message().map(|line| line.text.clone()))
        .flatten();

    let was_engaged = player.talking_to == Some(npc_id);
    if outcome.keeps_engaged() {
        player.talking_to = Some(npc_id);
        if !was_engaged {
            ctx.events.emit(InteractionEvent::ConversationStarted {
                player_id: player.id(),
                npc_id,
            });
        }
    } else {
        player.talking_to = None;
        if was_engaged {
            ctx.events.emit(InteractionEvent::ConversationEnded {
                player_id: player.id(),
                npc_id,
            });
        }
    }
    if let Some(text) = shown {
        ctx.events.emit(InteractionEvent::DialogShown { npc_id, text });
    }
    Some(outcome)
}

/// Routes electricity while the axis is held, the arms are up and the
/// player is not talking. Held item first, then the grabbed body, then
/// every receiver around the electrify point.
pub fn run_electrify_tick(
    player: &mut PlayerState,
    world: &mut SceneWorld,
    config: &InteractionConfig,
    input: &InputSnapshot,
    events: &mut InteractionEvents,
) -> Option<ElectrifyRoute> {
    player.forget_stale(world);
    let electrifying = input.electrify_axis() != 0.0 && !player.is_talking();
    player.set_electrifying(electrifying);
    if !electrifying || !player.arms_up(world, config) {
        return None;
    }

    let source_id = player.id();
    let route = if let Some(item_id) = player.equipped() {
        world.electrify(item_id, source_id);
        ElectrifyRoute::HeldItem(item_id)
    } else if let Some(target_id) = player.grabbed() {
        world.electrify(target_id, source_id);
        ElectrifyRoute::Grabbed(target_id)
    } else {
        let point = player.electric_point(world, config)?;
        ElectrifyRoute::Broadcast(world.electrify_all_within(
            point,
            config.electrify_radius,
            source_id,
        ))
    };

    let targets: &[EntityId] = match &route {
        ElectrifyRoute::HeldItem(id) | ElectrifyRoute::Grabbed(id) => std::slice::from_ref(id),
        ElectrifyRoute::Broadcast(ids) => ids,
    };
    for &target_id in targets {
        if world.has_receiver(target_id) {
            events.emit(InteractionEvent::Electrified {
                source_id,
                target_id,
            });
        }
    }
    Some(route)
}

/// Variable-rate bookkeeping: hover item, arms edge and the held item
/// following its anchor.
pub fn update_player_frame(
    player: &mut PlayerState,
    world: &mut SceneWorld,
    config: &InteractionConfig,
    events: &mut InteractionEvents,
) {
    player.forget_stale(world);
    let hover = player.item_in_range(world, config);
    player.set_hover(hover, events);

    let arms_up = player.arms_up(world, config);
    match player.latch_arms(arms_up) {
        Some(true) => events.emit(InteractionEvent::ArmsRaised {
            player_id: player.id(),
        }),
        Some(false) => events.emit(InteractionEvent::ArmsLowered {
            player_id: player.id(),
        }),
        None => {}
    }

    if let (Some(item_id), Some(position)) = (player.equipped(), world.position_of(player.id())) {
        world.set_position(item_id, position + player.equipped_anchor());
    }
}

/// Inventory button edges: press opens the HUD, release closes it.
pub fn run_hud_tick(
    player: &mut PlayerState,
    world: &SceneWorld,
    input: &InputSnapshot,
    events: &mut InteractionEvents,
) {
    if input.inventory_pressed() {
        player.set_hud_open(true, world, events);
    }
    if input.inventory_released() {
        player.release_inventory(world, events);
    }
}
