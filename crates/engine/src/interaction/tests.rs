use std::cell::Cell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::app::{
    ButtonState, EntityId, InputAction, InputCollector, InputSnapshot, Item, SceneWorld,
    Transform, Vec3,
};
use crate::conversation::tests::FakeSurface;
use crate::conversation::{NpcConfig, NpcController, PulseOutcome};
use crate::dialog::{DialogLibrary, DialogScript, Message};

#[derive(Debug, Default, Clone)]
struct Probe {
    hits: Rc<Cell<u32>>,
    interactions: Rc<Cell<u32>>,
    answers_interact: bool,
}

impl Electrifiable for Probe {
    fn electrify(&mut self, _source: EntityId) {
        self.hits.set(self.hits.get() + 1);
    }

    fn interact(&mut self, _source: EntityId) -> bool {
        self.interactions.set(self.interactions.get() + 1);
        self.answers_interact
    }

    fn is_powered(&self) -> bool {
        self.hits.get() > 0
    }
}

struct Rig {
    world: SceneWorld,
    surface: FakeSurface,
    rng: StdRng,
    config: InteractionConfig,
    events: InteractionEvents,
    player: PlayerState,
}

impl Rig {
    fn new() -> Self {
        let mut world = SceneWorld::default();
        let player_id = world.spawn(Transform::default(), "player");
        world.apply_pending();
        Self {
            world,
            surface: FakeSurface::default(),
            rng: StdRng::seed_from_u64(17),
            config: InteractionConfig::default(),
            events: InteractionEvents::default(),
            player: PlayerState::new(player_id),
        }
    }

    fn spawn_npc(&mut self, lines: &[&str]) -> EntityId {
        let script = DialogScript::new(
            lines.iter().map(|line| Message::new(*line, false)).collect(),
            true,
        );
        let npc = NpcController::new(DialogLibrary::new(vec![script], 0), NpcConfig::default());
        let id = self.world.spawn_npc(
            Transform::at(Vec3::new(0.0, 0.0, 1.0)),
            "keeper",
            2.0,
            npc,
        );
        self.world.apply_pending();
        id
    }

    fn spawn_item(&mut self, core: bool) -> EntityId {
        let id = self.world.spawn_item(
            Transform::at(Vec3::new(0.0, 0.5, 1.0)),
            "lantern",
            Item { core },
        );
        self.world.apply_pending();
        id
    }

    fn spawn_pushable(&mut self) -> EntityId {
        let id = self
            .world
            .spawn_pushable(Transform::at(Vec3::new(0.5, 0.5, 0.6)), "crate");
        self.world.apply_pending();
        id
    }

    fn spawn_probe(&mut self, position: Vec3, probe: Probe) -> EntityId {
        let id = self.world.spawn(Transform::at(position), "probe");
        self.world.attach_receiver(id, Box::new(probe));
        self.world.apply_pending();
        id
    }

    fn press(&mut self) -> Option<ArbitratedAction> {
        self.tick(&InputSnapshot::empty().with_interact_pressed(true))
    }

    fn tick(&mut self, input: &InputSnapshot) -> Option<ArbitratedAction> {
        let mut ctx = InteractionContext {
            world: &mut self.world,
            surface: &mut self.surface,
            rng: &mut self.rng,
            config: &self.config,
            events: &mut self.events,
        };
        run_interaction_tick(&mut self.player, &mut ctx, input)
    }

    fn electrify(&mut self) -> Option<ElectrifyRoute> {
        run_electrify_tick(
            &mut self.player,
            &mut self.world,
            &self.config,
            &InputSnapshot::empty().with_electrify_axis(1.0),
            &mut self.events,
        )
    }

    fn raise_arms(&mut self) {
        self.player.set_equipped_anchor(Vec3::new(0.0, 2.0, 0.3));
    }
}

#[test]
fn no_edge_means_no_action() {
    let mut rig = Rig::new();
    rig.spawn_item(false);

    assert_eq!(rig.tick(&InputSnapshot::empty()), None);
    assert!(rig.player.equipped().is_none());
}

#[test]
fn engaged_player_only_advances_dialog_and_keeps_grab() {
    let mut rig = Rig::new();
    let npc = rig.spawn_npc(&["one", "two"]);
    let crate_id = rig.spawn_pushable();
    rig.player.talking_to = Some(npc);
    rig.player.grabbed = Some(crate_id);

    let action = rig.press();

    assert!(matches!(
        action,
        Some(ArbitratedAction::AdvanceDialog { npc_id, .. }) if npc_id == npc
    ));
    assert_eq!(rig.player.grabbed(), Some(crate_id));
    assert_eq!(rig.events.count(InteractionEventKind::GrabReleased), 0);
}

#[test]
fn two_presses_in_one_tick_run_one_action() {
    let mut rig = Rig::new();
    let item = rig.spawn_item(false);
    let mut input = InputCollector::new();
    input.handle_button(InputAction::Interact, ButtonState::Pressed);
    input.handle_button(InputAction::Interact, ButtonState::Released);
    input.handle_button(InputAction::Interact, ButtonState::Pressed);

    let first = rig.tick(&input.snapshot_for_tick());
    let second = rig.tick(&input.snapshot_for_tick());

    assert_eq!(first, Some(ArbitratedAction::PickUp { item_id: item }));
    assert_eq!(second, None);
    assert_eq!(rig.events.count(InteractionEventKind::ItemEquipped), 1);
    assert_eq!(rig.events.count(InteractionEventKind::ItemDropped), 0);
}

#[test]
fn talking_through_a_script_engages_then_releases() {
    let mut rig = Rig::new();
    let npc = rig.spawn_npc(&["hi", "bye"]);

    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::Interact { target_id: npc })
    );
    assert_eq!(rig.player.talking_to(), Some(npc));
    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::AdvanceDialog {
            npc_id: npc,
            outcome: PulseOutcome::Continued
        })
    );
    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::AdvanceDialog {
            npc_id: npc,
            outcome: PulseOutcome::Ended
        })
    );
    assert_eq!(rig.player.talking_to(), None);

    let shown = rig
        .events
        .iter()
        .filter_map(|event| match event {
            InteractionEvent::DialogShown { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(shown, vec!["hi", "bye"]);
    assert_eq!(rig.events.count(InteractionEventKind::ConversationStarted), 1);
    assert_eq!(rig.events.count(InteractionEventKind::ConversationEnded), 1);
}

#[test]
fn ending_conversation_blocks_rest_of_tick_only() {
    let mut rig = Rig::new();
    let npc = rig.spawn_npc(&["only"]);
    let crate_id = rig.spawn_pushable();
    rig.press();
    assert_eq!(rig.player.talking_to(), Some(npc));

    let ended = rig.press();
    assert!(matches!(
        ended,
        Some(ArbitratedAction::AdvanceDialog {
            outcome: PulseOutcome::Ended,
            ..
        })
    ));
    assert!(rig.player.grabbed().is_none());

    // Next tick runs the full cascade again; the silent NPC still absorbs it.
    let next = rig.press();
    assert_eq!(
        next,
        Some(ArbitratedAction::Interact { target_id: npc })
    );
    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::Interact { target_id: npc })
    );
    assert!(rig.player.talking_to().is_none());
    assert!(rig.player.grabbed().is_none());
    assert!(rig.world.find_entity(crate_id).is_some());
}

#[test]
fn failed_dialog_box_does_not_engage() {
    let mut rig = Rig::new();
    let npc = rig.spawn_npc(&["hello"]);
    rig.surface.no_canvas = true;

    let action = rig.press();

    assert_eq!(action, Some(ArbitratedAction::Interact { target_id: npc }));
    assert!(!rig.player.is_talking());
    assert_eq!(rig.events.count(InteractionEventKind::ConversationStarted), 0);
    assert!(rig.world.npc(npc).is_some_and(|npc| !npc.is_talking()));
}

#[test]
fn despawned_npc_is_treated_as_not_engaged() {
    let mut rig = Rig::new();
    let npc = rig.spawn_npc(&["hello"]);
    let item = rig.spawn_item(false);
    rig.player.talking_to = Some(npc);
    rig.world.despawn(npc);
    rig.world.apply_pending();

    assert_eq!(rig.press(), Some(ArbitratedAction::PickUp { item_id: item }));
    assert!(rig.player.talking_to().is_none());
}

#[test]
fn grab_then_release_takes_two_presses() {
    let mut rig = Rig::new();
    let crate_id = rig.spawn_pushable();

    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::Grab {
            target_id: crate_id
        })
    );
    assert_eq!(rig.player.motion_lock(), Some(MotionLock::Grabbing));
    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::ReleaseGrab {
            target_id: crate_id
        })
    );
    assert_eq!(rig.player.motion_lock(), None);
}

#[test]
fn pick_up_then_drop_non_core_item() {
    let mut rig = Rig::new();
    let item = rig.spawn_item(false);

    assert_eq!(rig.press(), Some(ArbitratedAction::PickUp { item_id: item }));
    assert_eq!(rig.press(), Some(ArbitratedAction::Drop { item_id: item }));
    assert!(rig.player.equipped().is_none());
}

#[test]
fn core_item_is_never_dropped_and_blocks_grab() {
    let mut rig = Rig::new();
    let item = rig.spawn_item(true);
    rig.spawn_pushable();
    rig.press();
    assert_eq!(rig.player.equipped(), Some(item));

    assert_eq!(rig.press(), None);
    assert_eq!(rig.player.equipped(), Some(item));
    assert!(rig.player.grabbed().is_none());
}

#[test]
fn interaction_beats_drop() {
    let mut rig = Rig::new();
    let item = rig.spawn_item(false);
    rig.press();
    let probe = Probe {
        answers_interact: true,
        ..Probe::default()
    };
    let lever = rig.world.spawn(Transform::at(Vec3::new(0.0, 1.2, 0.4)), "lever");
    rig.world.attach_receiver(lever, Box::new(probe.clone()));
    rig.world.apply_pending();
    if let Some(entity) = rig.world.find_entity_mut(lever) {
        entity.interact_radius = Some(0.5);
    }

    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::Interact { target_id: lever })
    );
    assert_eq!(probe.interactions.get(), 1);
    assert_eq!(rig.player.equipped(), Some(item));
}

#[test]
fn unanswered_interaction_falls_through_to_grab() {
    let mut rig = Rig::new();
    let crate_id = rig.spawn_pushable();
    let probe = Probe::default();
    let lever = rig.world.spawn(Transform::at(Vec3::new(0.0, 1.2, 0.4)), "lever");
    rig.world.attach_receiver(lever, Box::new(probe.clone()));
    rig.world.apply_pending();
    if let Some(entity) = rig.world.find_entity_mut(lever) {
        entity.interact_radius = Some(0.5);
    }

    assert_eq!(
        rig.press(),
        Some(ArbitratedAction::Grab {
            target_id: crate_id
        })
    );
    assert_eq!(probe.interactions.get(), 1);
}

#[test]
fn open_hud_allows_pickup_but_blocks_everything_after() {
    let mut rig = Rig::new();
    rig.spawn_npc(&["hello"]);
    assert!(rig
        .player
        .set_hud_open(true, &rig.world, &mut rig.events));

    assert_eq!(rig.press(), None);
    assert!(!rig.player.is_talking());

    let item = rig.spawn_item(false);
    assert_eq!(rig.press(), Some(ArbitratedAction::PickUp { item_id: item }));
}

#[test]
fn hud_refuses_to_open_while_talking_grabbing_or_auto_moving() {
    let mut rig = Rig::new();
    let crate_id = rig.spawn_pushable();
    rig.player.grabbed = Some(crate_id);
    assert!(!rig.player.set_hud_open(true, &rig.world, &mut rig.events));
    rig.player.grabbed = None;

    rig.player.set_auto_move_towards(Some(Vec3::new(4.0, 0.0, 0.0)));
    assert!(!rig.player.set_hud_open(true, &rig.world, &mut rig.events));
    assert_eq!(rig.player.motion_lock(), Some(MotionLock::AutoMove));
    rig.player.set_auto_move_towards(None);

    assert!(rig.player.set_hud_open(true, &rig.world, &mut rig.events));
    assert!(!rig.player.set_hud_open(true, &rig.world, &mut rig.events));
    assert_eq!(rig.player.motion_lock(), Some(MotionLock::HudOpen));
}

#[test]
fn opening_hud_stows_core_item_and_release_closes() {
    let mut rig = Rig::new();
    let item = rig.spawn_item(true);
    rig.press();
    assert_eq!(rig.player.equipped(), Some(item));

    run_hud_tick(
        &mut rig.player,
        &rig.world,
        &InputSnapshot::empty().with_inventory_pressed(true),
        &mut rig.events,
    );
    assert!(rig.player.hud_open());
    assert!(rig.player.equipped().is_none());
    assert_eq!(rig.events.count(InteractionEventKind::ItemStowed), 1);

    run_hud_tick(
        &mut rig.player,
        &rig.world,
        &InputSnapshot::empty().with_inventory_released(true),
        &mut rig.events,
    );
    assert!(!rig.player.hud_open());
}

#[test]
fn electrify_prefers_held_item_then_grab_then_broadcast() {
    let mut rig = Rig::new();
    let lamp_probe = Probe::default();
    let lamp = rig.spawn_probe(Vec3::new(0.5, 1.2, 0.4), lamp_probe.clone());
    rig.raise_arms();

    assert_eq!(rig.electrify(), Some(ElectrifyRoute::Broadcast(vec![lamp])));
    assert_eq!(lamp_probe.hits.get(), 1);

    let crate_id = rig.spawn_pushable();
    rig.player.grabbed = Some(crate_id);
    assert_eq!(rig.electrify(), Some(ElectrifyRoute::Grabbed(crate_id)));
    assert_eq!(lamp_probe.hits.get(), 1);
    rig.player.grabbed = None;

    let item = rig.spawn_item(false);
    rig.press();
    assert_eq!(rig.player.equipped(), Some(item));
    assert_eq!(rig.electrify(), Some(ElectrifyRoute::HeldItem(item)));
    assert_eq!(lamp_probe.hits.get(), 1);
    assert_eq!(rig.events.count(InteractionEventKind::Electrified), 1);
}

#[test]
fn electrify_needs_raised_arms_and_no_conversation() {
    let mut rig = Rig::new();
    let probe = Probe::default();
    rig.spawn_probe(Vec3::new(0.5, 1.2, 0.4), probe.clone());

    assert_eq!(rig.electrify(), None);
    assert!(rig.player.is_electrifying());

    rig.raise_arms();
    let npc = rig.spawn_npc(&["hello"]);
    rig.player.talking_to = Some(npc);
    assert_eq!(rig.electrify(), None);
    assert!(!rig.player.is_electrifying());
    assert_eq!(probe.hits.get(), 0);

    let idle = run_electrify_tick(
        &mut rig.player,
        &mut rig.world,
        &rig.config,
        &InputSnapshot::empty(),
        &mut rig.events,
    );
    assert_eq!(idle, None);
}

#[test]
fn arms_edges_fire_once_per_transition() {
    let mut rig = Rig::new();
    let frame = |rig: &mut Rig| {
        update_player_frame(&mut rig.player, &mut rig.world, &rig.config, &mut rig.events);
    };

    frame(&mut rig);
    rig.raise_arms();
    frame(&mut rig);
    frame(&mut rig);
    rig.player.set_equipped_anchor(Vec3::ZERO);
    frame(&mut rig);
    frame(&mut rig);

    assert_eq!(rig.events.count(InteractionEventKind::ArmsRaised), 1);
    assert_eq!(rig.events.count(InteractionEventKind::ArmsLowered), 1);
}

#[test]
fn hover_tracks_reachable_item_until_equipped() {
    let mut rig = Rig::new();
    let item = rig.spawn_item(false);
    update_player_frame(&mut rig.player, &mut rig.world, &rig.config, &mut rig.events);
    assert_eq!(rig.player.hover(), Some(item));

    rig.press();
    update_player_frame(&mut rig.player, &mut rig.world, &rig.config, &mut rig.events);
    assert_eq!(rig.player.hover(), None);
    assert_eq!(rig.events.count(InteractionEventKind::HoverChanged), 2);
}

#[test]
fn facing_override_points_at_conversation_partner() {
    let mut rig = Rig::new();
    let npc = rig.spawn_npc(&["hello"]);
    assert_eq!(rig.player.facing_override(&rig.world), None);

    rig.press();
    assert_eq!(rig.player.talking_to(), Some(npc));
    assert_eq!(
        rig.player.facing_override(&rig.world),
        Some(Vec3::new(0.0, 0.0, 1.0))
    );
    assert_eq!(rig.player.motion_lock(), Some(MotionLock::Talking));
}

#[test]
fn open_hud_freezes_facing_even_with_auto_move_target() {
    let mut rig = Rig::new();
    assert!(rig.player.set_hud_open(true, &rig.world, &mut rig.events));
    rig.player.set_auto_move_towards(Some(Vec3::new(4.0, 0.0, 0.0)));

    assert_eq!(rig.player.facing_override(&rig.world), None);
    assert_eq!(rig.player.motion_lock(), Some(MotionLock::HudOpen));

    rig.player.release_inventory(&rig.world, &mut rig.events);
    assert_eq!(
        rig.player.facing_override(&rig.world),
        Some(Vec3::new(1.0, 0.0, 0.0))
    );
}
