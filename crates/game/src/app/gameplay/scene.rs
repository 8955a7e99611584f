use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use engine::{
    run_electrify_tick, run_hud_tick, run_interaction_tick, update_player_frame, ArbitratedAction,
    DialogDatabase, DialogLibrary, EntityId, InputAction, InputSnapshot, InteractionConfig,
    InteractionContext, InteractionEvent, InteractionEvents, Item, LookTarget, NpcConfig,
    NpcController, NpcDialogSave, PersistenceError, PlayerPose, PlayerState, SaveGame, Scene,
    SceneCommand, SceneWorld, Transform, Vec3,
};
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::console::ConsoleSurface;
use super::lamp::Lamp;

const SAVE_FILE: &str = "dialog.save.json";
const REVEAL_CHARS_PER_TICK: usize = 2;
const NPC_INTERACT_RADIUS: f32 = 1.5;
const LAMP_INTERACT_RADIUS: f32 = 0.8;
const PLAYER_SPAWN: Vec3 = Vec3::new(0.0, 0.0, 0.0);
const PLAYER_HEIGHT: f32 = 1.8;
const LAMP_POSITION: Vec3 = Vec3::new(-4.0, 1.2, 0.4);
const WRENCH_POSITION: Vec3 = Vec3::new(4.0, 0.5, 0.6);
const BATTERY_POSITION: Vec3 = Vec3::new(4.0, 0.5, -3.0);
const CRATE_POSITION: Vec3 = Vec3::new(-8.0, 0.5, 0.6);
const ARMS_UP_ANCHOR: Vec3 = Vec3::new(0.0, 1.8, 0.3);
const ARMS_DOWN_ANCHOR: Vec3 = Vec3::new(0.0, 0.9, 0.3);

struct NpcSpawn {
    key: &'static str,
    def_name: &'static str,
    position: Vec3,
}

const NPC_SPAWNS: [NpcSpawn; 2] = [
    NpcSpawn {
        key: "npc.smith",
        def_name: "Smith",
        position: Vec3::new(0.0, 0.0, 1.0),
    },
    NpcSpawn {
        key: "npc.guard",
        def_name: "Guard",
        position: Vec3::new(8.0, 0.0, 1.0),
    },
];

/// Out-of-band requests a timeline frame can make of the scene. Applied at
/// the start of the next fixed tick.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SceneRequest {
    Save,
    Load,
    Override { npc: String, dialog_def: String },
    MoveTo { x: f32, y: f32, z: f32 },
    RaiseArms { up: bool },
    SetCanvas { ready: bool },
}

/// What happened during a run, for the end-of-run report and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DemoLog {
    pub(crate) lines: Vec<String>,
    pub(crate) actions: Vec<ArbitratedAction>,
    pub(crate) conversations_started: u32,
    pub(crate) conversations_ended: u32,
    pub(crate) electrified: u32,
    pub(crate) lamp_lit: bool,
    pub(crate) blocked_moves: u32,
    pub(crate) saves_written: u32,
    pub(crate) saves_loaded: u32,
    pub(crate) look_targets: BTreeMap<String, LookTarget>,
}

pub(crate) struct DemoScene {
    database: DialogDatabase,
    saves_dir: PathBuf,
    rng: StdRng,
    surface: ConsoleSurface,
    config: InteractionConfig,
    events: InteractionEvents,
    player: Option<PlayerState>,
    npc_ids: BTreeMap<String, EntityId>,
    lamp_id: Option<EntityId>,
    pending: VecDeque<SceneRequest>,
    log: DemoLog,
}

impl DemoScene {
    pub(crate) fn new(database: DialogDatabase, saves_dir: PathBuf, rng: StdRng) -> Self {
        Self {
            database,
            saves_dir,
            rng,
            surface: ConsoleSurface::new(REVEAL_CHARS_PER_TICK),
            config: InteractionConfig::default(),
            events: InteractionEvents::default(),
            player: None,
            npc_ids: BTreeMap::new(),
            lamp_id: None,
            pending: VecDeque::new(),
            log: DemoLog::default(),
        }
    }

    pub(crate) fn queue_request(&mut self, request: SceneRequest) {
        self.pending.push_back(request);
    }

    pub(crate) fn log(&self) -> &DemoLog {
        &self.log
    }

    #[cfg(test)]
    pub(crate) fn player(&self) -> Option<&PlayerState> {
        self.player.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn npc_id(&self, key: &str) -> Option<EntityId> {
        self.npc_ids.get(key).copied()
    }

    #[cfg(test)]
    pub(crate) fn lamp_id(&self) -> Option<EntityId> {
        self.lamp_id
    }

    #[cfg(test)]
    pub(crate) fn surface(&self) -> &ConsoleSurface {
        &self.surface
    }

    pub(crate) fn save_path(&self) -> PathBuf {
        self.saves_dir.join(SAVE_FILE)
    }

    fn apply_request(&mut self, request: SceneRequest, world: &mut SceneWorld) {
        match request {
            SceneRequest::Save => match self.save_dialog_state(world) {
                Ok(path) => {
                    self.log.saves_written += 1;
                    info!(path = %path.display(), "dialog_state_saved");
                }
                Err(error) => warn!(error = %error, "save_failed"),
            },
            SceneRequest::Load => match self.load_dialog_state(world) {
                Ok(restored) => {
                    self.log.saves_loaded += 1;
                    info!(npcs = restored, "dialog_state_loaded");
                }
                Err(error) => warn!(error = %error, "load_failed"),
            },
            SceneRequest::Override { npc, dialog_def } => {
                let target = self.npc_ids.get(&npc).copied();
                let def = self.database.dialog_def_by_name(&dialog_def);
                match (target, def) {
                    (Some(npc_id), Some(def)) => {
                        if let Some(controller) = world.npc_mut(npc_id) {
                            controller.override_dialog(npc_id, &def.scripts, def.version_id);
                        }
                    }
                    _ => warn!(npc = %npc, dialog_def = %dialog_def, "override_target_missing"),
                }
            }
            SceneRequest::MoveTo { x, y, z } => {
                let Some(player) = self.player.as_ref() else {
                    return;
                };
                if let Some(lock) = player.motion_lock() {
                    self.log.blocked_moves += 1;
                    debug!(lock = ?lock, "move_blocked");
                    return;
                }
                world.set_position(player.id(), Vec3::new(x, y, z));
            }
            SceneRequest::RaiseArms { up } => {
                if let Some(player) = self.player.as_mut() {
                    player.set_equipped_anchor(if up { ARMS_UP_ANCHOR } else { ARMS_DOWN_ANCHOR });
                }
            }
            SceneRequest::SetCanvas { ready } => self.surface.set_canvas_ready(ready),
        }
    }

    fn save_dialog_state(&self, world: &SceneWorld) -> Result<PathBuf, PersistenceError> {
        let mut save = SaveGame::default();
        for (key, npc_id) in &self.npc_ids {
            if let Some(npc) = world.npc(*npc_id) {
                save.npcs
                    .insert(key.clone(), NpcDialogSave::capture(npc.library()));
            }
        }
        let path = self.save_path();
        save.save_to_path(&path)?;
        Ok(path)
    }

    /// Restores every NPC in the save, or none if any entry is invalid.
    fn load_dialog_state(&mut self, world: &mut SceneWorld) -> Result<usize, PersistenceError> {
        let save = SaveGame::load_from_path(&self.save_path())?;
        let mut restored = Vec::with_capacity(save.npcs.len());
        for (key, npc_save) in &save.npcs {
            let Some(npc_id) = self.npc_ids.get(key).copied() else {
                warn!(npc = %key, "save_npc_unknown");
                continue;
            };
            restored.push((npc_id, npc_save.restore(key)?));
        }

        let count = restored.len();
        for (npc_id, library) in restored {
            if let Some(npc) = world.npc_mut(npc_id) {
                npc.replace_library(library);
            }
        }
        Ok(count)
    }

    fn record_events(&mut self) {
        for event in self.events.drain() {
            match event {
                InteractionEvent::DialogShown { npc_id, text } => {
                    info!(npc = %npc_id, text = %text, "dialog_line");
                    self.log.lines.push(text);
                }
                InteractionEvent::ConversationStarted { .. } => {
                    self.log.conversations_started += 1;
                }
                InteractionEvent::ConversationEnded { .. } => {
                    self.log.conversations_ended += 1;
                }
                InteractionEvent::Electrified { .. } => self.log.electrified += 1,
                other => debug!(event = ?other, "interaction_event"),
            }
        }
    }

    fn update_look_targets(&mut self, world: &SceneWorld) {
        let pose = self
            .player
            .as_ref()
            .and_then(|player| world.position_of(player.id()))
            .map(|position| PlayerPose {
                position,
                top: position + Vec3::new(0.0, PLAYER_HEIGHT, 0.0),
            });
        for (key, npc_id) in &self.npc_ids {
            let (Some(npc), Some(position)) = (world.npc(*npc_id), world.position_of(*npc_id))
            else {
                continue;
            };
            self.log
                .look_targets
                .insert(key.clone(), npc.look_target(position, pose));
        }
    }
}

impl Scene for DemoScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let player_id = world.spawn(Transform::at(PLAYER_SPAWN), "player");

        for spawn in &NPC_SPAWNS {
            let library = match self.database.dialog_def_by_name(spawn.def_name) {
                Some(def) => def.library(),
                None => {
                    warn!(npc = spawn.key, def_name = spawn.def_name, "dialog_def_missing");
                    DialogLibrary::default()
                }
            };
            let npc_id = world.spawn_npc(
                Transform::at(spawn.position),
                spawn.def_name,
                NPC_INTERACT_RADIUS,
                NpcController::new(library, NpcConfig::default()),
            );
            self.npc_ids.insert(spawn.key.to_string(), npc_id);
        }

        let lamp_id = world.spawn(Transform::at(LAMP_POSITION), "lamp");
        world.attach_receiver(lamp_id, Box::new(Lamp::default()));
        world.spawn_item(Transform::at(WRENCH_POSITION), "wrench", Item { core: false });
        world.spawn_item(Transform::at(BATTERY_POSITION), "battery", Item { core: true });
        world.spawn_pushable(Transform::at(CRATE_POSITION), "crate");
        world.apply_pending();

        if let Some(lamp) = world.find_entity_mut(lamp_id) {
            lamp.interact_radius = Some(LAMP_INTERACT_RADIUS);
        }
        self.lamp_id = Some(lamp_id);
        self.player = Some(PlayerState::new(player_id));

        info!(
            entity_count = world.entity_count(),
            npcs = self.npc_ids.len(),
            "scene_loaded"
        );
    }

    fn frame_update(&mut self, _frame_dt_seconds: f32, world: &mut SceneWorld) {
        if let Some(player) = self.player.as_mut() {
            update_player_frame(player, world, &self.config, &mut self.events);
        }
        self.update_look_targets(world);
        self.record_events();
    }

    fn fixed_update(
        &mut self,
        _fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        while let Some(request) = self.pending.pop_front() {
            self.apply_request(request, world);
        }
        self.surface.tick_reveal();

        let Some(player) = self.player.as_mut() else {
            return SceneCommand::None;
        };
        run_hud_tick(player, world, input, &mut self.events);

        let mut ctx = InteractionContext {
            world: &mut *world,
            surface: &mut self.surface,
            rng: &mut self.rng,
            config: &self.config,
            events: &mut self.events,
        };
        if let Some(action) = run_interaction_tick(player, &mut ctx, input) {
            self.log.actions.push(action);
        }
        run_electrify_tick(player, world, &self.config, input, &mut self.events);

        if input.is_down(InputAction::Jump) {
            if let Some(lock) = player.motion_lock() {
                debug!(lock = ?lock, "jump_suppressed");
            }
        }
        self.record_events();
        self.log.lamp_lit = self
            .lamp_id
            .and_then(|id| world.receiver(id))
            .is_some_and(|lamp| lamp.is_powered());

        if input.quit_requested() {
            return SceneCommand::Quit;
        }
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        info!(
            entity_count = world.entity_count(),
            lines = self.log.lines.len(),
            "scene_unload"
        );
        world.clear();
        self.surface.clear();
        self.events.clear();
        self.player = None;
        self.npc_ids.clear();
        self.lamp_id = None;
        self.pending.clear();
    }
}
