use rand::Rng;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::app::{EntityId, Vec3};
use crate::dialog::{DialogLibrary, DialogScript};

/// Handle to a dialog box owned by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DialogBoxId(pub u64);

#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("no dialog canvas in scene")]
    NoCanvas,
}

/// Text boxes anchored in the world. The core only references boxes by id;
/// the surface may destroy them at any time.
pub trait PresentationSurface {
    fn create_dialog_box(&mut self, anchor: Vec3, text: &str)
        -> Result<DialogBoxId, PresentationError>;
    /// Whether the box finished revealing its text, `None` if it no longer exists.
    fn is_done(&self, id: DialogBoxId) -> Option<bool>;
    fn skip_reveal(&mut self, id: DialogBoxId);
    /// Returns `false` if the box no longer exists.
    fn set_message(&mut self, id: DialogBoxId, text: &str) -> bool;
    fn destroy(&mut self, id: DialogBoxId);
}

#[derive(Debug, Clone)]
pub struct NpcConfig {
    /// Head anchor relative to the NPC origin.
    pub head_offset: Vec3,
    pub head_range: f32,
    pub ignore_y: bool,
    pub look_at_while_idle: bool,
    pub idle_look_direction: Vec3,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            head_offset: Vec3::new(0.0, 1.6, 0.0),
            head_range: 12.0,
            ignore_y: true,
            look_at_while_idle: true,
            idle_look_direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

/// What the NPC should be doing with its head this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookTarget {
    Point(Vec3),
    Idle(Vec3),
}

/// The player as seen by an NPC's head logic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerPose {
    pub position: Vec3,
    pub top: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// The box was still revealing; it was told to finish.
    Skipped,
    /// A new line went into the existing box.
    Continued,
    /// A box was created for the line.
    Started,
    /// No line; the box is gone and the player is released.
    Ended,
    /// A line was due but no box could be made; nothing changed.
    Failed,
}

impl PulseOutcome {
    /// Whether the player stays engaged with the NPC afterwards.
    pub fn keeps_engaged(self) -> bool {
        matches!(
            self,
            PulseOutcome::Skipped | PulseOutcome::Continued | PulseOutcome::Started
        )
    }
}

#[derive(Debug, Clone)]
pub struct NpcController {
    library: DialogLibrary,
    config: NpcConfig,
    dialog_box: Option<DialogBoxId>,
}

impl NpcController {
    pub fn new(library: DialogLibrary, config: NpcConfig) -> Self {
        Self {
            library,
            config,
            dialog_box: None,
        }
    }

    pub fn library(&self) -> &DialogLibrary {
        &self.library
    }

    pub fn config(&self) -> &NpcConfig {
        &self.config
    }

    pub fn dialog_box(&self) -> Option<DialogBoxId> {
        self.dialog_box
    }

    pub fn is_talking(&self) -> bool {
        self.library.is_talking()
    }

    pub fn replace_library(&mut self, library: DialogLibrary) {
        self.library = library;
    }

    pub fn head_position(&self, npc_position: Vec3) -> Vec3 {
        npc_position + self.config.head_offset
    }

    /// Handles one interact press aimed at this NPC. A `Failed` pulse leaves
    /// the NPC not talking, matching the player it just released.
    pub fn on_interaction_pulse<R: Rng + ?Sized>(
        &mut self,
        npc_id: EntityId,
        npc_position: Vec3,
        surface: &mut dyn PresentationSurface,
        rng: &mut R,
    ) -> PulseOutcome {
        let outcome = self.pulse(npc_id, npc_position, surface, rng);
        if outcome == PulseOutcome::Failed && self.library.is_talking() {
            self.library.end_conversation();
            info!(npc = %npc_id, "conversation_ended");
        }
        outcome
    }

    fn pulse<R: Rng + ?Sized>(
        &mut self,
        npc_id: EntityId,
        npc_position: Vec3,
        surface: &mut dyn PresentationSurface,
        rng: &mut R,
    ) -> PulseOutcome {
        if let Some(id) = self.dialog_box {
            match surface.is_done(id) {
                Some(false) => {
                    surface.skip_reveal(id);
                    return PulseOutcome::Skipped;
                }
                Some(true) => {}
                None => {
                    debug!(npc = %npc_id, dialog_box = id.0, "dialog_box_stale");
                    self.dialog_box = None;
                }
            }
        }

        if let Some(id) = self.dialog_box {
            let Some(line) = self.library.select_and_advance(rng) else {
                surface.destroy(id);
                self.dialog_box = None;
                info!(npc = %npc_id, "conversation_ended");
                return PulseOutcome::Ended;
            };
            if surface.set_message(id, &line) {
                return PulseOutcome::Continued;
            }
            debug!(npc = %npc_id, dialog_box = id.0, "dialog_box_stale");
            self.dialog_box = None;
            return self.open_dialog_box(npc_id, npc_position, &line, surface);
        }

        // Advance a copy so a failed box leaves the NPC exactly as it was.
        let mut staged = self.library.clone();
        let Some(line) = staged.select_and_advance(rng) else {
            self.library = staged;
            info!(npc = %npc_id, "conversation_ended");
            return PulseOutcome::Ended;
        };
        let outcome = self.open_dialog_box(npc_id, npc_position, &line, surface);
        if outcome == PulseOutcome::Started {
            self.library = staged;
            info!(
                npc = %npc_id,
                script = self.library.active().unwrap_or_default(),
                "conversation_started"
            );
        }
        outcome
    }

    fn open_dialog_box(
        &mut self,
        npc_id: EntityId,
        npc_position: Vec3,
        line: &str,
        surface: &mut dyn PresentationSurface,
    ) -> PulseOutcome {
        match surface.create_dialog_box(self.head_position(npc_position), line) {
            Ok(id) => {
                self.dialog_box = Some(id);
                PulseOutcome::Started
            }
            Err(err) => {
                error!(npc = %npc_id, error = %err, "dialog_box_create_failed");
                PulseOutcome::Failed
            }
        }
    }

    /// Replaces the scripts unless `version_id` is already applied.
    ///
    /// An open dialog box is left alone; the next pulse continues in it.
    pub fn override_dialog(
        &mut self,
        npc_id: EntityId,
        scripts: &[DialogScript],
        version_id: i32,
    ) -> bool {
        if self.library.override_with(scripts, version_id) {
            info!(
                npc = %npc_id,
                version_id,
                scripts = scripts.len(),
                "dialog_override_applied"
            );
            true
        } else {
            debug!(npc = %npc_id, version_id, "dialog_override_skipped");
            false
        }
    }

    /// Head target: the player while idle and in range, or while talking
    /// when the current line asks for it.
    pub fn look_target(&self, npc_position: Vec3, player: Option<PlayerPose>) -> LookTarget {
        let idle = LookTarget::Idle(self.config.idle_look_direction);
        let Some(player) = player else {
            return idle;
        };

        if self.library.is_talking() {
            let turn_head = self
                .library
                .active_message()
                .is_some_and(|message| message.requires_turn_head);
            return if turn_head {
                LookTarget::Point(player.top)
            } else {
                idle
            };
        }

        if self.config.look_at_while_idle
            && npc_position.distance_with(player.position, self.config.ignore_y)
                <= self.config.head_range
        {
            LookTarget::Point(player.top)
        } else {
            idle
        }
    }

    /// Ground-plane direction from `from` towards the NPC.
    pub fn axis_from(&self, npc_position: Vec3, from: Vec3) -> Vec3 {
        (npc_position - from).with_y(0.0).normalized_or_zero()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::dialog::Message;

    #[derive(Debug, Default)]
    pub(crate) struct FakeBox {
        pub text: String,
        pub done: bool,
        pub skips: u32,
    }

    /// Boxes reveal instantly unless `slow` is set.
    #[derive(Debug, Default)]
    pub(crate) struct FakeSurface {
        pub boxes: BTreeMap<DialogBoxId, FakeBox>,
        pub next_id: u64,
        pub no_canvas: bool,
        pub slow: bool,
        pub destroyed: u32,
    }

    impl PresentationSurface for FakeSurface {
        fn create_dialog_box(
            &mut self,
            _anchor: Vec3,
            text: &str,
        ) -> Result<DialogBoxId, PresentationError> {
            if self.no_canvas {
                return Err(PresentationError::NoCanvas);
            }
            let id = DialogBoxId(self.next_id);
            self.next_id += 1;
            self.boxes.insert(
                id,
                FakeBox {
                    text: text.to_string(),
                    done: !self.slow,
                    skips: 0,
                },
            );
            Ok(id)
        }

        fn is_done(&self, id: DialogBoxId) -> Option<bool> {
            self.boxes.get(&id).map(|dialog_box| dialog_box.done)
        }

        fn skip_reveal(&mut self, id: DialogBoxId) {
            if let Some(dialog_box) = self.boxes.get_mut(&id) {
                dialog_box.done = true;
                dialog_box.skips += 1;
            }
        }

        fn set_message(&mut self, id: DialogBoxId, text: &str) -> bool {
            let slow = self.slow;
            match self.boxes.get_mut(&id) {
                Some(dialog_box) => {
                    dialog_box.text = text.to_string();
                    dialog_box.done = !slow;
                    true
                }
                None => false,
            }
        }

        fn destroy(&mut self, id: DialogBoxId) {
            if self.boxes.remove(&id).is_some() {
                self.destroyed += 1;
            }
        }
    }

    fn keeper() -> NpcController {
        NpcController::new(
            DialogLibrary::new(
                vec![DialogScript::new(
                    vec![Message::new("hello", true), Message::new("goodbye", false)],
                    true,
                )],
                0,
            ),
            NpcConfig::default(),
        )
    }

    const NPC: EntityId = EntityId(1);

    fn shown(surface: &FakeSurface, npc: &NpcController) -> Option<String> {
        npc.dialog_box()
            .and_then(|id| surface.boxes.get(&id))
            .map(|dialog_box| dialog_box.text.clone())
    }

    #[test]
    fn pulses_walk_the_script_then_close_the_box() {
        let mut npc = keeper();
        let mut surface = FakeSurface::default();
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(
            npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng),
            PulseOutcome::Started
        );
        assert_eq!(shown(&surface, &npc).as_deref(), Some("hello"));
        assert_eq!(
            npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng),
            PulseOutcome::Continued
        );
        assert_eq!(shown(&surface, &npc).as_deref(), Some("goodbye"));
        assert_eq!(
            npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng),
            PulseOutcome::Ended
        );
        assert!(npc.dialog_box().is_none());
        assert!(surface.boxes.is_empty());
        assert_eq!(surface.destroyed, 1);
        assert!(!npc.is_talking());
    }

    #[test]
    fn pulse_while_revealing_only_skips() {
        let mut npc = keeper();
        let mut surface = FakeSurface {
            slow: true,
            ..FakeSurface::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);

        let outcome = npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);

        assert_eq!(outcome, PulseOutcome::Skipped);
        assert_eq!(shown(&surface, &npc).as_deref(), Some("hello"));
        let id = npc.dialog_box().expect("box");
        assert_eq!(surface.boxes[&id].skips, 1);
        assert_eq!(
            npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng),
            PulseOutcome::Continued
        );
    }

    #[test]
    fn missing_canvas_leaves_npc_idle_and_line_unconsumed() {
        let mut npc = keeper();
        let before = npc.library().clone();
        let mut surface = FakeSurface {
            no_canvas: true,
            ..FakeSurface::default()
        };
        let mut rng = StdRng::seed_from_u64(0);

        let outcome = npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);

        assert_eq!(outcome, PulseOutcome::Failed);
        assert!(!outcome.keeps_engaged());
        assert!(!npc.is_talking());
        assert_eq!(npc.library(), &before);

        surface.no_canvas = false;
        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);
        assert_eq!(shown(&surface, &npc).as_deref(), Some("hello"));
    }

    #[test]
    fn externally_destroyed_box_is_recreated() {
        let mut npc = keeper();
        let mut surface = FakeSurface::default();
        let mut rng = StdRng::seed_from_u64(0);
        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);
        surface.boxes.clear();

        let outcome = npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);

        assert_eq!(outcome, PulseOutcome::Started);
        assert_eq!(shown(&surface, &npc).as_deref(), Some("goodbye"));
    }

    #[test]
    fn failed_recreate_mid_conversation_stops_talking() {
        let mut npc = keeper();
        let mut surface = FakeSurface::default();
        let mut rng = StdRng::seed_from_u64(0);
        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);
        assert!(npc.is_talking());
        surface.boxes.clear();
        surface.no_canvas = true;

        let outcome = npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);

        assert_eq!(outcome, PulseOutcome::Failed);
        assert!(!npc.is_talking());
        assert!(npc.dialog_box().is_none());
        let far = PlayerPose {
            position: Vec3::new(100.0, 0.0, 0.0),
            top: Vec3::new(100.0, 2.0, 0.0),
        };
        assert!(matches!(
            npc.look_target(Vec3::ZERO, Some(far)),
            LookTarget::Idle(_)
        ));

        surface.no_canvas = false;
        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);
        assert_eq!(shown(&surface, &npc).as_deref(), Some("goodbye"));
    }

    #[test]
    fn override_keeps_open_box_and_applies_once() {
        let mut npc = keeper();
        let mut surface = FakeSurface::default();
        let mut rng = StdRng::seed_from_u64(0);
        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);
        let open = npc.dialog_box();

        let quest = [DialogScript::new(vec![Message::new("news", false)], true)];
        assert!(npc.override_dialog(NPC, &quest, 4));
        assert!(!npc.override_dialog(NPC, &quest, 4));
        assert_eq!(npc.dialog_box(), open);
        assert!(!npc.is_talking());

        assert_eq!(
            npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng),
            PulseOutcome::Continued
        );
        assert_eq!(shown(&surface, &npc).as_deref(), Some("news"));
    }

    #[test]
    fn idle_npc_looks_at_player_only_within_range() {
        let npc = keeper();
        let player_top = Vec3::new(3.0, 2.0, 0.0);
        let near = PlayerPose {
            position: Vec3::new(3.0, 40.0, 0.0),
            top: player_top,
        };
        let far = PlayerPose {
            position: Vec3::new(30.0, 0.0, 0.0),
            top: player_top,
        };

        assert_eq!(
            npc.look_target(Vec3::ZERO, Some(near)),
            LookTarget::Point(player_top)
        );
        assert_eq!(
            npc.look_target(Vec3::ZERO, Some(far)),
            LookTarget::Idle(NpcConfig::default().idle_look_direction)
        );
        assert_eq!(
            npc.look_target(Vec3::ZERO, None),
            LookTarget::Idle(NpcConfig::default().idle_look_direction)
        );
    }

    #[test]
    fn talking_npc_turns_head_only_for_marked_lines() {
        let mut npc = keeper();
        let mut surface = FakeSurface::default();
        let mut rng = StdRng::seed_from_u64(0);
        let far = PlayerPose {
            position: Vec3::new(100.0, 0.0, 0.0),
            top: Vec3::new(100.0, 2.0, 0.0),
        };

        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);
        assert_eq!(npc.look_target(Vec3::ZERO, Some(far)), LookTarget::Point(far.top));

        npc.on_interaction_pulse(NPC, Vec3::ZERO, &mut surface, &mut rng);
        assert!(matches!(
            npc.look_target(Vec3::ZERO, Some(far)),
            LookTarget::Idle(_)
        ));
    }

    #[test]
    fn axis_from_is_flat_and_normalized() {
        let npc = keeper();
        let axis = npc.axis_from(Vec3::new(0.0, 5.0, 4.0), Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(axis, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(npc.axis_from(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)), Vec3::ZERO);
    }
}
