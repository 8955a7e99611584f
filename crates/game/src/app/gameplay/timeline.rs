use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::{
    ButtonState, FixedStepLoop, InputAction, InputCollector, LoopConfig, Scene, SceneWorld,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::scene::{DemoScene, SceneRequest};

const DEFAULT_FRAME_MS: u64 = 16;

/// Scripted input for a headless run: a list of frames, each applying
/// button edges and an optional scene command before stepping the loop.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Timeline {
    #[serde(default = "default_frame_ms")]
    pub(crate) frame_ms: u64,
    pub(crate) frames: Vec<TimelineFrame>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TimelineFrame {
    #[serde(default)]
    pub(crate) press: Vec<TimelineButton>,
    #[serde(default)]
    pub(crate) release: Vec<TimelineButton>,
    /// Level for the electrify axis from this frame on.
    #[serde(default)]
    pub(crate) electrify: Option<f32>,
    #[serde(default)]
    pub(crate) command: Option<SceneRequest>,
    /// Frames to run with this input; the edges only latch on the first.
    #[serde(default = "default_repeat")]
    pub(crate) repeat: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TimelineButton {
    Interact,
    Inventory,
    Jump,
    Quit,
}

impl From<TimelineButton> for InputAction {
    fn from(button: TimelineButton) -> Self {
        match button {
            TimelineButton::Interact => InputAction::Interact,
            TimelineButton::Inventory => InputAction::Inventory,
            TimelineButton::Jump => InputAction::Jump,
            TimelineButton::Quit => InputAction::Quit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReplaySummary {
    pub(crate) frames: u64,
    pub(crate) ticks: u64,
    pub(crate) quit_requested: bool,
}

#[derive(Debug, Error)]
pub(crate) enum TimelineError {
    #[error("read timeline '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse timeline '{file}' at {path}: {source}")]
    Parse {
        file: PathBuf,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn default_frame_ms() -> u64 {
    DEFAULT_FRAME_MS
}

fn default_repeat() -> u32 {
    1
}

impl Timeline {
    pub(crate) fn load(path: &Path) -> Result<Self, TimelineError> {
        let raw = fs::read_to_string(path).map_err(|source| TimelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|(json_path, source)| TimelineError::Parse {
            file: path.to_path_buf(),
            path: json_path,
            source,
        })
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, (String, serde_json::Error)> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, Timeline>(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            (path, error.into_inner())
        })
    }

    /// Loads the scene, steps it through every frame and unloads it.
    pub(crate) fn replay(
        &self,
        scene: &mut DemoScene,
        world: &mut SceneWorld,
        loop_config: &LoopConfig,
    ) -> ReplaySummary {
        let mut sim = FixedStepLoop::new(loop_config);
        let mut input = InputCollector::new();
        let frame_dt = Duration::from_millis(self.frame_ms.max(1));
        let mut summary = ReplaySummary::default();

        scene.load(world);
        world.apply_pending();

        'frames: for frame in &self.frames {
            for button in &frame.press {
                input.handle_button((*button).into(), ButtonState::Pressed);
            }
            for button in &frame.release {
                input.handle_button((*button).into(), ButtonState::Released);
            }
            if let Some(level) = frame.electrify {
                input.set_electrify_axis(level);
            }
            if let Some(request) = &frame.command {
                scene.queue_request(request.clone());
            }

            for _ in 0..frame.repeat.max(1) {
                let report = sim.run_frame(frame_dt, &mut input, scene, world);
                summary.frames += 1;
                if report.quit_requested {
                    summary.quit_requested = true;
                    debug!(frame = summary.frames, "timeline_quit");
                    break 'frames;
                }
            }
        }

        summary.ticks = sim.total_ticks();
        scene.unload(world);
        info!(
            frames = summary.frames,
            ticks = summary.ticks,
            quit_requested = summary.quit_requested,
            "timeline_replayed"
        );
        summary
    }
}
