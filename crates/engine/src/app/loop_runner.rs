use std::time::Duration;

use tracing::{debug, warn};

use super::input::InputCollector;
use super::scene::{Scene, SceneCommand, SceneWorld};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub ticks_run: u32,
    pub quit_requested: bool,
}

/// Two-rate driver: one variable update per frame, then as many fixed ticks
/// as the accumulated time allows.
///
/// Each fixed tick takes its own input snapshot, so a latched edge is seen by
/// the first tick of the frame only.
#[derive(Debug)]
pub struct FixedStepLoop {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    total_ticks: u64,
}

impl FixedStepLoop {
    pub fn new(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn run_frame(
        &mut self,
        frame_dt: Duration,
        input: &mut InputCollector,
        scene: &mut dyn Scene,
        world: &mut SceneWorld,
    ) -> FrameReport {
        let clamped_frame_dt = clamp_frame_delta(frame_dt, self.max_frame_delta);
        scene.frame_update(clamped_frame_dt.as_secs_f32(), world);
        world.apply_pending();

        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);
        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let fixed_dt_seconds = self.fixed_dt.as_secs_f32();

        let mut report = FrameReport::default();
        for _ in 0..step_plan.ticks_to_run {
            let input_snapshot = input.snapshot_for_tick();
            let command = scene.fixed_update(fixed_dt_seconds, &input_snapshot, world);
            world.apply_pending();
            self.total_ticks = self.total_ticks.saturating_add(1);
            report.ticks_run = report.ticks_run.saturating_add(1);

            if command == SceneCommand::Quit || input_snapshot.quit_requested() {
                report.quit_requested = true;
                break;
            }
        }
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        debug!(
            ticks_run = report.ticks_run,
            total_ticks = self.total_ticks,
            "frame_complete"
        );
        report
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
