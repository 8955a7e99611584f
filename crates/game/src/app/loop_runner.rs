use std::process::ExitCode;

use engine::{compile_dialog_database, SceneWorld};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::gameplay::{DemoLog, DemoScene, Timeline};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let database = match compile_dialog_database(&app.paths, &app.content_request) {
        Ok(database) => database,
        Err(err) => {
            error!(error = %err, "content_compile_failed");
            return ExitCode::FAILURE;
        }
    };
    let timeline = match Timeline::load(&app.timeline_path) {
        Ok(timeline) => timeline,
        Err(err) => {
            error!(error = %err, "timeline_load_failed");
            return ExitCode::FAILURE;
        }
    };

    let mut scene = DemoScene::new(
        database,
        app.paths.saves_dir(),
        StdRng::seed_from_u64(app.rng_seed),
    );
    let mut world = SceneWorld::default();
    let summary = timeline.replay(&mut scene, &mut world, &app.config);
    report(scene.log());
    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        quit_requested = summary.quit_requested,
        "run_complete"
    );
    ExitCode::SUCCESS
}

fn report(log: &DemoLog) {
    info!(
        lines = log.lines.len(),
        conversations_started = log.conversations_started,
        conversations_ended = log.conversations_ended,
        actions = log.actions.len(),
        electrified = log.electrified,
        lamp_lit = log.lamp_lit,
        blocked_moves = log.blocked_moves,
        saves_written = log.saves_written,
        saves_loaded = log.saves_loaded,
        "demo_summary"
    );
}
