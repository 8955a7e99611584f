use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub mod app;
pub mod content;
pub mod conversation;
pub mod dialog;
pub mod interaction;
pub mod persistence;

pub use app::{
    ButtonState, Entity, EntityId, FixedStepLoop, FrameReport, InputAction, InputCollector,
    InputSnapshot, Item, LoopConfig, Scene, SceneCommand, SceneWorld, Transform, Vec3,
};
pub use content::{
    compile_dialog_database, ContentCompileError, ContentErrorCode, ContentPlanError,
    ContentRequest, DialogDatabase, DialogDef, DialogDefId, SourceLocation,
};
pub use conversation::{
    DialogBoxId, LookTarget, NpcConfig, NpcController, PlayerPose, PresentationError,
    PresentationSurface, PulseOutcome,
};
pub use dialog::{DialogCursor, DialogLibrary, DialogScript, Message, NextLine, ShuffleBag};
pub use interaction::{
    run_electrify_tick, run_hud_tick, run_interaction_tick, update_player_frame,
    ArbitratedAction, Electrifiable, ElectrifyRoute, InteractionConfig, InteractionContext,
    InteractionEvent, InteractionEventKind, InteractionEvents, MotionLock, PlayerState,
};
pub use persistence::{
    NpcDialogSave, PersistenceError, SaveGame, SavedMessage, SavedScript, SAVE_VERSION,
};

pub const ROOT_ENV_VAR: &str = "SPARK_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl AppPaths {
    pub fn saves_dir(&self) -> PathBuf {
        self.cache_dir.join("saves")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create cache directory at {path}: {source}")]
    CreateCacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "SPARK_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/spark\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_for_root(&root)
}

pub fn app_paths_for_root(root: &Path) -> Result<AppPaths, StartupError> {
    let paths = AppPaths {
        root: root.to_path_buf(),
        base_content_dir: root.join("assets").join("base"),
        mods_dir: root.join("mods"),
        cache_dir: root.join("cache"),
    };
    fs::create_dir_all(&paths.cache_dir).map_err(|source| StartupError::CreateCacheDir {
        path: paths.cache_dir.clone(),
        source,
    })?;
    Ok(paths)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    let (root, origin) = match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let root = normalize_path(Path::new(&value));
            if !is_project_root(&root) {
                return Err(StartupError::InvalidEnvRoot { path: root });
            }
            (root, "env")
        }
        Err(env::VarError::NotPresent) => (root_above_executable()?, "exe"),
        Err(source) => {
            return Err(StartupError::EnvVar {
                var: ROOT_ENV_VAR,
                source,
            })
        }
    };
    info!(root = %root.display(), origin, "project_root_resolved");
    Ok(root)
}

fn root_above_executable() -> Result<PathBuf, StartupError> {
    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let Some(exe_dir) = exe.parent() else {
        return Err(StartupError::ExeHasNoParent(exe));
    };
    exe_dir
        .ancestors()
        .find(|candidate| is_project_root(candidate))
        .map(normalize_path)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: normalize_path(exe_dir),
            env_var: ROOT_ENV_VAR,
        })
}

/// Cargo.toml next to either the crates or the assets tree.
fn is_project_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file()
        && (path.join("crates").is_dir() || path.join("assets").is_dir())
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
