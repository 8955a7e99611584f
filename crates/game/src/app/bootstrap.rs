use std::path::PathBuf;

use engine::{resolve_app_paths, AppPaths, ContentRequest, LoopConfig, StartupError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ENABLED_MODS_ENV_VAR: &str = "SPARK_ENABLED_MODS";
const RNG_SEED_ENV_VAR: &str = "SPARK_RNG_SEED";
const TIMELINE_ENV_VAR: &str = "SPARK_TIMELINE";
const DEFAULT_RNG_SEED: u64 = 0x5EED;

pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) config: LoopConfig,
    pub(crate) content_request: ContentRequest,
    pub(crate) rng_seed: u64,
    pub(crate) timeline_path: PathBuf,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Spark Startup ===");

    let paths = resolve_app_paths()?;
    let content_request = std::env::var(ENABLED_MODS_ENV_VAR)
        .map(|raw| ContentRequest::from_mod_list(&raw))
        .unwrap_or_default();
    let rng_seed = parse_rng_seed(std::env::var(RNG_SEED_ENV_VAR).ok().as_deref());
    let timeline_path = std::env::var_os(TIMELINE_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_timeline_path(&paths));

    info!(
        root = %paths.root.display(),
        enabled_mods = ?content_request.enabled_mods,
        rng_seed,
        timeline = %timeline_path.display(),
        "app_configured"
    );

    Ok(AppWiring {
        paths,
        config: LoopConfig::default(),
        content_request,
        rng_seed,
        timeline_path,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_rng_seed(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return DEFAULT_RNG_SEED;
    };
    match raw.parse::<u64>() {
        Ok(seed) => seed,
        Err(error) => {
            warn!(value = raw, error = %error, "rng_seed_invalid");
            DEFAULT_RNG_SEED
        }
    }
}

fn default_timeline_path(paths: &AppPaths) -> PathBuf {
    paths.base_content_dir.join("demo").join("timeline.json")
}
