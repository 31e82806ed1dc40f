use std::path::PathBuf;
use std::sync::OnceLock;

use crate::config::PipelineConfig;

/// Process-wide snapshot of the environment overrides.
///
/// Read once, on first use; the pipeline itself never consults the
/// environment, so a variable changed mid-run cannot perturb a committed
/// epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `SPIRALCERT_SEED` — overrides the configured master seed.
    pub seed: Option<u64>,
    /// `SPIRALCERT_CONFIG` — default configuration file path.
    pub config_path: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        let seed = std::env::var("SPIRALCERT_SEED")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok());

        let config_path = match std::env::var("SPIRALCERT_CONFIG") {
            Ok(raw) if !raw.trim().is_empty() => Some(PathBuf::from(raw)),
            _ => None,
        };

        Self { seed, config_path }
    }

    /// Applies the overrides to a loaded configuration.
    pub fn apply_to(&self, cfg: &mut PipelineConfig) {
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
    }
}

static OVERRIDES: OnceLock<EnvOverrides> = OnceLock::new();

/// Returns the lazily initialised override snapshot.
pub fn overrides() -> &'static EnvOverrides {
    OVERRIDES.get_or_init(EnvOverrides::from_env)
}
