//! CLI config for the DBRP mapping service.

use std::num::NonZeroUsize;

const DEFAULT_MAX_ID_GENERATION_ATTEMPTS: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// CLI config for the DBRP mapping service.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct DbrpConfig {
    /// How many identifiers to draw from the ID generator when creating a
    /// mapping without an id before giving up on finding an unused one.
    #[clap(
        long = "dbrp-max-id-generation-attempts",
        env = "INFLUXDB3_DBRP_MAX_ID_GENERATION_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ID_GENERATION_ATTEMPTS,
        action
    )]
    pub max_id_generation_attempts: NonZeroUsize,
}

impl Default for DbrpConfig {
    fn default() -> Self {
        Self {
            max_id_generation_attempts: DEFAULT_MAX_ID_GENERATION_ATTEMPTS,
        }
    }
}
