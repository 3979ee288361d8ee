//! Ambient configuration (§6 "Environment / config"), consumed from outside
//! the core (CLI flags, embedder-provided struct). Mirrors `PackOptions` in
//! spirit: a plain struct for library embedding, with a `clap::Args` wrapper
//! for the CLI.

use clap::Args;

/// Tunables for one `Storage` instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Soft cap on bytes accumulated in a file before it is force-finalized
    /// even mid-hour. `0` disables the cap (finalize on hour roll only).
    pub max_file_bytes: u64,
    pub metadata_cache_max_mb: i64,
    pub strict_hours: bool,
    pub inline_data_threshold_bytes: usize,
    pub block_target_bytes: usize,
    pub block_target_events: usize,
    /// `autoSave` (§4.E): debounce catalog sidecar writes on mutation.
    pub autosave_index: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 0,
            metadata_cache_max_mb: 64,
            strict_hours: false,
            inline_data_threshold_bytes: crate::format::DEFAULT_INLINE_THRESHOLD_BYTES,
            block_target_bytes: 64 * 1024,
            block_target_events: 1000,
            autosave_index: true,
        }
    }
}

/// CLI-facing mirror of [`StoreConfig`] — flattened into subcommands that
/// open or create a store directory.
#[derive(Debug, Args)]
pub struct StoreConfigArgs {
    #[arg(long, default_value_t = 0)]
    pub max_file_bytes: u64,
    #[arg(long, default_value_t = 64)]
    pub metadata_cache_max_mb: i64,
    #[arg(long, default_value_t = false)]
    pub strict_hours: bool,
    #[arg(long, default_value_t = crate::format::DEFAULT_INLINE_THRESHOLD_BYTES)]
    pub inline_data_threshold_bytes: usize,
    #[arg(long, default_value_t = 64 * 1024)]
    pub block_target_bytes: usize,
    #[arg(long, default_value_t = 1000)]
    pub block_target_events: usize,
}

impl From<StoreConfigArgs> for StoreConfig {
    fn from(a: StoreConfigArgs) -> Self {
        Self {
            max_file_bytes: a.max_file_bytes,
            metadata_cache_max_mb: a.metadata_cache_max_mb,
            strict_hours: a.strict_hours,
            inline_data_threshold_bytes: a.inline_data_threshold_bytes,
            block_target_bytes: a.block_target_bytes,
            block_target_events: a.block_target_events,
            autosave_index: true,
        }
    }
}
