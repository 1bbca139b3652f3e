//! Leveled, filterable logging for every binary (SPEC_FULL.md §6 "Logging").
//! Default level is `info`, overridable per the usual `RUST_LOG` convention.

/// Initializes the global logger. Safe to call once per process; later
/// calls are ignored by `env_logger`.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
