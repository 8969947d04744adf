// Engine configuration
//
// EngineConfig gathers the knobs a caller can turn: the dtype used when a
// literal comes without one, how arrays print, and the tolerances of the
// linear algebra routines. It is a plain value built with `with_*` methods;
// `from_env` overlays AXON_* environment variables on the defaults.
//
// Context pairs a config with the dtype registry. The handle table and any
// front end borrow one Context instead of reaching for globals.

use axon_core::{DType, DTypeRegistry, Error, PrintOptions, Result};
use axon_linalg::LinalgOptions;

pub const ENV_DEFAULT_DTYPE: &str = "AXON_DEFAULT_DTYPE";
pub const ENV_PRINT_EDGE_ITEMS: &str = "AXON_PRINT_EDGE_ITEMS";
pub const ENV_PRINT_THRESHOLD: &str = "AXON_PRINT_THRESHOLD";
pub const ENV_EIG_MAX_ITER: &str = "AXON_EIG_MAX_ITER";
pub const ENV_LOG: &str = "AXON_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Dtype for arrays created without an explicit one (default: F32).
    pub default_dtype: DType,
    pub print: PrintOptions,
    pub linalg: LinalgOptions,
    /// `tracing` filter directive used by [`crate::init_tracing`] when
    /// `RUST_LOG` is unset (default: `"warn"`).
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_dtype: DType::F32,
            print: PrintOptions::default(),
            linalg: LinalgOptions::default(),
            log_filter: "warn".to_string(),
        }
    }
}

fn parse_usize(var: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::msg(format!("{var}={value:?}: {e}")))
}

impl EngineConfig {
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.default_dtype = dtype;
        self
    }

    pub fn with_print_options(mut self, print: PrintOptions) -> Self {
        self.print = print;
        self
    }

    pub fn with_linalg_options(mut self, linalg: LinalgOptions) -> Self {
        self.linalg = linalg;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Defaults overlaid with the `AXON_*` environment variables.
    pub fn from_env(registry: &DTypeRegistry) -> Result<Self> {
        Self::from_lookup(registry, |var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`. Unset variables keep their default; malformed ones are
    /// errors.
    pub fn from_lookup(
        registry: &DTypeRegistry,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();
        if let Some(name) = lookup(ENV_DEFAULT_DTYPE) {
            config.default_dtype = registry.parse(&name)?;
        }
        if let Some(v) = lookup(ENV_PRINT_EDGE_ITEMS) {
            config.print.edge_items = parse_usize(ENV_PRINT_EDGE_ITEMS, &v)?;
        }
        if let Some(v) = lookup(ENV_PRINT_THRESHOLD) {
            config.print.threshold = parse_usize(ENV_PRINT_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_EIG_MAX_ITER) {
            config.linalg.max_iter = parse_usize(ENV_EIG_MAX_ITER, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG) {
            config.log_filter = v;
        }
        Ok(config)
    }
}

/// A configuration together with the dtype table it is resolved against.
#[derive(Debug, Clone, Default)]
pub struct Context {
    config: EngineConfig,
    registry: DTypeRegistry,
}

impl Context {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: DTypeRegistry::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &DTypeRegistry {
        &self.registry
    }

    /// Resolve a dtype name, or the configured default for `None`.
    pub fn resolve_dtype(&self, name: Option<&str>) -> Result<DType> {
        match name {
            Some(n) => self.registry.parse(n),
            None => Ok(self.config.default_dtype),
        }
    }
}
