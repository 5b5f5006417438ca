/// Cache-wide tuning knobs. Plain struct + `Default` + `with_*` builder
/// methods, no external config-loading crate — every crate boundary in this
/// workspace configures itself this way.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Chunk width in datapoints.
    pub batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { batch_size: 250 }
    }
}

impl CacheConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Restamping strategy for out-of-order inserts. See `InsertPipelineConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestampMode {
    /// Bump by ε = 1e-5 only when the running max is integer-valued,
    /// reproducing the original implementation's exact test vectors.
    Legacy,
    /// Always bump by ε regardless of whether the running max is
    /// integer-valued.
    Strict,
}

impl Default for RestampMode {
    fn default() -> Self {
        RestampMode::Legacy
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InsertPipelineConfig {
    pub restamp_mode: RestampMode,
    pub restamp_epsilon: f64,
    /// Arrays longer than this are split into successive Insert calls.
    pub max_script_items: usize,
}

impl Default for InsertPipelineConfig {
    fn default() -> Self {
        Self {
            restamp_mode: RestampMode::Legacy,
            restamp_epsilon: 1e-5,
            max_script_items: 5000,
        }
    }
}

impl InsertPipelineConfig {
    pub fn with_restamp_mode(mut self, mode: RestampMode) -> Self {
        self.restamp_mode = mode;
        self
    }

    pub fn with_max_script_items(mut self, max: usize) -> Self {
        self.max_script_items = max;
        self
    }
}
