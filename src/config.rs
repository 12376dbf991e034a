use crate::error::ConfigError;

/// Environment variable that turns off the random suffix on anonymous names.
pub const NORAND_ENV: &str = "GOBDUMP_NORAND";
/// Environment variable holding a decimal seed for anonymous name suffixes.
pub const SEED_ENV: &str = "GOBDUMP_SEED";

/// How anonymous struct types get their names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingMode {
    /// Share the process-wide namer, so names never collide across decoders.
    #[default]
    Process,
    /// A private namer seeded from the OS.
    Random,
    /// A private namer with reproducible suffixes.
    Seeded(u64),
    /// Plain `Anon<id>` with no suffix.
    Plain,
}

impl NamingMode {
    /// Reads [`NORAND_ENV`] and [`SEED_ENV`]. Neither set means `Random`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var(NORAND_ENV).ok().as_deref(),
            std::env::var(SEED_ENV).ok().as_deref(),
        )
    }

    fn from_vars(norand: Option<&str>, seed: Option<&str>) -> Result<Self, ConfigError> {
        if norand.is_some_and(|v| !v.is_empty()) {
            return Ok(NamingMode::Plain);
        }
        match seed.filter(|s| !s.is_empty()) {
            Some(s) => {
                let seed: i64 = s.trim().parse().map_err(|source| ConfigError::BadSeed {
                    value: s.to_string(),
                    source,
                })?;
                Ok(NamingMode::Seeded(seed as u64))
            }
            None => Ok(NamingMode::Random),
        }
    }
}

pub const DEFAULT_MAX_DEPTH: usize = 128;

// Generous upper bound for one nesting level in a debug build.
const STACK_PER_LEVEL: usize = 16 * 1024;
const STACK_BASE: usize = 1024 * 1024;

/// Limits and naming for a [`Decoder`](crate::Decoder).
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Largest frame body accepted; larger length prefixes fail before
    /// anything is allocated.
    pub max_frame_size: u64,
    /// How deep values may nest (structs in slices in interfaces ...).
    /// Each level costs stack on the decoding thread; the default fits a
    /// 2 MiB thread in an unoptimised build. Raise it only on threads with
    /// a matching stack, see [`DecoderConfig::stream_stack_size`].
    pub max_depth: usize,
    pub naming: NamingMode,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 1 << 30,
            max_depth: DEFAULT_MAX_DEPTH,
            naming: NamingMode::Process,
        }
    }
}

impl DecoderConfig {
    pub fn with_naming(mut self, naming: NamingMode) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_max_frame_size(mut self, max: u64) -> Self {
        self.max_frame_size = max;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Stack for the `decode_stream` worker, enough to reach `max_depth`.
    pub fn stream_stack_size(&self) -> usize {
        self.max_depth
            .saturating_mul(STACK_PER_LEVEL)
            .saturating_add(STACK_BASE)
    }
}
