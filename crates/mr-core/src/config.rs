//! Reader configuration.
//!
//! [`ReaderConfig`] is deserialized from JSON. Every section defaults sensibly
//! so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root reader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Threads the codec library may use inside a decoder; 0 lets it decide.
    pub decoder_threads: usize,
    /// Drain frames buffered inside the decoder once the container is exhausted.
    pub drain_at_end_of_stream: bool,
    pub seek: SeekConfig,
    pub scaling: ScalingAlgorithm,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            decoder_threads: 0,
            drain_at_end_of_stream: true,
            seek: SeekConfig::default(),
            scaling: ScalingAlgorithm::default(),
        }
    }
}

impl ReaderConfig {
    /// Deserialize a `ReaderConfig` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str).map_err(|e| Error::Config(format!("parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it cannot be parsed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse reader config {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No reader config at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read reader config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.seek.tolerance_guard < 0 {
            warnings.push(format!(
                "seek.tolerance_guard is negative ({}); tolerance will exceed one frame interval",
                self.seek.tolerance_guard
            ));
        }

        if self.seek.max_iterations == 0 {
            warnings.push(
                "seek.max_iterations is 0; convergence gives up on the first overshoot".into(),
            );
        }

        let cpus = std::thread::available_parallelism().map_or(1, usize::from);
        if self.decoder_threads > cpus * 4 {
            warnings.push(format!(
                "decoder_threads is {} but only {cpus} CPUs are available",
                self.decoder_threads
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Seek-convergence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    /// Timebase units subtracted from one frame interval to form the
    /// convergence tolerance.
    pub tolerance_guard: i64,
    /// Upper bound on overshoot re-seeks per convergence call. Forward
    /// catch-up decoding is not counted.
    pub max_iterations: u32,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            tolerance_guard: 10,
            max_iterations: 256,
        }
    }
}

/// Interpolation used by the pixel converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingAlgorithm {
    FastBilinear,
    #[default]
    Bilinear,
    Bicubic,
    Point,
}

impl fmt::Display for ScalingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FastBilinear => write!(f, "fastbilinear"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Bicubic => write!(f, "bicubic"),
            Self::Point => write!(f, "point"),
        }
    }
}
