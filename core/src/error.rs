use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid log format at line {line}: {reason}")]
    InvalidLogFormat { line: usize, reason: String },

    #[error("Invalid speed multiplier: {0}")]
    InvalidSpeedMultiplier(f64),

    #[error("Vessel '{vessel}' has no active target")]
    NoActiveTarget { vessel: String },

    #[error("Driver '{driver}' did not stop within {waited_ms}ms")]
    DriverStopTimeout { driver: String, waited_ms: u64 },

    #[error("Cannot start playback from an empty log")]
    EmptyLog,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    /// Stable error-kind tag reported across the command boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidLogFormat { .. }    => "invalid_log_format",
            Self::InvalidSpeedMultiplier(_)  => "invalid_speed_multiplier",
            Self::NoActiveTarget { .. }      => "no_active_target",
            Self::DriverStopTimeout { .. }   => "driver_stop_timeout",
            Self::EmptyLog                   => "empty_log",
            Self::InvalidConfig(_)           => "invalid_config",
            Self::Serialization(_)           => "serialization",
            Self::Io(_)                      => "io",
            Self::Other(_)                   => "other",
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
