use thiserror::Error;

/// Error taxonomy of the crate.
///
/// `Configuration` and `ResumeMismatch` are fatal to a session and are
/// surfaced before any trial runs. `Simulation` aborts the current trial
/// only, the last checkpoint stays valid. `TelemetryDelivery` is logged by
/// the session and never interrupts training.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("simulation failure: {0}")]
    Simulation(String),

    #[error("resume mismatch: {0}")]
    ResumeMismatch(String),

    #[error("telemetry delivery failure: {0}")]
    TelemetryDelivery(String),

    #[error("checkpoint i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn simulation(msg: impl Into<String>) -> Self {
        Error::Simulation(msg.into())
    }

    /// True for errors that invalidate the whole session rather than a
    /// single trial.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::ResumeMismatch(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(Error::configuration("bad tau").is_fatal());
        assert!(Error::ResumeMismatch("w_max differs".to_string()).is_fatal());
        assert!(!Error::simulation("empty pattern").is_fatal());
        assert!(!Error::TelemetryDelivery("channel closed".to_string()).is_fatal());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::configuration("tau_ltp must be strictly positive").to_string(),
            "invalid configuration: tau_ltp must be strictly positive"
        );
        assert_eq!(
            Error::simulation("substrate failed").to_string(),
            "simulation failure: substrate failed"
        );
    }
}
