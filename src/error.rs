//! Error types for gati-track

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// gati-track error types
///
/// Configuration and field-catalog errors are fatal for the affected bank
/// instance; per-message and per-object conditions are recoverable and must
/// not abort processing of later messages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Configuration value out of range or missing
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Scan length does not match the bank's angular resolution
    #[error("Scan has {actual} points, bank expects {expected}")]
    ScanLengthMismatch {
        /// Points per scan the bank was configured with
        expected: usize,
        /// Points in the offending message
        actual: usize,
    },

    /// Named coordinate field absent from the cloud catalog, or its
    /// datatype code is unknown
    #[error("Cannot resolve point field '{0}'")]
    FieldResolution(String),

    /// Coordinate field is not 4 or 8 bytes wide
    #[error("Unsupported coordinate width: {0} bytes")]
    UnsupportedCoordinateWidth(usize),

    /// Cloud message yielded no points inside the configured volume.
    /// Recoverable: discard the message and await the next.
    #[error("No points accepted from cloud message")]
    NoPointsIngested,

    /// Detection requested before the bank has seen `depth` scans.
    /// Recoverable: keep feeding scans.
    #[error("Bank is not filled yet")]
    BankNotFilled,

    /// Transform lookup failed or timed out.
    /// Recoverable: kinematics fall back to sensor-frame coordinates.
    #[error("Transform {target} <- {source_frame} unavailable")]
    TransformUnavailable {
        /// Target frame of the failed lookup
        target: String,
        /// Source frame of the failed lookup
        source_frame: String,
    },
}
