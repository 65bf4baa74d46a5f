/// Wrapper for problems when driving the CCPDv2 or tuning it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Attempt to set a comparator threshold outside `-0.1..=1.999` V.
    ///
    /// Checked before anything is written to the board, so a search that hits
    /// this stops with the previous threshold still applied.
    #[error("invalid voltage for TH {volts}")]
    ThresholdOutOfRange {
        /// Requested threshold, in volts.
        volts: f64,
    },
    /// Attempt to set a baseline outside `-0.1..=1.9` V.
    #[error("invalid voltage for BL {volts}")]
    BaselineOutOfRange {
        /// Requested baseline, in volts.
        volts: f64,
    },
    /// Attempt to use a trim code not in the range `0..=15`.
    #[error("TDAC code {0} is not in 0..=15")]
    TdacOutOfRange(u8),
    /// Attempt to write a global bias DAC value not in the range `0..=63`.
    #[error("{dac} value {value} is not in 0..=63")]
    DacOutOfRange {
        /// DAC name as printed on the chip documentation.
        dac: &'static str,
        /// Rejected value.
        value: u8,
    },
    /// A pixel coordinate outside the 24 x 60 matrix.
    #[error("pixel ({row}, {column}) is outside the 24x60 matrix")]
    PixelOutOfRange {
        /// Requested row.
        row: usize,
        /// Requested column.
        column: usize,
    },
    /// A setting name that has no entry in the settings table.
    #[error("invalid param {0}")]
    UnknownSetting(String),
    /// A known setting given a value it cannot take.
    #[error("invalid value {value:?} for {name}")]
    InvalidSettingValue {
        /// Setting name.
        name: String,
        /// Rejected value, as given.
        value: String,
    },
    /// The readout board reported a failure.
    #[error(transparent)]
    Board(#[from] BoardError),
    /// Reading or writing the run log failed.
    #[error("run log: {0}")]
    Io(#[from] std::io::Error),
    /// A session configuration file could not be parsed.
    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Failure reported by a [`Board`] implementation.
///
/// [`Board`]: crate::board::Board
#[derive(Debug, Clone, thiserror::Error)]
#[error("board: {message}")]
pub struct BoardError {
    /// Description from the transport.
    pub message: String,
}

impl BoardError {
    /// Create a board error with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
