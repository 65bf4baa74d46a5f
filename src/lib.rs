#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod board;
mod driver;
mod error;
pub mod frontend;
pub mod pixel;
pub mod registers;
mod retry;
pub mod runlog;
pub mod search;
mod session;
pub mod settings;

pub use driver::{AllConfig, Ccpdv2, PowerReadings, RailReading};
pub use error::{BoardError, Error};
pub use frontend::{Frontend, SampleBatch};
pub use retry::{RetryPolicy, StdDelay, WaitOutcome};
pub use runlog::{LogConfig, RunLog};
pub use search::{CancelToken, SearchOutcome, TdacOutcome, TdacState, Tuner};
pub use session::Session;
pub use settings::{ChipSettings, Setting};
