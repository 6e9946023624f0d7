//! Records of training metrics and the rewards log of actors.
//!
//! * [`Record`] - key-value pairs of [`RecordValue`]s
//! * [`Recorder`] - a sink of records, with [`NullRecorder`] and
//!   [`BufferedRecorder`] implementations
//! * [`RewardsLog`] - append-only text file with one line per completed episode
//!
//! ```rust
//! use rl_server_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.5);
//! record.insert("opt_steps", RecordValue::Scalar(100.0));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod rewards_log;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use rewards_log::RewardsLog;
