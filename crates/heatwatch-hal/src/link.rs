//! Generic `LinkChannel` trait for line-oriented peers.
//!
//! A link carries one text record per line in each direction.  Drivers
//! implement this trait; the inference loop never touches the port directly.

use std::time::Duration;

use heatwatch_types::HeatwatchError;

/// A bidirectional, line-framed connection to exactly one peer.
pub trait LinkChannel: Send {
    /// Human-readable address of the peer, e.g. `"/dev/ttyUSB0"`.
    fn address(&self) -> &str;

    /// Return the next complete line, without its terminator.
    ///
    /// Never blocks for longer than `timeout`.  Returns `Ok(None)` when no
    /// complete line is ready yet.
    ///
    /// # Errors
    ///
    /// Returns [`HeatwatchError::ReadError`] if the underlying device fails.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, HeatwatchError>;

    /// Send `line` followed by a single `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`HeatwatchError::WriteError`] if the line could not be
    /// written in full.
    fn write_line(&mut self, line: &str) -> Result<(), HeatwatchError>;
}
