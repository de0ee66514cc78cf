//! In-process link for CI/CD testing without a field device.
//!
//! [`MemoryLink`] replays a scripted sequence of inbound lines and records
//! every outbound line, so the full loop can run headless.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use heatwatch_hal::{LinkChannel, MemoryLink};
//!
//! let mut link = MemoryLink::with_lines(["MCU boot ok"]);
//! assert_eq!(
//!     link.read_line(Duration::from_millis(10)).unwrap().as_deref(),
//!     Some("MCU boot ok")
//! );
//! link.write_line(r#"{"decision":0,"prob":0.0,"duration":60}"#).unwrap();
//! assert_eq!(link.sent().len(), 1);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use heatwatch_types::HeatwatchError;

use crate::link::LinkChannel;

/// One scripted inbound event.
#[derive(Debug, Clone)]
enum Inbound {
    Line(String),
    ReadFault(String),
}

/// A [`LinkChannel`] backed by in-memory queues.
#[derive(Debug, Default)]
pub struct MemoryLink {
    inbound: VecDeque<Inbound>,
    sent: Vec<String>,
    /// When set, every write fails with this message.
    write_fault: Option<String>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load the inbound queue with `lines`, in order.
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut link = Self::new();
        for line in lines {
            link.push_line(line);
        }
        link
    }

    /// Queue one more inbound line.
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.inbound.push_back(Inbound::Line(line.into()));
    }

    /// Queue a device read failure at the current position.
    pub fn push_read_fault(&mut self, message: impl Into<String>) {
        self.inbound.push_back(Inbound::ReadFault(message.into()));
    }

    /// Make every subsequent write fail (`Some`) or succeed (`None`).
    pub fn set_write_fault(&mut self, message: Option<String>) {
        self.write_fault = message;
    }

    /// Lines written so far, without terminators.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Number of inbound events not yet consumed.
    pub fn remaining(&self) -> usize {
        self.inbound.len()
    }
}

impl LinkChannel for MemoryLink {
    fn address(&self) -> &str {
        "memory"
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, HeatwatchError> {
        match self.inbound.pop_front() {
            Some(Inbound::Line(line)) => Ok(Some(line)),
            Some(Inbound::ReadFault(msg)) => Err(HeatwatchError::ReadError(msg)),
            None => Ok(None),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), HeatwatchError> {
        if let Some(msg) = &self.write_fault {
            return Err(HeatwatchError::WriteError(msg.clone()));
        }
        self.sent.push(line.to_string());
        Ok(())
    }
}
