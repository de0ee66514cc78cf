//! `heatwatch-hal` – the serial link to the field device.
//!
//! The rest of the workspace only talks to the [`LinkChannel`] trait, so the
//! physical port can be swapped for an in-process link in tests and CI.
//!
//! # Modules
//!
//! - [`link`] – [`LinkChannel`]: bounded read-line / write-line primitives.
//! - [`framing`] – [`LineBuffer`]: reassembles newline-terminated lines from
//!   arbitrary byte chunks and drops runaway lines.
//! - [`serial`] – [`SerialLink`]: the `serialport`-backed channel, plus port
//!   discovery for the CLI.
//! - [`memory`] – [`MemoryLink`]: scripted inbound lines and captured
//!   outbound lines, for headless tests.

pub mod framing;
pub mod link;
pub mod memory;
pub mod serial;

pub use framing::{LineBuffer, MAX_LINE_BYTES};
pub use link::LinkChannel;
pub use memory::MemoryLink;
pub use serial::{PortSummary, SerialLink, available_ports};
