//! Radar sensor serial protocol
//!
//! The sensor speaks a framed binary protocol over UART:
//!
//! ```text
//! 0x53 0x59 | ctrl | cmd | len (u16 BE) | payload | checksum | 0x54 0x43
//! ```
//!
//! The checksum is the low byte of the sum of every preceding byte. This
//! module provides the frame codec, a decoder for the readings the engine
//! consumes, and a latch that turns the reading stream into periodic samples.

mod frame;
mod latch;
mod reading;

pub use frame::*;
pub use latch::*;
pub use reading::*;
