//! # Bit Buffers
//!
//! Bit-oriented serialization for snapshot packets.
//!
//! ## Overflow Model
//!
//! ```text
//! ┌────────────────────────── capacity ──────────────────────────┐
//! │ NetTick │ tables │ entity delta │ temp ents │ sounds │ ░░░░░░ │
//! └──────────────────────────────────────────────────────────────┘
//!                                                  ▲
//!                         first write that does not fit sets the
//!                         sticky overflow flag; later writes no-op
//! ```
//!
//! Bits are packed LSB-first within each byte.

mod reader;
mod writer;

pub use reader::BitReader;
pub use writer::BitWriter;
