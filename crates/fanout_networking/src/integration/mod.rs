//! # Integration Layer
//!
//! Seams between the broadcast pipeline and the rest of the server.
//!
//! ```text
//! Pipeline defines:        Host implements:
//! ┌───────────────────┐    ┌──────────────────────┐
//! │ EntityDeltaWriter │ ←─ │ entity serializer    │
//! │ TableSync         │ ←─ │ string table manager │
//! │ Transport         │ ←─ │ net channel          │
//! └───────────────────┘    └──────────────────────┘
//! ```

pub mod traits;

pub use traits::*;
