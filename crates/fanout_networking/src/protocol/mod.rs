//! # Snapshot Packet Protocol
//!
//! Bit-packed records written into one snapshot packet.
//!
//! ## Packet Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ NetTick        kind(6) tick(32) frametime(16) stddev(16)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Table update   (table-sync collaborator, optional)           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Entities       kind(6) delta(1) [from_tick(32)] body...      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Temp entities  kind(6) count(8) { class(16) len(8) data }    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Sounds         kind(6) reliable(1) count(8)? len(8|16) data  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Temp entity and sound records are omitted when empty.

mod decode;
mod entity;
mod sound;
mod temp_entities;
mod tick;

pub use decode::{DecodedPacket, PacketReader};
pub use entity::{write_entity_header, EntityChange, EntityRecord, PodEntityDelta};
pub use sound::{read_sound_batch, write_sound_batch, SoundBatch, SoundEvent};
pub use temp_entities::{read_temp_entities, write_temp_entities};
pub use tick::NetTick;

/// Width of the record kind field.
pub const RECORD_KIND_BITS: u8 = 6;

/// Record kinds carried in a snapshot packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Tick number and host frame timing.
    Tick = 3,
    /// Incremental table update.
    TableUpdate = 13,
    /// Sound event batch.
    Sounds = 17,
    /// Entity delta or full entity dump.
    Entities = 26,
    /// Temp entity batch.
    TempEntities = 27,
}

impl RecordKind {
    /// Decodes a kind field.
    #[must_use]
    pub const fn from_bits(value: u32) -> Option<Self> {
        match value {
            3 => Some(Self::Tick),
            13 => Some(Self::TableUpdate),
            17 => Some(Self::Sounds),
            26 => Some(Self::Entities),
            27 => Some(Self::TempEntities),
            _ => None,
        }
    }

    /// Writes the kind field.
    #[inline]
    pub fn write(self, buf: &mut fanout_core::BitWriter) -> bool {
        buf.write_bits(self as u32, RECORD_KIND_BITS)
    }
}
