//! # Snapshot Frame Contents
//!
//! What the simulation hands to the store once per tick.

use bytemuck::{Pod, Zeroable};

use super::error::{StoreError, StoreResult};

/// Host frame timing sent with every packet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickTiming {
    /// Unbounded host frame time in seconds.
    pub host_frametime: f32,
    /// Standard deviation of the host frame time in seconds.
    pub host_frametime_stddev: f32,
}

/// Entity state in a snapshot.
///
/// Fixed-size so that whole records can be compared and copied as bytes.
///
/// Size: 28 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EntityState {
    /// Entity index.
    pub entity_id: u32,
    /// Network class of the entity.
    pub class_id: u16,
    /// Effect/state flags.
    pub flags: u16,
    /// Origin in fixed-point world units.
    pub origin: [i32; 3],
    /// Pitch/yaw/roll, packed.
    pub angles: [i16; 3],
    /// Health.
    pub health: u16,
}

impl EntityState {
    /// Size in bytes.
    pub const SIZE: usize = 28;

    /// Creates an entity at the origin.
    #[must_use]
    pub const fn new(entity_id: u32, class_id: u16) -> Self {
        Self {
            entity_id,
            class_id,
            flags: 0,
            origin: [0; 3],
            angles: [0; 3],
            health: 0,
        }
    }
}

/// Short-lived world event included in a packet for one tick only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempEntity {
    class_id: u16,
    payload: Vec<u8>,
}

impl TempEntity {
    /// Largest payload that fits the 8-bit length field.
    pub const MAX_PAYLOAD: usize = u8::MAX as usize;

    /// Creates a temp entity record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TempEntityTooLarge`] if the payload is longer
    /// than [`TempEntity::MAX_PAYLOAD`].
    pub fn new(class_id: u16, payload: impl Into<Vec<u8>>) -> StoreResult<Self> {
        let payload = payload.into();
        if payload.len() > Self::MAX_PAYLOAD {
            return Err(StoreError::TempEntityTooLarge {
                len: payload.len(),
                max: Self::MAX_PAYLOAD,
            });
        }
        Ok(Self { class_id, payload })
    }

    /// Network class of the event.
    #[inline]
    #[must_use]
    pub const fn class_id(&self) -> u16 {
        self.class_id
    }

    /// Opaque event payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Everything captured for one tick.
#[derive(Clone, Debug, Default)]
pub struct SnapshotFrame {
    /// Host frame timing for the tick record.
    pub timing: TickTiming,
    /// Entities visible in this tick.
    pub entities: Vec<EntityState>,
    /// Temp entities produced during this tick.
    pub temp_entities: Vec<TempEntity>,
}

impl SnapshotFrame {
    /// Creates a frame with only entity states.
    #[must_use]
    pub fn with_entities(entities: Vec<EntityState>) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_state_size() {
        assert_eq!(std::mem::size_of::<EntityState>(), EntityState::SIZE);
    }

    #[test]
    fn test_temp_entity_payload_limit() {
        assert!(TempEntity::new(1, vec![0u8; 255]).is_ok());
        assert_eq!(
            TempEntity::new(1, vec![0u8; 256]),
            Err(StoreError::TempEntityTooLarge { len: 256, max: 255 })
        );
    }
}
