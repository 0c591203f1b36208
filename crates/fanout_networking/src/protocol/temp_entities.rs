//! # Temp Entity Records

use fanout_core::{BitReader, BitWriter, TempEntity};

use super::RecordKind;

/// Writes a temp entity record, kind included.
///
/// At most 255 records fit the count field; callers cap before writing.
pub fn write_temp_entities(buf: &mut BitWriter, events: &[TempEntity]) -> bool {
    let Ok(count) = u8::try_from(events.len()) else {
        buf.set_overflowed();
        return false;
    };

    if !(RecordKind::TempEntities.write(buf) && buf.write_u8(count)) {
        return false;
    }

    events.iter().all(|event| {
        // Payload length is bounded by TempEntity::new
        let len = u8::try_from(event.payload().len()).unwrap_or(u8::MAX);
        buf.write_u16(event.class_id())
            && buf.write_u8(len)
            && buf.write_bytes(&event.payload()[..usize::from(len)])
    })
}

/// Reads a temp entity record body (kind already consumed).
pub fn read_temp_entities(reader: &mut BitReader<'_>) -> Option<Vec<TempEntity>> {
    let count = reader.read_u8()?;
    (0..count)
        .map(|_| {
            let class_id = reader.read_u16()?;
            let len = reader.read_u8()?;
            let payload = reader.read_bytes(usize::from(len))?;
            TempEntity::new(class_id, payload).ok()
        })
        .collect()
}
