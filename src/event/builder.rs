//! Incremental event serialization into a reusable allocator buffer.

use super::event::{EVENT_HEADER_SIZE, EVENT_VERSION, RECORD_HEADER_SIZE};
use super::{EventId, RecordType};

/// Backing storage seam for [`EventBuilder`]: a resizable byte buffer whose
/// commit hands the finished frame downstream.
pub trait EventBuilderAllocator: Send {
    /// Ensure at least `size` bytes of backing buffer.
    fn allocate(&mut self, size: usize) -> Result<(), String>;
    /// The backing buffer, valid up to the last `allocate` size.
    fn data(&mut self) -> &mut [u8];
    /// Deliver the first `size` bytes of the buffer.
    fn commit(&mut self, size: usize) -> Result<(), String>;
    /// Discard the in-progress frame.
    fn rollback(&mut self);
}

pub struct EventBuilder {
    alloc: Box<dyn EventBuilderAllocator>,
    size: usize,
    in_event: bool,
    in_record: bool,
    fields_left: u16,
}

impl EventBuilder {
    pub fn new(alloc: Box<dyn EventBuilderAllocator>) -> EventBuilder {
        EventBuilder {
            alloc,
            size: 0,
            in_event: false,
            in_record: false,
            fields_left: 0,
        }
    }

    pub fn begin_event(&mut self, event_id: EventId, num_records: u16) -> Result<(), String> {
        if self.in_event {
            return Err("begin_event while an event is in progress".to_string());
        }
        self.alloc.allocate(EVENT_HEADER_SIZE)?;
        let data = self.alloc.data();
        data[0..4].copy_from_slice(&EVENT_VERSION.to_le_bytes());
        // Size is patched in end_event once the frame is complete.
        data[4..8].copy_from_slice(&0u32.to_le_bytes());
        data[8..12].copy_from_slice(&event_id.sec.to_le_bytes());
        data[12..16].copy_from_slice(&event_id.msec.to_le_bytes());
        data[16..24].copy_from_slice(&event_id.serial.to_le_bytes());
        data[24..26].copy_from_slice(&num_records.to_le_bytes());
        data[26..28].copy_from_slice(&0u16.to_le_bytes());
        self.size = EVENT_HEADER_SIZE;
        self.in_event = true;
        Ok(())
    }

    /// One record with no structured fields; the common case for raw audit
    /// text.
    pub fn add_record(&mut self, rtype: RecordType, name: &str, text: &[u8]) -> Result<(), String> {
        self.begin_record(rtype, name, text, 0)?;
        self.end_record()
    }

    pub fn begin_record(
        &mut self,
        rtype: RecordType,
        name: &str,
        text: &[u8],
        num_fields: u16,
    ) -> Result<(), String> {
        if !self.in_event {
            return Err("begin_record outside of an event".to_string());
        }
        if self.in_record {
            return Err("begin_record while a record is in progress".to_string());
        }
        if name.len() > u16::MAX as usize || text.len() > u32::MAX as usize {
            return Err(format!("record name or text too large in {rtype} record"));
        }
        let need = RECORD_HEADER_SIZE + name.len() + text.len();
        self.alloc.allocate(self.size + need)?;
        let mut off = self.size;
        let data = self.alloc.data();
        data[off..off + 4].copy_from_slice(&rtype.0.to_le_bytes());
        data[off + 4..off + 6].copy_from_slice(&num_fields.to_le_bytes());
        data[off + 6..off + 8].copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[off + 8..off + 12].copy_from_slice(&(text.len() as u32).to_le_bytes());
        off += RECORD_HEADER_SIZE;
        data[off..off + name.len()].copy_from_slice(name.as_bytes());
        off += name.len();
        data[off..off + text.len()].copy_from_slice(text);
        self.size += need;
        self.in_record = true;
        self.fields_left = num_fields;
        Ok(())
    }

    pub fn add_field(&mut self, name: &str, value: &str) -> Result<(), String> {
        if !self.in_record {
            return Err("add_field outside of a record".to_string());
        }
        if self.fields_left == 0 {
            return Err("more fields than declared for the record".to_string());
        }
        if name.len() > u16::MAX as usize || value.len() > u16::MAX as usize {
            return Err(format!("field {name} too large"));
        }
        let need = 4 + name.len() + value.len();
        self.alloc.allocate(self.size + need)?;
        let mut off = self.size;
        let data = self.alloc.data();
        data[off..off + 2].copy_from_slice(&(name.len() as u16).to_le_bytes());
        data[off + 2..off + 4].copy_from_slice(&(value.len() as u16).to_le_bytes());
        off += 4;
        data[off..off + name.len()].copy_from_slice(name.as_bytes());
        off += name.len();
        data[off..off + value.len()].copy_from_slice(value.as_bytes());
        self.size += need;
        self.fields_left -= 1;
        Ok(())
    }

    pub fn end_record(&mut self) -> Result<(), String> {
        if !self.in_record {
            return Err("end_record without begin_record".to_string());
        }
        if self.fields_left != 0 {
            return Err("fewer fields than declared for the record".to_string());
        }
        self.in_record = false;
        Ok(())
    }

    /// Patch the final size into the header and commit the frame.
    pub fn end_event(&mut self) -> Result<(), String> {
        if !self.in_event {
            return Err("end_event without begin_event".to_string());
        }
        if self.in_record {
            return Err("end_event with a record still in progress".to_string());
        }
        let size = self.size;
        let data = self.alloc.data();
        data[4..8].copy_from_slice(&(size as u32).to_le_bytes());
        self.in_event = false;
        self.size = 0;
        self.alloc.commit(size)
    }

    pub fn cancel_event(&mut self) {
        self.in_event = false;
        self.in_record = false;
        self.size = 0;
        self.alloc.rollback();
    }
}
