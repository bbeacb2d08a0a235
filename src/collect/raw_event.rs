//! Assembly buffer for one in-flight event.
//!
//! The kernel splits long EXECVE argument vectors across many records, so the
//! EXECVE fragments are kept in their own list with bounded retention; at emit
//! time the whole group is written at the position the first fragment arrived.

use std::collections::BTreeMap;

use crate::event::{EventBuilder, EventId, RecordType};

use super::record::RawEventRecord;

/// Size and retention ceilings for event assembly; set from config.
#[derive(Debug, Clone)]
pub struct AccumulatorLimits {
    pub max_event_size: usize,
    pub max_execve_accum_size: usize,
    pub max_num_execve_records: usize,
    pub num_execve_rh_preserve: usize,
    pub max_cache_entry: usize,
}

impl Default for AccumulatorLimits {
    fn default() -> AccumulatorLimits {
        AccumulatorLimits {
            max_event_size: 112 * 1024,
            max_execve_accum_size: 80 * 1024,
            max_num_execve_records: 16,
            num_execve_rh_preserve: 3,
            max_cache_entry: 256,
        }
    }
}

pub struct RawEvent {
    event_id: EventId,
    records: Vec<RawEventRecord>,
    execve_records: Vec<RawEventRecord>,
    // Position in `records` order where the execve group is emitted.
    execve_marker: Option<usize>,
    syscall_idx: Option<usize>,
    size: usize,
    execve_size: usize,
    num_execve_seen: u32,
    num_dropped_records: u32,
    drop_count: BTreeMap<RecordType, u64>,
}

impl RawEvent {
    pub fn new(event_id: EventId) -> RawEvent {
        RawEvent {
            event_id,
            records: Vec::new(),
            execve_records: Vec::new(),
            execve_marker: None,
            syscall_idx: None,
            size: 0,
            execve_size: 0,
            num_execve_seen: 0,
            num_dropped_records: 0,
            drop_count: BTreeMap::new(),
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Absorb one record. Returns `true` when the event is complete and must
    /// be emitted.
    pub fn add_record(&mut self, record: RawEventRecord, limits: &AccumulatorLimits) -> bool {
        let rtype = record.record_type();

        // EOE only signals completion; it is never stored.
        if rtype == RecordType::EOE {
            return true;
        }

        if rtype == RecordType::EXECVE {
            self.num_execve_seen += 1;
            if self.num_execve_seen == 1 {
                self.execve_marker = Some(self.records.len());
            } else if record.size() + self.size > limits.max_event_size
                || record.size() + self.execve_size > limits.max_execve_accum_size
                || self.num_execve_seen as usize > limits.max_num_execve_records
            {
                // Make room by dropping one retained fragment, keeping the
                // rightmost `num_execve_rh_preserve` (the tail arguments).
                self.num_dropped_records += 1;
                *self.drop_count.entry(rtype).or_insert(0) += 1;
                if !self.execve_records.is_empty() {
                    let mut idx = 0;
                    if self.execve_records.len() > limits.num_execve_rh_preserve {
                        idx = self.execve_records.len() - limits.num_execve_rh_preserve - 1;
                    }
                    let dropped = self.execve_records.remove(idx);
                    self.size -= dropped.size();
                    self.execve_size -= dropped.size();
                }
            }
            self.size += record.size();
            self.execve_size += record.size();
            self.execve_records.push(record);
            return false;
        }

        if record.size() + self.size > limits.max_event_size
            || self.num_execve_seen as usize > limits.max_num_execve_records
        {
            self.num_dropped_records += 1;
            *self.drop_count.entry(rtype).or_insert(0) += 1;
        } else {
            self.size += record.size();
            self.records.push(record);
            if rtype == RecordType::SYSCALL && self.syscall_idx.is_none() {
                self.syscall_idx = Some(self.records.len() - 1);
            }
        }

        rtype.is_single_record()
    }

    /// Emit the assembled event: SYSCALL first, the rest in arrival order
    /// with the execve group at its marker, then the drop summary.
    pub fn add_event(&mut self, builder: &mut EventBuilder) -> Result<(), String> {
        if self.records.is_empty() && self.execve_records.is_empty() && self.num_dropped_records == 0
        {
            return Ok(());
        }

        let mut num_records = (self.records.len() + self.execve_records.len()) as u16;
        if self.num_dropped_records > 0 && !self.drop_count.is_empty() {
            num_records += 1;
        }
        builder.begin_event(self.event_id, num_records)?;

        if let Err(e) = self.emit_records(builder) {
            builder.cancel_event();
            return Err(e);
        }

        builder.end_event()
    }

    fn emit_records(&self, builder: &mut EventBuilder) -> Result<(), String> {
        if let Some(idx) = self.syscall_idx {
            self.records[idx].append_to(builder)?;
        }
        for i in 0..=self.records.len() {
            if self.execve_marker == Some(i) {
                for record in &self.execve_records {
                    record.append_to(builder)?;
                }
            }
            if i < self.records.len() && self.syscall_idx != Some(i) {
                self.records[i].append_to(builder)?;
            }
        }
        if self.num_dropped_records > 0 && !self.drop_count.is_empty() {
            builder.begin_record(
                RecordType::DROPPED_RECORDS,
                "DROPPED_RECORDS",
                b"",
                self.drop_count.len() as u16,
            )?;
            for (rtype, count) in &self.drop_count {
                builder.add_field(&rtype.to_string(), &count.to_string())?;
            }
            builder.end_record()?;
        }
        Ok(())
    }
}
