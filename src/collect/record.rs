//! One textual auditd record plus the identifier of the event it belongs to.

use crate::event::{EventBuilder, EventId, RecordType};

#[derive(Debug, Clone)]
pub struct RawEventRecord {
    rtype: RecordType,
    event_id: EventId,
    text: String,
}

impl RawEventRecord {
    pub fn new(rtype: RecordType, event_id: EventId, text: String) -> RawEventRecord {
        RawEventRecord {
            rtype,
            event_id,
            text,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.rtype
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn size(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse the auditd line format
    /// `type=NAME msg=audit(sec.msec:serial): body`.
    pub fn parse(line: &str) -> Option<RawEventRecord> {
        let rest = line.trim_start().strip_prefix("type=")?;
        let (name, rest) = rest.split_once(' ')?;
        let rtype = RecordType::from_name(name)?;
        let rest = rest.trim_start().strip_prefix("msg=audit(")?;
        let (stamp, body) = rest.split_once("):")?;
        let (ts, serial) = stamp.split_once(':')?;
        let (sec, msec) = ts.split_once('.')?;
        let event_id = EventId::new(
            sec.parse().ok()?,
            msec.parse().ok()?,
            serial.parse().ok()?,
        );
        Some(RawEventRecord::new(
            rtype,
            event_id,
            body.trim_start().to_string(),
        ))
    }

    /// Serialize this record into the in-progress event.
    pub fn append_to(&self, builder: &mut EventBuilder) -> Result<(), String> {
        builder.add_record(self.rtype, &self.rtype.to_string(), self.text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_syscall_line() {
        let line = "type=SYSCALL msg=audit(1700000000.123:456): arch=c000003e syscall=59 success=yes";
        let record = RawEventRecord::parse(line).unwrap();
        assert_eq!(record.record_type(), RecordType::SYSCALL);
        assert_eq!(record.event_id(), EventId::new(1700000000, 123, 456));
        assert_eq!(record.text(), "arch=c000003e syscall=59 success=yes");
        assert!(!record.is_empty());
    }

    #[test]
    fn parses_eoe_line_with_empty_body() {
        let record = RawEventRecord::parse("type=EOE msg=audit(1700000000.123:456): ").unwrap();
        assert_eq!(record.record_type(), RecordType::EOE);
        assert!(record.is_empty());
    }

    #[test]
    fn parses_unknown_numeric_type() {
        let record =
            RawEventRecord::parse("type=UNKNOWN[1329] msg=audit(1.2:3): prog-id=45 op=LOAD")
                .unwrap();
        assert_eq!(record.record_type(), RecordType(1329));
    }

    #[test]
    fn rejects_garbage() {
        assert!(RawEventRecord::parse("").is_none());
        assert!(RawEventRecord::parse("not an audit line").is_none());
        assert!(RawEventRecord::parse("type=SYSCALL msg=audit(oops): x").is_none());
        assert!(RawEventRecord::parse("type=NOT_A_TYPE msg=audit(1.2:3): x").is_none());
    }
}
