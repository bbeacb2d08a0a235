//! Event filtering seam for the output loop.

use std::collections::HashSet;
use std::sync::Arc;

use crate::event::{Event, RecordType};

pub trait EventFilter: Send + Sync {
    fn is_event_filtered(&self, event: &Event) -> bool;
}

/// Suppresses events carrying any of the configured record types.
pub struct RecordTypeFilter {
    types: HashSet<u32>,
}

impl RecordTypeFilter {
    pub fn from_names(names: &[String]) -> Result<RecordTypeFilter, String> {
        let mut types = HashSet::new();
        for name in names {
            let rtype = RecordType::from_name(name)
                .ok_or_else(|| format!("unknown record type in filter: {name}"))?;
            types.insert(rtype.0);
        }
        Ok(RecordTypeFilter { types })
    }
}

impl EventFilter for RecordTypeFilter {
    fn is_event_filtered(&self, event: &Event) -> bool {
        event.records().any(|record| self.types.contains(&record.rtype.0))
    }
}

/// A non-empty type list materializes the record-type filter.
pub fn create_event_filter(names: &[String]) -> Result<Option<Arc<dyn EventFilter>>, String> {
    if names.is_empty() {
        return Ok(None);
    }
    Ok(Some(Arc::new(RecordTypeFilter::from_names(names)?)))
}
