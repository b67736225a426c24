use std::collections::HashMap;

use crate::types::CallRecord;

/// Calls found so far, keyed by normalized Call-ID.
///
/// Iteration follows the order in which calls were first committed.
#[derive(Debug, Default, Clone)]
pub struct CallIndex {
    records: HashMap<String, CallRecord>,
    order: Vec<String>,
}

impl CallIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.records.contains_key(call_id)
    }

    pub fn get(&self, call_id: &str) -> Option<&CallRecord> {
        self.records.get(call_id)
    }

    pub fn get_or_create(&mut self, call_id: &str) -> &mut CallRecord {
        if !self.records.contains_key(call_id) {
            self.order.push(call_id.to_owned());
        }
        self.records
            .entry(call_id.to_owned())
            .or_insert_with(|| CallRecord::new(call_id))
    }

    pub fn remove(&mut self, call_id: &str) -> Option<CallRecord> {
        let removed = self.records.remove(call_id)?;
        self.order.retain(|id| id != call_id);
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn into_records(mut self) -> Vec<CallRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect()
    }
}
