//! Typed view over a stored shadow record.

use crate::schema::{
    ACTOR, CREATED_AT, ORIGIN, REASON, REJECT_REASON, REVIEW_STATUS, UPDATED_AT, ReviewStatus,
};
use chrono::{DateTime, Utc};
use redline_store::{Record, RecordId, Value};

/// One proposed edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowRecord {
    record: Record,
}

impl ShadowRecord {
    pub fn from_record(record: Record) -> Self {
        Self { record }
    }

    pub fn id(&self) -> &RecordId {
        &self.record.id
    }

    /// Shadow entity name.
    pub fn entity(&self) -> &str {
        &self.record.entity
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// Review status; `None` if the stored code is unknown.
    pub fn status(&self) -> Option<ReviewStatus> {
        match self.record.get(REVIEW_STATUS) {
            Value::Null => Some(ReviewStatus::Pending),
            value => value.as_integer().and_then(ReviewStatus::from_code),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Some(ReviewStatus::Pending)
    }

    pub(crate) fn set_status(&mut self, status: ReviewStatus) {
        self.record.set(REVIEW_STATUS, status.code());
    }

    pub fn origin_id(&self) -> Option<&RecordId> {
        self.record.get_ref(ORIGIN)
    }

    pub fn actor_id(&self) -> Option<&RecordId> {
        self.record.get_ref(ACTOR)
    }

    pub fn reason(&self) -> Option<&str> {
        self.record.get_text(REASON)
    }

    pub fn reject_reason(&self) -> &str {
        self.record.get_text(REJECT_REASON).unwrap_or("")
    }

    pub(crate) fn set_reject_reason(&mut self, reason: &str) {
        self.record.set(REJECT_REASON, reason);
    }

    pub fn created_at(&self) -> Option<&DateTime<Utc>> {
        self.record.get(CREATED_AT).as_timestamp()
    }

    pub fn updated_at(&self) -> Option<&DateTime<Utc>> {
        self.record.get(UPDATED_AT).as_timestamp()
    }

    pub fn get(&self, attribute: &str) -> &Value {
        self.record.get(attribute)
    }

    /// Change a value locally. Persist with `ReviewDesk::save_shadow`.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.record.set(attribute, value);
    }
}

impl From<Record> for ShadowRecord {
    fn from(record: Record) -> Self {
        Self::from_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_status_reads_pending() {
        let shadow = ShadowRecord::from_record(Record::new("EditSuggestionArticle"));
        assert_eq!(shadow.status(), Some(ReviewStatus::Pending));
        assert_eq!(shadow.reject_reason(), "");
    }

    #[test]
    fn test_status_setter_writes_code() {
        let mut shadow = ShadowRecord::from_record(Record::new("EditSuggestionArticle"));
        shadow.set_status(ReviewStatus::Rejected);
        assert_eq!(shadow.get(REVIEW_STATUS), &Value::Integer(2));
        assert!(!shadow.is_pending());
    }

    #[test]
    fn test_unknown_status_code() {
        let shadow = ShadowRecord::from_record(
            Record::new("EditSuggestionArticle").with(REVIEW_STATUS, 9i64),
        );
        assert_eq!(shadow.status(), None);
        assert!(!shadow.is_pending());
    }
}
