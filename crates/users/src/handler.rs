//! User event handlers.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use redelivery_core::RecordEnvelope;
use redelivery_engine::{DeadLetterHandler, RecordHandler};
use redelivery_log::CodecError;

use crate::denylist::IpDenylist;
use crate::user::User;

/// Accepts user events unless they come from a denylisted address.
#[derive(Debug, Clone, Default)]
pub struct UserEventHandler {
    denylist: IpDenylist,
}

impl UserEventHandler {
    pub fn new(denylist: IpDenylist) -> Self {
        Self { denylist }
    }

    pub fn denylist(&self) -> &IpDenylist {
        &self.denylist
    }
}

impl RecordHandler<User> for UserEventHandler {
    fn handle(&self, record: &RecordEnvelope<User>) -> anyhow::Result<()> {
        let user = record.payload();
        info!(
            user_id = user.id,
            email = %user.email,
            topic = record.received_topic(),
            offset = record.offset(),
            attempt = record.attempt(),
            "user event received"
        );
        self.denylist.validate(user)?;
        Ok(())
    }
}

/// A dead-lettered user kept for manual review.
///
/// `user` is `None` when the payload could not be decoded; `raw_payload` and
/// `decode_error` then describe what arrived instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetteredUser {
    pub record_id: String,
    pub user: Option<User>,
    pub raw_payload: Option<String>,
    pub decode_error: Option<String>,
    pub original_topic: String,
    pub original_offset: u64,
    pub dead_letter_topic: String,
    pub dead_letter_offset: u64,
    pub attempts: u32,
    pub failed_topic: Option<String>,
    pub reason: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Logs dead-lettered users and keeps them in an in-memory review list.
///
/// Clones share the same review list.
#[derive(Debug, Clone, Default)]
pub struct UserDeadLetterHandler {
    review: Arc<Mutex<Vec<DeadLetteredUser>>>,
}

impl UserDeadLetterHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users awaiting review, oldest first.
    pub fn review_list(&self) -> Vec<DeadLetteredUser> {
        self.review.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn entry<P>(record: &RecordEnvelope<P>) -> DeadLetteredUser {
        let exception = record.exception();
        DeadLetteredUser {
            record_id: record.record_id().to_string(),
            user: None,
            raw_payload: None,
            decode_error: None,
            original_topic: record.original_topic().to_string(),
            original_offset: record.original_offset(),
            dead_letter_topic: record.received_topic().to_string(),
            dead_letter_offset: record.offset(),
            attempts: record.attempts_made(),
            failed_topic: exception.map(|e| e.topic.clone()),
            reason: exception.map(|e| e.message.clone()),
            received_at: Utc::now(),
        }
    }

    fn push(&self, entry: DeadLetteredUser) -> anyhow::Result<()> {
        self.review
            .lock()
            .map_err(|_| anyhow::anyhow!("review list lock poisoned"))?
            .push(entry);
        Ok(())
    }
}

impl DeadLetterHandler<User> for UserDeadLetterHandler {
    fn handle_dead_letter(&self, record: &RecordEnvelope<User>) -> anyhow::Result<()> {
        let user = record.payload();
        let exception = record.exception();

        warn!(
            user_id = user.id,
            email = %user.email,
            ip_address = %user.ip_address,
            topic = record.received_topic(),
            offset = record.offset(),
            attempts = record.attempts_made(),
            reason = exception.map(|e| e.message.as_str()).unwrap_or_default(),
            "user dead-lettered; queued for review"
        );

        let mut entry = Self::entry(record);
        entry.user = Some(user.clone());
        self.push(entry)
    }

    fn handle_undecodable(
        &self,
        record: &RecordEnvelope<Vec<u8>>,
        error: &CodecError,
    ) -> anyhow::Result<()> {
        let raw = String::from_utf8_lossy(record.payload()).into_owned();
        warn!(
            record_id = %record.record_id(),
            topic = record.received_topic(),
            offset = record.offset(),
            attempts = record.attempts_made(),
            error = %error,
            "undecodable user dead-lettered; queued for review"
        );

        let mut entry = Self::entry(record);
        entry.raw_payload = Some(raw);
        entry.decode_error = Some(error.to_string());
        self.push(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denylist::RestrictedIp;

    fn envelope(ip: &str) -> RecordEnvelope<User> {
        RecordEnvelope::new(
            "user-events",
            Some("1".into()),
            User {
                id: 1,
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: "grace@example.com".into(),
                gender: "Female".into(),
                ip_address: ip.into(),
            },
        )
    }

    #[test]
    fn denylisted_address_fails_with_restricted_ip() {
        let handler = UserEventHandler::default();

        let err = handler.handle(&envelope("81.1.95.253")).unwrap_err();
        assert!(err.downcast_ref::<RestrictedIp>().is_some());
        assert!(handler.handle(&envelope("192.168.1.1")).is_ok());
    }

    #[test]
    fn dead_letters_land_in_shared_review_list() {
        let handler = UserDeadLetterHandler::new();
        let view = handler.clone();

        handler.handle_dead_letter(&envelope("81.1.95.253")).unwrap();

        let review = view.review_list();
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].user.as_ref().unwrap().ip_address, "81.1.95.253");
        assert_eq!(review[0].attempts, 1);
        assert_eq!(review[0].reason, None);
    }

    #[test]
    fn undecodable_dead_letters_are_queued_with_raw_payload() {
        let handler = UserDeadLetterHandler::new();
        let record = RecordEnvelope::new("user-events", None, b"{\"id\": \"x\"}".to_vec());
        let error = CodecError::Decode("invalid type: string".into());

        handler.handle_undecodable(&record, &error).unwrap();

        let review = handler.review_list();
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].user, None);
        assert_eq!(review[0].raw_payload.as_deref(), Some("{\"id\": \"x\"}"));
        assert_eq!(
            review[0].decode_error.as_deref(),
            Some("failed to decode payload: invalid type: string")
        );
    }
}
