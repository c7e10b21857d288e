use super::*;
use crate::domain::{ClientKey, EntryStatus, OperationClass, Position, RateLimitKey};
use chrono::Utc;
use rstest::rstest;

#[rstest]
#[case(EmailTemplate::Verification, "waitlist-verification")]
#[case(EmailTemplate::Invitation, "waitlist-invitation")]
fn template_ids_are_stable(#[case] template: EmailTemplate, #[case] expected: &str) {
    assert_eq!(template.id(), expected);
}

#[test]
fn infrastructure_failures_are_transient() {
    assert!(PositionStoreError::connection("timeout").is_transient());
    assert!(WaitlistRepositoryError::query("syntax").is_transient());
    assert!(VerificationTokenRepositoryError::connection("reset").is_transient());
    assert!(EmailSendError::transport("dns").is_transient());
}

#[test]
fn domain_conflicts_are_not_transient() {
    assert!(!PositionStoreError::duplicate_email().is_transient());
    assert!(!PositionStoreError::position_conflict(Position::FIRST).is_transient());
    assert!(!WaitlistRepositoryError::status_conflict(EntryStatus::Invited).is_transient());
    assert!(!EmailSendError::rejected(422_u16, "bad template").is_transient());
}

#[test]
fn conflict_messages_name_the_state() {
    let err = PositionStoreError::status_conflict(EntryStatus::Blocked);
    assert_eq!(err.to_string(), "entry status is now blocked");
}

#[tokio::test]
async fn noop_events_accept_everything() {
    let sink = NoOpRateLimitEvents;
    let key = RateLimitKey::new(ClientKey::anonymous(), OperationClass::Join);
    let event = AbuseEvent {
        key,
        count: 11,
        limit: 5,
        window_start: Utc::now(),
    };
    assert!(sink.record_denied(OperationClass::Join).await.is_ok());
    assert!(sink.record_abuse(&event).await.is_ok());
}

#[test]
fn list_query_defaults_to_active_first_page() {
    let query = ListQuery::default();
    assert_eq!((query.offset, query.limit, query.include_inactive), (0, 50, false));
}
