//! Diesel table definitions for the PostgreSQL schema.
//!
//! These must match `backend/migrations` exactly; `diesel print-schema`
//! regenerates them from a migrated database.

diesel::table! {
    /// Queue serialisation counter. Holds exactly one row (`id = 1`).
    waitlist_queue_state (id) {
        id -> Int2,
        /// Bumped by every position-mutating transaction.
        version -> Int8,
    }
}

diesel::table! {
    /// Waitlist entries. Rows are never hard deleted.
    waitlist_entries (id) {
        id -> Uuid,
        /// Normalised email; unique among non-deleted rows.
        email -> Varchar,
        /// Queue slot, meaningful while the status is pending or verified.
        position -> Int4,
        /// Lower-case lifecycle state.
        status -> Varchar,
        referral_code -> Varchar,
        referred_by -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Outstanding verification tokens keyed by SHA-256 digest.
    verification_tokens (digest) {
        /// Hex-encoded digest of the raw token.
        digest -> Varchar,
        email -> Varchar,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(waitlist_entries, verification_tokens);
