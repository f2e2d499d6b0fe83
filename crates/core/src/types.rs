/// Every generation request is addressed by a UUID v4 session id.
pub type SessionId = uuid::Uuid;

/// Authenticated principal id, as issued by the external auth provider.
pub type PrincipalId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh session id.
pub fn new_session_id() -> SessionId {
    uuid::Uuid::new_v4()
}
