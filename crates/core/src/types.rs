/// Identifier of a single script run.
pub type RunId = uuid::Uuid;

/// Identifier assigned to a browser WebSocket connection.
pub type ClientId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
