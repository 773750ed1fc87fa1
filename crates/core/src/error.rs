use crate::types::DbId;

/// Domain errors shared by the store, the gateway and the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Unknown id, or an id owned by somebody else. The two cases are
    /// deliberately indistinguishable to the caller.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Rejected input (e.g. blank message content). Raised before any side effect.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A second exchange was attempted on a session that already has one in flight.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl CoreError {
    /// The `NotFound` error for a chat session id.
    pub fn session_not_found(id: DbId) -> Self {
        CoreError::NotFound {
            entity: "ChatSession",
            id,
        }
    }

    /// The `Conflict` error raised when a session already has an exchange in flight.
    pub fn exchange_in_flight(session_id: DbId) -> Self {
        CoreError::Conflict(format!(
            "Session {session_id} already has a reply in progress"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_names_entity_and_id() {
        let err = CoreError::session_not_found(7);
        assert_eq!(err.to_string(), "Entity not found: ChatSession with id 7");
    }

    #[test]
    fn exchange_in_flight_is_a_conflict() {
        let err = CoreError::exchange_in_flight(3);
        assert!(matches!(err, CoreError::Conflict(ref msg) if msg.contains("Session 3")));
    }
}
