//! Error taxonomy for registry operations
//!
//! Every fallible operation in the registry surfaces a [`RegistryError`].
//! Transports map errors to status codes through [`RegistryError::kind`];
//! nothing anywhere branches on message text.

use thiserror::Error;

use crate::types::SchemaId;

/// Result type alias using the registry error type
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Broad error category, used by transports to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller bug; retrying the same request cannot succeed
    Validation,
    /// The addressed entity does not exist
    NotFound,
    /// The entity exists but is in the wrong phase of the two-phase delete
    DeleteState,
    /// The request lost to an existing state; the caller must redesign
    Conflict,
    /// The operation is not admitted under the current mode or context
    Policy,
    /// Storage or invariant failure; not the caller's fault
    Internal,
}

/// Main error type for schema registry operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Schema text failed to parse or validate
    #[error("invalid schema: {reason}")]
    InvalidSchema { reason: String },

    /// Unknown schema type string
    #[error("invalid schema type: {0}")]
    InvalidSchemaType(String),

    /// Version outside the accepted range or unparsable
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Unknown mode string
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Unknown compatibility level string
    #[error("invalid compatibility level: {0}")]
    InvalidCompatibilityLevel(String),

    /// No schema matching the id or lookup request in the context
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    /// No subject with this name in the context
    #[error("subject '{0}' not found")]
    SubjectNotFound(String),

    /// Subject exists but has no such version
    #[error("version {version} of subject '{subject}' not found")]
    VersionNotFound { subject: String, version: u32 },

    /// All versions of the subject are soft-deleted
    #[error("subject '{0}' is soft-deleted")]
    SubjectDeleted(String),

    /// Permanent subject delete requires a prior soft delete
    #[error("subject '{0}' was not soft-deleted first")]
    SubjectNotSoftDeleted(String),

    /// Permanent version delete requires a prior soft delete
    #[error("version {version} of subject '{subject}' was not soft-deleted first")]
    VersionNotSoftDeleted { subject: String, version: u32 },

    /// The candidate schema breaks the effective compatibility level
    #[error("schema is incompatible with an earlier version")]
    Incompatible { messages: Vec<String> },

    /// A concurrent writer claimed the id or version slot first
    #[error("version {version} of subject '{subject}' already exists")]
    VersionConflict { subject: String, version: u32 },

    /// Import tried to bind an id that holds a different schema
    #[error("schema id {0} already holds a different schema")]
    ImportIdConflict(SchemaId),

    /// Permanent delete refused while other schemas reference the version
    #[error("version {version} of subject '{subject}' is referenced by other schemas")]
    ReferenceExists { subject: String, version: u32 },

    /// The identical schema is already registered in the subject
    #[error("schema already registered in subject '{subject}' with id {id}")]
    SchemaExists { subject: String, id: SchemaId },

    /// Mode or reserved-context policy blocked the operation
    #[error("operation not permitted: {0}")]
    OperationNotPermitted(String),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Broken invariant or other unexpected condition
    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Category of this error, for status-code mapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::InvalidSchema { .. }
            | RegistryError::InvalidSchemaType(_)
            | RegistryError::InvalidVersion(_)
            | RegistryError::InvalidMode(_)
            | RegistryError::InvalidCompatibilityLevel(_) => ErrorKind::Validation,

            RegistryError::SchemaNotFound(_)
            | RegistryError::SubjectNotFound(_)
            | RegistryError::VersionNotFound { .. } => ErrorKind::NotFound,

            RegistryError::SubjectDeleted(_)
            | RegistryError::SubjectNotSoftDeleted(_)
            | RegistryError::VersionNotSoftDeleted { .. } => ErrorKind::DeleteState,

            RegistryError::Incompatible { .. }
            | RegistryError::VersionConflict { .. }
            | RegistryError::ImportIdConflict(_)
            | RegistryError::ReferenceExists { .. }
            | RegistryError::SchemaExists { .. } => ErrorKind::Conflict,

            RegistryError::OperationNotPermitted(_) => ErrorKind::Policy,

            RegistryError::Storage(_) | RegistryError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if the error is a not-found error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if the error is a conflict the caller must redesign around
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Shorthand for an [`RegistryError::InvalidSchema`]
    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        RegistryError::InvalidSchema {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_taxonomy() {
        assert_eq!(
            RegistryError::invalid_schema("bad").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            RegistryError::SchemaNotFound("id 7".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RegistryError::SubjectNotSoftDeleted("s".into()).kind(),
            ErrorKind::DeleteState
        );
        assert_eq!(
            RegistryError::ImportIdConflict(42).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            RegistryError::OperationNotPermitted("read-only".into()).kind(),
            ErrorKind::Policy
        );
        assert_eq!(
            RegistryError::Storage("down".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn incompatible_keeps_diagnostics() {
        let err = RegistryError::Incompatible {
            messages: vec!["field 'id' removed".into()],
        };
        assert!(err.is_conflict());
        match err {
            RegistryError::Incompatible { messages } => assert_eq!(messages.len(), 1),
            _ => unreachable!(),
        }
    }
}
