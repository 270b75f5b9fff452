//! Error types for the Lovelee couple core.

use thiserror::Error;

/// A precondition attached to a batched write that did not hold at commit time.
///
/// The whole batch is discarded when any of its operations reports one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteConflict {
    #[error("{collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    #[error("{collection}/{id} does not exist")]
    Missing { collection: String, id: String },

    #[error("{collection}/{id} is at version {actual}, expected {expected}")]
    VersionMismatch {
        collection: String,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("{collection}/{id}.{field} would become {attempted}, below the floor of {floor}")]
    BelowFloor {
        collection: String,
        id: String,
        field: String,
        floor: i64,
        attempted: i64,
    },

    #[error("{collection}/{id}.{field} is not an integer")]
    NotAnInteger {
        collection: String,
        id: String,
        field: String,
    },
}

/// The shared error type for the couple core.
///
/// Validation failures of the pairing protocol and the economy each get their
/// own variant so UI code can distinguish them by [`LoveleeError::code`].
#[derive(Error, Debug, Clone)]
pub enum LoveleeError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The invite code does not belong to any profile
    #[error("Invalid invite code: '{0}'")]
    InvalidInviteCode(String),

    /// The caller entered their own invite code
    #[error("You cannot pair with yourself")]
    SelfPairing,

    /// The invite code owner is already part of a couple
    #[error("This person is already paired with someone else")]
    PartnerAlreadyPaired,

    /// The caller is already part of a couple
    #[error("You are already paired")]
    CallerAlreadyPaired,

    /// The user has no couple to act on
    #[error("User '{0}' is not paired")]
    NotPaired(String),

    /// The user does not belong to the couple named in the request
    #[error("User '{user_id}' is not a member of couple '{couple_id}'")]
    NotCoupleMember { couple_id: String, user_id: String },

    /// Not enough hearts for a purchase or gift
    #[error("Insufficient hearts: {required} required, {available} available")]
    InsufficientHearts { required: i64, available: i64 },

    /// Input rejected before touching storage
    #[error("Validation error: {0}")]
    Validation(String),

    /// A batched write precondition failed
    #[error("Write conflict: {0}")]
    Conflict(#[from] WriteConflict),

    /// Optimistic retries were exhausted on a contended document
    #[error("Concurrent modification of {entity_type} '{id}' after {attempts} attempts")]
    ConcurrentModification {
        entity_type: &'static str,
        id: String,
        attempts: u32,
    },

    /// No free invite code was found within the configured attempts
    #[error("Could not allocate a unique invite code after {0} attempts")]
    InviteCodeExhausted(u32),

    /// Data access error (store/backend layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LoveleeError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a version mismatch, i.e. the operation may succeed on retry
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::Conflict(WriteConflict::VersionMismatch { .. }))
    }

    /// Check if this is a floor violation raised by a rejecting increment
    pub fn is_below_floor(&self) -> bool {
        matches!(self, Self::Conflict(WriteConflict::BelowFloor { .. }))
    }

    /// Check if this is a create-collision
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Conflict(WriteConflict::AlreadyExists { .. }))
    }

    /// Stable reason code surfaced to UI callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::InvalidInviteCode(_) => "InvalidInviteCode",
            Self::SelfPairing => "SelfPairing",
            Self::PartnerAlreadyPaired => "PartnerAlreadyPaired",
            Self::CallerAlreadyPaired => "CallerAlreadyPaired",
            Self::NotPaired(_) => "NotPaired",
            Self::NotCoupleMember { .. } => "NotCoupleMember",
            Self::InsufficientHearts { .. } => "InsufficientHearts",
            Self::Validation(_) => "Validation",
            Self::Conflict(_) => "Conflict",
            Self::ConcurrentModification { .. } => "ConcurrentModification",
            Self::InviteCodeExhausted(_) => "InviteCodeExhausted",
            Self::DataAccess(_) => "DataAccess",
            Self::Io { .. } => "Io",
            Self::Serialization { .. } => "Serialization",
            Self::Config(_) => "Config",
            Self::Internal(_) => "Internal",
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for LoveleeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for LoveleeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for LoveleeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for LoveleeError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, LoveleeError>`.
pub type Result<T> = std::result::Result<T, LoveleeError>;
