use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid {entity} record '{id}': {reason}")]
    InvalidRecord {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// The rent entry was written but its separate late fee entry was not.
    /// Carries the receipt so the recorded payment can still be audited.
    #[error("rent entry {} recorded but late payment fee entry failed: {reason}", .receipt.entry_id)]
    LateFeeNotRecorded {
        receipt: Box<crate::special_payment::PaymentReceipt>,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse error taxonomy surfaced to callers and batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any computation. Never retried.
    Validation,
    /// A referenced vehicle, lease, entry, or fine is absent.
    NotFound,
    /// Expected business outcome: no lease period contains the date.
    NoMatch,
    /// Backend failure, surfaced with the underlying message.
    Persistence,
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidRecord { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Database(_)
            | Self::Serialization(_)
            | Self::LateFeeNotRecorded { .. }
            | Self::Other(_) => ErrorKind::Persistence,
        }
    }
}

/// Why a traffic fine could not be attributed to a lease.
///
/// Expected outcomes (missing data, no matching period) are kept apart
/// from faults so the UI can explain the failure without parsing messages.
#[derive(Error, Debug)]
pub enum AssignmentError {
    #[error("Fine '{fine_id}' not found")]
    FineNotFound { fine_id: String },

    #[error("Fine '{fine_id}' has no license plate")]
    MissingLicensePlate { fine_id: String },

    #[error("Fine '{fine_id}' has no violation date")]
    MissingViolationDate { fine_id: String },

    #[error("No vehicle registered with plate '{plate}'")]
    VehicleNotFound { plate: String },

    #[error("Fine date {violation_date} is outside any lease period for vehicle '{vehicle_id}'")]
    NoMatchingLeasePeriod {
        vehicle_id: String,
        violation_date: chrono::NaiveDate,
    },

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl AssignmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingLicensePlate { .. } | Self::MissingViolationDate { .. } => {
                ErrorKind::Validation
            }
            Self::FineNotFound { .. } | Self::VehicleNotFound { .. } => ErrorKind::NotFound,
            Self::NoMatchingLeasePeriod { .. } => ErrorKind::NoMatch,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// True for business outcomes the back office is expected to see.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl From<CoreError> for AssignmentError {
    fn from(e: CoreError) -> Self {
        Self::Persistence(e.to_string())
    }
}
