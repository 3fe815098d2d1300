//! Crate error type.

use thiserror::Error;

/// Errors produced by the bandit, its registry and the reward computor.
///
/// Staleness and drift are not errors: they are housekeeping outcomes reported
/// through [`crate::SweepReport`] and [`crate::ApplyReport`].
#[derive(Error, Debug)]
pub enum Error {
    /// Selection was requested for a channel with no registered, active arms
    /// of the requested type.
    #[error("no {arm_type} arms available for channel `{channel}`")]
    NoArmsAvailable {
        channel: String,
        arm_type: crate::ArmType,
    },

    /// A guarded operation was attempted before its precondition held
    /// (e.g. manual deactivation below the pull floor).
    #[error("precondition violated for arm `{key}`: {reason}")]
    PrecondViolation { key: String, reason: String },

    /// An analytics sample or reward value could not be scored.
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// The arm key is not registered.
    #[error("unknown arm `{0}`")]
    UnknownArm(String),

    /// The text form of an arm key did not parse. Expected
    /// `channel__voice__format__thumbnail` or `channel__type__variant`.
    #[error("invalid arm key `{0}`")]
    InvalidArmKey(String),

    #[error("unknown arm type `{0}`")]
    UnknownArmType(String),

    /// Configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// An internal lock was poisoned by a panicking thread.
    #[error("bandit lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}
