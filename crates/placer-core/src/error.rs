// crates/placer-core/src/error.rs

use thiserror::Error;

use crate::address::Address;

/// Engine-wide error types for Placer.
///
/// Every error aborts the enclosing call; the engine never retries
/// internally. Whether a failed call is retried is the host's decision.
#[derive(Debug, Error)]
pub enum PlacerError {
    /// Rejected construction parameters. Fatal, raised once at setup.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Lock attempt below the configured minimum stake.
    #[error("Deposit of {amount} is below the minimum stake of {minimum}")]
    BelowMinimumStake { amount: u64, minimum: u64 },

    /// Lock attempt from a new participant once the cap is reached.
    #[error("Participant cap of {0} reached")]
    CapacityExceeded(u32),

    /// Withdrawal attempted before the minimum lock duration elapsed.
    #[error("Deposit locked until height {unlock_height}")]
    StillLocked { unlock_height: u64 },

    /// No deposit or earnings record for the address.
    #[error("No record for participant {0}")]
    UnknownParticipant(Address),

    /// No lock event with the given sequence number.
    #[error("No lock event with sequence number {0}")]
    UnknownLockEvent(u64),

    /// The price schedule ran past its 90 supported halving rounds.
    /// Accrual at an undefined price is refused rather than paid at zero.
    #[error("Halving schedule exhausted at round {0}")]
    HalvingExhausted(u64),

    /// A reward query referenced cycles the timeline never covered.
    #[error("No activity recorded covering cycle {0}")]
    NoActivityRecorded(u64),

    /// Checked arithmetic on amounts or prices overflowed.
    #[error("Numeric overflow in reward accounting")]
    NumericOverflow,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A host collaborator (token ledger, native transfer) failed.
    #[error("Host error: {0}")]
    Host(String),
}

impl From<serde_json::Error> for PlacerError {
    fn from(e: serde_json::Error) -> Self {
        PlacerError::Serialization(e.to_string())
    }
}
