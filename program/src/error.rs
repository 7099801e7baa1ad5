// Solcino Lottery - Errors
use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

use crate::oracle::{OracleError, RequestId};
use crate::state::RaffleState;

/// Errors that may be returned by the lottery engine and its program host
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Entry payment below the entrance fee
    #[error("Not enough lamports entered: required {required}, got {paid}")]
    InsufficientPayment { required: u64, paid: u64 },

    /// Raffle is calculating a winner and does not accept entries
    #[error("Raffle is not open")]
    NotOpen,

    /// Upkeep was requested while its conditions do not hold
    #[error("Upkeep not needed: balance={balance}, players={num_players}, state={state:?}")]
    UpkeepNotNeeded {
        balance: u64,
        num_players: u64,
        state: RaffleState,
    },

    /// Fulfillment for a request that is not pending
    #[error("Nonexistent request {request_id}")]
    UnknownRequest { request_id: RequestId },

    /// Fulfillment from someone other than the configured coordinator
    #[error("Only the configured coordinator can fulfill randomness")]
    Unauthorized,

    /// Payout to the winner could not complete
    #[error("Transfer to winner failed")]
    TransferFailed,

    #[error("Player index {index} out of range ({len} players)")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("Invalid raffle configuration")]
    InvalidConfig,

    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Raffle already initialized")]
    AlreadyInitialized,

    #[error("Raffle not initialized")]
    NotInitialized,

    /// The raffle account has no room for another player
    #[error("Raffle is full")]
    RaffleFull,

    #[error("Arithmetic overflow")]
    MathOverflow,

    /// The oracle refused the randomness request
    #[error("Randomness request failed: {0}")]
    OracleRequestFailed(OracleError),
}

impl RaffleError {
    /// Stable numeric code reported through `ProgramError::Custom`
    pub fn code(&self) -> u32 {
        match self {
            RaffleError::InsufficientPayment { .. } => 0,
            RaffleError::NotOpen => 1,
            RaffleError::UpkeepNotNeeded { .. } => 2,
            RaffleError::UnknownRequest { .. } => 3,
            RaffleError::Unauthorized => 4,
            RaffleError::TransferFailed => 5,
            RaffleError::IndexOutOfRange { .. } => 6,
            RaffleError::InvalidConfig => 7,
            RaffleError::InvalidInstruction => 8,
            RaffleError::AlreadyInitialized => 9,
            RaffleError::NotInitialized => 10,
            RaffleError::RaffleFull => 11,
            RaffleError::MathOverflow => 12,
            RaffleError::OracleRequestFailed(_) => 13,
        }
    }
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        msg!("Error: {}", e);
        ProgramError::Custom(e.code())
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            RaffleError::InsufficientPayment { required: 1, paid: 0 },
            RaffleError::NotOpen,
            RaffleError::UpkeepNotNeeded {
                balance: 0,
                num_players: 0,
                state: RaffleState::Open,
            },
            RaffleError::UnknownRequest { request_id: 1 },
            RaffleError::Unauthorized,
            RaffleError::TransferFailed,
            RaffleError::IndexOutOfRange { index: 0, len: 0 },
            RaffleError::InvalidConfig,
            RaffleError::InvalidInstruction,
            RaffleError::AlreadyInitialized,
            RaffleError::NotInitialized,
            RaffleError::RaffleFull,
            RaffleError::MathOverflow,
            RaffleError::OracleRequestFailed(OracleError::NonexistentRequest),
        ];
        let mut codes: Vec<u32> = errors.iter().map(RaffleError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_program_error_mapping() {
        assert_eq!(
            ProgramError::from(RaffleError::TransferFailed),
            ProgramError::Custom(5)
        );
        assert_eq!(
            ProgramError::from(RaffleError::UnknownRequest { request_id: 9 }),
            ProgramError::Custom(3)
        );
    }
}
