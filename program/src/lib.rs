// Solcino Lottery
// A self-running raffle: players buy in, upkeep closes the round once the
// interval has passed, and an external randomness oracle picks the winner.

pub mod engine;
pub mod entrypoint;
pub mod error;
pub mod events;
pub mod instruction;
pub mod oracle;
pub mod processor;
pub mod state;
pub mod utils;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub use engine::{LotteryEngine, PrizeLedger, UpkeepStatus};
pub use error::RaffleError;
pub use state::{RaffleConfig, RaffleState};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
