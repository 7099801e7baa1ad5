// Solcino Lottery - Events
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

use crate::oracle::RequestId;

/// Notifications for off-chain listeners. Nothing in the raffle depends on
/// whether they are observed.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    /// A player entered the current round
    RaffleEnter { player: Pubkey },
    /// Upkeep issued a randomness request
    RequestedRaffleWinner { request_id: RequestId },
    /// A round was resolved and paid out
    WinnerPicked { winner: Pubkey },
    /// Published by the on-chain oracle adapter for the off-chain oracle
    RandomWordsRequested {
        request_id: RequestId,
        sender: Pubkey,
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
    },
}

pub trait EventSink {
    fn emit(&mut self, event: RaffleEvent);
}

/// Collects events in memory
impl EventSink for Vec<RaffleEvent> {
    fn emit(&mut self, event: RaffleEvent) {
        self.push(event);
    }
}

/// Writes events to the program log, human readable and borsh encoded
pub struct ProgramLogSink;

impl EventSink for ProgramLogSink {
    fn emit(&mut self, event: RaffleEvent) {
        msg!("Event: {:?}", event);
        match event.try_to_vec() {
            Ok(data) => sol_log_data(&[&data]),
            Err(err) => msg!("Failed to encode event: {}", err),
        }
    }
}
