// Solcino Lottery - Instructions
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::convert::TryInto;

use crate::error::RaffleError;
use crate::oracle::RequestId;
use crate::state::RaffleConfig;
use crate::utils::find_raffle_address;

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle account and start the first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The authority, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA of `["raffle", authority]`)
    /// 2. `[]` The system program
    InitializeRaffle { config: RaffleConfig },

    /// Enter the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player, pays `amount` into the pool
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Report whether upkeep is needed through the return data (one byte)
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep {},

    /// Close the round and request randomness. Anyone may call this.
    ///
    /// Accounts expected:
    /// 0. `[writable]` The raffle account
    PerformUpkeep {},

    /// Deliver randomness for the pending request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The configured coordinator
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winner the random word selects
    FulfillRandomWords {
        request_id: RequestId,
        random_word: u64,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input.split_first().ok_or(RaffleError::InvalidInstruction)?;
        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_u64(rest)?;
                let (vrf_coordinator, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (gas_lane, rest) = Self::unpack_fixed_bytes::<32>(rest)?;
                let (subscription_id, rest) = Self::unpack_u64(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let (max_players, _) = Self::unpack_u32(rest)?;
                Self::InitializeRaffle {
                    config: RaffleConfig {
                        entrance_fee,
                        interval,
                        vrf_coordinator: Pubkey::new_from_array(vrf_coordinator),
                        gas_lane,
                        subscription_id,
                        callback_gas_limit,
                        max_players,
                    },
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => Self::CheckUpkeep {},
            3 => Self::PerformUpkeep {},
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (random_word, _) = Self::unpack_u64(rest)?;
                Self::FulfillRandomWords {
                    request_id,
                    random_word,
                }
            }
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::InitializeRaffle { config } => {
                buf.push(0);
                buf.extend_from_slice(&config.entrance_fee.to_le_bytes());
                buf.extend_from_slice(&config.interval.to_le_bytes());
                buf.extend_from_slice(config.vrf_coordinator.as_ref());
                buf.extend_from_slice(&config.gas_lane);
                buf.extend_from_slice(&config.subscription_id.to_le_bytes());
                buf.extend_from_slice(&config.callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&config.max_players.to_le_bytes());
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep {} => buf.push(2),
            Self::PerformUpkeep {} => buf.push(3),
            Self::FulfillRandomWords {
                request_id,
                random_word,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(&random_word.to_le_bytes());
            }
        }
        buf
    }

    fn unpack_fixed_bytes<const N: usize>(
        input: &[u8],
    ) -> Result<([u8; N], &[u8]), ProgramError> {
        let bytes: [u8; N] = input
            .get(..N)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(RaffleError::InvalidInstruction)?;
        Ok((bytes, &input[N..]))
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<8>(input)?;
        Ok((u64::from_le_bytes(bytes), rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        let (bytes, rest) = Self::unpack_fixed_bytes::<4>(input)?;
        Ok((u32::from_le_bytes(bytes), rest))
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    authority: &Pubkey,
    config: RaffleConfig,
) -> Instruction {
    let (raffle, _) = find_raffle_address(program_id, authority);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new(raffle, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: RaffleInstruction::InitializeRaffle { config }.pack(),
    }
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    player: &Pubkey,
    raffle: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(*raffle, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: RaffleInstruction::EnterRaffle { amount }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, raffle: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*raffle, false)],
        data: RaffleInstruction::CheckUpkeep {}.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey, raffle: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*raffle, false)],
        data: RaffleInstruction::PerformUpkeep {}.pack(),
    }
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    raffle: &Pubkey,
    winner: &Pubkey,
    request_id: RequestId,
    random_word: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*coordinator, true),
            AccountMeta::new(*raffle, false),
            AccountMeta::new(*winner, false),
        ],
        data: RaffleInstruction::FulfillRandomWords {
            request_id,
            random_word,
        }
        .pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_raffle_layout() {
        let config = RaffleConfig::local(Pubkey::new_unique());
        let ix = RaffleInstruction::InitializeRaffle { config };
        let data = ix.pack();
        assert_eq!(data.len(), 1 + 8 + 8 + 32 + 32 + 8 + 4 + 4);
        assert_eq!(RaffleInstruction::unpack(&data).unwrap(), ix);
    }

    #[test]
    fn test_fulfill_layout() {
        let data = RaffleInstruction::FulfillRandomWords {
            request_id: 1,
            random_word: 7,
        }
        .pack();
        assert_eq!(data[0], 4);
        assert_eq!(&data[1..9], &1u64.to_le_bytes());
        assert_eq!(&data[9..17], &7u64.to_le_bytes());
    }

    #[test]
    fn test_unpack_rejects_bad_input() {
        let invalid = Err(ProgramError::from(RaffleError::InvalidInstruction));
        assert_eq!(RaffleInstruction::unpack(&[]), invalid);
        assert_eq!(RaffleInstruction::unpack(&[9]), invalid);
        assert_eq!(RaffleInstruction::unpack(&[1, 0, 0]), invalid);
        assert_eq!(RaffleInstruction::unpack(&[4, 1, 0, 0, 0, 0, 0, 0, 0]), invalid);
    }
}
