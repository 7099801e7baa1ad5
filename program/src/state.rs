// Solcino Lottery - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    borsh::try_from_slice_unchecked,
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::engine::LotteryEngine;
use crate::error::RaffleError;

/// Block confirmations the oracle waits before answering
pub const REQUEST_CONFIRMATIONS: u16 = 3;
/// Random words requested per round
pub const NUM_WORDS: u32 = 1;

/// Status of a raffle round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Raffle is open for entries
    Open,
    /// A randomness request is pending, entries are rejected
    Calculating,
}

impl TryFrom<u8> for RaffleState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Calculating),
            _ => Err("Invalid raffle state"),
        }
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Calculating => 1,
        }
    }
}

/// Construction-time raffle settings, immutable afterwards
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum payment to enter, in lamports
    pub entrance_fee: u64,
    /// Minimum number of seconds between rounds
    pub interval: u64,
    /// The only identity allowed to deliver randomness
    pub vrf_coordinator: Pubkey,
    /// Oracle key hash selecting the gas lane, passed through untouched
    pub gas_lane: [u8; 32],
    /// Oracle billing subscription, passed through untouched
    pub subscription_id: u64,
    /// Gas the oracle may spend on the callback, passed through untouched
    pub callback_gas_limit: u32,
    /// Number of players the hosting account has room for
    pub max_players: u32,
}

impl RaffleConfig {
    /// Local development defaults: 0.01 SOL entry, 30 second rounds
    pub fn local(vrf_coordinator: Pubkey) -> Self {
        Self {
            entrance_fee: 10_000_000,
            interval: 30,
            vrf_coordinator,
            gas_lane: [
                0x47, 0x4e, 0x34, 0xa0, 0x77, 0xdf, 0x58, 0x80, 0x7d, 0xbe, 0x9c, 0x96, 0xd3,
                0xc0, 0x09, 0xb2, 0x3b, 0x3c, 0x6d, 0x0c, 0xce, 0x43, 0x3e, 0x59, 0xbb, 0xf5,
                0xb3, 0x4f, 0x82, 0x3b, 0xc5, 0x6c,
            ],
            subscription_id: 0,
            callback_gas_limit: 500_000,
            max_players: 64,
        }
    }

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0 || self.interval == 0 || self.max_players == 0 {
            return Err(RaffleError::InvalidConfig);
        }
        // interval is compared against timestamp differences
        if UnixTimestamp::try_from(self.interval).is_err() {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

/// Raffle account data: the persisted engine plus host bookkeeping
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub struct RaffleAccount {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Who created the raffle (part of the account address seeds)
    pub authority: Pubkey,
    /// Bump seed of the raffle address
    pub bump: u8,
    /// Counter feeding request id derivation
    pub request_nonce: u64,
    /// The lottery itself
    pub engine: LotteryEngine,
}

impl IsInitialized for RaffleAccount {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl RaffleAccount {
    /// Bytes before the engine: is_initialized, authority, bump, request_nonce
    const HEADER_LEN: usize = 1 + 32 + 1 + 8;

    /// Account size that holds this raffle at full player capacity
    pub fn space(engine: &LotteryEngine) -> Result<usize, ProgramError> {
        Ok(Self::HEADER_LEN + engine.max_packed_len()?)
    }

    /// Reads the account, ignoring unused capacity at the tail
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let raffle: Self = try_from_slice_unchecked(data)?;
        if !IsInitialized::is_initialized(&raffle) {
            return Err(RaffleError::NotInitialized.into());
        }
        Ok(raffle)
    }

    pub fn pack(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        let mut cursor: &mut [u8] = dst;
        self.serialize(&mut cursor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_byte_conversion() {
        assert_eq!(RaffleState::try_from(0u8), Ok(RaffleState::Open));
        assert_eq!(RaffleState::try_from(1u8), Ok(RaffleState::Calculating));
        assert!(RaffleState::try_from(2u8).is_err());
        assert_eq!(u8::from(RaffleState::Calculating), 1);
    }

    #[test]
    fn test_config_validation() {
        let config = RaffleConfig::local(Pubkey::new_unique());
        assert!(config.validate().is_ok());

        let zero_fee = RaffleConfig { entrance_fee: 0, ..config };
        assert_eq!(zero_fee.validate(), Err(RaffleError::InvalidConfig));

        let zero_interval = RaffleConfig { interval: 0, ..config };
        assert_eq!(zero_interval.validate(), Err(RaffleError::InvalidConfig));

        let huge_interval = RaffleConfig { interval: u64::MAX, ..config };
        assert_eq!(huge_interval.validate(), Err(RaffleError::InvalidConfig));

        let no_room = RaffleConfig { max_players: 0, ..config };
        assert_eq!(no_room.validate(), Err(RaffleError::InvalidConfig));
    }

    #[test]
    fn test_account_fits_full_round() {
        let config = RaffleConfig {
            max_players: 3,
            ..RaffleConfig::local(Pubkey::new_unique())
        };
        let engine = LotteryEngine::new(config, 100).unwrap();
        let mut raffle = RaffleAccount {
            is_initialized: true,
            authority: Pubkey::new_unique(),
            bump: 255,
            request_nonce: u64::MAX,
            engine,
        };
        let space = RaffleAccount::space(&raffle.engine).unwrap();
        let mut data = vec![0u8; space];

        let mut sink: Vec<crate::events::RaffleEvent> = Vec::new();
        for _ in 0..3 {
            raffle
                .engine
                .enter_raffle(Pubkey::new_unique(), config.entrance_fee, &mut sink)
                .unwrap();
        }
        raffle.pack(&mut data).unwrap();

        let unpacked = RaffleAccount::unpack(&data).unwrap();
        assert!(IsInitialized::is_initialized(&unpacked));
        assert_eq!(unpacked, raffle);
    }

    #[test]
    fn test_unpack_rejects_blank_account() {
        let data = vec![0u8; 256];
        assert_eq!(
            RaffleAccount::unpack(&data),
            Err(RaffleError::NotInitialized.into())
        );
    }
}
