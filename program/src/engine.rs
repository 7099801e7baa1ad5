// Solcino Lottery - Engine
//
// The raffle state machine. It owns the round (players, pool, state) and
// talks to the outside world only through the oracle, ledger and event sink
// handed to each call, so the same engine runs on-chain and in tests.
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    borsh::get_instance_packed_len, clock::UnixTimestamp, msg, program_error::ProgramError,
    pubkey::Pubkey,
};
use std::convert::TryFrom;
use std::mem::size_of;

use crate::error::RaffleError;
use crate::events::{EventSink, RaffleEvent};
use crate::oracle::{RandomnessOracle, RandomnessRequest, RequestId};
use crate::state::{RaffleConfig, RaffleState, NUM_WORDS, REQUEST_CONFIRMATIONS};
use crate::utils;

/// Pays the prize out of the pool. Implementations must either move the full
/// amount or fail without moving anything.
pub trait PrizeLedger {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> Result<(), RaffleError>;
}

/// Snapshot of the values upkeep is decided on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepStatus {
    pub is_open: bool,
    pub time_passed: bool,
    pub has_players: bool,
    pub has_balance: bool,
}

impl UpkeepStatus {
    pub fn upkeep_needed(&self) -> bool {
        self.is_open && self.time_passed && self.has_players && self.has_balance
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct LotteryEngine {
    config: RaffleConfig,
    players: Vec<Pubkey>,
    state: RaffleState,
    last_timestamp: UnixTimestamp,
    recent_winner: Option<Pubkey>,
    pending_request_id: Option<RequestId>,
    pool_balance: u64,
}

impl LotteryEngine {
    pub fn new(config: RaffleConfig, now: UnixTimestamp) -> Result<Self, RaffleError> {
        config.validate()?;
        Ok(Self {
            config,
            players: Vec::new(),
            state: RaffleState::Open,
            last_timestamp: now,
            recent_winner: None,
            pending_request_id: None,
            pool_balance: 0,
        })
    }

    /// Adds `player` to the current round for `payment` lamports
    pub fn enter_raffle(
        &mut self,
        player: Pubkey,
        payment: u64,
        events: &mut impl EventSink,
    ) -> Result<(), RaffleError> {
        if self.state != RaffleState::Open {
            return Err(RaffleError::NotOpen);
        }
        if payment < self.config.entrance_fee {
            return Err(RaffleError::InsufficientPayment {
                required: self.config.entrance_fee,
                paid: payment,
            });
        }
        if self.players.len() >= self.config.max_players as usize {
            return Err(RaffleError::RaffleFull);
        }
        let pool_balance = self
            .pool_balance
            .checked_add(payment)
            .ok_or(RaffleError::MathOverflow)?;

        self.players.push(player);
        self.pool_balance = pool_balance;

        msg!(
            "Player {} entered with {} lamports ({} players)",
            player,
            payment,
            self.players.len()
        );
        events.emit(RaffleEvent::RaffleEnter { player });
        Ok(())
    }

    pub fn upkeep_status(&self, now: UnixTimestamp) -> UpkeepStatus {
        // a clock running behind the last resolution counts as no time passed
        let elapsed = now.saturating_sub(self.last_timestamp).max(0) as u64;
        UpkeepStatus {
            is_open: self.state == RaffleState::Open,
            time_passed: elapsed >= self.config.interval,
            has_players: !self.players.is_empty(),
            has_balance: self.pool_balance > 0,
        }
    }

    /// Whether `perform_upkeep` would issue a request at `now`. Never mutates.
    pub fn check_upkeep(&self, now: UnixTimestamp) -> bool {
        self.upkeep_status(now).upkeep_needed()
    }

    /// Closes the round and asks the oracle for randomness
    pub fn perform_upkeep<O: RandomnessOracle>(
        &mut self,
        now: UnixTimestamp,
        oracle: &mut O,
        events: &mut impl EventSink,
    ) -> Result<RequestId, RaffleError> {
        if !self.check_upkeep(now) {
            return Err(RaffleError::UpkeepNotNeeded {
                balance: self.pool_balance,
                num_players: self.players.len() as u64,
                state: self.state,
            });
        }

        let request = RandomnessRequest::from_config(&self.config);
        let request_id = oracle
            .request_random_words(&request)
            .map_err(RaffleError::OracleRequestFailed)?;

        self.state = RaffleState::Calculating;
        self.pending_request_id = Some(request_id);

        msg!("Requested raffle winner, request id {}", request_id);
        events.emit(RaffleEvent::RequestedRaffleWinner { request_id });
        Ok(request_id)
    }

    /// The player `random_word` selects in the current round, if any
    pub fn winner_for(&self, random_word: u64) -> Option<Pubkey> {
        let index = utils::winner_index(random_word, self.players.len() as u64)?;
        self.players.get(index as usize).copied()
    }

    /// Resolves the pending request: picks, pays and records the winner,
    /// then reopens the raffle. The payout happens before any state changes,
    /// so a failed transfer leaves the round pending and retryable.
    pub fn fulfill_random_words<L: PrizeLedger>(
        &mut self,
        caller: &Pubkey,
        request_id: RequestId,
        random_word: u64,
        now: UnixTimestamp,
        ledger: &mut L,
        events: &mut impl EventSink,
    ) -> Result<Pubkey, RaffleError> {
        if *caller != self.config.vrf_coordinator {
            msg!("Fulfillment from {} rejected", caller);
            return Err(RaffleError::Unauthorized);
        }
        if self.pending_request_id != Some(request_id) {
            return Err(RaffleError::UnknownRequest { request_id });
        }

        // a pending request always has players behind it
        let winner = self
            .winner_for(random_word)
            .ok_or(RaffleError::UnknownRequest { request_id })?;
        let prize = self.pool_balance;

        ledger.transfer(&winner, prize).map_err(|err| {
            msg!("Payout of {} lamports to {} failed: {}", prize, winner, err);
            RaffleError::TransferFailed
        })?;

        self.recent_winner = Some(winner);
        self.players.clear();
        self.pool_balance = 0;
        self.state = RaffleState::Open;
        self.pending_request_id = None;
        self.last_timestamp = now;

        msg!("Winner picked: {} receives {} lamports", winner, prize);
        events.emit(RaffleEvent::WinnerPicked { winner });
        Ok(winner)
    }

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.state
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn num_players(&self) -> u64 {
        self.players.len() as u64
    }

    pub fn player(&self, index: u64) -> Result<Pubkey, RaffleError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.players.get(i))
            .copied()
            .ok_or(RaffleError::IndexOutOfRange {
                index,
                len: self.num_players(),
            })
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.last_timestamp
    }

    pub fn pending_request_id(&self) -> Option<RequestId> {
        self.pending_request_id
    }

    pub fn pool_balance(&self) -> u64 {
        self.pool_balance
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }

    /// Encoded size with every player slot used and both optional fields set
    pub fn max_packed_len(&self) -> Result<usize, ProgramError> {
        let empty = Self {
            players: Vec::new(),
            recent_winner: None,
            pending_request_id: None,
            ..self.clone()
        };
        Ok(get_instance_packed_len(&empty)?
            + self.config.max_players as usize * size_of::<Pubkey>()
            + size_of::<Pubkey>()
            + size_of::<RequestId>())
    }
}
