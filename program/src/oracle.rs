// Solcino Lottery - Randomness oracle
use arrayref::array_ref;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, hash::hashv, msg, pubkey::Pubkey};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::engine::{LotteryEngine, PrizeLedger};
use crate::error::RaffleError;
use crate::events::{EventSink, ProgramLogSink, RaffleEvent};
use crate::state::{RaffleConfig, NUM_WORDS, REQUEST_CONFIRMATIONS};

/// Correlates a randomness request with its fulfillment
pub type RequestId = u64;

/// Errors raised on the oracle side of a request
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("nonexistent request")]
    NonexistentRequest,
    #[error("invalid subscription")]
    InvalidSubscription,
    #[error("invalid consumer")]
    InvalidConsumer,
    #[error("insufficient subscription balance")]
    InsufficientBalance,
}

/// Parameters forwarded to the oracle with every request. The engine does
/// not interpret them.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

impl RandomnessRequest {
    pub fn from_config(config: &RaffleConfig) -> Self {
        Self {
            key_hash: config.gas_lane,
            subscription_id: config.subscription_id,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_gas_limit: config.callback_gas_limit,
            num_words: NUM_WORDS,
        }
    }
}

/// Accepts randomness requests. The random value is delivered later through
/// `LotteryEngine::fulfill_random_words`, never as a return value.
pub trait RandomnessOracle {
    fn request_random_words(
        &mut self,
        request: &RandomnessRequest,
    ) -> Result<RequestId, OracleError>;
}

/// Takes the first eight bytes of a hash as a little-endian integer
fn hash_to_u64(parts: &[&[u8]]) -> u64 {
    let hash = hashv(parts);
    u64::from_le_bytes(*array_ref![hash.as_ref(), 0, 8])
}

/// On-chain oracle adapter. It derives a request id unique to the raffle and
/// nonce and publishes the request in the program log, where the off-chain
/// oracle picks it up.
pub struct LogOracle<'a> {
    raffle: Pubkey,
    nonce: &'a mut u64,
}

impl<'a> LogOracle<'a> {
    pub fn new(raffle: Pubkey, nonce: &'a mut u64) -> Self {
        Self { raffle, nonce }
    }

    pub fn compute_request_id(
        raffle: &Pubkey,
        request: &RandomnessRequest,
        nonce: u64,
    ) -> RequestId {
        hash_to_u64(&[
            raffle.as_ref(),
            &request.key_hash,
            &request.subscription_id.to_le_bytes(),
            &nonce.to_le_bytes(),
        ])
    }
}

impl<'a> RandomnessOracle for LogOracle<'a> {
    fn request_random_words(
        &mut self,
        request: &RandomnessRequest,
    ) -> Result<RequestId, OracleError> {
        *self.nonce = self.nonce.wrapping_add(1);
        let request_id = Self::compute_request_id(&self.raffle, request, *self.nonce);

        ProgramLogSink.emit(RaffleEvent::RandomWordsRequested {
            request_id,
            sender: self.raffle,
            key_hash: request.key_hash,
            subscription_id: request.subscription_id,
            request_confirmations: request.request_confirmations,
            callback_gas_limit: request.callback_gas_limit,
            num_words: request.num_words,
        });
        Ok(request_id)
    }
}

/// Failure of a mock fulfillment: either the coordinator refused, or the
/// consumer rejected the callback
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FulfillError {
    #[error("coordinator: {0}")]
    Oracle(#[from] OracleError),
    #[error("consumer: {0}")]
    Consumer(#[from] RaffleError),
}

#[derive(Debug, Default, Clone)]
struct Subscription {
    balance: u64,
    consumers: Vec<Pubkey>,
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    subscription_id: u64,
    callback_gas_limit: u32,
}

/// Local stand-in for the randomness coordinator, with the subscription
/// bookkeeping of the real service. Fulfillment is triggered explicitly.
#[derive(Debug, Clone)]
pub struct VrfCoordinatorMock {
    address: Pubkey,
    base_fee: u64,
    gas_price_link: u64,
    next_subscription_id: u64,
    next_request_id: RequestId,
    subscriptions: BTreeMap<u64, Subscription>,
    requests: BTreeMap<RequestId, PendingRequest>,
}

impl VrfCoordinatorMock {
    /// `base_fee` is charged per fulfillment on top of `gas_price_link` per
    /// unit of callback gas
    pub fn new(address: Pubkey, base_fee: u64, gas_price_link: u64) -> Self {
        Self {
            address,
            base_fee,
            gas_price_link,
            next_subscription_id: 1,
            next_request_id: 1,
            subscriptions: BTreeMap::new(),
            requests: BTreeMap::new(),
        }
    }

    /// Identity the coordinator uses when calling back into a raffle
    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn create_subscription(&mut self) -> u64 {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.subscriptions.insert(id, Subscription::default());
        msg!("Subscription {} created", id);
        id
    }

    pub fn fund_subscription(
        &mut self,
        subscription_id: u64,
        amount: u64,
    ) -> Result<(), OracleError> {
        let subscription = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::InvalidSubscription)?;
        subscription.balance = subscription.balance.saturating_add(amount);
        msg!(
            "Subscription {} funded, balance {}",
            subscription_id,
            subscription.balance
        );
        Ok(())
    }

    pub fn add_consumer(
        &mut self,
        subscription_id: u64,
        consumer: Pubkey,
    ) -> Result<(), OracleError> {
        let subscription = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::InvalidSubscription)?;
        if !subscription.consumers.contains(&consumer) {
            subscription.consumers.push(consumer);
        }
        Ok(())
    }

    pub fn subscription_balance(&self, subscription_id: u64) -> Option<u64> {
        self.subscriptions.get(&subscription_id).map(|s| s.balance)
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Oracle handle that issues requests on behalf of `consumer`
    pub fn requester(&mut self, consumer: Pubkey) -> MockRequester<'_> {
        MockRequester {
            coordinator: self,
            consumer,
        }
    }

    /// The word the mock delivers for `request_id` at position `index`
    pub fn random_word(request_id: RequestId, index: u32) -> u64 {
        hash_to_u64(&[&request_id.to_le_bytes(), &index.to_le_bytes()])
    }

    pub fn fulfill_random_words<L: PrizeLedger>(
        &mut self,
        request_id: RequestId,
        consumer: &mut LotteryEngine,
        now: UnixTimestamp,
        ledger: &mut L,
        events: &mut impl EventSink,
    ) -> Result<Pubkey, FulfillError> {
        let word = Self::random_word(request_id, 0);
        self.fulfill_random_words_with_override(request_id, consumer, word, now, ledger, events)
    }

    /// Delivers `word` for `request_id`. The request is only consumed and
    /// billed when the consumer accepts it.
    pub fn fulfill_random_words_with_override<L: PrizeLedger>(
        &mut self,
        request_id: RequestId,
        consumer: &mut LotteryEngine,
        word: u64,
        now: UnixTimestamp,
        ledger: &mut L,
        events: &mut impl EventSink,
    ) -> Result<Pubkey, FulfillError> {
        let request = *self
            .requests
            .get(&request_id)
            .ok_or(OracleError::NonexistentRequest)?;
        let payment = self
            .gas_price_link
            .saturating_mul(request.callback_gas_limit as u64)
            .saturating_add(self.base_fee);
        let balance = self
            .subscriptions
            .get(&request.subscription_id)
            .ok_or(OracleError::InvalidSubscription)?
            .balance;
        if balance < payment {
            return Err(OracleError::InsufficientBalance.into());
        }

        let winner = consumer.fulfill_random_words(
            &self.address,
            request_id,
            word,
            now,
            ledger,
            events,
        )?;

        self.requests.remove(&request_id);
        if let Some(subscription) = self.subscriptions.get_mut(&request.subscription_id) {
            subscription.balance -= payment;
        }
        msg!("Request {} fulfilled, charged {}", request_id, payment);
        Ok(winner)
    }
}

pub struct MockRequester<'a> {
    coordinator: &'a mut VrfCoordinatorMock,
    consumer: Pubkey,
}

impl<'a> RandomnessOracle for MockRequester<'a> {
    fn request_random_words(
        &mut self,
        request: &RandomnessRequest,
    ) -> Result<RequestId, OracleError> {
        let subscription = self
            .coordinator
            .subscriptions
            .get(&request.subscription_id)
            .ok_or(OracleError::InvalidSubscription)?;
        if !subscription.consumers.contains(&self.consumer) {
            return Err(OracleError::InvalidConsumer);
        }

        let request_id = self.coordinator.next_request_id;
        self.coordinator.next_request_id += 1;
        self.coordinator.requests.insert(
            request_id,
            PendingRequest {
                subscription_id: request.subscription_id,
                callback_gas_limit: request.callback_gas_limit,
            },
        );
        msg!(
            "Random words requested: id {}, consumer {}",
            request_id,
            self.consumer
        );
        Ok(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(subscription_id: u64) -> RandomnessRequest {
        RandomnessRequest {
            subscription_id,
            ..RandomnessRequest::from_config(&RaffleConfig::local(Pubkey::new_unique()))
        }
    }

    #[test]
    fn test_request_carries_config_parameters() {
        let config = RaffleConfig {
            subscription_id: 12,
            callback_gas_limit: 42,
            ..RaffleConfig::local(Pubkey::new_unique())
        };
        let request = RandomnessRequest::from_config(&config);
        assert_eq!(request.key_hash, config.gas_lane);
        assert_eq!(request.subscription_id, 12);
        assert_eq!(request.callback_gas_limit, 42);
        assert_eq!(request.request_confirmations, REQUEST_CONFIRMATIONS);
        assert_eq!(request.num_words, NUM_WORDS);
    }

    #[test]
    fn test_log_oracle_ids_advance_with_nonce() {
        let raffle = Pubkey::new_unique();
        let mut nonce = 0;
        let first = LogOracle::new(raffle, &mut nonce)
            .request_random_words(&request(1))
            .unwrap();
        let second = LogOracle::new(raffle, &mut nonce)
            .request_random_words(&request(1))
            .unwrap();

        assert_eq!(nonce, 2);
        assert_ne!(first, second);
        assert_eq!(first, LogOracle::compute_request_id(&raffle, &request(1), 1));
    }

    #[test]
    fn test_log_oracle_ids_differ_per_raffle() {
        let mut nonce_a = 0;
        let mut nonce_b = 0;
        let a = LogOracle::new(Pubkey::new_unique(), &mut nonce_a)
            .request_random_words(&request(1))
            .unwrap();
        let b = LogOracle::new(Pubkey::new_unique(), &mut nonce_b)
            .request_random_words(&request(1))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_mock_subscription_lifecycle() {
        let mut coordinator = VrfCoordinatorMock::new(Pubkey::new_unique(), 10, 1);
        let sub = coordinator.create_subscription();
        assert_eq!(sub, 1);
        assert_eq!(coordinator.subscription_balance(sub), Some(0));

        coordinator.fund_subscription(sub, 500).unwrap();
        assert_eq!(coordinator.subscription_balance(sub), Some(500));
        assert_eq!(
            coordinator.fund_subscription(99, 1),
            Err(OracleError::InvalidSubscription)
        );
        assert_eq!(
            coordinator.add_consumer(99, Pubkey::new_unique()),
            Err(OracleError::InvalidSubscription)
        );
    }

    #[test]
    fn test_mock_request_ids_start_at_one() {
        let mut coordinator = VrfCoordinatorMock::new(Pubkey::new_unique(), 10, 1);
        let sub = coordinator.create_subscription();
        let consumer = Pubkey::new_unique();
        coordinator.add_consumer(sub, consumer).unwrap();

        let mut requester = coordinator.requester(consumer);
        assert_eq!(requester.request_random_words(&request(sub)), Ok(1));
        assert_eq!(requester.request_random_words(&request(sub)), Ok(2));
        assert_eq!(
            requester.request_random_words(&request(sub + 1)),
            Err(OracleError::InvalidSubscription)
        );
        assert_eq!(coordinator.pending_requests(), 2);
    }

    #[test]
    fn test_mock_rejects_unregistered_consumer() {
        let mut coordinator = VrfCoordinatorMock::new(Pubkey::new_unique(), 10, 1);
        let sub = coordinator.create_subscription();
        let err = coordinator
            .requester(Pubkey::new_unique())
            .request_random_words(&request(sub))
            .unwrap_err();
        assert_eq!(err, OracleError::InvalidConsumer);
    }

    #[test]
    fn test_mock_words_are_deterministic() {
        assert_eq!(
            VrfCoordinatorMock::random_word(1, 0),
            VrfCoordinatorMock::random_word(1, 0)
        );
        assert_ne!(
            VrfCoordinatorMock::random_word(1, 0),
            VrfCoordinatorMock::random_word(2, 0)
        );
    }
}
