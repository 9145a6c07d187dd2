// Randomness oracle boundary and an in-process oracle
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::engine::RaffleId;
use crate::vrf::{RandomWord, RandomnessParams, RequestId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("randomness request rejected: {0}")]
    Rejected(String),
    #[error("nonexistent request {0}")]
    NonexistentRequest(RequestId),
}

/// What an engine hands the oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub requester: RaffleId,
    pub params: RandomnessParams,
}

/// Random words ready to be delivered to `requester`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfillment {
    pub request_id: RequestId,
    pub requester: RaffleId,
    pub words: Vec<RandomWord>,
}

/// Accepts a request synchronously; the words arrive later through
/// `fulfill_randomness` on the requesting engine, at most once.
pub trait RandomnessOracle: Send + Sync {
    fn request(&self, request: RandomnessRequest) -> Result<RequestId, OracleError>;
}

#[derive(Debug, Default)]
struct Requests {
    last_id: RequestId,
    pending: BTreeMap<RequestId, RandomnessRequest>,
}

/// In-process oracle. Keeps the pending requests keyed by id and answers
/// each one exactly once.
#[derive(Debug)]
pub struct LocalOracle {
    requests: Mutex<Requests>,
    accepting: AtomicBool,
}

impl Default for LocalOracle {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Requests::default()),
            accepting: AtomicBool::new(true),
        }
    }
}

impl LocalOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unset, new requests are rejected
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    pub fn pending(&self) -> Vec<RequestId> {
        self.requests
            .lock()
            .map(|requests| requests.pending.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Answers `request_id` with the given words
    pub fn fulfill_with(&self, request_id: RequestId, words: Vec<RandomWord>) -> Result<Fulfillment, OracleError> {
        let request = self.take(request_id)?;
        Ok(Fulfillment {
            request_id,
            requester: request.requester,
            words,
        })
    }

    /// Answers `request_id` with `num_words` fresh random words
    pub fn fulfill_random(&self, request_id: RequestId) -> Result<Fulfillment, OracleError> {
        let request = self.take(request_id)?;
        let mut rng = rand::thread_rng();
        let words = (0..request.params.num_words)
            .map(|_| RandomWord::from_be_bytes(rng.gen()))
            .collect();
        Ok(Fulfillment {
            request_id,
            requester: request.requester,
            words,
        })
    }

    fn take(&self, request_id: RequestId) -> Result<RandomnessRequest, OracleError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| OracleError::NonexistentRequest(request_id))?;
        requests
            .pending
            .remove(&request_id)
            .ok_or(OracleError::NonexistentRequest(request_id))
    }
}

impl RandomnessOracle for LocalOracle {
    fn request(&self, request: RandomnessRequest) -> Result<RequestId, OracleError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(OracleError::Rejected("oracle not accepting requests".to_string()));
        }

        let mut requests = self
            .requests
            .lock()
            .map_err(|_| OracleError::Rejected("oracle state poisoned".to_string()))?;
        requests.last_id += 1;
        let request_id = requests.last_id;
        requests.pending.insert(request_id, request);

        debug!(request_id, requester = request.requester, "randomness request accepted");
        Ok(request_id)
    }
}
