use std::time::{Duration, Instant};

use log::{debug, info};
use rand::Rng;
use serde::Serialize;

use super::block::{canonical_json, hash_json, sha256_hex};
use crate::config::ConsensusParams;
use crate::error::PowError;
use crate::transaction::Transaction;

/// The part of a block that proof of work commits to.
#[derive(Debug, Serialize)]
pub struct ProofCandidate<'a> {
    pub transactions: &'a [Transaction],
    pub nonce: u64,
    pub previous_hash: &'a str,
}

/// True if `hash` starts with `difficulty` hex zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|c| c == b'0')
}

/// Recompute the candidate hash and check its leading-zero prefix.
pub fn valid_proof(
    transactions: &[Transaction],
    previous_hash: &str,
    nonce: u64,
    difficulty: u32,
) -> bool {
    let guess = hash_json(&ProofCandidate {
        transactions,
        nonce,
        previous_hash,
    });
    meets_difficulty(&guess, difficulty)
}

/// Canonical encoding of a [`ProofCandidate`] split around the nonce, so the
/// search loop only formats an integer per attempt.
///
/// Keys sort as `nonce`, `previous_hash`, `transactions`.
struct ProofTemplate {
    prefix: &'static str,
    suffix: String,
}

impl ProofTemplate {
    fn new(transactions: &[Transaction], previous_hash: &str) -> Self {
        let suffix = format!(
            ",\"previous_hash\":{},\"transactions\":{}}}",
            canonical_json(previous_hash),
            canonical_json(transactions),
        );
        Self {
            prefix: "{\"nonce\":",
            suffix,
        }
    }

    fn hash(&self, nonce: u64) -> String {
        sha256_hex(&format!("{}{}{}", self.prefix, nonce, self.suffix))
    }
}

/// Search nonces from 0 until one satisfies `difficulty`, giving up after
/// `timeout` of wall-clock time.
pub fn proof_of_work(
    transactions: &[Transaction],
    previous_hash: &str,
    difficulty: u32,
    timeout: Duration,
) -> Result<u64, PowError> {
    let template = ProofTemplate::new(transactions, previous_hash);
    let started = Instant::now();
    let mut nonce: u64 = 0;
    loop {
        if meets_difficulty(&template.hash(nonce), difficulty) {
            debug!(
                "POW - found nonce={} difficulty={} in {:.3}s",
                nonce,
                difficulty,
                started.elapsed().as_secs_f64()
            );
            return Ok(nonce);
        }
        nonce = nonce.wrapping_add(1);
        if nonce % 256 == 0 && started.elapsed() >= timeout {
            return Err(PowError::Timeout { difficulty });
        }
    }
}

/// Three-band difficulty controller driven by how long the last block took.
#[derive(Debug, Clone)]
pub struct DifficultyController {
    difficulty: u32,
    mining_speed: f64,
    params: ConsensusParams,
}

impl DifficultyController {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            difficulty: params.baseline_difficulty,
            mining_speed: 0.0,
            params,
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Estimated seconds per block, used to pace the mining timer.
    pub fn mining_speed(&self) -> f64 {
        self.mining_speed
    }

    /// Feed the elapsed seconds of a successful mining round.
    ///
    /// Below baseline (after timeouts) the controller snaps back to baseline
    /// and leaves the speed estimate alone.
    pub fn adjust<R: Rng + ?Sized>(&mut self, elapsed: f64, rng: &mut R) {
        let baseline = self.params.baseline_difficulty;
        if self.difficulty < baseline {
            self.difficulty = baseline;
            info!("DIFFICULTY - reset to baseline {}", baseline);
            return;
        }

        if elapsed < self.params.fast_threshold_secs {
            self.difficulty += 1;
            self.mining_speed = elapsed + rng.gen_range(5.0..=5.3);
        } else if elapsed <= self.params.slow_threshold_secs {
            self.difficulty = baseline;
            self.mining_speed = elapsed + 5.0;
        } else {
            self.difficulty = self.difficulty.saturating_sub(1).max(baseline);
            self.mining_speed = elapsed + rng.gen_range(4.4..=4.7);
            if self.mining_speed >= self.params.mining_speed_ceiling {
                self.mining_speed -= rng.gen_range(0.5..=1.0);
            }
        }
        info!(
            "DIFFICULTY - elapsed={:.4}s difficulty={} mining_speed={:.3}",
            elapsed, self.difficulty, self.mining_speed
        );
    }

    /// A nonce search ran out of time: drop one level, never below 1.
    pub fn on_timeout(&mut self) {
        self.difficulty = self.difficulty.saturating_sub(1).max(1);
    }

    /// Delay before the next mining attempt: speed estimate plus jitter.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (lo, hi) = self.params.mining_jitter_secs;
        let jitter = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
        Duration::try_from_secs_f64((self.mining_speed + jitter).max(0.0))
            .unwrap_or(Duration::MAX)
    }
}
