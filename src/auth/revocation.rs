/// Probabilistic revocation tracking
///
/// A fixed-length bit vector with `k` polynomial string hashes. Tokens
/// themselves are never stored. Once a token has been added, `has` reports
/// it forever (until the process restarts); unrelated tokens may collide
/// with the same bit positions and read as revoked, never the other way
/// round.
///
/// Bits are set with atomic `fetch_or`, so the filter is shared across
/// worker threads without a lock.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::configuration::RevocationSettings;

pub const MAX_HASH_FUNCTIONS: usize = 8;

/// One multiplier per hash function. Distinct multipliers decorrelate the
/// bit positions a token maps to.
const MULTIPLIERS: [u64; MAX_HASH_FUNCTIONS] = [31, 17, 37, 41, 43, 47, 53, 59];

/// Keeps `hash * multiplier + char` inside u64.
const MAX_BITS: u64 = 1 << 32;

const WORD_BITS: u64 = 64;

pub struct RevocationFilter {
    words: Box<[AtomicU64]>,
    num_bits: u64,
    hash_functions: usize,
}

impl RevocationFilter {
    /// Filter with an explicit bit length and hash function count.
    /// Both are clamped into their supported ranges.
    pub fn new(num_bits: u64, hash_functions: usize) -> Self {
        let num_bits = num_bits.clamp(1, MAX_BITS);
        let hash_functions = hash_functions.clamp(1, MAX_HASH_FUNCTIONS);
        let word_count = ((num_bits + WORD_BITS - 1) / WORD_BITS) as usize;
        let words = (0..word_count).map(|_| AtomicU64::new(0)).collect();

        Self {
            words,
            num_bits,
            hash_functions,
        }
    }

    /// Filter sized so that `expected_tokens` revocations keep the false
    /// positive rate at or below `false_positive_rate`.
    pub fn with_capacity(
        expected_tokens: usize,
        false_positive_rate: f64,
        hash_functions: usize,
    ) -> Self {
        let bits = optimal_bits(expected_tokens, false_positive_rate, hash_functions);
        Self::new(bits, hash_functions)
    }

    pub fn from_settings(settings: &RevocationSettings) -> Self {
        let hash_functions = settings.hash_functions as usize;
        match settings.bits {
            Some(bits) => Self::new(bits, hash_functions),
            None => Self::with_capacity(
                settings.expected_tokens,
                settings.false_positive_rate,
                hash_functions,
            ),
        }
    }

    /// Record `token` as revoked. Empty input is ignored.
    pub fn add(&self, token: &str) {
        if token.is_empty() {
            return;
        }
        for &multiplier in &MULTIPLIERS[..self.hash_functions] {
            let bit = self.position(token, multiplier);
            let mask = 1u64 << (bit % WORD_BITS);
            self.words[(bit / WORD_BITS) as usize].fetch_or(mask, Ordering::Release);
        }
    }

    /// `true` means "possibly revoked" and must be treated as a reject.
    /// `false` means "definitely never added". Empty input is never revoked.
    pub fn has(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        MULTIPLIERS[..self.hash_functions].iter().all(|&multiplier| {
            let bit = self.position(token, multiplier);
            let mask = 1u64 << (bit % WORD_BITS);
            self.words[(bit / WORD_BITS) as usize].load(Ordering::Acquire) & mask != 0
        })
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn hash_functions(&self) -> usize {
        self.hash_functions
    }

    /// Number of bits currently set
    pub fn bits_set(&self) -> u64 {
        self.words
            .iter()
            .map(|w| u64::from(w.load(Ordering::Acquire).count_ones()))
            .sum()
    }

    /// Theoretical false positive rate after `items` distinct revocations:
    /// `(1 - e^(-k*n/m))^k`
    pub fn estimated_false_positive_rate(&self, items: usize) -> f64 {
        let k = self.hash_functions as f64;
        let exponent = -k * items as f64 / self.num_bits as f64;
        (1.0 - exponent.exp()).powf(k)
    }

    // Folds Unicode scalar values, not UTF-16 code units: tokens outside the
    // BMP land on different bits than a UTF-16 based hash would pick.
    fn position(&self, token: &str, multiplier: u64) -> u64 {
        token
            .chars()
            .fold(0u64, |hash, c| (hash * multiplier + c as u64) % self.num_bits)
    }
}

impl std::fmt::Debug for RevocationFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationFilter")
            .field("num_bits", &self.num_bits)
            .field("hash_functions", &self.hash_functions)
            .field("bits_set", &self.bits_set())
            .finish()
    }
}

/// Bit length for `n` items at false positive rate `p` with `k` hashes:
/// `m = -k*n / ln(1 - p^(1/k))`
pub fn optimal_bits(expected_tokens: usize, false_positive_rate: f64, hash_functions: usize) -> u64 {
    let n = expected_tokens.max(1) as f64;
    let k = hash_functions.clamp(1, MAX_HASH_FUNCTIONS) as f64;
    let p = false_positive_rate.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);

    let m = -k * n / (1.0 - p.powf(1.0 / k)).ln();
    (m.ceil() as u64).clamp(1, MAX_BITS)
}
