//! Owned-volume bitsets.
//!
//! A [`VolumeSet`] tracks which of the volumes `1..=limit` are owned. Volume `v` lives in bit
//! `(v - 1) % 32` of word `(v - 1) / 32`. Two text forms exist:
//!
//!   - the canonical encoding, comma-joined decimal words (`"93,524288,0,0"`), which is what the
//!     store persists and must round-trip exactly;
//!   - the range list, comma-separated singletons and `lo-hi` ranges (`"1, 3-5, 7, 52"`), which
//!     is what users type and what [`VolumeSet::readable`] renders.
//!
//! Range-list parsing is lenient: each bad token is skipped and reported on its own.

use std::fmt;
use std::num::IntErrorKind;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

/// Width of one storage word.
pub(crate) const WORD_BITS: u32 = 32;

pub(crate) const DEFAULT_VOLUME_LIMIT: u32 = 128;

/// Owned, then a gap, then owned again.
static GAP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("1+0+1").expect("gap pattern compiles"));

/// A limit is usable when it is a positive multiple of the word width.
pub(crate) fn is_valid_limit(limit: u32) -> bool {
    limit > 0 && limit % WORD_BITS == 0
}

// ── Token issues ─────────────────────────────────────────────────────────

/// A range-list token that was skipped or altered while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenIssue {
    Malformed { token: String },
    BelowOne { token: String },
    AboveLimit { token: String, limit: u32 },
    /// The range was applied with its upper bound lowered to the limit.
    Clamped { token: String, limit: u32 },
    /// Start after end, or start beyond the limit. Nothing was applied.
    EmptyRange { token: String },
}

impl fmt::Display for TokenIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { token } => write!(f, "invalid token '{token}'"),
            Self::BelowOne { token } => write!(
                f,
                "token '{token}' ignored; volume numbers must be greater than zero"
            ),
            Self::AboveLimit { token, limit } => write!(
                f,
                "token '{token}' ignored; volume number exceeds the volume limit (currently {limit})"
            ),
            Self::Clamped { token, limit } => write!(
                f,
                "end of range '{token}' too high; clamped to the volume limit (currently {limit})"
            ),
            Self::EmptyRange { token } => {
                write!(f, "range '{token}' ignored; it covers no trackable volume")
            }
        }
    }
}

/// Result of reading a range list: every valid token applied, every bad one reported.
#[derive(Debug, Clone)]
pub(crate) struct ParsedRanges {
    pub(crate) volumes: VolumeSet,
    pub(crate) issues: Vec<TokenIssue>,
}

// ── Decode errors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum DecodeError {
    #[error("expected {expected} words for the configured limit, found {found}")]
    WordCount { expected: usize, found: usize },
    #[error("'{0}' is not a 32-bit word")]
    BadWord(String),
}

// ── VolumeSet ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VolumeSet {
    limit: u32,
    words: Vec<u32>,
}

impl VolumeSet {
    /// An empty set tracking volumes `1..=limit`.
    ///
    /// Panics if `limit` is not a positive multiple of [`WORD_BITS`]; configuration loading
    /// rejects such limits before they reach this point.
    pub(crate) fn empty(limit: u32) -> Self {
        assert!(
            is_valid_limit(limit),
            "volume limit {limit} is not a positive multiple of {WORD_BITS}"
        );
        Self {
            limit,
            words: vec![0; limit.div_ceil(WORD_BITS) as usize],
        }
    }

    /// Builds a set from user range-list text, logging every skipped token.
    #[cfg(test)]
    pub(crate) fn from_ranges(text: &str, limit: u32) -> Self {
        Self::parse_ranges(text, limit).volumes
    }

    pub(crate) fn parse_ranges(text: &str, limit: u32) -> ParsedRanges {
        let mut volumes = Self::empty(limit);
        let mut issues = Vec::new();
        for raw in text.split(',') {
            let token = raw.trim();
            if token.is_empty() || token == "None" {
                continue;
            }
            if let Some(issue) = volumes.apply_token(token) {
                warn!("{issue}");
                issues.push(issue);
            }
        }
        ParsedRanges { volumes, issues }
    }

    fn apply_token(&mut self, token: &str) -> Option<TokenIssue> {
        // "-1" is a negative singleton, not a malformed range.
        if let Some(volume) = parse_volume(token) {
            if volume < 1 {
                return Some(TokenIssue::BelowOne {
                    token: token.to_string(),
                });
            }
            if volume > i64::from(self.limit) {
                return Some(TokenIssue::AboveLimit {
                    token: token.to_string(),
                    limit: self.limit,
                });
            }
            self.insert(volume as u32);
            return None;
        }

        let malformed = || TokenIssue::Malformed {
            token: token.to_string(),
        };
        let Some((lo, hi)) = token.split_once('-') else {
            return Some(malformed());
        };
        let (Some(lo), Some(hi)) = (parse_volume(lo.trim()), parse_volume(hi.trim())) else {
            return Some(malformed());
        };

        if lo < 1 {
            return Some(TokenIssue::BelowOne {
                token: token.to_string(),
            });
        }
        if lo > i64::from(self.limit) {
            return Some(TokenIssue::EmptyRange {
                token: token.to_string(),
            });
        }
        let mut issue = None;
        let mut hi = hi;
        if hi > i64::from(self.limit) {
            hi = i64::from(self.limit);
            issue = Some(TokenIssue::Clamped {
                token: token.to_string(),
                limit: self.limit,
            });
        }
        if lo > hi {
            return Some(TokenIssue::EmptyRange {
                token: token.to_string(),
            });
        }
        for volume in lo..=hi {
            self.insert(volume as u32);
        }
        issue
    }
}

impl VolumeSet {
    /// Reads the canonical comma-joined word encoding.
    pub(crate) fn decode(text: &str, limit: u32) -> Result<Self, DecodeError> {
        let mut set = Self::empty(limit);
        let found: Vec<&str> = text.split(',').map(str::trim).collect();
        if found.len() != set.words.len() {
            return Err(DecodeError::WordCount {
                expected: set.words.len(),
                found: found.len(),
            });
        }
        for (slot, raw) in set.words.iter_mut().zip(found) {
            *slot = raw
                .parse::<u32>()
                .map_err(|_| DecodeError::BadWord(raw.to_string()))?;
        }
        Ok(set)
    }

    /// The canonical comma-joined word encoding.
    pub(crate) fn encode(&self) -> String {
        self.words
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn limit(&self) -> u32 {
        self.limit
    }

    pub(crate) fn insert(&mut self, volume: u32) {
        debug_assert!((1..=self.limit).contains(&volume));
        let index = volume - 1;
        self.words[(index / WORD_BITS) as usize] |= 1 << (index % WORD_BITS);
    }

    pub(crate) fn contains(&self, volume: u32) -> bool {
        if volume == 0 || volume > self.limit {
            return false;
        }
        let index = volume - 1;
        self.words[(index / WORD_BITS) as usize] & (1 << (index % WORD_BITS)) != 0
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    pub(crate) fn is_full(&self) -> bool {
        self.words.iter().all(|&word| word == u32::MAX)
    }

    pub(crate) fn len(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// Lowest volume not owned, or `limit + 1` when every tracked slot is filled.
    pub(crate) fn next_missing(&self) -> u32 {
        for (k, &word) in self.words.iter().enumerate() {
            if word != u32::MAX {
                return k as u32 * WORD_BITS + word.trailing_ones() + 1;
            }
        }
        warn!(
            limit = self.limit,
            "next volume would exceed the volume limit"
        );
        self.limit + 1
    }

    /// Owned volumes as ascending runs, e.g. `"1, 3-5, 7, 52"`, or `"None"`.
    pub(crate) fn readable(&self) -> String {
        let mut runs: Vec<String> = Vec::new();
        let mut start: Option<u32> = None;

        for (k, &word) in self.words.iter().enumerate() {
            let base = k as u32 * WORD_BITS;
            if word == 0 {
                if let Some(first) = start.take() {
                    runs.push(format_run(first, base));
                }
                continue;
            }
            for bit in 0..WORD_BITS {
                let owned = word & (1 << bit) != 0;
                match (owned, start) {
                    (true, None) => start = Some(base + bit + 1),
                    (false, Some(first)) => {
                        runs.push(format_run(first, base + bit));
                        start = None;
                    }
                    _ => {}
                }
            }
        }
        if let Some(first) = start {
            runs.push(format_run(first, self.limit));
        }

        if runs.is_empty() {
            "None".to_string()
        } else {
            runs.join(", ")
        }
    }

    /// One `'0'`/`'1'` per tracked volume, volume 1 leftmost.
    pub(crate) fn to_binary_string(&self) -> String {
        (1..=self.limit)
            .map(|volume| if self.contains(volume) { '1' } else { '0' })
            .collect()
    }

    /// True when some unowned volume sits between two owned ones.
    pub(crate) fn has_gap(&self) -> bool {
        GAP_PATTERN.is_match(&self.to_binary_string())
    }

    pub(crate) fn merge_add(&mut self, delta: &VolumeSet) {
        self.check_same_limit(delta);
        for (word, add) in self.words.iter_mut().zip(&delta.words) {
            *word |= add;
        }
    }

    /// Clears every volume present in `delta`. Returns true if nothing is owned afterwards.
    pub(crate) fn merge_remove(&mut self, delta: &VolumeSet) -> bool {
        self.check_same_limit(delta);
        for (word, remove) in self.words.iter_mut().zip(&delta.words) {
            *word &= !remove;
        }
        self.is_empty()
    }

    fn check_same_limit(&self, other: &VolumeSet) {
        assert_eq!(
            self.limit, other.limit,
            "cannot merge volume sets with different limits"
        );
    }

    /// The same volumes tracked under `new_limit`, or `None` if some owned volume would fall
    /// beyond it.
    pub(crate) fn relimit(&self, new_limit: u32) -> Option<VolumeSet> {
        let mut out = Self::empty(new_limit);
        let kept = out.words.len().min(self.words.len());
        if self.words[kept..].iter().any(|&word| word != 0) {
            return None;
        }
        out.words[..kept].copy_from_slice(&self.words[..kept]);
        Some(out)
    }
}

/// Reads a volume number. Numbers too large for `i64` saturate, so they still compare as
/// beyond any limit instead of being taken for garbage.
fn parse_volume(text: &str) -> Option<i64> {
    match text.parse::<i64>() {
        Ok(volume) => Some(volume),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

fn format_run(first: u32, last: u32) -> String {
    if first == last {
        first.to_string()
    } else {
        format!("{first}-{last}")
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
