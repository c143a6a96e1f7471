//! Candidate validation: decides which remote hit, if any, matches a local
//! torrent closely enough to cross-seed.

mod scoring;

pub use scoring::{composite_score, size_delta, title_similarity};

use std::collections::HashMap;
use tracing::debug;

use crate::client::LocalTorrent;
use crate::metadata::{NameParser, NormalizedMetadata};
use crate::search::SearchCandidate;

/// Minimum title similarity for a candidate to be considered the same release.
const TITLE_THRESHOLD: f64 = 0.5;

/// Why validation produced no match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    NoCandidates,
    SizeMismatch,
    TitleMismatch,
}

impl NoMatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoMatchReason::NoCandidates => "no-candidates",
            NoMatchReason::SizeMismatch => "size-mismatch",
            NoMatchReason::TitleMismatch => "title-mismatch",
        }
    }
}

/// Outcome of validating one local torrent against its search candidates.
#[derive(Debug, Clone)]
pub enum MatchResult {
    Matched {
        candidate: SearchCandidate,
        score: f64,
    },
    NoMatch(NoMatchReason),
}

/// Scores candidates against a local torrent and picks the best acceptable one.
pub struct Matcher {
    parser: NameParser,
    tolerance_bytes: u64,
}

impl Matcher {
    pub fn new(tolerance_bytes: u64) -> Self {
        Self {
            parser: NameParser::new(),
            tolerance_bytes,
        }
    }

    /// Validate candidates for a local torrent.
    ///
    /// A candidate is acceptable when its title similarity reaches the
    /// threshold and its size delta stays within tolerance, boundary
    /// included. Among acceptable candidates the highest composite score
    /// wins; score ties go to the site with fewer recorded successes.
    pub fn validate(
        &self,
        local: &LocalTorrent,
        metadata: &NormalizedMetadata,
        candidates: Vec<SearchCandidate>,
        site_success_counts: &HashMap<String, u64>,
    ) -> MatchResult {
        if candidates.is_empty() {
            return MatchResult::NoMatch(NoMatchReason::NoCandidates);
        }

        let mut best: Option<(SearchCandidate, f64)> = None;
        let mut saw_title_match = false;

        for candidate in candidates {
            let candidate_title = self.parser.canonicalize(&candidate.title);
            let similarity = title_similarity(&metadata.title, &candidate_title);
            if similarity < TITLE_THRESHOLD {
                debug!(
                    candidate = %candidate.title,
                    site = %candidate.site,
                    similarity = similarity,
                    "Candidate rejected on title"
                );
                continue;
            }
            saw_title_match = true;

            let delta = size_delta(local, &candidate);
            if delta > self.tolerance_bytes {
                debug!(
                    candidate = %candidate.title,
                    site = %candidate.site,
                    delta_bytes = delta,
                    tolerance_bytes = self.tolerance_bytes,
                    "Candidate rejected on size"
                );
                continue;
            }

            let score = composite_score(similarity, delta, self.tolerance_bytes);
            let replace = match &best {
                None => true,
                Some((current, current_score)) => {
                    if score > *current_score {
                        true
                    } else if score < *current_score {
                        false
                    } else {
                        let candidate_wins = site_success_counts
                            .get(&candidate.site)
                            .copied()
                            .unwrap_or(0);
                        let current_wins = site_success_counts
                            .get(&current.site)
                            .copied()
                            .unwrap_or(0);
                        candidate_wins < current_wins
                    }
                }
            };
            if replace {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((candidate, score)) => {
                debug!(
                    candidate = %candidate.title,
                    site = %candidate.site,
                    score = score,
                    "Candidate accepted"
                );
                MatchResult::Matched { candidate, score }
            }
            None if saw_title_match => MatchResult::NoMatch(NoMatchReason::SizeMismatch),
            None => MatchResult::NoMatch(NoMatchReason::TitleMismatch),
        }
    }
}
