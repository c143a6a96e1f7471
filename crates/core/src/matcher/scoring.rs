//! Title and size agreement scoring between a local torrent and a remote hit.

use std::collections::HashSet;

use crate::client::LocalTorrent;
use crate::search::SearchCandidate;

/// Similarity in [0, 1] between two canonical titles.
///
/// Substring containment either way counts as a full match; release names
/// frequently wrap the bare title in year/quality decorations. Otherwise
/// the score is the token-overlap ratio against the larger token set.
pub fn title_similarity(local: &str, candidate: &str) -> f64 {
    if local.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if local.contains(candidate) || candidate.contains(local) {
        return 1.0;
    }

    let local_tokens: HashSet<&str> = local.split_whitespace().collect();
    let candidate_tokens: HashSet<&str> = candidate.split_whitespace().collect();
    let overlap = local_tokens.intersection(&candidate_tokens).count();
    let larger = local_tokens.len().max(candidate_tokens.len());
    if larger == 0 {
        return 0.0;
    }
    overlap as f64 / larger as f64
}

/// Absolute size delta in bytes between the local torrent and a candidate.
///
/// When the candidate exposes a file manifest the deltas are summed per
/// matched filename, and a local file with no counterpart contributes its
/// full size. Without a manifest the declared totals are compared.
pub fn size_delta(local: &LocalTorrent, candidate: &SearchCandidate) -> u64 {
    match &candidate.files {
        Some(remote_files) => {
            let mut delta: u64 = 0;
            for local_file in &local.files {
                match remote_files.iter().find(|f| f.path == local_file.path) {
                    Some(remote) => {
                        delta += local_file.size_bytes.abs_diff(remote.size_bytes);
                    }
                    None => {
                        delta += local_file.size_bytes;
                    }
                }
            }
            delta
        }
        None => local.total_size.abs_diff(candidate.size_bytes),
    }
}

/// Composite candidate score in [0, 1]: 0.7 title + 0.3 size agreement.
///
/// Size agreement is 1.0 at zero delta and falls off linearly to 0.0 at
/// the tolerance boundary.
pub fn composite_score(title: f64, delta: u64, tolerance: u64) -> f64 {
    let size_agreement = if tolerance == 0 {
        if delta == 0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - (delta as f64 / tolerance as f64).min(1.0)
    };
    (0.7 * title + 0.3 * size_agreement).clamp(0.0, 1.0)
}
