use log::debug;

use crate::config::ResolveConfig;
use crate::models::Candidate;

/// Collapses overlapping candidates and puts survivors in reading order
pub struct CandidateResolver {
    pub proximity: u32,
    pub row_band: u32,
}

impl CandidateResolver {
    pub fn new(config: &ResolveConfig) -> Self {
        Self {
            proximity: config.proximity,
            row_band: config.row_band.max(1),
        }
    }

    /// Greedy single-pass deduplication in input order.
    ///
    /// A candidate with no accepted neighbour (per-axis distance below
    /// `proximity`) is appended. Otherwise it replaces the first close
    /// accepted entry whose score it strictly beats, or is dropped.
    ///
    /// This is not an optimal assignment: when a candidate sits between two
    /// accepted entries that are not close to each other, it can replace one
    /// of them and leave two close survivors behind.
    pub fn dedup(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let mut accepted: Vec<Candidate> = Vec::new();

        for candidate in candidates {
            if !accepted.iter().any(|a| a.is_close(candidate, self.proximity)) {
                accepted.push(*candidate);
                continue;
            }

            if let Some(slot) = accepted
                .iter_mut()
                .find(|a| a.is_close(candidate, self.proximity) && candidate.score > a.score)
            {
                debug!(
                    "Template {} (score {:.3}) replaces template {} (score {:.3}) at ({}, {})",
                    candidate.label, candidate.score, slot.label, slot.score, slot.x, slot.y
                );
                *slot = *candidate;
            }
        }

        accepted
    }

    /// Sort by row band (`y / row_band`) and then by x; stable for equal keys
    pub fn sort_reading_order(&self, candidates: &mut [Candidate]) {
        let band = self.row_band;
        candidates.sort_by_key(|c| (c.y / band, c.x));
    }

    pub fn resolve(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let mut resolved = self.dedup(candidates);
        self.sort_reading_order(&mut resolved);
        debug!("{} candidates resolved to {}", candidates.len(), resolved.len());
        resolved
    }
}

impl Default for CandidateResolver {
    fn default() -> Self {
        Self::new(&ResolveConfig::default())
    }
}
