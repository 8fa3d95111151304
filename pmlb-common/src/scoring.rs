//! Scoring engine
//!
//! Deterministic, side-effect free scoring of an [`AnnotationResult`] against the
//! [`KeywordLexicon`].
//!
//! **Algorithm:**
//! 1. Build the haystack: description, environment, summary, objects, actions and
//!    logos joined with single spaces, lowercased
//! 2. For each lexicon entry (declaration order), test for a raw substring match.
//!    Overlapping terms ("tote bag" and "tote") both count.
//! 3. Sum matched weights, clamp to [`SCORE_CAP`], scale to 0..=10 and round half up

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationResult;
use crate::lexicon::{KeywordLexicon, LexiconEntry};

/// Raw weight at which the score saturates at 10
pub const SCORE_CAP: u32 = 12;

/// Highest reachable score
pub const MAX_SCORE: u8 = 10;

/// Leaderboard-comparable score and the lexicon terms that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Integer score in 0..=10
    pub score: u8,
    /// Matched lexicon terms in lexicon order, each at most once
    pub matched: Vec<String>,
}

/// Full scoring detail, including per-term weights and the unclamped sum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub matches: Vec<LexiconEntry>,
    pub raw: u32,
    pub score: u8,
}

impl ScoreBreakdown {
    pub fn into_record(self) -> ScoreRecord {
        ScoreRecord {
            score: self.score,
            matched: self.matches.iter().map(|m| m.term.to_string()).collect(),
        }
    }
}

/// Scores annotations against a lexicon
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    lexicon: KeywordLexicon,
}

impl ScoringEngine {
    pub fn new(lexicon: KeywordLexicon) -> Self {
        Self { lexicon }
    }

    /// Lowercased search text for an annotation
    pub fn haystack(annotation: &AnnotationResult) -> String {
        annotation.combined_text().to_lowercase()
    }

    pub fn evaluate(&self, annotation: &AnnotationResult) -> ScoreBreakdown {
        let haystack = Self::haystack(annotation);

        // Lexicon terms are unique, so one pass yields each match exactly once
        let matches: Vec<LexiconEntry> = self
            .lexicon
            .entries()
            .iter()
            .filter(|e| haystack.contains(e.term))
            .copied()
            .collect();

        let raw: u32 = matches.iter().map(|m| m.weight).sum();

        ScoreBreakdown {
            matches,
            raw,
            score: scale(raw),
        }
    }

    pub fn score(&self, annotation: &AnnotationResult) -> ScoreRecord {
        self.evaluate(annotation).into_record()
    }
}

/// round(min(raw, cap) / cap * 10), half rounding up
fn scale(raw: u32) -> u8 {
    let capped = raw.min(SCORE_CAP);
    let scaled = (capped * u32::from(MAX_SCORE) * 2 + SCORE_CAP) / (SCORE_CAP * 2);
    scaled as u8
}

/// Score an annotation with the standard lexicon
pub fn compute_score(annotation: &AnnotationResult) -> ScoreRecord {
    ScoringEngine::default().score(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_rounding() {
        assert_eq!(scale(0), 0);
        assert_eq!(scale(1), 1); // 0.83
        assert_eq!(scale(3), 3); // 2.5 rounds up
        assert_eq!(scale(5), 4); // 4.17
        assert_eq!(scale(6), 5);
        assert_eq!(scale(9), 8); // 7.5 rounds up
        assert_eq!(scale(11), 9); // 9.17
        assert_eq!(scale(12), 10);
        assert_eq!(scale(40), 10);
    }

    #[test]
    fn test_empty_annotation_scores_zero() {
        let record = compute_score(&AnnotationResult::default());
        assert_eq!(record.score, 0);
        assert!(record.matched.is_empty());
    }

    #[test]
    fn test_case_insensitive_match() {
        let annotation = AnnotationResult {
            logos: vec!["NIKE swoosh".into()],
            ..Default::default()
        };
        let record = compute_score(&annotation);
        assert_eq!(record.matched, vec!["nike"]);
        assert_eq!(record.score, 2);
    }

    #[test]
    fn test_substring_not_word_boundary() {
        let annotation = AnnotationResult {
            objects: vec!["gold earring".into()],
            ..Default::default()
        };
        let breakdown = ScoringEngine::default().evaluate(&annotation);
        assert_eq!(breakdown.raw, 1);
        assert_eq!(breakdown.matches[0].term, "ring");
    }

    #[test]
    fn test_ignored_fields_do_not_contribute() {
        let annotation = AnnotationResult {
            content_type: "tote bag".into(),
            specific_style: "beanie".into(),
            production_quality: "film camera".into(),
            ..Default::default()
        };
        assert_eq!(compute_score(&annotation).score, 0);
    }
}
