//! # Conversion Policy Module
//!
//! Decide cosa fare del risultato di una conversione.
//!
//! ## Regola:
//! - Il WebP è "entro tolleranza" se `transcoded < original * size_tolerance`
//!   (default 1.1: si accetta fino al 10% di peggioramento per uniformità di formato)
//! - Una volta prodotto, il WebP sostituisce SEMPRE l'originale: la soglia
//!   cambia solo la classificazione nei log ("converted" vs "converted anyway")
//! - I file vuoti non vengono mai convertiti (`SkipReason::Empty`)
//!
//! Tutti i riferimenti testuali vengono riscritti a `.webp`: un WebP prodotto
//! non viene mai scartato.

use serde::{Deserialize, Serialize};

/// Size classification of a transcoded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeVerdict {
    /// Strictly smaller than the original
    Smaller,
    /// Not smaller, but under the accepted regression margin
    WithinTolerance,
    /// Over the margin, replaced anyway
    Larger,
}

/// Outcome of the keep/discard decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepDecision {
    /// Keep the transcoded file (and delete the source when deletion is on)
    pub keep_transcoded: bool,
    pub verdict: SizeVerdict,
}

impl KeepDecision {
    /// Whether the threshold rule accepted the output on size alone
    pub fn within_tolerance(&self) -> bool {
        self.verdict != SizeVerdict::Larger
    }

    /// Log label for the conversion
    pub fn label(&self) -> &'static str {
        if self.within_tolerance() {
            "converted"
        } else {
            "converted anyway"
        }
    }
}

/// Why a source file was not converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Zero-byte source
    Empty,
    /// A `.webp` sibling already exists and `force` is off
    AlreadyConverted,
}

/// Keep/discard rule for transcoded output
#[derive(Debug, Clone, Copy)]
pub struct ConversionPolicy {
    size_tolerance: f64,
}

impl ConversionPolicy {
    pub fn new(size_tolerance: f64) -> Self {
        Self { size_tolerance }
    }

    /// Files that must not reach the transcoder
    pub fn pre_check(&self, original_bytes: u64) -> Option<SkipReason> {
        (original_bytes == 0).then_some(SkipReason::Empty)
    }

    /// Classify the transcoded size against the original
    pub fn decide(&self, original_bytes: u64, transcoded_bytes: u64) -> KeepDecision {
        let verdict = if transcoded_bytes < original_bytes {
            SizeVerdict::Smaller
        } else if (transcoded_bytes as f64) < original_bytes as f64 * self.size_tolerance {
            SizeVerdict::WithinTolerance
        } else {
            SizeVerdict::Larger
        };

        KeepDecision {
            keep_transcoded: true,
            verdict,
        }
    }
}

impl Default for ConversionPolicy {
    fn default() -> Self {
        Self::new(1.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smaller_output() {
        let decision = ConversionPolicy::default().decide(1000, 400);
        assert_eq!(decision.verdict, SizeVerdict::Smaller);
        assert!(decision.keep_transcoded);
        assert_eq!(decision.label(), "converted");
    }

    #[test]
    fn test_within_tolerance() {
        let decision = ConversionPolicy::default().decide(1000, 1099);
        assert_eq!(decision.verdict, SizeVerdict::WithinTolerance);
        assert!(decision.within_tolerance());
    }

    #[test]
    fn test_larger_output_still_replaces() {
        let policy = ConversionPolicy::default();
        let decision = policy.decide(1000, 1200);
        assert_eq!(decision.verdict, SizeVerdict::Larger);
        assert!(decision.keep_transcoded);
        assert_eq!(decision.label(), "converted anyway");
    }

    #[test]
    fn test_decision_is_deterministic() {
        let policy = ConversionPolicy::new(1.1);
        let first = policy.decide(50_000, 48_000);
        for _ in 0..10 {
            assert_eq!(policy.decide(50_000, 48_000), first);
        }
    }

    #[test]
    fn test_empty_source_is_skipped() {
        let policy = ConversionPolicy::default();
        assert_eq!(policy.pre_check(0), Some(SkipReason::Empty));
        assert_eq!(policy.pre_check(1), None);
    }
}
