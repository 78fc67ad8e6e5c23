//! The classifier's answer for one moderation attempt.

use serde::{Deserialize, Serialize};

/// Result of one successful classifier call.
///
/// A verdict built through [`ModerationVerdict::approved`] never carries
/// rejection reasons. Verdicts deserialized from a classifier response are
/// kept as received; see [`ModerationVerdict::is_consistent`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModerationVerdict {
    /// Whether the content may be published.
    pub approved: bool,
    /// Human-readable explanation of the decision.
    #[serde(default)]
    pub explanation: String,
    /// Rejection reasons in classifier order. Empty when approved.
    ///
    /// [`ModerationVerdict::rejected`] drops duplicates; deserialized lists
    /// are kept verbatim.
    #[serde(default)]
    pub rejection_reasons: Vec<String>,
    /// Detected language, empty if the classifier did not determine one.
    #[serde(default)]
    pub language_detected: String,
    /// Classifier confidence in the range 0.0 to 1.0.
    #[serde(default)]
    pub confidence: f64,
}

impl ModerationVerdict {
    /// Creates an approving verdict.
    #[must_use]
    pub fn approved(explanation: impl Into<String>) -> Self {
        Self {
            approved: true,
            explanation: explanation.into(),
            ..Self::default()
        }
    }

    /// Creates a rejecting verdict. Duplicate reasons are dropped, first one wins.
    #[must_use]
    pub fn rejected<I, S>(explanation: impl Into<String>, reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rejection_reasons: Vec<String> = Vec::new();
        for reason in reasons {
            let reason = reason.into();
            if !rejection_reasons.contains(&reason) {
                rejection_reasons.push(reason);
            }
        }

        Self {
            approved: false,
            explanation: explanation.into(),
            rejection_reasons,
            ..Self::default()
        }
    }

    /// Sets the detected language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_detected = language.into();
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Returns false for an approved verdict that still lists reasons.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !self.approved || self.rejection_reasons.is_empty()
    }
}
