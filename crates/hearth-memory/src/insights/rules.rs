//! The declarative correlation-rule table.
//!
//! Each [`CorrelationRule`] pairs a mention pattern (what the subject
//! reported) with a related-event selector (what it might correlate
//! with) and the sampling parameters. The evaluator in the parent
//! module is generic over this table; adding a correlation means adding
//! a row here, not writing a new pass.

/// How related events are selected and what counts as a match.
pub enum RelatedSelector {
    /// Vital readings of one type; a reading matches when its value is
    /// below `ceiling`. Matched values feed the insight template.
    VitalBelow {
        /// Metadata `type` of the vital, e.g. `"sleep"`.
        vital_type: &'static str,
        /// Exclusive upper bound for a matching reading.
        ceiling: f64,
    },
    /// Events whose description contains any of these keywords; any
    /// in-window hit counts as a match.
    Keywords(&'static [&'static str]),
}

/// Aggregates handed to a rule's insight template.
pub struct RuleMatch {
    /// Matched fraction of the sampled mentions, in `0.0..=1.0`.
    pub rate: f64,
    /// Values of the matching vital readings (empty for keyword rules).
    pub matched_values: Vec<f64>,
}

impl RuleMatch {
    /// Mean of the matched values.
    #[must_use]
    pub fn average_value(&self) -> f64 {
        if self.matched_values.is_empty() {
            return 0.0;
        }
        self.matched_values.iter().sum::<f64>() / self.matched_values.len() as f64
    }
}

/// One correlation rule: sampled mentions checked for a related event
/// within a proximity window.
pub struct CorrelationRule {
    /// Rule name, used in diagnostics and metrics labels.
    pub name: &'static str,
    /// Coarse SQL keyword prefilter for mention events.
    pub mention_keywords: &'static [&'static str],
    /// Word-boundary regex that confirms a prefiltered mention.
    pub mention_pattern: &'static str,
    /// What the mentions are correlated against.
    pub related: RelatedSelector,
    /// How far back both fetches reach.
    pub lookback_days: i64,
    /// Proximity window between a mention and a related event.
    pub window_hours: i64,
    /// Minimum related events before the rule runs.
    pub min_related: usize,
    /// Minimum mention events before the rule runs.
    pub min_mentions: usize,
    /// At most this many mentions are sampled, newest first.
    pub max_sampled: usize,
    /// Minimum match rate for an insight to be emitted.
    pub match_rate_threshold: f64,
    /// Renders the insight text from the aggregates.
    pub template: fn(&RuleMatch) -> String,
}

/// All correlation rules, evaluated independently per subject.
pub static CORRELATION_RULES: &[CorrelationRule] = &[
    CorrelationRule {
        name: "sleep_energy",
        mention_keywords: &[
            "tired", "fatigue", "exhausted", "energy", "drained", "sluggish", "worn out",
        ],
        mention_pattern: r"(?i)\b(tired|fatigued?|exhausted|no energy|low energy|drained|sluggish|worn out)\b",
        related: RelatedSelector::VitalBelow {
            vital_type: "sleep",
            ceiling: 6.0,
        },
        lookback_days: 7,
        window_hours: 24,
        min_related: 3,
        min_mentions: 2,
        max_sampled: 5,
        match_rate_threshold: 0.6,
        template: sleep_energy_text,
    },
    CorrelationRule {
        name: "stress_symptom",
        mention_keywords: &[
            "headache", "migraine", "stomach", "nausea", "dizzy", "pain", "rash", "cough",
        ],
        mention_pattern: r"(?i)\b(headache|migraine|stomach ?ache|stomach pain|nausea|nauseous|dizzy|dizziness|pain|rash|cough)\b",
        related: RelatedSelector::Keywords(&[
            "stress", "stressed", "stressful", "anxious", "anxiety", "overwhelmed",
        ]),
        lookback_days: 7,
        window_hours: 24,
        min_related: 3,
        min_mentions: 2,
        max_sampled: 5,
        match_rate_threshold: 0.5,
        template: stress_symptom_text,
    },
];

fn sleep_energy_text(outcome: &RuleMatch) -> String {
    format!(
        "Low energy lines up with short sleep: on nights averaging {:.1} hours \
         (under the 6-hour mark), fatigue was reported in {:.0}% of recent mentions.",
        outcome.average_value(),
        outcome.rate * 100.0
    )
}

fn stress_symptom_text(outcome: &RuleMatch) -> String {
    format!(
        "Symptom reports cluster around stressful periods: {:.0}% of recent \
         symptom mentions came within a day of a stress report.",
        outcome.rate * 100.0
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn every_rule_pattern_compiles() {
        for rule in CORRELATION_RULES {
            assert!(
                Regex::new(rule.mention_pattern).is_ok(),
                "rule {} has an invalid pattern",
                rule.name
            );
        }
    }

    #[test]
    fn fatigue_pattern_matches_expected_phrases() {
        let rule = &CORRELATION_RULES[0];
        let re = Regex::new(rule.mention_pattern).unwrap();
        assert!(re.is_match("Felt exhausted all afternoon"));
        assert!(re.is_match("she says she has no energy today"));
        assert!(!re.is_match("full of energetic play"));
    }

    #[test]
    fn sleep_template_embeds_average() {
        let outcome = RuleMatch {
            rate: 2.0 / 3.0,
            matched_values: vec![5.0, 5.5],
        };
        let text = sleep_energy_text(&outcome);
        assert!(text.contains("5.2 hours") || text.contains("5.3 hours"));
        assert!(text.contains("67%"));
    }

    #[test]
    fn average_of_no_values_is_zero() {
        let outcome = RuleMatch {
            rate: 0.5,
            matched_values: Vec::new(),
        };
        assert!((outcome.average_value() - 0.0).abs() < f64::EPSILON);
    }
}
