//! Background insight detection.
//!
//! [`InsightDetector::detect`] runs one pass for a subject: every
//! correlation rule in [`rules::CORRELATION_RULES`] plus the
//! habit-improvement check, each independently fault-isolated. Writes
//! go only through the store's deduplicating insight insert, so a rule
//! that re-derives an existing observation is a no-op.

pub mod rules;

use std::sync::Arc;

use metrics::counter;
use regex::Regex;
use tracing::{debug, instrument};

use hearth_core::diagnostics::Diagnostic;
use hearth_core::event::{EventKind, EventMemory};
use hearth_core::insight::Insight;
use hearth_core::issue::ActiveIssue;
use hearth_core::time::{days_ago_rfc3339, hours_between, parse_rfc3339};
use hearth_store::{CreateInsightOptions, MemoryStore};

use rules::{CorrelationRule, RelatedSelector, RuleMatch, CORRELATION_RULES};

/// How far back habit-improvement readings reach.
const HABIT_LOOKBACK_DAYS: i64 = 365;

/// Minimum readings for the habit rule, total and per side of the
/// issue's first-reported date.
const HABIT_MIN_READINGS: usize = 4;
const HABIT_MIN_PER_SIDE: usize = 2;

/// Fixed confidence for habit-improvement insights.
const HABIT_CONFIDENCE: f64 = 0.8;

/// Vitals tracked by the habit rule with their improvement thresholds
/// (percent change of the post-report mean over the pre-report mean).
const HABIT_VITALS: &[(&str, &[&str], f64)] = &[
    ("sleep", &["sleep"], 10.0),
    ("water", &["water", "hydration"], 15.0),
];

/// Result of one detection pass.
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    /// Insights actually inserted (duplicates are dropped silently by
    /// the store and do not appear here).
    pub emitted: Vec<Insight>,
    /// Failures from individual rules; other rules still ran.
    pub diagnostics: Vec<Diagnostic>,
}

/// Evaluates the insight rules for one subject at a time.
pub struct InsightDetector {
    store: Arc<MemoryStore>,
}

impl InsightDetector {
    /// New detector over a shared store.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Run every rule for a subject. Rules are independent: a failure
    /// in one becomes a diagnostic and the rest still run.
    #[instrument(skip(self))]
    pub fn detect(&self, subject_id: &str) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();

        for rule in CORRELATION_RULES {
            match self.evaluate_correlation(subject_id, rule) {
                Ok(Some(insight)) => {
                    counter!("hearth_insights_emitted_total", "rule" => rule.name).increment(1);
                    outcome.emitted.push(insight);
                }
                Ok(None) => {}
                Err(diag) => outcome.diagnostics.push(diag),
            }
        }

        match self.evaluate_habit_improvement(subject_id) {
            Ok(mut insights) => {
                if !insights.is_empty() {
                    counter!("hearth_insights_emitted_total", "rule" => "habit_improvement")
                        .increment(insights.len() as u64);
                }
                outcome.emitted.append(&mut insights);
            }
            Err(diag) => outcome.diagnostics.push(diag),
        }

        debug!(
            subject_id,
            emitted = outcome.emitted.len(),
            failed_rules = outcome.diagnostics.len(),
            "insight detection pass finished"
        );
        outcome
    }

    /// Evaluate one correlation rule: sample recent mentions, look for
    /// a related event within the proximity window, emit when the match
    /// rate clears the threshold.
    fn evaluate_correlation(
        &self,
        subject_id: &str,
        rule: &CorrelationRule,
    ) -> Result<Option<Insight>, Diagnostic> {
        let diag = |message: String| {
            Diagnostic::new(format!("detector.{}", rule.name), message).for_subject(subject_id)
        };
        let since = days_ago_rfc3339(rule.lookback_days);

        let related: Vec<EventMemory> = match rule.related {
            RelatedSelector::VitalBelow { vital_type, .. } => self
                .store
                .events_by_kind_since(subject_id, EventKind::Vital, &since)
                .map_err(|err| diag(err.to_string()))?
                .into_iter()
                .filter(|event| event.vital_type() == Some(vital_type))
                .collect(),
            RelatedSelector::Keywords(keywords) => self
                .store
                .events_matching(subject_id, keywords, &since)
                .map_err(|err| diag(err.to_string()))?,
        };
        if related.len() < rule.min_related {
            return Ok(None);
        }

        let pattern =
            Regex::new(rule.mention_pattern).map_err(|err| diag(format!("bad pattern: {err}")))?;
        let mentions: Vec<EventMemory> = self
            .store
            .events_matching(subject_id, rule.mention_keywords, &since)
            .map_err(|err| diag(err.to_string()))?
            .into_iter()
            .filter(|event| pattern.is_match(&event.description))
            .collect();
        if mentions.len() < rule.min_mentions {
            return Ok(None);
        }

        let sampled = &mentions[..mentions.len().min(rule.max_sampled)];
        let mut matched = 0usize;
        let mut matched_values = Vec::new();
        for mention in sampled {
            let Some(hit) = nearest_within(mention, &related, rule.window_hours) else {
                continue;
            };
            match rule.related {
                RelatedSelector::VitalBelow { ceiling, .. } => {
                    if let Some(value) = hit.vital_value() {
                        if value < ceiling {
                            matched += 1;
                            matched_values.push(value);
                        }
                    }
                }
                RelatedSelector::Keywords(_) => matched += 1,
            }
        }

        let rate = matched as f64 / sampled.len() as f64;
        if rate < rule.match_rate_threshold {
            return Ok(None);
        }

        let text = (rule.template)(&RuleMatch {
            rate,
            matched_values,
        });
        self.store
            .record_insight(&CreateInsightOptions {
                subject_id,
                text: &text,
                confidence: rate,
                related_issue_id: None,
            })
            .map_err(|err| diag(err.to_string()))
    }

    /// Habit rule: for open issues labelled around sleep or hydration,
    /// compare mean vital readings before and after the issue was first
    /// reported and congratulate a clear improvement.
    fn evaluate_habit_improvement(&self, subject_id: &str) -> Result<Vec<Insight>, Diagnostic> {
        let diag = |message: String| {
            Diagnostic::new("detector.habit_improvement", message).for_subject(subject_id)
        };

        let issues = self
            .store
            .list_open_issues(subject_id)
            .map_err(|err| diag(err.to_string()))?;
        if issues.is_empty() {
            return Ok(Vec::new());
        }

        let since = days_ago_rfc3339(HABIT_LOOKBACK_DAYS);
        let vitals = self
            .store
            .events_by_kind_since(subject_id, EventKind::Vital, &since)
            .map_err(|err| diag(err.to_string()))?;

        let mut emitted = Vec::new();
        for issue in &issues {
            let Some((vital_type, threshold)) = habit_vital_for(&issue.label) else {
                continue;
            };
            let Some(improvement) = improvement_percent(issue, &vitals, vital_type) else {
                continue;
            };
            if improvement <= threshold {
                continue;
            }

            let text = format!(
                "Nice progress on \"{}\": average {vital_type} readings are up \
                 {improvement:.0}% since it was first reported. Keep it going.",
                issue.label
            );
            let inserted = self
                .store
                .record_insight(&CreateInsightOptions {
                    subject_id,
                    text: &text,
                    confidence: HABIT_CONFIDENCE,
                    related_issue_id: Some(&issue.id),
                })
                .map_err(|err| diag(err.to_string()))?;
            if let Some(insight) = inserted {
                emitted.push(insight);
            }
        }
        Ok(emitted)
    }
}

/// The related event closest in time to a mention, if any falls inside
/// the window.
fn nearest_within<'a>(
    mention: &EventMemory,
    related: &'a [EventMemory],
    window_hours: i64,
) -> Option<&'a EventMemory> {
    related
        .iter()
        .filter_map(|event| {
            hours_between(&mention.occurred_at, &event.occurred_at)
                .filter(|hours| *hours <= window_hours)
                .map(|hours| (hours, event))
        })
        .min_by_key(|(hours, _)| *hours)
        .map(|(_, event)| event)
}

/// Which habit vital (and improvement threshold) an issue label maps
/// to, if any.
fn habit_vital_for(label: &str) -> Option<(&'static str, f64)> {
    let label = label.to_lowercase();
    HABIT_VITALS
        .iter()
        .find(|(_, needles, _)| needles.iter().any(|needle| label.contains(needle)))
        .map(|(vital_type, _, threshold)| (*vital_type, *threshold))
}

/// Percent change of the mean reading after the issue's first report
/// over the mean before it. `None` when either side is too thin.
fn improvement_percent(
    issue: &ActiveIssue,
    vitals: &[EventMemory],
    vital_type: &str,
) -> Option<f64> {
    let first_reported = parse_rfc3339(&issue.first_reported_at)?;

    let mut before = Vec::new();
    let mut after = Vec::new();
    for event in vitals {
        if event.vital_type() != Some(vital_type) {
            continue;
        }
        let (Some(value), Some(occurred)) = (event.vital_value(), parse_rfc3339(&event.occurred_at))
        else {
            continue;
        };
        if occurred < first_reported {
            before.push(value);
        } else {
            after.push(value);
        }
    }

    if before.len() + after.len() < HABIT_MIN_READINGS
        || before.len() < HABIT_MIN_PER_SIDE
        || after.len() < HABIT_MIN_PER_SIDE
    {
        return None;
    }

    let before_mean = before.iter().sum::<f64>() / before.len() as f64;
    let after_mean = after.iter().sum::<f64>() / after.len() as f64;
    if before_mean <= f64::EPSILON {
        return None;
    }
    Some((after_mean - before_mean) / before_mean * 100.0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
