//! Threat aggregation.
//!
//! A [`ThreatAssessor`] turns the set of threat kinds raised by the pipeline
//! into one [`ThreatLevel`]:
//!
//! 1. Each kind maps to a baseline severity; the level is the maximum.
//! 2. An [`EscalationPolicy`] may then force a higher level for composite
//!    inputs. The default forces `High` when two or more distinct kinds were
//!    detected and at least one is an injection kind.
//!
//! The escalation rule is a tunable heuristic, not a classifier. It will not
//! catch every composite attack and deployments may replace it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{ThreatKind, ThreatLevel};

/// Rule that raises the aggregated level for composite inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationPolicy {
    /// Disabled policies never change the level.
    pub enabled: bool,
    /// Minimum number of distinct kinds before escalation applies.
    pub min_distinct_kinds: usize,
    /// Only escalate when at least one detected kind is an injection kind.
    pub require_injection: bool,
    /// Level forced when the rule fires.
    pub escalate_to: ThreatLevel,
}

/// Two or more distinct kinds including an injection kind escalate to `High`.
pub const DEFAULT_ESCALATION_POLICY: EscalationPolicy = EscalationPolicy {
    enabled: true,
    min_distinct_kinds: 2,
    require_injection: true,
    escalate_to: ThreatLevel::High,
};

impl EscalationPolicy {
    /// A policy that never escalates.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            ..DEFAULT_ESCALATION_POLICY
        }
    }

    /// Whether the rule fires for `threats`.
    pub fn applies_to(&self, threats: &BTreeSet<ThreatKind>) -> bool {
        self.enabled
            && threats.len() >= self.min_distinct_kinds
            && (!self.require_injection || threats.iter().any(ThreatKind::is_injection))
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        DEFAULT_ESCALATION_POLICY
    }
}

/// Baseline severity of a single kind, before escalation.
pub const fn baseline_severity(kind: ThreatKind) -> ThreatLevel {
    match kind {
        ThreatKind::PromptInjection | ThreatKind::CodeInjection => ThreatLevel::Medium,
        ThreatKind::ExcessiveRepetition
        | ThreatKind::ControlCharacters
        | ThreatKind::OversizedInput
        | ThreatKind::PiiDetected => ThreatLevel::Low,
    }
}

/// Aggregates per-stage threat signals into one severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatAssessor {
    severities: [ThreatLevel; ThreatKind::ALL.len()],
    policy: EscalationPolicy,
}

impl ThreatAssessor {
    /// Baseline severities with the default escalation policy.
    pub fn new() -> Self {
        Self {
            severities: ThreatKind::ALL.map(baseline_severity),
            policy: DEFAULT_ESCALATION_POLICY,
        }
    }

    /// Replaces the escalation policy.
    #[must_use]
    pub fn with_policy(mut self, policy: EscalationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the baseline severity of one kind.
    #[must_use]
    pub fn with_severity(mut self, kind: ThreatKind, level: ThreatLevel) -> Self {
        self.severities[Self::index(kind)] = level;
        self
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn severity_of(&self, kind: ThreatKind) -> ThreatLevel {
        self.severities[Self::index(kind)]
    }

    /// Aggregated level for a set of detected kinds.
    pub fn assess(&self, threats: &BTreeSet<ThreatKind>) -> ThreatLevel {
        let baseline = threats
            .iter()
            .map(|&kind| self.severity_of(kind))
            .max()
            .unwrap_or(ThreatLevel::None);

        if self.policy.applies_to(threats) {
            baseline.max(self.policy.escalate_to)
        } else {
            baseline
        }
    }

    fn index(kind: ThreatKind) -> usize {
        match kind {
            ThreatKind::PromptInjection => 0,
            ThreatKind::CodeInjection => 1,
            ThreatKind::ExcessiveRepetition => 2,
            ThreatKind::ControlCharacters => 3,
            ThreatKind::OversizedInput => 4,
            ThreatKind::PiiDetected => 5,
        }
    }
}

impl Default for ThreatAssessor {
    fn default() -> Self {
        Self::new()
    }
}
