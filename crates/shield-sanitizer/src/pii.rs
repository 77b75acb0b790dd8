//! PII detection and redaction.
//!
//! Independent of the main pipeline so logging code can call it directly.
//! Redaction replaces every email, phone, card and SSN-like span with a
//! kind-specific placeholder. Placeholders contain no digits and no `@`, so
//! they never match a PII pattern themselves and redaction is idempotent.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::patterns::PatternTable;

/// Category of personally identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    Phone,
    CreditCard,
    Ssn,
}

impl PiiKind {
    /// Placeholder substituted for a redacted span of this kind.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiKind::Email => "[EMAIL_REDACTED]",
            PiiKind::Phone => "[PHONE_REDACTED]",
            PiiKind::CreditCard => "[CARD_REDACTED]",
            PiiKind::Ssn => "[SSN_REDACTED]",
        }
    }
}

impl fmt::Display for PiiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PiiKind::Email => "email",
            PiiKind::Phone => "phone",
            PiiKind::CreditCard => "credit_card",
            PiiKind::Ssn => "ssn",
        };
        f.write_str(name)
    }
}

/// A typed PII span. Offsets and lengths are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PiiMatch {
    pub kind: PiiKind,
    pub offset: usize,
    pub length: usize,
}

impl PiiMatch {
    fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Upper bound on redaction passes. Each pass that changes the text removes
/// at least one digit or `@`, so real inputs converge in one or two passes.
const MAX_REDACTION_PASSES: usize = 8;

/// Non-overlapping PII spans in `text`, ordered by offset.
///
/// Where spans overlap, the earlier one wins; at equal offsets the longer one
/// wins, then the higher-priority kind (table order).
pub(crate) fn find_pii(table: &PatternTable, text: &str) -> Vec<PiiMatch> {
    let mut candidates: Vec<(usize, PiiMatch)> = Vec::new();
    for (priority, pattern) in table.pii().iter().enumerate() {
        for m in pattern.regex().find_iter(text) {
            candidates.push((
                priority,
                PiiMatch {
                    kind: pattern.kind(),
                    offset: m.start(),
                    length: m.len(),
                },
            ));
        }
    }

    candidates.sort_by(|(pa, a), (pb, b)| {
        a.offset
            .cmp(&b.offset)
            .then(b.length.cmp(&a.length))
            .then(pa.cmp(pb))
    });

    let mut selected: Vec<PiiMatch> = Vec::with_capacity(candidates.len());
    let mut cursor = 0;
    for (_, candidate) in candidates {
        if candidate.offset >= cursor {
            cursor = candidate.end();
            selected.push(candidate);
        }
    }
    selected
}

fn redact_once(table: &PatternTable, text: &str) -> Option<String> {
    let matches = find_pii(table, text);
    if matches.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in &matches {
        out.push_str(&text[cursor..m.offset]);
        out.push_str(m.kind.placeholder());
        cursor = m.end();
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

pub(crate) fn redact_with<'a>(table: &PatternTable, text: &'a str) -> Cow<'a, str> {
    let mut current: Cow<'a, str> = Cow::Borrowed(text);
    for _ in 0..MAX_REDACTION_PASSES {
        match redact_once(table, &current) {
            Some(next) => current = Cow::Owned(next),
            None => break,
        }
    }
    current
}

/// Stateless PII guard over the shared [`PatternTable`].
#[derive(Debug, Clone, Copy)]
pub struct PiiGuard {
    table: &'static PatternTable,
}

impl PiiGuard {
    pub fn new() -> Self {
        Self {
            table: PatternTable::global(),
        }
    }

    /// Returns `false` if any PII pattern matches anywhere in `text`.
    pub fn is_safe_for_logging(&self, text: &str) -> bool {
        !self.table.pii().iter().any(|p| p.regex().is_match(text))
    }

    /// Replaces every PII span with its kind-specific placeholder.
    pub fn redact_pii(&self, text: &str) -> String {
        redact_with(self.table, text).into_owned()
    }

    /// The text itself when already safe to log, otherwise its redacted form.
    pub fn loggable<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.is_safe_for_logging(text) {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(self.redact_pii(text))
        }
    }

    /// Kinds of PII present in `text`, deduplicated, in first-seen order.
    pub fn detected_kinds(&self, text: &str) -> Vec<PiiKind> {
        let mut kinds = Vec::new();
        for m in find_pii(self.table, text) {
            if !kinds.contains(&m.kind) {
                kinds.push(m.kind);
            }
        }
        kinds
    }
}

impl Default for PiiGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `false` if `text` contains anything that looks like PII.
pub fn is_safe_for_logging(text: &str) -> bool {
    PiiGuard::new().is_safe_for_logging(text)
}

/// Redacts all PII in `text`. Idempotent.
pub fn redact_pii(text: &str) -> String {
    PiiGuard::new().redact_pii(text)
}
