//! The sanitization pipeline.
//!
//! Raw text goes in, a [`SanitizationResult`] comes out. The pipeline never
//! fails: empty or absent input yields a clean, safe result.
//!
//! ## Stages
//!
//! | # | Stage | Threat raised |
//! |---|-------|---------------|
//! | 1 | Truncate to `max_input_length` | `oversized_input` |
//! | 2 | Delete lines matching an injection pattern | `prompt_injection` |
//! | 3 | Remove code spans (strict only) | `code_injection` |
//! | 4 | Escape `<` and `>` | |
//! | 4a | Redact PII (optional) | `pii_detected` |
//! | 5 | Normalize whitespace (per line; at most one blank line) | |
//! | 6 | Compress character and token runs | `excessive_repetition` |
//! | 7 | Truncate long lines, append `...` | |
//! | 8 | Record control and invisible characters | `control_characters` |
//! | 9 | Clamp length, assess threat level | |
//!
//! Order matters: each stage sees the output of the one before. Every stage
//! consumes a [`Stage`] value and returns a new one. Control and invisible
//! characters are physically removed right after truncation, so no stage
//! ever sees them; stage 8 only records that removal.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assessor::ThreatAssessor;
use crate::cdr;
use crate::models::{Modification, SanitizationResult, ThreatKind};
use crate::patterns::PatternTable;
use crate::pii;

/// Maximum input length in characters.
pub const MAX_INPUT_LENGTH: usize = 5000;
/// Maximum line length in characters before the truncation marker.
pub const MAX_LINE_LENGTH: usize = 500;
/// Longest run of one identical character kept.
pub const MAX_CHAR_REPETITION: usize = 50;
/// Longest run of one identical whitespace-delimited token kept.
pub const MAX_WORD_REPETITION: usize = 10;

/// Appended to lines cut at `max_line_length`.
pub const LINE_TRUNCATION_MARKER: &str = "...";

// Removing a span can splice its neighbours into a new match.
const MAX_CODE_REMOVAL_PASSES: usize = 4;

/// Consecutive blank lines kept by default-mode whitespace normalization.
const MAX_BLANK_LINES: usize = 1;

static DEFAULT_SANITIZER: Lazy<Sanitizer> = Lazy::new(Sanitizer::new);

/// Limits and threat policy for a [`Sanitizer`].
///
/// # Example
///
/// ```rust
/// use shield_sanitizer::SanitizerConfig;
///
/// let config = SanitizerConfig::new()
///     .with_max_input_length(2000)
///     .with_max_line_length(200);
/// assert_eq!(config.max_input_length, 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizerConfig {
    pub max_input_length: usize,
    pub max_line_length: usize,
    pub max_char_repetition: usize,
    pub max_word_repetition: usize,
    pub assessor: ThreatAssessor,
}

impl SanitizerConfig {
    pub fn new() -> Self {
        Self {
            max_input_length: MAX_INPUT_LENGTH,
            max_line_length: MAX_LINE_LENGTH,
            max_char_repetition: MAX_CHAR_REPETITION,
            max_word_repetition: MAX_WORD_REPETITION,
            assessor: ThreatAssessor::new(),
        }
    }

    #[must_use]
    pub fn with_max_input_length(mut self, limit: usize) -> Self {
        self.max_input_length = limit;
        self
    }

    #[must_use]
    pub fn with_max_line_length(mut self, limit: usize) -> Self {
        self.max_line_length = limit;
        self
    }

    #[must_use]
    pub fn with_max_char_repetition(mut self, limit: usize) -> Self {
        self.max_char_repetition = limit;
        self
    }

    #[must_use]
    pub fn with_max_word_repetition(mut self, limit: usize) -> Self {
        self.max_word_repetition = limit;
        self
    }

    #[must_use]
    pub fn with_assessor(mut self, assessor: ThreatAssessor) -> Self {
        self.assessor = assessor;
        self
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Run the code-injection stage.
    pub strict: bool,
    /// Keep indentation and blank lines; only trailing whitespace per line is trimmed.
    pub preserve_formatting: bool,
    /// Escape `<` and `>`.
    pub html_escape: bool,
    /// Replace PII with placeholders.
    pub redact_pii: bool,
}

impl SanitizeOptions {
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn preserve_formatting(mut self, preserve: bool) -> Self {
        self.preserve_formatting = preserve;
        self
    }

    #[must_use]
    pub fn html_escape(mut self, escape: bool) -> Self {
        self.html_escape = escape;
        self
    }

    #[must_use]
    pub fn redact_pii(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            strict: true,
            preserve_formatting: false,
            html_escape: true,
            redact_pii: true,
        }
    }
}

/// Intermediate pipeline value. Stages consume one and return the next.
#[derive(Debug, Clone)]
struct Stage {
    text: String,
    threats: BTreeSet<ThreatKind>,
    modifications: Vec<Modification>,
    /// Lines deleted by the injection stage, still scanned for code.
    quarantined: Vec<String>,
    /// Control or invisible characters were removed up front; recorded in
    /// the control-character slot.
    control_stripped: bool,
}

impl Stage {
    fn start(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            threats: BTreeSet::new(),
            modifications: Vec::new(),
            quarantined: Vec::new(),
            control_stripped: false,
        }
    }

    fn rewrite(mut self, text: String, modification: Modification) -> Self {
        self.text = text;
        self.modifications.push(modification);
        self
    }

    fn note(mut self, modification: Modification) -> Self {
        self.modifications.push(modification);
        self
    }

    fn flag(mut self, kind: ThreatKind) -> Self {
        self.threats.insert(kind);
        self
    }
}

/// Stateless sanitizer over the shared [`PatternTable`].
///
/// Holds only immutable configuration, so one instance can serve any number
/// of concurrent callers.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    config: SanitizerConfig,
    patterns: &'static PatternTable,
}

impl Sanitizer {
    /// Sanitizer with the default limits and threat policy.
    pub fn new() -> Self {
        Self::with_config(SanitizerConfig::default())
    }

    pub fn with_config(config: SanitizerConfig) -> Self {
        Self {
            config,
            patterns: PatternTable::global(),
        }
    }

    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Runs the full pipeline. Total: never panics on any input.
    pub fn sanitize(&self, text: Option<&str>, options: &SanitizeOptions) -> SanitizationResult {
        let raw = match text {
            Some(raw) if !raw.is_empty() => raw,
            _ => return SanitizationResult::clean(0),
        };
        let original_length = raw.chars().count();

        let stage = Stage::start(raw);
        let stage = self.truncate(stage);
        let stage = Self::disarm_control_chars(stage);
        let stage = self.remove_prompt_injection(stage);
        let stage = if options.strict {
            self.remove_code_patterns(stage)
        } else {
            stage
        };
        let stage = if options.html_escape {
            Self::escape_html(stage)
        } else {
            stage
        };
        let stage = if options.redact_pii {
            self.redact_pii(stage)
        } else {
            stage
        };
        let stage = Self::normalize_whitespace(stage, options.preserve_formatting);
        let stage = self.compress_repetition(stage);
        let stage = self.enforce_line_length(stage);
        let stage = Self::record_control_chars(stage);
        let stage = self.clamp_length(stage);

        self.finish(stage, original_length)
    }

    fn truncate(&self, stage: Stage) -> Stage {
        match truncate_chars(&stage.text, self.config.max_input_length) {
            Some(prefix) => {
                let prefix = prefix.to_owned();
                debug!(
                    "Input truncated to {} characters",
                    self.config.max_input_length
                );
                stage
                    .rewrite(prefix, Modification::TruncatedToMaxLength)
                    .flag(ThreatKind::OversizedInput)
            }
            None => stage,
        }
    }

    /// Removes control and invisible characters before any matching or
    /// compression sees the text, so they cannot hide runs or split keywords.
    fn disarm_control_chars(mut stage: Stage) -> Stage {
        if let Some(text) = cdr::strip_control_chars(&stage.text) {
            debug!("Control or invisible characters removed");
            stage.text = text;
            stage.control_stripped = true;
        }
        stage
    }

    fn injection_match(&self, line: &str) -> Option<&'static str> {
        self.patterns
            .first_injection_match(line)
            .or_else(|| self.patterns.first_injection_match(&cdr::canonicalize(line)))
    }

    fn remove_prompt_injection(&self, stage: Stage) -> Stage {
        let lines: Vec<&str> = stage.text.split('\n').collect();
        let mut removed = vec![false; lines.len()];

        for (i, line) in lines.iter().enumerate() {
            if let Some(name) = self.injection_match(line) {
                debug!("Injection pattern '{}' matched on line {}", name, i + 1);
                removed[i] = true;
            }
        }

        // Phrases split across two surviving lines
        for i in 1..lines.len() {
            if removed[i - 1] || removed[i] {
                continue;
            }
            let joined = format!("{} {}", lines[i - 1], lines[i]);
            if let Some(name) = self.injection_match(&joined) {
                debug!("Injection pattern '{}' matched across lines {}-{}", name, i, i + 1);
                removed[i - 1] = true;
                removed[i] = true;
            }
        }

        if !removed.contains(&true) {
            return stage;
        }

        let mut kept = Vec::with_capacity(lines.len());
        let mut quarantined = Vec::new();
        for (line, gone) in lines.iter().zip(&removed) {
            if *gone {
                quarantined.push((*line).to_owned());
            } else {
                kept.push(*line);
            }
        }
        let text = kept.join("\n");

        let mut stage = stage
            .rewrite(text, Modification::RemovedPromptInjection)
            .flag(ThreatKind::PromptInjection);
        stage.quarantined.extend(quarantined);
        stage
    }

    fn remove_code_patterns(&self, stage: Stage) -> Stage {
        let detected = self.patterns.has_code_match(&stage.text)
            || stage
                .quarantined
                .iter()
                .any(|line| self.patterns.has_code_match(line));
        if !detected {
            return stage;
        }

        let mut text = stage.text.clone();
        for _ in 0..MAX_CODE_REMOVAL_PASSES {
            let mut changed = false;
            for pattern in self.patterns.code() {
                if pattern.is_match(&text) {
                    debug!("Code pattern '{}' removed", pattern.name());
                    text = pattern.regex().replace_all(&text, "").into_owned();
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let stage = stage.flag(ThreatKind::CodeInjection);
        if text == stage.text {
            stage
        } else {
            stage.rewrite(text, Modification::RemovedCodePatterns)
        }
    }

    fn escape_html(stage: Stage) -> Stage {
        match cdr::escape_angle_brackets(&stage.text) {
            Some(text) => stage.rewrite(text, Modification::HtmlEscaped),
            None => stage,
        }
    }

    fn redact_pii(&self, stage: Stage) -> Stage {
        let redacted = pii::redact_with(self.patterns, &stage.text).into_owned();
        if redacted == stage.text {
            return stage;
        }
        stage
            .rewrite(redacted, Modification::RedactedPii)
            .flag(ThreatKind::PiiDetected)
    }

    fn normalize_whitespace(stage: Stage, preserve_formatting: bool) -> Stage {
        let text = if preserve_formatting {
            stage
                .text
                .split('\n')
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            collapse_whitespace(&stage.text)
        };

        if text == stage.text {
            stage
        } else {
            stage.rewrite(text, Modification::NormalizedWhitespace)
        }
    }

    fn compress_repetition(&self, stage: Stage) -> Stage {
        let chars = compress_char_runs(&stage.text, self.config.max_char_repetition);
        let source = chars.as_deref().unwrap_or(&stage.text);
        let tokens = compress_token_runs(source, self.config.max_word_repetition);

        match tokens.or(chars) {
            Some(text) => {
                debug!("Repetition compressed");
                stage
                    .rewrite(text, Modification::CompressedRepetition)
                    .flag(ThreatKind::ExcessiveRepetition)
            }
            None => stage,
        }
    }

    fn enforce_line_length(&self, stage: Stage) -> Stage {
        let limit = self.config.max_line_length;
        let mut changed = false;
        let lines: Vec<String> = stage
            .text
            .split('\n')
            .map(|line| match truncate_chars(line, limit) {
                Some(prefix) => {
                    changed = true;
                    format!("{prefix}{LINE_TRUNCATION_MARKER}")
                }
                None => line.to_owned(),
            })
            .collect();

        if changed {
            stage.rewrite(lines.join("\n"), Modification::TruncatedLongLines)
        } else {
            stage
        }
    }

    fn record_control_chars(stage: Stage) -> Stage {
        if stage.control_stripped {
            stage
                .note(Modification::StrippedControlCharacters)
                .flag(ThreatKind::ControlCharacters)
        } else {
            stage
        }
    }

    fn clamp_length(&self, stage: Stage) -> Stage {
        match truncate_chars(&stage.text, self.config.max_input_length) {
            Some(prefix) => {
                let text = drop_partial_entity(prefix).to_owned();
                stage.rewrite(text, Modification::ClampedOutputLength)
            }
            None => stage,
        }
    }

    fn finish(&self, stage: Stage, original_length: usize) -> SanitizationResult {
        let level = self.config.assessor.assess(&stage.threats);

        if !stage.threats.is_empty() {
            let kinds: Vec<&str> = stage.threats.iter().map(ThreatKind::as_str).collect();
            warn!(
                threats = ?kinds,
                threat_level = %level,
                original_length,
                sanitized_length = stage.text.chars().count(),
                "Sanitizer detected threats"
            );
        }

        SanitizationResult::new(
            stage.text,
            level,
            stage.threats,
            stage.modifications,
            original_length,
        )
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitizes `text` with the default limits.
///
/// HTML escaping and PII redaction are on; use [`Sanitizer::sanitize`] with
/// [`SanitizeOptions`] to switch them off.
pub fn sanitize(text: Option<&str>, strict: bool, preserve_formatting: bool) -> SanitizationResult {
    let options = SanitizeOptions::default()
        .strict(strict)
        .preserve_formatting(preserve_formatting);
    DEFAULT_SANITIZER.sanitize(text, &options)
}

/// Collapses horizontal whitespace within each line, trims every line and
/// keeps at most one blank line between paragraphs.
fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;
    for line in text.split('\n') {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run > MAX_BLANK_LINES {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(collapsed);
    }
    lines.join("\n").trim_matches('\n').to_owned()
}

/// Prefix of `text` holding at most `limit` characters, or `None` if the
/// text already fits.
fn truncate_chars(text: &str, limit: usize) -> Option<&str> {
    text.char_indices().nth(limit).map(|(idx, _)| &text[..idx])
}

/// Drops a trailing `&`, `&l`, `&lt`, `&g` or `&gt` cut short by clamping.
fn drop_partial_entity(text: &str) -> &str {
    if let Some(amp) = text.rfind('&') {
        let tail = &text[amp..];
        if ["&", "&l", "&lt", "&g", "&gt"].contains(&tail) {
            return &text[..amp];
        }
    }
    text
}

/// Caps runs of one identical character at `limit`.
fn compress_char_runs(text: &str, limit: usize) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    let mut run = 0usize;
    let mut changed = false;

    for c in text.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run = 1;
        }
        if run <= limit {
            out.push(c);
        } else {
            changed = true;
        }
    }

    changed.then_some(out)
}

/// Caps runs of one identical whitespace-delimited token at `limit`.
///
/// Dropped tokens take their preceding separator with them.
fn compress_token_runs(text: &str, limit: usize) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut prev: Option<&str> = None;
    let mut run = 0usize;
    let mut changed = false;

    for (start, end) in token_spans(text) {
        let token = &text[start..end];
        if prev == Some(token) {
            run += 1;
        } else {
            prev = Some(token);
            run = 1;
        }
        if run <= limit {
            out.push_str(&text[cursor..end]);
        } else {
            changed = true;
        }
        cursor = end;
    }

    if !changed {
        return None;
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

/// Byte spans of maximal non-whitespace runs.
fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (idx, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, idx));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThreatLevel;

    #[test]
    fn test_empty_and_absent_input() {
        for input in [None, Some("")] {
            let result = sanitize(input, true, false);
            assert_eq!(result.sanitized_text(), "");
            assert!(result.is_safe());
            assert_eq!(result.threat_level(), ThreatLevel::None);
        }
    }

    #[test]
    fn test_normal_text_unchanged() {
        let text = "Hello, I need help with the quarterly report.";
        let result = sanitize(Some(text), true, false);
        assert_eq!(result.sanitized_text(), text);
        assert!(result.is_safe());
        assert!(result.detected_threats().is_empty());
        assert!(!result.was_modified());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), Some("abc"));
        assert_eq!(truncate_chars("abc", 3), None);
        assert_eq!(truncate_chars("héllo", 2), Some("hé"));
    }

    #[test]
    fn test_drop_partial_entity() {
        assert_eq!(drop_partial_entity("a &l"), "a ");
        assert_eq!(drop_partial_entity("a &lt;"), "a &lt;");
        assert_eq!(drop_partial_entity("fish & chips"), "fish & chips");
    }

    #[test]
    fn test_compress_char_runs() {
        let input = "a".repeat(200);
        assert_eq!(compress_char_runs(&input, 50).unwrap(), "a".repeat(50));
        assert_eq!(compress_char_runs("aab", 2), None);
    }

    #[test]
    fn test_compress_token_runs() {
        let input = vec!["spam"; 15].join(" ");
        let output = compress_token_runs(&input, 10).unwrap();
        assert_eq!(output, vec!["spam"; 10].join(" "));
        assert_eq!(compress_token_runs("a b a b", 1), None);
    }

    #[test]
    fn test_token_runs_keep_trailing_text() {
        let input = format!("{} end", vec!["go"; 12].join(" "));
        let output = compress_token_runs(&input, 10).unwrap();
        assert_eq!(output, format!("{} end", vec!["go"; 10].join(" ")));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a \t b\n\n\n c  "), "a b\n\nc");
        assert_eq!(collapse_whitespace(" \n \n"), "");
    }

    #[test]
    fn test_token_spans() {
        assert_eq!(token_spans("  ab c\n"), vec![(2, 4), (5, 6)]);
        assert!(token_spans("   ").is_empty());
    }

    #[test]
    fn test_custom_limits() {
        let sanitizer = Sanitizer::with_config(SanitizerConfig::new().with_max_input_length(10));
        let result = sanitizer.sanitize(Some("abcdefghijklmnop"), &SanitizeOptions::default());
        assert_eq!(result.sanitized_text(), "abcdefghij");
        assert!(result.detected_threats().contains(&ThreatKind::OversizedInput));
        assert_eq!(result.threat_level(), ThreatLevel::Low);
    }

    #[test]
    fn test_options_builder() {
        let options = SanitizeOptions::default().strict(false).redact_pii(false);
        assert!(!options.strict);
        assert!(!options.redact_pii);
        assert!(options.html_escape);
    }
}
