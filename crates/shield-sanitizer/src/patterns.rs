//! Process-wide table of compiled detection patterns.
//!
//! The table is built once, on first use or when [`PatternTable::init`] is
//! called during startup, and is read-only afterwards. Every sanitizer and
//! PII call borrows the same `&'static PatternTable`, so concurrent callers
//! share it without locking.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pii::PiiKind;

static GLOBAL: Lazy<PatternTable> = Lazy::new(|| {
    PatternTable::build().expect("built-in detection patterns are valid regular expressions")
});

/// A named, compiled detection pattern.
#[derive(Debug)]
pub struct DetectionPattern {
    name: &'static str,
    regex: Regex,
}

impl DetectionPattern {
    fn new(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
        })
    }

    /// Short identifier used in debug logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// A compiled PII pattern tagged with the kind it detects.
#[derive(Debug)]
pub struct PiiPattern {
    kind: PiiKind,
    regex: Regex,
}

impl PiiPattern {
    fn new(kind: PiiKind, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            regex: Regex::new(pattern)?,
        })
    }

    pub fn kind(&self) -> PiiKind {
        self.kind
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Immutable set of injection, code and PII patterns.
#[derive(Debug)]
pub struct PatternTable {
    injection: Vec<DetectionPattern>,
    code: Vec<DetectionPattern>,
    pii: Vec<PiiPattern>,
}

impl PatternTable {
    /// The shared process-wide table.
    pub fn global() -> &'static PatternTable {
        &GLOBAL
    }

    /// Forces construction of the shared table.
    ///
    /// Call before serving requests so the first request does not pay the
    /// compilation cost.
    pub fn init() {
        Lazy::force(&GLOBAL);
    }

    /// Compiles the built-in pattern set.
    pub fn build() -> Result<Self, regex::Error> {
        Ok(Self {
            injection: Self::build_injection_patterns()?,
            code: Self::build_code_patterns()?,
            pii: Self::build_pii_patterns()?,
        })
    }

    pub fn injection(&self) -> &[DetectionPattern] {
        &self.injection
    }

    pub fn code(&self) -> &[DetectionPattern] {
        &self.code
    }

    /// PII patterns in redaction priority order.
    pub fn pii(&self) -> &[PiiPattern] {
        &self.pii
    }

    /// Name of the first injection pattern matching `text`, if any.
    pub fn first_injection_match(&self, text: &str) -> Option<&'static str> {
        self.injection
            .iter()
            .find(|p| p.is_match(text))
            .map(DetectionPattern::name)
    }

    /// Whether any code pattern matches `text`.
    pub fn has_code_match(&self, text: &str) -> bool {
        self.code.iter().any(|p| p.is_match(text))
    }

    // Each pattern must match either the raw line or its canonical form
    // (lowercase, punctuation replaced by spaces), so word-based patterns
    // avoid relying on punctuation.
    fn build_injection_patterns() -> Result<Vec<DetectionPattern>, regex::Error> {
        let specs: &[(&'static str, &str)] = &[
            // Instruction override
            (
                "ignore_instructions",
                r"(?i)\bignore\s+(?:all\s+|any\s+|the\s+|your\s+)*(?:previous|prior|above|earlier|preceding|all)\s+(?:instructions?|prompts?|commands?|rules?|directions?)",
            ),
            (
                "disregard_instructions",
                r"(?i)\bdisregard\s+(?:all\s+|any\s+|the\s+|your\s+)*(?:previous|prior|above|earlier|preceding|all)\s+(?:instructions?|prompts?|commands?|rules?|guidelines?)",
            ),
            (
                "forget_instructions",
                r"(?i)\bforget\s+(?:all\s+|the\s+|your\s+)*(?:previous|prior|above|earlier|all)\s+(?:instructions?|prompts?|commands?|rules?)",
            ),
            (
                "forget_everything",
                r"(?i)\bforget\s+everything\s+(?:you|i)\s+(?:know|said|were\s+told|have\s+been\s+told)",
            ),
            (
                "override_instructions",
                r"(?i)\boverride\s+(?:the\s+|your\s+|all\s+)?(?:previous|default|system|safety)\b",
            ),
            // Role injection
            (
                "system_role_reassignment",
                r"(?i)\bsystem\s*:?\s+you\s+are\b",
            ),
            (
                "role_marker",
                r"(?im)^\s*(?:system|assistant|developer)\s*:",
            ),
            (
                "new_instructions",
                r"(?i)\b(?:new|updated|revised)\s+(?:system\s+)?(?:instructions?|role|task|prompt)\s*:",
            ),
            (
                "your_new_role",
                r"(?i)\byour\s+new\s+(?:role|task|instructions?|persona|objective)\b",
            ),
            (
                "you_are_now",
                r"(?i)\byou\s+are\s+now\s+(?:a|an|in|the|my|no\s+longer)\b",
            ),
            (
                "pretend_to_be",
                r"(?i)\b(?:pretend|imagine)\s+(?:that\s+)?(?:you\s+are|you\s*'?\s*re|to\s+be)\s+(?:a|an|not|no)\b",
            ),
            (
                "act_as",
                r"(?i)\bact\s+as\s+(?:if|though|a|an)\b",
            ),
            (
                "you_must_obey",
                r"(?i)\byou\s+must\s+(?:now|always|ignore|obey)\b",
            ),
            (
                "from_now_on",
                r"(?i)\bfrom\s+now\s+on\s*,?\s+you\b",
            ),
            // Jailbreak phrasing
            (
                "privileged_mode",
                r"(?i)\b(?:sudo|developer|god|dan|jailbreak|unrestricted|debug)\s+mode\b",
            ),
            (
                "do_anything_now",
                r"(?i)\bdo\s+anything\s+now\b|\bjailbr(?:eak|oken)(?:ed|ing)?\b",
            ),
            (
                "prompt_extraction",
                r"(?i)\b(?:reveal|show|print|repeat|output|display|leak)\s+(?:me\s+)?(?:your|the)\s+(?:system\s+|initial\s+|hidden\s+|original\s+)?(?:prompt|instructions)\b",
            ),
            // Delimiter spoofing
            (
                "chat_template_token",
                r"(?i)<\|[a-z_]+\|>|\[/?inst\]|<</?sys>>|\bim_(?:start|end)\b",
            ),
            (
                "delimiter_spoofing",
                r"(?i)(?:-{3,}|={3,}|#{3,}|\*{3,})\s*(?:end|begin|start)\s+(?:of\s+)?(?:the\s+)?(?:system|user|input|prompt|instructions?|context)\b",
            ),
            (
                "instruction_tag",
                r"(?i)</?\s*(?:system|instructions?|prompt)\s*>",
            ),
        ];

        specs
            .iter()
            .map(|(name, pattern)| DetectionPattern::new(name, pattern))
            .collect()
    }

    fn build_code_patterns() -> Result<Vec<DetectionPattern>, regex::Error> {
        let specs: &[(&'static str, &str)] = &[
            // Fenced blocks first so their contents go with them
            ("fenced_code_block", r"(?s)```.*?```"),
            ("stray_code_fence", r"`{3,}"),
            ("inline_code_span", r"`[^`\n]+`"),
            ("script_block", r"(?is)<\s*script\b[^>]*>.*?<\s*/\s*script\s*>"),
            ("script_tag", r"(?i)<\s*/?\s*script\b[^>]*>"),
            ("embedded_object", r"(?i)<\s*(?:iframe|object|embed)\b[^>]*>"),
            ("script_uri_scheme", r"(?i)\b(?:java|vb)script\s*:"),
            ("html_data_uri", r"(?i)\bdata\s*:\s*text/html\S*"),
            (
                "event_handler_attribute",
                r#"(?i)\bon(?:error|load|unload|click|dblclick|mouse[a-z]+|pointer[a-z]+|key(?:down|up|press)|focus|blur|change|submit|input|abort|toggle|wheel|drag[a-z]*|animation[a-z]+)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#,
            ),
            ("dynamic_eval", r"(?i)\b(?:eval|exec)\s*\(|\b__import__\s*\("),
            ("shell_exec", r"(?i)\bos\.(?:system|popen)\s*\(|\bsubprocess\.[a-z_]+"),
        ];

        specs
            .iter()
            .map(|(name, pattern)| DetectionPattern::new(name, pattern))
            .collect()
    }

    // Order is redaction priority for overlapping matches.
    fn build_pii_patterns() -> Result<Vec<PiiPattern>, regex::Error> {
        Ok(vec![
            PiiPattern::new(
                PiiKind::Email,
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            )?,
            PiiPattern::new(PiiKind::CreditCard, r"\b(?:\d{4}[-\s]?){3}\d{4}\b")?,
            PiiPattern::new(PiiKind::Ssn, r"\b\d{3}[-\s]?\d{2}[-\s]?\d{4}\b")?,
            PiiPattern::new(
                PiiKind::Phone,
                r"(?:\+\d{1,3}[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b",
            )?,
            PiiPattern::new(
                PiiKind::Phone,
                r"\+\d{1,3}(?:[-.\s]?\d{1,4}){2,5}\b",
            )?,
        ])
    }
}
