//! Content Disarm helpers
//!
//! Character-level transforms shared by the pipeline stages: control and
//! invisible character stripping, angle-bracket escaping, homoglyph folding
//! and the canonical form used for injection matching.

/// Characters that render as nothing but can split keywords or reorder text.
pub fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}' // Zero-width chars, LRM/RLM
            | '\u{202A}'..='\u{202E}' // Directional formatting
            | '\u{2060}'..='\u{2064}' // Word joiner, invisible operators
            | '\u{2066}'..='\u{2069}' // Directional isolates
            | '\u{FEFF}' // BOM
    )
}

/// Control characters other than the ordinary whitespace we keep.
pub fn is_disallowed_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\t' | '\r')
}

/// Removes control and invisible characters.
///
/// Space, tab, newline and carriage return are kept. Returns `None` when
/// nothing was removed.
pub fn strip_control_chars(input: &str) -> Option<String> {
    if !input
        .chars()
        .any(|c| is_disallowed_control(c) || is_invisible(c))
    {
        return None;
    }

    Some(
        input
            .chars()
            .filter(|&c| !is_disallowed_control(c) && !is_invisible(c))
            .collect(),
    )
}

/// Replaces `<` and `>` with their HTML entities. Returns `None` when the
/// input has neither.
pub fn escape_angle_brackets(input: &str) -> Option<String> {
    if !input.contains(|c: char| c == '<' || c == '>') {
        return None;
    }

    let mut output = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            c => output.push(c),
        }
    }
    Some(output)
}

/// Maps common Cyrillic and Greek lookalikes to their ASCII counterparts.
pub fn fold_confusable(c: char) -> char {
    match c {
        '\u{0430}' | '\u{03B1}' => 'a', // Cyrillic a, Greek alpha
        '\u{0441}' => 'c',              // Cyrillic es
        '\u{0435}' | '\u{03B5}' => 'e', // Cyrillic e, Greek epsilon
        '\u{04BB}' => 'h',              // Cyrillic shha
        '\u{0456}' | '\u{0131}' | '\u{03B9}' => 'i', // Ukrainian i, dotless i, iota
        '\u{0458}' => 'j',              // Cyrillic je
        '\u{043E}' | '\u{03BF}' => 'o', // Cyrillic o, Greek omicron
        '\u{0440}' | '\u{03C1}' => 'p', // Cyrillic er, Greek rho
        '\u{0455}' => 's',              // Cyrillic dze
        '\u{0445}' => 'x',              // Cyrillic ha
        '\u{0443}' => 'y',              // Cyrillic u
        c => c,
    }
}

/// Canonical form of `input` for pattern matching.
///
/// Invisible characters dropped, homoglyphs folded, punctuation replaced by
/// spaces, whitespace collapsed, lowercased. Word characters (including `_`)
/// survive, so `im_start` stays matchable.
pub fn canonicalize(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut pending_space = false;

    for c in input.chars() {
        if is_invisible(c) {
            continue;
        }
        let c = fold_confusable(c);
        if c.is_alphanumeric() || c == '_' {
            if pending_space && !output.is_empty() {
                output.push(' ');
            }
            pending_space = false;
            output.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_normal_text_untouched() {
        assert_eq!(strip_control_chars("Hello, world! This is a test."), None);
    }

    #[test]
    fn test_strip_control_chars() {
        let output = strip_control_chars("Hello\x00World\x1F!").unwrap();
        assert_eq!(output, "HelloWorld!");
    }

    #[test]
    fn test_strip_zero_width() {
        let output = strip_control_chars("Hello\u{200B}World\u{FEFF}!").unwrap();
        assert_eq!(output, "HelloWorld!");
    }

    #[test]
    fn test_strip_preserves_whitespace() {
        assert_eq!(strip_control_chars("Line 1\nLine 2\r\nCol\tB"), None);
    }

    #[test]
    fn test_escape_angle_brackets() {
        assert_eq!(
            escape_angle_brackets("<div>hi</div>").unwrap(),
            "&lt;div&gt;hi&lt;/div&gt;"
        );
        assert_eq!(escape_angle_brackets("a & b"), None);
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(
            canonicalize("  IGNORE...previous\u{200B}   instructions!! "),
            "ignore previous instructions"
        );
        assert_eq!(canonicalize("<|im_start|>"), "im_start");
    }

    #[test]
    fn test_canonicalize_folds_homoglyphs() {
        // Cyrillic o and Cyrillic e inside Latin words
        assert_eq!(canonicalize("ign\u{043E}re previ\u{043E}us"), "ignore previous");
        assert_eq!(canonicalize("d\u{0435}v\u{0435}loper mode"), "developer mode");
    }
}
