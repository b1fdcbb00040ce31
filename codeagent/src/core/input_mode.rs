//! Decide whether task text travels as an argument or through stdin.

use std::fmt;

/// Task text longer than this many characters is sent through stdin.
pub const MAX_ARGUMENT_CHARS: usize = 800;

/// Why stdin mode was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinReason {
    /// Data was piped into the wrapper.
    Piped,
    /// The task argument was the stdin marker.
    Explicit,
    Newline,
    Backslash,
    DoubleQuote,
    SingleQuote,
    Backtick,
    Dollar,
    /// Longer than [`MAX_ARGUMENT_CHARS`].
    TooLong,
}

impl StdinReason {
    pub fn label(self) -> &'static str {
        match self {
            StdinReason::Piped => "piped input",
            StdinReason::Explicit => "explicit \"-\"",
            StdinReason::Newline => "newline",
            StdinReason::Backslash => "backslash",
            StdinReason::DoubleQuote => "double-quote",
            StdinReason::SingleQuote => "single-quote",
            StdinReason::Backtick => "backtick",
            StdinReason::Dollar => "dollar",
            StdinReason::TooLong => "length>800",
        }
    }
}

impl fmt::Display for StdinReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Characters that are unsafe to pass through argv, with their reason.
const UNSAFE_CHARS: [(char, StdinReason); 6] = [
    ('\n', StdinReason::Newline),
    ('\\', StdinReason::Backslash),
    ('"', StdinReason::DoubleQuote),
    ('\'', StdinReason::SingleQuote),
    ('`', StdinReason::Backtick),
    ('$', StdinReason::Dollar),
];

/// Outcome of input mode selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDecision {
    pub reasons: Vec<StdinReason>,
}

impl InputDecision {
    pub fn use_stdin(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Select stdin or argument mode for `task_text`.
///
/// Rules are checked in order (piped, explicit marker, unsafe character,
/// length); any match selects stdin mode. All matches are recorded so the
/// caller can log why.
pub fn select_input_mode(task_text: &str, explicit_stdin: bool, piped: bool) -> InputDecision {
    let mut reasons = Vec::new();
    if piped {
        reasons.push(StdinReason::Piped);
    }
    if explicit_stdin {
        reasons.push(StdinReason::Explicit);
    }
    for (ch, reason) in UNSAFE_CHARS {
        if task_text.contains(ch) {
            reasons.push(reason);
        }
    }
    if task_text.chars().count() > MAX_ARGUMENT_CHARS {
        reasons.push(StdinReason::TooLong);
    }
    InputDecision { reasons }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_short_text_uses_argument() {
        let decision = select_input_mode("analyze code", false, false);
        assert!(!decision.use_stdin());
    }

    #[test]
    fn piped_input_selects_stdin() {
        let decision = select_input_mode("piped task text", false, true);
        assert_eq!(decision.reasons, vec![StdinReason::Piped]);
    }

    #[test]
    fn explicit_marker_selects_stdin() {
        let decision = select_input_mode("explicit task text", true, false);
        assert_eq!(decision.reasons, vec![StdinReason::Explicit]);
    }

    #[test]
    fn backslash_selects_stdin() {
        let decision = select_input_mode(r"C:\repo\file.go", false, false);
        assert_eq!(decision.reasons, vec![StdinReason::Backslash]);
    }

    #[test]
    fn each_unsafe_char_is_reported() {
        let decision = select_input_mode("a\nb \"c\" 'd' `e` $f", false, false);
        assert_eq!(
            decision.reasons,
            vec![
                StdinReason::Newline,
                StdinReason::DoubleQuote,
                StdinReason::SingleQuote,
                StdinReason::Backtick,
                StdinReason::Dollar,
            ]
        );
    }

    #[test]
    fn length_boundary() {
        let at_limit = "a".repeat(MAX_ARGUMENT_CHARS);
        assert!(!select_input_mode(&at_limit, false, false).use_stdin());

        let over = "a".repeat(MAX_ARGUMENT_CHARS + 1);
        assert_eq!(
            select_input_mode(&over, false, false).reasons,
            vec![StdinReason::TooLong]
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let text = "é".repeat(MAX_ARGUMENT_CHARS);
        assert!(!select_input_mode(&text, false, false).use_stdin());
    }
}
