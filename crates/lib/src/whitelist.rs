//! Command whitelist: decides which command lines may be handed to the shell.
//!
//! Matching is purely token-literal. A pattern is split on whitespace; its first
//! token is the command name, and the rest is either `*` (any arguments) or an
//! exact argument sequence. Shell metacharacters are not interpreted.

use std::fmt;

/// Wildcard marker accepted as the second token of a pattern.
const WILDCARD: &str = "*";

/// One configured whitelist entry (e.g. `"ls"`, `"ls *"`, `"systemctl status nginx"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPattern {
    raw: String,
}

impl CommandPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The pattern text as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, command: &str) -> bool {
        matches(&self.raw, command)
    }
}

impl fmt::Display for CommandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// True if `command` is permitted by `pattern`.
///
/// - Either side empty (after whitespace tokenization) never matches.
/// - Command names (first tokens) must be equal.
/// - A bare name, or a name followed by `*`, allows any arguments.
/// - Otherwise the argument tails must be equal after whitespace normalization.
pub fn matches(pattern: &str, command: &str) -> bool {
    let pattern: Vec<&str> = pattern.split_whitespace().collect();
    let command: Vec<&str> = command.split_whitespace().collect();
    let (Some((p_name, p_args)), Some((c_name, c_args))) =
        (pattern.split_first(), command.split_first())
    else {
        return false;
    };
    if p_name != c_name {
        return false;
    }
    match p_args.first() {
        None => true,
        Some(&WILDCARD) => true,
        Some(_) => p_args.join(" ") == c_args.join(" "),
    }
}

/// Ordered, read-only list of patterns loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    patterns: Vec<CommandPattern>,
}

impl Whitelist {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(CommandPattern::new).collect(),
        }
    }

    /// First pattern (in configured order) that permits `command`.
    pub fn find(&self, command: &str) -> Option<&CommandPattern> {
        self.patterns.iter().find(|p| p.matches(command))
    }

    pub fn allows(&self, command: &str) -> bool {
        self.find(command).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_allows_any_arguments() {
        assert!(matches("ls", "ls -la"));
        assert!(matches("ls", "ls"));
        assert!(matches("ls", "  ls   -la  /tmp "));
    }

    #[test]
    fn wildcard_allows_any_arguments() {
        assert!(matches("ls *", "ls -la /tmp"));
        assert!(matches("ls *", "ls"));
        // Tokens after the wildcard are ignored.
        assert!(matches("ls * -x", "ls /etc"));
    }

    #[test]
    fn exact_arguments_must_match() {
        assert!(!matches("ls -la", "ls -l"));
        assert!(!matches("ls -la", "ls"));
        assert!(!matches("ls -la", "ls -la /tmp"));
        assert!(matches("ls -la", "ls -la"));
        assert!(matches("ls  -la   /tmp", "ls -la /tmp"));
    }

    #[test]
    fn command_name_must_match_exactly() {
        assert!(!matches("ls", "lsblk"));
        assert!(!matches("ls *", "cat /etc/passwd"));
        assert!(!matches("ls", "LS"));
    }

    #[test]
    fn empty_sides_never_match() {
        assert!(!matches("", "ls"));
        assert!(!matches("   ", "ls"));
        assert!(!matches("ls", ""));
        assert!(!matches("ls", " \t\n"));
        assert!(!matches("", ""));
    }

    #[test]
    fn metacharacters_are_plain_tokens() {
        // Accepted risk: a bare-name pattern lets chained commands through.
        assert!(matches("echo", "echo hi; rm -rf /tmp/x"));
        assert!(!matches("echo hi", "echo hi; id"));
    }

    #[test]
    fn whitelist_returns_first_matching_pattern() {
        let wl = Whitelist::new(["uptime", "ls *", "ls -la"]);
        assert_eq!(wl.find("ls -la").map(|p| p.as_str()), Some("ls *"));
        assert_eq!(wl.find("uptime").map(|p| p.as_str()), Some("uptime"));
        assert!(wl.find("whoami").is_none());
        assert_eq!(wl.len(), 3);
    }

    #[test]
    fn whitelist_decision_is_order_independent() {
        let patterns = ["ls -la", "df -h", "uptime", "cat *"];
        let commands = [
            "ls -la",
            "ls -l",
            "df -h",
            "df",
            "uptime --pretty",
            "cat /etc/hosts",
            "whoami",
            "",
        ];
        let forward = Whitelist::new(patterns);
        let reversed = Whitelist::new(patterns.iter().rev().copied());
        let rotated = Whitelist::new(patterns.iter().cycle().skip(2).take(4).copied());
        for c in commands {
            assert_eq!(forward.allows(c), reversed.allows(c), "command {:?}", c);
            assert_eq!(forward.allows(c), rotated.allows(c), "command {:?}", c);
        }
    }

    #[test]
    fn empty_whitelist_allows_nothing() {
        let wl = Whitelist::default();
        assert!(wl.is_empty());
        assert!(!wl.allows("ls"));
    }
}
