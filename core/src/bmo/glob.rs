//! Shared glob-pattern matching for tool allow/deny chains, hook matchers,
//! and MCP agent/readonly tool filters. All of it is `fnmatch`-equivalent
//! (`*` and `?` wildcards), backed by the `glob` crate rather than a
//! hand-rolled matcher.

use glob::Pattern;

pub struct GlobSet {
    patterns: Vec<Pattern>,
}

impl GlobSet {
    pub fn new(raw: &[String]) -> Self {
        let patterns = raw
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(candidate))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// One-shot convenience for a single glob check without building a `GlobSet`.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    Pattern::new(pattern)
        .map(|p| p.matches(candidate))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches() {
        assert!(glob_match("mcp__github__*", "mcp__github__create_issue"));
        assert!(!glob_match("mcp__github__*", "mcp__hass__toggle"));
        assert!(glob_match("*", "anything"));
    }
}
