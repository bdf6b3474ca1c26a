//! Ordered first-match-wins rule evaluation.
//!
//! Match rules map a regex pattern to an identity. Both the rule list and
//! the candidate list are ordered, and the result depends only on those
//! orders: for each candidate in turn, the first rule whose pattern matches
//! anywhere in the candidate wins. Two rules may both match, so evaluation
//! must never iterate an unordered structure.

use regex::Regex;

use crate::identity::Identity;

/// A single pattern-to-identity rule.
///
/// Rules are declared in configuration as an ordered list; declaration
/// order is precedence order.
#[derive(Debug, Clone)]
pub struct MatchRule {
    /// Pattern matched anywhere within a candidate string.
    pub pattern: Regex,
    /// Identity selected when the pattern matches.
    pub identity: Identity,
}

impl MatchRule {
    /// Create a rule from an already-compiled pattern.
    pub fn new(pattern: Regex, identity: Identity) -> Self {
        Self { pattern, identity }
    }
}

/// Find the identity selected by the first matching (candidate, rule) pair.
///
/// Candidates are tried in order; for each candidate, rules are tried in
/// order. Returns `None` when no pair matches - that is a normal outcome
/// (the caller falls through to the next resolution step), not an error.
pub fn find_match<'r, C, S>(candidates: C, rules: &'r [MatchRule]) -> Option<&'r Identity>
where
    C: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for candidate in candidates {
        let candidate = candidate.as_ref();
        for rule in rules {
            if rule.pattern.is_match(candidate) {
                return Some(&rule.identity);
            }
        }
    }
    None
}
