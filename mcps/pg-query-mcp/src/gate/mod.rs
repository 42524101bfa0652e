//! Query safety gate
//!
//! Decides whether LLM-generated SQL text may be executed as a read-only
//! statement. The gate is a pure function of the query text and its mode:
//! no I/O, no shared mutable state, safe to call from any task.
//!
//! The default [`GateMode::Lexical`] gate strips comments, then requires a
//! leading `SELECT` and the absence of any [`ForbiddenKeyword`] as a whole
//! word. It is deliberately conservative (keywords inside string literals
//! are rejected too) and it is not a SQL parser: it does not catch volatile
//! functions or `SELECT ... INTO`. [`GateMode::Parsed`] adds a real parse
//! on top and changes the verdict for `WITH` queries and stacked statements.

mod lexer;
mod parsed;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use lexer::strip_comments;

static SELECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SELECT\b").expect("Invalid regex"));

static FORBIDDEN_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE)\b")
        .expect("Invalid regex")
});

// ============================================================================
// Types
// ============================================================================

/// Statement-level keywords that indicate data or schema mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForbiddenKeyword {
    Insert,
    Update,
    Delete,
    Drop,
    Create,
    Alter,
    Truncate,
}

impl ForbiddenKeyword {
    pub const ALL: [ForbiddenKeyword; 7] = [
        ForbiddenKeyword::Insert,
        ForbiddenKeyword::Update,
        ForbiddenKeyword::Delete,
        ForbiddenKeyword::Drop,
        ForbiddenKeyword::Create,
        ForbiddenKeyword::Alter,
        ForbiddenKeyword::Truncate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForbiddenKeyword::Insert => "INSERT",
            ForbiddenKeyword::Update => "UPDATE",
            ForbiddenKeyword::Delete => "DELETE",
            ForbiddenKeyword::Drop => "DROP",
            ForbiddenKeyword::Create => "CREATE",
            ForbiddenKeyword::Alter => "ALTER",
            ForbiddenKeyword::Truncate => "TRUNCATE",
        }
    }

    /// Case-insensitive lookup of a single word
    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|keyword| keyword.as_str().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for ForbiddenKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gate refused a query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("query is empty")]
    Empty,

    #[error("query must start with SELECT")]
    NotSelect,

    #[error("query contains forbidden keyword {0}")]
    ForbiddenKeyword(ForbiddenKeyword),

    #[error("query could not be parsed: {0}")]
    Unparseable(String),

    #[error("expected exactly one statement, found {0}")]
    MultipleStatements(usize),

    #[error("SELECT ... INTO creates a table")]
    SelectInto,

    #[error("query contains a data-modifying statement")]
    DataModifying,
}

/// Outcome of a gate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }

    /// Converts to a `Result` so callers can use `?`
    pub fn into_result(self) -> Result<(), RejectReason> {
        match self {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected(reason) => Err(reason),
        }
    }
}

/// Which validation strategy the gate applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Comment stripping, `SELECT` prefix and keyword blacklist
    #[default]
    Lexical,
    /// Single parsed query statement, plus the keyword blacklist
    Parsed,
}

// ============================================================================
// Gate
// ============================================================================

/// Query safety gate configured with a [`GateMode`]
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryGate {
    mode: GateMode,
}

impl QueryGate {
    pub fn new(mode: GateMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn check(&self, query: &str) -> Verdict {
        match self.mode {
            GateMode::Lexical => check_query(query),
            GateMode::Parsed => parsed::check_parsed(query),
        }
    }
}

/// Lexical gate verdict for `query`
pub fn check_query(query: &str) -> Verdict {
    let cleaned = strip_comments(query);
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Verdict::Rejected(RejectReason::Empty);
    }

    if !SELECT_PREFIX.is_match(cleaned) {
        return Verdict::Rejected(RejectReason::NotSelect);
    }

    match find_forbidden_keyword(cleaned) {
        Some(keyword) => Verdict::Rejected(RejectReason::ForbiddenKeyword(keyword)),
        None => Verdict::Accepted,
    }
}

/// Returns true if `query` is a read-only `SELECT` under the lexical gate
pub fn is_safe_select(query: &str) -> bool {
    check_query(query).is_accepted()
}

/// First whole-word forbidden keyword in already comment-stripped text
pub(crate) fn find_forbidden_keyword(cleaned: &str) -> Option<ForbiddenKeyword> {
    // (?i) folds non-ASCII look-alikes (e.g. U+017F) that are not keywords
    FORBIDDEN_KEYWORD
        .find_iter(cleaned)
        .find_map(|m| ForbiddenKeyword::from_word(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_accepted() {
        assert!(is_safe_select("SELECT * FROM users"));
    }

    #[test]
    fn test_drop_rejected_by_prefix() {
        assert_eq!(
            check_query("DROP TABLE users"),
            Verdict::Rejected(RejectReason::NotSelect)
        );
    }

    #[test]
    fn test_stacked_drop_rejected() {
        assert_eq!(
            check_query("SELECT * FROM users; DROP TABLE users;"),
            Verdict::Rejected(RejectReason::ForbiddenKeyword(ForbiddenKeyword::Drop))
        );
    }

    #[test]
    fn test_keyword_in_trailing_comment_accepted() {
        assert!(is_safe_select("SELECT * FROM users -- DROP TABLE users"));
    }

    #[test]
    fn test_lowercase_with_leading_whitespace_accepted() {
        assert!(is_safe_select("  select id, name from accounts"));
    }

    #[test]
    fn test_keyword_substrings_accepted() {
        assert!(is_safe_select("SELECT created_at FROM logs"));
        assert!(is_safe_select("SELECT updated_at FROM t"));
        assert!(is_safe_select("SELECT id AS updatedat, dropped, alterations FROM t"));
    }

    #[test]
    fn test_each_forbidden_keyword_rejected() {
        for keyword in ForbiddenKeyword::ALL {
            let query = format!("SELECT 1 FROM t WHERE x = 1 {}", keyword.as_str().to_lowercase());
            assert_eq!(
                check_query(&query),
                Verdict::Rejected(RejectReason::ForbiddenKeyword(keyword)),
                "{}",
                query
            );
        }
    }

    #[test]
    fn test_keyword_in_string_literal_rejected() {
        assert!(!is_safe_select("SELECT * FROM audit WHERE action = 'DELETE'"));
    }

    #[test]
    fn test_keyword_in_block_comment_accepted() {
        assert!(is_safe_select("SELECT /* UPDATE users SET x = 1 */ id FROM users"));
    }

    #[test]
    fn test_leading_comment_then_select() {
        assert!(is_safe_select("-- fetch all\n/* users */ SELECT * FROM users"));
    }

    #[test]
    fn test_comment_hiding_stacked_statement() {
        // A naive line-comment-first strip would swallow the DROP
        assert!(!is_safe_select("SELECT 1 /* -- */ ; DROP TABLE t"));
        assert!(!is_safe_select("SELECT '--'; DROP TABLE t"));
        assert!(!is_safe_select("SELECT $$--$$; DROP TABLE t"));
    }

    #[test]
    fn test_carriage_return_ends_line_comment() {
        assert_eq!(
            check_query("SELECT 1 --x\r; DROP TABLE users"),
            Verdict::Rejected(RejectReason::ForbiddenKeyword(ForbiddenKeyword::Drop))
        );
        assert!(is_safe_select("SELECT 1 -- DROP\r\nFROM t"));
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        assert_eq!(check_query(""), Verdict::Rejected(RejectReason::Empty));
        assert_eq!(check_query("   \n\t"), Verdict::Rejected(RejectReason::Empty));
        assert_eq!(
            check_query("-- only a comment"),
            Verdict::Rejected(RejectReason::Empty)
        );
    }

    #[test]
    fn test_literal_limitations_rejected() {
        assert!(!is_safe_select("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_safe_select("(SELECT 1)"));
        assert!(!is_safe_select("SELECTED FROM t"));
    }

    #[test]
    fn test_prefix_requires_word_boundary() {
        assert!(is_safe_select("SELECT*FROM t"));
        assert!(is_safe_select("select\n1"));
    }

    #[test]
    fn test_lookalike_does_not_mask_later_keyword() {
        assert_eq!(
            check_query("SELECT 1 AS \u{17f}elect_insert, x AS in\u{17f}ert FROM t; DROP TABLE t"),
            Verdict::Rejected(RejectReason::ForbiddenKeyword(ForbiddenKeyword::Drop))
        );
    }

    #[test]
    fn test_forbidden_keyword_from_word() {
        assert_eq!(ForbiddenKeyword::from_word("truncate"), Some(ForbiddenKeyword::Truncate));
        assert_eq!(ForbiddenKeyword::from_word("Update"), Some(ForbiddenKeyword::Update));
        assert_eq!(ForbiddenKeyword::from_word("updated"), None);
    }

    #[test]
    fn test_verdict_helpers() {
        let verdict = check_query("DELETE FROM t");
        assert!(!verdict.is_accepted());
        assert_eq!(verdict.reason(), Some(&RejectReason::NotSelect));
        assert!(check_query("SELECT 1").into_result().is_ok());
    }

    #[test]
    fn test_gate_default_mode_is_lexical() {
        let gate = QueryGate::default();
        assert_eq!(gate.mode(), GateMode::Lexical);
        assert!(!gate.check("WITH x AS (SELECT 1) SELECT * FROM x").is_accepted());
    }

    #[test]
    fn test_reason_messages() {
        assert_eq!(
            RejectReason::ForbiddenKeyword(ForbiddenKeyword::Alter).to_string(),
            "query contains forbidden keyword ALTER"
        );
        assert_eq!(RejectReason::NotSelect.to_string(), "query must start with SELECT");
    }
}
