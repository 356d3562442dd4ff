use std::sync::OnceLock;

use regex::Regex;

/// Utility for parsing SQLite constraint violation messages.
///
/// SQLite reports violations as `<KIND> constraint failed: <table>.<column>[, ...]`.
/// The parser extracts the `(table, column)` pairs from that tail, with the
/// compiled patterns cached for the lifetime of the process.
pub struct ConstraintParser;

/// Compiled regex patterns for constraint parsing
struct RegexPatterns {
    qualified_column: Regex,
    check_name: Regex,
}

impl RegexPatterns {
    fn new() -> Self {
        Self {
            // Matches "table.column" pairs after "constraint failed:"
            qualified_column: Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)")
                .expect("qualified column pattern is valid"),
            // Matches the constraint name of a CHECK failure
            check_name: Regex::new(r"CHECK constraint failed:\s*([A-Za-z0-9_]+)")
                .expect("check constraint pattern is valid"),
        }
    }
}

static REGEX_PATTERNS: OnceLock<RegexPatterns> = OnceLock::new();

impl ConstraintParser {
    fn patterns() -> &'static RegexPatterns {
        REGEX_PATTERNS.get_or_init(RegexPatterns::new)
    }

    /// Returns the part of the message after `constraint failed:`.
    fn failure_tail(message: &str) -> Option<&str> {
        message
            .split_once("constraint failed:")
            .map(|(_, tail)| tail.trim())
    }

    /// Extracts every `(table, column)` pair named by a constraint failure.
    ///
    /// ```
    /// use moto_repo::error::ConstraintParser;
    ///
    /// let pairs = ConstraintParser::qualified_columns(
    ///     "UNIQUE constraint failed: race_players.race_id, race_players.player_id",
    /// );
    /// assert_eq!(pairs.len(), 2);
    /// assert_eq!(pairs[1], ("race_players".to_string(), "player_id".to_string()));
    /// ```
    pub fn qualified_columns(message: &str) -> Vec<(String, String)> {
        let Some(tail) = Self::failure_tail(message) else {
            return Vec::new();
        };

        Self::patterns()
            .qualified_column
            .captures_iter(tail)
            .filter_map(|caps| {
                let table = caps.get(1)?.as_str().to_string();
                let column = caps.get(2)?.as_str().to_string();
                Some((table, column))
            })
            .collect()
    }

    /// Parses a unique constraint violation into `(entity, field)`.
    ///
    /// Composite keys are reported with their columns joined by `+`.
    pub fn parse_unique_violation(message: &str) -> Option<(String, String)> {
        let columns = Self::qualified_columns(message);
        let (entity, _) = columns.first()?.clone();
        let field = columns
            .iter()
            .map(|(_, column)| column.as_str())
            .collect::<Vec<_>>()
            .join("+");
        Some((entity, field))
    }

    /// Parses a not null constraint violation into `(entity, field)`.
    pub fn parse_not_null_violation(message: &str) -> Option<(String, String)> {
        Self::qualified_columns(message).into_iter().next()
    }

    /// Parses a check constraint violation into its constraint name.
    pub fn parse_check_violation(message: &str) -> Option<String> {
        Self::patterns()
            .check_name
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}
