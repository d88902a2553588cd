//! Column selection by regular expression.
//!
//! Patterns are searched anywhere in a column name (`CD4` matches `CD45_int`);
//! anchor with `^`/`$` for exact matches.

use regex::Regex;

use crate::error::CellError;

/// Columns whose name contains a match for `pattern`, in column order.
pub fn matching_columns(pattern: &str, columns: &[String]) -> Result<Vec<String>, CellError> {
    let regex = Regex::new(pattern)?;
    Ok(columns
        .iter()
        .filter(|name| regex.is_match(name))
        .cloned()
        .collect())
}

/// Union of the matches of every pattern.
///
/// Patterns are applied in order; a column matched by several patterns is
/// listed once, at its first match.
pub fn regex_search_list<S: AsRef<str>>(
    patterns: &[S],
    columns: &[String],
) -> Result<Vec<String>, CellError> {
    let mut selected: Vec<String> = Vec::new();
    for pattern in patterns {
        for name in matching_columns(pattern.as_ref(), columns)? {
            if !selected.contains(&name) {
                selected.push(name);
            }
        }
    }
    Ok(selected)
}
