//! Text utilities shared by derivations and filters.
//!
//! # Templates
//!
//! `{{column}}` placeholders are replaced by the rendered value of the named
//! column. Whitespace inside the braces is ignored, unknown columns render as
//! the empty string and an unterminated `{{` is copied literally.
//!
//! # LIKE patterns
//!
//! `%` matches zero or more characters, `_` exactly one. Matching is
//! case-sensitive and operates on Unicode scalar values.

use crate::row::RowRef;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

/// Renders a `{{column}}` template against a row.
///
/// ```
/// use horizon_core::schema::{ColumnDef, Schema};
/// use horizon_core::text::render_template;
/// use horizon_core::Value;
///
/// let schema = Schema::new(vec![ColumnDef::new("first"), ColumnDef::new("last")]).unwrap();
/// let values = vec![Value::from("Ada"), Value::from("Lovelace")];
/// let row = schema.row_ref(&values);
/// assert_eq!(render_template("{{last}}, {{ first }}", &row), "Lovelace, Ada");
/// ```
pub fn render_template(template: &str, row: &RowRef<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                let _ = write!(out, "{}", row.get(name));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// SQL LIKE pattern matching.
///
/// ```
/// use horizon_core::text::like;
/// assert!(like("hello", "h%o"));
/// assert!(like("hello", "_ello"));
/// assert!(!like("hello", "world"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();

    // Greedy scan with a single backtrack point at the last `%`.
    let (mut vi, mut pi) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while vi < v.len() {
        if pi < p.len() && (p[pi] == '_' || (p[pi] != '%' && p[pi] == v[vi])) {
            vi += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, vi));
            pi += 1;
        } else if let Some((sp, sv)) = star {
            pi = sp + 1;
            vi = sv + 1;
            star = Some((sp, sv + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, Schema};
    use crate::Value;
    use alloc::vec;

    #[test]
    fn test_render_template() {
        let schema = Schema::new(vec![ColumnDef::new("id"), ColumnDef::new("name")]).unwrap();
        let values = vec![Value::Int64(3), Value::from("Zed")];
        let row = schema.row_ref(&values);

        assert_eq!(render_template("#{{id}} {{name}}", &row), "#3 Zed");
        assert_eq!(render_template("{{missing}}!", &row), "!");
        assert_eq!(render_template("no placeholders", &row), "no placeholders");
        assert_eq!(render_template("open {{name", &row), "open {{name");
    }

    #[test]
    fn test_like() {
        assert!(like("", ""));
        assert!(like("", "%"));
        assert!(like("abc", "abc"));
        assert!(like("abc", "a%"));
        assert!(like("abc", "%c"));
        assert!(like("abcabc", "%b%c"));
        assert!(like("abc", "a_c"));
        assert!(!like("abc", "a_"));
        assert!(!like("abc", "%d%"));
        assert!(!like("ab", "abc"));
    }
}
