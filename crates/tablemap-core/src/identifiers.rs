//! SQL identifier quoting and delimiting utilities.
//!
//! Table and column names are declared either plain (`users`) or already
//! delimited (`"User Table"`). The delimited spelling is what goes into SQL;
//! the raw spelling is what callers compare against.

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use tablemap_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Whether a declared identifier is wrapped in double quotes.
#[inline]
pub fn is_delimited(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('"') && name.ends_with('"')
}

/// Strip surrounding double quotes and undo doubled inner quotes.
///
/// ```
/// use tablemap_core::identifiers::unquote_ident;
///
/// assert_eq!(unquote_ident("\"Order Id\""), "Order Id");
/// assert_eq!(unquote_ident("plain"), "plain");
/// ```
pub fn unquote_ident(name: &str) -> String {
    if is_delimited(name) {
        name[1..name.len() - 1].replace("\"\"", "\"")
    } else {
        name.to_string()
    }
}

/// Raw and delimited spellings of one declared identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    raw: String,
    delimited: String,
}

impl Identifier {
    /// Build from a declaration; a quoted declaration keeps its quotes in
    /// the delimited form, a plain one is used verbatim in both.
    pub fn new(declared: &str) -> Self {
        Self {
            raw: unquote_ident(declared),
            delimited: declared.to_string(),
        }
    }

    /// Name without delimiters, used for exclusion matching and lookups.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Name as it appears in generated SQL.
    pub fn delimited(&self) -> &str {
        &self.delimited
    }

    pub fn is_delimited(&self) -> bool {
        is_delimited(&self.delimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_embedded_double_quote() {
        assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
    }

    #[test]
    fn test_quote_then_unquote() {
        for name in ["users", "first name", "a\"b", "用户"] {
            assert_eq!(unquote_ident(&quote_ident(name)), name);
        }
    }

    #[test]
    fn test_is_delimited() {
        assert!(is_delimited("\"Id\""));
        assert!(!is_delimited("Id"));
        assert!(!is_delimited("\""));
        assert!(!is_delimited("\"Id"));
    }

    #[test]
    fn test_identifier_forms() {
        let plain = Identifier::new("customer_id");
        assert_eq!(plain.raw(), "customer_id");
        assert_eq!(plain.delimited(), "customer_id");
        assert!(!plain.is_delimited());

        let quoted = Identifier::new("\"Customer Id\"");
        assert_eq!(quoted.raw(), "Customer Id");
        assert_eq!(quoted.delimited(), "\"Customer Id\"");
        assert!(quoted.is_delimited());
    }
}
