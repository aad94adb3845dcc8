//! SQL text for the dump: value literals and statement framing.

use crate::db::{quote_identifier, SqlValue};

/// Append `s` to `out` as a single-quoted MySQL string literal
pub fn push_quoted(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out.push('\'');
}

pub fn quote_string(s: &str) -> String {
    let mut out = String::new();
    push_quoted(&mut out, s);
    out
}

/// Append the literal form of `value` to `out`
pub fn push_value(out: &mut String, value: &SqlValue) {
    match value {
        SqlValue::Null => out.push_str("NULL"),
        SqlValue::Number(n) => out.push_str(n),
        SqlValue::Bool(true) => out.push('1'),
        SqlValue::Bool(false) => out.push('0'),
        SqlValue::Text(s) => push_quoted(out, s),
        SqlValue::Bytes(b) if b.is_empty() => out.push_str("''"),
        SqlValue::Bytes(b) => {
            out.push_str("0x");
            out.push_str(&hex::encode_upper(b));
        }
    }
}

pub fn value_literal(value: &SqlValue) -> String {
    let mut out = String::new();
    push_value(&mut out, value);
    out
}

/// `(v1,v2,...)`
pub fn push_tuple(out: &mut String, values: &[SqlValue]) {
    out.push('(');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_value(out, value);
    }
    out.push(')');
}

/// `INSERT INTO `t` (`a`,`b`) VALUES ` prefix of an extended insert
pub fn insert_prefix(table: &str, columns: &[String]) -> String {
    let columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ",
        quote_identifier(table),
        columns.join(",")
    )
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote_identifier(table))
}

pub fn lock_table(table: &str) -> String {
    format!("LOCK TABLES {} WRITE;", quote_identifier(table))
}

pub fn disable_keys(table: &str) -> String {
    format!(
        "/*!40000 ALTER TABLE {} DISABLE KEYS */;",
        quote_identifier(table)
    )
}

pub fn enable_keys(table: &str) -> String {
    format!(
        "/*!40000 ALTER TABLE {} ENABLE KEYS */;",
        quote_identifier(table)
    )
}

pub const UNLOCK_TABLES: &str = "UNLOCK TABLES;";

/// Session settings saved and changed at the top of the dump
pub const SESSION_PROLOGUE: &[&str] = &[
    "/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;",
    "/*!40101 SET @OLD_CHARACTER_SET_RESULTS=@@CHARACTER_SET_RESULTS */;",
    "/*!40101 SET @OLD_COLLATION_CONNECTION=@@COLLATION_CONNECTION */;",
    "/*!50503 SET NAMES utf8mb4 */;",
    "/*!40103 SET @OLD_TIME_ZONE=@@TIME_ZONE */;",
    "/*!40103 SET TIME_ZONE='+00:00' */;",
    "/*!40014 SET @OLD_UNIQUE_CHECKS=@@UNIQUE_CHECKS, UNIQUE_CHECKS=0 */;",
    "/*!40014 SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0 */;",
    "/*!40101 SET @OLD_SQL_MODE=@@SQL_MODE, SQL_MODE='NO_AUTO_VALUE_ON_ZERO' */;",
    "/*!40111 SET @OLD_SQL_NOTES=@@SQL_NOTES, SQL_NOTES=0 */;",
];

/// Restores what [`SESSION_PROLOGUE`] changed
pub const SESSION_EPILOGUE: &[&str] = &[
    "/*!40103 SET TIME_ZONE=@OLD_TIME_ZONE */;",
    "/*!40101 SET SQL_MODE=@OLD_SQL_MODE */;",
    "/*!40014 SET FOREIGN_KEY_CHECKS=@OLD_FOREIGN_KEY_CHECKS */;",
    "/*!40014 SET UNIQUE_CHECKS=@OLD_UNIQUE_CHECKS */;",
    "/*!40101 SET CHARACTER_SET_CLIENT=@OLD_CHARACTER_SET_CLIENT */;",
    "/*!40101 SET CHARACTER_SET_RESULTS=@OLD_CHARACTER_SET_RESULTS */;",
    "/*!40101 SET COLLATION_CONNECTION=@OLD_COLLATION_CONNECTION */;",
    "/*!40111 SET SQL_NOTES=@OLD_SQL_NOTES */;",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_string_escapes() {
        assert_eq!(quote_string("O'Brien"), r"'O\'Brien'");
        assert_eq!(quote_string("a\\b"), r"'a\\b'");
        assert_eq!(quote_string("line\nbreak\r"), r"'line\nbreak\r'");
        assert_eq!(quote_string("nul\0sub\x1a"), r"'nul\0sub\Z'");
        assert_eq!(quote_string("say \"hi\""), r#"'say \"hi\"'"#);
        assert_eq!(quote_string("héllo"), "'héllo'");
    }

    #[test]
    fn test_value_literals() {
        assert_eq!(value_literal(&SqlValue::Null), "NULL");
        assert_eq!(value_literal(&SqlValue::Number("-1.5".to_string())), "-1.5");
        assert_eq!(value_literal(&SqlValue::Bool(true)), "1");
        assert_eq!(value_literal(&SqlValue::Bytes(vec![0xde, 0xad])), "0xDEAD");
        assert_eq!(value_literal(&SqlValue::Bytes(vec![])), "''");
    }

    #[test]
    fn test_insert_prefix_and_tuple() {
        let mut stmt = insert_prefix("users", &["id".to_string(), "name".to_string()]);
        push_tuple(&mut stmt, &[1i64.into(), "x".into()]);
        assert_eq!(stmt, "INSERT INTO `users` (`id`,`name`) VALUES (1,'x')");
    }
}
