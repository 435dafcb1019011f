//! Text format for persisted indexes
//!
//! Format: one `value=documentId` pair per line. Backslash, newline and
//! carriage return inside values are escaped as `\\`, `\n` and `\r`. Lines
//! are split at the last `=`, so values may contain `=` unescaped.

use super::Entries;
use crate::{Result, ShelfError};
use uuid::Uuid;

/// Render all entries as index file text
pub fn encode(entries: &Entries) -> String {
    let mut out = String::new();
    for (value, ids) in entries {
        let escaped = escape(value);
        for id in ids {
            out.push_str(&escaped);
            out.push('=');
            out.push_str(&id.to_string());
            out.push('\n');
        }
    }
    out
}

/// Parse index file text
pub fn decode(text: &str) -> Result<Entries> {
    let mut entries = Entries::new();

    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }

        let (value, id) = line.rsplit_once('=').ok_or_else(|| {
            ShelfError::Decode(format!("Index line {} has no separator", lineno + 1))
        })?;
        let id = Uuid::parse_str(id).map_err(|e| {
            ShelfError::Decode(format!("Index line {} has invalid id: {}", lineno + 1, e))
        })?;
        let value = unescape(value).ok_or_else(|| {
            ShelfError::Decode(format!("Index line {} has a bad escape", lineno + 1))
        })?;

        entries.entry(value).or_default().insert(id);
    }

    Ok(entries)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";
    const ID_B: &str = "a1a2a3a4-b1b2-4c1c-8d1d-e1e2e3e4e5e6";

    #[test]
    fn test_plain_lines() {
        let text = format!("John={}\nJane={}\nJohn={}\n", ID_A, ID_A, ID_B);
        let entries = decode(&text).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["John"].len(), 2);

        // Keys and ids come out sorted
        let encoded = encode(&entries);
        assert_eq!(
            encoded,
            format!("Jane={}\nJohn={}\nJohn={}\n", ID_A, ID_A, ID_B)
        );
    }

    #[test]
    fn test_awkward_values_survive() {
        let mut entries = Entries::new();
        let id = Uuid::parse_str(ID_A).unwrap();
        for value in ["a=b", "two\nlines", "back\\slash", "", "cr\r"] {
            entries.entry(value.to_string()).or_default().insert(id);
        }

        let decoded = decode(&encode(&entries)).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let text = format!("\nx={}\n\n", ID_A);
        assert_eq!(decode(&text).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(decode("no separator"), Err(ShelfError::Decode(_))));
        assert!(matches!(decode("x=not-a-uuid"), Err(ShelfError::Decode(_))));
        let bad_escape = format!("x\\q={}", ID_A);
        assert!(matches!(decode(&bad_escape), Err(ShelfError::Decode(_))));
    }
}
