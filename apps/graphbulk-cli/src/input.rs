//! Identifier input and JSON output files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CliError, CliResult};

#[derive(Debug, Deserialize)]
struct IdentifierEntry {
    id: Option<serde_json::Value>,
}

/// Reads identifiers from a JSON array of objects carrying a string `"id"`,
/// such as the file written by `get users`.
pub fn read_identifiers(path: &Path) -> CliResult<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    parse_identifiers(&contents)
}

/// Parses the identifier input format.
pub fn parse_identifiers(contents: &str) -> CliResult<Vec<String>> {
    let entries: Vec<IdentifierEntry> = serde_json::from_str(contents)
        .map_err(|e| CliError::Validation(format!("failed to parse input JSON: {}", e)))?;

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry.id {
            Some(serde_json::Value::String(id)) => Ok(id),
            Some(_) => Err(CliError::Validation(format!(
                "entry {} has a non-string \"id\"",
                index
            ))),
            None => Err(CliError::Validation(format!(
                "entry {} has no \"id\"",
                index
            ))),
        })
        .collect()
}

/// Writes `value` as pretty JSON, replacing the file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .map_err(|e| CliError::Io(format!("failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifiers() {
        let ids = parse_identifiers(
            r#"[{"id": "u-1", "displayName": "Ada"}, {"id": "u-2"}]"#,
        )
        .unwrap();
        assert_eq!(ids, vec!["u-1", "u-2"]);
    }

    #[test]
    fn test_parse_identifiers_empty_array() {
        assert!(parse_identifiers("[]").unwrap().is_empty());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let err = parse_identifiers(r#"[{"id": "u-1"}, {"mail": "x@y"}]"#).unwrap_err();
        assert!(err.to_string().contains("entry 1 has no"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_non_string_id_is_rejected() {
        assert!(parse_identifiers(r#"[{"id": 7}]"#).is_err());
    }

    #[test]
    fn test_not_an_array_is_rejected() {
        assert!(matches!(
            parse_identifiers(r#"{"id": "u-1"}"#),
            Err(CliError::Validation(_))
        ));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        write_json(&path, &serde_json::json!([{"id": "u-9"}])).unwrap();

        assert_eq!(read_identifiers(&path).unwrap(), vec!["u-9"]);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_identifiers(Path::new("/nonexistent/users.json")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
