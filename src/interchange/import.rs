use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use crate::core::error::{Error, Result};
use crate::core::types::ImportRecord;

/// Parses a JSON array of `{author, text}` records. Anything that does not
/// parse as a whole is `MalformedImport`; there is no partial result.
pub fn read_import<R: Read>(reader: R) -> Result<Vec<ImportRecord>> {
    serde_json::from_reader(reader)
        .map_err(|e| Error::malformed_import(format!("cannot parse import: {}", e)))
}

pub fn read_import_file(path: impl AsRef<Path>) -> Result<Vec<ImportRecord>> {
    let file = File::open(path.as_ref())?;
    read_import(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn reads_current_and_legacy_field_names() {
        let json = r#"[
            {"author": "Plato", "text": "Know thyself."},
            {"Name": "Seneca", "Text": "Luck is preparation.", "ID": 7, "extra": true},
            {"text": "No author given."}
        ]"#;

        let records = read_import(json.as_bytes()).unwrap();
        assert_eq!(records, vec![
            ImportRecord::new("Plato", "Know thyself."),
            ImportRecord::new("Seneca", "Luck is preparation."),
            ImportRecord::new("", "No author given."),
        ]);
    }

    #[test]
    fn garbage_is_malformed() {
        for bad in ["", "{", r#"{"author":"a","text":"b"}"#, r#"[{"author":"a"}]"#, r#"[{"text": 5}]"#] {
            let err = read_import(bad.as_bytes()).unwrap_err();
            assert!(err.is(ErrorKind::MalformedImport), "{:?} gave {:?}", bad, err);
        }
    }

    #[test]
    fn empty_array_is_fine() {
        assert!(read_import("[]".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_import_file(dir.path().join("absent.json")).unwrap_err();
        assert!(err.is(ErrorKind::Io));
    }
}
