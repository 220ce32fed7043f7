//! Append-only CSV writing shared by the signal store and the ledger.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

/// Appends `rows` to `path`, writing the header only when the file is absent
/// or empty. Existing content is never rewritten.
pub fn append_records<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), csv::Error> {
    if rows.is_empty() {
        return Ok(());
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let needs_header = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Replaces `path` with `rows` via a sibling temp file and a rename, so a
/// crash mid-write leaves the old table in place.
pub fn overwrite_records<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<(), csv::Error> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(&tmp)?;
        wtr.write_record(header)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Row {
        a: i32,
        #[serde(rename = "b.c")]
        b: String,
    }

    #[test]
    fn header_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("log.csv");
        append_records(&path, &[Row { a: 1, b: "x".into() }]).unwrap();
        append_records(&path, &[Row { a: 2, b: "y".into() }]).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,b.c\n1,x\n2,y\n");
    }

    #[test]
    fn empty_file_gets_a_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "").unwrap();
        append_records(&path, &[Row { a: 1, b: "x".into() }]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b.c\n1,x\n");
    }

    #[test]
    fn nothing_to_append_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        append_records::<Row>(&path, &[]).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn overwrite_keeps_header_for_empty_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        overwrite_records(&path, &[Row { a: 1, b: "x".into() }], &["a", "b.c"]).unwrap();
        overwrite_records::<Row>(&path, &[], &["a", "b.c"]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b.c\n");
        assert!(!dir.path().join("table.csv.tmp").exists());
    }
}
