//! Seed and discovered record files.
//!
//! Both phases exchange data through CSV files with a header row. The seed
//! file is `source_id,org,doc_type,seed_url`; the discovered file is
//! `source_id,org,doc_type,url`, written in that column order. Missing
//! provenance columns read as empty strings and every value is trimmed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A starting page known to link to target documents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedRecord {
    #[serde(default, deserialize_with = "trimmed")]
    pub source_id: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub org: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub doc_type: String,
    #[serde(deserialize_with = "trimmed")]
    pub seed_url: String,
}

/// A document link found on a seed page, carrying the seed's provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredRecord {
    #[serde(default, deserialize_with = "trimmed")]
    pub source_id: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub org: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub doc_type: String,
    #[serde(deserialize_with = "trimmed")]
    pub url: String,
}

impl DiscoveredRecord {
    /// Creates a record for `url` attributed to `seed`.
    #[must_use]
    pub fn from_seed(seed: &SeedRecord, url: impl Into<String>) -> Self {
        Self {
            source_id: seed.source_id.clone(),
            org: seed.org.clone(),
            doc_type: seed.doc_type.clone(),
            url: url.into(),
        }
    }
}

/// Errors reading or writing record files.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The CSV file could not be opened, parsed or written.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// File being read or written.
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The parent directory of an output file could not be created.
    #[error("IO error creating {path}: {source}")]
    Io {
        /// Directory that failed.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads seed records from a CSV file.
///
/// # Errors
///
/// Returns [`RecordError::Csv`] if the file cannot be opened or a row is
/// malformed (for example missing `seed_url`).
pub fn read_seeds(path: &Path) -> Result<Vec<SeedRecord>, RecordError> {
    read_records(path)
}

/// Reads discovered records from a CSV file.
///
/// # Errors
///
/// Returns [`RecordError::Csv`] if the file cannot be opened or a row is
/// malformed (for example missing `url`).
pub fn read_discovered(path: &Path) -> Result<Vec<DiscoveredRecord>, RecordError> {
    read_records(path)
}

/// Writes discovered records to a CSV file, creating parent directories.
///
/// The header row is written even when `records` is empty.
///
/// # Errors
///
/// Returns [`RecordError::Io`] if the parent directory cannot be created and
/// [`RecordError::Csv`] if writing fails.
pub fn write_discovered(path: &Path, records: &[DiscoveredRecord]) -> Result<(), RecordError> {
    ensure_parent_dir(path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| RecordError::csv(path, e))?;
    writer
        .write_record(["source_id", "org", "doc_type", "url"])
        .map_err(|e| RecordError::csv(path, e))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| RecordError::csv(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| RecordError::csv(path, csv::Error::from(e)))?;

    debug!(path = %path.display(), rows = records.len(), "wrote discovered records");
    Ok(())
}

/// Creates the parent directory of `path` if it has one.
///
/// # Errors
///
/// Returns [`RecordError::Io`] if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), RecordError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| RecordError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

fn read_records<T>(path: &Path) -> Result<Vec<T>, RecordError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_path(path)
        .map_err(|e| RecordError::csv(path, e))?;

    let records = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| RecordError::csv(path, e))?;
    debug!(path = %path.display(), rows = records.len(), "read records");
    Ok(records)
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(|v| v.trim().to_string()).unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_read_seeds_trims_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(
            &path,
            "source_id,org,doc_type,seed_url\n s1 , EPA ,report, https://a.gov/reports \n",
        )
        .unwrap();

        let seeds = read_seeds(&path).unwrap();
        assert_eq!(
            seeds,
            vec![SeedRecord {
                source_id: "s1".to_string(),
                org: "EPA".to_string(),
                doc_type: "report".to_string(),
                seed_url: "https://a.gov/reports".to_string(),
            }]
        );
    }

    #[test]
    fn test_read_seeds_missing_optional_columns_default_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(&path, "seed_url\nhttps://a.gov/\n").unwrap();

        let seeds = read_seeds(&path).unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].seed_url, "https://a.gov/");
        assert!(seeds[0].source_id.is_empty());
        assert!(seeds[0].org.is_empty());
    }

    #[test]
    fn test_read_seeds_empty_cells_default_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.csv");
        fs::write(&path, "source_id,org,doc_type,seed_url\n,,,https://a.gov/\n").unwrap();

        let seeds = read_seeds(&path).unwrap();
        assert_eq!(seeds[0].source_id, "");
        assert_eq!(seeds[0].seed_url, "https://a.gov/");
    }

    #[test]
    fn test_read_seeds_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = read_seeds(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.to_string().contains("absent.csv"));
    }

    #[test]
    fn test_write_then_read_discovered_keeps_column_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("discovered.csv");
        let records = vec![
            DiscoveredRecord {
                source_id: "s1".to_string(),
                org: "EPA, Region 5".to_string(),
                doc_type: "report".to_string(),
                url: "https://a.gov/1.pdf".to_string(),
            },
            DiscoveredRecord {
                source_id: "s2".to_string(),
                org: String::new(),
                doc_type: "memo".to_string(),
                url: "https://b.gov/2.pdf".to_string(),
            },
        ];

        write_discovered(&path, &records).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("source_id,org,doc_type,url\n"), "{raw}");
        assert!(raw.contains("\"EPA, Region 5\""), "{raw}");
        assert_eq!(read_discovered(&path).unwrap(), records);
    }

    #[test]
    fn test_write_discovered_empty_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("discovered.csv");

        write_discovered(&path, &[]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "source_id,org,doc_type,url\n");
        assert!(read_discovered(&path).unwrap().is_empty());
    }

    #[test]
    fn test_from_seed_copies_provenance() {
        let seed = SeedRecord {
            source_id: "s9".to_string(),
            org: "DOE".to_string(),
            doc_type: "guidance".to_string(),
            seed_url: "https://doe.gov/".to_string(),
        };
        let record = DiscoveredRecord::from_seed(&seed, "https://doe.gov/g.pdf");
        assert_eq!(record.source_id, "s9");
        assert_eq!(record.org, "DOE");
        assert_eq!(record.doc_type, "guidance");
        assert_eq!(record.url, "https://doe.gov/g.pdf");
    }
}
