//! On-disk artifacts of the vector index.
//!
//! `vectors.bin` holds a small header followed by the raw `f32` data and
//! `postings.json` holds the postings in the same order. Both are written to
//! temporary siblings and renamed into place. The previous `vectors.bin` is
//! kept as `vectors.bin.bak` until the postings are committed, so a failed or
//! interrupted save can be undone. A reader that finds the two artifacts
//! disagreeing on length and has no backup to fall back to refuses to load.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytemuck::cast_slice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::embedding::EmbeddingVector;
use crate::domain::posting::Posting;
use crate::repository::{IndexError, IndexResult};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const POSTINGS_FILE: &str = "postings.json";
pub const BACKUP_FILE: &str = "vectors.bin.bak";

const MAGIC: [u8; 4] = *b"JSVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 20;

#[derive(Debug, Serialize, Deserialize)]
struct PostingsFile {
    version: u32,
    dimensions: usize,
    updated_at: DateTime<Utc>,
    postings: Vec<Posting>,
}

/// Loaded index contents, in insertion order.
pub type IndexContents = (Vec<EmbeddingVector>, Vec<Posting>);

/// Location of the two index artifacts.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

fn persistence_error(path: &Path) -> impl FnOnce(io::Error) -> IndexError + '_ {
    move |source| IndexError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

pub(crate) fn encode_vectors(dimensions: usize, vectors: &[EmbeddingVector]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + vectors.len() * dimensions * 4);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(dimensions as u32).to_le_bytes());
    bytes.extend_from_slice(&(vectors.len() as u64).to_le_bytes());
    for vector in vectors {
        bytes.extend_from_slice(cast_slice(vector.as_slice()));
    }
    bytes
}

pub(crate) fn decode_vectors(bytes: &[u8], dimensions: usize) -> IndexResult<Vec<EmbeddingVector>> {
    if dimensions == 0 {
        return Err(IndexError::ZeroDimensions);
    }
    if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
        return Err(IndexError::Corrupted(format!(
            "{VECTORS_FILE} has no valid header"
        )));
    }
    let word = |range: std::ops::Range<usize>| -> [u8; 4] {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[range]);
        buf
    };
    let version = u32::from_le_bytes(word(4..8));
    if version != FORMAT_VERSION {
        return Err(IndexError::Corrupted(format!(
            "unsupported {VECTORS_FILE} version {version}"
        )));
    }
    let stored_dimensions = u32::from_le_bytes(word(8..12)) as usize;
    if stored_dimensions != dimensions {
        return Err(IndexError::DimensionMismatch {
            expected: dimensions,
            actual: stored_dimensions,
        });
    }
    let mut count_buf = [0u8; 8];
    count_buf.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count_buf) as usize;

    let data = &bytes[HEADER_LEN..];
    let expected_len = count
        .checked_mul(dimensions)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IndexError::Corrupted(format!("{VECTORS_FILE} count overflows")))?;
    if data.len() != expected_len {
        return Err(IndexError::Corrupted(format!(
            "{VECTORS_FILE} declares {count} vectors but holds {} bytes of data",
            data.len()
        )));
    }

    let values: Vec<f32> = data
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(values
        .chunks_exact(dimensions)
        .map(|v| EmbeddingVector::from_normalized(v.to_vec()))
        .collect())
}

impl IndexStore {
    /// Uses `dir` for the artifacts, creating it when missing.
    pub fn open(dir: impl Into<PathBuf>) -> IndexResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(persistence_error(&dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn postings_path(&self) -> PathBuf {
        self.dir.join(POSTINGS_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE)
    }

    /// Reads both artifacts. Returns `None` when neither exists.
    ///
    /// A backup left by an interrupted save is restored when the current
    /// artifacts do not agree with each other but agree with the backup.
    pub fn load(&self, dimensions: usize) -> IndexResult<Option<IndexContents>> {
        let vectors_path = self.vectors_path();
        let backup_path = self.backup_path();
        if !backup_path.exists() {
            return self.read_artifacts(&vectors_path, dimensions);
        }

        if !vectors_path.exists() {
            log::warn!("Restoring {} after an interrupted save", backup_path.display());
            fs::rename(&backup_path, &vectors_path).map_err(persistence_error(&vectors_path))?;
            return self.read_artifacts(&vectors_path, dimensions);
        }

        match self.read_artifacts(&vectors_path, dimensions) {
            Ok(contents) => {
                fs::remove_file(&backup_path).ok();
                Ok(contents)
            }
            Err(IndexError::Corrupted(reason)) => {
                let contents = self
                    .read_artifacts(&backup_path, dimensions)
                    .map_err(|_| IndexError::Corrupted(reason))?;
                log::warn!("Restoring {} after an interrupted save", backup_path.display());
                fs::rename(&backup_path, &vectors_path).map_err(persistence_error(&vectors_path))?;
                Ok(contents)
            }
            Err(e) => Err(e),
        }
    }

    fn read_artifacts(
        &self,
        vectors_path: &Path,
        dimensions: usize,
    ) -> IndexResult<Option<IndexContents>> {
        let postings_path = self.postings_path();

        match (vectors_path.exists(), postings_path.exists()) {
            (false, false) => return Ok(None),
            (true, false) => {
                return Err(IndexError::Corrupted(format!(
                    "{POSTINGS_FILE} is missing next to {VECTORS_FILE}"
                )));
            }
            (false, true) => {
                return Err(IndexError::Corrupted(format!(
                    "{VECTORS_FILE} is missing next to {POSTINGS_FILE}"
                )));
            }
            (true, true) => {}
        }

        let vector_bytes = fs::read(vectors_path).map_err(|e| {
            IndexError::Corrupted(format!("failed to read {}: {e}", vectors_path.display()))
        })?;
        let vectors = decode_vectors(&vector_bytes, dimensions)?;

        let posting_bytes = fs::read(&postings_path).map_err(|e| {
            IndexError::Corrupted(format!("failed to read {}: {e}", postings_path.display()))
        })?;
        let file: PostingsFile = serde_json::from_slice(&posting_bytes)
            .map_err(|e| IndexError::Corrupted(format!("{POSTINGS_FILE} is unreadable: {e}")))?;

        if file.dimensions != dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: file.dimensions,
            });
        }
        if file.postings.len() != vectors.len() {
            return Err(IndexError::Corrupted(format!(
                "{} vectors but {} postings",
                vectors.len(),
                file.postings.len()
            )));
        }

        Ok(Some((vectors, file.postings)))
    }

    /// Rewrites both artifacts with the full index contents.
    ///
    /// Nothing is renamed into place until both temporary files are written
    /// and synced. If the postings cannot be committed, the previous
    /// `vectors.bin` is put back so the two artifacts stay the same length.
    pub fn save(
        &self,
        dimensions: usize,
        vectors: &[EmbeddingVector],
        postings: &[Posting],
    ) -> IndexResult<()> {
        if vectors.len() != postings.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                postings: postings.len(),
            });
        }

        let vectors_path = self.vectors_path();
        let postings_path = self.postings_path();
        let backup_path = self.backup_path();
        let vectors_tmp = tmp_path(&vectors_path);
        let postings_tmp = tmp_path(&postings_path);

        let file = PostingsFile {
            version: FORMAT_VERSION,
            dimensions,
            updated_at: Utc::now(),
            postings: postings.to_vec(),
        };
        let posting_bytes = serde_json::to_vec(&file).map_err(|e| IndexError::Persistence {
            path: postings_path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        let cleanup = || {
            fs::remove_file(&vectors_tmp).ok();
            fs::remove_file(&postings_tmp).ok();
        };

        let written = write_synced(&vectors_tmp, &encode_vectors(dimensions, vectors))
            .map_err(persistence_error(&vectors_tmp))
            .and_then(|_| {
                write_synced(&postings_tmp, &posting_bytes).map_err(persistence_error(&postings_tmp))
            });
        if let Err(e) = written {
            cleanup();
            return Err(e);
        }

        let has_previous = vectors_path.exists();
        if has_previous && let Err(e) = fs::rename(&vectors_path, &backup_path) {
            cleanup();
            return Err(persistence_error(&backup_path)(e));
        }

        let committed = fs::rename(&vectors_tmp, &vectors_path)
            .map_err(persistence_error(&vectors_path))
            .and_then(|_| {
                fs::rename(&postings_tmp, &postings_path).map_err(persistence_error(&postings_path))
            });

        match committed {
            Ok(()) => {
                if has_previous {
                    fs::remove_file(&backup_path).ok();
                }
                Ok(())
            }
            Err(e) => {
                let restored = if has_previous {
                    fs::rename(&backup_path, &vectors_path)
                } else {
                    fs::remove_file(&vectors_path).or_else(|e| match e.kind() {
                        io::ErrorKind::NotFound => Ok(()),
                        _ => Err(e),
                    })
                };
                if let Err(restore_error) = restored {
                    log::error!(
                        "Failed to restore {} after a failed save: {restore_error}",
                        vectors_path.display()
                    );
                }
                cleanup();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{IndexStore, decode_vectors, encode_vectors};
    use crate::domain::embedding::EmbeddingVector;
    use crate::domain::posting::Posting;
    use crate::repository::IndexError;

    fn sample() -> (Vec<EmbeddingVector>, Vec<Posting>) {
        (
            vec![
                EmbeddingVector::normalized(vec![1.0, 0.0, 0.0]),
                EmbeddingVector::normalized(vec![0.0, 1.0, 1.0]),
            ],
            vec![
                Posting::new("Eng", "Acme", "Remote", "", "u1", "test"),
                Posting::new("Data", "Beta", "Remote", "", "u2", "test").with_tags(["sql"]),
            ],
        )
    }

    #[test]
    fn vectors_survive_encoding() {
        let (vectors, _) = sample();
        let decoded = decode_vectors(&encode_vectors(3, &vectors), 3).expect("valid bytes");
        assert_eq!(decoded, vectors);
    }

    #[test]
    fn truncated_vector_data_is_rejected() {
        let (vectors, _) = sample();
        let mut bytes = encode_vectors(3, &vectors);
        bytes.truncate(bytes.len() - 4);

        assert!(matches!(
            decode_vectors(&bytes, 3),
            Err(IndexError::Corrupted(_))
        ));
    }

    #[test]
    fn missing_store_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path().join("index")).expect("open store");

        assert!(store.load(3).expect("load").is_none());
        assert!(store.dir().is_dir());
    }

    #[test]
    fn save_then_load_restores_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();

        store.save(3, &vectors, &postings).expect("save");
        let (loaded_vectors, loaded_postings) = store.load(3).expect("load").expect("contents");

        assert_eq!(loaded_vectors, vectors);
        assert_eq!(loaded_postings, postings);
        assert!(!dir.path().join("vectors.bin.tmp").exists());
    }

    #[test]
    fn length_mismatch_between_artifacts_is_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();
        store.save(3, &vectors, &postings).expect("save");

        // Simulate a crash after the vector file of a later save was swapped in.
        let mut longer = vectors.clone();
        longer.push(EmbeddingVector::normalized(vec![0.0, 0.0, 1.0]));
        fs::write(store.vectors_path(), encode_vectors(3, &longer)).expect("write");

        assert!(matches!(store.load(3), Err(IndexError::Corrupted(_))));
    }

    #[test]
    fn lone_artifact_is_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();
        store.save(3, &vectors, &postings).expect("save");
        fs::remove_file(store.postings_path()).expect("remove");

        assert!(matches!(store.load(3), Err(IndexError::Corrupted(_))));
    }

    #[test]
    fn dimension_change_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();
        store.save(3, &vectors, &postings).expect("save");

        assert!(matches!(
            store.load(384),
            Err(IndexError::DimensionMismatch {
                expected: 384,
                actual: 3
            })
        ));
    }

    #[test]
    fn save_rejects_mismatched_lengths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, mut postings) = sample();
        postings.pop();

        assert!(matches!(
            store.save(3, &vectors, &postings),
            Err(IndexError::LengthMismatch { .. })
        ));
        assert!(!store.vectors_path().exists());
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let bytes = encode_vectors(0, &[]);
        assert!(matches!(
            decode_vectors(&bytes, 0),
            Err(IndexError::ZeroDimensions)
        ));
    }

    #[test]
    fn successful_save_leaves_no_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();

        store.save(3, &vectors[..1], &postings[..1]).expect("first save");
        store.save(3, &vectors, &postings).expect("second save");

        assert!(!store.backup_path().exists());
        assert_eq!(store.load(3).expect("load").expect("contents").1, postings);
    }

    #[test]
    fn failed_postings_commit_restores_previous_vectors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();
        store.save(3, &vectors[..1], &postings[..1]).expect("first save");

        let committed_postings = fs::read(store.postings_path()).expect("read postings");
        fs::remove_file(store.postings_path()).expect("remove postings");
        fs::create_dir(store.postings_path()).expect("block postings path");
        fs::write(store.postings_path().join("keep"), b"x").expect("fill directory");

        assert!(matches!(
            store.save(3, &vectors, &postings),
            Err(IndexError::Persistence { .. })
        ));

        let on_disk = decode_vectors(&fs::read(store.vectors_path()).expect("read"), 3)
            .expect("valid vectors");
        assert_eq!(on_disk.len(), 1);
        assert!(!store.backup_path().exists());

        fs::remove_dir_all(store.postings_path()).expect("unblock postings path");
        fs::write(store.postings_path(), committed_postings).expect("restore postings");
        let (loaded, _) = store.load(3).expect("load").expect("contents");
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn interrupted_save_falls_back_to_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();
        store.save(3, &vectors, &postings).expect("save");

        // Crash after the new vectors were committed but before the postings.
        fs::rename(store.vectors_path(), store.backup_path()).expect("backup");
        let mut longer = vectors.clone();
        longer.push(EmbeddingVector::normalized(vec![0.0, 0.0, 1.0]));
        fs::write(store.vectors_path(), encode_vectors(3, &longer)).expect("write");

        let (loaded_vectors, loaded_postings) = store.load(3).expect("load").expect("contents");

        assert_eq!(loaded_vectors, vectors);
        assert_eq!(loaded_postings, postings);
        assert!(!store.backup_path().exists());
    }

    #[test]
    fn missing_vectors_with_backup_are_restored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = IndexStore::open(dir.path()).expect("open store");
        let (vectors, postings) = sample();
        store.save(3, &vectors, &postings).expect("save");

        fs::rename(store.vectors_path(), store.backup_path()).expect("backup");

        let (loaded_vectors, _) = store.load(3).expect("load").expect("contents");
        assert_eq!(loaded_vectors, vectors);
        assert!(store.vectors_path().exists());
    }
}
