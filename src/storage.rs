use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Where an upload ended up on disk.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub checksum: String,
}

/// Flat directory of uploaded spreadsheets.
///
/// Files are never overwritten: each upload gets a fresh
/// `file-<unix millis>-<random><ext>` name.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        UploadStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a generated name and return its metadata.
    ///
    /// # Arguments
    /// * `original_name` - Client-side file name; only its extension is kept
    /// * `bytes` - File content
    ///
    /// # Errors
    /// * Returns an IO error if the directory cannot be created or the file written
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        fs::create_dir_all(&self.dir).await?;

        let file_name = unique_file_name(original_name);
        let path = self.dir.join(&file_name);
        fs::write(&path, bytes).await?;

        Ok(StoredFile {
            file_name,
            file_path: path.to_string_lossy().to_string(),
            file_size: bytes.len() as i64,
            checksum: checksum(bytes),
        })
    }

    /// Remove a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, file_path: &str) -> std::io::Result<()> {
        match fs::remove_file(file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn unique_file_name(original_name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let ext = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    format!("file-{}-{}{}", Utc::now().timestamp_millis(), suffix, ext)
}

/// Hex SHA-256 of the file content.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_keep_extension() {
        let name = unique_file_name("Q3 sales.xlsx");
        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".xlsx"));

        let bare = unique_file_name("README");
        assert!(!bare.contains('.'));
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let stored = store.save("data.csv", b"a,b\n1,2\n").await.unwrap();
        assert_eq!(stored.file_size, 8);
        assert!(Path::new(&stored.file_path).exists());

        store.remove(&stored.file_path).await.unwrap();
        assert!(!Path::new(&stored.file_path).exists());
        // second removal is a no-op
        store.remove(&stored.file_path).await.unwrap();
    }
}
