use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for fetched Drive content.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `name`, replacing any previous file. Returns the
    /// name actually used.
    async fn save(&self, name: &str, data: Vec<u8>) -> Result<String, StorageError>;
}

/// Writes files flat into one download directory.
///
/// Writes are not coordinated: two requests saving the same name race and the
/// last writer wins.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, name: &str, data: Vec<u8>) -> Result<String, StorageError> {
        let file_name = sanitize_file_name(name);
        let path = self.base_path.join(&file_name);

        // Created lazily so an operator can wipe the directory while running
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|source| StorageError::Write {
                path: self.base_path.clone(),
                source,
            })?;

        fs::write(&path, data)
            .await
            .map_err(|source| StorageError::Write {
                path: path.clone(),
                source,
            })?;

        Ok(file_name)
    }
}

/// Keep a Drive name inside the download directory.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "untitled".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_are_replaced() {
        assert_eq!(sanitize_file_name("a/b\\c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(".."), "untitled");
        assert_eq!(sanitize_file_name("  "), "untitled");
        assert_eq!(sanitize_file_name("Q3 report.pdf"), "Q3 report.pdf");
    }

    #[tokio::test]
    async fn save_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("downloads"));

        let name = storage.save("notes.txt", b"hello".to_vec()).await.unwrap();

        assert_eq!(name, "notes.txt");
        let written = std::fs::read(dir.path().join("downloads").join("notes.txt")).unwrap();
        assert_eq!(written, b"hello");
    }

    #[tokio::test]
    async fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.save("a.txt", b"first".to_vec()).await.unwrap();
        storage.save("a.txt", b"second".to_vec()).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"second");
    }
}
