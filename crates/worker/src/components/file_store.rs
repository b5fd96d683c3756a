use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use filestore_core::{FileStoreError, FileStoreResult};

/// Storage backend a worker keeps its files in
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Names of stored files, sorted
    async fn list(&self) -> FileStoreResult<Vec<String>>;

    async fn exists(&self, file_name: &str) -> FileStoreResult<bool>;

    async fn write(&self, file_name: &str, contents: &[u8]) -> FileStoreResult<()>;

    /// `None` when the file is not stored here
    async fn read(&self, file_name: &str) -> FileStoreResult<Option<Vec<u8>>>;

    /// Returns whether a file was actually removed
    async fn delete(&self, file_name: &str) -> FileStoreResult<bool>;
}

/// Reject names that could escape the worker directory
pub fn validate_file_name(file_name: &str) -> FileStoreResult<()> {
    let invalid = file_name.trim().is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(FileStoreError::InvalidJob(format!(
            "invalid file name: {file_name:?}"
        )));
    }
    Ok(())
}

/// Files stored flat under `<storage_root>/<worker_id>/`
pub struct DiskFileStore {
    directory: PathBuf,
}

impl DiskFileStore {
    /// Create the worker directory if needed
    pub async fn open(storage_root: impl AsRef<Path>, worker_id: &str) -> FileStoreResult<Self> {
        validate_file_name(worker_id)?;
        let directory = storage_root.as_ref().join(worker_id);
        tokio::fs::create_dir_all(&directory).await?;
        debug!("Using storage directory {}", directory.display());
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, file_name: &str) -> FileStoreResult<PathBuf> {
        validate_file_name(file_name)?;
        Ok(self.directory.join(file_name))
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn list(&self) -> FileStoreResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn exists(&self, file_name: &str) -> FileStoreResult<bool> {
        let path = self.path_for(file_name)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, file_name: &str, contents: &[u8]) -> FileStoreResult<()> {
        let path = self.path_for(file_name)?;
        tokio::fs::write(&path, contents).await?;
        Ok(())
    }

    async fn read(&self, file_name: &str) -> FileStoreResult<Option<Vec<u8>>> {
        let path = self.path_for(file_name)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, file_name: &str) -> FileStoreResult<bool> {
        let path = self.path_for(file_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
