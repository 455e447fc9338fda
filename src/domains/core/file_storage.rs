use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Version not found: {0} for document {1}")]
    VersionNotFound(u32, Uuid),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid path component: {0}")]
    InvalidPathComponent(String),
    #[error("Unknown storage error: {0}")]
    Other(String),
}

pub type FileStorageResult<T> = Result<T, FileStorageError>;

/// A stored version of a document's file content.
#[derive(Debug, Clone)]
pub struct FileVersionInfo {
    pub version_number: u32,
    pub relative_path: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

/// Service trait for abstracting blob storage operations.
///
/// The core treats storage as opaque: bytes in, relative path out. Version
/// history is tracked per document id alongside the primary copy.
#[async_trait]
pub trait FileStorageService: Send + Sync {
    /// Save file data to storage, returning the relative path and size.
    async fn save_file(
        &self,
        data: Vec<u8>,
        document_id: &str,
        suggested_filename: &str,
    ) -> FileStorageResult<(String, u64)>;

    /// Get the raw bytes for a stored file.
    async fn get_file_data(&self, relative_path: &str) -> FileStorageResult<Vec<u8>>;

    /// Delete a file from storage using its relative path.
    async fn delete_file(&self, relative_path: &str) -> FileStorageResult<()>;

    /// Get the full absolute path for a given relative path.
    fn get_absolute_path(&self, relative_path: &str) -> PathBuf;

    /// Store a new version of the document's content, returning its info.
    async fn save_version(
        &self,
        document_id: Uuid,
        data: Vec<u8>,
        suggested_filename: &str,
    ) -> FileStorageResult<FileVersionInfo>;

    /// List stored versions for a document, oldest first.
    async fn get_version_history(&self, document_id: Uuid) -> FileStorageResult<Vec<FileVersionInfo>>;

    /// Fetch a specific version's bytes; version 0 means latest.
    async fn get_version(
        &self,
        document_id: Uuid,
        version_number: u32,
    ) -> FileStorageResult<(Vec<u8>, FileVersionInfo)>;
}

// --- Local File Storage Implementation ---

pub struct LocalFileStorageService {
    base_path: PathBuf,
    original_subdir: String,
    versions_subdir: String,
}

impl LocalFileStorageService {
    /// Creates a new LocalFileStorageService.
    /// Ensures the base directory and subdirectories exist.
    pub fn new(base_path_str: &str) -> io::Result<Self> {
        let base_path = PathBuf::from(base_path_str);
        let original_subdir = "original".to_string();
        let versions_subdir = "versions".to_string();

        std::fs::create_dir_all(base_path.join(&original_subdir))?;
        std::fs::create_dir_all(base_path.join(&versions_subdir))?;

        Ok(Self {
            base_path,
            original_subdir,
            versions_subdir,
        })
    }

    /// Sanitizes a path component to prevent directory traversal issues.
    fn sanitize_component(component: &str) -> FileStorageResult<String> {
        if component.is_empty()
            || component.contains('/')
            || component.contains('\\')
            || component == "."
            || component == ".."
        {
            Err(FileStorageError::InvalidPathComponent(component.to_string()))
        } else {
            Ok(component.to_string())
        }
    }

    /// Generates a unique filename based on suggestion and a new UUID.
    fn generate_unique_filename(suggested_filename: &str) -> String {
        let extension = Path::new(suggested_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        format!("{}{}", Uuid::new_v4(), extension)
    }

    fn version_dir(&self, document_id: Uuid) -> PathBuf {
        self.base_path.join(&self.versions_subdir).join(document_id.to_string())
    }

    /// Parse the `v00001_` prefix of a stored version filename.
    fn parse_version_number(file_name: &str) -> Option<u32> {
        let rest = file_name.strip_prefix('v')?;
        let (digits, _) = rest.split_once('_')?;
        digits.parse().ok()
    }

    async fn version_entry(&self, document_id: Uuid, file_name: &str) -> FileStorageResult<Option<FileVersionInfo>> {
        let Some(version_number) = Self::parse_version_number(file_name) else {
            return Ok(None);
        };
        let relative_path = Path::new(&self.versions_subdir)
            .join(document_id.to_string())
            .join(file_name)
            .to_string_lossy()
            .to_string();
        let meta = fs::metadata(self.get_absolute_path(&relative_path)).await?;
        let created_at = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(FileVersionInfo {
            version_number,
            relative_path,
            file_size: meta.len(),
            created_at,
        }))
    }
}

#[async_trait]
impl FileStorageService for LocalFileStorageService {
    async fn save_file(
        &self,
        data: Vec<u8>,
        document_id: &str,
        suggested_filename: &str,
    ) -> FileStorageResult<(String, u64)> {
        let sanitized_id = Self::sanitize_component(document_id)?;
        let unique_filename = Self::generate_unique_filename(suggested_filename);

        // Relative path: original/<document_id>/<unique_filename>
        let relative_path = Path::new(&self.original_subdir)
            .join(&sanitized_id)
            .join(&unique_filename);

        let relative_path_str = relative_path
            .to_str()
            .ok_or_else(|| FileStorageError::Other("Failed to convert relative path to string".to_string()))?;
        let absolute_path = self.get_absolute_path(relative_path_str);

        let parent_dir = absolute_path
            .parent()
            .ok_or_else(|| FileStorageError::Other("Invalid path generated, no parent directory".to_string()))?;
        fs::create_dir_all(parent_dir).await?;

        let file_size = data.len() as u64;
        fs::write(&absolute_path, data).await?;

        Ok((relative_path_str.to_string(), file_size))
    }

    async fn get_file_data(&self, relative_path: &str) -> FileStorageResult<Vec<u8>> {
        let absolute_path = self.get_absolute_path(relative_path);

        if !absolute_path.starts_with(&self.base_path) {
            return Err(FileStorageError::PermissionDenied(
                "Attempt to read outside base path".to_string(),
            ));
        }

        match fs::read(&absolute_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FileStorageError::NotFound(relative_path.to_string()))
            }
            Err(e) => Err(FileStorageError::Io(e)),
        }
    }

    async fn delete_file(&self, relative_path: &str) -> FileStorageResult<()> {
        let absolute_path = self.get_absolute_path(relative_path);

        if !absolute_path.starts_with(&self.base_path) {
            return Err(FileStorageError::PermissionDenied(
                "Attempt to delete outside base path".to_string(),
            ));
        }

        match fs::remove_file(&absolute_path).await {
            Ok(_) => Ok(()),
            // Already gone counts as deleted.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileStorageError::Io(e)),
        }
    }

    fn get_absolute_path(&self, relative_path: &str) -> PathBuf {
        // Rebuild from normal components only, dropping anything that could
        // escape the base path.
        let mut abs_path = self.base_path.clone();
        for component in Path::new(relative_path).components() {
            if let std::path::Component::Normal(comp_str) = component {
                if let Some(s) = comp_str.to_str() {
                    if s.is_empty() || s.contains('/') || s.contains('\\') {
                        continue;
                    }
                    abs_path.push(comp_str);
                }
            }
        }
        abs_path
    }

    async fn save_version(
        &self,
        document_id: Uuid,
        data: Vec<u8>,
        suggested_filename: &str,
    ) -> FileStorageResult<FileVersionInfo> {
        let history = self.get_version_history(document_id).await?;
        let next_number = history.last().map(|v| v.version_number).unwrap_or(0) + 1;

        let unique_filename = Self::generate_unique_filename(suggested_filename);
        let file_name = format!("v{:05}_{}", next_number, unique_filename);
        let relative_path = Path::new(&self.versions_subdir)
            .join(document_id.to_string())
            .join(&file_name)
            .to_string_lossy()
            .to_string();

        let absolute_path = self.get_absolute_path(&relative_path);
        let parent_dir = absolute_path
            .parent()
            .ok_or_else(|| FileStorageError::Other("Invalid version path generated".to_string()))?;
        fs::create_dir_all(parent_dir).await?;

        let file_size = data.len() as u64;
        fs::write(&absolute_path, data).await?;

        Ok(FileVersionInfo {
            version_number: next_number,
            relative_path,
            file_size,
            created_at: Utc::now(),
        })
    }

    async fn get_version_history(&self, document_id: Uuid) -> FileStorageResult<Vec<FileVersionInfo>> {
        let dir = self.version_dir(document_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FileStorageError::Io(e)),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            if let Some(info) = self.version_entry(document_id, name).await? {
                versions.push(info);
            }
        }
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }

    async fn get_version(
        &self,
        document_id: Uuid,
        version_number: u32,
    ) -> FileStorageResult<(Vec<u8>, FileVersionInfo)> {
        let history = self.get_version_history(document_id).await?;
        let info = if version_number == 0 {
            history.into_iter().last()
        } else {
            history.into_iter().find(|v| v.version_number == version_number)
        }
        .ok_or(FileStorageError::VersionNotFound(version_number, document_id))?;

        let data = self.get_file_data(&info.relative_path).await?;
        Ok((data, info))
    }
}
