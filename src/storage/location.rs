//! Storage locations backed by `object_store` (S3, R2, GCS, Azure, local)

use crate::config::{join_location, CredentialsConfig};
use crate::error::{Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::{Path as ObjectPath, PathPart};
use object_store::{ObjectMeta, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Whether a location is opened to be read from or written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Source location; must already exist
    Read,
    /// Destination location; created on demand
    Write,
}

/// A directory-like location inside an object store
#[derive(Debug, Clone)]
pub struct StorageLocation {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Base path prefix within the bucket/container
    prefix: String,
    /// URL scheme (s3, s3a, s3n, r2, gs, az, abfs, abfss, file, memory)
    scheme: String,
    /// Location as given by the user, for messages
    url: String,
    /// Directory on disk for local locations
    local_root: Option<PathBuf>,
}

impl StorageLocation {
    /// Parse a location URL and create the matching object store
    ///
    /// Supported formats:
    /// - `s3://`, `s3a://` or `s3n://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible, needs `endpoint`)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `abfs[s]://container@account.dfs.core.windows.net/path/` - Azure Data Lake
    /// - `memory://path/` - process-local store, empty when opened
    /// - `/local/path/`, `./path/` or `file:///path` - Local filesystem
    ///
    /// Any other `scheme://` is rejected.
    pub fn parse(url: &str, credentials: &CredentialsConfig, mode: AccessMode) -> Result<Self> {
        match url.split_once("://").map(|(scheme, _)| scheme) {
            Some("s3" | "s3a" | "s3n" | "r2") => Self::parse_s3(url, credentials),
            Some("gs") => Self::parse_gcs(url, credentials),
            Some("az" | "abfs" | "abfss") => Self::parse_azure(url, credentials),
            Some("memory") => Ok(Self::parse_memory(url)),
            Some("file") | None => Self::parse_local(url, mode),
            Some(other) => Err(Error::config(format!(
                "Unsupported location scheme '{other}' in {url}"
            ))),
        }
    }

    /// Wrap an existing store, e.g. an in-memory one
    pub fn from_store(store: Arc<dyn ObjectStore>, prefix: &str, url: &str) -> Self {
        Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
            scheme: url.split("://").next().unwrap_or("memory").to_string(),
            url: url.trim_end_matches('/').to_string(),
            local_root: None,
        }
    }

    /// Split `scheme://bucket/some/prefix` into bucket and prefix
    fn bucket_and_prefix(url: &str) -> Result<(String, String)> {
        let parsed = Url::parse(url)?;
        let bucket = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::config(format!("Missing bucket in location: {url}")))?;
        Ok((
            bucket.to_string(),
            parsed.path().trim_matches('/').to_string(),
        ))
    }

    /// Parse S3, S3A, S3N or R2 URL
    fn parse_s3(url: &str, credentials: &CredentialsConfig) -> Result<Self> {
        let (bucket, prefix) = Self::bucket_and_prefix(url)?;
        let scheme = url.split("://").next().unwrap_or("s3").to_string();

        let mut builder = AmazonS3Builder::new().with_bucket_name(&bucket);
        if let Some(region) = &credentials.region {
            builder = builder.with_region(region);
        }
        if let (Some(key), Some(secret)) = (&credentials.access_key, &credentials.secret_key) {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret);
        }
        if let Some(endpoint) = &credentials.endpoint {
            builder = builder.with_endpoint(endpoint);
        } else if scheme == "r2" {
            return Err(Error::missing_field("credentials.endpoint"));
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme,
            url: url.trim_end_matches('/').to_string(),
            local_root: None,
        })
    }

    /// Parse GCS URL
    fn parse_gcs(url: &str, credentials: &CredentialsConfig) -> Result<Self> {
        let (bucket, prefix) = Self::bucket_and_prefix(url)?;

        let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(&bucket);
        if let Some(path) = &credentials.service_account_path {
            builder = builder.with_service_account_path(path);
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme: "gs".to_string(),
            url: url.trim_end_matches('/').to_string(),
            local_root: None,
        })
    }

    /// Parse Azure Blob or ADLS URL
    fn parse_azure(url: &str, credentials: &CredentialsConfig) -> Result<Self> {
        let scheme = url.split("://").next().unwrap_or("az").to_string();
        let prefix = Url::parse(url)?.path().trim_matches('/').to_string();

        let mut builder = if scheme == "az" {
            let (container, _) = Self::bucket_and_prefix(url)?;
            MicrosoftAzureBuilder::new().with_container_name(&container)
        } else {
            // Container, and the account when given, come from the URL
            MicrosoftAzureBuilder::new().with_url(url)
        };
        if let (Some(account), Some(key)) = (&credentials.access_key, &credentials.secret_key) {
            builder = builder.with_account(account).with_access_key(key);
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix,
            scheme,
            url: url.trim_end_matches('/').to_string(),
            local_root: None,
        })
    }

    /// Parse `memory://` URL into a fresh in-memory store
    fn parse_memory(url: &str) -> Self {
        let prefix = url.trim_start_matches("memory://");
        Self::from_store(Arc::new(InMemory::new()), prefix, url)
    }

    /// Parse local filesystem path
    fn parse_local(path: &str, mode: AccessMode) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);
        let dir = PathBuf::from(path);

        match mode {
            AccessMode::Read => {
                if !dir.is_dir() {
                    return Err(Error::input(path, "directory does not exist"));
                }
            }
            AccessMode::Write => {
                std::fs::create_dir_all(&dir).map_err(|e| {
                    Error::storage(format!("Failed to create directory {path}: {e}"))
                })?;
            }
        }

        let store = LocalFileSystem::new_with_prefix(&dir)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            scheme: "file".to_string(),
            url: path.trim_end_matches('/').to_string(),
            local_root: Some(dir),
        })
    }

    /// Check if this is a cloud location (not local)
    pub fn is_cloud(&self) -> bool {
        !matches!(self.scheme.as_str(), "file" | "memory")
    }

    /// Get the scheme (s3, s3a, s3n, r2, gs, az, abfs, abfss, file, memory)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Location as a display string
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Location of a sub-directory sharing the same store
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let prefix = if self.prefix.is_empty() {
            name.trim_matches('/').to_string()
        } else {
            join_location(&self.prefix, name.trim_matches('/'))
        };
        Self {
            store: Arc::clone(&self.store),
            prefix,
            scheme: self.scheme.clone(),
            url: join_location(&self.url, name),
            local_root: self.local_root.as_ref().map(|root| root.join(name)),
        }
    }

    fn base_path(&self) -> Option<ObjectPath> {
        (!self.prefix.is_empty()).then(|| ObjectPath::from(self.prefix.as_str()))
    }

    /// Object path of a relative file below this location
    ///
    /// Each segment is escaped on its own so partition values cannot
    /// introduce extra directory levels.
    pub fn object_path(&self, segments: &[&str]) -> ObjectPath {
        let base = self.base_path().unwrap_or_default();
        segments
            .iter()
            .fold(base, |path, segment| path.child(PathPart::from(*segment)))
    }

    /// List every file below this location with the given extension
    ///
    /// Directories are walked to any depth. Hidden and bookkeeping files
    /// (any segment starting with `.` or `_`) are skipped. Paths come back
    /// sorted so that downstream row order is reproducible.
    pub async fn list_files(&self, extension: &str) -> Result<Vec<ObjectPath>> {
        let base = self.base_path();
        let objects: Vec<ObjectMeta> = self
            .store
            .list(base.as_ref())
            .try_collect()
            .await
            .map_err(|e| Error::input(&self.url, e.to_string()))?;

        let mut paths: Vec<ObjectPath> = objects
            .into_iter()
            .map(|meta| meta.location)
            .filter(|path| path.extension() == Some(extension))
            .filter(|path| is_visible(path, base.as_ref()))
            .collect();
        paths.sort();

        debug!(
            "Discovered {} .{extension} files under {}",
            paths.len(),
            self.url
        );
        Ok(paths)
    }

    /// Full location of an object below this location, for messages
    pub fn display_path(&self, path: &ObjectPath) -> String {
        let relative: Option<Vec<String>> = match self.base_path() {
            Some(base) => path
                .prefix_match(&base)
                .map(|rest| rest.map(|part| part.as_ref().to_string()).collect()),
            None => Some(path.parts().map(|part| part.as_ref().to_string()).collect()),
        };
        match relative {
            Some(parts) => join_location(&self.url, &parts.join("/")),
            None => path.to_string(),
        }
    }

    /// Read a whole object
    pub async fn read(&self, path: &ObjectPath) -> Result<Bytes> {
        let result = self
            .store
            .get(path)
            .await
            .map_err(|e| Error::input(self.display_path(path), e.to_string()))?;
        result
            .bytes()
            .await
            .map_err(|e| Error::input(self.display_path(path), e.to_string()))
    }

    /// Write bytes to a file below this location
    ///
    /// Returns the full location of the written file for logging.
    pub async fn write(&self, segments: &[&str], data: Bytes) -> Result<String> {
        let path = self.object_path(segments);

        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| Error::storage(format!("Failed to write {path}: {e}")))?;

        Ok(join_location(&self.url, &segments.join("/")))
    }

    /// Remove everything below this location
    ///
    /// Returns the number of files removed. A location that does not exist
    /// yet counts as empty.
    pub async fn delete_all(&self) -> Result<usize> {
        if self.local_root.as_ref().is_some_and(|dir| !dir.exists()) {
            return Ok(0);
        }

        let base = self.base_path();
        let existing: Vec<ObjectMeta> = match self.store.list(base.as_ref()).try_collect().await {
            Ok(objects) => objects,
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to list {} for overwrite: {e}",
                    self.url
                )))
            }
        };

        for meta in &existing {
            match self.store.delete(&meta.location).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => {
                    return Err(Error::storage(format!(
                        "Failed to delete {}: {e}",
                        meta.location
                    )))
                }
            }
        }

        // Local stores keep empty directories around; drop stale partitions too
        if let Some(dir) = &self.local_root {
            if dir.exists() {
                tokio::fs::remove_dir_all(dir).await.map_err(|e| {
                    Error::storage(format!("Failed to remove {}: {e}", dir.display()))
                })?;
            }
        }

        Ok(existing.len())
    }
}

/// Check that no segment below `base` is hidden
fn is_visible(path: &ObjectPath, base: Option<&ObjectPath>) -> bool {
    fn hidden(part: &PathPart<'_>) -> bool {
        let name = part.as_ref();
        name.starts_with('.') || name.starts_with('_')
    }

    match base {
        Some(base) => path
            .prefix_match(base)
            .is_some_and(|mut rest| !rest.any(|part| hidden(&part))),
        None => !path.parts().any(|part| hidden(&part)),
    }
}
