//! Resolution of slide locators to a filesystem and a path.
//!
//! A locator is either a plain filesystem path or a URL. Plain paths and
//! `file://` URLs resolve to the local filesystem. Every other scheme is a
//! remote filesystem, which the native slide reader cannot open.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use tracing::debug;
use url::Url;

use crate::error::SourceError;

/// Backend options passed alongside a locator (credentials, endpoints, ...).
///
/// They only matter for remote filesystems and are ignored for local files.
pub type FileOptions = BTreeMap<String, String>;

/// Filesystem a locator resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filesystem {
    /// Local filesystem
    Local,
    /// Any URL-addressed remote filesystem (`s3`, `gs`, `http`, ...)
    Remote { scheme: String },
}

impl Filesystem {
    /// Protocol name, `"file"` for the local filesystem.
    pub fn protocol(&self) -> &str {
        match self {
            Filesystem::Local => "file",
            Filesystem::Remote { scheme } => scheme,
        }
    }

    /// Whether files on this filesystem can be opened by path.
    pub fn is_local(&self) -> bool {
        matches!(self, Filesystem::Local)
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol())
    }
}

/// A locator split into its filesystem and the path on that filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocator {
    /// The locator as given by the caller
    pub locator: String,
    /// Filesystem the locator points into
    pub filesystem: Filesystem,
    /// Path on that filesystem (bucket/key for object stores)
    pub path: PathBuf,
}

impl ResolvedLocator {
    /// Return the local path, or [`SourceError::UnsupportedSource`] for a
    /// remote filesystem.
    pub fn into_local_path(self) -> Result<PathBuf, SourceError> {
        match self.filesystem {
            Filesystem::Local => Ok(self.path),
            Filesystem::Remote { scheme } => Err(SourceError::UnsupportedSource {
                locator: self.locator,
                scheme,
            }),
        }
    }
}

/// Resolve a locator to a filesystem and path.
///
/// Windows drive paths such as `C:/slides/a.svs` parse as URLs with a
/// one-letter scheme and are treated as local paths.
pub fn resolve_locator(locator: &str, options: &FileOptions) -> Result<ResolvedLocator, SourceError> {
    if locator.trim().is_empty() {
        return Err(SourceError::InvalidLocator {
            locator: locator.to_string(),
            message: "empty locator".to_string(),
        });
    }

    if !options.is_empty() {
        debug!(
            locator,
            options = ?options.keys().collect::<Vec<_>>(),
            "filesystem options supplied"
        );
    }

    let url = match Url::parse(locator) {
        Ok(url) if url.scheme().len() > 1 => url,
        // Relative paths, absolute paths and drive letters
        _ => {
            return Ok(ResolvedLocator {
                locator: locator.to_string(),
                filesystem: Filesystem::Local,
                path: PathBuf::from(locator),
            })
        }
    };

    if url.scheme() == "file" {
        let path = url
            .to_file_path()
            .map_err(|_| SourceError::InvalidLocator {
                locator: locator.to_string(),
                message: "file URL does not map to a local path".to_string(),
            })?;
        return Ok(ResolvedLocator {
            locator: locator.to_string(),
            filesystem: Filesystem::Local,
            path,
        });
    }

    let mut path = String::new();
    if let Some(host) = url.host_str() {
        path.push_str(host);
    }
    path.push_str(url.path());

    Ok(ResolvedLocator {
        locator: locator.to_string(),
        filesystem: Filesystem::Remote {
            scheme: url.scheme().to_string(),
        },
        path: PathBuf::from(path),
    })
}
