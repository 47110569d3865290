use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("invalid file name {0:?}")]
    InvalidName(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Directory whose plain files can be requested by name.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` inside the store. Only a single normal path component is allowed.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, FileError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(FileError::InvalidName(name.to_string())),
        }
    }

    /// File body as base64 text, ready to go into a `FILE` reply.
    pub async fn read_base64(&self, name: &str) -> Result<String, FileError> {
        let path = self.resolve(name)?;
        let bytes = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FileError::NotFound(name.to_string())
            } else {
                FileError::Io { path, source }
            }
        })?;
        debug!("read {} bytes from {name}", bytes.len());
        Ok(STANDARD.encode(bytes))
    }
}

/// Decode a `FILE` reply and store it as `<unix-millis>-<name>` under `dir`.
pub async fn save_download(dir: &Path, name: &str, body: &str) -> Result<PathBuf, FileError> {
    let bytes = STANDARD.decode(body.trim())?;
    let stem = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dir.join(format!("{millis}-{stem}"));

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| FileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| FileError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_path_components() {
        let store = FileStore::new("images");
        assert_eq!(store.resolve("cat.jpg").unwrap(), PathBuf::from("images/cat.jpg"));
        for bad in ["", "..", "../secret", "a/b.jpg", "/etc/passwd", "."] {
            assert!(
                matches!(store.resolve(bad), Err(FileError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let store = FileStore::new(std::env::temp_dir());
        assert!(matches!(
            store.read_base64("arq-lab-definitely-missing.bin").await,
            Err(FileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn read_then_save_round_trip() {
        let dir = std::env::temp_dir().join(format!("arq-lab-files-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let blob: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        tokio::fs::write(dir.join("blob.bin"), &blob).await.unwrap();

        let body = FileStore::new(&dir).read_base64("blob.bin").await.unwrap();
        let saved = save_download(&dir.join("downloads"), "blob.bin", &body)
            .await
            .unwrap();

        assert!(saved.file_name().unwrap().to_str().unwrap().ends_with("-blob.bin"));
        assert_eq!(tokio::fs::read(&saved).await.unwrap(), blob);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
