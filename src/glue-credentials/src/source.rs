use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Somewhere a serialized secret can be read from.
///
/// `read` returns `Ok(None)` when the secret has not been materialised yet,
/// which the cache treats differently from an unreadable one.
pub trait SecretSource: Send + Sync + std::fmt::Debug {
    fn location(&self) -> &Path;

    fn read(&self) -> std::io::Result<Option<Vec<u8>>>;
}

/// A secret file written by the secret-distribution agent.
#[derive(Debug, Clone)]
pub struct SecretFile {
    path: PathBuf,
}

impl SecretFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SecretSource for SecretFile {
    fn location(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
