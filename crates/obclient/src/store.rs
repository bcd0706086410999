//! JSON files holding the registered client and the last access token.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use obclient_oauth::{Client, Token};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum StoreError {
    #[error("{} not found", path.display())]
    #[diagnostic(code(obclient::store::not_found))]
    NotFound { path: PathBuf },
    #[error("error accessing {}", path.display())]
    #[diagnostic(code(obclient::store::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error decoding {}", path.display())]
    #[diagnostic(
        code(obclient::store::serde),
        help("the file may be corrupt; delete it and run the command that creates it again")
    )]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// A value persisted as one JSON file in the storage folder.
pub trait Record: Serialize + DeserializeOwned {
    const FILE_NAME: &'static str;
}

impl Record for Client {
    const FILE_NAME: &'static str = "client.json";
}

impl Record for Token {
    const FILE_NAME: &'static str = "token.json";
}

#[derive(Debug, Clone)]
pub struct FileStore<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> FileStore<R> {
    pub fn new(folder: impl AsRef<Path>) -> Self {
        Self {
            path: folder.as_ref().join(R::FILE_NAME),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Result<R, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })
    }

    /// Write `record`, creating the storage folder if needed.
    pub fn store(&self, record: &R) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(folder) = self.path.parent() {
            std::fs::create_dir_all(folder).map_err(io)?;
        }
        let json = serde_json::to_string_pretty(record).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileStore::<Client>::new(dir.path()).get().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn stores_client_in_new_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("nested/data");
        let store = FileStore::<Client>::new(&folder);
        store.store(&Client::new("c1", "s1")).unwrap();

        assert_eq!(store.path(), folder.join("client.json"));
        assert_eq!(store.get().unwrap(), Client::new("c1", "s1"));
    }

    #[test]
    fn token_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let token = Token {
            access_token: "tok1".into(),
            token_type: "Bearer".into(),
            expires_in: Some(3600),
            scope: Some("accounts".into()),
            id_token: None,
        };
        FileStore::<Token>::new(dir.path()).store(&token).unwrap();
        assert!(dir.path().join("token.json").exists());
        assert_eq!(FileStore::<Token>::new(dir.path()).get().unwrap(), token);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token.json"), "{not json").unwrap();
        let err = FileStore::<Token>::new(dir.path()).get().unwrap_err();
        assert!(matches!(err, StoreError::Serde { .. }));
    }
}
