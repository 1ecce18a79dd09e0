use crate::error::CommonResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// File system abstraction for page storage and testing
pub trait FileSystem: Send + Sync {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write a file, creating parent directories as needed
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Files directly inside `dir`, sorted
    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real file system implementation
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// In-memory file system for testing
#[derive(Default)]
pub struct MockFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect())
    }
}

pub fn read_json<T: DeserializeOwned>(fs: &dyn FileSystem, path: &Path) -> CommonResult<T> {
    let source = fs.read_to_string(path)?;
    Ok(serde_json::from_str(&source)?)
}

pub fn write_json<T: Serialize>(fs: &dyn FileSystem, path: &Path, value: &T) -> CommonResult<()> {
    let source = serde_json::to_string_pretty(value)?;
    fs.write(path, &source)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;

    #[test]
    fn test_mock_file_system_lists_direct_children() {
        let fs = MockFileSystem::new();
        fs.add_file("pages/home.json", "{}");
        fs.add_file("pages/about.json", "{}");
        fs.add_file("pages/drafts/old.json", "{}");

        let listed = fs.list(Path::new("pages")).unwrap();
        assert_eq!(
            listed,
            vec![PathBuf::from("pages/about.json"), PathBuf::from("pages/home.json")]
        );
    }

    #[test]
    fn test_json_helpers_round_trip() {
        let fs = MockFileSystem::new();
        let path = Path::new("pages/home.json");

        write_json(&fs, path, &Data::default()).unwrap();
        let loaded: Data = read_json(&fs, path).unwrap();
        assert_eq!(loaded, Data::default());

        fs.remove(path).unwrap();
        assert!(!fs.exists(path));
        assert!(read_json::<Data>(&fs, path).is_err());
    }
}
