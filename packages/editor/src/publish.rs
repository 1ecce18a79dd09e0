//! Publishing: handing the finished page to the host

use crate::errors::PublishError;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use puck_common::{write_json, Data, FileSystem};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub trait PublishSink: Send + Sync {
    fn publish(&self, data: Data) -> BoxFuture<'static, Result<(), PublishError>>;
}

/// Writes published pages as pretty JSON
pub struct FileSink {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileSink {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }
}

impl PublishSink for FileSink {
    fn publish(&self, data: Data) -> BoxFuture<'static, Result<(), PublishError>> {
        let fs = Arc::clone(&self.fs);
        let path = self.path.clone();
        async move {
            write_json(fs.as_ref(), &path, &data)?;
            info!(path = %path.display(), "Published page");
            Ok(())
        }
        .boxed()
    }
}

/// Keeps every published page in memory
#[derive(Default)]
pub struct MemorySink {
    published: Mutex<Vec<Data>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Data> {
        self.published.lock().clone()
    }
}

impl PublishSink for MemorySink {
    fn publish(&self, data: Data) -> BoxFuture<'static, Result<(), PublishError>> {
        self.published.lock().push(data);
        futures::future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puck_common::{read_json, ComponentData, MockFileSystem};
    use std::path::Path;

    #[tokio::test]
    async fn test_file_sink_writes_json() {
        let fs = Arc::new(MockFileSystem::new());
        let sink = FileSink::new(fs.clone(), "public/home.json");
        let data = Data {
            content: vec![ComponentData::new("Heading", "h1")],
            ..Data::default()
        };

        sink.publish(data.clone()).await.unwrap();

        let written: Data = read_json(fs.as_ref(), Path::new("public/home.json")).unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn test_memory_sink_collects_pages() {
        let sink = MemorySink::new();
        sink.publish(Data::default()).await.unwrap();
        sink.publish(Data::default()).await.unwrap();

        assert_eq!(sink.published().len(), 2);
    }
}
