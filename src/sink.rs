use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::File,
    io::{AsyncSeekExt, AsyncWrite, AsyncWriteExt},
};

use crate::{parse::HarvestRecord, Error, Result};

pub const TSV_HEADER: &str = "Timestamp\tService\tRegion\tMessage";

/// Where a `TsvSink` writes its bytes.
#[async_trait]
pub trait SinkTarget: AsyncWrite + Unpin + Send {
    /// Makes everything written so far durable.
    async fn sync(&mut self) -> io::Result<()>;

    /// Drops everything past `len` bytes and continues writing from there.
    async fn rollback_to(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl SinkTarget for File {
    async fn sync(&mut self) -> io::Result<()> {
        self.sync_data().await
    }

    async fn rollback_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await?;
        self.seek(SeekFrom::Start(len)).await?;
        Ok(())
    }
}

/// Append-only TSV file that the harvest loop writes pages into.
///
/// The header is on disk as soon as the sink is created, and every call to `append_page`
/// ends with a flush + `fsync`, so a crash between pages never loses an acknowledged row.
/// A page that fails halfway is cut off again, so the file only ever holds whole pages.
#[derive(Debug)]
pub struct TsvSink<W = File> {
    path: PathBuf,
    target: W,
    /// Bytes known to be durable.
    synced_len: u64,
    persisted: usize,
}

impl TsvSink<File> {
    /// Creates (or truncates) the file at `path` and durably writes the header row.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .await
            .map_err(|source| sink_error(&path, 0, source))?;
        TsvSink::with_target(path, file).await
    }
}

impl<W: SinkTarget> TsvSink<W> {
    /// Wraps an empty `target` and durably writes the header row.
    /// `path` only names the target in reports and errors.
    pub async fn with_target(path: impl Into<PathBuf>, target: W) -> Result<Self> {
        let mut sink = Self {
            path: path.into(),
            target,
            synced_len: 0,
            persisted: 0,
        };
        sink.commit(&format!("{TSV_HEADER}\n")).await?;
        Ok(sink)
    }

    /// Writes one page worth of records and makes them durable before returning.
    /// Returns the number of records appended. On failure none of the page is kept.
    pub async fn append_page(&mut self, records: &[HarvestRecord]) -> Result<usize> {
        let mut page = String::new();
        for record in records {
            page.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                record.timestamp, record.service, record.region, record.message
            ));
        }
        self.commit(&page).await?;
        self.persisted += records.len();
        Ok(records.len())
    }

    /// Flushes and closes the target, returning the number of records on disk.
    pub async fn close(mut self) -> Result<usize> {
        let persisted = self.persisted;
        let res = async {
            self.target.flush().await?;
            self.target.shutdown().await
        }
        .await;
        res.map_err(|source| sink_error(&self.path, persisted, source))?;
        Ok(persisted)
    }

    pub fn persisted(&self) -> usize {
        self.persisted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `chunk` in one go and syncs it. Anything that got out before a failure
    /// is rolled back to the last synced length.
    async fn commit(&mut self, chunk: &str) -> Result<()> {
        let res = async {
            self.target.write_all(chunk.as_bytes()).await?;
            self.target.flush().await?;
            self.target.sync().await
        }
        .await;

        match res {
            Ok(()) => {
                self.synced_len += chunk.len() as u64;
                Ok(())
            }
            Err(source) => {
                if let Err(err) = self.target.rollback_to(self.synced_len).await {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %err,
                        "Couldn't cut the failed page off the output"
                    );
                }
                Err(sink_error(&self.path, self.persisted, source))
            }
        }
    }
}

fn sink_error(path: &Path, persisted: usize, source: std::io::Error) -> Error {
    Error::Sink {
        path: path.to_path_buf(),
        persisted,
        source,
    }
}
