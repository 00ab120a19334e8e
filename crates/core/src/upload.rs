//! Streaming uploads to disk with cleanup on failure.
//!
//! An [`UploadSink`] owns its target file until [`UploadSink::commit`]
//! succeeds. Any error along the way, or dropping the sink early (a client
//! disconnect cancels the request future), removes whatever was written.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::CoreError;

/// Suffix of the hidden staging files used by [`UploadSink::replace`].
const STAGING_SUFFIX: &str = "upload";

/// An in-progress upload.
#[derive(Debug)]
pub struct UploadSink {
    destination: PathBuf,
    /// File being written: the destination itself, or a staging file that
    /// is renamed over it on commit.
    write_path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
    committed: bool,
}

impl UploadSink {
    /// Start an upload that must not overwrite anything.
    ///
    /// Fails with [`CoreError::AlreadyExists`] when `destination` is present.
    /// The file is opened with exclusive create, so of two concurrent uploads
    /// to the same new path exactly one wins.
    pub async fn create(destination: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let destination = destination.into();

        if tokio::fs::try_exists(&destination)
            .await
            .map_err(|e| io_error(e, &destination))?
        {
            return Err(CoreError::AlreadyExists { path: destination });
        }
        create_parent(&destination).await?;

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => CoreError::AlreadyExists {
                    path: destination.clone(),
                },
                _ => io_error(e, &destination),
            })?;

        Ok(Self::open(destination.clone(), destination, file))
    }

    /// Start an upload that replaces `destination` atomically on commit.
    ///
    /// Every sink writes its own staging file, so concurrent replacements of
    /// the same destination never share bytes; the last commit wins.
    pub async fn replace(destination: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let destination = destination.into();
        let file_name = destination
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                CoreError::PathTraversal(format!(
                    "{} has no file name",
                    destination.display()
                ))
            })?;
        let staging = destination.with_file_name(format!(
            ".{file_name}.{}.{STAGING_SUFFIX}",
            uuid::Uuid::new_v4().simple()
        ));

        create_parent(&destination).await?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)
            .await
            .map_err(|e| io_error(e, &staging))?;

        Ok(Self::open(destination, staging, file))
    }

    fn open(destination: PathBuf, write_path: PathBuf, file: File) -> Self {
        Self {
            destination,
            write_path,
            file: Some(file),
            bytes_written: 0,
            committed: false,
        }
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CoreError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CoreError::Internal("upload already finished".into()))?;
        file.write_all(chunk).await.map_err(|e| {
            CoreError::UploadInterrupted(format!(
                "write to {} failed: {e}",
                self.write_path.display()
            ))
        })?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Drain `stream` into the file. A stream error is reported as
    /// [`CoreError::UploadInterrupted`]; the sink is left uncommitted.
    pub async fn write_stream<S, E>(&mut self, stream: S) -> Result<u64, CoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CoreError::UploadInterrupted(e.to_string()))?;
            self.write_chunk(&chunk).await?;
        }
        Ok(self.bytes_written)
    }

    /// Flush to disk and hand the file over to its final path.
    pub async fn commit(mut self) -> Result<u64, CoreError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CoreError::Internal("upload already finished".into()))?;

        file.flush()
            .await
            .map_err(|e| CoreError::UploadInterrupted(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| CoreError::UploadInterrupted(e.to_string()))?;
        drop(file);

        if self.write_path != self.destination {
            tokio::fs::rename(&self.write_path, &self.destination)
                .await
                .map_err(|e| io_error(e, &self.destination))?;
        }

        self.committed = true;
        tracing::info!(
            path = %self.destination.display(),
            bytes = self.bytes_written,
            "Upload stored",
        );
        Ok(self.bytes_written)
    }
}

impl Drop for UploadSink {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();

        match std::fs::remove_file(&self.write_path) {
            Ok(()) => tracing::warn!(
                path = %self.write_path.display(),
                bytes = self.bytes_written,
                "Removed partial upload",
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %self.write_path.display(),
                error = %e,
                "Failed to remove partial upload",
            ),
        }
    }
}

/// Stream an upload into a new file at `destination`.
///
/// Returns the number of bytes stored. On any failure nothing is left at
/// `destination`.
pub async fn receive<S, E>(stream: S, destination: impl Into<PathBuf>) -> Result<u64, CoreError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut sink = UploadSink::create(destination).await?;
    sink.write_stream(stream).await?;
    sink.commit().await
}

async fn create_parent(path: &Path) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(e, parent))?;
    }
    Ok(())
}

fn io_error(err: std::io::Error, path: &Path) -> CoreError {
    CoreError::Internal(format!("I/O error on {}: {err}", path.display()))
}
