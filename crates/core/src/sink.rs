use crate::analysis::AnalysisResult;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("failed to write analysis: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize analysis: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for a finished analysis.
pub trait AnalysisSink: Send {
    fn write<'a>(&'a mut self, result: &'a AnalysisResult) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Pretty-printed UTF-8 JSON, non-ASCII text kept as is.
fn render(result: &AnalysisResult) -> Result<Vec<u8>, SinkError> {
    let mut bytes = serde_json::to_vec_pretty(result)?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[derive(Clone, Debug)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalysisSink for JsonFileSink {
    fn write<'a>(&'a mut self, result: &'a AnalysisResult) -> BoxFuture<'a, Result<(), SinkError>> {
        async move {
            let bytes = render(result)?;
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&self.path, &bytes).await?;
            tracing::info!(path = %self.path.display(), bytes = bytes.len(), "analysis written");
            Ok(())
        }
        .boxed()
    }
}

/// Writes to any blocking writer, e.g. stdout.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> AnalysisSink for WriterSink<W> {
    fn write<'a>(&'a mut self, result: &'a AnalysisResult) -> BoxFuture<'a, Result<(), SinkError>> {
        async move {
            let bytes = render(result)?;
            self.writer.write_all(&bytes)?;
            self.writer.flush()?;
            Ok(())
        }
        .boxed()
    }
}
