use std::io::Write;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Writes rows as CSV with a header line.
///
/// Missing values (`None`) become empty cells. The writer is flushed every
/// `flush_every` rows and at the end of the stream.
pub struct CsvReportSink<W: Write> {
    writer: Mutex<csv::Writer<W>>,
    flush_every: usize,
}

impl<W: Write> CsvReportSink<W> {
    pub fn new(inner: W, flush_every: usize) -> Self {
        Self {
            writer: Mutex::new(csv::Writer::from_writer(inner)),
            flush_every: flush_every.max(1),
        }
    }

    /// Recover the underlying writer, e.g. the buffer of an HTTP response.
    pub fn into_inner(self) -> Result<W, PipelineError> {
        self.writer
            .into_inner()
            .into_inner()
            .map_err(|e| PipelineError::Sink(format!("failed to finish CSV output: {}", e.error())))
    }
}

#[async_trait::async_trait]
impl<T, W> Sink<T> for CsvReportSink<W>
where
    T: Serialize + Send + 'static,
    W: Write + Send + 'static,
{
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut writer = self.writer.lock().await;
        let mut written: usize = 0;

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping record rejected upstream of CsvReportSink");
                    continue;
                }
            };

            writer.serialize(&env.payload).map_err(|e| {
                tracing::error!(error = %e, "failed to write CSV row");
                metrics::counter!("usage_report_sink_errors_total").increment(1);
                PipelineError::Sink(e.to_string())
            })?;
            written += 1;

            if written % self.flush_every == 0 {
                writer
                    .flush()
                    .map_err(|e| PipelineError::Sink(format!("failed to flush CSV output: {e}")))?;
            }
        }

        writer
            .flush()
            .map_err(|e| PipelineError::Sink(format!("failed to flush CSV output: {e}")))?;

        metrics::counter!("usage_report_rows_written_total").increment(written as u64);
        tracing::debug!(rows = written, "CSV report written");

        Ok(())
    }
}
