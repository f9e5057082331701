use futures::StreamExt;
use tokio::sync::Mutex;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Gathers rows in memory, e.g. for a JSON response.
///
/// Upstream errors are logged and skipped so one bad reading does not sink the
/// whole report.
pub struct CollectSink<T> {
    rows: Mutex<Vec<T>>,
    rejected: Mutex<usize>,
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            rejected: Mutex::new(0),
        }
    }
}

impl<T> CollectSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows.into_inner()
    }

    /// Rows dropped because of an upstream error.
    pub async fn rejected(&self) -> usize {
        *self.rejected.lock().await
    }
}

#[async_trait::async_trait]
impl<T> Sink<T> for CollectSink<T>
where
    T: Send + 'static,
{
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut rows = self.rows.lock().await;

        while let Some(item) = input.next().await {
            match item {
                Ok(env) => rows.push(env.payload),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping record rejected upstream of CollectSink");
                    *self.rejected.lock().await += 1;
                }
            }
        }

        Ok(())
    }
}
