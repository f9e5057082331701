use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }

    /// Replace the payload, keeping the original receive time.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            payload: f(self.payload),
            received_at: self.received_at,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("analysis error: {0}")]
    Analysis(String),
    #[error("sink error: {0}")]
    Sink(String),
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

/// Drops records that do not belong in the output.
pub trait Filter<T>: Send + Sync {
    fn keep(&self, item: &Envelope<T>) -> bool;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

/// Source, then same-type validators, then the analyzer, then filters, then the sink.
pub struct Pipeline<S, I, O, K> {
    pub source: S,
    pub validators: Vec<Arc<dyn Transform<I, I> + Send + Sync>>,
    pub analyzer: Arc<dyn Transform<I, O> + Send + Sync>,
    pub filters: Vec<Arc<dyn Filter<O> + Send + Sync>>,
    pub sink: K,
}

impl<S, I, O, K> Pipeline<S, I, O, K>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Source<I> + Send + Sync + 'static,
    K: Sink<O> + Send + Sync + 'static,
{
    /// Drive the pipeline to completion and hand the sink back so buffered
    /// sinks can be drained.
    pub async fn run(self) -> Result<K, PipelineError> {
        let mut stream = self.source.stream().await;

        // Apply validators in sequence (if any).
        for t in self.validators {
            let t_arc = t.clone();
            stream = Box::pin(stream.then(move |item| {
                let t_inner = t_arc.clone();
                async move {
                    match item {
                        Ok(env) => t_inner.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        let analyzer = self.analyzer;
        let mut analyzed: EnvelopeStream<O> = Box::pin(stream.then(move |item| {
            let analyzer = analyzer.clone();
            async move {
                match item {
                    Ok(env) => analyzer.apply(env).await,
                    Err(e) => Err(e),
                }
            }
        }));

        // Errors pass through so the sink can log them.
        for f in self.filters {
            analyzed = Box::pin(analyzed.filter(move |item| {
                let keep = match item {
                    Ok(env) => f.keep(env),
                    Err(_) => true,
                };
                futures::future::ready(keep)
            }));
        }

        self.sink.run(analyzed).await?;
        Ok(self.sink)
    }
}
