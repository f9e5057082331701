use std::sync::Mutex;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Streams records that were already loaded. Can be consumed once.
pub struct MemorySource<T> {
    items: Mutex<Option<Vec<T>>>,
}

impl<T> MemorySource<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: Mutex::new(Some(items)),
        }
    }
}

#[async_trait::async_trait]
impl<T> Source<T> for MemorySource<T>
where
    T: Send + 'static,
{
    async fn stream(&self) -> EnvelopeStream<T> {
        let items = match self.items.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let s = async_stream::stream! {
            match items {
                Some(items) => {
                    for item in items {
                        yield Ok(Envelope::new(item));
                    }
                }
                None => {
                    yield Err(PipelineError::Source(
                        "memory source already consumed; only one consumer supported".to_string(),
                    ));
                }
            }
        };

        Box::pin(s)
    }
}
