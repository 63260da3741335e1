mod error;
mod records;
mod topic;

use std::future::Future;

use crate::location::PositionSample;

pub use error::SinkError;
pub use records::{LocationRecord, RecordStore};
pub use topic::{topic_for, TopicSink};

/// Destination for position samples.
///
/// One call per tick; a failure is dropped after logging and superseded by
/// the next tick's fresh sample.
pub trait PublishSink: Send + Sync {
    fn publish(&self, sample: &PositionSample) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Runtime-selected sink variant.
pub enum Sink {
    Topic(TopicSink),
    Records(std::sync::Arc<RecordStore>),
}

impl PublishSink for Sink {
    async fn publish(&self, sample: &PositionSample) -> Result<(), SinkError> {
        match self {
            Sink::Topic(topic) => topic.publish(sample).await,
            Sink::Records(store) => store.create(sample).await.map(|_| ()),
        }
    }
}
