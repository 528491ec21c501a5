use lifecycle::LifecycleError;
use messaging::PublisherError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Failed to publish reply: {0}")]
    Reply(#[from] PublisherError),
}
