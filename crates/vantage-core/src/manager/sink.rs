use async_trait::async_trait;

use crate::schema::SchemaDocument;

/// Receives the serialised schema whenever a run's progress or outcome changes.
///
/// Only consulted for schemas with `send_request` set.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send(
        &self,
        document: &SchemaDocument,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
}
