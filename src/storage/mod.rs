//! Object storage backends.
//!
//! The [`backend::ObjectStore`] trait abstracts over where objects live.
//! [`aws::AwsObjectStore`] talks to S3; [`memory::MemoryObjectStore`]
//! keeps everything in process for local runs and tests.

pub mod aws;
pub mod backend;
pub mod memory;

use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;
use backend::ObjectStore;

/// Build the process-wide object store handle selected by `storage.backend`.
pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.backend.as_str() {
        "aws" => {
            let store = aws::AwsObjectStore::new(&config.aws).await?;
            Ok(Arc::new(store))
        }
        "memory" => {
            info!(
                "Memory object store initialized: endpoint={}",
                config.memory.endpoint
            );
            Ok(Arc::new(memory::MemoryObjectStore::new(&config.memory)))
        }
        other => anyhow::bail!("unknown storage.backend {other:?} (expected 'aws' or 'memory')"),
    }
}
