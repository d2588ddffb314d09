// Narrow import/export contract (SPEC_FULL.md section D, non-goals): this
// crate defines only the trait surface a host application would implement
// against. No file format, CLI parser, or output formatter lives here -
// those are explicitly out of scope.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::KnowledgeGraph;

/// Something that can produce a `KnowledgeGraph` from an external
/// representation. Host applications implement this per format (JSON,
/// a legacy MemoryJS export, etc.) - this crate ships no implementations.
#[async_trait]
pub trait GraphImporter: Send + Sync {
    async fn import(&self, source: &[u8]) -> Result<KnowledgeGraph>;
}

/// The inverse of `GraphImporter`: serializes a `KnowledgeGraph` into an
/// external representation chosen by the host application.
#[async_trait]
pub trait GraphExporter: Send + Sync {
    async fn export(&self, graph: &KnowledgeGraph) -> Result<Vec<u8>>;
}
