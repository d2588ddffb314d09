// kgraph-engine - an embeddable knowledge-graph engine: persistent typed
// entities and relations, two storage backends behind one trait contract,
// and lexical/boolean/fuzzy/vector/hybrid retrieval over them.

pub mod builders;
pub mod cancellation;
pub mod context;
pub mod error;
pub mod events;
pub mod graph;
pub mod hash;
pub mod index;
pub mod io;
pub mod managers;
pub mod model;
pub mod observability;
pub mod search;
pub mod storage;
pub mod types;
pub mod vector;
pub mod workers;

pub use builders::{Backend, HybridWeightsBuilder, IndexConfig, IndexConfigBuilder, StorageConfig, StorageConfigBuilder};
pub use context::GraphContext;
pub use error::{GraphError, Result};
pub use managers::{ValidationIssue, ValidationManager, ValidationReport, ValidationWarning};
pub use model::{Entity, EntityUpdate, KnowledgeGraph, Relation, SnapshotVersion};
pub use observability::{init_logging, init_logging_with_level, log_operation, record_metric, with_trace_id, MetricType, Operation};
pub use storage::GraphStorage;
