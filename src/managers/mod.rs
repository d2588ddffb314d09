// Thin per-concern managers over `storage::GraphStorage` (spec 4.1),
// mirroring the teacher's `services/*_service.rs` split: each manager owns
// no state of its own beyond the shared storage handle and translates
// storage-layer `bool`/`Option` returns into `GraphError::NotFound` at the
// public surface.

pub mod analytics;
pub mod entity;
pub mod hierarchy;
pub mod observation;
pub mod relation;
pub mod validation;

pub use analytics::{AnalyticsManager, GraphStats};
pub use entity::EntityManager;
pub use hierarchy::HierarchyManager;
pub use observation::ObservationManager;
pub use relation::RelationManager;
pub use validation::{ValidationIssue, ValidationManager, ValidationReport, ValidationWarning};
