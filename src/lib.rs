pub mod cluster;
pub mod config;
pub mod error;
pub mod role;
pub mod space;
pub mod sync;
pub mod transform;

pub use cluster::{ClusterSession, RoleReader, RoleWriter, WriteResult};
pub use config::AppConfig;
pub use error::{ClusterError, SyncError, TransformPrecondition};
pub use role::RoleDocument;
pub use space::{decide, Directive, SpaceMappingTable};
pub use sync::{RoleSyncOrchestrator, SyncOutcome, SyncStage};
pub use transform::{EmptyApplicationsPolicy, RoleTransformer};
