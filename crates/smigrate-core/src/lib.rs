pub mod error;
pub mod orchestrator;
pub mod project;
pub mod report;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use error::MigrateError;
pub use orchestrator::Orchestrator;
pub use project::{project_id_map, to_migrated_dependency};
pub use report::BatchReport;
pub use resolver::{partition_dependencies, PartitionedDependencies};
