pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod orchestrator;
pub mod parsing;
pub mod reduce;
pub mod registry;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{ParseError, RegistryError};
pub use orchestrator::Orchestrator;
pub use reduce::{reduce, ReducePolicy};
pub use registry::{FormatDetector, MemoryProfileStore, ProfileStore, SledProfileStore};
pub use types::{Context, Dialect, ExtractionResult, Fact, FilingMetadata, FormatProfile, Unit};
