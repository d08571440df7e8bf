// Service exports
pub mod reference;
pub mod store;

pub use reference::{CityReference, ReferenceDataError};
pub use store::{ArtifactKey, ArtifactStore, FileArtifactStore, MemoryArtifactStore, StoreError};
