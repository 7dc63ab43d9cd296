//! # Artist Library
//!
//! Artist record model and the record-store contract the metadata core
//! consumes:
//!
//! - [`ArtistRecord`] / [`BandMember`] - persisted artist shape
//! - [`ArtistRepository`] - lookup by id, provider id, and name within a library
//! - [`InMemoryArtistRepository`] - process-local implementation

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

pub use error::{LibraryError, Result};
pub use memory::InMemoryArtistRepository;
pub use models::{ArtistId, ArtistRecord, BandMember};
pub use repository::ArtistRepository;
