//! # Library Operations Module
//!
//! Long-running, library-wide operations that call the metadata orchestrator
//! artist by artist.
//!
//! ## Overview
//!
//! This module handles:
//! - Tracking one live operation per library, rejecting concurrent starts
//! - Creating artist records from a connected media source (populate)
//! - Refreshing stored artists from providers (scan)
//! - Applying reconciled values without letting empty results erase data
//!
//! ## Components
//!
//! - **Operation Records** (`operation`): Kind, status and progress of an operation
//! - **Operation Tracker** (`tracker`): Single-flight registry with snapshot reads
//! - **Library Source** (`source`): Artist listing of a media server
//! - **Apply** (`apply`): Writes reconciled fields into stored records with provenance
//! - **Library Coordinator** (`coordinator`): Background populate and scan runs

pub mod apply;
pub mod coordinator;
pub mod error;
pub mod operation;
pub mod source;
pub mod tracker;

pub use apply::{apply_images, apply_metadata, artist_ref};
pub use coordinator::LibraryCoordinator;
pub use error::{Result, SyncError};
pub use operation::{OperationKind, OperationProgress, OperationRecord, OperationStatus};
pub use source::{LibrarySource, SourceArtist, StaticLibrarySource};
pub use tracker::OperationTracker;
