//! # Event Bus System
//!
//! Typed events broadcast over `tokio::sync::broadcast` so hosts can observe
//! background library operations and record changes without polling.
//!
//! ```text
//! ┌──────────────────┐  emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ LibraryCoordinator├───────>│ EventBus ├────────────>│ Subscriber │
//! └──────────────────┘         └──────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, OperationEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//! bus.emit(CoreEvent::Operation(OperationEvent::Started {
//!     library_id: "lib-1".to_string(),
//!     operation: "populate".to_string(),
//! }))
//! .ok();
//! assert!(rx.try_recv().is_ok());
//! ```
//!
//! Emitting with no subscribers returns an error; publishers ignore it.
//! Slow subscribers get `RecvError::Lagged(n)` and can keep reading.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::trace;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Background populate/scan lifecycle
    Operation(OperationEvent),
    /// Artist record changes
    Library(LibraryEvent),
    /// Provider health
    Provider(ProviderEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Operation(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Provider(e) => e.description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum OperationEvent {
    Started {
        library_id: String,
        operation: String,
    },
    Progress {
        library_id: String,
        processed: u64,
        total: u64,
    },
    Completed {
        library_id: String,
        operation: String,
        message: String,
    },
    Failed {
        library_id: String,
        operation: String,
        message: String,
    },
}

impl OperationEvent {
    fn description(&self) -> &str {
        match self {
            OperationEvent::Started { .. } => "Library operation started",
            OperationEvent::Progress { .. } => "Library operation in progress",
            OperationEvent::Completed { .. } => "Library operation completed",
            OperationEvent::Failed { .. } => "Library operation failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    ArtistCreated {
        artist_id: String,
        library_id: String,
        name: String,
    },
    ArtistUpdated {
        artist_id: String,
        updated_fields: Vec<String>,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::ArtistCreated { .. } => "Artist added to library",
            LibraryEvent::ArtistUpdated { .. } => "Artist metadata updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ProviderEvent {
    /// Credentials for a provider are missing or rejected.
    AuthFailed { provider: String, message: String },
}

impl ProviderEvent {
    fn description(&self) -> &str {
        match self {
            ProviderEvent::AuthFailed { .. } => "Provider rejected credentials",
        }
    }
}

/// Broadcast channel for [`CoreEvent`]s. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; returns the number of subscribers that received it.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        trace!(event = event.description(), "Emitting core event");
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver that skips events not matching a predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
