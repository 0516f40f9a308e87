//! Progress events for submissions
//!
//! The bus wraps a `tokio::sync::broadcast` channel. Emitting never blocks
//! and never fails: with no subscribers the event is dropped, and a lagging
//! subscriber loses the oldest events first.
//!
//! # Example
//!
//! ```
//! use libdailyspark::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let bus = EventBus::new(100);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Event::ValidationStarted { file_name: Some("clip.mp4".to_string()) });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer before lagging kicks in
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Stages of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ValidationStarted {
        file_name: Option<String>,
    },

    ValidationFinished {
        is_valid: bool,
        /// Rendered validator warnings, in evaluation order
        warnings: Vec<String>,
    },

    UploadStarted {
        file_name: Option<String>,
        size: u64,
    },

    UploadCompleted {
        url: String,
    },

    SubmissionStarted {
        platforms: Vec<String>,
        /// `schedule` or `now`
        delivery: String,
    },

    SubmissionCompleted {
        /// Queue id for scheduled posts, publisher receipt for immediate ones
        id: String,
    },

    /// Any stage failed; the message is shown to the user as is
    SubmissionFailed {
        error: String,
    },
}
