//! Service layer for DailySpark
//!
//! The CLI tools go through this layer rather than touching the database
//! directly.
//!
//! # Architecture
//!
//! `SparkService` is the main entry point and hands out the sub-services,
//! which share one `Arc<Database>` and one cache. Cached entries are scoped
//! to the database they mirror, so a cache file shared by several databases
//! never serves one database's rows for another.
//!
//! - `QueueStore`: the per-user queue of scheduled posts
//! - `SettingsService`: profile and settings document
//! - `GenerationService`: content improvement and image generation
//! - `SubmissionFlow`: one composer form, from media upload to delivery
//! - `EventBus`: progress event distribution
//!
//! # Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use libdailyspark::auth::Session;
//! use libdailyspark::service::SparkService;
//! use libdailyspark::types::{QueueDraft, SocialPlatform};
//!
//! # async fn example() -> libdailyspark::Result<()> {
//! let service = SparkService::new().await?;
//! let session = Session::local();
//!
//! let draft = QueueDraft::new(
//!     "Shipping day!",
//!     vec![SocialPlatform::Linkedin, SocialPlatform::X],
//!     Utc::now() + Duration::hours(2),
//! );
//! let id = service.queue().enqueue(&session, draft).await?;
//! println!("Queued {}", id);
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod generation;
pub mod queue;
pub mod settings;
pub mod submission;

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use self::events::EventBus;
use self::generation::GenerationService;
use self::queue::QueueStore;
use self::settings::SettingsService;
use self::submission::{ComposerForm, SubmissionFlow};
use crate::blob::{BlobStore, LocalBlobStore};
use crate::cache::CacheService;
use crate::publisher::Publisher;
use crate::types::parse_platforms;
use crate::{Config, Database, Result};

/// Main service facade
///
/// All sub-services share the same `Arc<Database>` and cache, so handing
/// out clones is cheap.
pub struct SparkService {
    db: Arc<Database>,
    config: Arc<Config>,
    queue: QueueStore,
    settings: SettingsService,
    generation: GenerationService,
    blobs: Arc<dyn BlobStore>,
    event_bus: EventBus,
}

impl SparkService {
    /// Create a service from the default configuration
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service from an explicit configuration
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or migrated, or if a
    /// generation provider is configured without a command.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(&config.database.path).await?);
        let cache =
            CacheService::file(config.cache_path()).scoped(&store_scope(&config.database_path()));
        let event_bus = EventBus::new(100);

        let queue = QueueStore::new(Arc::clone(&db), cache.clone(), config.cache.queue_ttl);
        let settings = SettingsService::new(Arc::clone(&db), cache, config.cache.settings_ttl);
        let generation = GenerationService::from_config(settings.clone(), &config.generation)?;
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(config.media_dir()));

        Ok(Self {
            db,
            config: Arc::new(config),
            queue,
            settings,
            generation,
            blobs,
            event_bus,
        })
    }

    /// Access the database directly
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn generation(&self) -> &GenerationService {
        &self.generation
    }

    /// Start a composer form that delivers immediate posts to `publisher`
    ///
    /// The form starts with the configured default platforms.
    pub fn composer(&self, publisher: Arc<dyn Publisher>) -> Result<SubmissionFlow> {
        let platforms = parse_platforms(&self.config.defaults.platforms)?;
        Ok(SubmissionFlow::new(
            ComposerForm::new(platforms),
            self.queue.clone(),
            Arc::clone(&self.blobs),
            publisher,
            self.event_bus.clone(),
        ))
    }

    /// Subscribe to progress events of every composer this service created
    pub fn subscribe(&self) -> events::EventReceiver {
        self.event_bus.subscribe()
    }
}

/// Short stable identifier of a database file, used as its cache scope
fn store_scope(db_path: &Path) -> String {
    let resolved = std::fs::canonicalize(db_path).unwrap_or_else(|_| db_path.to_path_buf());
    let digest = Sha256::digest(resolved.to_string_lossy().as_bytes());
    hex::encode(&digest[..8])
}
