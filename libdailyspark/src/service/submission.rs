//! Post submission flow
//!
//! Drives one composer form through `Idle → Validating → Uploading → Idle`
//! when media is attached, and `Idle → Submitting → Idle` when the post is
//! sent. Only one stage runs at a time; a second request while one is in
//! flight is refused, the way a disabled submit button would.
//!
//! Nothing is persisted before submission succeeds. [`SubmissionFlow::reset`]
//! abandons the form, and an upload that finishes after a reset is dropped.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::blob::BlobStore;
use crate::error::{Result, SparkError, ValidationErrors};
use crate::media::{MediaFile, MediaValidation, MediaValidator, Warning, WarningLevel};
use crate::publisher::{PublishRequest, Publisher};
use crate::service::events::{Event, EventBus};
use crate::service::queue::{PostShape, QueueStore};
use crate::types::{MediaType, PostType, QueueDraft, SocialPlatform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Validating,
    Uploading,
    Submitting,
}

/// When the post should go out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Now,
    Schedule(DateTime<Utc>),
}

impl Delivery {
    fn label(&self) -> &'static str {
        match self {
            Delivery::Now => "now",
            Delivery::Schedule(_) => "schedule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedMedia {
    pub url: String,
    pub media_type: MediaType,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposerForm {
    pub content: String,
    pub platforms: Vec<SocialPlatform>,
    pub post_type: PostType,
    pub delivery: Delivery,
    /// Queue as `pending` rather than `scheduled`
    pub await_confirmation: bool,
    pub media: Option<AttachedMedia>,
    /// Findings from the last media validation
    pub warnings: Vec<Warning>,
}

impl ComposerForm {
    pub fn new(platforms: Vec<SocialPlatform>) -> Self {
        Self {
            content: String::new(),
            platforms,
            post_type: PostType::Post,
            delivery: Delivery::Now,
            await_confirmation: false,
            media: None,
            warnings: Vec::new(),
        }
    }

    fn clear_draft(&mut self) {
        self.content.clear();
        self.media = None;
        self.warnings.clear();
    }
}

/// What a successful submission produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Queue id for scheduled posts, publisher receipt for immediate ones
    pub id: String,
    pub delivery: Delivery,
    pub message: String,
}

struct FlowInner {
    state: FlowState,
    form: ComposerForm,
    /// Bumped by every reset so late results can tell they are stale
    generation: u64,
}

/// Returns the flow to `Idle` when a stage ends, however it ends
struct StageGuard<'a> {
    inner: &'a Mutex<FlowInner>,
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        lock(self.inner).state = FlowState::Idle;
    }
}

fn lock(inner: &Mutex<FlowInner>) -> MutexGuard<'_, FlowInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct SubmissionFlow {
    inner: Arc<Mutex<FlowInner>>,
    queue: QueueStore,
    blobs: Arc<dyn BlobStore>,
    publisher: Arc<dyn Publisher>,
    validator: MediaValidator,
    events: EventBus,
}

impl SubmissionFlow {
    pub fn new(
        form: ComposerForm,
        queue: QueueStore,
        blobs: Arc<dyn BlobStore>,
        publisher: Arc<dyn Publisher>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FlowInner {
                state: FlowState::Idle,
                form,
                generation: 0,
            })),
            queue,
            blobs,
            publisher,
            validator: MediaValidator::new(),
            events,
        }
    }

    pub fn state(&self) -> FlowState {
        lock(&self.inner).state
    }

    /// Snapshot of the form
    pub fn form(&self) -> ComposerForm {
        lock(&self.inner).form.clone()
    }

    /// Edit the form in place
    pub fn edit(&self, f: impl FnOnce(&mut ComposerForm)) {
        f(&mut lock(&self.inner).form);
    }

    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.edit(|form| form.content = content);
    }

    /// Abandon the draft. Platforms and post type stay selected.
    pub fn reset(&self) {
        let mut inner = lock(&self.inner);
        inner.form.clear_draft();
        inner.generation += 1;
        debug!("Composer reset");
    }

    fn begin(&self, stage: FlowState) -> Result<(StageGuard<'_>, u64)> {
        let mut inner = lock(&self.inner);
        if inner.state != FlowState::Idle {
            return Err(SparkError::InvalidInput(
                "submission already in progress".to_string(),
            ));
        }
        inner.state = stage;
        Ok((StageGuard { inner: &self.inner }, inner.generation))
    }

    fn enter(&self, stage: FlowState) {
        lock(&self.inner).state = stage;
    }

    fn fail(&self, error: SparkError) -> SparkError {
        warn!("Submission step failed: {}", error);
        self.events.emit(Event::SubmissionFailed {
            error: error.user_message(),
        });
        error
    }

    /// Validate a file and, if it passes, upload it and attach it to the form
    ///
    /// The returned validation may still carry cautions; callers use
    /// [`MediaValidation::has_cautions`] to say "uploaded with warnings".
    pub async fn attach_media(&self, file: MediaFile) -> Result<MediaValidation> {
        let (_guard, generation) = self.begin(FlowState::Validating)?;
        let candidate = &file.candidate;

        self.events.emit(Event::ValidationStarted {
            file_name: candidate.file_name.clone(),
        });

        let post_type = lock(&self.inner).form.post_type;
        let validation = self.validator.validate(candidate, post_type);
        lock(&self.inner).form.warnings = validation.warnings.clone();

        self.events.emit(Event::ValidationFinished {
            is_valid: validation.is_valid,
            warnings: validation.messages(),
        });

        let media_type = match candidate.media_type() {
            Some(media_type) if validation.is_valid => media_type,
            _ => {
                let errors = validation
                    .warnings
                    .iter()
                    .filter(|w| w.level == WarningLevel::Error)
                    .map(|w| w.message.clone())
                    .collect();
                return Err(self.fail(SparkError::Validation(ValidationErrors(errors))));
            }
        };

        self.enter(FlowState::Uploading);
        self.events.emit(Event::UploadStarted {
            file_name: candidate.file_name.clone(),
            size: candidate.size,
        });

        let url = self
            .blobs
            .upload(candidate, &file.bytes)
            .await
            .map_err(|e| self.fail(e))?;

        {
            let mut inner = lock(&self.inner);
            if inner.generation != generation {
                return Err(SparkError::InvalidInput(
                    "media attachment cancelled".to_string(),
                ));
            }
            inner.form.media = Some(AttachedMedia {
                url: url.clone(),
                media_type,
                file_name: candidate.file_name.clone(),
            });
        }

        info!("Attached {} {}", media_type, url);
        self.events.emit(Event::UploadCompleted { url });
        Ok(validation)
    }

    /// Send the form: enqueue it or publish it right away
    ///
    /// On success the content, media and warnings are cleared. On failure
    /// the form is left as it was and the error message is the one the
    /// store or publisher reported.
    pub async fn submit(&self, session: &Session) -> Result<SubmissionOutcome> {
        let (_guard, generation) = self.begin(FlowState::Submitting)?;
        let form = self.form();

        self.events.emit(Event::SubmissionStarted {
            platforms: form.platforms.iter().map(|p| p.to_string()).collect(),
            delivery: form.delivery.label().to_string(),
        });

        let result = match form.delivery {
            Delivery::Schedule(at) => self.schedule(session, &form, at).await,
            Delivery::Now => self.publish_now(session, &form).await,
        };

        let outcome = result.map_err(|e| self.fail(e))?;

        {
            let mut inner = lock(&self.inner);
            if inner.generation == generation {
                inner.form.clear_draft();
            }
        }

        self.events.emit(Event::SubmissionCompleted {
            id: outcome.id.clone(),
        });
        Ok(outcome)
    }

    async fn schedule(
        &self,
        session: &Session,
        form: &ComposerForm,
        at: DateTime<Utc>,
    ) -> Result<SubmissionOutcome> {
        let draft = QueueDraft {
            content: form.content.clone(),
            platforms: form.platforms.clone(),
            media_url: form.media.as_ref().map(|m| m.url.clone()),
            media_type: form.media.as_ref().map(|m| m.media_type),
            post_type: form.post_type,
            scheduled_at: at,
            await_confirmation: form.await_confirmation,
        };

        let id = self.queue.enqueue(session, draft).await?;
        Ok(SubmissionOutcome {
            id,
            delivery: form.delivery,
            message: "Post scheduled successfully!".to_string(),
        })
    }

    async fn publish_now(&self, session: &Session, form: &ComposerForm) -> Result<SubmissionOutcome> {
        let shape = PostShape {
            content: &form.content,
            platforms: &form.platforms,
            media_url: form.media.as_ref().map(|m| m.url.as_str()),
            media_type: form.media.as_ref().map(|m| m.media_type),
            post_type: form.post_type,
        };
        shape.violations().into_result()?;

        let request = PublishRequest {
            uid: session.uid().to_string(),
            content: form.content.clone(),
            platforms: form.platforms.clone(),
            media_url: form.media.as_ref().map(|m| m.url.clone()),
            media_type: form.media.as_ref().map(|m| m.media_type),
            post_type: form.post_type,
        };

        let id = self.publisher.publish(&request).await?;
        info!(publisher = %self.publisher.name(), receipt = %id, "Published post");

        Ok(SubmissionOutcome {
            id,
            delivery: form.delivery,
            message: "Post sent successfully!".to_string(),
        })
    }
}
