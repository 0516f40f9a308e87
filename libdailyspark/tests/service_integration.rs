//! Integration tests for the service layer
//!
//! These go through `SparkService` the way the CLI tools do, with a real
//! SQLite database and file-backed cache in a temporary directory.

use chrono::{Duration, Utc};
use libdailyspark::auth::Session;
use libdailyspark::config::ProviderConfig;
use libdailyspark::media::MediaFile;
use libdailyspark::publisher::mock::MockPublisher;
use libdailyspark::service::events::Event;
use libdailyspark::service::submission::{Delivery, FlowState};
use libdailyspark::service::SparkService;
use libdailyspark::types::{MediaType, PostType, QueueDraft, SocialPlatform, UserSettings};
use libdailyspark::{Config, QueueStatus, SparkError};
use std::sync::Arc;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default_config();
    config.database.path = dir.path().join("spark.db").to_string_lossy().into_owned();
    config.cache.path = dir.path().join("cache.json").to_string_lossy().into_owned();
    config.storage.media_dir = dir.path().join("media").to_string_lossy().into_owned();
    config
}

async fn service_in(dir: &TempDir) -> SparkService {
    SparkService::from_config(config_in(dir)).await.unwrap()
}

fn mp4(size: usize) -> MediaFile {
    MediaFile::from_bytes("clip.mp4", vec![0u8; size])
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let dir = TempDir::new().unwrap();
    let session = Session::new("ana");

    let id = {
        let service = service_in(&dir).await;
        let draft = QueueDraft::new(
            "Persisted",
            vec![SocialPlatform::Facebook],
            Utc::now() + Duration::hours(4),
        );
        service.queue().enqueue(&session, draft).await.unwrap()
    };

    let service = service_in(&dir).await;
    let post = service.queue().get(&session, &id).await.unwrap().unwrap();
    assert_eq!(post.content, "Persisted");
    assert_eq!(post.status, QueueStatus::Scheduled);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir).await;
    let ana = Session::new("ana");
    let bo = Session::new("bo");

    let id = service
        .queue()
        .enqueue(
            &ana,
            QueueDraft::new("Ana's", vec![SocialPlatform::X], Utc::now() + Duration::hours(1)),
        )
        .await
        .unwrap();

    assert!(service.queue().list(&bo).await.unwrap().is_empty());
    assert!(service.queue().get(&bo, &id).await.unwrap().is_none());
    assert!(!service.queue().remove(&bo, &id).await.unwrap());
    assert_eq!(service.queue().list(&ana).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_worker_lifecycle() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir).await;
    let session = Session::new("ana");
    let queue = service.queue();

    let now = Utc::now();
    let id = queue
        .enqueue_at(
            &session,
            QueueDraft::new("Due soon", vec![SocialPlatform::Linkedin], now + Duration::minutes(5)),
            now,
        )
        .await
        .unwrap();

    assert!(queue.due(now).await.unwrap().is_empty());
    let due = queue.due(now + Duration::minutes(10)).await.unwrap();
    assert_eq!(due.len(), 1);

    queue.transition_status(&id, QueueStatus::Processing).await.unwrap();
    queue.transition_status(&id, QueueStatus::Completed).await.unwrap();

    let err = queue
        .transition_status(&id, QueueStatus::Scheduled)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid status transition"));

    let stats = queue.stats(&session).await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total(), 1);
    assert_eq!(queue.list(&session).await.unwrap()[0].status, QueueStatus::Completed);
}

#[tokio::test]
async fn test_reel_submission_with_video() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir).await;
    let session = Session::new("ana");
    let mut events = service.subscribe();

    let composer = service.composer(Arc::new(MockPublisher::success())).unwrap();
    composer.edit(|form| {
        form.content = "Behind the scenes".to_string();
        form.platforms = vec![SocialPlatform::Instagram];
        form.post_type = PostType::Reel;
        form.delivery = Delivery::Schedule(Utc::now() + Duration::days(2));
    });

    let validation = composer.attach_media(mp4(2048)).await.unwrap();
    assert!(validation.is_valid);
    assert!(validation.messages().iter().any(|m| m.contains("9:16")));

    let outcome = composer.submit(&session).await.unwrap();
    assert_eq!(composer.state(), FlowState::Idle);

    let post = service.queue().get(&session, &outcome.id).await.unwrap().unwrap();
    assert_eq!(post.post_type, PostType::Reel);
    assert_eq!(post.media_type, Some(MediaType::Video));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(Event::ValidationStarted { .. })));
    assert_eq!(
        seen.last(),
        Some(&Event::SubmissionCompleted { id: outcome.id.clone() })
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_settings_and_generation_through_config() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.generation.providers = vec![
        ProviderConfig {
            name: "limited".to_string(),
            command: vec!["sh".into(), "-c".into(), "cat >/dev/null; echo 'quota' >&2; exit 75".into()],
        },
        ProviderConfig {
            name: "echo".to_string(),
            command: vec!["sh".into(), "-c".into(), "tr a-z A-Z".into()],
        },
    ];
    let service = SparkService::from_config(config).await.unwrap();
    let session = Session::new("ana");

    let err = service.generation().improve(&session, "hello").await.unwrap_err();
    assert!(matches!(err, SparkError::Validation(_)));

    service
        .settings()
        .save_settings(
            &session,
            UserSettings {
                ai_prompt: Some("shout".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let improved = service.generation().improve(&session, "hello").await.unwrap();
    assert_eq!(improved.provider, "echo");
    assert_eq!(improved.content, "SHOUT\n\nHELLO");
}
