//! spark-queue - Manage scheduled posts
//!
//! Unix-style tool for inspecting and pruning the post queue.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use libdailyspark::auth::resolve_session;
use libdailyspark::service::queue::QueueStore;
use libdailyspark::service::SparkService;
use libdailyspark::{logging, Config, QueueStatus, QueuedPost, Result, Session, SparkError};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "spark-queue")]
#[command(version)]
#[command(about = "Manage scheduled posts")]
#[command(long_about = "\
spark-queue - Manage scheduled posts

DESCRIPTION:
    spark-queue lists, inspects, confirms and removes the posts waiting in
    your DailySpark queue. Posts are shown earliest schedule first.

COMMANDS:
    list      List queued posts
    show      Show one post
    confirm   Move a pending post to scheduled
    remove    Remove one or more posts
    stats     Count posts per status

USAGE EXAMPLES:
    # List the queue
    spark-queue list

    # Only pending posts, as JSON
    spark-queue list --status pending --format json

    # Confirm a post queued with --await-confirmation
    spark-queue confirm <POST_ID>

    # Remove several posts at once
    spark-queue remove <POST_ID> <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/dailyspark/config.toml
    Database location: ~/.local/share/dailyspark/dailyspark.db

    Override with environment variables:
        DAILYSPARK_CONFIG    - Path to config file
        DAILYSPARK_DB_PATH   - Path to database file
        DAILYSPARK_TOKEN     - Bearer token

EXIT CODES:
    0 - Success
    1 - Database or configuration error
    2 - Unauthorized
    3 - Invalid input (unknown post ID, bad status, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bearer token identifying the user
    #[arg(long, global = true, env = "DAILYSPARK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List queued posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only posts in this status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one queued post
    Show {
        post_id: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Move a pending post to scheduled
    Confirm { post_id: String },

    /// Remove queued posts in any status
    Remove {
        #[arg(required = true)]
        post_ids: Vec<String>,
    },

    /// Show queue statistics
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_with_verbosity(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let session = resolve_session(&config.auth, cli.token.as_deref()).await?;
    let service = SparkService::from_config(config).await?;
    let queue = service.queue();

    match cli.command {
        Commands::List { format, status } => cmd_list(queue, &session, &format, status.as_deref()).await,
        Commands::Show { post_id, format } => cmd_show(queue, &session, &post_id, &format).await,
        Commands::Confirm { post_id } => cmd_confirm(queue, &session, &post_id).await,
        Commands::Remove { post_ids } => cmd_remove(queue, &session, &post_ids).await,
        Commands::Stats { format } => cmd_stats(queue, &session, &format).await,
    }
}

fn check_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(SparkError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| SparkError::InvalidInput(format!("Failed to encode output: {}", e)))
}

/// List queued posts
async fn cmd_list(
    queue: &QueueStore,
    session: &Session,
    format: &str,
    status: Option<&str>,
) -> Result<()> {
    check_format(format)?;
    let status = status.map(|s| s.parse::<QueueStatus>()).transpose()?;

    let mut posts = queue.list(session).await?;
    if let Some(status) = status {
        posts.retain(|p| p.status == status);
    }
    debug!("Listing {} post(s)", posts.len());

    if format == "json" {
        println!("{}", to_json(&posts)?);
    } else {
        let now = Utc::now();
        for post in &posts {
            println!("{}", format_line(post, now));
        }
    }

    Ok(())
}

fn format_line(post: &QueuedPost, now: DateTime<Utc>) -> String {
    let platforms: Vec<_> = post.platforms.iter().map(|p| p.as_str()).collect();
    format!(
        "{} | {} | {} | {} | {}",
        post.id,
        post.status,
        platforms.join(","),
        truncate_content(&post.content, 50),
        format_time_until(now, post.scheduled_at)
    )
}

/// Truncate content to `max_chars` characters with an ellipsis
fn truncate_content(content: &str, max_chars: usize) -> String {
    let single_line = content.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let head: String = single_line.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: DateTime<Utc>, scheduled_at: DateTime<Utc>) -> String {
    let diff = (scheduled_at - now).num_seconds();

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

async fn find(queue: &QueueStore, session: &Session, post_id: &str) -> Result<QueuedPost> {
    queue
        .get(session, post_id)
        .await?
        .ok_or_else(|| SparkError::InvalidInput(format!("Post not found: {}", post_id)))
}

async fn cmd_show(queue: &QueueStore, session: &Session, post_id: &str, format: &str) -> Result<()> {
    check_format(format)?;
    let post = find(queue, session, post_id).await?;

    if format == "json" {
        println!("{}", to_json(&post)?);
        return Ok(());
    }

    let platforms: Vec<_> = post.platforms.iter().map(|p| p.display_name()).collect();
    println!("ID:        {}", post.id);
    println!("Status:    {}", post.status);
    println!("Type:      {}", post.post_type);
    println!("Platforms: {}", platforms.join(", "));
    println!("Scheduled: {}", post.scheduled_at.to_rfc3339());
    println!("Created:   {}", post.created_at.to_rfc3339());
    if let (Some(url), Some(media_type)) = (&post.media_url, post.media_type) {
        println!("Media:     {} ({})", url, media_type);
    }
    println!();
    println!("{}", post.content);

    Ok(())
}

async fn cmd_confirm(queue: &QueueStore, session: &Session, post_id: &str) -> Result<()> {
    let post = find(queue, session, post_id).await?;
    if post.status != QueueStatus::Pending {
        return Err(SparkError::InvalidInput(format!(
            "Post {} is {}, only pending posts can be confirmed",
            post.id, post.status
        )));
    }

    queue.transition_status(&post.id, QueueStatus::Scheduled).await?;
    println!("confirmed:{}", post.id);
    Ok(())
}

/// Remove posts concurrently. Unknown ids are reported but do not fail.
async fn cmd_remove(queue: &QueueStore, session: &Session, post_ids: &[String]) -> Result<()> {
    let results = join_all(post_ids.iter().map(|id| queue.remove(session, id))).await;
    let report = RemovalReport::collect(post_ids, results);

    for id in &report.removed {
        println!("removed:{}", id);
    }
    for id in &report.missing {
        eprintln!("Not found: {}", id);
    }
    for (id, e) in &report.failed {
        eprintln!("Failed: {}: {}", id, e.user_message());
    }

    match report.failed.into_iter().next() {
        Some((_, e)) => Err(e),
        None => Ok(()),
    }
}

/// Outcome of a batch removal, in the order the ids were given
#[derive(Default)]
struct RemovalReport {
    removed: Vec<String>,
    missing: Vec<String>,
    failed: Vec<(String, SparkError)>,
}

impl RemovalReport {
    fn collect(post_ids: &[String], results: Vec<Result<bool>>) -> Self {
        let mut report = Self::default();
        for (id, result) in post_ids.iter().zip(results) {
            match result {
                Ok(true) => report.removed.push(id.clone()),
                Ok(false) => report.missing.push(id.clone()),
                Err(e) => report.failed.push((id.clone(), e)),
            }
        }
        report
    }
}

async fn cmd_stats(queue: &QueueStore, session: &Session, format: &str) -> Result<()> {
    check_format(format)?;
    let stats = queue.stats(session).await?;

    if format == "json" {
        println!("{}", to_json(&stats)?);
        return Ok(());
    }

    println!("Pending:    {}", stats.pending);
    println!("Scheduled:  {}", stats.scheduled);
    println!("Processing: {}", stats.processing);
    println!("Completed:  {}", stats.completed);
    println!("Failed:     {}", stats.failed);
    println!("Total:      {}", stats.total());
    match stats.next_scheduled_at {
        Some(next) => println!("Next:       {}", next.to_rfc3339()),
        None => println!("Next:       none"),
    }
    Ok(())
}
