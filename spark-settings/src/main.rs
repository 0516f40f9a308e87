//! spark-settings - View and edit your DailySpark profile and settings

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use libdailyspark::auth::resolve_session;
use libdailyspark::service::settings::ProfileUpdate;
use libdailyspark::service::SparkService;
use libdailyspark::types::{NotificationSettings, Theme, UserSettings};
use libdailyspark::{logging, Config, SparkError};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "spark-settings")]
#[command(version)]
#[command(about = "View and edit your DailySpark profile and settings")]
#[command(long_about = "\
spark-settings - View and edit your DailySpark profile and settings

USAGE EXAMPLES:
    # Show everything
    spark-settings show

    # Custom instructions used by spark-post --improve
    spark-settings set --ai-prompt \"Friendly, short sentences, one emoji at most\"
    spark-settings set --ai-prompt-file instructions.txt

    # Appearance and notifications
    spark-settings set --theme light --daily-summary true

    # Profile
    spark-settings profile --display-name \"Ana\" --photo-url https://example.com/ana.jpg

EXIT CODES:
    0 - Success
    1 - Database or configuration error
    2 - Unauthorized
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bearer token identifying the user
    #[arg(long, global = true, env = "DAILYSPARK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show profile and settings
    Show {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Change settings; only the given fields are touched
    Set {
        /// Custom instructions for content improvement (max 2000 chars)
        #[arg(long, conflicts_with = "ai_prompt_file")]
        ai_prompt: Option<String>,

        /// Read the custom instructions from a file
        #[arg(long, value_name = "FILE")]
        ai_prompt_file: Option<PathBuf>,

        /// dark or light
        #[arg(long)]
        theme: Option<String>,

        /// Notify when a post is published
        #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
        notify_published: Option<bool>,

        /// Notify when a post fails
        #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
        notify_failed: Option<bool>,

        /// Send a daily summary
        #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
        daily_summary: Option<bool>,
    },

    /// Replace the profile; omitted fields are cleared
    Profile {
        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        photo_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_with_verbosity(cli.verbose);

    if let Err(e) = run(cli).await {
        let code = e
            .downcast_ref::<SparkError>()
            .map(SparkError::exit_code)
            .unwrap_or(1);
        match e.downcast_ref::<SparkError>() {
            Some(spark) if e.chain().count() == 1 => eprintln!("Error: {}", spark.user_message()),
            _ => eprintln!("Error: {:#}", e),
        }
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let session = resolve_session(&config.auth, cli.token.as_deref()).await?;
    let service = SparkService::from_config(config).await?;
    let settings = service.settings();

    match cli.command {
        Commands::Show { format } => {
            let profile = settings.profile(&session).await?;
            let current = settings.settings(&session).await?;

            match format.as_str() {
                "json" => {
                    let output = serde_json::json!({
                        "uid": session.uid(),
                        "profile": profile,
                        "settings": current,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                "text" => {
                    let notifications = current.notifications.unwrap_or_default();
                    println!("User:           {}", session.uid());
                    println!("Display name:   {}", profile.display_name.as_deref().unwrap_or("-"));
                    println!("Photo URL:      {}", profile.photo_url.as_deref().unwrap_or("-"));
                    println!("Theme:          {}", current.theme.unwrap_or_default());
                    println!("Post published: {}", on_off(notifications.post_published));
                    println!("Post failed:    {}", on_off(notifications.post_failed));
                    println!("Daily summary:  {}", on_off(notifications.daily_summary));
                    match current.ai_prompt.as_deref() {
                        Some(prompt) => println!("AI prompt:\n{}", prompt),
                        None => println!("AI prompt:      -"),
                    }
                }
                other => {
                    return Err(SparkError::InvalidInput(format!(
                        "Invalid format '{}'. Must be 'text' or 'json'",
                        other
                    ))
                    .into())
                }
            }
        }

        Commands::Set {
            ai_prompt,
            ai_prompt_file,
            theme,
            notify_published,
            notify_failed,
            daily_summary,
        } => {
            let ai_prompt = match ai_prompt_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?
                        .trim()
                        .to_string(),
                ),
                None => ai_prompt,
            };
            let theme = theme.map(|t| t.parse::<Theme>()).transpose()?;

            let notifications = if notify_published.is_some()
                || notify_failed.is_some()
                || daily_summary.is_some()
            {
                let mut current = settings
                    .settings(&session)
                    .await?
                    .notifications
                    .unwrap_or_default();
                apply_notifications(&mut current, notify_published, notify_failed, daily_summary);
                Some(current)
            } else {
                None
            };

            let saved = settings
                .save_settings(
                    &session,
                    UserSettings {
                        ai_prompt,
                        notifications,
                        theme,
                    },
                )
                .await?;
            info!("Settings saved for {}", session.uid());
            println!("{}", serde_json::to_string(&saved)?);
        }

        Commands::Profile {
            display_name,
            photo_url,
        } => {
            let profile = settings
                .update_profile(
                    &session,
                    ProfileUpdate {
                        display_name,
                        photo_url,
                    },
                )
                .await?;
            println!("{}", serde_json::to_string(&profile)?);
        }
    }

    Ok(())
}

fn apply_notifications(
    target: &mut NotificationSettings,
    post_published: Option<bool>,
    post_failed: Option<bool>,
    daily_summary: Option<bool>,
) {
    if let Some(v) = post_published {
        target.post_published = v;
    }
    if let Some(v) = post_failed {
        target.post_failed = v;
    }
    if let Some(v) = daily_summary {
        target.daily_summary = v;
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
