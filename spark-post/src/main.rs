//! spark-post - Compose a post and schedule it or send it now

use chrono::Utc;
use clap::Parser;
use libdailyspark::auth::resolve_session;
use libdailyspark::media::MediaFile;
use libdailyspark::publisher::{JsonLinesPublisher, Publisher};
use libdailyspark::scheduling::parse_schedule;
use libdailyspark::service::submission::Delivery;
use libdailyspark::service::SparkService;
use libdailyspark::types::parse_platforms;
use libdailyspark::{logging, Config, OperationResult, PostType, Result, SparkError};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "spark-post")]
#[command(version)]
#[command(about = "Compose a post and schedule it or send it now")]
#[command(long_about = "\
spark-post - Compose a post and schedule it or send it now

DESCRIPTION:
    Takes post content from the argument or stdin, optionally rewrites it
    with your AI instructions, attaches an image or video, and either adds
    it to your queue or hands it to the outbox right away.

USAGE EXAMPLES:
    # Schedule for tomorrow morning on the default platforms
    spark-post \"Launch day!\" --schedule \"tomorrow 9am\"

    # Schedule in two hours on LinkedIn only, waiting for confirmation
    echo \"Hiring!\" | spark-post -p linkedin -s 2h --await-confirmation

    # Reel with a video, sent now to an outbox file
    spark-post \"Behind the scenes\" -p instagram --reel --media clip.mp4 --outbox out.jsonl

    # Rewrite with your stored instructions first
    spark-post \"we shipped v2\" --improve --schedule \"next monday 10am\"

SCHEDULE FORMATS:
    2025-11-20T15:00:00Z      RFC 3339
    2025-11-20 15:00          date and time, UTC
    30m, 2h, 1d 6h            relative to now
    tomorrow 9am, next friday natural language

OUTPUT:
    Scheduled posts print `scheduled:<id>`. Posts sent with --outbox print
    `sent:<id>`; without it the outbox line itself is written to stdout.

EXIT CODES:
    0 - Success
    1 - Upstream, database or configuration failure
    2 - Unauthorized
    3 - Invalid input or validation failure
")]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target platform(s), comma-separated (defaults from config)
    #[arg(short, long, value_delimiter = ',')]
    platform: Vec<String>,

    /// Image or video to attach
    #[arg(short, long, value_name = "FILE")]
    media: Option<PathBuf>,

    /// Publish as a reel (Facebook/Instagram, video only)
    #[arg(long)]
    reel: bool,

    /// When to publish; omit to send now
    #[arg(short, long, value_name = "WHEN")]
    schedule: Option<String>,

    /// Queue as pending until confirmed instead of scheduled
    #[arg(long, requires = "schedule")]
    await_confirmation: bool,

    /// Rewrite the content with your stored AI instructions before posting
    #[arg(long)]
    improve: bool,

    /// After --improve, generate an image for the suggested visual
    #[arg(long, requires = "improve")]
    suggest_image: bool,

    /// Append immediate posts to this JSON lines file instead of stdout
    #[arg(long, value_name = "FILE")]
    outbox: Option<PathBuf>,

    /// Bearer token identifying the user
    #[arg(long, env = "DAILYSPARK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_with_verbosity(cli.verbose);

    let json = cli.format == "json";
    if let Err(e) = run(cli).await {
        if json {
            if let Ok(line) = serde_json::to_string(&OperationResult::from(&e)) {
                println!("{}", line);
            }
        }
        eprintln!("Error: {}", e.user_message());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.format != "text" && cli.format != "json" {
        return Err(SparkError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let config = Config::load()?;
    let session = resolve_session(&config.auth, cli.token.as_deref()).await?;

    let mut content = read_content(cli.content.as_deref())?;

    // Parse the schedule before any slow work so typos fail fast
    let delivery = match cli.schedule.as_deref() {
        Some(when) => Delivery::Schedule(parse_schedule(when, Utc::now())?),
        None => Delivery::Now,
    };
    let platforms = parse_platforms(&cli.platform)?;

    let service = SparkService::from_config(config).await?;

    if cli.improve {
        let improvement = service.generation().improve(&session, &content).await?;
        eprintln!(
            "Improved with {} ({} -> {} chars)",
            improvement.provider,
            improvement.original_length,
            improvement.content.chars().count()
        );
        if let Some(visual) = &improvement.visual_suggestion {
            eprintln!("Visual suggestion: {}", visual);
            if cli.suggest_image {
                let image = service.generation().generate_image(visual).await?;
                eprintln!("Suggested image: {}", image.url);
            }
        }
        content = improvement.content;
    }

    let to_stdout = cli.outbox.is_none();
    let publisher: Arc<dyn Publisher> = match &cli.outbox {
        Some(path) => Arc::new(JsonLinesPublisher::append_to(path)?),
        None => Arc::new(JsonLinesPublisher::stdout()),
    };

    let composer = service.composer(publisher)?;
    composer.edit(|form| {
        form.content = content;
        if !platforms.is_empty() {
            form.platforms = platforms;
        }
        if cli.reel {
            form.post_type = PostType::Reel;
        }
        form.delivery = delivery;
        form.await_confirmation = cli.await_confirmation;
    });

    if let Some(path) = &cli.media {
        let file = MediaFile::open(path)?;
        let attached = composer.attach_media(file).await;
        for warning in &composer.form().warnings {
            eprintln!("{}", warning);
        }
        let validation = attached?;
        if validation.has_cautions() {
            eprintln!("Media uploaded with warnings");
        }
    }

    let outcome = composer.submit(&session).await?;
    debug!("Submission outcome: {:?}", outcome);

    match (outcome.delivery, cli.format.as_str()) {
        (Delivery::Now, _) if to_stdout => {}
        (delivery, "json") => {
            let scheduled_at = match delivery {
                Delivery::Schedule(at) => Some(at.to_rfc3339()),
                Delivery::Now => None,
            };
            let output = serde_json::json!({
                "success": true,
                "id": outcome.id,
                "message": outcome.message,
                "scheduled_at": scheduled_at,
            });
            println!("{}", output);
        }
        (Delivery::Schedule(_), _) => println!("scheduled:{}", outcome.id),
        (Delivery::Now, _) => println!("sent:{}", outcome.id),
    }

    Ok(())
}

fn read_content(arg: Option<&str>) -> Result<String> {
    let content = match arg {
        Some(content) => content.to_string(),
        None => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                return Err(SparkError::InvalidInput(
                    "No content provided. Pass it as an argument or pipe it on stdin".to_string(),
                ));
            }
            let mut buffer = String::new();
            stdin.read_to_string(&mut buffer).map_err(|e| {
                SparkError::InvalidInput(format!("Failed to read stdin: {}", e))
            })?;
            buffer
        }
    };

    // Blank content is left for the composer to reject with the other violations
    Ok(content.trim().to_string())
}
