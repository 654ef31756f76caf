use anyhow::Result;
use clap::Parser;
use comedy_shorts::poller::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use comedy_shorts::{
    Audience, Config, GenerationRequest, GeneratorLogHook, Pipeline, PollPolicy, Session, StoryLength, Theme, Tone,
    run_generation, set_log_hook,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "comedy-shorts")]
#[command(about = "Write a short comedy story with Gemini and render it as a D-ID talking-avatar video")]
#[command(version)]
struct Cli {
    /// What the story is about
    topic: String,

    /// Story theme: fantasy, science fiction, fairy tale, slice of life
    #[arg(long, default_value_t)]
    theme: Theme,

    /// Story tone: sarcastic, hilarious, silly, dark comedy
    #[arg(long, default_value_t)]
    tone: Tone,

    /// Audience: kids, teens, adults
    #[arg(long, default_value_t)]
    audience: Audience,

    /// Narration length in seconds (30, 60, 90, 120)
    #[arg(long, default_value = "30")]
    duration: StoryLength,

    /// Maximum number of video status checks
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..))]
    poll_attempts: u32,

    /// Delay between video status checks, in milliseconds
    #[arg(long, default_value_t = DEFAULT_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,

    /// Stop after writing the story
    #[arg(long)]
    script_only: bool,

    /// Print the final state as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let poll = PollPolicy::new(cli.poll_attempts, Duration::from_millis(cli.poll_interval_ms));
    let cfg = Config::from_env()?.with_poll_policy(poll);
    let pipeline = Pipeline::from_config(&cfg)?;

    let request = GenerationRequest::new(cli.topic)
        .with_theme(cli.theme)
        .with_tone(cli.tone)
        .with_audience(cli.audience)
        .with_length(cli.duration);

    let log_lines = Arc::new(Mutex::new(Vec::<String>::new()));
    if cli.json {
        let sink = Arc::clone(&log_lines);
        let hook: GeneratorLogHook = Arc::new(Mutex::new(move |line: &str| {
            sink.lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(line.to_string());
        }));
        set_log_hook(Some(hook));
    }

    if cli.script_only {
        let code = match pipeline.script_only(&request).await {
            Ok(script) => {
                if cli.json {
                    println!("{}", serde_json::json!({ "script": script }));
                } else {
                    println!("{}", script.text());
                }
                0
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                1
            }
        };
        std::process::exit(code);
    }

    let session = Arc::new(Session::new());
    let watcher = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("[WARN] Interrupted; cancelling generation...");
                session.cancel();
            }
        })
    };

    let result = run_generation(&pipeline, &session, &request).await;
    watcher.abort();
    set_log_hook(None);

    let snapshot = session.snapshot();
    if cli.json {
        let lines = log_lines.lock().unwrap_or_else(|e| e.into_inner()).clone();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "state": snapshot,
                "log": lines,
            }))?
        );
    } else {
        match &result {
            Ok(outcome) => {
                println!("{}\n", outcome.script.text());
                println!("Video generated successfully!");
                println!("{}", outcome.video_url);
            }
            Err(e) => {
                if snapshot.generated_script != comedy_shorts::session::SCRIPT_PLACEHOLDER {
                    println!("{}\n", snapshot.generated_script);
                }
                eprintln!("{}", e.user_message());
            }
        }
    }

    std::process::exit(if result.is_ok() { 0 } else { 1 });
}
