//! Deckbridge - PowerPoint Translation Agent
//!
//! Entry point for the command line: one-shot and batch translation, an
//! interactive chat session, and cache/config maintenance.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deckbridge::agent::{ChatSession, LlmPlanner, SessionOptions, ToolRegistry, UploadAndTranslate};
use deckbridge::cli::{Args, CacheAction, Commands};
use deckbridge::config::Config;
use deckbridge::error::DeckError;
use deckbridge::language::Language;
use deckbridge::llm::{check_availability, LlmFactory};
use deckbridge::notify::{ChannelNotifier, ConsoleNotifier, Notification, Notifier};
use deckbridge::pptx::LegacyConverter;
use deckbridge::translate::{clear_translation_cache, format_duration, list_translation_cache, TranslatorFactory};
use deckbridge::upload::{ChannelUploadSource, UploadCoordinator, UploadEvent, UploadSender, UploadedFile};
use deckbridge::workflow::DocumentWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Translate { input, from, to, output_dir } => {
            info!("Translating presentation: {}", input.display());
            if let Some(dir) = output_dir {
                config.output.directory = dir;
            }

            let translator = TranslatorFactory::create(&config)?;
            let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new(Language::English));
            let workflow = DocumentWorkflow::from_config(&config, translator, notifier);
            workflow.translate_copy(&input, from, to).await?;
        }
        Commands::Batch { input_dir, from, to, output_dir } => {
            info!("Translating directory: {}", input_dir.display());
            if let Some(dir) = output_dir {
                config.output.directory = dir;
            }

            let translator = TranslatorFactory::create(&config)?;
            let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier::new(Language::English));
            let workflow = DocumentWorkflow::from_config(&config, translator, notifier);
            let outputs = workflow.translate_directory(&input_dir, from, to).await?;
            println!("Translated {} presentation(s) into {}", outputs.len(), workflow.output_dir().display());
        }
        Commands::Chat => {
            run_chat(&config).await?;
        }
        Commands::Languages => {
            println!("\nSupported Languages:");
            println!("{:<8} {:<22} {}", "Code", "Name", "Also accepted");
            println!("{}", "-".repeat(80));
            for language in Language::ALL {
                println!(
                    "{:<8} {:<22} {}",
                    language.code(),
                    language.english_name(),
                    language.aliases().join(", ")
                );
            }
        }
        Commands::Cache { action } => {
            let cache_dir = &config.cache.directory;
            match action {
                CacheAction::List => {
                    let cached_items = list_translation_cache(cache_dir).await?;

                    if cached_items.is_empty() {
                        println!("No cached translations found.");
                    } else {
                        println!("\nCached Translations:");
                        println!("{:<15} {:<12} {:<15} {:<50}", "Model", "Languages", "Cached", "Source Text");
                        println!("{}", "-".repeat(95));

                        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
                        for item in cached_items {
                            let source_preview = if item.source_text.chars().count() > 47 {
                                format!("{}...", item.source_text.chars().take(47).collect::<String>())
                            } else {
                                item.source_text.clone()
                            };

                            println!(
                                "{:<15} {:<12} {:<15} {:<50}",
                                item.model,
                                format!("{}>{}", item.source_language, item.target_language),
                                format_duration(now.saturating_sub(item.cached_at)),
                                source_preview.replace('\n', " ")
                            );
                        }
                    }
                }
                CacheAction::Clear => {
                    let deleted_count = clear_translation_cache(cache_dir).await?;
                    println!("Cleared {} cached translations", deleted_count);
                }
            }
        }
        Commands::Check => {
            let mut healthy = true;
            for (role, llm) in [("translate", &config.translate), ("agent", &config.agent)] {
                match check_availability(llm).await {
                    Ok(()) => println!("{:<10} {} ({}) ... ok", role, llm.model, llm.endpoint),
                    Err(e) => {
                        healthy = false;
                        println!("{:<10} {} ({}) ... {}", role, llm.model, llm.endpoint, e);
                    }
                }
            }
            // Only legacy .ppt input needs the converter
            match LegacyConverter::new(config.converter.clone()).check_availability().await {
                Ok(()) => println!("{:<10} {} ... ok", "converter", config.converter.binary_path),
                Err(e) => println!("{:<10} {} ... {} (.ppt input unavailable)", "converter", config.converter.binary_path, e),
            }
            if !healthy {
                return Err(DeckError::Llm("completion service unavailable".to_string()).into());
            }
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                return Err(DeckError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    output.display()
                ))
                .into());
            }
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

/// Interactive session on stdin.
///
/// Free text goes to the agent, `/upload <path>` delivers a file to the
/// pending upload, `/new` starts over and `/quit` exits.
async fn run_chat(config: &Config) -> Result<()> {
    let (notification_tx, mut notification_rx) = mpsc::unbounded_channel::<Notification>();
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(notification_tx));

    let (language_tx, language_rx) = watch::channel(Language::English);
    tokio::spawn(async move {
        while let Some(notification) = notification_rx.recv().await {
            let language = *language_rx.borrow();
            println!("[deckbridge] {}", notification.render(language));
        }
    });

    let (upload_tx, upload_source) = ChannelUploadSource::channel(notifier.clone());
    let uploads = UploadCoordinator::new(Arc::new(upload_source), notifier.clone(), config.upload.clone());
    let workflow = DocumentWorkflow::from_config(config, TranslatorFactory::create(config)?, notifier);
    let translation_tool = Arc::new(UploadAndTranslate::new(uploads, workflow));

    let planner = Arc::new(LlmPlanner::new(LlmFactory::create(&config.agent)?, config.agent.temperature));
    let mut session = ChatSession::new(
        planner,
        translation_tool,
        Arc::new(ToolRegistry::default()),
        SessionOptions::from_config(config),
    );
    info!("Chat session {} started", session.id());
    println!("Type a message, /upload <path>, /new or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(command, rest)| (command, rest.trim())) {
            ("/quit", _) => break,
            ("/new", _) => {
                let reply = session.reset();
                println!("{}", reply.text);
            }
            ("/upload", path) => send_upload(&upload_tx, Path::new(path)).await,
            _ => {
                let reply = session.handle_message(line).await?;
                language_tx.send_replace(reply.language);
                println!("{}", reply.text);
            }
        }
    }

    info!("Chat session {} ended in state {}", session.id(), session.state());
    Ok(())
}

async fn send_upload(upload_tx: &UploadSender, path: &Path) {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => {
            println!("Usage: /upload <path>");
            return;
        }
    };

    let event = match tokio::fs::read(path).await {
        Ok(content) => UploadEvent::Finished(UploadedFile { name, content }),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            UploadEvent::Failed(e.to_string())
        }
    };
    if upload_tx.send(event).is_err() {
        warn!("Upload channel closed");
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".deckbridge").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "deckbridge.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("deckbridge.log").display());

    Ok(())
}
