// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hawk_translation::app_config::{self, Config};
use hawk_translation::database::{DatabaseConnection, Repository};
use hawk_translation::errors::TranslationError;
use hawk_translation::language_utils::{self, LANGUAGES};
use hawk_translation::pipeline::job::{ContentType, MAX_CONTENT_CHARS, Tier, TranslationJob};
use hawk_translation::pipeline::{Dispatcher, Pipeline};
use hawk_translation::providers::anthropic::{AnthropicScorer, AnthropicTranslator};
use hawk_translation::providers::google::GoogleTranslate;
use hawk_translation::translation::{QualityScorer, Translator};
use hawk_translation::webhook::WebhookDeliverer;
use hawk_translation::webhook::worker::WebhookWorker;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for Tier to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTier {
    Instant,
    Reviewed,
    Certified,
}

impl From<CliTier> for Tier {
    fn from(cli_tier: CliTier) -> Self {
        match cli_tier {
            CliTier::Instant => Tier::Instant,
            CliTier::Reviewed => Tier::Reviewed,
            CliTier::Certified => Tier::Certified,
        }
    }
}

/// CLI Wrapper for ContentType to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliContentType {
    Article,
    Broadcast,
    Social,
}

impl From<CliContentType> for ContentType {
    fn from(cli_type: CliContentType) -> Self {
        match cli_type {
            CliContentType::Article => ContentType::Article,
            CliContentType::Broadcast => ContentType::Broadcast,
            CliContentType::Social => ContentType::Social,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll for queued jobs and due webhooks until interrupted
    Worker,

    /// Run the pipeline for one job, with retries, and wait for the outcome
    Run {
        /// Job identifier
        job_id: String,
    },

    /// Submit a new translation job
    Enqueue {
        /// Source language code (ISO 639-1)
        #[arg(short, long = "source", default_value = "en")]
        source_language: String,

        /// Target language code
        #[arg(short, long = "target")]
        target_language: String,

        /// Service tier
        #[arg(long, value_enum, default_value = "instant")]
        tier: CliTier,

        /// Kind of content
        #[arg(long, value_enum, default_value = "article")]
        content_type: CliContentType,

        /// HTML file to translate, `-` for stdin
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// URL notified when the job completes or fails
        #[arg(long)]
        callback_url: Option<String>,

        /// Glossary applied before translation
        #[arg(long)]
        glossary_id: Option<String>,

        /// Submitting organisation
        #[arg(long)]
        org_id: Option<String>,
    },

    /// Approve a job awaiting review with the reviewer's edited HTML
    Approve {
        /// Job identifier
        job_id: String,

        /// Edited HTML file, `-` for stdin
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Attempt webhook deliveries that are due now
    DeliverWebhooks {
        /// Maximum deliveries to attempt
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// List supported target languages
    Languages,

    /// Show database statistics
    Stats,

    /// Generate shell completions for hawk
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Hawk - translation job pipeline
///
/// Translates newsroom HTML through machine translation, quality scoring
/// and optional human review.
#[derive(Parser, Debug)]
#[command(name = "hawk")]
#[command(version)]
#[command(about = "Translation job pipeline engine")]
#[command(long_about = "Hawk runs translation jobs: segments HTML, applies glossaries, translates in batches,
scores the result and hands reviewed tiers to human reviewers.

EXAMPLES:
    hawk enqueue -t es story.html                       # Queue an instant-tier job
    hawk enqueue -t ht --tier reviewed story.html       # Queue a job for human review
    hawk run 6f1c...                                    # Run one job now
    hawk worker                                         # Process jobs until Ctrl-C
    hawk approve 6f1c... edited.html                    # Finish a reviewed job
    hawk completions bash > hawk.bash                   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. ANTHROPIC_API_KEY, GOOGLE_TRANSLATE_API_KEY and
    HAWK_DATABASE_PATH override the file.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", global = true, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize with the most verbose filter; the effective level is set
    // through log::set_max_level once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "hawk", &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Languages = cli.command {
        print_languages();
        return Ok(());
    }

    let config = load_config(&cli)?;

    let result = run_command(cli.command, config).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config_path)?;
    config.apply_env_overrides();
    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(LevelFilter::from(&config.log_level));
    Ok(config)
}

async fn run_command(command: Commands, config: Config) -> Result<()> {
    let repo = open_repository(&config)?;

    match command {
        Commands::Worker => run_worker(&config, repo).await,
        Commands::Run { job_id } => {
            let dispatcher = Dispatcher::new(Arc::new(build_pipeline(&config, &repo)), 1);
            match dispatcher.run_job(&job_id).await {
                Ok(status) => {
                    println!("{} {}", job_id, status);
                    Ok(())
                }
                Err(failure) => Err(anyhow!(failure)),
            }
        }
        Commands::Enqueue {
            source_language,
            target_language,
            tier,
            content_type,
            file,
            callback_url,
            glossary_id,
            org_id,
        } => {
            let content = read_input(&file)?;
            let job = build_job(
                &source_language,
                &target_language,
                tier.into(),
                content_type.into(),
                content,
            )?;
            let job = apply_options(job, callback_url, glossary_id, org_id);

            if let Some(glossary_id) = &job.glossary_id {
                if repo.get_glossary(glossary_id).await?.is_none() {
                    warn!("Glossary {} does not exist; the job will run without it", glossary_id);
                }
            }

            repo.create_job(&job).await?;
            info!("Queued job {} ({} -> {}, {})", job.id, job.source_language, job.target_language, job.tier);
            println!("{}", job.id);
            Ok(())
        }
        Commands::Approve { job_id, file } => {
            let edited = read_input(&file)?;
            let pipeline = build_pipeline(&config, &repo);
            let status = pipeline.approve_review(&job_id, edited).await?;
            println!("{} {}", job_id, status);
            Ok(())
        }
        Commands::DeliverWebhooks { limit } => {
            let worker = WebhookWorker::new(repo, WebhookDeliverer::new(&config.webhook));
            let attempted = worker.process_due(limit).await?;
            info!("Attempted {} webhook deliveries", attempted);
            Ok(())
        }
        Commands::Stats => {
            println!("{}", repo.connection().stats().await?);
            Ok(())
        }
        Commands::Languages | Commands::Completions { .. } => Ok(()),
    }
}

fn open_repository(config: &Config) -> Result<Repository> {
    let db = match &config.database_path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    Ok(Repository::new(db))
}

fn build_pipeline(config: &Config, repo: &Repository) -> Pipeline {
    let translation = &config.translation;
    let translator = Translator::new(
        Arc::new(AnthropicTranslator::new(&translation.anthropic, translation.timeout_secs)),
        Arc::new(GoogleTranslate::new(&translation.google, translation.timeout_secs)),
        translation,
    );
    let scorer = if config.scoring.enabled {
        QualityScorer::new(
            Arc::new(AnthropicScorer::new(&translation.anthropic, &config.scoring)),
            &config.scoring,
        )
    } else {
        QualityScorer::disabled()
    };

    let store = Arc::new(repo.clone());
    Pipeline::new(store.clone(), store.clone(), store, translator, scorer)
        .with_retry_policy(config.pipeline.retry_policy())
}

/// Validate submission input and build a queued job
fn build_job(
    source_language: &str,
    target_language: &str,
    tier: Tier,
    content_type: ContentType,
    content: String,
) -> Result<TranslationJob> {
    language_utils::validate_language_code(source_language)?;
    let Some(target) = language_utils::find_language(target_language) else {
        return Err(TranslationError::UnsupportedLanguage {
            code: target_language.to_string(),
            supported: language_utils::supported_codes(),
        }
        .into());
    };

    if content.trim().is_empty() {
        return Err(anyhow!("Content is empty"));
    }
    let chars = content.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(anyhow!(
            "Content is {} characters, the limit is {}",
            chars,
            MAX_CONTENT_CHARS
        ));
    }

    Ok(TranslationJob::new(source_language.trim().to_lowercase(), target.code, tier, content)
        .with_content_type(content_type))
}

fn apply_options(
    mut job: TranslationJob,
    callback_url: Option<String>,
    glossary_id: Option<String>,
    org_id: Option<String>,
) -> TranslationJob {
    if let Some(url) = callback_url {
        if !WebhookDeliverer::is_deliverable(&url) {
            warn!("Callback URL '{}' is not http(s); its webhooks will be skipped", url);
        }
        job = job.with_callback_url(url);
    }
    if let Some(glossary_id) = glossary_id {
        job = job.with_glossary_id(glossary_id);
    }
    if let Some(org_id) = org_id {
        job = job.with_org_id(org_id);
    }
    job
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_languages() {
    for language in LANGUAGES {
        println!(
            "{:<3} {:<22} {:<16} {:<9} {}",
            language.code,
            language.name,
            language.native,
            language.route.to_string(),
            language.availability()
        );
    }
}

async fn run_worker(config: &Config, repo: Repository) -> Result<()> {
    let dispatcher = Dispatcher::new(Arc::new(build_pipeline(config, &repo)), config.worker.concurrency);
    let webhooks = WebhookWorker::new(repo, WebhookDeliverer::new(&config.webhook));
    let interval = Duration::from_secs(config.worker.poll_interval_secs.max(1));
    let limit = config.worker.batch_limit;

    info!(
        "Worker started: {} concurrent jobs, polling every {}s",
        dispatcher.concurrency(),
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down, {} jobs still in flight", dispatcher.in_flight());
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = dispatcher.poll_once(limit).await {
                    error!("Failed to poll queued jobs: {:#}", e);
                }
                if let Err(e) = webhooks.process_due(limit).await {
                    error!("Failed to process webhooks: {:#}", e);
                }
            }
        }
    }
}
