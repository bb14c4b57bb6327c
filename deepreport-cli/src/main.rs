//! DeepReport CLI - Command-line interface for DeepReport
//!
//! Plans, researches and writes a structured report on a topic

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deepreport_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, LogFormat,
    LoggingConfig, ReportConfig, Section,
};
use deepreport_llm::SiumaiReportModel;
use deepreport_research::{ReportEngine, ReportOutput};
use deepreport_search::SearchProviderFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "deepreport")]
#[command(about = "Research a topic and write a structured report")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan, research and write a report
    Run {
        /// Report topic
        topic: String,

        /// Feedback on the report plan
        #[arg(short, long)]
        feedback: Option<String>,

        /// Review the plan interactively before research starts
        #[arg(long)]
        review: bool,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the report plan as JSON
    Plan {
        /// Report topic
        topic: String,

        /// Feedback on the report plan
        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Provider keys may live in a local .env file
    dotenvy::dotenv().ok();

    let mut logging_config = LoggingConfig::default();
    if cli.verbose {
        logging_config = logging_config.with_level("debug");
    }
    if cli.json_logs {
        logging_config = logging_config.with_format(LogFormat::Json);
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting DeepReport CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run {
            topic,
            feedback,
            review,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            handle_run(&topic, feedback, review, output, &config).await?;
        }
        Commands::Plan { topic, feedback } => {
            let config = load_config(cli.config.as_deref())?;
            handle_plan(&topic, feedback, &config).await?;
        }
        Commands::Config {
            show,
            init,
            validate,
        } => {
            handle_config(cli.config.as_deref(), show, init, validate)?;
        }
    }

    Ok(())
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|d| d.join("deepreport").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".deepreport").join("config.toml")),
        Some(PathBuf::from("deepreport.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Read the file configuration (if any) without env overrides or validation
fn read_config(config_path: Option<&Path>) -> Result<ReportConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from {:?}", path);
        return Ok(ReportConfig::from_file(path)?);
    }

    for path in default_config_paths() {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            return Ok(ReportConfig::from_file(&path)?);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(ReportConfig::default())
}

/// Resolve the configuration for a run: file, then environment overrides, then validation
fn load_config(config_path: Option<&Path>) -> Result<ReportConfig> {
    let mut config = read_config(config_path)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

async fn build_engine(config: &ReportConfig) -> Result<ReportEngine> {
    let model = SiumaiReportModel::from_config(config)
        .await
        .context("Failed to create language model clients")?;
    let search = SearchProviderFactory::create(&config.search)
        .context("Failed to create search provider")?;

    Ok(ReportEngine::new(config, Arc::new(model), search))
}

async fn handle_run(
    topic: &str,
    feedback: Option<String>,
    review: bool,
    output: Option<PathBuf>,
    config: &ReportConfig,
) -> Result<()> {
    log_operation_start!("run", topic = %topic);

    let engine = build_engine(config).await?;
    let mut plan = engine.plan(topic, feedback.as_deref()).await?;
    let mut feedback = feedback;

    if review {
        (plan, feedback) = review_plan(&engine, topic, plan, feedback).await?;
    }

    let report = match engine.execute_plan(topic, feedback.as_deref(), plan).await {
        Ok(report) => report,
        Err(e) => {
            log_operation_error!("run", e, topic = %topic);
            return Err(e.into());
        }
    };

    match &output {
        Some(path) => {
            tokio::fs::write(path, &report.final_report)
                .await
                .with_context(|| format!("Failed to write report to {:?}", path))?;
            eprintln!("✅ Report written to {:?}", path);
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(report.final_report.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    print_summary(&report);
    log_operation_success!("run", topic = %topic, run_id = %report.run_id);
    Ok(())
}

/// Human plan-review gate: an empty line accepts, anything else is feedback.
///
/// Returns the accepted plan with the feedback it was generated from.
async fn review_plan(
    engine: &ReportEngine,
    topic: &str,
    mut plan: Vec<Section>,
    mut feedback: Option<String>,
) -> Result<(Vec<Section>, Option<String>)> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_plan(&plan);
        eprint!("Press Enter to accept the plan, or type feedback to regenerate it: ");

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => return Ok((plan, feedback)),
        };

        let line = line.trim();
        if line.is_empty() {
            eprintln!("✅ Plan accepted");
            return Ok((plan, feedback));
        }

        eprintln!("🔄 Regenerating plan with feedback...");
        plan = engine.plan(topic, Some(line)).await?;
        feedback = Some(line.to_string());
    }
}

async fn handle_plan(topic: &str, feedback: Option<String>, config: &ReportConfig) -> Result<()> {
    let engine = build_engine(config).await?;
    let plan = engine.plan(topic, feedback.as_deref()).await?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn handle_config(config_path: Option<&Path>, show: bool, init: bool, validate: bool) -> Result<()> {
    if !(show || init || validate) {
        bail!("Nothing to do: pass --show, --init or --validate");
    }

    if init {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => dirs::config_dir()
                .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
                .context("Could not determine a configuration directory")?
                .join("deepreport")
                .join("config.toml"),
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        ReportConfig::default().save_to_file(&config_path)?;
        println!("✅ Configuration initialized at: {:?}", config_path);
        println!("📝 Set TAVILY_API_KEY, OPENAI_API_KEY and ANTHROPIC_API_KEY (or edit the file) before running.");
    }

    if show {
        let mut config = read_config(config_path)?;
        config.apply_env_overrides()?;
        println!("📋 Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate {
        let mut config = read_config(config_path)?;
        config.apply_env_overrides()?;
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

fn print_plan(plan: &[Section]) {
    eprintln!("\n📋 Report plan:");
    for (idx, section) in plan.iter().enumerate() {
        let marker = if section.requires_research {
            "🔍"
        } else {
            "📝"
        };
        eprintln!("  {}. {} {}: {}", idx + 1, marker, section.name, section.description);
    }
    eprintln!();
}

fn print_summary(report: &ReportOutput) {
    let elapsed = report.completed_at - report.started_at;
    eprintln!(
        "\n📊 {} sections in {:.1}s",
        report.sections.len(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    for (name, iterations) in &report.section_iterations {
        eprintln!("  {}: {} search iteration(s)", name, iterations);
    }
}
