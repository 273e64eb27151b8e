mod display;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use threatgate_core::config::{self, GatePolicy, DEFAULT_POLICY_PATH};
use threatgate_core::gate::{evaluate, GateReport};
use threatgate_core::register::load_register;
use threatgate_core::{notify, posture, report, summary, triage, RegisterError};
use tracing::{debug, info, warn};

/// No blocking threats.
const EXIT_PASS: u8 = 0;
/// At least one blocking threat.
const EXIT_VIOLATION: u8 = 1;
/// The register could not be read or parsed.
const EXIT_MALFORMED: u8 = 2;
/// Any other failure (writing outputs, bad policy file, ...).
const EXIT_ERROR: u8 = 3;

#[derive(Parser)]
#[command(
    name = "threatgate",
    version,
    about = "threatgate — threat-register gate and security scan triage",
    long_about = "Check a STRIDE threat register for open High/Critical threats and summarize scanner reports.\n\nExit codes: 0 = pass, 1 = blocking threats open, 2 = malformed register, 3 = other error."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fail if the threat register has open High/Critical threats
    Check {
        /// Register file, or a directory of *.yml/*.yaml registers
        #[arg(default_value = "threat_model/threats.yml")]
        path: PathBuf,

        /// Output format (text, json, sarif, markdown)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Policy file (defaults to .threatgate/policy.toml when present)
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Write the rendered report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a starter policy file
    Init {
        /// Destination of the policy file
        #[arg(short, long, default_value = DEFAULT_POLICY_PATH)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Aggregate scanner reports into triage-summary.md/.json and triage-high.md
    Triage {
        /// Directory holding the scanner report files
        #[arg(long, default_value = ".")]
        reports_dir: PathBuf,

        /// Directory to write the triage files into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Compute the security posture score and update insights.json
    Insights {
        /// Directory holding the scanner report files
        #[arg(long, default_value = ".")]
        reports_dir: PathBuf,

        /// insights.json to update
        #[arg(short, long, default_value = "insights.json")]
        output: PathBuf,
    },

    /// Write a combined markdown security summary
    Summary {
        /// Directory holding the scanner report files
        #[arg(long, default_value = ".")]
        reports_dir: PathBuf,

        /// Threat register to include
        #[arg(long, default_value = "threat_model/threats.yml")]
        register: PathBuf,

        /// Policy file (defaults to .threatgate/policy.toml when present)
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Output markdown file
        #[arg(short, long, default_value = "security_summary.md")]
        output: PathBuf,
    },

    /// Post the posture summary from insights.json to Slack
    Notify {
        /// insights.json written by `threatgate insights`
        #[arg(long, default_value = "insights.json")]
        insights: PathBuf,

        /// Attachment title
        #[arg(long, default_value = "Security Summary")]
        title: String,

        /// Print the payload instead of posting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            if err.downcast_ref::<RegisterError>().is_some() {
                ExitCode::from(EXIT_MALFORMED)
            } else {
                ExitCode::from(EXIT_ERROR)
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<u8> {
    match command {
        Commands::Check {
            path,
            format,
            policy,
            output,
        } => cmd_check(&path, &format, policy.as_deref(), output.as_deref()),
        Commands::Init { output, force } => cmd_init(&output, force),
        Commands::Triage {
            reports_dir,
            out_dir,
        } => cmd_triage(&reports_dir, &out_dir),
        Commands::Insights {
            reports_dir,
            output,
        } => cmd_insights(&reports_dir, &output),
        Commands::Summary {
            reports_dir,
            register,
            policy,
            output,
        } => cmd_summary(&reports_dir, &register, policy.as_deref(), &output),
        Commands::Notify {
            insights,
            title,
            dry_run,
        } => cmd_notify(&insights, &title, dry_run),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "threatgate", &mut std::io::stdout());
            Ok(EXIT_PASS)
        }
    }
}

fn resolve_policy(explicit: Option<&Path>) -> Result<GatePolicy> {
    if let Some(path) = explicit {
        return Ok(config::load_policy(path)?.gate);
    }
    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    match config::discover_policy(&cwd)? {
        Some(found) => {
            info!(path = DEFAULT_POLICY_PATH, "using discovered policy file");
            Ok(found.gate)
        }
        None => Ok(GatePolicy::default()),
    }
}

fn discover_register_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let mut files: Vec<PathBuf> = glob::glob(&format!("{}/**/*.yml", path.display()))
            .context("Failed to read glob pattern")?
            .chain(
                glob::glob(&format!("{}/**/*.yaml", path.display()))
                    .context("Failed to read glob pattern")?,
            )
            .filter_map(|r| r.ok())
            .collect();
        files.sort();
        return Ok(files);
    }

    // Let the loader report the missing file as an unreadable register.
    Ok(vec![path.to_path_buf()])
}

fn cmd_check(path: &Path, format: &str, policy: Option<&Path>, output: Option<&Path>) -> Result<u8> {
    if !matches!(format, "text" | "json" | "sarif" | "markdown") {
        anyhow::bail!("Unknown format '{}'. Expected text, json, sarif or markdown.", format);
    }
    if format == "text" && output.is_some() {
        anyhow::bail!("--output requires --format json, sarif or markdown");
    }

    let policy = resolve_policy(policy)?;
    let files = discover_register_files(path)?;
    if files.is_empty() {
        anyhow::bail!("No threat register files found under '{}'", path.display());
    }

    // Every file is loaded before anything is evaluated: a malformed register
    // anywhere aborts the run without a verdict.
    let mut registers = Vec::with_capacity(files.len());
    for file in &files {
        let register = load_register(file)
            .with_context(|| format!("Failed to load threat register {}", file.display()))?;
        registers.push(register);
    }

    let reports: Vec<GateReport> = registers.iter().map(|r| evaluate(r, &policy)).collect();
    debug!(files = reports.len(), "gate evaluated");

    let rendered = match format {
        // A directory always yields an array, however many registers it holds.
        "json" => Some(if path.is_dir() {
            serde_json::to_string_pretty(&reports)?
        } else {
            serde_json::to_string_pretty(&reports[0])?
        }),
        "sarif" => Some(serde_json::to_string_pretty(&report::sarif::to_sarif_all(&reports))?),
        "markdown" => Some(
            reports
                .iter()
                .map(|r| format!("## Threat Model\n\n{}", report::to_markdown(r)))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    };

    match (rendered, output) {
        (Some(text), Some(out_path)) => {
            write_file(out_path, &text)?;
            eprintln!("Report written to {}", out_path.display());
        }
        (Some(text), None) => println!("{}", text),
        (None, _) => {
            for r in &reports {
                display::print_gate_report(r);
            }
        }
    }

    let mut code = EXIT_PASS;
    for r in reports {
        if let Err(e) = r.into_result() {
            if format != "text" {
                eprintln!("{} {}", "FAIL".red().bold(), e);
            }
            code = EXIT_VIOLATION;
        }
    }
    Ok(code)
}

fn cmd_init(output: &Path, force: bool) -> Result<u8> {
    if output.exists() && !force {
        anyhow::bail!(
            "'{}' already exists. Use --force to overwrite it.",
            output.display()
        );
    }
    write_file(output, &config::generate_default_policy())?;
    println!("Policy file written to {}", output.display());
    Ok(EXIT_PASS)
}

fn cmd_triage(reports_dir: &Path, out_dir: &Path) -> Result<u8> {
    let summary = triage::triage(reports_dir, Utc::now());

    let outputs = [
        (out_dir.join("triage-summary.md"), summary.to_markdown()),
        (out_dir.join("triage-summary.json"), summary.totals_json()?),
        (out_dir.join("triage-high.md"), summary.highs_markdown()),
    ];
    for (path, content) in &outputs {
        write_file(path, content)?;
    }

    display::print_triage(&summary);
    for (path, _) in &outputs {
        println!(" {} Wrote {}", "OK".green().bold(), path.display());
    }
    Ok(EXIT_PASS)
}

fn cmd_insights(reports_dir: &Path, output: &Path) -> Result<u8> {
    let previous: Option<posture::Insights> = match std::fs::read_to_string(output) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(prev) => Some(prev),
            Err(e) => {
                let backup = backup_path(output);
                std::fs::copy(output, &backup).with_context(|| {
                    format!("Failed to back up unreadable {} to {}", output.display(), backup.display())
                })?;
                warn!(
                    path = %output.display(),
                    backup = %backup.display(),
                    error = %e,
                    "insights file could not be parsed, starting a new history"
                );
                None
            }
        },
        Err(_) => None,
    };

    let insights = posture::compute_insights(
        &triage::load_all(reports_dir),
        previous.as_ref(),
        Utc::now(),
    );
    write_file(output, &serde_json::to_string_pretty(&insights)?)?;

    display::print_insights(&insights);
    println!(" {} Wrote {}", "OK".green().bold(), output.display());
    Ok(EXIT_PASS)
}

fn cmd_notify(insights_path: &Path, title: &str, dry_run: bool) -> Result<u8> {
    let content = std::fs::read_to_string(insights_path)
        .with_context(|| format!("Failed to read {}", insights_path.display()))?;
    let insights: posture::Insights = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", insights_path.display()))?;
    let payload = notify::slack_payload(&insights, title, Utc::now());

    let webhook = std::env::var(notify::WEBHOOK_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty());
    let webhook = match webhook {
        Some(url) if !dry_run => url,
        other => {
            if other.is_none() && !dry_run {
                warn!("{} is not set, notification not sent", notify::WEBHOOK_ENV);
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(EXIT_PASS);
        }
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let status = rt
        .block_on(notify::post_webhook(&webhook, &payload))
        .context("Slack notification failed")?;
    println!(" {} Slack message sent ({})", "OK".green().bold(), status);
    Ok(EXIT_PASS)
}

fn cmd_summary(reports_dir: &Path, register: &Path, policy: Option<&Path>, output: &Path) -> Result<u8> {
    let gate = if register.is_file() {
        let policy = resolve_policy(policy)?;
        let loaded = load_register(register)
            .with_context(|| format!("Failed to load threat register {}", register.display()))?;
        Some(evaluate(&loaded, &policy))
    } else {
        info!(path = %register.display(), "threat register not found, summarizing scans only");
        None
    };

    let md = summary::security_summary(
        gate.as_ref(),
        &register.to_string_lossy(),
        &triage::load_all(reports_dir),
        Utc::now(),
    );
    write_file(output, &md)?;
    println!(" {} Wrote {}", "OK".green().bold(), output.display());

    if let Ok(step_summary) = std::env::var("GITHUB_STEP_SUMMARY") {
        append_step_summary(Path::new(&step_summary), &md)?;
    }
    Ok(EXIT_PASS)
}

/// `insights.json` -> `insights.json.bak`
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

fn append_step_summary(path: &Path, md: &str) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open job summary {}", path.display()))?;
    write!(
        file,
        "# Security Summary (excerpt)\n{}",
        summary::step_summary_excerpt(md)
    )
    .with_context(|| format!("Failed to append to job summary {}", path.display()))?;
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
