use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use sunat::artifacts::ArtifactPersister;
use sunat::client::ReceiptClient;
use sunat::config::{CliOverrides, SunatConfig};
use sunat::package;
use sunat::report::Reporter;
use sunat::resolver::{self, PollOutcome};

mod progress;

use progress::PollProgress;

#[derive(Parser)]
#[command(name = "sunat", version)]
#[command(about = "Submit electronic receipts to SUNAT and resolve their tickets")]
struct Cli {
    /// Path to the config file (default: ~/.sunat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// OAuth2 client id issued in the SUNAT portal
    #[arg(long)]
    client_id: Option<String>,

    /// OAuth2 client secret. Prefer SUNAT_CLIENT_SECRET in shared environments.
    #[arg(long)]
    client_secret: Option<String>,

    /// SOL username of the taxpayer
    #[arg(long)]
    username: Option<String>,

    /// SOL password. Prefer SUNAT_PASSWORD in shared environments.
    #[arg(long)]
    password: Option<String>,

    /// Token endpoint base URL
    #[arg(long)]
    auth_base: Option<String>,

    /// Ingestion API base URL, also used as the OAuth2 scope
    #[arg(long)]
    api_base: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package a receipt, submit it, and print the ticket number.
    Send {
        /// Receipt XML to submit
        file: PathBuf,

        /// Also write the submitted zip next to the receipt
        #[arg(long)]
        write_zip: bool,
    },

    /// Check a ticket once and save whatever came back.
    Fetch {
        /// Ticket number returned by a submission
        ticket: String,

        /// Directory for the extracted CDR
        #[arg(long, short = 'o', default_value = ".")]
        output_dir: PathBuf,

        /// Directory for rejection details; when omitted they are not written
        #[arg(long)]
        error_dir: Option<PathBuf>,
    },

    /// Submit a receipt and poll its ticket until it settles.
    Process {
        /// Receipt XML to submit
        file: PathBuf,

        /// Directory for the extracted CDR
        #[arg(long, short = 'o', default_value = ".")]
        output_dir: PathBuf,

        /// Directory for rejection details; when omitted they are not written
        #[arg(long)]
        error_dir: Option<PathBuf>,

        /// Also write the submitted zip next to the receipt
        #[arg(long)]
        write_zip: bool,

        /// Status checks before giving up
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Delay before the first check (e.g. 1s, 500ms)
        #[arg(long)]
        initial_delay: Option<String>,

        /// Delay between checks (e.g. 2s)
        #[arg(long)]
        poll_interval: Option<String>,
    },

    /// Inspect or edit the config file.
    #[command(subcommand)]
    Config(ConfigCmd),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the file config with secrets masked.
    Show,
    /// Set one dotted key, e.g. `credentials.client_id`.
    Set { key: String, value: String },
    /// Write a commented starter config.
    Init,
    /// Delete the config file.
    Clear,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match run(cli)? {
        0 => Ok(()),
        code => process::exit(code),
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut reporter = CliReporter;

    match &cli.cmd {
        Commands::Send { file, write_zip } => {
            let config = load_config(&cli)?;
            run_send(&config, file, *write_zip, &mut reporter)
        }
        Commands::Fetch {
            ticket,
            output_dir,
            error_dir,
        } => {
            let config = load_config(&cli)?;
            run_fetch(
                &config,
                ticket,
                output_dir.clone(),
                error_dir.clone(),
                &mut reporter,
            )
        }
        Commands::Process {
            file,
            output_dir,
            error_dir,
            write_zip,
            ..
        } => {
            let config = load_config(&cli)?;
            run_process(
                &config,
                file,
                output_dir.clone(),
                error_dir.clone(),
                *write_zip,
                &mut reporter,
            )
        }
        Commands::Config(cmd) => run_config(cmd, cli.config.as_deref(), &mut reporter),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "sunat", &mut io::stdout());
            Ok(0)
        }
    }
}

/// Merges the config file, `SUNAT_*` environment variables, and CLI flags.
fn load_config(cli: &Cli) -> Result<SunatConfig> {
    let mut overrides = CliOverrides {
        client_id: cli.client_id.clone(),
        client_secret: cli.client_secret.clone(),
        username: cli.username.clone(),
        password: cli.password.clone(),
        auth_base_url: cli.auth_base.clone(),
        api_base_url: cli.api_base.clone(),
        ..Default::default()
    };

    if let Commands::Process {
        max_attempts,
        initial_delay,
        poll_interval,
        ..
    } = &cli.cmd
    {
        overrides.max_attempts = *max_attempts;
        overrides.initial_delay = initial_delay.as_deref().map(parse_duration).transpose()?;
        overrides.interval = poll_interval.as_deref().map(parse_duration).transpose()?;
    }

    SunatConfig::effective(cli.config.as_deref(), &overrides)
}

fn parse_duration(s: &str) -> Result<Duration> {
    humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))
}

fn connect(config: &SunatConfig, reporter: &mut dyn Reporter) -> Result<ReceiptClient> {
    let credentials = config.require_credentials()?;
    reporter.info(&format!(
        "authenticating against {}",
        config.endpoints.auth_base_url
    ));
    Ok(ReceiptClient::connect(&config.endpoints(), &credentials)?)
}

fn run_send(
    config: &SunatConfig,
    file: &Path,
    write_zip: bool,
    reporter: &mut dyn Reporter,
) -> Result<i32> {
    let receipt = package::package(file)?;
    if write_zip {
        let path = receipt.write_archive(archive_dir(file))?;
        reporter.info(&format!("archive written to {}", path.display()));
    }

    let client = connect(config, reporter)?;
    reporter.info(&format!(
        "submitting {} ({} bytes)",
        receipt.zip_file_name,
        receipt.archive.len()
    ));
    let ticket = client.submit(&receipt)?;

    println!("ticket: {ticket}");
    Ok(0)
}

fn run_fetch(
    config: &SunatConfig,
    ticket: &str,
    output_dir: PathBuf,
    error_dir: Option<PathBuf>,
    reporter: &mut dyn Reporter,
) -> Result<i32> {
    let client = connect(config, reporter)?;
    let status = client.fetch_status(ticket)?;
    let outcome = PollOutcome::from_single_check(status);

    let persister = ArtifactPersister::new(output_dir, error_dir);
    finish_outcome(&outcome, ticket, ticket, &persister, reporter)
}

fn run_process(
    config: &SunatConfig,
    file: &Path,
    output_dir: PathBuf,
    error_dir: Option<PathBuf>,
    write_zip: bool,
    reporter: &mut dyn Reporter,
) -> Result<i32> {
    let receipt = package::package(file)?;
    if write_zip {
        let path = receipt.write_archive(archive_dir(file))?;
        reporter.info(&format!("archive written to {}", path.display()));
    }

    let client = connect(config, reporter)?;
    reporter.info(&format!(
        "submitting {} ({} bytes)",
        receipt.zip_file_name,
        receipt.archive.len()
    ));
    let ticket = client.submit(&receipt)?;
    println!("ticket: {ticket}");

    let mut progress = PollProgress::start(&ticket);
    let outcome = resolver::resolve(&client, &ticket, &config.poll, &mut progress);
    progress.finish();

    let persister = ArtifactPersister::new(output_dir, error_dir);
    finish_outcome(&outcome?, &receipt.logical_name, &ticket, &persister, reporter)
}

/// Where `--write-zip` puts the archive: next to the source file.
fn archive_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Prints the outcome, persists its artifacts, and picks the exit code.
///
/// A rejected ticket exits 1. A ticket still in progress exits 0; waiting
/// longer is the operator's call, not a failure.
fn finish_outcome(
    outcome: &PollOutcome,
    name: &str,
    ticket: &str,
    persister: &ArtifactPersister,
    reporter: &mut dyn Reporter,
) -> Result<i32> {
    match outcome {
        PollOutcome::Resolved(status) if status.is_success() => {
            println!("ticket {ticket}: accepted");
            if let Some(error) = &status.error {
                println!("observation: {} {}", error.code, error.detail);
            }
            if let Some(path) = persister.save_certificate(status, reporter)? {
                println!("cdr: {}", path.display());
            }
            Ok(0)
        }
        PollOutcome::Resolved(status) if status.is_error() => {
            println!("ticket {ticket}: rejected");
            match &status.error {
                Some(error) => {
                    reporter.error(&format!("rejection {}: {}", error.code, error.detail));
                    if let Some(path) = persister.save_error(name, error, reporter)? {
                        println!("detail: {}", path.display());
                    }
                }
                None => reporter.error("the response carried no error detail"),
            }
            if status.certificate.is_some()
                && let Some(path) = persister.save_certificate(status, reporter)?
            {
                println!("cdr: {}", path.display());
            }
            Ok(1)
        }
        PollOutcome::Resolved(status) => {
            let code: String = status.response_code.clone().into();
            reporter.warn(&format!(
                "unrecognized response code {code}; treating the ticket as settled"
            ));
            println!("ticket {ticket}: code {code}");
            if status.certificate.is_some()
                && let Some(path) = persister.save_certificate(status, reporter)?
            {
                println!("cdr: {}", path.display());
            }
            Ok(0)
        }
        PollOutcome::StillProcessing {
            attempts_exhausted, ..
        } => {
            println!("ticket {ticket}: still processing");
            if *attempts_exhausted {
                reporter.info(&format!("check again later with `sunat fetch {ticket}`"));
            }
            Ok(0)
        }
    }
}

fn run_config(
    cmd: &ConfigCmd,
    config_flag: Option<&Path>,
    reporter: &mut dyn Reporter,
) -> Result<i32> {
    let path = match config_flag {
        Some(path) => path.to_path_buf(),
        None => SunatConfig::config_path()?,
    };

    match cmd {
        ConfigCmd::Show => {
            let config = if path.exists() {
                SunatConfig::load_from_file(&path)?
            } else {
                reporter.info("no config file; showing defaults");
                SunatConfig::default()
            };
            println!("# {}", path.display());
            print!(
                "{}",
                toml::to_string_pretty(&config.masked())
                    .context("failed to render configuration")?
            );
            Ok(0)
        }
        ConfigCmd::Set { key, value } => {
            let mut config = if path.exists() {
                SunatConfig::load_from_file(&path)?
            } else {
                SunatConfig::default()
            };
            config.set_value(key, value)?;
            config.save_to_file(&path)?;
            reporter.info(&format!("updated {key} in {}", path.display()));
            Ok(0)
        }
        ConfigCmd::Init => {
            if path.exists() {
                bail!("config file already exists: {}", path.display());
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&path, SunatConfig::default_toml_template())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
            Ok(0)
        }
        ConfigCmd::Clear => {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                reporter.info(&format!("removed {}", path.display()));
            } else {
                reporter.info("no config file to remove");
            }
            Ok(0)
        }
    }
}
