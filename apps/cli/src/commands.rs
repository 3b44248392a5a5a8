//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use brewsync_core::{LocalSource, PushReport, SyncAction, SyncEngine, SyncReporter, sorted_json};
use brewsync_remote::{Credentials, RemoteClient, SessionContext};
use brewsync_shared::{
    AppConfig, BrewSyncError, NamePattern, SyncOptions, expand_tilde, init_config, load_config,
    load_config_from, read_password_file,
};
use brewsync_sources::{ExportFile, KbhDatabase};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Command-line interface for brewsync.
#[derive(Parser)]
#[command(
    name = "brewsync",
    version,
    about = "Synchronize recipes and brew sessions from a local brewing log to the Grainfather recipe service.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log writes instead of performing them.
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Overwrite remote records even when they are newer.
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Read this configuration file instead of ~/.brewsync/brewsync.toml.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Recipe service username.
    #[arg(short, long, env = "BREWSYNC_USER", global = true)]
    pub user: Option<String>,

    /// Recipe service password.
    #[arg(short, long, env = "BREWSYNC_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Read the password from the first line of this file.
    #[arg(short = 'P', long, global = true)]
    pub password_file: Option<String>,

    /// Log out at the end instead of keeping the session.
    #[arg(short, long, global = true)]
    pub logout: bool,

    /// Brewing log database file.
    #[arg(short, long, global = true)]
    pub kbh_file: Option<String>,

    /// Brewing software XML export file.
    #[arg(short = 'x', long, global = true)]
    pub export_file: Option<String>,

    /// Local store to read recipes from.
    #[arg(long, default_value = "log", global = true)]
    pub source: SourceKind,

    /// Do not synchronize brew sessions.
    #[arg(long, global = true)]
    pub no_brews: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Local recipe store.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum SourceKind {
    Log,
    Export,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List local and remote recipes side by side.
    List {
        /// Shell-style recipe name pattern.
        pattern: Option<String>,
    },

    /// Print recipes as JSON.
    Dump {
        /// Shell-style recipe name pattern.
        pattern: Option<String>,

        /// Dump the recalculated local recipes instead of the remote ones.
        #[arg(long)]
        local: bool,
    },

    /// Push local recipes (and brew sessions) to the recipe service.
    Push {
        /// Shell-style recipe name pattern.
        pattern: Option<String>,
    },

    /// Delete remote recipes.
    Delete {
        /// Shell-style recipe name pattern (required).
        pattern: String,
    },

    /// Show a unified diff between the local and the remote version of one recipe.
    Diff {
        /// Pattern selecting exactly one recipe.
        pattern: String,
    },

    /// Push, then keep pushing whenever the local store changes.
    Daemon {
        /// Shell-style recipe name pattern.
        pattern: Option<String>,
    },

    /// End the remote session and forget it.
    Logout,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "brewsync=warn",
        1 => "brewsync=info",
        2 => "brewsync=debug",
        _ => "brewsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let mut options = SyncOptions::from(&config);
    options.force = cli.force;
    options.dry_run = cli.dry_run;
    options.brews &= !cli.no_brews;

    match &cli.command {
        Command::Config { action } => {
            return match action {
                ConfigAction::Init => cmd_config_init().await,
                ConfigAction::Show => cmd_config_show(&config).await,
            };
        }
        Command::Dump {
            pattern,
            local: true,
        } => return cmd_dump_local(&cli, &config, &pattern_arg(pattern.as_deref())?).await,
        _ => {}
    }

    let mut remote = RemoteSession::open(&config, cli.password.as_deref(), cli.dry_run)?;
    if let Command::Logout = cli.command {
        return remote.logout().await;
    }

    let result = dispatch(&cli, &config, options, &mut remote).await;
    let closed = if cli.logout {
        remote.logout().await
    } else {
        remote.persist()
    };
    result.and(closed)
}

async fn dispatch(
    cli: &Cli,
    config: &AppConfig,
    options: SyncOptions,
    remote: &mut RemoteSession,
) -> Result<()> {
    let engine = SyncEngine::new(&remote.client, options);
    let ctx = &mut remote.ctx;

    match &cli.command {
        Command::List { pattern } => {
            let pattern = pattern_arg(pattern.as_deref())?;
            let source = match open_source(cli, config).await {
                Ok(source) => Some(source),
                Err(e) => {
                    debug!(error = %e, "listing remote recipes only");
                    None
                }
            };
            for row in engine.list(ctx, source.as_ref(), &pattern).await? {
                println!("{}", row.render());
            }
        }
        Command::Dump { pattern, .. } => {
            let pattern = pattern_arg(pattern.as_deref())?;
            for recipe in engine.dump_remote(ctx, &pattern).await? {
                println!("{}", sorted_json(&recipe));
            }
        }
        Command::Push { pattern } => {
            let pattern = pattern_arg(pattern.as_deref())?;
            let source = open_source(cli, config).await?;
            info!(pattern = pattern.as_str(), source = source.kind(), "pushing recipes");
            let reporter = CliReporter::new();
            let report = engine.push(ctx, &source, &pattern, &reporter).await?;
            print_report(&report, cli.dry_run);
        }
        Command::Delete { pattern } => {
            let pattern = NamePattern::new(pattern)?;
            let deleted = engine.delete(ctx, &pattern).await?;
            if !cli.dry_run {
                println!("Deleted {deleted} recipe(s).");
            }
        }
        Command::Diff { pattern } => {
            let pattern = NamePattern::new(pattern)?;
            let source = open_source(cli, config).await?;
            let (local, remote) = engine.diff_pair(ctx, &source, &pattern).await?;
            show_diff(&local, &remote)?;
        }
        Command::Daemon { pattern } => {
            let pattern = pattern_arg(pattern.as_deref())?;
            let mut source = open_source(cli, config).await?;
            let timing = (
                Duration::from_secs(config.sync.poll_interval_secs),
                Duration::from_secs(config.sync.settle_secs),
            );
            let reporter = CliReporter::new();
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "cannot listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            };
            engine
                .daemon(ctx, &mut source, &pattern, &reporter, timing, shutdown)
                .await?;
        }
        Command::Logout | Command::Config { .. } => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Configuration and sources
// ---------------------------------------------------------------------------

/// Config file values with command-line overrides applied.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(user) = &cli.user {
        config.remote.username = Some(user.clone());
    }
    if let Some(file) = &cli.password_file {
        config.remote.password_file = file.clone();
    }
    if let Some(file) = &cli.kbh_file {
        config.sources.kbh_file = file.clone();
    }
    if let Some(file) = &cli.export_file {
        config.sources.export_file = Some(file.clone());
    }
    Ok(config)
}

fn pattern_arg(pattern: Option<&str>) -> Result<NamePattern> {
    Ok(NamePattern::new(pattern.unwrap_or("*"))?)
}

async fn open_source(cli: &Cli, config: &AppConfig) -> Result<LocalSource> {
    match cli.source {
        SourceKind::Log => {
            let path = expand_tilde(&config.sources.kbh_file);
            Ok(LocalSource::Log(KbhDatabase::open(&path).await?))
        }
        SourceKind::Export => {
            let file = config
                .sources
                .export_file
                .as_deref()
                .ok_or_else(|| eyre!("no export file configured, use -x"))?;
            Ok(LocalSource::Export(ExportFile::open(&expand_tilde(file)).await?))
        }
    }
}

// ---------------------------------------------------------------------------
// Remote session lifecycle
// ---------------------------------------------------------------------------

/// The remote client and the session context it works on, with the state file
/// the context is loaded from and saved to.
struct RemoteSession {
    client: RemoteClient,
    ctx: SessionContext,
    state_file: PathBuf,
}

impl RemoteSession {
    fn open(config: &AppConfig, password: Option<&str>, dry_run: bool) -> Result<Self> {
        let state_file = expand_tilde(&config.remote.state_file);
        let mut ctx = SessionContext::load(&state_file).unwrap_or_default();
        if let Some(user) = &config.remote.username {
            if !ctx.belongs_to(user) {
                debug!(user, "persisted session belongs to another user");
                ctx = SessionContext::new(user.clone());
            }
        }

        let credentials = credentials(config, password)?;
        let client = RemoteClient::new(&config.remote, credentials, dry_run)?;
        Ok(Self {
            client,
            ctx,
            state_file,
        })
    }

    fn persist(&self) -> Result<()> {
        if self.ctx.is_authenticated() {
            self.ctx.save(&self.state_file)?;
        }
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.client.logout(&mut self.ctx).await?;
        SessionContext::remove(&self.state_file)?;
        Ok(())
    }
}

/// Username plus a password from the command line or the password file.
fn credentials(config: &AppConfig, password: Option<&str>) -> Result<Option<Credentials>> {
    let Some(username) = config.remote.username.clone() else {
        return Ok(None);
    };
    let password = match password {
        Some(password) => Some(password.to_string()),
        None => {
            let file = expand_tilde(&config.remote.password_file);
            if file.is_file() {
                Some(read_password_file(&file)?)
            } else {
                None
            }
        }
    };
    Ok(password.map(|p| Credentials::new(username, p)))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_dump_local(cli: &Cli, config: &AppConfig, pattern: &NamePattern) -> Result<()> {
    let source = open_source(cli, config).await?;
    let (records, _) = source.canonical(pattern).await?;
    for record in records {
        println!("{}", sorted_json(&record.recipe.to_payload()));
    }
    Ok(())
}

fn show_diff(local: &str, remote: &str) -> Result<()> {
    let dir = std::env::temp_dir();
    let stamp = uuid::Uuid::now_v7();
    let local_file = dir.join(format!("brewsync-{stamp}-local.json"));
    let remote_file = dir.join(format!("brewsync-{stamp}-remote.json"));
    write_file(&local_file, local)?;
    write_file(&remote_file, remote)?;

    let status = std::process::Command::new("diff")
        .arg("-u")
        .arg(&local_file)
        .arg(&remote_file)
        .status();

    std::fs::remove_file(&local_file).ok();
    std::fs::remove_file(&remote_file).ok();

    let status = status.map_err(|e| eyre!("failed to run diff: {e}"))?;
    // 0: identical, 1: differences shown
    match status.code() {
        Some(0 | 1) => Ok(()),
        _ => Err(eyre!("diff exited with status: {status}")),
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| BrewSyncError::io(path, e))?;
    Ok(())
}

fn print_report(report: &PushReport, dry_run: bool) {
    println!();
    if dry_run {
        println!("  Dry run, nothing was written.");
    }
    println!("  Created:   {}", report.created);
    println!("  Updated:   {}", report.updated);
    println!("  Skipped:   {}", report.skipped);
    if report.conflicts > 0 {
        println!("  Conflicts: {}", report.conflicts);
    }
    if report.failed > 0 {
        println!("  Failed:    {}", report.failed);
    }
    let brews = report.brews_created + report.brews_updated + report.brews_skipped;
    if brews > 0 {
        println!(
            "  Brews:     {} created, {} updated, {} skipped",
            report.brews_created, report.brews_updated, report.brews_skipped
        );
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI sync reporter using an indicatif spinner.
struct CliReporter {
    spinner: ProgressBar,
}

impl CliReporter {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl SyncReporter for CliReporter {
    fn phase(&self, name: &str) {
        // the daemon reuses one reporter across passes
        if self.spinner.is_finished() {
            self.spinner.reset();
            self.spinner.enable_steady_tick(Duration::from_millis(80));
        }
        self.spinner.set_message(name.to_string());
    }

    fn recipe(&self, name: &str, action: &SyncAction) {
        self.spinner.set_message(format!("{} {name}", action.label()));
    }

    fn done(&self, _report: &PushReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_the_command() {
        let cli = Cli::try_parse_from([
            "brewsync", "push", "Pale*", "-n", "-f", "-vv", "--source", "export", "-x", "r.xml",
            "--no-brews",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert!(cli.force);
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_brews);
        assert!(matches!(cli.source, SourceKind::Export));
        assert_eq!(cli.export_file.as_deref(), Some("r.xml"));
        assert!(matches!(cli.command, Command::Push { pattern: Some(ref p) } if p == "Pale*"));
    }

    #[test]
    fn delete_requires_a_pattern() {
        assert!(Cli::try_parse_from(["brewsync", "delete"]).is_err());
        assert!(Cli::try_parse_from(["brewsync", "diff"]).is_err());
    }

    #[test]
    fn dump_local_flag() {
        let cli = Cli::try_parse_from(["brewsync", "dump", "--local"]).unwrap();
        assert!(matches!(cli.command, Command::Dump { pattern: None, local: true }));
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = Cli::try_parse_from([
            "brewsync", "-c", "/nonexistent/brewsync.toml", "list",
        ])
        .unwrap();
        assert!(resolve_config(&cli).is_err());

        let path = std::env::temp_dir().join(format!("brewsync-cli-{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[remote]\nusername = \"file-user\"\n").unwrap();
        let cli = Cli::try_parse_from([
            "brewsync",
            "-c",
            path.to_str().unwrap(),
            "-u",
            "flag-user",
            "-k",
            "/tmp/kb.sqlite",
            "list",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.remote.username.as_deref(), Some("flag-user"));
        assert_eq!(config.sources.kbh_file, "/tmp/kb.sqlite");
        std::fs::remove_file(&path).ok();
    }
}
