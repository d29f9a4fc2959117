use anyhow::Result;
use capture_renamer_core::{
    app_paths, load_config, run, select_tool, undo_journal, AppConfig, BackupProgress,
    IdentitySource, RunOptions, RunReport, SidecarMode, ToolKind,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Parser)]
#[command(name = "capture-renamer")]
#[command(about = "Renames camera images by capture time and keeps original names in XMP sidecars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rename(RenameArgs),
    Undo,
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

#[derive(Debug, Args)]
struct RenameArgs {
    /// Folder holding the images.
    root: PathBuf,
    /// Event name, 1-12 characters.
    #[arg(long)]
    event: String,
    #[arg(long, conflicts_with = "no_category")]
    category: Option<String>,
    #[arg(long, default_value_t = false)]
    no_category: bool,
    #[arg(long, overrides_with = "no_recursive")]
    recursive: bool,
    #[arg(long, overrides_with = "recursive")]
    no_recursive: bool,
    #[arg(long, overrides_with = "no_backup")]
    backup: bool,
    #[arg(long, overrides_with = "backup")]
    no_backup: bool,
    #[arg(long)]
    sidecar_mode: Option<SidecarMode>,
    #[arg(long, overrides_with = "no_sidecar")]
    sidecar: bool,
    #[arg(long, overrides_with = "sidecar")]
    no_sidecar: bool,
    #[arg(long)]
    identity: Option<IdentitySource>,
    #[arg(long)]
    tool: Option<ToolKind>,
    #[arg(long)]
    exiftool: Option<String>,
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Undo => cmd_undo(),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;

    let exiftool_path = args.exiftool.clone().unwrap_or(config.exiftool_path.clone());
    let tool = select_tool(args.tool.unwrap_or(config.tool), &exiftool_path)?;
    log::info!("metadata tool: {}", tool.name());

    let options = run_options(&args, &config, paths.journal_path);
    let last_percent = AtomicU8::new(0);
    let report = run(&options, tool.as_ref(), |progress: BackupProgress| {
        if progress.percent > last_percent.fetch_max(progress.percent, Ordering::Relaxed) {
            eprint!("\rbackup: {:>3}% ({}/{})", progress.percent, progress.done, progress.total);
            if progress.done == progress.total {
                eprintln!();
            }
        }
    })?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            print_table(&report);
        }
    }

    if report.dry_run {
        eprintln!("dry run: no files were changed. Drop --dry-run to apply.");
    }
    Ok(())
}

/// Flags win over config in both directions; config fills whatever is unset.
fn run_options(args: &RenameArgs, config: &AppConfig, journal_path: PathBuf) -> RunOptions {
    let category = if args.no_category {
        None
    } else {
        args.category
            .clone()
            .or_else(|| config.category().map(str::to_string))
    };

    RunOptions {
        root: args.root.clone(),
        recursive: toggle(args.recursive, args.no_recursive).unwrap_or(config.recursive_default),
        extensions: config.extensions.clone(),
        category,
        event: args.event.clone(),
        backup: toggle(args.backup, args.no_backup).unwrap_or(config.backup_default),
        sidecars: toggle(args.sidecar, args.no_sidecar).unwrap_or(config.sidecars_default),
        sidecar_mode: args.sidecar_mode.unwrap_or(config.sidecar_mode_default),
        identity: args.identity.unwrap_or(config.identity_default),
        dry_run: args.dry_run,
        journal_path: Some(journal_path),
    }
}

fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn cmd_undo() -> Result<()> {
    let paths = app_paths()?;
    let result = undo_journal(&paths.journal_path)?;
    println!(
        "undo complete: {} restored, {} sidecars removed",
        result.restored, result.sidecars_removed
    );
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("journal file: {}", paths.journal_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_table(report: &RunReport) {
    println!("original -> target");
    for candidate in &report.plan.candidates {
        let marker = if candidate.changed { "" } else { " (unchanged)" };
        println!(
            "{} -> {}{}",
            candidate.original_path.display(),
            candidate.target_path.display(),
            marker
        );
    }

    if let Some(backup) = &report.backup {
        println!("\nbackup: {}", backup.backup_root.display());
    }
    for warning in &report.warnings {
        println!("warning [{:?}] {}: {}", warning.kind, warning.path.display(), warning.message);
    }

    let s = &report.summary;
    println!(
        "\nsummary: scanned={} eligible={} renamed={} unchanged={} missing_timestamp={} \
         duplicate_groups={} duplicate_files={}",
        s.scanned,
        s.eligible,
        s.renamed,
        s.unchanged,
        s.missing_timestamp,
        s.duplicate_groups,
        s.duplicate_files
    );
    println!(
        "         backed_up={} backup_failures={} sidecars_written={} sidecars_skipped={} \
         sidecars_relocated={} sidecars_removed={} warnings={}",
        s.backed_up,
        s.backup_failures,
        s.sidecars_written,
        s.sidecars_skipped,
        s.sidecars_relocated,
        s.sidecars_removed,
        s.warnings
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename_args(flags: &[&str]) -> RenameArgs {
        let argv = ["capture-renamer", "rename", "/photos", "--event", "beach"];
        let cli = Cli::try_parse_from(argv.iter().chain(flags)).expect("parse");
        match cli.command {
            Commands::Rename(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn options(flags: &[&str], config: &AppConfig) -> RunOptions {
        run_options(&rename_args(flags), config, PathBuf::from("last-run.json"))
    }

    #[test]
    fn unset_flags_take_config_values() {
        let config = AppConfig {
            recursive_default: true,
            backup_default: false,
            ..AppConfig::default()
        };
        let opts = options(&[], &config);
        assert!(opts.recursive);
        assert!(!opts.backup);
        assert!(opts.sidecars);
        assert_eq!(opts.category.as_deref(), Some("photo"));
    }

    #[test]
    fn flags_override_config_both_ways() {
        let config = AppConfig {
            recursive_default: true,
            backup_default: false,
            sidecars_default: false,
            ..AppConfig::default()
        };
        let opts = options(&["--no-recursive", "--backup", "--sidecar"], &config);
        assert!(!opts.recursive);
        assert!(opts.backup);
        assert!(opts.sidecars);

        let opts = options(&["--recursive", "--no-backup"], &AppConfig::default());
        assert!(opts.recursive);
        assert!(!opts.backup);
    }

    #[test]
    fn last_of_paired_flags_wins() {
        let opts = options(&["--recursive", "--no-recursive"], &AppConfig::default());
        assert!(!opts.recursive);
    }

    #[test]
    fn no_category_drops_configured_category() {
        let opts = options(&["--no-category"], &AppConfig::default());
        assert_eq!(opts.category, None);
        let opts = options(&["--category", "fam"], &AppConfig::default());
        assert_eq!(opts.category.as_deref(), Some("fam"));
    }
}
