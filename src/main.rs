//! housekeeper CLI
//!
//! Duplicate cleanup, dated copies, chat-history scraping and the hosted
//! database imports, one subcommand each.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use humansize::{BINARY, format_size};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use housekeeper::chat::scan_database;
use housekeeper::config::RemoteConfig;
use housekeeper::copy::{CopyConfig, copy_since};
use housekeeper::error::{Error, Result};
use housekeeper::ledger::{read_ledger, write_ledger};
use housekeeper::logging;
use housekeeper::payroll::{
    ImportOptions, SheetRow, fix_imported, import_rows, list_employees, parse_selection,
    read_sheet, read_workbook_week, week_sheet_name,
};
use housekeeper::platform::{default_chat_db, local_and_network_mounts, network_mounts};
use housekeeper::projects::{SyncMode, read_export, select_enabled, sync_projects};
use housekeeper::pubspec::{PUB_DEV, PubDevSource, bump_file};
use housekeeper::purge::{delete_files, plan_deletion};
use housekeeper::remote::RestRemote;
use housekeeper::report::format_report;
use housekeeper::scanner::{collect_files, count_size_collisions, group_duplicates};
use housekeeper::types::{HashAlgorithm, OutputFormat, ScanConfig};

/// Planned deletions listed before confirming.
const PREVIEW_LIMIT: usize = 20;
/// Failures listed after deleting.
const FAILURE_LIMIT: usize = 10;

#[derive(Parser)]
#[command(name = "housekeeper")]
#[command(about = "File and database housekeeping jobs")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Also append log lines to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find and delete duplicate files by content hash
    #[command(subcommand)]
    Dupes(DupesCommand),

    /// Copy files modified after a cutoff, keeping the folder structure
    CopySince {
        /// Folder to copy from
        source: PathBuf,

        /// Folder to copy into
        destination: PathBuf,

        /// Cutoff (YYYY-MM-DD, optionally with HH:MM[:SS]); only newer files are copied
        #[arg(long, value_parser = parse_cutoff)]
        since: NaiveDateTime,

        /// List what would be copied without copying
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the editor's local state database for chat history
    #[command(subcommand)]
    Chat(ChatCommand),

    /// Import the weekly payroll sheet into the hosted timesheets
    #[command(subcommand)]
    Payroll(PayrollCommand),

    /// Sync the legacy job list into the hosted projects table
    #[command(subcommand)]
    Projects(ProjectsCommand),

    /// Bump pubspec.yaml dependencies to their latest versions
    #[command(subcommand)]
    Pubspec(PubspecCommand),
}

#[derive(Subcommand)]
enum DupesCommand {
    /// Scan for duplicates and write the ledger CSV
    Scan {
        /// Folders to scan (default: network mounts)
        paths: Vec<PathBuf>,

        /// Scan every mounted drive when no paths are given
        #[arg(long)]
        all_drives: bool,

        /// Ledger CSV to write
        #[arg(short, long, default_value = "duplicate_files_log.csv")]
        output: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Hash algorithm
        #[arg(long, value_enum, default_value = "blake3")]
        algorithm: AlgorithmArg,

        /// Skip files smaller than this many bytes
        #[arg(long, default_value_t = 0)]
        min_size: u64,

        /// Skip files larger than this many bytes
        #[arg(long)]
        max_size: Option<u64>,

        /// Only these extensions (comma-separated, e.g. "jpg,pdf")
        #[arg(long)]
        ext: Option<String>,

        /// Maximum directory depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Follow symbolic links
        #[arg(long)]
        follow_symlinks: bool,
    },

    /// Delete files marked in the ledger CSV
    Delete {
        /// Ledger CSV edited by hand
        #[arg(default_value = "duplicate_files_log.csv")]
        ledger: PathBuf,

        /// Show what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(long)]
        no_confirm: bool,

        /// Allow deleting every copy in a group
        #[arg(long)]
        allow_all_copies: bool,
    },
}

#[derive(Subcommand)]
enum ChatCommand {
    /// Scan the database and emit candidates as JSON
    Scan {
        /// State database (default: the editor's global storage)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PayrollCommand {
    /// Import sheet rows as time periods
    Import {
        #[command(flatten)]
        input: SheetInput,

        /// Only these employees ("A,B", or "Last, First|Other" for names with commas)
        #[arg(long)]
        employees: Option<String>,

        /// Report what would be inserted without writing
        #[arg(long)]
        diagnose: bool,

        /// Send only the core columns
        #[arg(long)]
        minimal: bool,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Print the employees on a sheet as JSON
    Employees {
        #[command(flatten)]
        input: SheetInput,
    },

    /// Re-book imported periods whose project names a plant or workshop task
    FixImported {
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Subcommand)]
enum ProjectsCommand {
    /// Upsert enabled jobs from a CSV export of the year table
    Sync {
        /// CSV export of the year table (e.g. 2026)
        export: PathBuf,

        /// Only this Job_Number
        #[arg(short, long, value_name = "PROJECT_NUMBER")]
        project: Option<String>,

        /// Delete every project first, then insert
        #[arg(long, conflicts_with = "project")]
        replace: bool,

        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Subcommand)]
enum PubspecCommand {
    /// Rewrite caret constraints to the latest published versions
    Bump {
        /// Manifest to update
        #[arg(default_value = "pubspec.yaml")]
        path: PathBuf,

        /// Print changes without writing
        #[arg(long)]
        dry_run: bool,

        /// Package registry
        #[arg(long, default_value = PUB_DEV)]
        registry: String,
    },
}

#[derive(Args)]
struct SheetInput {
    /// CSV export of the Allocated Week sheet
    #[arg(required_unless_present = "workbook")]
    sheet: Option<PathBuf>,

    /// Staff hours workbook (.xlsx/.xlsm), read directly
    #[arg(long, conflicts_with = "sheet", requires = "week")]
    workbook: Option<PathBuf>,

    /// Week N, read from the "Allocated Week (N)" tab
    #[arg(long, requires = "workbook")]
    week: Option<u32>,
}

impl SheetInput {
    fn load(&self) -> Result<(Vec<SheetRow>, String)> {
        match (&self.workbook, self.week, &self.sheet) {
            (Some(workbook), Some(week), _) => {
                let rows = read_workbook_week(workbook, week)?;
                Ok((rows, format!("{} '{}'", workbook.display(), week_sheet_name(week))))
            }
            (_, _, Some(sheet)) => Ok((read_sheet(open(sheet)?)?, sheet.display().to_string())),
            _ => Err(Error::Invalid("Pass a CSV sheet or --workbook with --week".to_string())),
        }
    }
}

#[derive(Args)]
struct RemoteArgs {
    /// Hosted project URL
    #[arg(long, env = "SUPABASE_URL", hide_env_values = true)]
    url: Option<String>,

    /// Service-role key
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    key: Option<String>,
}

impl RemoteArgs {
    fn connect(self) -> Result<RestRemote> {
        let config = RemoteConfig::from_parts(self.url, self.key)?;
        info!("Remote: {}", config.url);
        RestRemote::new(config)
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum AlgorithmArg {
    Blake3,
    Sha256,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Blake3 => HashAlgorithm::Blake3,
            AlgorithmArg::Sha256 => HashAlgorithm::Sha256,
        }
    }
}

fn parse_cutoff(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("expected YYYY-MM-DD [HH:MM[:SS]], got '{raw}'"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = logging::level_for(cli.verbose, cli.quiet);
    if let Err(e) = logging::init(level, cli.log_file.as_deref()) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Dupes(DupesCommand::Scan {
            paths,
            all_drives,
            output,
            format,
            algorithm,
            min_size,
            max_size,
            ext,
            max_depth,
            follow_symlinks,
        }) => {
            let config = ScanConfig {
                roots: paths,
                min_size,
                max_size,
                extensions: ext.as_deref().and_then(ScanConfig::parse_extensions),
                algorithm: algorithm.into(),
                max_depth,
                follow_symlinks,
            };
            cmd_dupes_scan(config, all_drives, &output, format.into())
        }
        Commands::Dupes(DupesCommand::Delete {
            ledger,
            dry_run,
            no_confirm,
            allow_all_copies,
        }) => cmd_dupes_delete(&ledger, dry_run, no_confirm, allow_all_copies),
        Commands::CopySince {
            source,
            destination,
            since,
            dry_run,
        } => cmd_copy_since(CopyConfig {
            source,
            destination,
            cutoff: since,
            dry_run,
        }),
        Commands::Chat(ChatCommand::Scan { db, output }) => cmd_chat_scan(db, output),
        Commands::Payroll(PayrollCommand::Import {
            input,
            employees,
            diagnose,
            minimal,
            remote,
        }) => {
            let options = ImportOptions {
                selected: employees.as_deref().map(parse_selection),
                minimal,
                diagnose,
            };
            cmd_payroll_import(&input, options, remote)
        }
        Commands::Payroll(PayrollCommand::Employees { input }) => cmd_payroll_employees(&input),
        Commands::Payroll(PayrollCommand::FixImported { remote }) => cmd_payroll_fix(remote),
        Commands::Projects(ProjectsCommand::Sync {
            export,
            project,
            replace,
            remote,
        }) => {
            let mode = if replace { SyncMode::Replace } else { SyncMode::Upsert };
            cmd_projects_sync(&export, project.as_deref(), mode, remote)
        }
        Commands::Pubspec(PubspecCommand::Bump {
            path,
            dry_run,
            registry,
        }) => cmd_pubspec_bump(&path, dry_run, &registry),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// PROGRESS HELPERS
// ============================================================================

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb.set_message(msg.to_string());
    pb
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| Error::io(path, e))
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N]: ");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

// ============================================================================
// COMMAND HANDLERS: files
// ============================================================================

fn cmd_dupes_scan(
    mut config: ScanConfig,
    all_drives: bool,
    output: &Path,
    format: OutputFormat,
) -> Result<ExitCode> {
    if config.roots.is_empty() {
        config.roots = if all_drives {
            local_and_network_mounts()
        } else {
            network_mounts()
        };
        if config.roots.is_empty() {
            return Err(Error::Invalid(
                "No network drives found. Use --all-drives or pass paths to scan.".to_string(),
            ));
        }
        let label = if all_drives { "all drives" } else { "network drives" };
        info!(
            "Scanning {}: {}",
            label,
            config
                .roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let show_progress = format == OutputFormat::Human;

    // Phase 1: Discovery
    let files = if show_progress {
        let sp = spinner("Collecting files...");
        let files = collect_files(&config, |n| {
            if n % 1000 == 0 {
                sp.set_message(format!("Scanned {} files...", n));
            }
        });
        sp.finish_with_message(format!("Scanned {} files", files.len()));
        files
    } else {
        collect_files(&config, |_| {})
    };

    // Phase 2: Hashing (parallel)
    let report = if show_progress {
        let pb = progress_bar(count_size_collisions(&files) as u64, "Hashing...");
        let report = group_duplicates(files, &config, |_| pb.inc(1));
        pb.finish_with_message("Done");
        report
    } else {
        group_duplicates(files, &config, |_| {})
    };

    print!("{}", format_report(&report, format)?);

    // A header-only ledger replaces any stale marks from an earlier scan.
    let file = File::create(output).map_err(|e| Error::io(output, e))?;
    write_ledger(&report, file)?;
    if !show_progress {
        return Ok(ExitCode::SUCCESS);
    }
    if report.groups.is_empty() {
        println!("No duplicates found.");
        println!("Wrote empty {}", output.display());
    } else {
        println!();
        println!("Wrote {}", output.display());
        println!(
            "Next: open the CSV, set mark_for_deletion to Y for files to remove, then run: housekeeper dupes delete {}",
            output.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_dupes_delete(
    ledger: &Path,
    dry_run: bool,
    no_confirm: bool,
    allow_all_copies: bool,
) -> Result<ExitCode> {
    if !ledger.is_file() {
        return Err(Error::Invalid(format!("CSV file not found: {}", ledger.display())));
    }
    let entries = read_ledger(open(ledger)?)?;
    let plan = plan_deletion(&entries, allow_all_copies);

    if !plan.protected.is_empty() {
        println!(
            "Keeping {} file(s): every copy in their group is marked (use --allow-all-copies to delete anyway):",
            plan.protected.len()
        );
        for path in plan.protected.iter().take(PREVIEW_LIMIT) {
            println!("  {}", path.display());
        }
        println!();
    }

    if plan.to_delete.is_empty() {
        println!("No files are marked for deletion (mark_for_deletion = Y, 1, yes, etc.).");
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} file(s) marked for deletion:", plan.to_delete.len());
    for path in plan.to_delete.iter().take(PREVIEW_LIMIT) {
        println!("  {}", path.display());
    }
    if plan.to_delete.len() > PREVIEW_LIMIT {
        println!("  ... and {} more.", plan.to_delete.len() - PREVIEW_LIMIT);
    }

    if dry_run {
        println!("Dry run: no files were deleted.");
        return Ok(ExitCode::SUCCESS);
    }

    if !no_confirm && !confirm("Proceed with deletion?")? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = delete_files(&plan.to_delete);
    println!("Deleted {} file(s).", outcome.deleted);
    if !outcome.failed.is_empty() {
        println!("Failed {} file(s):", outcome.failed.len());
        for (path, err) in outcome.failed.iter().take(FAILURE_LIMIT) {
            println!("  {}: {}", path.display(), err);
        }
        if outcome.failed.len() > FAILURE_LIMIT {
            println!("  ... and {} more.", outcome.failed.len() - FAILURE_LIMIT);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_copy_since(config: CopyConfig) -> Result<ExitCode> {
    info!("Source: {}", config.source.display());
    info!("Destination: {}", config.destination.display());
    info!("Cutoff: files modified after {}", config.cutoff);
    if config.dry_run {
        info!("Dry run: nothing will be copied");
    }

    let outcome = copy_since(&config)?;

    println!("Files copied:   {}", outcome.copied);
    println!("Files skipped:  {}", outcome.skipped);
    println!("Errors:         {}", outcome.errors);
    if !config.dry_run {
        println!("Bytes copied:   {}", format_size(outcome.bytes, BINARY));
    }

    Ok(if outcome.errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_chat_scan(db: Option<PathBuf>, output: Option<PathBuf>) -> Result<ExitCode> {
    let db = db
        .or_else(default_chat_db)
        .ok_or_else(|| Error::Config("no config directory; pass --db".to_string()))?;

    let sp = spinner("Searching chat history...");
    let scan = scan_database(&db);
    sp.finish_and_clear();
    let scan = scan?;

    let json = serde_json::to_string_pretty(&scan)?;
    match output {
        Some(path) => {
            fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
            eprintln!(
                "Searched {} items, {} candidates. Wrote {}",
                scan.total_items_searched,
                scan.candidates.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }

    if let Some(n) = scan.summary.prompts {
        eprintln!("Prompts: {}", n);
        for text in &scan.summary.prompt_previews {
            eprintln!("  {}", text);
        }
    }
    if let Some(n) = scan.summary.composers {
        eprintln!("Composers: {}", n);
    }
    if let Some(n) = scan.summary.generations {
        eprintln!("Generations: {}", n);
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// COMMAND HANDLERS: hosted database
// ============================================================================

fn cmd_payroll_employees(input: &SheetInput) -> Result<ExitCode> {
    let (rows, _) = input.load()?;
    let employees = list_employees(&rows);
    println!("{}", serde_json::json!({ "employees": employees }));
    Ok(ExitCode::SUCCESS)
}

fn cmd_payroll_import(input: &SheetInput, options: ImportOptions, remote: RemoteArgs) -> Result<ExitCode> {
    let (rows, source) = input.load()?;
    info!("Loaded {} data row(s) from {}", rows.len(), source);
    if rows.is_empty() {
        println!("No data rows in {}", source);
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(selected) = &options.selected {
        let on_sheet: HashSet<String> = list_employees(&rows).into_iter().collect();
        for name in selected.iter().filter(|n| !on_sheet.contains(*n)) {
            warn!("Selected employee not on sheet: {}", name);
        }
    }

    let remote = remote.connect()?;
    let outcome = import_rows(&remote, &rows, &options)?;

    let skips = [
        (outcome.skipped_short, "row(s) too short"),
        (outcome.skipped_placeholder, "row(s) (Employee is Site 1-20)"),
        (outcome.skipped_not_selected, "row(s) (employee not in selected list)"),
        (outcome.skipped_unknown_employee, "row(s) (employee not in users_setup)"),
        (outcome.skipped_no_date, "row(s) with no parseable date"),
        (outcome.skipped_no_hours, "row(s) with no hours"),
        (outcome.skipped_duplicate, "row(s) (already imported)"),
    ];
    for (count, reason) in skips {
        if count > 0 {
            println!("Skipped {} {}.", count, reason);
        }
    }
    println!(
        "Inserted {} time period(s).{}",
        outcome.inserted,
        if options.diagnose { " (diagnose: no DB write)" } else { "" }
    );
    if !options.diagnose {
        println!(
            "Breaks: {}, used fleet: {}, mobilised fleet: {}",
            outcome.breaks, outcome.used_fleet, outcome.mobilised_fleet
        );
    }
    if !outcome.errors.is_empty() {
        println!("Errors:");
        for e in &outcome.errors {
            println!("  {}", e);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_payroll_fix(remote: RemoteArgs) -> Result<ExitCode> {
    let remote = remote.connect()?;
    let outcome = fix_imported(&remote)?;

    if outcome.examined == 0 {
        println!("No imported time_periods with project_id found. Nothing to fix.");
        return Ok(ExitCode::SUCCESS);
    }
    println!("Found {} imported time_period(s) with project_id set.", outcome.examined);
    println!(
        "Fix-imported: updated {} row(s) to large_plant_id, {} row(s) to workshop_tasks_id.",
        outcome.updated_plant, outcome.updated_workshop
    );
    if outcome.updated_plant == 0 && outcome.updated_workshop == 0 && !outcome.unmatched.is_empty() {
        println!(
            "Project short_description(s) on imported rows: {:?}",
            outcome.unmatched
        );
        println!("A match needs the short_description to equal a plant number, plant description or workshop task.");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_projects_sync(
    export: &Path,
    project: Option<&str>,
    mode: SyncMode,
    remote: RemoteArgs,
) -> Result<ExitCode> {
    match project {
        Some(p) => info!("Starting single project sync: {}", p),
        None => info!("Starting full project sync from {}", export.display()),
    }

    let records = read_export(open(export)?)?;
    let enabled = select_enabled(records, project)?;
    if enabled.is_empty() {
        warn!("No active projects found (only projects with Enabled set are synced)");
        return Ok(ExitCode::SUCCESS);
    }
    info!("Read {} active project(s)", enabled.len());

    let remote = remote.connect()?;
    let outcome = sync_projects(&remote, &enabled, mode)?;

    println!("Summary:");
    if let Some(p) = project {
        println!("  Project number:          {}", p);
    }
    println!("  Projects read:           {}", outcome.read);
    println!("  Skipped (no number):     {}", outcome.skipped);
    println!("  Repeated numbers:        {}", outcome.duplicates);
    println!("  Updated:                 {}", outcome.updated);
    println!("  Inserted:                {}", outcome.inserted);
    println!("  Errors:                  {}", outcome.errors);

    Ok(if outcome.errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_pubspec_bump(path: &Path, dry_run: bool, registry: &str) -> Result<ExitCode> {
    let source = PubDevSource::with_base(registry)?;

    let sp = spinner("Looking up latest versions...");
    let changes = bump_file(path, &source, dry_run);
    sp.finish_and_clear();
    let changes = changes?;

    if changes.is_empty() {
        println!("All caret dependencies are up to date.");
        return Ok(ExitCode::SUCCESS);
    }
    for change in &changes {
        println!("  {}: ^{} -> ^{}", change.name, change.from, change.to);
    }
    if dry_run {
        println!("Dry run: {} not modified.", path.display());
    } else {
        println!("Versions updated in {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}
