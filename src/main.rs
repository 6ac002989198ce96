use clap::{Parser, Subcommand};
use copytree::app_logic::{APP_NAME, CopyTreeApp};
use copytree::core::{
    ClearConfirmation, ConfigManagerOperations, CoreConfigManager, CoreContentClassifier,
    CoreExportPacker, CoreFileSystemScanner, CoreStateManager, CoreTikTokenCounter,
    KeyValueSelectionPersistence, RefreshSignal, html_export,
};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const SEGMENT_SEPARATOR: char = '\u{c}';

#[derive(Parser)]
#[command(name = "copytree")]
#[command(about = "Select files in a directory tree and export them as size-bounded text segments")]
#[command(version)]
struct Cli {
    /// Workspace root folder; may be given more than once. Defaults to the current directory.
    #[arg(long = "workspace", global = true)]
    workspaces: Vec<PathBuf>,

    /// Settings file to use instead of the one in the configuration directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Selection state file to use instead of the per-workspace default.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// More log output; repeat for trace level.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the tree with selection marks.
    Tree { path: Option<PathBuf> },
    /// Flip the selection mark of a file.
    Toggle { path: PathBuf },
    /// Mark a file or folder as selected.
    Select { path: PathBuf },
    /// Remove a selection mark.
    Deselect { path: PathBuf },
    /// List the selected paths.
    List,
    /// Remove every selection mark.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Write the HTML export of the selection.
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the packed segments separated by form feeds.
    Segments,
    /// Write the plain-text copy of the selection.
    Copy {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rename a file or folder, keeping its selection marks.
    Rename { from: PathBuf, to: PathBuf },
    /// Delete a file or folder.
    Delete { path: PathBuf },
    /// Create an empty file.
    NewFile { path: PathBuf },
    /// Create a folder.
    NewFolder { path: PathBuf },
    /// Show or change the export settings.
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Rebuild the tree from disk.
    Refresh,
    /// Collapse every folder.
    CollapseAll,
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        character_limit: Option<usize>,
        #[arg(long)]
        start_template: Option<String>,
        #[arg(long)]
        continuation_template: Option<String>,
        #[arg(long)]
        end_template: Option<String>,
        #[arg(long)]
        copy_template: Option<String>,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    if let Err(e) = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

/*
 * Turns a command-line path into the absolute form the tree uses. Paths that
 * do not exist yet (rename targets, new files) are resolved through their
 * parent.
 */
fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    let absolute = std::path::absolute(path)?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent) {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(absolute),
        },
        _ => Ok(absolute),
    }
}

fn workspace_roots(cli: &Cli) -> io::Result<Vec<PathBuf>> {
    if cli.workspaces.is_empty() {
        return Ok(vec![fs::canonicalize(".")?]);
    }
    cli.workspaces.iter().map(fs::canonicalize).collect()
}

fn confirm_clear() -> io::Result<ClearConfirmation> {
    print!("Clear the whole selection? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if matches!(answer.trim(), "y" | "Y" | "yes") {
        Ok(ClearConfirmation::Confirmed)
    } else {
        Ok(ClearConfirmation::Declined)
    }
}

fn write_output(output: Option<&Path>, text: &str) -> io::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            log::info!("CLI: Wrote {} bytes to {path:?}.", text.len());
            Ok(())
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()
        }
    }
}

fn report(signals: &[RefreshSignal]) {
    for signal in signals {
        log::debug!("CLI: Refresh {signal:?}");
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let roots = workspace_roots(&cli)?;
    let config_manager = Arc::new(CoreConfigManager::new(APP_NAME, cli.config.clone()));
    let settings = config_manager.load_settings()?;

    let state_manager = match (&cli.state, roots.first()) {
        (Some(path), _) => CoreStateManager::new(path.clone()),
        (None, Some(root)) => CoreStateManager::for_workspace(APP_NAME, root)?,
        (None, None) => return Err("no workspace folder given".into()),
    };
    log::debug!("CLI: Selection state in {:?}.", state_manager.file_path());

    let scanner = Arc::new(
        CoreFileSystemScanner::with_exclude_patterns(&settings.exclude_patterns)?
            .respect_gitignore(settings.respect_gitignore),
    );
    let classifier = Arc::new(CoreContentClassifier::new(settings.max_text_file_size));
    let mut app = CopyTreeApp::new(
        settings,
        roots,
        scanner,
        Arc::new(KeyValueSelectionPersistence::new(Arc::new(state_manager))),
        config_manager,
        Arc::new(CoreExportPacker::new(classifier)),
        Arc::new(CoreTikTokenCounter::new()),
    )?;

    match cli.command {
        Command::Tree { path } => {
            let start = path.as_deref().map(absolutize).transpose()?;
            for (depth, view) in app.tree_walk(start.as_deref())? {
                println!("{}", view.to_text_line(depth));
            }
        }
        Command::Toggle { path } => report(&app.toggle_select(&absolutize(&path)?)?),
        Command::Select { path } => report(&app.select(&absolutize(&path)?)?),
        Command::Deselect { path } => report(&app.deselect(&absolutize(&path)?)?),
        Command::List => {
            for path in app.selected_paths() {
                println!("{}", path.display());
            }
        }
        Command::Clear { yes } => {
            let confirmation = if yes {
                ClearConfirmation::Confirmed
            } else {
                confirm_clear()?
            };
            report(&app.clear_all(confirmation)?);
        }
        Command::Export { output } => {
            let html = app.export_html(&html_export::current_timestamp())?;
            write_output(output.as_deref(), &html)?;
        }
        Command::Segments => {
            let texts: Vec<String> = app.export_segments()?.iter().map(|s| s.text()).collect();
            write_output(None, &texts.join(&SEGMENT_SEPARATOR.to_string()))?;
        }
        Command::Copy { output } => {
            let text = app.copy_text()?;
            write_output(output.as_deref(), &text)?;
        }
        Command::Rename { from, to } => {
            report(&app.rename(&absolutize(&from)?, &absolutize(&to)?)?)
        }
        Command::Delete { path } => report(&app.delete(&absolutize(&path)?)?),
        Command::NewFile { path } => report(&app.create_file(&absolutize(&path)?)?),
        Command::NewFolder { path } => report(&app.create_folder(&absolutize(&path)?)?),
        Command::Config { action } => match action {
            None | Some(ConfigAction::Show) => {
                println!("{}", serde_json::to_string_pretty(app.settings())?);
            }
            Some(ConfigAction::Set {
                character_limit,
                start_template,
                continuation_template,
                end_template,
                copy_template,
            }) => {
                let mut settings = app.settings().clone();
                if character_limit.is_some() {
                    settings.character_limit = character_limit;
                }
                if let Some(template) = start_template {
                    settings.export_start_template = template;
                }
                if let Some(template) = continuation_template {
                    settings.export_continuation_template = template;
                }
                if let Some(template) = end_template {
                    settings.export_end_template = template;
                }
                if let Some(template) = copy_template {
                    settings.copy_template = template;
                }
                app.update_settings(settings)?;
            }
        },
        Command::Refresh => report(&app.refresh()),
        Command::CollapseAll => report(&app.collapse_all()),
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("CLI: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
