use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use schematic_patcher::anchor::{insert_after_last, insert_before_first, Placement};
use schematic_patcher::apply::Document;
use schematic_patcher::config::{
    apply_patches, check_patches, discover_patch_files, load_from_path, preview_patches,
    ApplicationError, PatchConfig, PatchResult,
};
use schematic_patcher::host::{DiskHost, Host};
use schematic_patcher::syntax::{find_nodes, NodeQuery, SyntaxKind};
use schematic_patcher::workspace::WORKSPACE_FILE;
use similar::TextDiff;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schematic-patcher")]
#[command(about = "Structured source patching for Angular/TypeScript workspaces", long_about = None)]
#[command(version)]
struct Cli {
    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patches to a workspace
    Apply {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific patch file to apply (otherwise applies all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report which patches are applied without modifying files
    Check {
        /// Path to workspace root (auto-detected if not specified)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Specific patch file to check (otherwise checks all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,
    },

    /// Print the nodes of a kind found in a file
    Query {
        file: PathBuf,

        #[arg(short, long)]
        kind: SyntaxKind,

        /// Only nodes whose source text is exactly this
        #[arg(short, long)]
        text: Option<String>,

        #[arg(short, long)]
        max: Option<usize>,

        /// Keep searching inside matched nodes
        #[arg(short, long)]
        recursive: bool,
    },

    /// Print the insertion offset an anchor resolves to
    Anchor {
        file: PathBuf,

        #[arg(short, long)]
        kind: SyntaxKind,

        /// Insert after the last match (default)
        #[arg(long, conflicts_with = "before_first")]
        after_last: bool,

        /// Insert before the first match
        #[arg(long)]
        before_first: bool,

        /// Look for this kind inside the selected node
        #[arg(long)]
        drill: Option<SyntaxKind>,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,

        /// Offset to use when nothing matches
        #[arg(long, allow_hyphen_values = true)]
        fallback: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Apply {
            workspace,
            patches,
            dry_run,
            diff,
        } => cmd_apply(workspace, patches, dry_run, diff),

        Commands::Check { workspace, patches } => cmd_check(workspace, patches),

        Commands::Query {
            file,
            kind,
            text,
            max,
            recursive,
        } => cmd_query(&file, kind, text, max, recursive),

        Commands::Anchor {
            file,
            kind,
            after_last: _,
            before_first,
            drill,
            offset,
            fallback,
        } => cmd_anchor(&file, kind, before_first, drill, offset, fallback),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve workspace path.
///
/// Priority order:
/// 1. Explicit --workspace flag
/// 2. SCHEMATIC_WORKSPACE environment variable
/// 3. Closest ancestor of the current directory holding angular.json
fn resolve_workspace(cli_workspace: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_workspace {
        return path
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", path.display()));
    }

    if let Ok(env_path) = env::var("SCHEMATIC_WORKSPACE") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: SCHEMATIC_WORKSPACE is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    let current = env::current_dir()?;
    if let Some(found) = current
        .ancestors()
        .find(|dir| dir.join(WORKSPACE_FILE).is_file())
    {
        println!(
            "{}",
            format!("Auto-detected workspace: {}", found.display()).dimmed()
        );
        return Ok(found.to_path_buf());
    }

    anyhow::bail!(
        "{}\n{}\n  {}\n  {}",
        "Could not find an Angular workspace.".red(),
        "Try one of:".bold(),
        "1. Specify explicitly: schematic-patcher apply --workspace /path/to/app",
        "2. Set environment variable: export SCHEMATIC_WORKSPACE=/path/to/app"
    )
}

fn patch_files(workspace: &Path, patches: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    if let Some(path) = patches {
        return Ok(vec![path]);
    }
    let dir = workspace.join("patches");
    if !dir.is_dir() {
        anyhow::bail!("No patches directory at {}", dir.display());
    }
    let files = discover_patch_files(&dir)?;
    if files.is_empty() {
        anyhow::bail!("No .toml patch files found in {}", dir.display());
    }
    Ok(files)
}

fn target_files(config: &PatchConfig) -> BTreeSet<&str> {
    config.patches.iter().map(|p| p.file.as_str()).collect()
}

/// Print a unified diff of one file, three lines of context per hunk.
fn print_diff(file: &str, before: &str, after: &str) {
    let diff = TextDiff::from_lines(before, after);
    println!();
    for line in diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{file}"), &format!("b/{file}"))
        .to_string()
        .lines()
    {
        let styled = if line.starts_with("+++") || line.starts_with("---") {
            line.bold()
        } else if line.starts_with("@@") {
            line.cyan()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else {
            line.normal()
        };
        println!("{}", styled);
    }
}

/// Running totals across patch files.
#[derive(Default)]
struct Tally {
    applied: usize,
    skipped: usize,
    failed: usize,
}

impl Tally {
    fn record(
        &mut self,
        patch_id: &str,
        result: Result<PatchResult, ApplicationError>,
        dry_run: bool,
    ) {
        match result {
            Ok(PatchResult::Applied { file }) => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                println!("{} {}: {} to {}", "✓".green(), patch_id, verb, file.display());
                self.applied += 1;
            }
            Ok(PatchResult::AlreadyApplied { file }) => {
                println!(
                    "{} {}: Already applied to {}",
                    "⊙".yellow(),
                    patch_id,
                    file.display()
                );
                self.skipped += 1;
            }
            Ok(PatchResult::Rejected { file, reason }) => {
                eprintln!(
                    "{} {}: Rejected in {} - {}",
                    "✗".red(),
                    patch_id,
                    file.display(),
                    reason
                );
                self.failed += 1;
            }
            Err(error) => {
                eprintln!("{} {}: Error - {}", "✗".red(), patch_id, error);
                explain(&error);
                self.failed += 1;
            }
        }
    }

    fn print(&self) {
        println!("{}", "Summary:".bold());
        println!("  {} applied", self.applied.to_string().green());
        println!("  {} already applied", self.skipped.to_string().yellow());
        println!("  {} failed", self.failed.to_string().red());
    }
}

/// Hints for failures that usually mean the target file drifted.
fn explain(error: &ApplicationError) {
    let hint = match error {
        ApplicationError::Finder { source, .. } => format!(
            "CONFLICT: {source}\n  Action: narrow the scope (kind, name or text) until it matches one node"
        ),
        ApplicationError::Anchor { .. } => {
            "CONFLICT: nothing to anchor on\n  Action: give the anchor a fallback".to_string()
        }
        _ => return,
    };
    for line in hint.lines() {
        eprintln!("  {}", line.red());
    }
}

fn read_all<H: Host>(host: &H, files: &BTreeSet<&str>) -> BTreeMap<String, String> {
    files
        .iter()
        .filter_map(|file| {
            let text = host.read(Path::new(file)).ok()??;
            Some((file.to_string(), text))
        })
        .collect()
}

fn cmd_apply(
    workspace: Option<PathBuf>,
    patches: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let patch_files = patch_files(&workspace, patches)?;
    let mut host = DiskHost::new(&workspace)?;

    println!("Workspace: {}", workspace.display());
    if dry_run {
        println!("{}", "[DRY RUN - nothing will be written]".cyan());
    }
    println!();

    let mut tally = Tally::default();
    for patch_file in patch_files {
        println!("{} {}", "Patch file".bold(), patch_file.display());
        let config = load_from_path(&patch_file)?;
        let files = target_files(&config);
        let before = read_all(&host, &files);

        let (results, after) = if dry_run {
            let (results, preview) = preview_patches(&config, &host);
            (results, read_all(&preview, &files))
        } else {
            let results = apply_patches(&config, &mut host);
            (results, read_all(&host, &files))
        };

        for (patch_id, result) in results {
            tally.record(&patch_id, result, dry_run);
        }

        if show_diff {
            for (file, old) in &before {
                match after.get(file) {
                    Some(new) if new != old => print_diff(file, old, new),
                    _ => {}
                }
            }
        }
        println!();
    }

    tally.print();
    if tally.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_group(symbol: ColoredString, label: ColoredString, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    println!("{} {} ({} patches)", symbol, label, entries.len());
    for entry in entries {
        println!("  - {}", entry);
    }
    println!();
}

fn cmd_check(workspace: Option<PathBuf>, patches: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let patch_files = patch_files(&workspace, patches)?;
    let host = DiskHost::new(&workspace)?;

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut failing = Vec::new();
    for patch_file in patch_files {
        let config = load_from_path(&patch_file)?;
        for (patch_id, result) in check_patches(&config, &host) {
            match result {
                Ok(PatchResult::AlreadyApplied { .. }) => applied.push(patch_id),
                Ok(PatchResult::Applied { .. }) => pending.push(patch_id),
                Ok(PatchResult::Rejected { reason, .. }) => {
                    failing.push(format!("{patch_id} ({})", reason.dimmed()))
                }
                Err(error) => failing.push(format!("{patch_id} ({})", error.to_string().dimmed())),
            }
        }
    }

    print_group("✓".green(), "APPLIED".green().bold(), &applied);
    print_group("⊙".yellow(), "NOT APPLIED".yellow().bold(), &pending);
    print_group("✗".red(), "FAILING".red().bold(), &failing);
    Ok(())
}

fn load_document(file: &Path) -> Result<Document> {
    let text =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    Ok(Document::new(file, text))
}

fn cmd_query(
    file: &Path,
    kind: SyntaxKind,
    text: Option<String>,
    max: Option<usize>,
    recursive: bool,
) -> Result<()> {
    let document = load_document(file)?;
    let tree = document.parse()?;
    let query = NodeQuery {
        kind,
        text,
        max,
        recursive,
    };

    let nodes = find_nodes(Some(tree.root()), &query);
    for node in &nodes {
        let first_line = node.text().lines().next().unwrap_or("");
        println!(
            "{} {}..{} {}",
            node.kind().to_string().cyan(),
            node.start(),
            node.end(),
            first_line
        );
    }
    println!("{}", format!("{} match(es)", nodes.len()).dimmed());
    Ok(())
}

fn cmd_anchor(
    file: &Path,
    kind: SyntaxKind,
    before_first: bool,
    drill: Option<SyntaxKind>,
    offset: i64,
    fallback: Option<i64>,
) -> Result<()> {
    let document = load_document(file)?;
    let tree = document.parse()?;
    let nodes = find_nodes(Some(tree.root()), &NodeQuery::new(kind));
    let placement = Placement {
        drill,
        offset,
        fallback,
    };

    let content = format!("<{kind}>");
    let pos = if before_first {
        insert_before_first(&nodes, &content, &placement)?
    } else {
        insert_after_last(&nodes, &content, &placement)?
    };
    println!("{}", pos);
    Ok(())
}
