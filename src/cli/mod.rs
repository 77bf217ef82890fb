//! Command-line interface via `clap`.
//!
//! Every subcommand except `serve` calls the same handler the matching MCP
//! tool uses and prints its response envelope.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use serde_json::Value;

use crate::compat::catalog::{hazards, rules, PatternRule};
use crate::config::schema::PresetName;
use crate::error::{MigrateError, Result};
use crate::mcp::envelope::Envelope;
use crate::mcp::{tools_analysis, tools_convert, ToolContext};
use crate::types::Severity;

#[derive(Parser, Debug)]
#[command(
    name = "pymigrate",
    version,
    about = "Python 2 to 3 migration: compatibility scanning, reports and safe conversion",
    long_about = "pymigrate finds Python 2 constructs, estimates migration effort, converts files in place behind verified backups and validates the result.\n\nConfiguration precedence: --config > .pymigrate.yaml > user config > preset defaults. PYMIGRATE_PRESET overrides the preset.",
    after_help = "Examples:\n  pymigrate report src/\n  pymigrate convert src/legacy.py --dry-run\n  pymigrate validate src/legacy.py\n  pymigrate serve",
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(long, global = true, help = "Explicit config file (YAML)")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Preset override: full|read-only|analysis")]
    pub preset: Option<String>,
    #[arg(long, global = true, action = clap::ArgAction::SetTrue, help = "Print compact single-line JSON")]
    pub json: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Scan specific files for Python 2 constructs")]
    Scan {
        #[arg(required = true, help = "Files to scan")]
        files: Vec<String>,
    },
    #[command(about = "Scan every Python file under a directory")]
    Analyze {
        #[arg(default_value = ".", help = "Directory to scan")]
        directory: String,
        #[arg(long, help = "Include glob (repeatable, default **/*.py)")]
        include: Vec<String>,
        #[arg(long, help = "Extra exclude glob (repeatable)")]
        exclude: Vec<String>,
    },
    #[command(about = "Build a migration plan with effort estimate and file buckets")]
    Report {
        #[arg(default_value = ".", help = "Project directory")]
        directory: String,
    },
    #[command(
        about = "Convert a file in place",
        long_about = "Run the configured rewrite engine on a .py file. A verified <file>.py2.bak backup is written first unless --no-backup is set."
    )]
    Convert {
        file: String,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Do not write a .py2.bak backup")]
        no_backup: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Report changes without writing")]
        dry_run: bool,
    },
    #[command(about = "Validate a converted file")]
    Validate { file: String },
    #[command(about = "Compare an original file with its converted version")]
    Compare { original: String, converted: String },
    #[command(about = "Check whether a file or snippet parses as Python 3")]
    CheckSyntax {
        #[arg(conflicts_with = "code", required_unless_present = "code")]
        file: Option<String>,
        #[arg(long, help = "Inline code instead of a file")]
        code: Option<String>,
    },
    #[command(about = "List compatibility and review rules")]
    Rules {
        #[arg(long, help = "Only this category (e.g. iterators)")]
        category: Option<String>,
    },
    #[command(about = "Print the migration guide for a topic")]
    Guide {
        #[arg(help = "print|unicode|dict_methods|exceptions|division|imports")]
        topic: String,
    },
    #[command(about = "Run the MCP server on stdio")]
    Serve,
}

/// Layered config for the current directory plus CLI overrides.
pub fn build_context(cli: &Cli) -> Result<ToolContext> {
    let base = std::env::current_dir()?;
    let mut config = crate::config::load_config(&base, cli.config.as_deref())?;
    if let Some(name) = &cli.preset {
        config.preset = PresetName::from_str_loose(name)
            .ok_or_else(|| MigrateError::Config(format!("unknown preset `{name}`")))?;
    }
    Ok(ToolContext::new(config, base))
}

/// Tool name and handler result for a non-`serve` command.
pub fn dispatch(ctx: &ToolContext, cmd: &Commands) -> (&'static str, Result<Value>) {
    fn opt(v: &[String]) -> Option<Vec<String>> {
        (!v.is_empty()).then(|| v.to_vec())
    }
    match cmd {
        Commands::Scan { files } => ("scan_compat", tools_analysis::handle_scan_compat(ctx, files)),
        Commands::Analyze {
            directory,
            include,
            exclude,
        } => (
            "analyze_directory",
            tools_analysis::handle_analyze_directory(ctx, directory, opt(include), opt(exclude)),
        ),
        Commands::Report { directory } => (
            "migration_report",
            tools_analysis::handle_migration_report(ctx, directory),
        ),
        Commands::Convert {
            file,
            no_backup,
            dry_run,
        } => (
            "convert_file",
            tools_convert::handle_convert_file(ctx, file, Some(!no_backup), Some(*dry_run)),
        ),
        Commands::Validate { file } => (
            "validate_conversion",
            tools_analysis::handle_validate(ctx, file),
        ),
        Commands::Compare {
            original,
            converted,
        } => (
            "conversion_report",
            tools_analysis::handle_conversion_report(ctx, original, converted),
        ),
        Commands::CheckSyntax { file, code } => ("check_syntax", check_syntax(ctx, file, code)),
        Commands::Rules { category } => (
            "list_rules",
            tools_analysis::handle_list_rules(category.as_deref()),
        ),
        Commands::Guide { topic } => ("get_migration_guide", tools_analysis::handle_guide(topic)),
        Commands::Serve => (
            "serve",
            Err(MigrateError::InvalidInput(
                "serve runs the MCP server and has no envelope".into(),
            )),
        ),
    }
}

fn check_syntax(ctx: &ToolContext, file: &Option<String>, code: &Option<String>) -> Result<Value> {
    let text = match (file, code) {
        (_, Some(code)) => code.clone(),
        (Some(file), None) => {
            let path = crate::observability::resolve_path(file, &ctx.base)?;
            ctx.fs
                .read_file(&path, ctx.config.limits.max_file_size_bytes)?
        }
        (None, None) => {
            return Err(MigrateError::InvalidInput(
                "pass a file or --code".into(),
            ))
        }
    };
    tools_analysis::handle_check_syntax(ctx, &text)
}

/// Run a non-`serve` command and print its output. Returns the exit code.
pub fn run(cli: &Cli) -> i32 {
    let ctx = match build_context(cli) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("{} {err}", style("error:").red().bold());
            return 2;
        }
    };
    let (tool, result) = dispatch(&ctx, &cli.cmd);

    if !cli.json {
        match (&cli.cmd, &result) {
            (Commands::Rules { category }, Ok(_)) => {
                print_rules(category.as_deref());
                return 0;
            }
            (Commands::Guide { .. }, Ok(data)) => {
                println!("{}", data["guide"].as_str().unwrap_or_default());
                return 0;
            }
            _ => {}
        }
    }

    let envelope = Envelope::from_result(tool, result, ctx.metadata());
    if cli.json {
        println!("{}", envelope.to_json_compact());
    } else {
        println!("{}", envelope.to_json());
    }
    if envelope.is_success() {
        0
    } else {
        1
    }
}

fn severity_label(severity: Severity) -> console::StyledObject<&'static str> {
    match severity {
        Severity::Error => style(severity.as_str()).red(),
        Severity::Warning => style(severity.as_str()).yellow(),
        Severity::Info => style(severity.as_str()).cyan(),
    }
}

fn print_rules(category: Option<&str>) {
    let keep = |r: &&PatternRule| category.map_or(true, |c| r.category.as_str() == c.trim());
    let sections = [("Compatibility rules", rules()), ("Review hazards", hazards())];
    for (title, set) in sections {
        let picked: Vec<&PatternRule> = set.iter().filter(keep).collect();
        if picked.is_empty() {
            continue;
        }
        println!("{}", style(title).bold().underlined());
        for rule in picked {
            println!(
                "  {:<14} {:<26} {:<8} {}",
                style(rule.id).dim(),
                rule.name,
                severity_label(rule.severity),
                rule.description
            );
        }
        println!();
    }
}
