mod parser;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bc_parser", about = "Building code markdown → section hierarchy parser")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a markdown document and emit the section hierarchy as JSON
    Parse {
        /// Markdown file produced by the PDF rendering step
        input: PathBuf,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Top numeric group of the document ("9" for Part 9)
        #[arg(long, default_value = "9")]
        root: String,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Section counts by depth
    Stats {
        input: PathBuf,
        #[arg(long, default_value = "9")]
        root: String,
    },
    /// Flat listing of parsed sections
    Overview {
        input: PathBuf,
        #[arg(long, default_value = "9")]
        root: String,
        /// Only show sections at this depth (2 = top-level, 4 = Articles)
        #[arg(short, long)]
        depth: Option<usize>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            input,
            output,
            root,
            pretty,
        } => {
            let text = read_input(&input)?;
            let outcome = parser::parse_document(&text, &root);

            let json = if pretty {
                serde_json::to_string_pretty(&outcome.hierarchy)?
            } else {
                serde_json::to_string(&outcome.hierarchy)?
            };

            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!(
                        "Parsed {} sections ({} orphans dropped) → {}",
                        outcome.sections.len(),
                        outcome.orphans.len(),
                        path.display()
                    );
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Commands::Stats { input, root } => {
            let text = read_input(&input)?;
            let outcome = parser::parse_document(&text, &root);

            println!("Total sections: {}", outcome.sections.len());

            let mut level_counts: BTreeMap<usize, usize> = BTreeMap::new();
            for section in &outcome.sections {
                *level_counts.entry(section.depth()).or_insert(0) += 1;
            }
            println!("Section breakdown by depth:");
            for (depth, count) in &level_counts {
                println!("  Level {}: {} sections", depth, count);
            }

            if !outcome.orphans.is_empty() {
                println!("Orphans dropped: {}", outcome.orphans.len());
                for number in &outcome.orphans {
                    println!("  {}", number);
                }
            }
            Ok(())
        }
        Commands::Overview {
            input,
            root,
            depth,
            limit,
        } => {
            let text = read_input(&input)?;
            let outcome = parser::parse_document(&text, &root);

            let rows: Vec<_> = outcome
                .sections
                .iter()
                .filter(|s| depth.map_or(true, |d| s.depth() == d))
                .take(limit)
                .collect();
            if rows.is_empty() {
                println!("No sections found.");
                return Ok(());
            }

            println!(
                "{:<14} | {:<44} | {:>6} | {:>4}",
                "Number", "Title", "Tables", "Refs"
            );
            println!("{}", "-".repeat(78));
            for section in &rows {
                println!(
                    "{:<14} | {:<44} | {:>6} | {:>4}",
                    section.number,
                    truncate(&section.title, 44),
                    section.tables.len(),
                    section.referenced_text.len()
                );
            }
            println!("\n{} sections shown", rows.len());
            Ok(())
        }
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
