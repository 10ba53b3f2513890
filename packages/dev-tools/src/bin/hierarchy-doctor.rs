//! Hierarchy Doctor - validate, repair and inspect nested-set databases
//!
//! Standalone diagnostic tool for Canopy databases. It opens the same libsql
//! file the application uses and runs the store's integrity operations.
//!
//! # Usage
//!
//! ```bash
//! # Check every kind (exit code 1 when violations are found)
//! cargo run --bin hierarchy-doctor -- validate
//!
//! # Renumber one kind from its parent references
//! cargo run --bin hierarchy-doctor -- rebuild menu --db ./data/canopy.db
//!
//! # Print the trees of one kind with their intervals
//! cargo run --bin hierarchy-doctor -- dump taxonomy
//!
//! # Subcommand and flag reference
//! cargo run --bin hierarchy-doctor -- --help
//! ```
//!
//! # Configuration
//!
//! The database path comes from `--db`, then `HIERARCHY_DB_PATH`, then the
//! default (`canopy.db`). Logging follows `RUST_LOG` (default `info`).

use canopy_core::config::HierarchyConfig;
use canopy_core::models::{HierarchyKind, TreeNode};
use canopy_core::services::{HierarchyStore, NestedSetStore};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "hierarchy-doctor")]
#[command(version)]
#[command(about = "Validate, repair and inspect Canopy hierarchy databases")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database file (defaults to canopy.db)
    #[arg(long, global = true, env = "HIERARCHY_DB_PATH")]
    db: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Check every invariant; exits with 1 when violations are found
    Validate {
        /// Kind to check (all kinds when omitted)
        #[arg(value_parser = HierarchyKind::from_str)]
        kind: Option<HierarchyKind>,
    },

    /// Renumber from parent references, promoting orphans to roots
    Rebuild {
        /// Kind to rebuild (all kinds when omitted)
        #[arg(value_parser = HierarchyKind::from_str)]
        kind: Option<HierarchyKind>,
    },

    /// Print each tree with its intervals and attributes
    Dump {
        /// Kind to print (all kinds when omitted)
        #[arg(value_parser = HierarchyKind::from_str)]
        kind: Option<HierarchyKind>,
    },
}

impl Command {
    fn kinds(&self) -> Vec<HierarchyKind> {
        let kind = match self {
            Command::Validate { kind } | Command::Rebuild { kind } | Command::Dump { kind } => kind,
        };
        match kind {
            Some(kind) => vec![*kind],
            None => HierarchyKind::ALL.to_vec(),
        }
    }
}

fn print_tree(tree: &TreeNode, indent: usize) {
    let node = &tree.node;
    println!(
        "{}- {} [{}, {}] {}",
        "  ".repeat(indent),
        node.id,
        node.left,
        node.right,
        node.attributes
    );
    for child in &tree.children {
        print_tree(child, indent + 1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = HierarchyConfig::from_env();
    if let Some(path) = cli.db {
        config.database_path = path;
    }
    let store = NestedSetStore::open(config).await?;
    tracing::info!(
        path = %store.config().database_path.display(),
        verify_mutations = store.config().verify_mutations,
        "Opened hierarchy database"
    );

    let mut healthy = true;
    for kind in cli.command.kinds() {
        match cli.command {
            Command::Validate { .. } => {
                let violations = store.validate(kind).await?;
                if violations.is_empty() {
                    println!("✅ {}: {} node(s), consistent", kind, store.count(kind).await?);
                } else {
                    healthy = false;
                    let affected: HashSet<_> =
                        violations.iter().filter_map(|v| v.node_id()).collect();
                    println!(
                        "❌ {}: {} violation(s) on {} node(s)",
                        kind,
                        violations.len(),
                        affected.len()
                    );
                    for violation in &violations {
                        println!("   {}", violation);
                    }
                }
            }
            Command::Rebuild { .. } => {
                let report = store.rebuild(kind).await?;
                println!(
                    "🔧 {}: examined {}, changed {}, orphans promoted {}",
                    kind, report.examined, report.changed, report.orphans_promoted
                );
            }
            Command::Dump { .. } => {
                println!("{}:", kind);
                for root in store.roots(kind).await? {
                    let tree = store.tree(kind, root.id).await?;
                    print_tree(&tree, 1);
                }
            }
        }
    }

    Ok(healthy)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if run(cli).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
