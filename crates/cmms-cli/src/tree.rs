//! # Tree Subcommand
//!
//! Loads an equipment export (a JSON array of records with at least `id`,
//! `name` and `parent`), rebuilds the nested-set index, and prints the
//! forest with each node's coordinates. Parent pointers that loop or point
//! at missing rows are reported and the command exits with 1.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use cmms_state::{EquipmentTree, HierarchyError, RawNode};

/// Arguments for the `cmms tree` subcommand.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Path to the JSON equipment export.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Only validate; print nothing on success.
    #[arg(long)]
    pub check: bool,
}

/// Execute the tree subcommand.
pub fn run_tree(args: &TreeArgs) -> Result<u8> {
    let raw = std::fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let rows: Vec<RawNode> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.path.display()))?;
    let count = rows.len();

    let tree = match EquipmentTree::from_raw(rows) {
        Ok(tree) => tree,
        Err(HierarchyError::CorruptTree { unreachable }) => {
            eprintln!(
                "{}: {} of {count} node(s) unreachable from any root:",
                args.path.display(),
                unreachable.len()
            );
            for id in unreachable {
                eprintln!("  {id}");
            }
            return Ok(1);
        }
        Err(e) => {
            eprintln!("{}: {e}", args.path.display());
            return Ok(1);
        }
    };

    tracing::info!(nodes = tree.len(), roots = tree.roots().len(), "equipment tree indexed");

    if !args.check {
        print!("{}", render(&tree));
    }
    Ok(0)
}

/// Render the forest in preorder, two spaces of indent per level.
pub fn render(tree: &EquipmentTree) -> String {
    let mut out = String::new();
    for &id in tree.preorder() {
        let (Some(name), Some(pos)) = (tree.name(id), tree.position(id)) else {
            continue;
        };
        let indent = "  ".repeat(pos.level as usize);
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{indent}{name} [{}:{}-{}] {id}",
            pos.tree_id, pos.lft, pos.rgt
        );
    }
    out
}
