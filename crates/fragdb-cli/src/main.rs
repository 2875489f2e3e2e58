//! FragDB CLI
//!
//! Runs composite path queries against fragment store snapshots:
//! - `query`: evaluate a composite query and print the result forest as JSON
//! - `check`: validate a composite query document without touching a store

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use fragdb_query::{
    Anchor, CompositeOperator, CompositeQuery, CompositeQueryProcessor, FetchDescendants,
    QueryConfig,
};
use fragdb_store::InMemoryFragmentStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fragdb")]
#[command(author, version, about = "FragDB: composite queries over anchored fragment trees")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a composite query against a snapshot and print the result forest.
    Query {
        /// Store snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,
        /// Dataspace holding the anchor
        #[arg(long)]
        dataspace: String,
        /// Anchor to query
        #[arg(long)]
        anchor: String,
        /// Composite query document (JSON)
        #[arg(long, conflicts_with = "path", required_unless_present = "path")]
        query: Option<PathBuf>,
        /// Plain path expression, queried without conditions
        #[arg(long)]
        path: Option<String>,
        /// Descendant fetch depth: none, direct, all, or a level count
        #[arg(long, default_value = "none")]
        descendants: FetchDescendants,
        /// Query config (JSON); flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_condition_depth: Option<usize>,
        #[arg(long)]
        max_tree_depth: Option<usize>,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Parse a composite query document and resolve all of its operators.
    Check {
        /// Composite query document (JSON)
        #[arg(long)]
        query: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Query {
            snapshot,
            dataspace,
            anchor,
            query,
            path,
            descendants,
            config,
            max_condition_depth,
            max_tree_depth,
            pretty,
        } => {
            let query = match (query, path) {
                (Some(file), _) => read_query(&file)?,
                (None, Some(path)) => CompositeQuery::new(path),
                (None, None) => return Err(anyhow!("one of `--query` or `--path` is required")),
            };
            let config =
                effective_config(config.as_deref(), max_condition_depth, max_tree_depth)?;
            let anchor = Anchor::new(dataspace, anchor);
            let out = cmd_query(&snapshot, &anchor, &query, descendants, config, pretty)?;
            println!("{out}");
        }
        Commands::Check { query } => {
            let parsed = read_query(&query)?;
            let summary = cmd_check(&parsed)?;
            println!("{}: {summary}", query.display());
        }
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_query(
    snapshot: &Path,
    anchor: &Anchor,
    query: &CompositeQuery,
    fetch: FetchDescendants,
    config: QueryConfig,
    pretty: bool,
) -> Result<String> {
    let store = InMemoryFragmentStore::load_snapshot(snapshot)
        .with_context(|| format!("failed to load snapshot {}", snapshot.display()))?;
    tracing::debug!(snapshot = %snapshot.display(), anchor = %anchor, "snapshot loaded");

    let processor = CompositeQueryProcessor::with_config(&store, config);
    tracing::debug!(config = ?processor.config(), %fetch, "running composite query");
    let nodes = processor
        .process_composite_query(anchor, query, fetch)
        .with_context(|| format!("query `{}` on {anchor} failed", query.cps_path))?;

    let out = if pretty {
        serde_json::to_string_pretty(&nodes)?
    } else {
        serde_json::to_string(&nodes)?
    };
    Ok(out)
}

/// Resolve every operator in the document; returns a one-line summary.
fn cmd_check(query: &CompositeQuery) -> Result<String> {
    let mut conditions = 0usize;
    let mut stack = vec![query];
    while let Some(current) = stack.pop() {
        if current.has_conditions() {
            CompositeOperator::resolve(current.operator.as_deref())
                .with_context(|| format!("in condition `{}`", current.cps_path))?;
        }
        conditions += current.conditions.len();
        stack.extend(current.conditions.iter());
    }
    Ok(format!(
        "ok ({conditions} conditions, nesting depth {})",
        query.nesting_depth()
    ))
}

/// Config file values (or defaults), with command-line limits taking precedence.
fn effective_config(
    file: Option<&Path>,
    max_condition_depth: Option<usize>,
    max_tree_depth: Option<usize>,
) -> Result<QueryConfig> {
    let mut config = match file {
        Some(file) => read_config(file)?,
        None => QueryConfig::default(),
    };
    if let Some(depth) = max_condition_depth {
        config.max_condition_depth = depth;
    }
    if let Some(depth) = max_tree_depth {
        config.max_tree_depth = depth;
    }
    Ok(config)
}

fn read_query(path: &Path) -> Result<CompositeQuery> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read query {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid query document {}", path.display()))
}

fn read_config(path: &Path) -> Result<QueryConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "anchors": [{
            "dataspace": "ds",
            "name": "shop",
            "fragments": [
                { "id": 1, "xpath": "/shop" },
                { "id": 2, "xpath": "/shop/item[@sku='a']", "parentId": 1, "attributes": { "sku": "a", "price": 3 } },
                { "id": 3, "xpath": "/shop/item[@sku='b']", "parentId": 1, "attributes": { "sku": "b", "price": 9 } }
            ]
        }]
    }"#;

    #[test]
    fn test_query_prints_matching_forest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let query = CompositeQuery::new("/shop")
            .with_condition(CompositeQuery::new("//item[@price=9]"));
        let out = cmd_query(
            file.path(),
            &Anchor::new("ds", "shop"),
            &query,
            FetchDescendants::All,
            QueryConfig::default(),
            false,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["xpath"], "/shop");
        let children = value[0]["childDataNodes"].as_array().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0]["xpath"], "/shop/item[@sku='b']");
    }

    #[test]
    fn test_query_reports_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_query(
            &dir.path().join("missing.json"),
            &Anchor::new("ds", "shop"),
            &CompositeQuery::new("/shop"),
            FetchDescendants::OMIT,
            QueryConfig::default(),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to load snapshot"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "max_condition_depth": 3, "max_tree_depth": 5 }"#)
            .unwrap();

        let config = effective_config(Some(file.path()), None, Some(9)).unwrap();
        assert_eq!(config.max_condition_depth, 3);
        assert_eq!(config.max_tree_depth, 9);

        assert_eq!(effective_config(None, None, None).unwrap(), QueryConfig::default());
    }

    #[test]
    fn test_check_rejects_nested_unknown_operator() {
        let query: CompositeQuery = serde_json::from_str(
            r#"{
                "cpsPath": "/shop",
                "operator": "and",
                "conditions": [
                    { "cpsPath": "//item", "operator": "xor", "conditions": [{ "cpsPath": "//price" }] }
                ]
            }"#,
        )
        .unwrap();
        let err = cmd_check(&query).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported operator: 'xor'"));
    }

    #[test]
    fn test_check_summarizes_valid_document() {
        let query = CompositeQuery::new("/shop")
            .with_operator("OR")
            .with_condition(CompositeQuery::new("//item"))
            .with_condition(CompositeQuery::new("//owner"));
        assert_eq!(cmd_check(&query).unwrap(), "ok (2 conditions, nesting depth 1)");
    }
}
