//! Semantic indexer boundary.
//!
//! The engine never parses Swift. It asks an indexer for the entity tree of
//! each file (declarations and references with their USR and position) and
//! works purely from that. `SourceKittenIndexer` shells out to
//! `sourcekitten index`; tests supply their own `Indexer`.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::command;

/// One entity reported by the indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntityNode {
    #[serde(rename = "key.kind", default)]
    pub kind: String,
    #[serde(rename = "key.name")]
    pub name: Option<String>,
    /// Semantic identity (USR).
    #[serde(rename = "key.usr")]
    pub identity: Option<String>,
    #[serde(rename = "key.line")]
    pub line: Option<usize>,
    #[serde(rename = "key.column")]
    pub column: Option<usize>,
    #[serde(rename = "key.entities", default)]
    pub children: Vec<EntityNode>,
}

impl EntityNode {
    /// Position when both line and column are present and 1-based.
    pub fn position(&self) -> Option<(usize, usize)> {
        match (self.line, self.column) {
            (Some(line), Some(column)) if line > 0 && column > 0 => Some((line, column)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(rename = "key.entities", default)]
    entities: Vec<EntityNode>,
}

/// Visit every node in pre-order.
pub fn visit<'a, F>(nodes: &'a [EntityNode], f: &mut F)
where
    F: FnMut(&'a EntityNode),
{
    for node in nodes {
        f(node);
        visit(&node.children, f);
    }
}

pub trait Indexer {
    /// Index one file with the compiler arguments of its module.
    fn index(&self, file: &Path, compiler_args: &[String]) -> Result<Vec<EntityNode>>;
}

/// Runs `sourcekitten index --file <file> -- <args>`.
#[derive(Debug, Clone)]
pub struct SourceKittenIndexer {
    program: String,
}

impl SourceKittenIndexer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Indexer for SourceKittenIndexer {
    fn index(&self, file: &Path, compiler_args: &[String]) -> Result<Vec<EntityNode>> {
        let file_str = file.to_string_lossy().to_string();
        let mut args: Vec<String> = vec![
            "index".to_string(),
            "--file".to_string(),
            file_str.clone(),
            "--".to_string(),
        ];
        args.extend(compiler_args.iter().cloned());

        let stdout = command::run(&self.program, &args, "sourcekitten index")
            .map_err(|e| Error::indexer_failed(&file_str, error_summary(&e)))?;

        parse_index_response(&stdout, file)
    }
}

fn error_summary(err: &Error) -> String {
    err.details
        .get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.message.clone())
}

/// Parse the JSON printed by `sourcekitten index`.
///
/// A response that carries a `key.description` without entities is how
/// sourcekitd reports request failures.
pub fn parse_index_response(json: &str, file: &Path) -> Result<Vec<EntityNode>> {
    let file_str = file.to_string_lossy().to_string();

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| Error::indexer_failed(&file_str, format!("invalid JSON: {}", e)))?;

    if value.get("key.entities").is_none() {
        if let Some(description) = value.get("key.description").and_then(|v| v.as_str()) {
            return Err(Error::indexer_failed(&file_str, description));
        }
    }

    let response: IndexResponse = serde_json::from_value(value)
        .map_err(|e| Error::indexer_failed(&file_str, format!("unexpected response: {}", e)))?;

    Ok(response.entities)
}
