use crate::context::{EnclosingContextResolver, ResolveError};
use crate::mcp::types::Content;
use crate::parser::Grammar;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tokio::fs;

/// Tool handlers for MCP server
pub struct ToolHandlers {
    default_grammar: Grammar,
    max_source_bytes: usize,
}

/// Source text plus the grammar chosen to parse it
struct LoadedSource {
    text: String,
    grammar: Grammar,
    origin: String,
}

impl ToolHandlers {
    pub fn new(default_grammar: Grammar, max_source_bytes: usize) -> Self {
        Self {
            default_grammar,
            max_source_bytes,
        }
    }

    /// Handle find_enclosing_context tool
    pub async fn handle_find_enclosing_context(&self, args: &Value) -> Result<Vec<Content>> {
        let line_start = line_arg(args, "line_start")?;
        let line_end = line_arg(args, "line_end")?;
        let source = self.load_source(args).await?;

        tracing::info!(
            "Resolving enclosing context for {} lines {}-{} ({})",
            source.origin,
            line_start,
            line_end,
            source.grammar.name()
        );

        let mut resolver = EnclosingContextResolver::new(source.grammar)?;
        let response = resolver.find_enclosing_context(&source.text, line_start, line_end)?;

        Ok(vec![json_content(&response)?])
    }

    /// Handle dry_run tool
    pub async fn handle_dry_run(&self, args: &Value) -> Result<Vec<Content>> {
        let source = self.load_source(args).await?;

        let mut resolver = EnclosingContextResolver::new(source.grammar)?;
        let result = resolver.dry_run(&source.text);
        if !result.valid {
            tracing::debug!("Dry run failed for {}: {}", source.origin, result.error);
        }

        Ok(vec![json_content(&result)?])
    }

    /// Handle list_languages tool
    pub async fn handle_list_languages(&self, _args: &Value) -> Result<Vec<Content>> {
        let languages: Vec<Value> = Grammar::ALL
            .iter()
            .map(|grammar| {
                let kinds: Vec<Value> = grammar
                    .definition_kinds()
                    .iter()
                    .map(|(tag, kind)| json!({ "nodeKind": tag, "category": kind.as_str() }))
                    .collect();
                json!({
                    "name": grammar.name(),
                    "extensions": grammar.extensions(),
                    "default": *grammar == self.default_grammar,
                    "definitionKinds": kinds,
                })
            })
            .collect();

        Ok(vec![json_content(&json!({ "languages": languages }))?])
    }

    async fn load_source(&self, args: &Value) -> Result<LoadedSource> {
        let language = args.get("language").and_then(|v| v.as_str());
        let path = args.get("path").and_then(|v| v.as_str());

        // Inline content wins over path
        let (text, origin) = match args.get("content").and_then(|v| v.as_str()) {
            Some(content) => (content.to_string(), "<inline>".to_string()),
            None => {
                let path = path.context("Missing 'path' or 'content' argument")?;
                let metadata = fs::metadata(path)
                    .await
                    .with_context(|| format!("Cannot access {}", path))?;
                if !metadata.is_file() {
                    anyhow::bail!("Path is not a file: {}", path);
                }
                // Refuse oversized files before reading them
                if metadata.len() > self.max_source_bytes as u64 {
                    anyhow::bail!(
                        "File {} is {} bytes, larger than the {} byte limit",
                        path,
                        metadata.len(),
                        self.max_source_bytes
                    );
                }
                let text = fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path))?;
                (text, path.to_string())
            }
        };

        if text.len() > self.max_source_bytes {
            anyhow::bail!(
                "Source is {} bytes, larger than the {} byte limit",
                text.len(),
                self.max_source_bytes
            );
        }

        // Path is still consulted for its extension when content was inline
        let grammar = self.select_grammar(language, path)?;
        Ok(LoadedSource {
            text,
            grammar,
            origin,
        })
    }

    /// Explicit language first, then file extension, then the configured default
    fn select_grammar(&self, language: Option<&str>, path: Option<&str>) -> Result<Grammar, ResolveError> {
        if let Some(name) = language {
            return Grammar::from_name(name)
                .ok_or_else(|| ResolveError::UnsupportedLanguage(name.to_string()));
        }

        let by_extension = path
            .and_then(|p| Path::new(p).extension())
            .and_then(|e| e.to_str())
            .and_then(Grammar::from_extension);

        Ok(by_extension.unwrap_or(self.default_grammar))
    }
}

fn line_arg(args: &Value, name: &str) -> Result<usize> {
    let line = args
        .get(name)
        .and_then(|v| v.as_u64())
        .with_context(|| format!("Missing or invalid '{}' argument", name))?;
    Ok(line as usize)
}

fn json_content<T: Serialize>(value: &T) -> Result<Content> {
    Ok(Content::Text {
        text: serde_json::to_string_pretty(value)?,
    })
}
