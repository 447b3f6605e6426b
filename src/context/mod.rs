pub mod walk;

use crate::parser::code_parser::CodeParser;
use crate::parser::{DefinitionKind, Grammar, ParseError};
use serde::Serialize;
use thiserror::Error;
use walk::{select_largest, PreOrder};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("line_start ({start}) is greater than line_end ({end})")]
    InvertedRange { start: usize, end: usize },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// 1-based inclusive line range supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRange {
    start: usize,
    end: usize,
}

impl QueryRange {
    pub fn new(start: usize, end: usize) -> Result<Self, ResolveError> {
        if start > end {
            return Err(ResolveError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

/// Snapshot of the matched definition, detached from the parse tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclosingContext {
    pub kind: String,
    pub category: DefinitionKind,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclosingContextResponse {
    pub enclosing_context: Option<EnclosingContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunResult {
    pub valid: bool,
    pub error: String,
}

/// Resolves the largest definition that encloses a line range
pub struct EnclosingContextResolver {
    parser: CodeParser,
}

impl EnclosingContextResolver {
    pub fn new(grammar: Grammar) -> Result<Self, ResolveError> {
        Ok(Self {
            parser: CodeParser::new(grammar)?,
        })
    }

    pub fn find_enclosing_context(
        &mut self,
        source: &str,
        line_start: usize,
        line_end: usize,
    ) -> Result<EnclosingContextResponse, ResolveError> {
        let range = QueryRange::new(line_start, line_end)?;
        Ok(EnclosingContextResponse {
            enclosing_context: self.resolve(source, &range)?,
        })
    }

    pub fn resolve(
        &mut self,
        source: &str,
        range: &QueryRange,
    ) -> Result<Option<EnclosingContext>, ResolveError> {
        let grammar = self.parser.grammar();
        let tree = self.parser.parse(source)?;
        let root = tree.root_node();

        let best = select_largest(PreOrder::new(root), range, |kind| grammar.classify(kind));

        let context = best.map(|candidate| EnclosingContext {
            kind: candidate.node.kind().to_string(),
            category: candidate.kind,
            start_line: candidate.start_line,
            end_line: candidate.end_line,
            text: source
                .get(candidate.node.start_byte()..candidate.node.end_byte())
                .unwrap_or_default()
                .to_string(),
        });

        match &context {
            Some(c) => tracing::debug!(
                grammar = grammar.name(),
                kind = %c.kind,
                start_line = c.start_line,
                end_line = c.end_line,
                "resolved enclosing context for lines {}-{}",
                range.start(),
                range.end()
            ),
            None => tracing::debug!(
                grammar = grammar.name(),
                "no enclosing context for lines {}-{}",
                range.start(),
                range.end()
            ),
        }

        Ok(context)
    }

    /// Check that the source parses cleanly, reporting failures as a value
    pub fn dry_run(&mut self, source: &str) -> DryRunResult {
        match self.parser.check_syntax(source) {
            Ok(()) => DryRunResult {
                valid: true,
                error: String::new(),
            },
            Err(e) => DryRunResult {
                valid: false,
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> EnclosingContextResolver {
        EnclosingContextResolver::new(Grammar::Python).unwrap()
    }

    const SINGLE_FUNCTION: &str = "def handler(event):\n    value = event['x']\n    if value:\n        return value\n    return None\n";

    const CLASS_WITH_METHOD: &str = "class Service:\n    name = 'svc'\n\n    def run(self):\n        a = 1\n        b = 2\n        return a + b\n\n    other = 3\n    last = 4\n";

    #[test]
    fn test_single_function_contains_range() {
        let ctx = python()
            .find_enclosing_context(SINGLE_FUNCTION, 2, 4)
            .unwrap()
            .enclosing_context
            .unwrap();
        assert_eq!(ctx.kind, "function_definition");
        assert_eq!(ctx.category, DefinitionKind::Function);
        assert_eq!((ctx.start_line, ctx.end_line), (1, 5));
        assert!(ctx.text.starts_with("def handler(event):"));
        assert!(ctx.text.ends_with("return None"));
    }

    #[test]
    fn test_outer_class_wins_over_nested_method() {
        let ctx = python()
            .find_enclosing_context(CLASS_WITH_METHOD, 5, 6)
            .unwrap()
            .enclosing_context
            .unwrap();
        assert_eq!(ctx.kind, "class_definition");
        assert_eq!((ctx.start_line, ctx.end_line), (1, 10));
    }

    #[test]
    fn test_gap_between_siblings_has_no_context() {
        let source = "def a():\n    x = 1\n    return x\n\ndef b():\n    y = 2\n    return y\n";
        let response = python().find_enclosing_context(source, 4, 4).unwrap();
        assert!(response.enclosing_context.is_none());
    }

    #[test]
    fn test_range_straddling_end_has_no_context() {
        let source = format!("{SINGLE_FUNCTION}x = 1\n");
        let response = python().find_enclosing_context(&source, 1, 6).unwrap();
        assert!(response.enclosing_context.is_none());
    }

    #[test]
    fn test_range_spanning_siblings_has_no_context() {
        let source = "def a():\n    return 1\n\ndef b():\n    return 2\n";
        let response = python().find_enclosing_context(source, 2, 5).unwrap();
        assert!(response.enclosing_context.is_none());
    }

    #[test]
    fn test_empty_source_has_no_context() {
        let mut resolver = python();
        for source in ["", "   \n\n  \n"] {
            let response = resolver.find_enclosing_context(source, 1, 1).unwrap();
            assert!(response.enclosing_context.is_none());
        }
    }

    #[test]
    fn test_result_satisfies_containment() {
        let mut resolver = python();
        for start in 1..=10 {
            for end in start..=10 {
                if let Some(ctx) = resolver
                    .find_enclosing_context(CLASS_WITH_METHOD, start, end)
                    .unwrap()
                    .enclosing_context
                {
                    assert!(ctx.start_line <= start && ctx.end_line >= end);
                }
            }
        }
    }

    #[test]
    fn test_repeated_queries_are_deterministic() {
        let mut resolver = python();
        let first = resolver.find_enclosing_context(CLASS_WITH_METHOD, 4, 7).unwrap();
        let second = resolver.find_enclosing_context(CLASS_WITH_METHOD, 4, 7).unwrap();
        assert_eq!(first, second);
        let fresh = python().find_enclosing_context(CLASS_WITH_METHOD, 4, 7).unwrap();
        assert_eq!(first, fresh);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = python()
            .find_enclosing_context(SINGLE_FUNCTION, 4, 2)
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvertedRange { start: 4, end: 2 }));
    }

    #[test]
    fn test_one_line_function_has_no_context() {
        let response = python()
            .find_enclosing_context("def f(): return 1\n", 1, 1)
            .unwrap();
        assert!(response.enclosing_context.is_none());
    }

    #[test]
    fn test_one_line_class_does_not_win() {
        let source = "x = 0\nclass Empty: pass\ny = 1\n";
        let response = python().find_enclosing_context(source, 2, 2).unwrap();
        assert!(response.enclosing_context.is_none());
    }

    #[test]
    fn test_class_beats_one_line_method() {
        let source = "class A:\n    def f(self): return 1\n";
        let ctx = python()
            .find_enclosing_context(source, 2, 2)
            .unwrap()
            .enclosing_context
            .unwrap();
        assert_eq!(ctx.kind, "class_definition");
        assert_eq!((ctx.start_line, ctx.end_line), (1, 2));
    }

    #[test]
    fn test_malformed_source_still_resolves() {
        let source = "def ok():\n    a = 1\n    return a\n\nclass (:\n";
        let ctx = python()
            .find_enclosing_context(source, 2, 2)
            .unwrap()
            .enclosing_context
            .unwrap();
        assert_eq!(ctx.kind, "function_definition");
    }

    #[test]
    fn test_rust_grammar_uses_its_own_kinds() {
        let source = "impl Foo {\n    fn bar(&self) {\n        let x = 1;\n    }\n}\n";
        let mut resolver = EnclosingContextResolver::new(Grammar::Rust).unwrap();
        let ctx = resolver
            .find_enclosing_context(source, 3, 3)
            .unwrap()
            .enclosing_context
            .unwrap();
        assert_eq!(ctx.kind, "impl_item");
        assert_eq!(ctx.category, DefinitionKind::Class);
        assert_eq!((ctx.start_line, ctx.end_line), (1, 5));
    }

    #[test]
    fn test_dry_run() {
        let mut resolver = python();
        assert_eq!(
            resolver.dry_run(SINGLE_FUNCTION),
            DryRunResult {
                valid: true,
                error: String::new()
            }
        );

        let result = resolver.dry_run("def broken(:\n    pass\n");
        assert!(!result.valid);
        assert!(!result.error.is_empty());
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = EnclosingContextResponse {
            enclosing_context: Some(EnclosingContext {
                kind: "function_definition".to_string(),
                category: DefinitionKind::Function,
                start_line: 1,
                end_line: 5,
                text: "def f(): pass".to_string(),
            }),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["enclosingContext"]["startLine"], 1);
        assert_eq!(value["enclosingContext"]["endLine"], 5);
        assert_eq!(value["enclosingContext"]["category"], "function");

        let empty = EnclosingContextResponse {
            enclosing_context: None,
        };
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            serde_json::json!({ "enclosingContext": null })
        );
    }
}
