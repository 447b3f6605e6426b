use super::{Grammar, ParseError};
use tree_sitter::{Node, Parser, Tree};

const SNIPPET_LEN: usize = 40;

/// Tree-sitter parser bound to a single grammar for its whole lifetime
pub struct CodeParser {
    parser: Parser,
    grammar: Grammar,
}

impl CodeParser {
    pub fn new(grammar: Grammar) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(grammar.language())
            .map_err(|e| ParseError::Language {
                grammar: grammar.name(),
                message: e.to_string(),
            })?;

        Ok(Self { parser, grammar })
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Parse source text, relying on tree-sitter's error recovery for malformed input
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParseError> {
        self.parser
            .parse(source, None)
            .ok_or(ParseError::ParseFailed)
    }

    /// Parse and fail on the first ERROR or MISSING node in the recovered tree
    pub fn check_syntax(&mut self, source: &str) -> Result<(), ParseError> {
        let tree = self.parse(source)?;
        match first_error(tree.root_node()) {
            Some(node) => {
                let position = node.start_position();
                let detail = if node.is_missing() {
                    format!("missing {}", node.kind())
                } else {
                    format!("unexpected `{}`", snippet(node, source))
                };
                Err(ParseError::Syntax {
                    line: position.row + 1,
                    column: position.column + 1,
                    detail,
                })
            }
            None => Ok(()),
        }
    }
}

/// Pre-order search that only descends into subtrees containing errors
fn first_error(root: Node) -> Option<Node> {
    if !root.has_error() {
        return None;
    }

    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }

        // Only descend where the subtree reports an error
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }

        // Climb until a next sibling exists; back at the root means none left
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn snippet<'a>(node: Node, source: &'a str) -> &'a str {
    let text = source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("")
        .trim();
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python_module() {
        let mut parser = CodeParser::new(Grammar::Python).unwrap();
        let tree = parser.parse("def hello():\n    return 1\n").unwrap();
        let root = tree.root_node();
        assert_eq!(root.kind(), "module");
        assert_eq!(root.child(0).unwrap().kind(), "function_definition");
    }

    #[test]
    fn test_every_grammar_binds() {
        for grammar in Grammar::ALL {
            let parser = CodeParser::new(grammar).unwrap();
            assert_eq!(parser.grammar(), grammar);
        }
    }

    #[test]
    fn test_check_syntax_accepts_valid_source() {
        let mut parser = CodeParser::new(Grammar::Python).unwrap();
        assert!(parser.check_syntax("class A:\n    pass\n").is_ok());
        assert!(parser.check_syntax("").is_ok());
    }

    #[test]
    fn test_check_syntax_reports_position() {
        let mut parser = CodeParser::new(Grammar::Python).unwrap();
        let err = parser
            .check_syntax("def ok():\n    pass\n\ndef broken(:\n    pass\n")
            .unwrap_err();
        match err {
            ParseError::Syntax { line, detail, .. } => {
                assert_eq!(line, 4);
                assert!(!detail.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_recovered_tree_is_still_returned() {
        let mut parser = CodeParser::new(Grammar::Python).unwrap();
        let tree = parser.parse("def broken(:\n    pass\n").unwrap();
        assert!(tree.root_node().has_error());
    }
}
