//! Generic parse-tree traversal and candidate selection.
//!
//! The selection logic is a fold over the pre-order node sequence, so it can
//! be exercised with any tree that implements [`SyntaxNode`], not only
//! tree-sitter's.

use super::QueryRange;
use crate::parser::DefinitionKind;

/// Read-only view of a parse-tree node
pub trait SyntaxNode: Copy {
    fn kind(&self) -> &str;

    /// 0-based row of the first character
    fn start_row(&self) -> usize;

    /// 0-based row of the last character
    fn end_row(&self) -> usize;

    /// Children in source order
    fn children(&self) -> Vec<Self>;
}

impl<'tree> SyntaxNode for tree_sitter::Node<'tree> {
    fn kind(&self) -> &str {
        tree_sitter::Node::kind(self)
    }

    fn start_row(&self) -> usize {
        self.start_position().row
    }

    fn end_row(&self) -> usize {
        self.end_position().row
    }

    fn children(&self) -> Vec<Self> {
        let mut cursor = self.walk();
        tree_sitter::Node::children(self, &mut cursor).collect()
    }
}

/// Pre-order iterator driven by an explicit stack, so nesting depth is
/// bounded by heap rather than call stack.
pub struct PreOrder<N> {
    stack: Vec<N>,
}

impl<N: SyntaxNode> PreOrder<N> {
    pub fn new(root: N) -> Self {
        Self { stack: vec![root] }
    }
}

impl<N: SyntaxNode> Iterator for PreOrder<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        let node = self.stack.pop()?;
        // Reversed so the first child is popped next.
        self.stack.extend(node.children().into_iter().rev());
        Some(node)
    }
}

/// A recognized definition node with its 1-based inclusive line span
#[derive(Debug, Clone, Copy)]
pub struct Candidate<N> {
    pub node: N,
    pub kind: DefinitionKind,
    pub start_line: usize,
    pub end_line: usize,
}

impl<N: SyntaxNode> Candidate<N> {
    pub fn new(node: N, kind: DefinitionKind) -> Self {
        Self {
            node,
            kind,
            start_line: node.start_row() + 1,
            end_line: node.end_row() + 1,
        }
    }

    /// Line-count proxy for the node's extent
    pub fn size(&self) -> usize {
        self.end_line - self.start_line
    }

    /// Both ends of the range must fall inside the span; overlap is not enough.
    pub fn contains(&self, range: &QueryRange) -> bool {
        let inside = |line: usize| line >= self.start_line && line <= self.end_line;
        inside(range.start()) && inside(range.end())
    }
}

/// Pick the containing candidate with the strictly largest size.
///
/// The running size starts at 0, so single-line definitions never qualify.
/// Equal sizes keep the earlier node in the sequence.
pub fn select_largest<N, I, F>(nodes: I, range: &QueryRange, classify: F) -> Option<Candidate<N>>
where
    N: SyntaxNode,
    I: IntoIterator<Item = N>,
    F: Fn(&str) -> Option<DefinitionKind>,
{
    let (_, best) = nodes
        .into_iter()
        .filter_map(|node| classify(node.kind()).map(|kind| Candidate::new(node, kind)))
        .filter(|candidate| candidate.contains(range))
        .fold((0usize, None::<Candidate<N>>), |(best_size, best), candidate| {
            if candidate.size() <= best_size {
                return (best_size, best);
            }
            tracing::trace!(
                kind = candidate.node.kind(),
                start_line = candidate.start_line,
                end_line = candidate.end_line,
                "new best enclosing candidate"
            );
            (candidate.size(), Some(candidate))
        });
    best
}
