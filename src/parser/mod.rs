pub mod code_parser;

use serde::Serialize;
use thiserror::Error;
use tree_sitter::Language;

/// Errors raised by the tree-sitter parser collaborator
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to set language {grammar}: {message}")]
    Language {
        grammar: &'static str,
        message: String,
    },

    #[error("parser produced no tree")]
    ParseFailed,

    #[error("syntax error at line {line}, column {column}: {detail}")]
    Syntax {
        line: usize,
        column: usize,
        detail: String,
    },
}

/// Category of a recognized definition node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Function,
    Class,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Function => "function",
            DefinitionKind::Class => "class",
        }
    }
}

/// A grammar the resolver can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
    Java,
    CSharp,
    Cpp,
}

const PYTHON_KINDS: &[(&str, DefinitionKind)] = &[
    ("function_definition", DefinitionKind::Function),
    ("class_definition", DefinitionKind::Class),
];

const JAVASCRIPT_KINDS: &[(&str, DefinitionKind)] = &[
    ("function_declaration", DefinitionKind::Function),
    ("generator_function_declaration", DefinitionKind::Function),
    ("method_definition", DefinitionKind::Function),
    ("class_declaration", DefinitionKind::Class),
];

const TYPESCRIPT_KINDS: &[(&str, DefinitionKind)] = &[
    ("function_declaration", DefinitionKind::Function),
    ("generator_function_declaration", DefinitionKind::Function),
    ("method_definition", DefinitionKind::Function),
    ("class_declaration", DefinitionKind::Class),
    ("abstract_class_declaration", DefinitionKind::Class),
    ("interface_declaration", DefinitionKind::Class),
];

const RUST_KINDS: &[(&str, DefinitionKind)] = &[
    ("function_item", DefinitionKind::Function),
    ("impl_item", DefinitionKind::Class),
    ("trait_item", DefinitionKind::Class),
    ("struct_item", DefinitionKind::Class),
    ("enum_item", DefinitionKind::Class),
    ("mod_item", DefinitionKind::Class),
];

const GO_KINDS: &[(&str, DefinitionKind)] = &[
    ("function_declaration", DefinitionKind::Function),
    ("method_declaration", DefinitionKind::Function),
    ("type_declaration", DefinitionKind::Class),
];

const JAVA_KINDS: &[(&str, DefinitionKind)] = &[
    ("method_declaration", DefinitionKind::Function),
    ("constructor_declaration", DefinitionKind::Function),
    ("class_declaration", DefinitionKind::Class),
    ("interface_declaration", DefinitionKind::Class),
    ("enum_declaration", DefinitionKind::Class),
];

const CSHARP_KINDS: &[(&str, DefinitionKind)] = &[
    ("method_declaration", DefinitionKind::Function),
    ("constructor_declaration", DefinitionKind::Function),
    ("class_declaration", DefinitionKind::Class),
    ("struct_declaration", DefinitionKind::Class),
    ("interface_declaration", DefinitionKind::Class),
];

const CPP_KINDS: &[(&str, DefinitionKind)] = &[
    ("function_definition", DefinitionKind::Function),
    ("class_specifier", DefinitionKind::Class),
    ("struct_specifier", DefinitionKind::Class),
    ("namespace_definition", DefinitionKind::Class),
];

impl Grammar {
    pub const ALL: [Grammar; 9] = [
        Grammar::Python,
        Grammar::JavaScript,
        Grammar::TypeScript,
        Grammar::Tsx,
        Grammar::Rust,
        Grammar::Go,
        Grammar::Java,
        Grammar::CSharp,
        Grammar::Cpp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Grammar::Python => "python",
            Grammar::JavaScript => "javascript",
            Grammar::TypeScript => "typescript",
            Grammar::Tsx => "tsx",
            Grammar::Rust => "rust",
            Grammar::Go => "go",
            Grammar::Java => "java",
            Grammar::CSharp => "c_sharp",
            Grammar::Cpp => "cpp",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Grammar::Python => &["py", "pyi"],
            Grammar::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Grammar::TypeScript => &["ts"],
            Grammar::Tsx => &["tsx"],
            Grammar::Rust => &["rs"],
            Grammar::Go => &["go"],
            Grammar::Java => &["java"],
            Grammar::CSharp => &["cs"],
            Grammar::Cpp => &["cpp", "cc", "cxx", "hpp"],
        }
    }

    /// Look up a grammar by name, accepting a few common aliases
    pub fn from_name(name: &str) -> Option<Grammar> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "py" => return Some(Grammar::Python),
            "js" => return Some(Grammar::JavaScript),
            "ts" => return Some(Grammar::TypeScript),
            "csharp" | "c#" => return Some(Grammar::CSharp),
            "c++" => return Some(Grammar::Cpp),
            _ => {}
        }
        Grammar::ALL.into_iter().find(|g| g.name() == name)
    }

    pub fn from_extension(extension: &str) -> Option<Grammar> {
        let extension = extension.to_ascii_lowercase();
        Grammar::ALL
            .into_iter()
            .find(|g| g.extensions().contains(&extension.as_str()))
    }

    /// The node-kind tags treated as definitions for this grammar
    pub fn definition_kinds(&self) -> &'static [(&'static str, DefinitionKind)] {
        match self {
            Grammar::Python => PYTHON_KINDS,
            Grammar::JavaScript => JAVASCRIPT_KINDS,
            Grammar::TypeScript | Grammar::Tsx => TYPESCRIPT_KINDS,
            Grammar::Rust => RUST_KINDS,
            Grammar::Go => GO_KINDS,
            Grammar::Java => JAVA_KINDS,
            Grammar::CSharp => CSHARP_KINDS,
            Grammar::Cpp => CPP_KINDS,
        }
    }

    pub fn classify(&self, node_kind: &str) -> Option<DefinitionKind> {
        self.definition_kinds()
            .iter()
            .find(|(tag, _)| *tag == node_kind)
            .map(|(_, kind)| *kind)
    }

    pub fn language(&self) -> Language {
        match self {
            Grammar::Python => tree_sitter_python::language(),
            Grammar::JavaScript => tree_sitter_javascript::language(),
            Grammar::TypeScript => tree_sitter_typescript::language_typescript(),
            Grammar::Tsx => tree_sitter_typescript::language_tsx(),
            Grammar::Rust => tree_sitter_rust::language(),
            Grammar::Go => tree_sitter_go::language(),
            Grammar::Java => tree_sitter_java::language(),
            Grammar::CSharp => tree_sitter_c_sharp::language(),
            Grammar::Cpp => tree_sitter_cpp::language(),
        }
    }
}
