//! Syntax modules: one parsed grammar plus the rules that map its nodes to
//! highlight kinds.
//!
//! ## Learning: `Send + Sync` Grammars
//!
//! A `tree_sitter::Language` is an immutable table, so it can be shared
//! between threads freely. A `Parser` is not: it holds mutable parse
//! state. That is why a module keeps the language and creates a short-lived
//! parser per highlight request instead of storing one.

use tree_sitter::{Language, Node, Parser};

use crate::{SyntaxError, SyntaxResult};

/// File-type specific tokenizing and highlighting rules.
pub struct SyntaxModule {
    name: &'static str,
    language: Language,
}

impl SyntaxModule {
    /// Builds a module after checking that the grammar is usable by the
    /// linked tree-sitter runtime.
    pub fn compile(name: &'static str, language: Language) -> SyntaxResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| SyntaxError::Incompatible {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { name, language })
    }

    /// Returns the language name (e.g. `"rust"`).
    pub fn name(&self) -> &str {
        self.name
    }

    /// Parses `source` from scratch and returns its highlight spans in
    /// document order.
    pub fn highlight(&self, source: &str) -> SyntaxResult<Vec<HighlightSpan>> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| SyntaxError::Incompatible {
                name: self.name.to_string(),
                reason: e.to_string(),
            })?;

        let tree = parser.parse(source, None).ok_or(SyntaxError::ParseError)?;

        let mut spans = Vec::new();
        collect_highlights(tree.root_node(), &mut spans);
        Ok(spans)
    }
}

impl std::fmt::Debug for SyntaxModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxModule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn collect_highlights(node: Node, spans: &mut Vec<HighlightSpan>) {
    let kind = HighlightKind::from_node_kind(node.kind());

    if kind != HighlightKind::None {
        spans.push(HighlightSpan {
            start: node.start_byte(),
            end: node.end_byte(),
            kind,
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_highlights(child, spans);
    }
}

/// A highlighted byte range of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub kind: HighlightKind,
}

/// Categories a renderer can assign colors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightKind {
    Keyword,
    String,
    Number,
    Comment,
    Function,
    Type,
    Constant,
    Operator,
    Attribute,
    Property,
    Tag,
    Heading,
    None,
}

impl HighlightKind {
    /// Maps a grammar node kind to a highlight category.
    ///
    /// Node kinds are shared loosely between the bundled grammars, so a
    /// single table covers all of them.
    pub fn from_node_kind(kind: &str) -> Self {
        match kind {
            "fn" | "let" | "mut" | "const" | "static" | "pub" | "use" | "mod" | "struct"
            | "enum" | "impl" | "trait" | "type" | "where" | "if" | "else" | "match"
            | "for" | "while" | "loop" | "break" | "continue" | "return" | "async"
            | "await" | "function" | "class" | "def" | "import" | "from" | "try"
            | "except" | "finally" | "with" | "yield" | "lambda" | "var" | "new"
            | "throw" | "catch" | "switch" | "case" | "export" | "extends" | "func"
            | "package" | "go" | "defer" | "chan" | "select" | "interface" | "public"
            | "private" | "protected" | "void" | "namespace" | "template" | "typedef"
            | "echo" | "implements" | "abstract" => HighlightKind::Keyword,

            // SQL keywords are one node kind per word.
            k if k.starts_with("keyword_") => HighlightKind::Keyword,

            "string_literal" | "raw_string_literal" | "char_literal" | "string"
            | "template_string" | "interpreted_string_literal" | "encapsed_string"
            | "attribute_value" | "string_value" | "AttValue" | "code_span" => {
                HighlightKind::String
            }

            "integer_literal" | "float_literal" | "number" | "integer" | "float"
            | "int_literal" | "number_literal" | "decimal_integer_literal"
            | "decimal_floating_point_literal" | "integer_value" | "float_value" => {
                HighlightKind::Number
            }

            "line_comment" | "block_comment" | "comment" | "Comment" => HighlightKind::Comment,

            "function_item" | "function_definition" | "function_declaration"
            | "method_definition" | "call_expression" | "macro_invocation"
            | "method_declaration" | "method_invocation" | "function_call_expression" => {
                HighlightKind::Function
            }

            "type_identifier" | "primitive_type" => HighlightKind::Type,

            "true" | "false" | "null" | "none" | "boolean_literal" => HighlightKind::Constant,

            "binary_expression" | "unary_expression" | "assignment_expression" => {
                HighlightKind::Operator
            }

            "attribute_item" | "decorator" | "annotation" | "marker_annotation"
            | "attribute_name" => HighlightKind::Attribute,

            "field_identifier" | "property_identifier" | "pair" | "property_name" => {
                HighlightKind::Property
            }

            "tag_name" | "STag" | "ETag" | "EmptyElemTag" => HighlightKind::Tag,

            "atx_heading" | "setext_heading" => HighlightKind::Heading,

            _ => HighlightKind::None,
        }
    }
}
