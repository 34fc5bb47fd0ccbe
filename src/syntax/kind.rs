use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Syntactic categories the patch engine can query for.
///
/// This is deliberately a closed set: grammar node kinds that no query ever
/// asks about collapse into [`SyntaxKind::Other`] so the tree keeps its shape
/// without importing the full grammar vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyntaxKind {
    /// Root of a parsed file
    SourceFile,
    /// `import { A } from 'a';`
    Import,
    /// A quoted string literal
    StringLiteral,
    /// Any identifier-like name (bindings, property keys, type names)
    Identifier,
    /// `@Name(...)`
    Decorator,
    /// `callee(args)`
    CallExpression,
    /// `class Name { ... }`
    ClassDeclaration,
    /// A class field declaration
    Property,
    /// A class `constructor(...) { ... }`
    Constructor,
    /// A class method other than the constructor
    Method,
    /// `name: Type = value` inside a `const`/`let`/`var`
    VariableDeclaration,
    /// `[a, b]`
    ArrayLiteral,
    /// `{ key: value }`
    ObjectLiteral,
    /// `key: value` inside an object literal
    PropertyAssignment,
    /// Parser error recovery node
    Error,
    /// Any grammar node outside the queried set
    Other,
}

impl SyntaxKind {
    pub const ALL: [SyntaxKind; 16] = [
        SyntaxKind::SourceFile,
        SyntaxKind::Import,
        SyntaxKind::StringLiteral,
        SyntaxKind::Identifier,
        SyntaxKind::Decorator,
        SyntaxKind::CallExpression,
        SyntaxKind::ClassDeclaration,
        SyntaxKind::Property,
        SyntaxKind::Constructor,
        SyntaxKind::Method,
        SyntaxKind::VariableDeclaration,
        SyntaxKind::ArrayLiteral,
        SyntaxKind::ObjectLiteral,
        SyntaxKind::PropertyAssignment,
        SyntaxKind::Error,
        SyntaxKind::Other,
    ];

    /// Kebab-case name used in patch files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            SyntaxKind::SourceFile => "source-file",
            SyntaxKind::Import => "import",
            SyntaxKind::StringLiteral => "string-literal",
            SyntaxKind::Identifier => "identifier",
            SyntaxKind::Decorator => "decorator",
            SyntaxKind::CallExpression => "call-expression",
            SyntaxKind::ClassDeclaration => "class-declaration",
            SyntaxKind::Property => "property",
            SyntaxKind::Constructor => "constructor",
            SyntaxKind::Method => "method",
            SyntaxKind::VariableDeclaration => "variable-declaration",
            SyntaxKind::ArrayLiteral => "array-literal",
            SyntaxKind::ObjectLiteral => "object-literal",
            SyntaxKind::PropertyAssignment => "property-assignment",
            SyntaxKind::Error => "error",
            SyntaxKind::Other => "other",
        }
    }

    /// Map a tree-sitter TypeScript/TSX grammar kind to its category.
    ///
    /// `method_definition` is resolved by the parser, which can see the
    /// method name; here it always maps to [`SyntaxKind::Method`].
    pub fn from_grammar(kind: &str) -> Self {
        match kind {
            "program" => SyntaxKind::SourceFile,
            "import_statement" => SyntaxKind::Import,
            "string" => SyntaxKind::StringLiteral,
            "identifier"
            | "property_identifier"
            | "shorthand_property_identifier"
            | "shorthand_property_identifier_pattern"
            | "type_identifier" => SyntaxKind::Identifier,
            "decorator" => SyntaxKind::Decorator,
            "call_expression" => SyntaxKind::CallExpression,
            "class_declaration" | "class" | "abstract_class_declaration" => {
                SyntaxKind::ClassDeclaration
            }
            "public_field_definition" | "field_definition" => SyntaxKind::Property,
            "method_definition" => SyntaxKind::Method,
            "variable_declarator" => SyntaxKind::VariableDeclaration,
            "array" => SyntaxKind::ArrayLiteral,
            "object" => SyntaxKind::ObjectLiteral,
            "pair" => SyntaxKind::PropertyAssignment,
            "ERROR" => SyntaxKind::Error,
            _ => SyntaxKind::Other,
        }
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown syntax kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for SyntaxKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyntaxKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}
