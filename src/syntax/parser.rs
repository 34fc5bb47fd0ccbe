use crate::syntax::errors::SyntaxError;
use crate::syntax::kind::SyntaxKind;
use crate::syntax::tree::{SyntaxTree, TreeBuilder};
use ast_grep_language::{LanguageExt, SupportLang};
use std::path::Path;
use tree_sitter::{Parser, TreeCursor};

/// Anything that can turn source text into a [`SyntaxTree`].
///
/// The query and anchor layers only ever see `SyntaxTree`, so any parser
/// whose output satisfies the tree invariants can stand in here.
pub trait SourceParser {
    fn parse(&mut self, source: &str) -> Result<SyntaxTree, SyntaxError>;
}

/// Grammar flavour for TypeScript sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Dialect {
    #[default]
    TypeScript,
    Tsx,
}

impl Dialect {
    /// Pick the dialect from a file extension (`.tsx` → TSX, anything else → TypeScript).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("tsx") | Some("jsx") => Dialect::Tsx,
            _ => Dialect::TypeScript,
        }
    }

    fn language(self) -> SupportLang {
        match self {
            Dialect::TypeScript => SupportLang::TypeScript,
            Dialect::Tsx => SupportLang::Tsx,
        }
    }
}

/// Tree-sitter parser wrapper for TypeScript source code.
pub struct TypeScriptParser {
    parser: Parser,
    dialect: Dialect,
}

impl TypeScriptParser {
    /// Create a new parser for plain TypeScript.
    pub fn new() -> Result<Self, SyntaxError> {
        Self::with_dialect(Dialect::default())
    }

    pub fn with_dialect(dialect: Dialect) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new();
        let ts_lang = dialect.language().get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| SyntaxError::LanguageSet)?;

        Ok(Self { parser, dialect })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Parse source code into the raw tree-sitter tree.
    pub fn parse_raw(&mut self, source: &str) -> Result<tree_sitter::Tree, SyntaxError> {
        self.parser
            .parse(source, None)
            .ok_or(SyntaxError::ParseFailed)
    }
}

impl SourceParser for TypeScriptParser {
    fn parse(&mut self, source: &str) -> Result<SyntaxTree, SyntaxError> {
        let raw = self.parse_raw(source)?;
        let mut builder = TreeBuilder::new(source);
        lower(raw.root_node(), source, &mut builder)?;
        Ok(builder.build()?)
    }
}

impl Default for TypeScriptParser {
    fn default() -> Self {
        Self::new().expect("failed to create default TypeScriptParser")
    }
}

/// Punctuation is dropped; inserted-by-recovery tokens are kept as errors.
fn is_kept(node: tree_sitter::Node<'_>) -> bool {
    node.is_named() || node.is_missing()
}

/// Move to the first kept child of the cursor's node, if there is one.
fn goto_kept_child(cursor: &mut TreeCursor<'_>) -> bool {
    if !cursor.goto_first_child() {
        return false;
    }
    if is_kept(cursor.node()) || goto_kept_sibling(cursor) {
        return true;
    }
    cursor.goto_parent();
    false
}

/// Move to the next kept sibling. On failure the cursor stays on a sibling
/// of the node it started from.
fn goto_kept_sibling(cursor: &mut TreeCursor<'_>) -> bool {
    while cursor.goto_next_sibling() {
        if is_kept(cursor.node()) {
            return true;
        }
    }
    false
}

/// Copy the named nodes of a tree-sitter tree into the builder.
///
/// Walks with a cursor rather than recursing, so nesting depth is bounded by
/// the heap instead of the call stack.
fn lower(
    root: tree_sitter::Node<'_>,
    source: &str,
    builder: &mut TreeBuilder,
) -> Result<(), SyntaxError> {
    let mut cursor = root.walk();
    let mut depth = 0usize;
    builder.start_grammar_node(classify(root, source), root.kind(), root.start_byte())?;

    loop {
        if goto_kept_child(&mut cursor) {
            depth += 1;
            let node = cursor.node();
            builder.start_grammar_node(classify(node, source), node.kind(), node.start_byte())?;
            continue;
        }

        loop {
            builder.finish_node(cursor.node().end_byte())?;
            if depth == 0 {
                return Ok(());
            }
            if goto_kept_sibling(&mut cursor) {
                let node = cursor.node();
                builder.start_grammar_node(
                    classify(node, source),
                    node.kind(),
                    node.start_byte(),
                )?;
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

fn classify(node: tree_sitter::Node<'_>, source: &str) -> SyntaxKind {
    if node.is_error() || node.is_missing() {
        return SyntaxKind::Error;
    }

    match SyntaxKind::from_grammar(node.kind()) {
        SyntaxKind::Method => {
            let is_constructor = node
                .child_by_field_name("name")
                .is_some_and(|name| &source[name.byte_range()] == "constructor");
            if is_constructor {
                SyntaxKind::Constructor
            } else {
                SyntaxKind::Method
            }
        }
        kind => kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_of(tree: &SyntaxTree, kind: SyntaxKind) -> Vec<String> {
        tree.root()
            .descendants()
            .filter(|n| n.kind() == kind)
            .map(|n| n.text().to_string())
            .collect()
    }

    #[test]
    fn parse_valid_typescript() {
        let mut parser = TypeScriptParser::new().unwrap();
        let tree = parser
            .parse("import { A } from './a';\nconst x = [1, 2];\n")
            .unwrap();

        assert!(!tree.has_errors());
        assert_eq!(tree.root().kind(), SyntaxKind::SourceFile);
        assert_eq!(tree.root().grammar_kind(), "program");
        assert_eq!(kinds_of(&tree, SyntaxKind::Import), vec!["import { A } from './a';"]);
        assert_eq!(kinds_of(&tree, SyntaxKind::ArrayLiteral), vec!["[1, 2]"]);
        assert_eq!(kinds_of(&tree, SyntaxKind::VariableDeclaration), vec!["x = [1, 2]"]);
    }

    #[test]
    fn parse_invalid_typescript() {
        let mut parser = TypeScriptParser::new().unwrap();
        let tree = parser.parse("const x = [1, 2;\n}}}\n").unwrap();

        assert!(tree.has_errors());
        assert!(!tree.error_nodes().is_empty());
    }

    #[test]
    fn classifies_class_members() {
        let mut parser = TypeScriptParser::new().unwrap();
        let source = r#"
export class AppComponent {
  public title = 'app';

  constructor(private router: Router) {}

  ngOnInit(): void {}
}
"#;
        let tree = parser.parse(source).unwrap();

        assert_eq!(kinds_of(&tree, SyntaxKind::Property), vec!["public title = 'app'"]);
        assert_eq!(kinds_of(&tree, SyntaxKind::Constructor).len(), 1);
        assert_eq!(kinds_of(&tree, SyntaxKind::Method), vec!["ngOnInit(): void {}"]);
        assert_eq!(kinds_of(&tree, SyntaxKind::ClassDeclaration).len(), 1);
    }

    #[test]
    fn decorators_and_object_literals() {
        let mut parser = TypeScriptParser::new().unwrap();
        let source = "@NgModule({ imports: [CommonModule] })\nexport class AppModule {}\n";
        let tree = parser.parse(source).unwrap();

        assert_eq!(kinds_of(&tree, SyntaxKind::Decorator).len(), 1);
        assert_eq!(
            kinds_of(&tree, SyntaxKind::PropertyAssignment),
            vec!["imports: [CommonModule]"]
        );
        assert_eq!(
            kinds_of(&tree, SyntaxKind::ObjectLiteral),
            vec!["{ imports: [CommonModule] }"]
        );
    }

    #[test]
    fn tsx_dialect_from_extension() {
        assert_eq!(Dialect::from_path(Path::new("a/b.tsx")), Dialect::Tsx);
        assert_eq!(Dialect::from_path(Path::new("a/b.ts")), Dialect::TypeScript);

        let mut parser = TypeScriptParser::with_dialect(Dialect::Tsx).unwrap();
        let tree = parser.parse("const el = <div>{items}</div>;").unwrap();
        assert!(!tree.has_errors());
    }

    #[test]
    fn deeply_nested_input_is_lowered_without_recursion() {
        let depth = 20_000;
        let source = format!("const x = {}{};\n", "[".repeat(depth), "]".repeat(depth));
        let mut parser = TypeScriptParser::new().unwrap();
        let tree = parser.parse(&source).unwrap();

        assert!(!tree.has_errors());
        let arrays: Vec<_> = tree
            .root()
            .descendants()
            .filter(|n| n.kind() == SyntaxKind::ArrayLiteral)
            .collect();
        assert_eq!(arrays.len(), depth);
        assert_eq!(arrays.last().map(|n| n.text()), Some("[]"));
    }
}
