use crate::pool::with_parser;
use crate::syntax::errors::SyntaxError;
use crate::syntax::parser::{Dialect, SourceParser};
use crate::syntax::tree::SyntaxTree;

/// Validate that TypeScript source has no syntax errors.
pub fn validate_syntax(source: &str, dialect: Dialect) -> Result<(), SyntaxError> {
    let tree = with_parser(dialect, |parser| parser.parse(source))??;
    errors_to_result(error_spans(&tree))
}

/// Validate that going from `before` to `after` introduced no new syntax errors.
///
/// Errors already present in `before` are tolerated; an error in `after` is
/// new when no error in `before` has the same text.
pub fn validate_edit(before: &str, after: &str, dialect: Dialect) -> Result<(), SyntaxError> {
    let (before_tree, after_tree) = with_parser(dialect, |parser| {
        Ok::<_, SyntaxError>((parser.parse(before)?, parser.parse(after)?))
    })??;

    let original: Vec<&str> = before_tree.error_nodes().iter().map(|n| n.text()).collect();
    let introduced: Vec<(usize, usize)> = after_tree
        .error_nodes()
        .iter()
        .filter(|n| !original.contains(&n.text()))
        .map(|n| (n.start(), n.end()))
        .collect();

    errors_to_result(introduced)
}

fn error_spans(tree: &SyntaxTree) -> Vec<(usize, usize)> {
    tree.error_nodes()
        .iter()
        .map(|n| (n.start(), n.end()))
        .collect()
}

fn errors_to_result(errors: Vec<(usize, usize)>) -> Result<(), SyntaxError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(SyntaxError::SyntaxError {
            byte_start: errors[0].0,
            byte_end: errors[0].1,
        }),
        n => Err(SyntaxError::MultipleSyntaxErrors { count: n }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_valid_syntax() {
        let source = "export const routes: Routes = [{ path: '', component: HomeComponent }];\n";
        assert!(validate_syntax(source, Dialect::TypeScript).is_ok());
    }

    #[test]
    fn validate_invalid_syntax() {
        assert!(validate_syntax("const x = [1, 2;\n}}}\n", Dialect::TypeScript).is_err());
    }

    #[test]
    fn validate_edit_introduces_error() {
        let before = "const routes = [\n  { path: 'a' },\n];\n";
        let after = "const routes = [\n  { path: 'a' },\n  { path: 'b' \n];\n";
        assert!(validate_edit(before, after, Dialect::TypeScript).is_err());
    }

    #[test]
    fn validate_edit_no_new_errors() {
        let before = "const routes = [\n  { path: 'a' },\n];\n";
        let after = "const routes = [\n  { path: 'a' },\n  { path: 'b' },\n];\n";
        assert!(validate_edit(before, after, Dialect::TypeScript).is_ok());
    }
}
