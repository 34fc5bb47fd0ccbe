//! Thread-local parser pooling.
//!
//! Keeps one reusable tree-sitter parser per dialect per thread so that
//! re-parsing a document after every applied batch does not pay parser
//! construction each time.

use crate::syntax::{Dialect, SyntaxError, TypeScriptParser};
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static PARSERS: RefCell<HashMap<Dialect, TypeScriptParser>> = RefCell::new(HashMap::new());
}

/// Execute function with pooled parser instance.
///
/// On first call per thread and dialect, creates a new parser. Subsequent
/// calls reuse it.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use schematic_patcher::pool::with_parser;
/// use schematic_patcher::syntax::{Dialect, SourceParser};
///
/// let tree = with_parser(Dialect::TypeScript, |parser| parser.parse("const a = [];"))??;
/// assert!(!tree.has_errors());
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(dialect: Dialect, f: F) -> Result<R, SyntaxError>
where
    F: FnOnce(&mut TypeScriptParser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(dialect) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(TypeScriptParser::with_dialect(dialect)?)
            }
        };
        Ok(f(parser))
    })
}
