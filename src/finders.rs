//! Domain lookups built from the query primitives.
//!
//! Nothing here knows about routes or components; these are the recurring
//! shapes recipes ask for (imports, class members, a decorator's option) plus
//! the walk-up search for the closest module file.

use crate::host::{Host, HostError};
use crate::syntax::{find_nodes, source_nodes, Node, NodeQuery, SyntaxKind, SyntaxTree};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const MODULE_EXT: &str = ".module.ts";
pub const ROUTING_MODULE_EXT: &str = "-routing.module.ts";

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("no {what} found")]
    NoMatch { what: String },

    #[error("more than one {what} matches ({count} found)")]
    MoreThanOneMatch { what: String, count: usize },

    #[error("could not find an NgModule from {}", .dir.display())]
    NoModule { dir: PathBuf },

    #[error("could not find a non-routing NgModule from {}; modules with suffix '-routing.module.ts' are reserved for routing", .dir.display())]
    OnlyRoutingModules { dir: PathBuf },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Reduce `nodes` to the single expected match.
pub fn expect_unique<'t>(nodes: Vec<Node<'t>>, what: &str) -> Result<Node<'t>, FinderError> {
    match nodes.len() {
        0 => Err(FinderError::NoMatch {
            what: what.to_string(),
        }),
        1 => Ok(nodes[0]),
        count => Err(FinderError::MoreThanOneMatch {
            what: what.to_string(),
            count,
        }),
    }
}

pub fn find_imports(tree: &SyntaxTree) -> Vec<Node<'_>> {
    source_nodes(tree, Some(SyntaxKind::Import))
}

pub fn find_variable_declarations(tree: &SyntaxTree) -> Vec<Node<'_>> {
    source_nodes(tree, Some(SyntaxKind::VariableDeclaration))
}

pub fn find_property_declarations(tree: &SyntaxTree) -> Vec<Node<'_>> {
    source_nodes(tree, Some(SyntaxKind::Property))
}

pub fn find_method_declarations(tree: &SyntaxTree) -> Vec<Node<'_>> {
    source_nodes(tree, Some(SyntaxKind::Method))
}

pub fn find_constructor(tree: &SyntaxTree) -> Option<Node<'_>> {
    find_nodes(Some(tree.root()), &NodeQuery::new(SyntaxKind::Constructor).max(1))
        .into_iter()
        .next()
}

/// Properties, constructors and methods in document order.
pub fn class_members(tree: &SyntaxTree) -> Vec<Node<'_>> {
    tree.root()
        .descendants()
        .filter(|n| {
            matches!(
                n.kind(),
                SyntaxKind::Property | SyntaxKind::Constructor | SyntaxKind::Method
            )
        })
        .collect()
}

/// The identifier that names `node`: its first identifier child, or failing
/// that, the first identifier anywhere below it.
pub fn leading_identifier<'t>(node: Node<'t>) -> Option<Node<'t>> {
    node.children()
        .find(|c| c.kind() == SyntaxKind::Identifier)
        .or_else(|| {
            node.descendants()
                .skip(1)
                .find(|c| c.kind() == SyntaxKind::Identifier)
        })
}

/// Whether `node` is named `name`.
pub fn is_named(node: Node<'_>, name: &str) -> bool {
    leading_identifier(node).is_some_and(|id| id.text() == name)
}

/// The unique decorator called `name`, e.g. `NgModule`.
pub fn find_decorator<'t>(tree: &'t SyntaxTree, name: &str) -> Result<Node<'t>, FinderError> {
    let decorators = source_nodes(tree, Some(SyntaxKind::Decorator))
        .into_iter()
        .filter(|d| is_named(*d, name))
        .collect();
    expect_unique(decorators, &format!("@{name} decorator"))
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '\'' || c == '"' || c == '`')
}

/// Value of the `key:` entry in a decorator's options object.
pub fn find_decorator_property<'t>(decorator: Node<'t>, key: &str) -> Option<Node<'t>> {
    let options = find_nodes(
        Some(decorator),
        &NodeQuery::new(SyntaxKind::ObjectLiteral).max(1),
    )
    .into_iter()
    .next()?;

    let pair = options
        .children()
        .filter(|c| c.kind() == SyntaxKind::PropertyAssignment)
        .find(|pair| {
            pair.children()
                .next()
                .is_some_and(|k| strip_quotes(k.text()) == key)
        })?;

    let mut parts = pair.children();
    parts.next()?;
    parts.last()
}

/// Initializer of the unique variable declaration named `name`.
pub fn find_variable_initializer<'t>(
    tree: &'t SyntaxTree,
    name: &str,
) -> Result<Node<'t>, FinderError> {
    let what = format!("initializer of '{name}'");
    let declarations = find_variable_declarations(tree)
        .into_iter()
        .filter(|d| is_named(*d, name))
        .collect();
    let declaration = expect_unique(declarations, &format!("declaration of '{name}'"))?;

    let name_node = leading_identifier(declaration);
    declaration
        .children()
        .last()
        .filter(|value| Some(*value) != name_node && value.grammar_kind() != "type_annotation")
        .ok_or(FinderError::NoMatch { what })
}

/// Closest `*.module.ts` at or above `dir`, ignoring routing modules.
///
/// With `module` set, only files whose name ends in `<module>.module.ts`
/// are considered. This is a suffix match, so `icons` also finds
/// `myicons.module.ts`.
pub fn find_module<H: Host + ?Sized>(
    host: &H,
    dir: impl AsRef<Path>,
    module: Option<&str>,
) -> Result<PathBuf, FinderError> {
    let start = dir.as_ref();
    let module_suffix = format!("{}{MODULE_EXT}", module.unwrap_or(""));
    let routing_suffix = format!("{}{ROUTING_MODULE_EXT}", module.unwrap_or(""));
    let mut found_routing = false;

    let mut current = Some(start);
    while let Some(dir) = current {
        let candidates: Vec<PathBuf> = host
            .list_dir(dir)?
            .into_iter()
            .filter(|p| host.exists(p))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(&module_suffix))
            })
            .collect();
        let total = candidates.len();
        let mut modules: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|p| {
                !p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(&routing_suffix))
            })
            .collect();
        found_routing |= modules.len() != total;

        match modules.len() {
            0 => current = dir.parent(),
            1 => {
                let found = modules.remove(0);
                debug!(module = %found.display(), "found module");
                return Ok(found);
            }
            count => {
                return Err(FinderError::MoreThanOneMatch {
                    what: format!("module in {}", dir.display()),
                    count,
                })
            }
        }
    }

    if found_routing {
        Err(FinderError::OnlyRoutingModules {
            dir: start.to_path_buf(),
        })
    } else {
        Err(FinderError::NoModule {
            dir: start.to_path_buf(),
        })
    }
}
