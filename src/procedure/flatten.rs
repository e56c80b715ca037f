//! Procedure tree flattening.
//!
//! Walks the tree once and resolves every leaf to a `(method, path)` pair.
//! Leaf paths are built from the group keys leading to the leaf, unless the
//! leaf declares an absolute path (leading `/`), which ignores the prefix.

use std::fmt;

use crate::error::SetupError;
use crate::procedure::{HttpMethod, Kind, Procedure, ProcedureNode, ProcedureTree};
use crate::routing::matcher::{normalize_path, validate_pattern};

/// A resolved leaf, ready for registration in the route table.
pub struct ProcedureEntry<C> {
    /// Dotted key path in the tree, e.g. `users.get`.
    pub name: String,
    /// Normalized absolute path pattern, e.g. `/users/:id`.
    pub path: String,
    pub method: HttpMethod,
    pub kind: Kind,
    pub procedure: Procedure<C>,
}

impl<C> Clone for ProcedureEntry<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            path: self.path.clone(),
            method: self.method,
            kind: self.kind,
            procedure: self.procedure.clone(),
        }
    }
}

impl<C> fmt::Debug for ProcedureEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureEntry")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Flatten a procedure tree into route entries.
pub fn flatten<C>(tree: &ProcedureTree<C>) -> Result<Vec<ProcedureEntry<C>>, SetupError> {
    let mut entries = Vec::new();
    let mut prefix = Vec::new();
    walk(tree, &mut prefix, &mut entries)?;
    Ok(entries)
}

fn walk<'a, C>(
    tree: &'a ProcedureTree<C>,
    prefix: &mut Vec<&'a str>,
    entries: &mut Vec<ProcedureEntry<C>>,
) -> Result<(), SetupError> {
    for (key, node) in tree.children() {
        prefix.push(key);
        match node {
            ProcedureNode::Group(group) => walk(group, prefix, entries)?,
            ProcedureNode::Leaf(procedure) => entries.push(resolve_entry(prefix, procedure)?),
        }
        prefix.pop();
    }
    Ok(())
}

fn resolve_entry<C>(prefix: &[&str], procedure: &Procedure<C>) -> Result<ProcedureEntry<C>, SetupError> {
    let name = prefix
        .iter()
        .filter(|key| !key.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(".");
    let meta = procedure.meta();
    let method = meta
        .method
        .unwrap_or_else(|| procedure.kind().default_method());

    let path = match meta.path.as_deref() {
        Some(explicit) if explicit.starts_with('/') => normalize_path(explicit),
        relative => {
            let joined = prefix
                .iter()
                .copied()
                .chain(relative)
                .collect::<Vec<_>>()
                .join("/");
            let path = normalize_path(&joined);
            if path == "/" {
                return Err(SetupError::MissingPath { procedure: name });
            }
            path
        }
    };

    validate_pattern(&path).map_err(|reason| SetupError::InvalidPath {
        procedure: name.clone(),
        path: path.clone(),
        reason,
    })?;

    Ok(ProcedureEntry {
        name,
        path,
        method,
        kind: procedure.kind(),
        procedure: procedure.clone(),
    })
}
