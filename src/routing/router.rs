//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store flattened procedure entries, one matcher tree per HTTP method
//! - Look up the entry addressed by a `(method, path)` pair
//! - Distinguish "unknown path" from "known path, other method"
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Duplicate `(method, path)` registrations are setup errors, never runtime ones
//! - Explicit NotFound rather than silent default

use std::collections::{HashMap, HashSet};

use crate::error::SetupError;
use crate::procedure::{HttpMethod, ProcedureEntry};
use crate::routing::matcher::{normalize_path, Params, PathPattern};

struct Route<C> {
    entry: ProcedureEntry<C>,
    pattern: PathPattern,
}

/// The result of a route lookup.
#[derive(Debug)]
pub enum RouteLookup<'a, C> {
    Found(RouteMatch<'a, C>),
    /// The path exists, but only under these methods.
    MethodNotAllowed(Vec<HttpMethod>),
    NotFound,
}

/// A matched entry plus the parameters captured from the path.
#[derive(Debug)]
pub struct RouteMatch<'a, C> {
    pub entry: &'a ProcedureEntry<C>,
    pub path_params: Params,
}

/// Method + path routing table over flattened procedures.
pub struct RouteTable<C> {
    trees: HashMap<HttpMethod, matchit::Router<usize>>,
    routes: Vec<Route<C>>,
}

impl<C> RouteTable<C> {
    /// Register every entry. Fails on duplicates or patterns the matcher rejects.
    pub fn build(entries: Vec<ProcedureEntry<C>>) -> Result<Self, SetupError> {
        let mut trees: HashMap<HttpMethod, matchit::Router<usize>> = HashMap::new();
        let mut routes = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();

        for entry in entries {
            let pattern = PathPattern::parse(&entry.path).map_err(|reason| SetupError::InvalidPath {
                procedure: entry.name.clone(),
                path: entry.path.clone(),
                reason,
            })?;

            if !seen.insert((entry.method, pattern.shape().to_string())) {
                return Err(SetupError::DuplicateRoute {
                    method: entry.method,
                    path: entry.path.clone(),
                    procedure: entry.name.clone(),
                });
            }

            trees
                .entry(entry.method)
                .or_insert_with(matchit::Router::new)
                .insert(pattern.route(), routes.len())
                .map_err(|e| SetupError::InvalidPath {
                    procedure: entry.name.clone(),
                    path: entry.path.clone(),
                    reason: e.to_string(),
                })?;

            routes.push(Route { entry, pattern });
        }

        Ok(Self { trees, routes })
    }

    /// Find the entry addressed by `method` and `path`.
    pub fn resolve(&self, method: HttpMethod, path: &str) -> RouteLookup<'_, C> {
        let normalized = normalize_path(path);
        let lowered = normalized.to_lowercase();

        if let Some(route) = self.lookup(method, &lowered) {
            return RouteLookup::Found(RouteMatch {
                entry: &route.entry,
                path_params: route.pattern.capture(&normalized),
            });
        }

        let allowed: Vec<HttpMethod> = HttpMethod::ALL
            .into_iter()
            .filter(|other| *other != method && self.lookup(*other, &lowered).is_some())
            .collect();

        if allowed.is_empty() {
            RouteLookup::NotFound
        } else {
            RouteLookup::MethodNotAllowed(allowed)
        }
    }

    fn lookup(&self, method: HttpMethod, lowered: &str) -> Option<&Route<C>> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(lowered).ok()?;
        self.routes.get(*matched.value)
    }

    /// All registered entries, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &ProcedureEntry<C>> {
        self.routes.iter().map(|route| &route.entry)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{flatten, Output, Procedure, ProcedureTree};

    fn table(tree: ProcedureTree<()>) -> RouteTable<()> {
        RouteTable::build(flatten(&tree).unwrap()).unwrap()
    }

    fn echo() -> Procedure<()> {
        Procedure::query(|_| async { Ok(Output::from("echo")) })
    }

    fn found<'a>(lookup: RouteLookup<'a, ()>) -> RouteMatch<'a, ()> {
        match lookup {
            RouteLookup::Found(m) => m,
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_case_and_trailing_slash_tolerance() {
        let routes = table(ProcedureTree::new().procedure("echo", echo().path("/echo/:name")));

        for path in ["/echo/neko", "/echo/neko/", "/ECHO/neko", "//echo//neko"] {
            let m = found(routes.resolve(HttpMethod::Get, path));
            assert_eq!(m.entry.name, "echo");
            assert_eq!(m.path_params.get("name").map(String::as_str), Some("neko"));
        }
    }

    #[test]
    fn test_method_mismatch() {
        let routes = table(ProcedureTree::new().procedure("echo", echo().path("/echo/:name")));

        match routes.resolve(HttpMethod::Post, "/echo/neko") {
            RouteLookup::MethodNotAllowed(allowed) => assert_eq!(allowed, vec![HttpMethod::Get]),
            other => panic!("unexpected lookup {other:?}"),
        }
        assert!(matches!(
            routes.resolve(HttpMethod::Get, "/nowhere"),
            RouteLookup::NotFound
        ));
    }

    #[test]
    fn test_static_segment_beats_parameter() {
        let routes = table(
            ProcedureTree::new()
                .procedure("byId", echo().path("/users/:id"))
                .procedure("me", echo().path("/users/me")),
        );

        assert_eq!(found(routes.resolve(HttpMethod::Get, "/users/me")).entry.name, "me");
        assert_eq!(found(routes.resolve(HttpMethod::Get, "/users/42")).entry.name, "byId");
    }

    #[test]
    fn test_duplicate_route_is_setup_error() {
        let tree = ProcedureTree::new()
            .procedure("a", echo().path("/items/:id"))
            .procedure("b", echo().path("/Items/:itemId/"));

        let err = RouteTable::build(flatten(&tree).unwrap()).err().unwrap();
        assert!(matches!(err, SetupError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_same_path_different_methods() {
        let routes = table(
            ProcedureTree::new()
                .procedure("get", echo().path("/thing"))
                .procedure(
                    "put",
                    Procedure::mutation(|_| async { Ok(Output::from("put")) })
                        .method(HttpMethod::Put)
                        .path("/thing"),
                ),
        );

        assert_eq!(routes.len(), 2);
        assert_eq!(found(routes.resolve(HttpMethod::Put, "/thing")).entry.name, "put");
        assert_eq!(found(routes.resolve(HttpMethod::Get, "/thing")).entry.name, "get");
    }
}
