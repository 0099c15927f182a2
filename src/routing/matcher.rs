//! Route matching logic.
//!
//! # Responsibilities
//! - Group routes by method
//! - Compare request path segments against template segments
//! - Pick the most specific route when several match
//!
//! # Design Decisions
//! - Literal segments match identical text only (case-sensitive)
//! - Parameters match exactly one non-empty segment
//! - Full-length match required unless the template ends in a wildcard
//! - Candidate lists are pre-sorted by specificity, so the first match wins:
//!   (a) more leading literal segments, (b) fewer parameters,
//!   (c) no wildcard, (d) declaration order
//! - No regex to guarantee O(segments) per candidate

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::routing::table::Route;
use crate::routing::template::{split_path, PathParams, PathTemplate, Segment};

/// A matched route plus the parameters captured from the path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: PathParams,
}

/// Method-grouped, specificity-ordered candidate lists.
#[derive(Debug, Default)]
pub struct Matcher {
    by_method: HashMap<Method, Vec<usize>>,
    any_method: Vec<usize>,
}

type Rank = (Reverse<usize>, usize, bool, usize);

fn rank(route: &Route, index: usize) -> Rank {
    (
        Reverse(route.upstream.literal_prefix_len()),
        route.upstream.param_count(),
        route.upstream.has_wildcard(),
        index,
    )
}

impl Matcher {
    /// Index `routes` (in declaration order).
    pub fn new(routes: &[Arc<Route>]) -> Self {
        let sorted = |filter: &dyn Fn(&Route) -> bool| {
            let mut indices: Vec<usize> = (0..routes.len()).filter(|&i| filter(&routes[i])).collect();
            indices.sort_by_key(|&i| rank(&routes[i], i));
            indices
        };

        let any_method = sorted(&|r: &Route| r.methods.is_empty());

        let mut by_method = HashMap::new();
        for route in routes {
            for method in &route.methods {
                if by_method.contains_key(method) {
                    continue;
                }
                let list = sorted(&|r: &Route| r.allows(method));
                by_method.insert(method.clone(), list);
            }
        }

        Self { by_method, any_method }
    }

    /// Find the best route for `method` and `path`.
    pub fn find(&self, routes: &[Arc<Route>], method: &Method, path: &str) -> Option<RouteMatch> {
        let candidates = self.by_method.get(method).unwrap_or(&self.any_method);
        let segments: Vec<&str> = split_path(path).collect();

        candidates.iter().find_map(|&i| {
            let route = &routes[i];
            match_template(&route.upstream, &segments).map(|params| RouteMatch {
                route: route.clone(),
                params,
            })
        })
    }
}

/// Match path segments against a template, capturing parameters.
pub fn match_template(template: &PathTemplate, segments: &[&str]) -> Option<PathParams> {
    let mut params = PathParams::new();
    let mut i = 0;

    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => {
                if *segments.get(i)? != text.as_str() {
                    return None;
                }
                i += 1;
            }
            Segment::Param(name) => {
                params.push(name.as_str(), *segments.get(i)?);
                i += 1;
            }
            Segment::Wildcard(name) => {
                params.push(name.as_str(), segments[i..].join("/"));
                return Some(params);
            }
        }
    }

    (i == segments.len()).then_some(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::test_support::{route_config, table_from};

    fn segs(path: &str) -> Vec<&str> {
        split_path(path).collect()
    }

    #[test]
    fn template_matching() {
        let t = PathTemplate::parse("/api/items/{id}").unwrap();
        let params = match_template(&t, &segs("/api/items/42")).unwrap();
        assert_eq!(params.get("id"), Some("42"));

        assert!(match_template(&t, &segs("/api/items")).is_none());
        assert!(match_template(&t, &segs("/api/items/42/extra")).is_none(), "no prefix truncation");
        assert!(match_template(&t, &segs("/api/Items/42")).is_none(), "case-sensitive");

        let w = PathTemplate::parse("/static/{*rest}").unwrap();
        assert_eq!(
            match_template(&w, &segs("/static/css/site.css")).unwrap().get("rest"),
            Some("css/site.css")
        );
        assert_eq!(match_template(&w, &segs("/static")).unwrap().get("rest"), Some(""));
    }

    #[test]
    fn literal_beats_parameter() {
        let table = table_from(vec![
            route_config("by_id", &["GET"], "/users/{id}", "/users/{id}"),
            route_config("active", &["GET"], "/users/active", "/users/active"),
        ]);

        let m = table.lookup(&Method::GET, "/users/active").unwrap();
        assert_eq!(m.route.name, "active");

        let m = table.lookup(&Method::GET, "/users/7").unwrap();
        assert_eq!(m.route.name, "by_id");
        assert_eq!(m.params.get("id"), Some("7"));
    }

    #[test]
    fn longer_literal_prefix_then_fewer_params() {
        let table = table_from(vec![
            route_config("generic", &["GET"], "/{a}/{b}/{c}", "/"),
            route_config("one_param", &["GET"], "/v1/{b}/orders", "/"),
            route_config("two_params", &["GET"], "/v1/{b}/{c}", "/"),
        ]);

        assert_eq!(table.lookup(&Method::GET, "/v1/x/orders").unwrap().route.name, "one_param");
        assert_eq!(table.lookup(&Method::GET, "/v1/x/y").unwrap().route.name, "two_params");
        assert_eq!(table.lookup(&Method::GET, "/v2/x/y").unwrap().route.name, "generic");
    }

    #[test]
    fn wildcard_loses_to_exact_and_declaration_order_breaks_ties() {
        let table = table_from(vec![
            route_config("catch_all", &["GET"], "/files/{*rest}", "/"),
            route_config("single", &["GET"], "/files/{name}", "/"),
            route_config("first", &["GET"], "/{a}/b/{c}", "/"),
            route_config("second", &["GET", "POST"], "/{a}/{b}/c", "/"),
        ]);

        assert_eq!(table.lookup(&Method::GET, "/files/a.txt").unwrap().route.name, "single");
        assert_eq!(table.lookup(&Method::GET, "/files/a/b.txt").unwrap().route.name, "catch_all");

        // Same literal prefix, same param count: first declared wins.
        assert_eq!(table.lookup(&Method::GET, "/1/b/c").unwrap().route.name, "first");
        assert_eq!(table.lookup(&Method::POST, "/1/b/c").unwrap().route.name, "second");
        assert_eq!(table.lookup(&Method::GET, "/1/x/c").unwrap().route.name, "second");
    }

    #[test]
    fn declaration_order_flips_the_tie() {
        let table = table_from(vec![
            route_config("second", &["GET"], "/{a}/{b}/c", "/"),
            route_config("first", &["GET"], "/{a}/b/{c}", "/"),
        ]);
        assert_eq!(table.lookup(&Method::GET, "/1/b/c").unwrap().route.name, "second");
    }

    #[test]
    fn methods_are_respected() {
        let table = table_from(vec![
            route_config("get_only", &["GET"], "/bill", "/"),
            route_config("anything", &[], "/any", "/"),
        ]);

        assert!(table.lookup(&Method::GET, "/bill").is_some());
        assert!(table.lookup(&Method::POST, "/bill").is_none());
        assert!(table.lookup(&Method::DELETE, "/any").is_some());
        assert!(table.lookup(&Method::GET, "/any").is_some());
    }

    #[test]
    fn lookup_is_deterministic() {
        let table = table_from(vec![
            route_config("a", &["GET"], "/{x}/two/{z}", "/"),
            route_config("b", &["GET"], "/{x}/{y}/three", "/"),
            route_config("c", &[], "/{*all}", "/"),
        ]);

        for _ in 0..100 {
            assert_eq!(table.lookup(&Method::GET, "/one/two/three").unwrap().route.name, "a");
            assert_eq!(table.lookup(&Method::GET, "/one/four/three").unwrap().route.name, "b");
            assert_eq!(table.lookup(&Method::DELETE, "/one/two/three").unwrap().route.name, "c");
        }
    }
}
