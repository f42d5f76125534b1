//! Route resolution logic.
//!
//! # Responsibilities
//! - Select the route entry for a request path
//! - Strip the matched prefix to produce the path to forward
//!
//! # Design Decisions
//! - Last-match-wins over the declared order, not longest-prefix-wins:
//!   operators declare specific overrides *after* general routes
//! - Falls back to the "/" entry when nothing matches
//! - No regex; plain string prefix comparison

use url::Url;

use crate::config::RouteEntry;

/// Outcome of resolving a request path against a route table.
#[derive(Debug)]
pub struct ResolvedRoute<'a> {
    /// The prefix that matched.
    pub prefix: &'a str,

    /// The winning route entry.
    pub route: &'a RouteEntry,

    /// Request path with the matched prefix stripped; never empty.
    pub forward_path: String,
}

/// Resolve `path` against `routes` in declaration order.
///
/// Scans for the last declared entry whose prefix is a string prefix of
/// the path; if two entries both match, the later declaration wins
/// regardless of prefix length. Returns `None` only when nothing matches
/// and no `"/"` entry exists.
pub fn resolve<'a>(path: &str, routes: &'a [RouteEntry]) -> Option<ResolvedRoute<'a>> {
    let route = routes
        .iter()
        .rev()
        .find(|r| path.starts_with(r.prefix.as_str()))
        .or_else(|| routes.iter().find(|r| r.prefix == "/"))?;

    let stripped = path.strip_prefix(route.prefix.as_str()).unwrap_or(path);
    let forward_path = if stripped.is_empty() { "/" } else { stripped };

    Some(ResolvedRoute {
        prefix: &route.prefix,
        route,
        forward_path: forward_path.to_string(),
    })
}

impl ResolvedRoute<'_> {
    /// Join the forwarded path (and optional query) onto the route target.
    pub fn backend_url(&self, query: Option<&str>) -> Result<Url, url::ParseError> {
        let mut url = self.route.target.join(&self.forward_path)?;
        url.set_query(query);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteKind;

    fn routes(prefixes: &[&str]) -> Vec<RouteEntry> {
        prefixes
            .iter()
            .map(|p| RouteEntry {
                prefix: p.to_string(),
                kind: RouteKind::Forward,
                target: "https://backend.example.com".parse().unwrap(),
            })
            .collect()
    }

    #[test]
    fn last_declared_match_wins() {
        let table = routes(&["/", "/api", "/api/v2"]);

        let hit = resolve("/api/v2/users", &table).unwrap();
        assert_eq!(hit.prefix, "/api/v2");
        assert_eq!(hit.forward_path, "/users");

        let hit = resolve("/api/v1/users", &table).unwrap();
        assert_eq!(hit.prefix, "/api");
        assert_eq!(hit.forward_path, "/v1/users");
    }

    #[test]
    fn later_general_entry_beats_earlier_specific_one() {
        // Declaration order decides, not prefix length.
        let table = routes(&["/api/v2", "/api"]);
        let hit = resolve("/api/v2/users", &table).unwrap();
        assert_eq!(hit.prefix, "/api");
    }

    #[test]
    fn empty_stripped_path_becomes_root() {
        let table = routes(&["/", "/api"]);
        let hit = resolve("/api", &table).unwrap();
        assert_eq!(hit.forward_path, "/");
    }

    #[test]
    fn falls_back_to_root_entry() {
        let table = routes(&["/", "/api"]);
        let hit = resolve("/assets/logo.png", &table).unwrap();
        assert_eq!(hit.prefix, "/");
        assert_eq!(hit.forward_path, "assets/logo.png");
        assert_eq!(
            hit.backend_url(None).unwrap().as_str(),
            "https://backend.example.com/assets/logo.png"
        );
    }

    #[test]
    fn no_root_entry_means_no_match() {
        let table = routes(&["/api"]);
        assert!(resolve("/other", &table).is_none());
    }

    #[test]
    fn backend_url_carries_the_query() {
        let table = routes(&["/", "/api"]);
        let hit = resolve("/api/users", &table).unwrap();
        let url = hit.backend_url(Some("page=2")).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/users?page=2");
    }
}
