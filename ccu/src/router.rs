/// Answers whether a site relative path is served by the site being purged.
pub trait SiteRouter: Send + Sync {
    fn is_known_route(&self, path: &str) -> bool;
}

/// Treats every path as routable. Used when no route list is configured.
pub struct AnyRoute;

impl SiteRouter for AnyRoute {
    fn is_known_route(&self, _path: &str) -> bool {
        true
    }
}

/// Matches paths against a fixed list. A pattern ending in `*` matches every
/// path sharing its prefix, any other pattern must match exactly.
pub struct RoutePatterns {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl RoutePatterns {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = Vec::new();
        let mut prefixes = Vec::new();

        for pattern in patterns {
            let pattern = canonical(pattern.as_ref());
            match pattern.strip_suffix('*') {
                Some(prefix) => prefixes.push(prefix.to_string()),
                None => exact.push(pattern),
            }
        }

        RoutePatterns { exact, prefixes }
    }
}

impl SiteRouter for RoutePatterns {
    fn is_known_route(&self, path: &str) -> bool {
        let path = canonical(path);
        // Drop the query string, routes are matched on the path only.
        let path = path.split(['?', '#']).next().unwrap_or_default();

        self.exact.iter().any(|route| route == path)
            || self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

fn canonical(path: &str) -> String {
    format!("/{}", path.trim().trim_start_matches('/'))
}
