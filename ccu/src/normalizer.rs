//! Turns user supplied paths into the fully qualified URLs the CCU API indexes on.

use indexmap::IndexSet;
use std::sync::Arc;
use url::Url;

use crate::error::{CcuError, PathError, Result};
use crate::router::SiteRouter;
use crate::types::ValidationMode;

pub struct UrlNormalizer {
    base_url: String,
    router: Arc<dyn SiteRouter>,
}

/// Outcome of normalizing a batch. `urls` keeps first-seen order without duplicates.
#[derive(Debug, Default, PartialEq)]
pub struct NormalizedUrls {
    pub urls: Vec<String>,
    pub invalid: Vec<PathError>,
}

impl NormalizedUrls {
    /// Applies the validation policy. Strict mode fails on any invalid path,
    /// lenient mode only fails when nothing is left to purge.
    pub fn enforce(self, mode: ValidationMode) -> Result<Self> {
        if self.urls.is_empty() && self.invalid.is_empty() {
            return Err(CcuError::InvalidArgument("no URLs to purge".into()));
        }

        match mode {
            ValidationMode::Strict if !self.invalid.is_empty() => {
                Err(CcuError::InvalidPaths(self.invalid))
            }
            _ if self.urls.is_empty() => Err(CcuError::InvalidPaths(self.invalid)),
            _ => Ok(self),
        }
    }
}

impl UrlNormalizer {
    pub fn new(base_url: &str, router: Arc<dyn SiteRouter>) -> Self {
        UrlNormalizer {
            base_url: base_url.trim_end_matches('/').to_string(),
            router,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn normalize(&self, raw_path: &str) -> Result<String, PathError> {
        let path = raw_path.trim();
        if path.is_empty() {
            return Err(PathError::new(raw_path, "path is empty"));
        }

        match Url::parse(path) {
            Ok(url) if url.has_host() && matches!(url.scheme(), "http" | "https") => {
                return Ok(path.to_string());
            }
            Ok(_) => return Err(PathError::new(raw_path, "only http(s) URLs can be purged")),
            Err(url::ParseError::RelativeUrlWithoutBase) => {}
            Err(e) => return Err(PathError::new(raw_path, format!("malformed URL: {e}"))),
        }

        let relative = path.trim_start_matches('/');
        if !self.router.is_known_route(relative) {
            return Err(PathError::new(raw_path, "path does not match a known route"));
        }

        let qualified = format!("{}/{}", self.base_url, relative);
        Url::parse(&qualified)
            .map_err(|e| PathError::new(raw_path, format!("malformed URL: {e}")))?;

        Ok(qualified)
    }

    /// Normalizes every path, collecting failures instead of stopping at the first.
    pub fn normalize_many<I, S>(&self, raw_paths: I) -> NormalizedUrls
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut urls = IndexSet::new();
        let mut invalid = Vec::new();

        for raw in raw_paths {
            match self.normalize(raw.as_ref()) {
                Ok(url) => {
                    urls.insert(url);
                }
                Err(e) => invalid.push(e),
            }
        }

        NormalizedUrls {
            urls: urls.into_iter().collect(),
            invalid,
        }
    }

    pub fn is_managed_url(&self, url: &str) -> bool {
        is_managed_url(url, &self.base_url)
    }
}

/// Validates CP codes, which are purged as given rather than qualified
/// against the site. Same ordering and dedup rules as URLs.
pub fn normalize_cp_codes<I, S>(raw_codes: I) -> NormalizedUrls
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut codes = IndexSet::new();
    let mut invalid = Vec::new();

    for raw in raw_codes {
        let raw = raw.as_ref();
        let code = raw.trim();
        if code.is_empty() {
            invalid.push(PathError::new(raw, "CP code is empty"));
        } else if !code.chars().all(|c| c.is_ascii_digit()) {
            invalid.push(PathError::new(raw, "CP code must be numeric"));
        } else {
            codes.insert(code.to_string());
        }
    }

    NormalizedUrls {
        urls: codes.into_iter().collect(),
        invalid,
    }
}

/// Same-origin check by prefix. Does not parse the URL authority, but the
/// prefix must end on a path, query or fragment boundary.
pub fn is_managed_url(url: &str, base_url: &str) -> bool {
    let base = base_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return false;
    }

    match url.trim().strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}
