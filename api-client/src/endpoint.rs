//! Endpoint descriptors and URL resolution.

/// A path (relative to the client's base URL, or absolute) plus query parameters.
///
/// Query parameters with no value are dropped rather than sent empty, so optional filters can be
/// passed straight through with [`Endpoint::query_opt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends a query parameter only if `value` is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// The path with its query string attached.
    ///
    /// Uses `&` if the path already carries a query string of its own.
    pub fn resolve(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query}", self.path)
    }

    /// [`Self::resolve`], with a leading `/` added to relative paths.
    pub(crate) fn normalized(&self) -> String {
        let resolved = self.resolve();
        if is_absolute(&resolved) || resolved.starts_with('/') {
            resolved
        } else {
            format!("/{resolved}")
        }
    }

    /// The full URL for this endpoint against `base_url`.
    ///
    /// Absolute endpoints ignore the base URL entirely.
    pub(crate) fn url(&self, base_url: &str) -> String {
        let normalized = self.normalized();
        if is_absolute(&normalized) {
            normalized
        } else {
            format!("{}{normalized}", base_url.trim_end_matches('/'))
        }
    }
}

fn is_absolute(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}

impl From<&str> for Endpoint {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for Endpoint {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&String> for Endpoint {
    fn from(path: &String) -> Self {
        Self::new(path.as_str())
    }
}
