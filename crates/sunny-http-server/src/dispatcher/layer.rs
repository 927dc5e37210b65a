//! Dispatch stack entries

use http::Method;

use super::Handler;

/// What a layer matches on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerKind {
    /// Prefix mount; an empty prefix is the root and matches every path
    Mount { prefix: String },
    /// Exact method and path
    Route { method: Method, path: String },
}

/// One registered entry in the dispatch stack. Immutable once built.
#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    handlers: Vec<Handler>,
}

impl Layer {
    /// Prefix-mounted handlers. `"/"`, `""` and trailing slashes are normalized.
    pub fn mount(prefix: &str, handlers: Vec<Handler>) -> Self {
        Self {
            kind: LayerKind::Mount {
                prefix: prefix.trim_end_matches('/').to_string(),
            },
            handlers,
        }
    }

    /// Exact method and path route
    pub fn route(method: Method, path: &str, handlers: Vec<Handler>) -> Self {
        Self {
            kind: LayerKind::Route {
                method,
                path: path.to_string(),
            },
            handlers,
        }
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Whether this layer applies to a request
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        match &self.kind {
            LayerKind::Mount { prefix } => mount_matches(prefix, path),
            LayerKind::Route {
                method: route_method,
                path: route_path,
            } => route_method == method && route_path == path,
        }
    }

    /// Path the layer's handlers see, or `None` when it is unchanged
    pub(crate) fn rewrite_path(&self, path: &str) -> Option<String> {
        match &self.kind {
            LayerKind::Mount { prefix } if !prefix.is_empty() => {
                let rest = path.get(prefix.len()..).unwrap_or_default();
                Some(if rest.is_empty() {
                    "/".to_string()
                } else {
                    rest.to_string()
                })
            }
            _ => None,
        }
    }
}

fn mount_matches(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
