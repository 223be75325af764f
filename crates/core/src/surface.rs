//! Surface Catalog
//!
//! The ordered, statically declared list of navigable dashboard locations
//! that forms the crawl domain. A surface is identified by `(route, subtab)`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Route of the chat surface used by the retrieval oracle.
pub const CHAT_ROUTE: &str = "/chat";

/// Whole route segments or subtab words marking evaluation and MCP
/// infrastructure surfaces.
const SMOKE_TOKENS: &[&str] = &["eval", "evaluate", "evaluation", "mcp"];

/// A navigable `(route, subtab)` location in the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UiSurface {
    /// Client-side route, e.g. `/rag`
    pub route: String,
    /// Optional sub-view within the route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtab: Option<String>,
    /// Human-readable label used in summaries
    pub label: String,
}

impl UiSurface {
    /// Create a surface without a sub-view.
    pub fn new(route: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            subtab: None,
            label: label.into(),
        }
    }

    /// Set the sub-view.
    pub fn with_subtab(mut self, subtab: impl Into<String>) -> Self {
        self.subtab = Some(subtab.into());
        self
    }

    /// `route|subtab`, the unit of seen-tracking together with a fingerprint.
    pub fn surface_key(&self) -> String {
        format!("{}|{}", self.route, self.subtab.as_deref().unwrap_or(""))
    }

    /// Path to navigate to, relative to the UI base URL.
    pub fn path(&self) -> String {
        match &self.subtab {
            Some(subtab) => format!("{}?subtab={}", self.route, subtab),
            None => self.route.clone(),
        }
    }

    /// Whether this surface is the chat surface.
    pub fn is_chat(&self) -> bool {
        self.route == CHAT_ROUTE && self.subtab.is_none()
    }

    /// Whether this surface is an evaluation or MCP infrastructure view.
    /// Matches whole tokens only, so `retrieval` is not an eval surface.
    pub fn is_smoke(&self) -> bool {
        let route_tokens = self.route.split('/');
        let subtab_tokens = self
            .subtab
            .as_deref()
            .unwrap_or("")
            .split(|c: char| c == '-' || c == '_' || c == '/');
        route_tokens
            .chain(subtab_tokens)
            .map(|token| token.to_ascii_lowercase())
            .any(|token| SMOKE_TOKENS.contains(&token.as_str()))
    }
}

impl std::fmt::Display for UiSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label, self.path())
    }
}

/// `surface_key|fingerprint`; processed at most once per run.
pub fn control_key(surface: &UiSurface, fingerprint: &str) -> String {
    format!("{}|{}", surface.surface_key(), fingerprint)
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    surface: Vec<UiSurface>,
}

/// Ordered list of surfaces with designated chat and smoke surfaces.
#[derive(Debug, Clone)]
pub struct SurfaceCatalog {
    surfaces: Vec<UiSurface>,
}

impl SurfaceCatalog {
    /// Build a catalog, rejecting duplicate `(route, subtab)` identities.
    pub fn new(surfaces: Vec<UiSurface>) -> CoreResult<Self> {
        if surfaces.is_empty() {
            return Err(CoreError::validation("surface catalog is empty"));
        }
        let mut identities = HashSet::new();
        for surface in &surfaces {
            if !surface.route.starts_with('/') {
                return Err(CoreError::validation(format!(
                    "surface route must start with '/': {}",
                    surface.route
                )));
            }
            if !identities.insert((surface.route.clone(), surface.subtab.clone())) {
                return Err(CoreError::validation(format!(
                    "duplicate surface: {}",
                    surface.surface_key()
                )));
            }
        }
        Ok(Self { surfaces })
    }

    /// Parse a `[[surface]]` TOML catalog.
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| CoreError::parse(format!("invalid surface catalog: {}", e)))?;
        Self::new(file.surface)
    }

    /// Load a TOML catalog from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The surfaces in crawl order.
    pub fn surfaces(&self) -> &[UiSurface] {
        &self.surfaces
    }

    /// Every surface except `origin`.
    pub fn others<'a>(&'a self, origin: &'a UiSurface) -> impl Iterator<Item = &'a UiSurface> {
        self.surfaces.iter().filter(move |s| *s != origin)
    }

    /// The chat surface; falls back to a bare `/chat` surface when the
    /// catalog does not list one.
    pub fn chat(&self) -> UiSurface {
        self.surfaces
            .iter()
            .find(|s| s.is_chat())
            .cloned()
            .unwrap_or_else(|| UiSurface::new(CHAT_ROUTE, "Chat"))
    }

    /// Evaluation and MCP infrastructure surfaces visited after probes.
    pub fn smoke_surfaces(&self) -> Vec<UiSurface> {
        self.surfaces
            .iter()
            .filter(|s| s.is_smoke())
            .cloned()
            .collect()
    }

    /// Number of surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the catalog is empty (never true for a constructed catalog).
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl Default for SurfaceCatalog {
    fn default() -> Self {
        Self {
            surfaces: vec![
                UiSurface::new("/dashboard", "Dashboard"),
                UiSurface::new(CHAT_ROUTE, "Chat"),
                UiSurface::new("/chat", "Chat settings").with_subtab("settings"),
                UiSurface::new("/rag", "Data quality").with_subtab("data-quality"),
                UiSurface::new("/rag", "Retrieval").with_subtab("retrieval"),
                UiSurface::new("/rag", "Reranker").with_subtab("reranker-config"),
                UiSurface::new("/rag", "Learning ranker").with_subtab("learning-ranker"),
                UiSurface::new("/rag", "Indexing").with_subtab("indexing"),
                UiSurface::new("/rag", "Graph").with_subtab("graph"),
                UiSurface::new("/rag", "Evaluate").with_subtab("evaluate"),
                UiSurface::new("/eval", "Eval analysis"),
                UiSurface::new("/infrastructure", "Services").with_subtab("services"),
                UiSurface::new("/infrastructure", "MCP").with_subtab("mcp"),
                UiSurface::new("/infrastructure", "Monitoring").with_subtab("monitoring"),
                UiSurface::new("/admin", "General").with_subtab("general"),
                UiSurface::new("/admin", "Integrations").with_subtab("integrations"),
            ],
        }
    }
}
