pub const DEFAULT_TARGET_FORMAT: &str = "text/html";
pub const DEFAULT_MAX_PARTIAL_DEPTH: usize = 64;

/// Settings a [`Template`](crate::Template) renders with.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderOptions {
    /// Format name handed to the escaping delegates. Formats no delegate
    /// handles are escaped as HTML.
    pub target_format: String,
    /// How deeply partials may include each other before rendering fails.
    pub max_partial_depth: usize,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_target_format<F: Into<String>>(mut self, target_format: F) -> Self {
        self.target_format = target_format.into();
        self
    }

    #[must_use]
    pub fn with_max_partial_depth(mut self, max_partial_depth: usize) -> Self {
        self.max_partial_depth = max_partial_depth;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            target_format: DEFAULT_TARGET_FORMAT.to_string(),
            max_partial_depth: DEFAULT_MAX_PARTIAL_DEPTH,
        }
    }
}
