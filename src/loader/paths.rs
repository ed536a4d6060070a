//! Type-name to resource-path resolution.
//!
//! Dotted names map to slash paths with a fixed extension. A configured
//! namespace-prefix table rebases the leading segments; the longest matching
//! prefix wins. Cache busting appends a query parameter to the fetch URL
//! only, so resolved paths stay stable record keys.

use std::cell::Cell;

#[derive(Debug)]
pub struct PathResolver {
    /// (namespace prefix, base path), kept sorted longest-prefix-first.
    prefixes: Vec<(String, String)>,
    extension: String,
    disable_caching: bool,
    cache_param: String,
    stamp: Cell<u64>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            extension: ".json".to_string(),
            disable_caching: false,
            cache_param: "_dc".to_string(),
            stamp: Cell::new(0),
        }
    }
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    pub fn with_cache_busting(mut self, enabled: bool, param: &str) -> Self {
        self.disable_caching = enabled;
        self.cache_param = param.to_string();
        self
    }

    /// Map a namespace prefix to a base path. Longest prefix wins at
    /// resolution time; re-registering a prefix overwrites its base.
    pub fn set_path(&mut self, prefix: &str, base: &str) {
        self.prefixes.retain(|(p, _)| p != prefix);
        self.prefixes
            .push((prefix.to_string(), base.trim_end_matches('/').to_string()));
        self.prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Resolve a type name to its compilation-unit path. Stable per name:
    /// this is the FetchRecord key.
    pub fn resolve(&self, name: &str) -> String {
        for (prefix, base) in &self.prefixes {
            if name == prefix {
                return format!("{}{}", base, self.extension);
            }
            if let Some(rest) = name.strip_prefix(prefix.as_str()) {
                if let Some(rest) = rest.strip_prefix('.') {
                    let tail = rest.replace('.', "/");
                    if base.is_empty() {
                        return format!("{}{}", tail, self.extension);
                    }
                    return format!("{}/{}{}", base, tail, self.extension);
                }
            }
        }
        format!("{}{}", name.replace('.', "/"), self.extension)
    }

    /// URL actually handed to the unit source, cache buster included.
    pub fn fetch_url(&self, path: &str) -> String {
        if !self.disable_caching {
            return path.to_string();
        }
        let stamp = self.stamp.get().wrapping_add(1);
        self.stamp.set(stamp);
        format!("{}?{}={}", path, self.cache_param, stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let resolver = PathResolver::new();
        assert_eq!(resolver.resolve("Ui.button.Split"), "Ui/button/Split.json");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut resolver = PathResolver::new();
        resolver.set_path("Ui", "lib/ui");
        resolver.set_path("Ui.chart", "packages/charts");

        assert_eq!(resolver.resolve("Ui.Panel"), "lib/ui/Panel.json");
        assert_eq!(
            resolver.resolve("Ui.chart.Axis"),
            "packages/charts/Axis.json"
        );
    }

    #[test]
    fn test_prefix_matches_whole_segments_only() {
        let mut resolver = PathResolver::new();
        resolver.set_path("Ui", "lib/ui");
        // "Uikit" must not match the "Ui" prefix
        assert_eq!(resolver.resolve("Uikit.Panel"), "Uikit/Panel.json");
    }

    #[test]
    fn test_cache_busting_touches_url_not_path() {
        let resolver = PathResolver::new().with_cache_busting(true, "_dc");
        let path = resolver.resolve("Ui.Panel");
        let first = resolver.fetch_url(&path);
        let second = resolver.fetch_url(&path);

        assert!(first.starts_with("Ui/Panel.json?_dc="));
        assert_ne!(first, second);
        // the record key itself never changes
        assert_eq!(resolver.resolve("Ui.Panel"), path);
    }

    #[test]
    fn test_custom_extension() {
        let resolver = PathResolver::new().with_extension(".unit");
        assert_eq!(resolver.resolve("A.B"), "A/B.unit");
    }
}
