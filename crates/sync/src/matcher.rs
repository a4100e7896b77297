//! Path → resource type resolution.
//!
//! Providers register an ordered list of (pattern, resource type) pairs;
//! the first matching pattern wins. Patterns are segment-wise prefixes with
//! `*` matching any single segment.

use crate::mirror::ResourceType;

/// One collection pattern, e.g. `admin/directory/v1/users`.
#[derive(Debug, Clone)]
pub struct ResourceMatcher {
    segments: Vec<String>,
    pub resource_type: ResourceType,
}

impl ResourceMatcher {
    pub fn new(pattern: &str, resource_type: ResourceType) -> Self {
        Self {
            segments: pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            resource_type,
        }
    }

    /// Match against pre-split path segments. Returns the segment following
    /// the pattern (the entity id on single-entity paths), if any.
    fn match_segments(&self, path: &[&str]) -> Option<Option<String>> {
        if path.len() < self.segments.len() {
            return None;
        }
        for (pattern, segment) in self.segments.iter().zip(path) {
            if pattern != "*" && pattern != segment {
                return None;
            }
        }
        Some(path.get(self.segments.len()).map(|s| s.to_string()))
    }
}

/// Result of resolving a path against a matcher registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMatch {
    pub resource_type: ResourceType,
    /// Entity id when the path addresses a single entity.
    pub trailing_id: Option<String>,
}

/// First matching pattern wins.
pub fn resolve_resource(matchers: &[ResourceMatcher], path: &str) -> Option<ResourceMatch> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    matchers.iter().find_map(|matcher| {
        matcher.match_segments(&segments).map(|trailing_id| ResourceMatch {
            resource_type: matcher.resource_type,
            trailing_id,
        })
    })
}
