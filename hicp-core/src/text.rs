//! Per-locale text storage.
//!
//! Displayed strings are sent to the client once, keyed by numeric
//! text id. Each id maps to a [`TextSelector`] holding variants for
//! different locale groups; the [`TextManager`] tracks the current
//! group and resolves ids against it.

use std::collections::BTreeMap;

use crate::util::lowest_free_id;

// ── TextSelector ─────────────────────────────────────────────────

/// Locale variants of one logical string.
///
/// Variants are keyed by (group, subgroup), e.g. ("en", "gb").
/// Lookup prefers an exact match, then a group match, and returns
/// nothing when no variant shares the requested group.
#[derive(Debug, Clone, Default)]
pub struct TextSelector {
    variants: Vec<(String, String, String)>,
}

impl TextSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (group, subgroup, text) triples.
    pub fn from_variants<I, G, S, T>(variants: I) -> Self
    where
        I: IntoIterator<Item = (G, S, T)>,
        G: Into<String>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut selector = Self::new();
        for (group, subgroup, text) in variants {
            selector.add_text(&group.into(), &subgroup.into(), text.into());
        }
        selector
    }

    /// Replace or add the text for an exact (group, subgroup) pair.
    pub fn add_text(&mut self, group: &str, subgroup: &str, text: impl Into<String>) {
        let text = text.into();
        for entry in &mut self.variants {
            if entry.0 == group && entry.1 == subgroup {
                entry.2 = text;
                return;
            }
        }
        self.variants
            .push((group.to_string(), subgroup.to_string(), text));
    }

    /// Best match for the requested group and subgroup.
    ///
    /// Exact (group, subgroup) beats a group match with no subgroup
    /// requested, which beats a bare group match. A variant whose
    /// group differs never matches.
    pub fn get_text(&self, group: &str, subgroup: &str) -> Option<&str> {
        let mut best: Option<&str> = None;
        let mut best_strength = 0;
        for (chk_group, chk_subgroup, text) in &self.variants {
            let strength = if chk_group == group && chk_subgroup == subgroup {
                4
            } else if chk_group == group && subgroup.is_empty() {
                3
            } else if chk_group == group {
                2
            } else {
                continue;
            };
            if strength > best_strength {
                best = Some(text);
                best_strength = strength;
            }
        }
        best
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

// ── TextManager ──────────────────────────────────────────────────

/// Id-to-selector table plus the currently selected locale group.
#[derive(Debug)]
pub struct TextManager {
    selectors: BTreeMap<u32, TextSelector>,
    group: String,
    subgroup: String,
}

impl TextManager {
    pub fn new(group: impl Into<String>, subgroup: impl Into<String>) -> Self {
        Self {
            selectors: BTreeMap::new(),
            group: group.into(),
            subgroup: subgroup.into(),
        }
    }

    /// Fill in defaults for an optional (group, subgroup) pair.
    ///
    /// Neither given means the current group. Group given with no
    /// subgroup means that group with an empty subgroup, on purpose.
    pub fn resolve_group(
        &self,
        group: Option<&str>,
        subgroup: Option<&str>,
    ) -> (String, String) {
        match (group, subgroup) {
            (None, None) => (self.group.clone(), self.subgroup.clone()),
            (Some(g), None) => (g.to_string(), String::new()),
            (None, Some(s)) => (self.group.clone(), s.to_string()),
            (Some(g), Some(s)) => (g.to_string(), s.to_string()),
        }
    }

    pub fn set_group(&mut self, group: Option<&str>, subgroup: Option<&str>) {
        let (group, subgroup) = self.resolve_group(group, subgroup);
        self.group = group;
        self.subgroup = subgroup;
    }

    pub fn group(&self) -> (&str, &str) {
        (&self.group, &self.subgroup)
    }

    /// Whether the given (possibly partial) group names the current
    /// one. No group at all means the current group.
    pub fn is_group(&self, group: Option<&str>, subgroup: Option<&str>) -> bool {
        let Some(group) = group else {
            return subgroup.is_none();
        };
        if group != self.group {
            return false;
        }
        match subgroup {
            None => true,
            Some(s) => s == self.subgroup,
        }
    }

    /// Add or replace text for an id under the given group.
    pub fn add_text(
        &mut self,
        text_id: u32,
        text: impl Into<String>,
        group: Option<&str>,
        subgroup: Option<&str>,
    ) {
        let (group, subgroup) = self.resolve_group(group, subgroup);
        self.selectors
            .entry(text_id)
            .or_default()
            .add_text(&group, &subgroup, text);
    }

    /// Id for the given text, reusing an existing id when some
    /// selector already resolves to the same string under this group.
    pub fn add_text_get_id(
        &mut self,
        text: &str,
        group: Option<&str>,
        subgroup: Option<&str>,
    ) -> u32 {
        let (group, subgroup) = self.resolve_group(group, subgroup);
        for (id, selector) in &self.selectors {
            if selector.get_text(&group, &subgroup) == Some(text) {
                return *id;
            }
        }
        let text_id = lowest_free_id(&self.selectors);
        self.selectors
            .entry(text_id)
            .or_default()
            .add_text(&group, &subgroup, text);
        text_id
    }

    /// Add a whole selector under a fresh id. Duplicates are allowed.
    pub fn add_selector_get_id(&mut self, selector: TextSelector) -> u32 {
        let text_id = lowest_free_id(&self.selectors);
        self.selectors.insert(text_id, selector);
        text_id
    }

    /// Resolve an id against the current group.
    pub fn get_text(&self, text_id: u32) -> Option<&str> {
        self.selectors
            .get(&text_id)?
            .get_text(&self.group, &self.subgroup)
    }

    /// All known text ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.selectors.keys().copied()
    }

    /// Order (text id, payload) pairs by their resolved strings under
    /// the current group. Pairs whose id does not resolve are dropped.
    pub fn sort_by_text<T>(&self, unsorted: Vec<(u32, T)>) -> Vec<(u32, T)> {
        let mut keyed: Vec<(String, u32, T)> = unsorted
            .into_iter()
            .filter_map(|(text_id, payload)| {
                self.get_text(text_id)
                    .map(|text| (text.to_string(), text_id, payload))
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed
            .into_iter()
            .map(|(_, text_id, payload)| (text_id, payload))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> TextSelector {
        TextSelector::from_variants([
            ("en", "", "color"),
            ("en", "gb", "colour"),
            ("fr", "", "couleur"),
        ])
    }

    #[test]
    fn exact_match_wins() {
        let s = selector();
        assert_eq!(s.get_text("en", "gb"), Some("colour"));
        assert_eq!(s.get_text("en", ""), Some("color"));
        assert_eq!(s.get_text("fr", ""), Some("couleur"));
    }

    #[test]
    fn unmatched_subgroup_falls_back_to_group() {
        let s = selector();
        assert_eq!(s.get_text("en", "us"), Some("color"));
    }

    #[test]
    fn unmatched_group_yields_nothing() {
        let s = selector();
        assert_eq!(s.get_text("de", ""), None);
        assert_eq!(s.get_text("de", "at"), None);
    }

    #[test]
    fn add_text_replaces_exact_variant() {
        let mut s = selector();
        s.add_text("en", "gb", "COLOUR");
        assert_eq!(s.get_text("en", "gb"), Some("COLOUR"));
        assert_eq!(s.get_text("en", ""), Some("color"));
    }

    #[test]
    fn manager_resolves_current_group() {
        let mut manager = TextManager::new("en", "");
        let id = manager.add_text_get_id("hello", None, None);
        assert_eq!(manager.get_text(id), Some("hello"));

        manager.add_text(id, "bonjour", Some("fr"), None);
        manager.set_group(Some("fr"), None);
        assert_eq!(manager.get_text(id), Some("bonjour"));
    }

    #[test]
    fn same_text_reuses_id() {
        let mut manager = TextManager::new("en", "");
        let a = manager.add_text_get_id("ok", None, None);
        let b = manager.add_text_get_id("ok", None, None);
        let c = manager.add_text_get_id("cancel", None, None);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn selector_ids_allow_duplicates() {
        let mut manager = TextManager::new("en", "");
        let a = manager.add_selector_get_id(selector());
        let b = manager.add_selector_get_id(selector());
        assert_ne!(a, b);
    }

    #[test]
    fn group_given_without_subgroup_means_empty_subgroup() {
        let manager = TextManager::new("en", "gb");
        assert_eq!(
            manager.resolve_group(Some("fr"), None),
            ("fr".to_string(), String::new())
        );
        assert_eq!(
            manager.resolve_group(None, None),
            ("en".to_string(), "gb".to_string())
        );
    }

    #[test]
    fn sort_by_text_uses_current_group() {
        let mut manager = TextManager::new("en", "");
        let banana = manager.add_text_get_id("banana", None, None);
        let apple = manager.add_text_get_id("apple", None, None);
        let cherry = manager.add_text_get_id("cherry", None, None);

        let sorted = manager.sort_by_text(vec![(banana, "b"), (cherry, "c"), (apple, "a")]);
        assert_eq!(sorted, vec![(apple, "a"), (banana, "b"), (cherry, "c")]);

        // Unresolvable ids drop out.
        let sorted = manager.sort_by_text(vec![(apple, "a"), (99, "x")]);
        assert_eq!(sorted, vec![(apple, "a")]);
    }

    #[test]
    fn is_group_checks_partial_names() {
        let manager = TextManager::new("en", "gb");
        assert!(manager.is_group(None, None));
        assert!(manager.is_group(Some("en"), None));
        assert!(manager.is_group(Some("en"), Some("gb")));
        assert!(!manager.is_group(Some("en"), Some("us")));
        assert!(!manager.is_group(Some("fr"), None));
    }
}
