//! Materialized view of the document collection.
//!
//! A title holds at most one live version per origin: a newer version
//! from the same origin supersedes the older one for good, so removing it
//! leaves nothing of that origin behind. Versions from different origins
//! are concurrent and stay side by side, ordered by creation timestamp;
//! the latest one is the visible document. The view is therefore a
//! function of the set of applied operations, so replicas that apply the
//! same operations in different orders show the same documents.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tsae_core::{Document, Timestamp};

/// Visible document per title, plus the versions it shadows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentView {
    /// Live versions per title, ascending, one per origin; the last one is
    /// visible.
    versions: BTreeMap<String, Vec<Document>>,
}

impl DocumentView {
    pub fn new() -> Self {
        Self::default()
    }

    /// The visible version of `title`.
    pub fn get(&self, title: &str) -> Option<&Document> {
        self.versions.get(title).and_then(|v| v.last())
    }

    pub fn contains(&self, title: &str) -> bool {
        self.versions.contains_key(title)
    }

    /// Creation timestamp of the visible version of `title`.
    pub fn version_of(&self, title: &str) -> Option<&Timestamp> {
        self.get(title).map(|doc| &doc.timestamp)
    }

    /// Insert a live version, superseding older versions of its title from
    /// the same origin.
    ///
    /// Returns whether it became the visible version of its title. An
    /// already known or already superseded version is ignored.
    pub fn insert(&mut self, document: Document) -> bool {
        self.supersede(&document.title, &document.timestamp);

        let versions = self.versions.entry(document.title.clone()).or_default();
        let created = &document.timestamp;
        if versions
            .iter()
            .any(|d| d.timestamp.origin() == created.origin() && d.timestamp.seq() >= created.seq())
        {
            return false;
        }
        let pos = versions.partition_point(|d| d.timestamp.total_cmp(created) == Ordering::Less);
        versions.insert(pos, document);
        pos + 1 == versions.len()
    }

    /// Drop every version of `title` from the origin of `created` that is
    /// older than `created`.
    ///
    /// Returns how many were dropped.
    pub fn supersede(&mut self, title: &str, created: &Timestamp) -> usize {
        let Some(versions) = self.versions.get_mut(title) else {
            return 0;
        };
        let before = versions.len();
        versions.retain(|d| d.timestamp.origin() != created.origin() || d.timestamp.seq() >= created.seq());
        let dropped = before - versions.len();
        if versions.is_empty() {
            self.versions.remove(title);
        }
        dropped
    }

    /// Drop the version of `title` created at `created`.
    ///
    /// Returns the dropped document. When it was visible, the latest live
    /// version of another origin (if any) becomes visible.
    pub fn remove_version(&mut self, title: &str, created: &Timestamp) -> Option<Document> {
        let versions = self.versions.get_mut(title)?;
        let pos = versions.iter().position(|d| &d.timestamp == created)?;
        let removed = versions.remove(pos);
        if versions.is_empty() {
            self.versions.remove(title);
        }
        Some(removed)
    }

    /// Titles in lexical order.
    pub fn titles(&self) -> impl Iterator<Item = &String> {
        self.versions.keys()
    }

    /// Visible documents, ordered by title.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.versions.values().filter_map(|v| v.last())
    }

    /// Number of live versions hidden behind a later one.
    pub fn shadowed_count(&self) -> usize {
        self.versions.values().map(|v| v.len() - 1).sum()
    }

    /// Number of visible titles.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, origin: &str, seq: i64) -> Document {
        Document::new(title, format!("{}@{}", origin, seq), Timestamp::new(origin, seq))
    }

    #[test]
    fn test_newer_same_origin_version_supersedes() {
        let mut view = DocumentView::new();
        assert!(view.insert(doc("Paella", "S1", 0)));
        assert!(view.insert(doc("Paella", "S1", 3)));
        assert!(!view.insert(doc("Paella", "S1", 1)));
        assert!(!view.insert(doc("Paella", "S1", 3)));

        assert_eq!(view.version_of("Paella"), Some(&Timestamp::new("S1", 3)));
        assert_eq!(view.len(), 1);
        assert_eq!(view.shadowed_count(), 0);
    }

    #[test]
    fn test_removing_superseding_version_leaves_title_absent() {
        let mut view = DocumentView::new();
        view.insert(doc("Paella", "S1", 0));
        view.insert(doc("Paella", "S1", 1));

        assert!(view.remove_version("Paella", &Timestamp::new("S1", 1)).is_some());
        assert!(!view.contains("Paella"));
        assert!(view.get("Paella").is_none());
        assert!(view.is_empty());
    }

    #[test]
    fn test_supersede_without_insert() {
        let mut view = DocumentView::new();
        view.insert(doc("Paella", "S1", 0));
        view.insert(doc("Paella", "S2", 0));

        assert_eq!(view.supersede("Paella", &Timestamp::new("S1", 4)), 1);
        assert_eq!(view.version_of("Paella"), Some(&Timestamp::new("S2", 0)));
        assert_eq!(view.supersede("Paella", &Timestamp::new("S2", 1)), 1);
        assert!(view.is_empty());
        assert_eq!(view.supersede("missing", &Timestamp::new("S1", 0)), 0);
    }

    #[test]
    fn test_removing_visible_reveals_other_origin() {
        let mut view = DocumentView::new();
        view.insert(doc("Paella", "S1", 0));
        view.insert(doc("Paella", "S2", 4));
        assert_eq!(view.shadowed_count(), 1);

        assert!(view.remove_version("Paella", &Timestamp::new("S2", 4)).is_some());
        assert_eq!(view.version_of("Paella"), Some(&Timestamp::new("S1", 0)));

        view.remove_version("Paella", &Timestamp::new("S1", 0));
        assert!(!view.contains("Paella"));
        assert!(view.is_empty());
    }

    #[test]
    fn test_shadowed_versions_bounded_by_origins() {
        let mut view = DocumentView::new();
        for seq in 0..100 {
            for origin in ["S1", "S2", "S3"] {
                view.insert(doc("Paella", origin, seq));
            }
        }
        assert_eq!(view.len(), 1);
        assert_eq!(view.shadowed_count(), 2);
        assert_eq!(view.version_of("Paella"), Some(&Timestamp::new("S3", 99)));
    }

    #[test]
    fn test_insert_order_does_not_matter() {
        let docs = [doc("t", "S1", 2), doc("t", "S2", 2), doc("t", "S3", 1)];

        let mut forward = DocumentView::new();
        docs.iter().cloned().for_each(|d| {
            forward.insert(d);
        });
        let mut backward = DocumentView::new();
        docs.iter().rev().cloned().for_each(|d| {
            backward.insert(d);
        });

        assert_eq!(forward, backward);
        assert_eq!(forward.version_of("t"), Some(&Timestamp::new("S2", 2)));
    }

    #[test]
    fn test_remove_unknown_version_is_noop() {
        let mut view = DocumentView::new();
        view.insert(doc("t", "S1", 0));
        assert!(view.remove_version("t", &Timestamp::new("S1", 9)).is_none());
        assert!(view.remove_version("missing", &Timestamp::new("S1", 0)).is_none());
        assert_eq!(view.len(), 1);
    }
}
