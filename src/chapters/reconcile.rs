//! Chapter reconciliation between the chapter store and NFO sidecars
//!
//! Two directions exist. During a library scan the sidecar is authoritative
//! and replaces persisted chapters wholesale when they differ. When saving
//! metadata, sidecar entries are merged into the persisted list one by one and
//! the sidecar is rewritten when it no longer mirrors the merged list.

use super::{records_equal, ChapterRecord};
use tracing::debug;

/// Which way chapter data flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDirection {
    /// Sidecar to store, after a library scan
    Scan,
    /// Store to sidecar, when item metadata is saved
    Save,
}

/// Result of reconciling persisted chapters with sidecar chapters
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// The list to persist (unchanged input when nothing changed)
    pub chapters: Vec<ChapterRecord>,
    /// Whether `chapters` differs from the persisted list
    pub server_changed: bool,
    /// Whether the sidecar should be rewritten from `chapters`
    pub sidecar_needs_rewrite: bool,
}

/// Reconcile in either direction without mutating the inputs
pub fn reconcile(
    direction: ReconcileDirection,
    server: &[ChapterRecord],
    sidecar: &[ChapterRecord],
) -> Reconciliation {
    match direction {
        ReconcileDirection::Scan => reconcile_for_scan(server, sidecar),
        ReconcileDirection::Save => {
            let mut chapters = server.to_vec();
            let (server_changed, sidecar_needs_rewrite) = reconcile_for_save(&mut chapters, sidecar);
            Reconciliation {
                chapters,
                server_changed,
                sidecar_needs_rewrite,
            }
        }
    }
}

/// Scan direction: the sidecar replaces the persisted list when they differ.
///
/// An empty sidecar never changes anything, so persisted chapters are not lost
/// to a sidecar that simply lacks a chapter block.
pub fn reconcile_for_scan(server: &[ChapterRecord], sidecar: &[ChapterRecord]) -> Reconciliation {
    let unchanged = || Reconciliation {
        chapters: server.to_vec(),
        server_changed: false,
        sidecar_needs_rewrite: false,
    };

    if sidecar.is_empty() {
        return unchanged();
    }

    if server.is_empty() {
        debug!("Adopting {} sidecar chapters", sidecar.len());
        return Reconciliation {
            chapters: sidecar.to_vec(),
            server_changed: true,
            sidecar_needs_rewrite: false,
        };
    }

    let identical = server.len() == sidecar.len()
        && sidecar
            .iter()
            .all(|s| server.iter().any(|c| records_equal(c, s)));

    if identical {
        return unchanged();
    }

    debug!(
        "Replacing {} persisted chapters with {} sidecar chapters",
        server.len(),
        sidecar.len()
    );
    Reconciliation {
        chapters: sidecar.to_vec(),
        server_changed: true,
        sidecar_needs_rewrite: false,
    }
}

/// Save direction: merge sidecar entries into `server` keyed by name and start.
///
/// Unknown sidecar chapters are appended; a differing image path on a known
/// chapter is taken from the sidecar. Returns `(server_changed,
/// sidecar_needs_rewrite)`, where a rewrite is needed whenever the number of
/// matched sidecar entries differs from the merged list length.
pub fn reconcile_for_save(server: &mut Vec<ChapterRecord>, sidecar: &[ChapterRecord]) -> (bool, bool) {
    let mut server_changed = false;
    let mut matched = 0usize;

    for entry in sidecar {
        match server.iter_mut().find(|c| c.same_key(entry)) {
            None => {
                server.push(entry.clone());
                server_changed = true;
            }
            Some(existing) if existing.image() == entry.image() => {
                matched += 1;
            }
            Some(existing) => {
                existing.image_path = entry.image_path.clone();
                existing.image_last_modified = entry.image_last_modified;
                server_changed = true;
            }
        }
    }

    let sidecar_needs_rewrite = matched != server.len();
    (server_changed, sidecar_needs_rewrite)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(name: &str, start: i64, image: &str) -> ChapterRecord {
        ChapterRecord::new(name, start).with_image(image)
    }

    #[test]
    fn test_scan_adopts_sidecar_when_store_empty() {
        let sidecar = vec![ChapterRecord::new("A", 0)];
        let result = reconcile(ReconcileDirection::Scan, &[], &sidecar);
        assert!(result.server_changed);
        assert!(!result.sidecar_needs_rewrite);
        assert_eq!(result.chapters, sidecar);
    }

    #[test]
    fn test_scan_identical_lists_unchanged() {
        let server = vec![chapter("A", 0, "/a.jpg"), chapter("B", 10, "/b.jpg")];
        let sidecar = vec![chapter("B", 10, "/b.jpg"), chapter("A", 0, "/a.jpg")];
        let result = reconcile_for_scan(&server, &sidecar);
        assert!(!result.server_changed);
        assert_eq!(result.chapters, server);
    }

    #[test]
    fn test_scan_empty_sidecar_keeps_store() {
        let server = vec![chapter("A", 0, "/a.jpg")];
        let result = reconcile_for_scan(&server, &[]);
        assert!(!result.server_changed);
        assert_eq!(result.chapters, server);
    }

    #[test]
    fn test_scan_difference_replaces_wholesale() {
        let server = vec![chapter("A", 0, "/a.jpg"), chapter("B", 10, "/b.jpg")];
        let sidecar = vec![chapter("A", 0, "/other.jpg")];
        let result = reconcile_for_scan(&server, &sidecar);
        assert!(result.server_changed);
        assert_eq!(result.chapters, sidecar);
    }

    #[test]
    fn test_save_sidecar_image_wins() {
        let mut server = vec![chapter("A", 0, "p1")];
        let (changed, rewrite) = reconcile_for_save(&mut server, &[chapter("A", 0, "p2")]);

        assert!(changed);
        assert_eq!(server, vec![chapter("A", 0, "p2")]);
        // The overwritten entry is not counted as matched
        assert!(rewrite);
    }

    #[test]
    fn test_save_in_sync_needs_nothing() {
        let mut server = vec![chapter("A", 0, "p1"), ChapterRecord::new("B", 5)];
        let sidecar = server.clone();
        let (changed, rewrite) = reconcile_for_save(&mut server, &sidecar);
        assert!(!changed);
        assert!(!rewrite);
    }

    #[test]
    fn test_save_appends_unknown_and_requests_rewrite() {
        let mut server = vec![chapter("A", 0, "p1")];
        let sidecar = vec![chapter("A", 0, "p1"), ChapterRecord::new("New", 42)];
        let (changed, rewrite) = reconcile_for_save(&mut server, &sidecar);

        assert!(changed);
        assert_eq!(server.len(), 2);
        assert_eq!(server[1].name, "New");
        assert!(rewrite);
    }

    #[test]
    fn test_save_empty_sidecar_requests_rewrite() {
        let mut server = vec![chapter("A", 0, "p1")];
        let result = reconcile(ReconcileDirection::Save, &server, &[]);
        assert!(!result.server_changed);
        assert!(result.sidecar_needs_rewrite);

        let (changed, rewrite) = reconcile_for_save(&mut server, &[]);
        assert_eq!((changed, rewrite), (false, true));
    }

    #[test]
    fn test_save_never_removes_persisted_chapters() {
        let server = vec![chapter("A", 0, "a"), chapter("B", 10, "b"), chapter("C", 20, "c")];
        let result = reconcile(ReconcileDirection::Save, &server, &[chapter("X", 5, "x")]);
        assert!(server.iter().all(|c| result.chapters.contains(c)));
        assert_eq!(result.chapters.len(), 4);
    }

    #[test]
    fn test_save_empty_image_matches_missing_image() {
        let mut server = vec![ChapterRecord::new("A", 0).with_image("")];
        let (changed, rewrite) = reconcile_for_save(&mut server, &[ChapterRecord::new("A", 0)]);
        assert!(!changed);
        assert!(!rewrite);
    }
}
