//! Deterministic artifact selection.

use crate::types::{Artifact, Readiness};

/// Partition of one status snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Artifacts with a download available.
    pub ready: usize,
    /// Artifacts still rendering, including ones in unrecognized states.
    pub pending: usize,
    /// First ready artifact in input order with a download reference.
    pub chosen: Option<Artifact>,
}

impl Selection {
    /// True when the snapshot contained nothing at all.
    ///
    /// A job with zero artifacts queued is a different situation from a job
    /// whose artifacts are still rendering: the first will never produce
    /// anything, the second just needs more time.
    pub fn is_empty(&self) -> bool {
        self.ready == 0 && self.pending == 0
    }
}

/// Pick the target artifact from a snapshot.
///
/// Selection is first-ready-in-input-order. No scoring, no randomness; the
/// same snapshot always yields the same choice.
pub fn select_artifact(artifacts: &[Artifact]) -> Selection {
    let mut ready = 0;
    let mut pending = 0;
    let mut chosen = None;

    for artifact in artifacts {
        match artifact.readiness {
            Readiness::Ready => ready += 1,
            Readiness::Pending | Readiness::Unknown => pending += 1,
        }
        if chosen.is_none() && artifact.is_downloadable() {
            chosen = Some(artifact.clone());
        }
    }

    Selection {
        ready,
        pending,
        chosen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(id: &str) -> Artifact {
        Artifact {
            id: id.into(),
            readiness: Readiness::Ready,
            download_url: Some(format!("https://cdn.example/{}.png", id)),
            width: None,
            height: None,
        }
    }

    fn pending(id: &str) -> Artifact {
        Artifact {
            id: id.into(),
            readiness: Readiness::Pending,
            download_url: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn test_picks_first_ready_in_input_order() {
        let artifacts = vec![pending("img-1"), ready("img-2"), ready("img-3")];
        let selection = select_artifact(&artifacts);

        assert_eq!(selection.ready, 2);
        assert_eq!(selection.pending, 1);
        assert_eq!(selection.chosen.unwrap().id, "img-2");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let artifacts = vec![ready("img-1"), ready("img-2"), pending("img-3")];

        let first = select_artifact(&artifacts);
        for _ in 0..10 {
            assert_eq!(select_artifact(&artifacts), first);
        }
    }

    #[test]
    fn test_ready_without_url_is_counted_but_not_chosen() {
        let mut broken = ready("img-1");
        broken.download_url = None;

        let selection = select_artifact(&[broken, pending("img-2")]);
        assert_eq!(selection.ready, 1);
        assert_eq!(selection.pending, 1);
        assert!(selection.chosen.is_none());
        assert!(!selection.is_empty());
    }

    #[test]
    fn test_empty_snapshot() {
        let selection = select_artifact(&[]);
        assert!(selection.is_empty());
        assert!(selection.chosen.is_none());
    }

    #[test]
    fn test_unknown_counts_as_pending() {
        let artifact = Artifact {
            id: "img-1".into(),
            readiness: Readiness::Unknown,
            download_url: None,
            width: None,
            height: None,
        };
        let selection = select_artifact(&[artifact]);
        assert_eq!(selection.pending, 1);
        assert!(!selection.is_empty());
    }
}
