//! Feed composition
//!
//! A presentation-layer merge, not a ranking algorithm: the chronological
//! primary stream gets the discovery batch spliced in once after a fixed
//! position, and thematic sections after a later one. Nothing is scored
//! and nothing is dropped - a primary stream shorter than an injection
//! index gets the injected sections appended at the end.

use serde::Serialize;

use crate::feed::FeedProcess;

/// Primary items shown before the discovery section.
pub const DISCOVERY_SLOT: usize = 3;

/// Primary items shown before thematic sections.
pub const THEMATIC_SLOT: usize = 6;

/// One renderable unit of the composed feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedSection {
    /// A single primary process card
    Process { process: FeedProcess },
    /// Shown instead of nothing when the primary stream is empty
    EmptyState,
    /// The daily cross-state discovery batch
    Discovery { processes: Vec<FeedProcess> },
    /// A named thematic batch
    Thematic {
        name: String,
        processes: Vec<FeedProcess>,
    },
}

/// A named thematic list to splice into the stream.
#[derive(Debug, Clone)]
pub struct ThematicList {
    pub name: String,
    pub processes: Vec<FeedProcess>,
}

/// Merge the primary stream with discovery and thematic sections.
///
/// Discovery only appears when no extra filters are active; an empty
/// primary stream renders the empty state followed by discovery rather
/// than nothing at all.
pub fn compose(
    primary: Vec<FeedProcess>,
    discovery: Vec<FeedProcess>,
    thematic: Vec<ThematicList>,
    filters_active: bool,
) -> Vec<FeedSection> {
    let show_discovery = !filters_active && !discovery.is_empty();

    if primary.is_empty() {
        let mut out = vec![FeedSection::EmptyState];
        if show_discovery {
            out.push(FeedSection::Discovery {
                processes: discovery,
            });
        }
        return out;
    }

    let mut out = Vec::with_capacity(primary.len() + 2 + thematic.len());
    let mut discovery = show_discovery.then_some(discovery);
    let mut thematic = thematic;
    let mut thematic_pending = !thematic.is_empty();

    for (index, process) in primary.into_iter().enumerate() {
        if index == DISCOVERY_SLOT {
            if let Some(batch) = discovery.take() {
                out.push(FeedSection::Discovery { processes: batch });
            }
        }
        if index == THEMATIC_SLOT && thematic_pending {
            for list in thematic.drain(..) {
                out.push(FeedSection::Thematic {
                    name: list.name,
                    processes: list.processes,
                });
            }
            thematic_pending = false;
        }
        out.push(FeedSection::Process { process });
    }

    // Streams shorter than an injection slot append rather than drop
    if let Some(batch) = discovery.take() {
        out.push(FeedSection::Discovery { processes: batch });
    }
    if thematic_pending {
        for list in thematic.drain(..) {
            out.push(FeedSection::Thematic {
                name: list.name,
                processes: list.processes,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(id: &str) -> FeedProcess {
        FeedProcess::stub(id)
    }

    fn procs(n: usize) -> Vec<FeedProcess> {
        (0..n).map(|i| proc(&format!("p-{}", i))).collect()
    }

    fn kinds(sections: &[FeedSection]) -> Vec<&'static str> {
        sections
            .iter()
            .map(|s| match s {
                FeedSection::Process { .. } => "process",
                FeedSection::EmptyState => "empty",
                FeedSection::Discovery { .. } => "discovery",
                FeedSection::Thematic { .. } => "thematic",
            })
            .collect()
    }

    #[test]
    fn test_discovery_injected_after_slot() {
        let sections = compose(procs(5), procs(3), Vec::new(), false);
        assert_eq!(
            kinds(&sections),
            vec!["process", "process", "process", "discovery", "process", "process"]
        );
    }

    #[test]
    fn test_short_primary_appends_discovery() {
        let sections = compose(procs(2), procs(3), Vec::new(), false);
        assert_eq!(kinds(&sections), vec!["process", "process", "discovery"]);
    }

    #[test]
    fn test_empty_primary_shows_empty_state_then_discovery() {
        let sections = compose(Vec::new(), procs(3), Vec::new(), false);
        assert_eq!(kinds(&sections), vec!["empty", "discovery"]);
    }

    #[test]
    fn test_empty_everything() {
        let sections = compose(Vec::new(), Vec::new(), Vec::new(), false);
        assert_eq!(kinds(&sections), vec!["empty"]);
    }

    #[test]
    fn test_filters_suppress_discovery() {
        let sections = compose(procs(5), procs(3), Vec::new(), true);
        assert!(kinds(&sections).iter().all(|k| *k == "process"));
    }

    #[test]
    fn test_thematic_after_later_slot() {
        let thematic = vec![ThematicList {
            name: "needs feedback".into(),
            processes: procs(2),
        }];
        let sections = compose(procs(8), Vec::new(), thematic, false);
        let ks = kinds(&sections);
        assert_eq!(ks.iter().filter(|k| **k == "thematic").count(), 1);
        assert_eq!(ks[THEMATIC_SLOT], "thematic");
    }

    #[test]
    fn test_short_primary_appends_thematic() {
        let thematic = vec![ThematicList {
            name: "needs feedback".into(),
            processes: procs(2),
        }];
        let sections = compose(procs(4), Vec::new(), thematic, false);
        assert_eq!(kinds(&sections).last(), Some(&"thematic"));
    }
}
