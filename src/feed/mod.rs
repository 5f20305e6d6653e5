//! Feed assembly
//!
//! Pulls the primary chronological stream (optionally restricted to
//! followed authors), the thematic "needs feedback" list, and the daily
//! cross-state discovery batch, then hands everything to `compose` for the
//! final render sequence. Filtering on the author's disciplines happens in
//! memory after the SQL filters, the way the reference query did.

pub mod compose;
pub mod shuffle;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::{feedback, processes, profiles, resonances, social, Db};
use crate::error::Result;

pub use compose::{compose, FeedSection, ThematicList, DISCOVERY_SLOT, THEMATIC_SLOT};
pub use shuffle::{daily_shuffle, day_key, seeded_unit};

/// How many discovery candidates to fetch before the daily shuffle.
const DISCOVERY_BATCH: u32 = 50;

/// How many discovery items survive the shuffle.
const DISCOVERY_TAKE: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedFilters {
    #[serde(default)]
    pub disciplines: Vec<String>,
    #[serde(default)]
    pub phases: Vec<String>,
    #[serde(default)]
    pub needs_feedback: bool,
    /// "state" (default) or "following"
    #[serde(default)]
    pub view: Option<String>,
}

impl FeedFilters {
    pub fn following_view(&self) -> bool {
        self.view.as_deref() == Some("following")
    }

    /// True when any narrowing filter is active; discovery injection is
    /// suppressed in that case.
    pub fn any_active(&self) -> bool {
        !self.disciplines.is_empty() || !self.phases.is_empty() || self.needs_feedback
    }
}

/// A process enriched with its author and per-viewer counts.
#[derive(Debug, Clone, Serialize)]
pub struct FeedProcess {
    #[serde(flatten)]
    pub process: processes::ProcessRow,
    pub author: Option<profiles::ProfileRow>,
    pub resonance_count: i64,
    pub has_resonated: bool,
    pub feedback_count: i64,
}

impl FeedProcess {
    #[cfg(test)]
    pub(crate) fn stub(id: &str) -> Self {
        Self {
            process: processes::ProcessRow {
                id: id.to_string(),
                owner_id: "owner".into(),
                title: String::new(),
                description: None,
                phase: "Idea".into(),
                visibility: "public".into(),
                status: "published".into(),
                media_url: None,
                media_type: None,
                reflection_question: None,
                created_at: "2026-01-01T00:00:00Z".into(),
                updated_at: "2026-01-01T00:00:00Z".into(),
            },
            author: None,
            resonance_count: 0,
            has_resonated: false,
            feedback_count: 0,
        }
    }
}

/// The primary feed stream for a viewer, filtered and enriched.
pub fn get_feed(db: &Db, viewer_id: Option<&str>, filters: &FeedFilters) -> Result<Vec<FeedProcess>> {
    db.with_conn(|conn| {
        // Following view is meaningless for guests and empty when the
        // viewer follows no one
        let author_filter = if filters.following_view() {
            match viewer_id {
                None => return Ok(Vec::new()),
                Some(viewer) => {
                    let followed = social::followed_ids(conn, viewer)?;
                    if followed.is_empty() {
                        return Ok(Vec::new());
                    }
                    Some(followed)
                }
            }
        } else {
            None
        };

        let mut rows = processes::list_published(conn, author_filter.as_deref(), &filters.phases)?;

        // Blocked authors never appear
        if let Some(viewer) = viewer_id {
            let blocked = social::blocked_ids(conn, viewer)?;
            if !blocked.is_empty() {
                rows.retain(|p| !blocked.contains(&p.owner_id));
            }
        }

        // Author lookup for cards and the discipline filter
        let mut authors: HashMap<String, Option<profiles::ProfileRow>> = HashMap::new();
        for row in &rows {
            if !authors.contains_key(&row.owner_id) {
                authors.insert(row.owner_id.clone(), profiles::get_profile(conn, &row.owner_id)?);
            }
        }

        if !filters.disciplines.is_empty() {
            rows.retain(|p| {
                authors
                    .get(&p.owner_id)
                    .and_then(|a| a.as_ref())
                    .map(|a| filters.disciplines.iter().any(|d| a.disciplines.contains(d)))
                    .unwrap_or(false)
            });
        }

        let ids: Vec<String> = rows.iter().map(|p| p.id.clone()).collect();
        let feedback_counts = feedback::counts_for(conn, &ids)?;
        let resonance_counts = resonances::counts_for(conn, &ids, viewer_id)?;

        if filters.needs_feedback {
            rows.retain(|p| feedback_counts.get(&p.id).copied().unwrap_or(0) == 0);
        }

        let enriched = rows
            .into_iter()
            .map(|process| {
                let (resonance_count, has_resonated) = resonance_counts
                    .get(&process.id)
                    .copied()
                    .unwrap_or((0, false));
                let feedback_count = feedback_counts.get(&process.id).copied().unwrap_or(0);
                let author = authors.get(&process.owner_id).cloned().flatten();
                FeedProcess {
                    process,
                    author,
                    resonance_count,
                    has_resonated,
                    feedback_count,
                }
            })
            .collect();
        Ok(enriched)
    })
}

/// The daily discovery batch: latest published work from authors in a
/// different creative state than the viewer, shuffled deterministically
/// for the given day key and truncated.
pub fn get_discovery(
    db: &Db,
    viewer_id: Option<&str>,
    viewer_state: &str,
    date_key: &str,
) -> Result<Vec<FeedProcess>> {
    db.with_conn(|conn| {
        let candidates =
            processes::list_discovery_candidates(conn, viewer_id, viewer_state, DISCOVERY_BATCH)?;

        let picked = daily_shuffle(candidates, date_key, |p| p.id.as_str(), DISCOVERY_TAKE);

        // Same card enrichment as the primary stream
        let ids: Vec<String> = picked.iter().map(|p| p.id.clone()).collect();
        let feedback_counts = feedback::counts_for(conn, &ids)?;
        let resonance_counts = resonances::counts_for(conn, &ids, viewer_id)?;

        let mut out = Vec::with_capacity(picked.len());
        for process in picked {
            let author = profiles::get_profile(conn, &process.owner_id)?;
            let (resonance_count, has_resonated) = resonance_counts
                .get(&process.id)
                .copied()
                .unwrap_or((0, false));
            let feedback_count = feedback_counts.get(&process.id).copied().unwrap_or(0);
            out.push(FeedProcess {
                process,
                author,
                resonance_count,
                has_resonated,
                feedback_count,
            });
        }
        Ok(out)
    })
}

/// Full composed feed: primary + discovery + thematic sections.
pub fn get_composed_feed(
    db: &Db,
    viewer_id: Option<&str>,
    viewer_state: &str,
    filters: &FeedFilters,
    date_key: &str,
) -> Result<Vec<FeedSection>> {
    let primary = get_feed(db, viewer_id, filters)?;
    let filters_active = filters.any_active();

    let discovery = if filters_active {
        Vec::new()
    } else {
        get_discovery(db, viewer_id, viewer_state, date_key)?
    };

    // Thematic: processes still waiting on their first feedback. Skipped
    // when the caller is already filtering for exactly that.
    let thematic = if filters_active {
        Vec::new()
    } else {
        let waiting: Vec<FeedProcess> = primary
            .iter()
            .filter(|p| p.feedback_count == 0 && Some(p.process.owner_id.as_str()) != viewer_id)
            .take(3)
            .cloned()
            .collect();
        if waiting.is_empty() {
            Vec::new()
        } else {
            vec![ThematicList {
                name: "waiting for first feedback".into(),
                processes: waiting,
            }]
        }
    };

    Ok(compose(primary, discovery, thematic, filters_active))
}
