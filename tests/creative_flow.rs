//! Integration tests for the publish, feed, and discovery flow
//!
//! Exercises the data layer the way the API does: draft, autosave,
//! publish, then read it back through the feed with filters, counts, and
//! the composed section sequence.

use atelier::access;
use atelier::db::{accounts, feedback, processes, profiles, resonances, social, Db};
use atelier::feed::{self, FeedFilters, FeedSection};

fn account(db: &Db, id: &str, state: &str) {
    db.with_conn(|conn| {
        accounts::create_account(conn, id, &format!("{}@example.com", id), "hash")?;
        profiles::create_profile(conn, id, Some(id))?;
        let update = profiles::ProfileUpdate {
            current_state: Some(state.to_string()),
            disciplines: Some(vec!["music".to_string()]),
            ..Default::default()
        };
        profiles::update_profile(conn, id, &update)?;
        Ok(())
    })
    .unwrap();
}

fn published_process(db: &Db, owner: &str, title: &str) -> String {
    db.with_conn(|conn| {
        let draft = processes::create_draft(conn, owner)?;
        let update = processes::ProcessUpdate {
            title: Some(title.to_string()),
            description: Some("notes from the studio".to_string()),
            phase: Some("Flow".to_string()),
            ..Default::default()
        };
        processes::autosave(conn, &draft.id, owner, &update)?;
        processes::publish(conn, &draft.id, owner)?;
        Ok(draft.id)
    })
    .unwrap()
}

#[test]
fn draft_publish_feed_roundtrip() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "maker", "Flow");
    account(&db, "viewer", "Idea");

    let process_id = published_process(&db, "maker", "Harbor sketches");

    let filters = FeedFilters::default();
    let items = feed::get_feed(&db, Some("viewer"), &filters).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].process.id, process_id);
    assert_eq!(items[0].process.status, "published");
    assert_eq!(
        items[0].author.as_ref().map(|a| a.id.as_str()),
        Some("maker")
    );
}

#[test]
fn drafts_stay_out_of_the_feed() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "maker", "Flow");

    db.with_conn(|conn| processes::create_draft(conn, "maker"))
        .unwrap();

    let items = feed::get_feed(&db, None, &FeedFilters::default()).unwrap();
    assert!(items.is_empty());
}

#[test]
fn publish_requires_substance_and_is_one_way() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "maker", "Flow");

    let draft = db
        .with_conn(|conn| processes::create_draft(conn, "maker"))
        .unwrap();

    // An empty draft cannot be published
    let err = db.with_conn(|conn| processes::publish(conn, &draft.id, "maker"));
    assert!(err.is_err());

    db.with_conn(|conn| {
        let update = processes::ProcessUpdate {
            description: Some("a first pass".to_string()),
            ..Default::default()
        };
        processes::autosave(conn, &draft.id, "maker", &update)?;
        processes::publish(conn, &draft.id, "maker")?;
        Ok(())
    })
    .unwrap();

    // A second publish finds no draft row to transition
    let err = db.with_conn(|conn| processes::publish(conn, &draft.id, "maker"));
    assert!(err.is_err());
}

#[test]
fn observer_may_publish_exactly_once() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "newcomer", "Idea");

    // A fresh account sits behind the gate
    let status = access::check_access(&db, "newcomer").unwrap();
    assert!(status.is_observer);
    assert!(!status.can_post);

    // Nothing published yet: the first publish goes through
    let published = db
        .with_conn(|conn| processes::count_published(conn, "newcomer"))
        .unwrap();
    assert!(access::publish_allowed(&status, published));

    published_process(&db, "newcomer", "First light");

    // The allowance is spent; a second publish waits out the period
    let published = db
        .with_conn(|conn| processes::count_published(conn, "newcomer"))
        .unwrap();
    assert_eq!(published, 1);
    assert!(!access::publish_allowed(&status, published));
}

#[test]
fn following_view_and_blocks_narrow_the_feed() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "maker", "Flow");
    account(&db, "other", "Flow");
    account(&db, "viewer", "Idea");

    published_process(&db, "maker", "Harbor sketches");
    published_process(&db, "other", "Night pages");

    // Following no one: following view is empty
    let filters = FeedFilters {
        view: Some("following".to_string()),
        ..Default::default()
    };
    assert!(feed::get_feed(&db, Some("viewer"), &filters).unwrap().is_empty());

    db.with_conn(|conn| social::follow(conn, "viewer", "maker"))
        .unwrap();
    let items = feed::get_feed(&db, Some("viewer"), &filters).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].process.owner_id, "maker");

    // Blocking removes the author everywhere
    db.with_conn(|conn| social::block(conn, "viewer", "other"))
        .unwrap();
    let items = feed::get_feed(&db, Some("viewer"), &FeedFilters::default()).unwrap();
    assert!(items.iter().all(|p| p.process.owner_id != "other"));
}

#[test]
fn counts_and_needs_feedback_filter() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "maker", "Flow");
    account(&db, "viewer", "Idea");

    let with_feedback = published_process(&db, "maker", "Harbor sketches");
    let without_feedback = published_process(&db, "maker", "Night pages");

    db.with_conn(|conn| {
        feedback::add_feedback(conn, &with_feedback, "viewer", "works", "the palette sings", None)?;
        resonances::toggle(conn, &with_feedback, "viewer", None)?;
        Ok(())
    })
    .unwrap();

    let items = feed::get_feed(&db, Some("viewer"), &FeedFilters::default()).unwrap();
    let enriched = items
        .iter()
        .find(|p| p.process.id == with_feedback)
        .unwrap();
    assert_eq!(enriched.feedback_count, 1);
    assert_eq!(enriched.resonance_count, 1);
    assert!(enriched.has_resonated);

    let filters = FeedFilters {
        needs_feedback: true,
        ..Default::default()
    };
    let items = feed::get_feed(&db, Some("viewer"), &filters).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].process.id, without_feedback);
}

#[test]
fn discovery_crosses_creative_states_deterministically() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "viewer", "Idea");
    for i in 0..5 {
        let id = format!("flow{}", i);
        account(&db, &id, "Flow");
        published_process(&db, &id, &format!("Piece {}", i));
    }
    // Same state as the viewer: never a discovery candidate
    account(&db, "peer", "Idea");
    published_process(&db, "peer", "Same-state work");

    let today = feed::get_discovery(&db, Some("viewer"), "Idea", "Mon Aug 24 2026").unwrap();
    assert_eq!(today.len(), 3);
    assert!(today.iter().all(|p| p.process.owner_id != "peer"));
    assert!(today.iter().all(|p| p.process.owner_id != "viewer"));

    // Same day key: same picks in the same order
    let again = feed::get_discovery(&db, Some("viewer"), "Idea", "Mon Aug 24 2026").unwrap();
    let ids: Vec<&str> = today.iter().map(|p| p.process.id.as_str()).collect();
    let ids_again: Vec<&str> = again.iter().map(|p| p.process.id.as_str()).collect();
    assert_eq!(ids, ids_again);
}

#[test]
fn discovery_cards_carry_viewer_counts() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "viewer", "Idea");
    account(&db, "maker", "Flow");
    let piece = published_process(&db, "maker", "Night pages");

    db.with_conn(|conn| {
        feedback::add_feedback(conn, &piece, "viewer", "works", "keep the grain", None)?;
        resonances::toggle(conn, &piece, "viewer", None)?;
        Ok(())
    })
    .unwrap();

    let items = feed::get_discovery(&db, Some("viewer"), "Idea", "Mon Aug 24 2026").unwrap();
    let card = items.iter().find(|p| p.process.id == piece).unwrap();
    assert_eq!(card.feedback_count, 1);
    assert_eq!(card.resonance_count, 1);
    assert!(card.has_resonated);
}

#[test]
fn composed_feed_injects_discovery_for_unfiltered_views() {
    let db = Db::open_in_memory().unwrap();
    account(&db, "viewer", "Idea");
    for i in 0..5 {
        let id = format!("flow{}", i);
        account(&db, &id, "Flow");
        published_process(&db, &id, &format!("Piece {}", i));
    }

    let sections = feed::get_composed_feed(
        &db,
        Some("viewer"),
        "Idea",
        &FeedFilters::default(),
        "Mon Aug 24 2026",
    )
    .unwrap();
    assert!(sections
        .iter()
        .any(|s| matches!(s, FeedSection::Discovery { .. })));

    // Any active filter suppresses discovery
    let filters = FeedFilters {
        phases: vec!["Flow".to_string()],
        ..Default::default()
    };
    let sections =
        feed::get_composed_feed(&db, Some("viewer"), "Idea", &filters, "Mon Aug 24 2026").unwrap();
    assert!(!sections
        .iter()
        .any(|s| matches!(s, FeedSection::Discovery { .. })));
}
