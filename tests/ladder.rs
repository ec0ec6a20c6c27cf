//! Integration tests for the rating ladders: score handling, ordering,
//! head-to-head symmetry, and TSV persistence against temporary directories.

use battle_ladder_web::{Gxe, LadderRegistry, LadderStore, H2hRecord, PROVISIONAL_RD};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

fn temp_dir(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("blw-ladder-{}-{}-{}", std::process::id(), tag, n))
}

fn store(tag: &str) -> LadderStore {
    LadderStore::new(&temp_dir(tag), "gen1ou")
}

fn assert_sorted_and_sane(store: &LadderStore) {
    let entries = store.entries();
    for pair in entries.windows(2) {
        assert!(
            pair[0].elo >= pair[1].elo,
            "ladder out of order: {} above {}",
            pair[0].elo,
            pair[1].elo
        );
    }
    for e in &entries {
        assert!(e.elo >= 1000.0, "{} below the floor", e.user_id);
        assert!((10.0..=350.0).contains(&e.rd), "{} rd out of bounds", e.user_id);
        assert_eq!(e.w + e.l + e.t, e.games, "{} counters disagree", e.user_id);
        match e.gxe {
            Gxe::Unknown => assert!(e.rd > PROVISIONAL_RD),
            Gxe::Percent(p) => {
                assert!(e.rd <= PROVISIONAL_RD);
                assert!((0.0..=100.0).contains(&p));
            }
        }
    }
}

#[test]
fn first_win_between_fresh_players() {
    let store = store("first-win");
    let mut lines: Vec<String> = Vec::new();
    let (score, p1_elo, p2_elo) = store.update_rating("Alice", "Dave", 1.0, &mut lines);

    assert_eq!(score, 1.0);
    assert_eq!(p1_elo, 1016.0);
    assert_eq!(p2_elo, 1000.0); // the floor binds

    let entries = store.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].user_id, "alice");
    assert_eq!(entries[0].display_name, "Alice");
    assert_eq!((entries[0].w, entries[0].l, entries[0].t), (1, 0, 0));
    assert_eq!((entries[1].w, entries[1].l, entries[1].t), (0, 1, 0));
    assert_eq!(entries[0].h2h_against("dave"), H2hRecord { w: 1, l: 0, t: 0 });
    assert_eq!(entries[1].h2h_against("alice"), H2hRecord { w: 0, l: 1, t: 0 });
    assert!(!entries[0].last_update.is_empty());

    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Alice's rating: 1000 -> 1016"));
    assert!(lines[0].contains("won"));
    assert!(lines[1].contains("Dave's rating: 1000 -> 1000"));
    assert_sorted_and_sane(&store);
}

#[test]
fn unrated_players_read_as_1000() {
    let store = store("unrated");
    assert_eq!(store.rating("Ghost"), 1000.0);
}

#[test]
fn rating_memoizes_through_the_user_cache() {
    let store = store("cache");
    let mut lines: Vec<String> = Vec::new();
    store.update_rating("Alice", "Dave", 1.0, &mut lines);

    let mut cache: HashMap<String, f64> = HashMap::new();
    assert_eq!(store.rating_cached("Alice", Some(&mut cache)), 1016.0);
    assert_eq!(cache.get("gen1ou"), Some(&1016.0));

    // Later battles don't touch the memoized slot until it is dropped.
    store.update_rating("Alice", "Dave", 1.0, &mut lines);
    assert_eq!(store.rating_cached("Alice", Some(&mut cache)), 1016.0);
    assert!(store.rating("Alice") > 1016.0);
}

#[test]
fn ties_and_invalidated_battles() {
    let store = store("ties");
    let mut lines: Vec<String> = Vec::new();
    store.update_rating("Alice", "Dave", 0.5, &mut lines);
    let entries = store.entries();
    assert_eq!((entries[0].w, entries[0].l, entries[0].t), (0, 0, 1));
    assert_eq!((entries[1].w, entries[1].l, entries[1].t), (0, 0, 1));
    assert!(lines[0].contains("tied"));

    // A negative score invalidates the battle: both sides score zero.
    let (score, p1_elo, p2_elo) = store.update_rating("Alice", "Dave", -1.0, &mut lines);
    assert_eq!(score, 0.0);
    assert_eq!(p1_elo, 1000.0);
    assert_eq!(p2_elo, 1000.0);
    assert_sorted_and_sane(&store);
}

#[test]
fn ladder_stays_sorted_across_many_battles() {
    let store = store("sorted");
    let mut lines: Vec<String> = Vec::new();
    let battles = [
        ("Alice", "Bob", 1.0),
        ("Carol", "Dave", 1.0),
        ("Alice", "Carol", 1.0),
        ("Bob", "Dave", 0.0),
        ("Alice", "Dave", 1.0),
        ("Bob", "Carol", 0.5),
        ("Dave", "Alice", 1.0),
        ("Carol", "Alice", 0.0),
    ];
    for (p1, p2, score) in battles {
        store.update_rating(p1, p2, score, &mut lines);
        assert_sorted_and_sane(&store);
    }

    // Wins and losses pair off battle by battle; ties land on both rows.
    let entries = store.entries();
    let wins: u32 = entries.iter().map(|e| e.w).sum();
    let losses: u32 = entries.iter().map(|e| e.l).sum();
    assert_eq!(wins, losses);

    // Head-to-head symmetry across every pair.
    for a in &entries {
        for b in &entries {
            let ab = a.h2h_against(&b.user_id);
            let ba = b.h2h_against(&a.user_id);
            assert_eq!(ab.w, ba.l);
            assert_eq!(ab.l, ba.w);
            assert_eq!(ab.t, ba.t);
        }
    }
}

#[test]
fn persists_and_reloads_identically() {
    let dir = temp_dir("roundtrip");
    let store = LadderStore::new(&dir, "gen1ou");
    let mut lines: Vec<String> = Vec::new();
    store.update_rating("Alice", "Bob", 1.0, &mut lines);
    store.update_rating("Carol", "Alice", 0.5, &mut lines);
    store.update_rating("Bob", "Carol", 1.0, &mut lines);
    let expected = store.entries();

    let text = std::fs::read_to_string(dir.join("gen1ou.tsv")).unwrap();
    assert!(text.starts_with(
        "Elo\tUsername\tW\tL\tT\tGlicko\tRating_Deviation\tGXE\tGames_Played\tLast_update\tH2H_Data\r\n"
    ));
    assert!(text.ends_with("\r\n"));

    let reloaded = LadderStore::new(&dir, "gen1ou");
    assert_eq!(reloaded.entries(), expected);
    assert_sorted_and_sane(&reloaded);
}

#[test]
fn legacy_five_column_files_are_upgraded() {
    let dir = temp_dir("legacy");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("gen1ou.tsv"),
        "1342.5\tAlice\t30\t20\t0\r\n1100\tBob\t2\t1\t0\r\n",
    )
    .unwrap();

    let store = LadderStore::new(&dir, "gen1ou");
    let entries = store.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].games, 50);
    assert_eq!(entries[0].rd, 30.0); // max(30, 130 - 2*50)
    assert!(matches!(entries[0].gxe, Gxe::Percent(_)));
    assert_eq!(entries[1].rd, 124.0);
    assert_eq!(entries[1].gxe, Gxe::Unknown);
    assert_sorted_and_sane(&store);

    // The next update rewrites the file with the full header.
    let mut lines: Vec<String> = Vec::new();
    store.update_rating("Alice", "Bob", 1.0, &mut lines);
    let text = std::fs::read_to_string(dir.join("gen1ou.tsv")).unwrap();
    assert!(text.starts_with("Elo\tUsername\t"));
}

#[test]
fn registry_shares_one_store_per_format() {
    let registry = LadderRegistry::new(temp_dir("registry"));
    let a = registry.get("gen1ou");
    let b = registry.get("Gen 1 OU"); // canonicalizes to the same id
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(a.format(), "gen1ou");

    let other = registry.get("gen2ou");
    assert!(!std::sync::Arc::ptr_eq(&a, &other));
}

#[test]
fn toplist_filters_by_prefix_and_escapes_names() {
    let store = store("top");
    let mut lines: Vec<String> = Vec::new();
    store.update_rating("Alpha", "Beta", 1.0, &mut lines);
    store.update_rating("Al<b>ert", "Beta", 1.0, &mut lines);

    let all = store.top_html(None);
    assert!(all.contains("Alpha"));
    assert!(all.contains("Beta"));
    assert!(all.contains("Al&lt;b&gt;ert"));

    let filtered = store.top_html(Some("alp"));
    assert!(filtered.contains("Alpha"));
    assert!(!filtered.contains("Beta"));
}

#[test]
fn user_row_is_empty_for_strangers() {
    let store = store("visualize");
    assert_eq!(store.user_html("Nobody"), "");
    let mut lines: Vec<String> = Vec::new();
    store.update_rating("Alice", "Bob", 1.0, &mut lines);
    let row = store.user_html("alice");
    assert!(row.starts_with("<tr>"));
    assert!(row.contains("1016"));
    assert!(row.contains("gen1ou"));
}
