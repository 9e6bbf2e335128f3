//! Integration tests for the atom engine.
//!
//! These tests exercise the public API end to end: validation, indexing,
//! connections, batches, snapshots and notifications.

use std::time::Duration;

use atomic_knowledge::{
    AtomConfig, AtomEngine, AtomError, AtomEventKind, AtomId, AtomPatch, AtomSearchQuery,
    AtomSnapshot, AtomType, CancellationToken, DuplicateStrategy, EvidenceLevel, ExportOptions,
    ImportOptions, KnowledgeAtom, OverflowPolicy, SnapshotError,
};
use chrono::{TimeZone, Utc};

const SIGNING_KEY: &[u8] = b"test_snapshot_signing_key";

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn make_atom(id: &str, category: &str, title: &str, content: &str) -> KnowledgeAtom {
    KnowledgeAtom::new(id, AtomType::Mechanism, category, title, content, EvidenceLevel::Moderate)
        .with_polish(format!("{} (pl)", title), format!("{} (pl)", content))
        .with_reference("Kowalski et al. 2022")
}

fn seeded_engine() -> AtomEngine {
    let engine = AtomEngine::default();
    let atoms = vec![
        make_atom("gaba-1", "neurotransmitters", "GABA receptor agonism", "L-theanine increases GABA levels"),
        make_atom("gaba-2", "neurotransmitters", "GABA synthesis pathway", "Glutamate decarboxylase produces GABA")
            .with_related("gaba-1"),
        make_atom("mg-1", "minerals", "Magnesium and sleep", "Magnesium glycinate improves sleep quality")
            .with_related("gaba-1"),
    ];
    let report = engine.process_batch(atoms, &CancellationToken::new()).unwrap();
    assert_eq!(report.stored, 3);
    engine
}

fn ids(atoms: &[KnowledgeAtom]) -> Vec<String> {
    atoms.iter().map(|a| a.id.to_string()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_structural_rejection() {
    let engine = AtomEngine::default();
    let err = engine
        .add_atom(make_atom("short", "minerals", "Zinc", "Too short"))
        .unwrap_err();

    let result = err.validation_result().unwrap();
    assert!(!result.is_valid);
    assert!(result.errors.contains(&"Title must be at least 5 characters".to_string()));
    assert!(result.errors.contains(&"Content must be at least 10 characters".to_string()));
    assert!(!result.recommended_actions.is_empty());
    assert!(engine.get_atom(&"short".into()).is_none());
}

#[test]
fn test_strong_without_references_is_valid_with_capped_score() {
    let engine = AtomEngine::default();
    let atom = KnowledgeAtom::new(
        "a1",
        AtomType::Fact,
        "vitamins",
        "Vitamin D and Bone Health",
        "Sufficient evidence text about vitamin D and bone density",
        EvidenceLevel::Strong,
    );
    let result = engine.add_atom(atom).unwrap();

    assert!(result.is_valid);
    assert_eq!(
        result.warnings,
        vec!["STRONG evidence level requires at least one reference".to_string()]
    );
    assert_eq!(result.quality_score, 100);
}

// ─────────────────────────────────────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_search_text_and_filters() {
    let engine = seeded_engine();

    let result = engine.search(&AtomSearchQuery::text("gaba"));
    assert_eq!(result.total_count, 2);

    let result = engine.search(&AtomSearchQuery::text("GABA synthesis"));
    assert_eq!(ids(&result.atoms), vec!["gaba-2"]);

    let result = engine.search(&AtomSearchQuery::default().with_category("minerals"));
    assert_eq!(ids(&result.atoms), vec!["mg-1"]);

    let result = engine.search(&AtomSearchQuery::text("gab"));
    assert_eq!(result.total_count, 0);
}

#[test]
fn test_search_orders_by_recency_with_global_facets() {
    let engine = AtomEngine::default();
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    for (i, id) in ["b", "a", "c"].iter().enumerate() {
        engine
            .add_atom(
                make_atom(id, "cat", "Shared title words", "Shared content words here")
                    .with_last_updated(base + chrono::Duration::days(i as i64 % 2)),
            )
            .unwrap();
    }

    let result = engine.search(&AtomSearchQuery::text("shared").with_category("cat"));
    // "a" is newest; "b" and "c" tie and fall back to id order
    assert_eq!(ids(&result.atoms), vec!["a", "b", "c"]);

    let filtered = engine.search(&AtomSearchQuery::text("nothing-matches"));
    assert_eq!(filtered.total_count, 0);
    assert_eq!(filtered.facets.categories["cat"], 3);
    assert_eq!(filtered.facets.date_ranges["all"], 3);
}

#[test]
fn test_search_pagination_and_analysis() {
    let engine = AtomEngine::default();
    for i in 0..5 {
        engine
            .add_atom(make_atom(&format!("atom-{}", i), "cat", "Paginated title", "Paginated content body"))
            .unwrap();
    }

    let result = engine.search(&AtomSearchQuery::text("paginated").with_page(2, 2));
    assert_eq!(result.atoms.len(), 2);
    assert_eq!(result.total_count, 5);
    assert_eq!(result.pagination.total_pages, 3);
    assert!(result.pagination.has_next);
    assert!(result.pagination.has_previous);

    let analysis = result.query_analysis.unwrap();
    assert_eq!(analysis.terms, vec!["paginated"]);

    let result = engine.search(&AtomSearchQuery::text("paginatde"));
    assert_eq!(result.total_count, 0);
    assert!(result.query_analysis.unwrap().suggestions.contains(&"paginated".to_string()));
}

#[test]
fn test_clear_cache_then_search_rebuilds_index() {
    let engine = seeded_engine();
    engine.clear_cache();
    assert!(engine.stats().index_stale);

    let result = engine.search(&AtomSearchQuery::text("magnesium"));
    assert_eq!(ids(&result.atoms), vec!["mg-1"]);
    assert!(!engine.stats().index_stale);
}

// ─────────────────────────────────────────────────────────────────────────────
// Update / delete consistency
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_update_reindexes_changed_text() {
    let engine = seeded_engine();
    let patch = AtomPatch {
        title: Some("Zinc and sleep".to_string()),
        content: Some("Zinc picolinate improves sleep onset".to_string()),
        polish_title: Some("Cynk i sen".to_string()),
        polish_content: Some("Pikolinian cynku poprawia zasypianie".to_string()),
        ..AtomPatch::default()
    };
    engine.update_atom(&"mg-1".into(), &patch).unwrap();

    assert_eq!(engine.search(&AtomSearchQuery::text("magnesium")).total_count, 0);
    assert_eq!(ids(&engine.search(&AtomSearchQuery::text("zinc")).atoms), vec!["mg-1"]);
}

#[test]
fn test_update_refreshes_incoming_connection_strength() {
    let engine = seeded_engine();
    let before = engine.connection(&"gaba-2".into(), &"gaba-1".into()).unwrap().strength;

    let patch = AtomPatch {
        evidence_level: Some(EvidenceLevel::Strong),
        ..AtomPatch::default()
    };
    engine.update_atom(&"gaba-1".into(), &patch).unwrap();

    let after = engine.connection(&"gaba-2".into(), &"gaba-1".into()).unwrap().strength;
    assert!(after > before);
}

#[test]
fn test_delete_removes_atom_index_and_edges() {
    let engine = seeded_engine();
    assert_eq!(engine.connections_to(&"gaba-1".into()).len(), 2);

    assert!(engine.delete_atom(&"gaba-1".into()).unwrap());
    assert!(engine.get_atom(&"gaba-1".into()).is_none());
    assert!(engine
        .search(&AtomSearchQuery::text("theanine"))
        .atoms
        .is_empty());
    assert!(engine.connections_from(&"gaba-2".into()).is_empty());
    assert!(engine.connections_from(&"mg-1".into()).is_empty());
    assert_eq!(engine.stats().connection_count, 0);

    assert!(!engine.delete_atom(&"gaba-1".into()).unwrap());
}

#[test]
fn test_connection_strength_is_symmetric_across_engine() {
    let engine = AtomEngine::default();
    engine.add_atom(make_atom("x", "cat", "First claim title", "Alpha beta gamma")).unwrap();
    engine
        .add_atom(make_atom("y", "cat", "Second claim title", "Alpha delta").with_related("x"))
        .unwrap();
    engine
        .update_atom(
            &"x".into(),
            &AtomPatch {
                related_atoms: Some(vec![AtomId::from("y")]),
                ..AtomPatch::default()
            },
        )
        .unwrap();

    let xy = engine.connection(&"x".into(), &"y".into()).unwrap().strength;
    let yx = engine.connection(&"y".into(), &"x".into()).unwrap().strength;
    assert_eq!(xy, yx);
}

fn capped_engine(x_level: EvidenceLevel) -> AtomEngine {
    let mut config = AtomConfig::default();
    config.performance.max_connections = 2;
    let engine = AtomEngine::new(config).unwrap();
    for id in ["x", "y", "z"] {
        let mut atom = make_atom(id, "cat", &format!("Claim about {}", id), &format!("Shared mechanism {}", id));
        if id == "x" {
            atom.evidence_level = x_level;
        }
        engine.add_atom(atom).unwrap();
    }
    engine
        .add_atom(
            make_atom("s", "cat", "Claim about s", "Shared mechanism s")
                .with_related("x")
                .with_related("y")
                .with_related("z"),
        )
        .unwrap();
    engine
}

fn target_ids(engine: &AtomEngine, id: &str) -> Vec<String> {
    engine
        .connections_from(&id.into())
        .iter()
        .map(|c| c.target_atom_id.to_string())
        .collect()
}

#[test]
fn test_capped_edges_follow_current_target_strength() {
    let engine = capped_engine(EvidenceLevel::Insufficient);
    assert_eq!(target_ids(&engine, "s"), vec!["y", "z"]);

    engine
        .update_atom(
            &"x".into(),
            &AtomPatch {
                evidence_level: Some(EvidenceLevel::Strong),
                ..AtomPatch::default()
            },
        )
        .unwrap();

    let fresh = capped_engine(EvidenceLevel::Strong);
    assert_eq!(target_ids(&engine, "s"), target_ids(&fresh, "s"));
    assert_eq!(target_ids(&engine, "s"), vec!["x", "y"]);
}

#[test]
fn test_deleted_target_promotes_declared_atom() {
    let engine = capped_engine(EvidenceLevel::Insufficient);
    assert!(engine.delete_atom(&"y".into()).unwrap());

    assert_eq!(target_ids(&engine, "s"), vec!["x", "z"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Batches
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_partial_failure_batch() {
    let engine = AtomEngine::default();
    let atoms = vec![
        make_atom("ok-1", "cat", "Valid title one", "Valid content number one"),
        make_atom("bad", "cat", "Bad", "Tiny"),
        make_atom("ok-2", "cat", "Valid title two", "Valid content number two"),
    ];
    let report = engine.process_batch(atoms, &CancellationToken::new()).unwrap();

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.stored, 2);
    assert_eq!(report.failed_ids, vec![AtomId::from("bad")]);
    assert_eq!(report.results.iter().filter(|r| !r.is_valid).count(), 1);
    assert_eq!(report.results[1].atom_id.as_str(), "bad");
    assert_eq!(engine.atom_count(), 2);
}

#[test]
fn test_cancelled_batch_stores_nothing_further() {
    let engine = AtomEngine::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = engine
        .process_batch(
            vec![make_atom("a", "cat", "Valid title", "Valid content body")],
            &cancel,
        )
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.stored, 0);
    assert!(report.results.is_empty());
    assert_eq!(engine.atom_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_export_import_round_trip() {
    let source = seeded_engine();
    let options = ExportOptions {
        signing_key: Some(SIGNING_KEY.to_vec()),
        ..ExportOptions::default()
    };
    let mut buffer = Vec::new();
    let snapshot = source
        .export_to_writer(&options, &CancellationToken::new(), &mut buffer)
        .unwrap();
    assert_eq!(snapshot.metadata.atom_count, 3);
    assert_eq!(snapshot.metadata.connection_count, 2);

    let target = AtomEngine::default();
    let import = ImportOptions {
        verification_key: Some(SIGNING_KEY.to_vec()),
        ..ImportOptions::default()
    };
    let report = target
        .import_from_reader(buffer.as_slice(), &import, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.stored, 3);

    for atom in &snapshot.atoms {
        assert_eq!(target.get_atom(&atom.id).as_ref(), Some(atom));
    }
    assert_eq!(target.stats().connection_count, 2);
    assert_eq!(target.stats().fingerprint, source.stats().fingerprint);
}

#[test]
fn test_export_subset_and_filter() {
    let engine = seeded_engine();
    let by_ids = ExportOptions {
        atom_ids: Some(vec![AtomId::from("mg-1"), AtomId::from("gaba-1"), AtomId::from("missing")]),
        ..ExportOptions::default()
    };
    let snapshot = engine.export_atoms(&by_ids, &CancellationToken::new()).unwrap();
    assert_eq!(ids(&snapshot.atoms), vec!["gaba-1", "mg-1"]);
    assert_eq!(snapshot.connections.len(), 1);

    let by_filter = ExportOptions {
        filter: Some(AtomSearchQuery::text("gaba")),
        include_relationships: false,
        ..ExportOptions::default()
    };
    let snapshot = engine.export_atoms(&by_filter, &CancellationToken::new()).unwrap();
    assert_eq!(ids(&snapshot.atoms), vec!["gaba-1", "gaba-2"]);
    assert!(snapshot.connections.is_empty());
}

#[test]
fn test_tampered_snapshot_is_rejected() {
    let engine = seeded_engine();
    let options = ExportOptions {
        signing_key: Some(SIGNING_KEY.to_vec()),
        ..ExportOptions::default()
    };
    let mut snapshot = engine.export_atoms(&options, &CancellationToken::new()).unwrap();
    snapshot.atoms[0].content = "Forged content inserted later".to_string();

    let target = AtomEngine::default();
    let err = target
        .import_atoms(snapshot.clone(), &ImportOptions::default(), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AtomError::Snapshot(SnapshotError::ChecksumMismatch { .. })));

    // Recomputing the checksum does not help without the key.
    let forged = AtomSnapshot::build(
        snapshot.atoms.clone(),
        Vec::new(),
        true,
        true,
        Some(b"attacker-key"),
        snapshot.timestamp,
    )
    .unwrap();
    let import = ImportOptions {
        verification_key: Some(SIGNING_KEY.to_vec()),
        ..ImportOptions::default()
    };
    let err = target
        .import_atoms(forged, &import, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AtomError::Snapshot(SnapshotError::InvalidSignature)));
    assert_eq!(target.atom_count(), 0);
}

#[test]
fn test_import_skip_duplicates() {
    let engine = seeded_engine();
    let snapshot = engine
        .export_atoms(&ExportOptions::default(), &CancellationToken::new())
        .unwrap();

    let import = ImportOptions {
        duplicate_strategy: DuplicateStrategy::Skip,
        ..ImportOptions::default()
    };
    let report = engine
        .import_atoms(snapshot, &import, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.skipped, 3);
    assert_eq!(report.stored, 0);
}

#[test]
fn test_export_cancelled() {
    let engine = seeded_engine();
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(matches!(
        engine.export_atoms(&ExportOptions::default(), &cancel).unwrap_err(),
        AtomError::Cancelled
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_events_for_lifecycle() {
    let engine = AtomEngine::default();
    let sub = engine.subscribe();

    engine.add_atom(make_atom("a", "cat", "Event title", "Event content body")).unwrap();
    engine.add_atom(make_atom("a", "cat2", "Event title", "Event content body")).unwrap();
    engine
        .update_atom(
            &"a".into(),
            &AtomPatch {
                content: Some("Changed event content".to_string()),
                ..AtomPatch::default()
            },
        )
        .unwrap();
    engine.delete_atom(&"a".into()).unwrap();

    let events = sub.drain();
    let kinds: Vec<AtomEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AtomEventKind::Create,
            AtomEventKind::Update,
            AtomEventKind::Update,
            AtomEventKind::Delete
        ]
    );
    assert_eq!(events[1].impact.categories_affected, vec!["cat", "cat2"]);
    assert!(events[2].impact.search_index_updated);
}

#[test]
fn test_slow_subscriber_drops_oldest() {
    let config = AtomConfig::from_json_str(r#"{"graph": {"subscriberBuffer": 2}}"#).unwrap();
    assert_eq!(config.graph.overflow_policy, OverflowPolicy::DropOldest);
    let engine = AtomEngine::new(config).unwrap();
    let sub = engine.subscribe();

    for i in 0..4 {
        engine
            .add_atom(make_atom(&format!("a{}", i), "cat", "Buffered title", "Buffered content body"))
            .unwrap();
    }

    let received: Vec<String> = sub.drain().into_iter().map(|e| e.atom_id.to_string()).collect();
    assert_eq!(received, vec!["a2", "a3"]);
    assert_eq!(sub.dropped(), 2);
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let engine = AtomEngine::default();
    let sub = engine.subscribe();
    let id = sub.id();

    assert!(engine.unsubscribe(&id));
    assert!(!engine.unsubscribe(&id));
    sub.unsubscribe();

    engine.add_atom(make_atom("a", "cat", "Quiet title", "Quiet content body")).unwrap();
    assert!(sub.recv_timeout(Duration::from_millis(10)).is_none());
}

#[test]
fn test_concurrent_readers_and_writer() {
    let engine = std::sync::Arc::new(seeded_engine());
    let mut handles = Vec::new();
    for t in 0..4 {
        let engine = std::sync::Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                if t == 0 {
                    engine
                        .add_atom(make_atom(&format!("w{}", i), "cat", "Written title", "Written content body"))
                        .unwrap();
                } else {
                    let _ = engine.search(&AtomSearchQuery::text("gaba"));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(engine.atom_count(), 28);
}
