//! End-to-end: fixture records → engine → formatted output

use anticorrupt::format;
use anticorrupt_core::{EntityKind, EntityRef, NodeKey};
use anticorrupt_kg::{Direction, EdgeFilter, EdgeLabel, KbConfig, KnowledgeEngine, MatchTier, SearchOptions};
use std::path::{Path, PathBuf};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/data")
}

fn engine_at(dir: &Path) -> KnowledgeEngine {
    let mut config = KbConfig::default();
    config.data.dir = dir.to_path_buf();
    KnowledgeEngine::from_config(config)
}

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

#[tokio::test]
async fn fixture_set_is_clean() {
    let engine = engine_at(&fixtures());
    let report = engine.validate().await.unwrap();
    assert!(report.is_valid(), "{}", format::format_report(&report));
    assert!(report.warnings.is_empty());
    // _template.yaml is skipped
    assert_eq!(report.records_checked, 15);

    let snap = engine.snapshot().await.unwrap();
    assert_eq!(snap.node_count(), 10);
    assert_eq!(snap.edge_count(), 15);
    assert_eq!(snap.knowledge_base().glossary.len(), 2);
}

#[tokio::test]
async fn stf_neighborhood() {
    let engine = engine_at(&fixtures());
    let neighbors = engine.graph("stf", None).await.unwrap();
    let seen: Vec<(&str, &str, Direction)> = neighbors
        .iter()
        .map(|n| (n.node.key.id.as_str(), n.edge.label.as_str(), n.direction))
        .collect();

    assert!(seen.contains(&("cnj", "parent_of", Direction::Outgoing)));
    assert!(seen.contains(&("cnj", "child_of", Direction::Incoming)));
    assert!(seen.contains(&("tse", "oversees", Direction::Incoming)));
    assert!(seen.contains(&("moraes", "member_of", Direction::Incoming)));
    assert!(seen.contains(&("impeachment-dilma", "involves", Direction::Incoming)));

    let text = format::format_neighbors(&NodeKey::institution("stf"), &neighbors);
    assert!(text.contains("<-oversees- institution:tse"));
    assert!(text.contains("-parent_of-> institution:cnj"));
}

#[tokio::test]
async fn path_between_president_and_successor() {
    let engine = engine_at(&fixtures());
    let path = engine.shortest_path("dilma", None, "temer", None, &EdgeFilter::default()).await.unwrap().unwrap();
    assert_eq!(
        path.nodes,
        vec![NodeKey::figure("dilma"), NodeKey::event("impeachment-dilma"), NodeKey::figure("temer")]
    );
    assert_eq!(path.steps[0].edge.label, EdgeLabel::ActorIn);
    assert_eq!(path.steps[1].direction, Direction::Incoming);
    assert_eq!(path.steps[1].edge.role.as_deref(), Some("sucessor"));

    let again = engine.shortest_path("dilma", None, "temer", None, &EdgeFilter::default()).await.unwrap().unwrap();
    assert_eq!(path, again);

    let text = format::format_path("dilma", "temer", Some(&path));
    assert!(text.starts_with("2 hop(s): figure:dilma -actor_in-> event:impeachment-dilma"));
}

#[tokio::test]
async fn causal_traversal() {
    let engine = engine_at(&fixtures());
    let forward = EdgeFilter::outgoing().labels([EdgeLabel::Causes]);
    let reached = engine.traverse("pedaladas-fiscais", None, Some(5), &forward).await.unwrap();
    let ids: Vec<&str> = reached.iter().map(|r| r.node.key.id.as_str()).collect();
    assert_eq!(ids, ["impeachment-dilma", "governo-temer"]);
    assert_eq!(reached[1].depth, 2);
}

#[tokio::test]
async fn search_and_related_terms() {
    let engine = engine_at(&fixtures());
    let hits = engine.search("STF").await.unwrap();
    assert_eq!(hits[0].entity, EntityRef::institution("stf"));
    assert!(hits.iter().any(|h| h.entity == EntityRef::figure("moraes")));

    let options = SearchOptions { expand_related: true, ..Default::default() };
    let hits = engine.search_with("impeachment", &options).await.unwrap();
    assert_eq!(hits[0].entity, EntityRef::glossary("impeachment"));
    let last = hits.last().unwrap();
    assert_eq!(last.entity, EntityRef::glossary("crime-de-responsabilidade"));
    assert_eq!(last.tier, MatchTier::Related);

    assert!(engine.search("").await.unwrap().is_empty());
}

#[tokio::test]
async fn timeline_and_stats() {
    let engine = engine_at(&fixtures());
    let snap = engine.snapshot().await.unwrap();
    let ids: Vec<&str> = snap.timeline("impeachment-2016").iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["pedaladas-fiscais", "governo-temer", "impeachment-dilma"]);

    let stats = snap.stats();
    assert_eq!(stats.nodes_by_kind["figure"], 3);
    assert_eq!(stats.edges_by_label["actor_in"], 4);
    assert!(stats.weakly_connected);
    assert!(format::format_stats(&stats).contains("Weakly connected: yes"));

    let legislative = snap.nodes_by_kind(EntityKind::Institution, Some("legislative"));
    assert_eq!(legislative.len(), 1);
    assert_eq!(legislative[0].key.id, "senado-federal");
}

#[tokio::test]
async fn broken_copy_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    copy_dir(&fixtures(), tmp.path());
    std::fs::write(
        tmp.path().join("figures/ghost-ally.yaml"),
        "id: ghost-ally\nfull_name: Aliado Fantasma\nkey_decisions: [evento-inexistente]\n",
    )
    .unwrap();

    let engine = engine_at(tmp.path());
    let report = engine.validate().await.unwrap();
    assert_eq!(report.error_count(), 1);

    let text = format::format_report(&report);
    assert!(text.contains("ghost-ally.yaml"));
    assert!(text.contains("event:evento-inexistente"));
    assert!(text.contains("✗ 1 error(s)"));

    assert!(engine.get_node("stf", None).await.is_err());
}
