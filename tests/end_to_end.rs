//! End-to-end scenarios exercising the facade the way a caller actually
//! would: open a database, add data, query it.

use brainy_db::metadata::FilterNode;
use brainy_db::noun::NewNoun;
use brainy_db::query::{ConnectedSpec, Query, QueryOptions, QueryTarget};
use brainy_db::verb::{NewVerb, VerbDirection, VerbType};
use brainy_db::{BrainyDb, Config};
use serde_json::{json, Map};
use tempfile::tempdir;

fn open_db() -> (tempfile::TempDir, BrainyDb) {
    let dir = tempdir().unwrap();
    let db = BrainyDb::open(dir.path(), Config::ephemeral()).unwrap();
    (dir, db)
}

fn props(pairs: &[(&str, serde_json::Value)]) -> Map<String, serde_json::Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn test_add_and_search_returns_the_added_noun() {
    let (_dir, db) = open_db();

    let vector = vec![0.1, 0.2, 0.3, 0.4];
    let id = db
        .add_noun(NewNoun {
            vector: Some(vector.clone()),
            properties: props(&[("topic", json!("ml"))]),
            ..Default::default()
        })
        .unwrap();

    let mut options = QueryOptions::from_config(&db.config().query);
    options.limit = 1;
    let page = db.search(QueryTarget::Vector(vector), options).unwrap();

    assert_eq!(page.hits.len(), 1);
    assert_eq!(page.hits[0].noun.id, id);
    assert!(page.hits[0].score >= 0.9, "expected near-exact match, got {}", page.hits[0].score);
}

#[test]
fn test_filtered_search_returns_only_matching_year_range() {
    let (_dir, db) = open_db();

    let old = db
        .add_noun(NewNoun {
            vector: Some(vec![1.0, 0.0]),
            properties: props(&[("year", json!(2019))]),
            ..Default::default()
        })
        .unwrap();
    let recent = db
        .add_noun(NewNoun {
            vector: Some(vec![1.0, 0.1]),
            properties: props(&[("year", json!(2021))]),
            ..Default::default()
        })
        .unwrap();
    let newest = db
        .add_noun(NewNoun {
            vector: Some(vec![1.0, 0.2]),
            properties: props(&[("year", json!(2023))]),
            ..Default::default()
        })
        .unwrap();

    let query = Query {
        like: Some(QueryTarget::Vector(vec![1.0, 0.1])),
        r#where: Some(FilterNode::GreaterThanOrEqual { field: "year".into(), value: json!(2020) }),
        connected: None,
    };
    let mut options = QueryOptions::from_config(&db.config().query);
    options.limit = 10;
    let page = db.find(query, options).unwrap();

    let ids: Vec<_> = page.hits.iter().map(|h| h.noun.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&recent));
    assert!(ids.contains(&newest));
    assert!(!ids.contains(&old));
    // fused score is non-increasing
    for pair in page.hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_nested_metadata_filters_by_dot_path() {
    let (_dir, db) = open_db();

    let nyc = db
        .add_noun(NewNoun {
            vector: Some(vec![1.0, 0.0]),
            properties: props(&[("address", json!({"city": "NYC", "zip": 10001}))]),
            ..Default::default()
        })
        .unwrap();
    db.add_noun(NewNoun {
        vector: Some(vec![0.0, 1.0]),
        properties: props(&[("address", json!({"city": "Boston", "zip": 2101}))]),
        ..Default::default()
    })
    .unwrap();

    let query = Query {
        r#where: Some(FilterNode::Equals { field: "address.city".into(), value: json!("NYC") }),
        ..Default::default()
    };
    let options = QueryOptions::from_config(&db.config().query);
    let page = db.find(query, options).unwrap();

    let ids: Vec<_> = page.hits.iter().map(|h| h.noun.id).collect();
    assert_eq!(ids, vec![nyc]);
}

#[test]
fn test_soft_delete_roundtrip_hides_then_restores() {
    let (_dir, db) = open_db();

    let vector = vec![0.4, 0.3, 0.2];
    let id = db
        .add_noun(NewNoun {
            vector: Some(vector.clone()),
            properties: props(&[("topic", json!("ml"))]),
            ..Default::default()
        })
        .unwrap();

    let search_options = || QueryOptions::from_config(&db.config().query);

    let before = db.search(QueryTarget::Vector(vector.clone()), search_options()).unwrap();
    assert_eq!(before.hits.len(), 1);

    db.delete_noun(id).unwrap();
    assert!(db.get_noun(id).unwrap().is_none());
    let during = db.search(QueryTarget::Vector(vector.clone()), search_options()).unwrap();
    assert!(during.hits.is_empty());

    db.restore_noun(id).unwrap();
    let after = db.search(QueryTarget::Vector(vector), search_options()).unwrap();
    assert_eq!(after.hits.len(), 1);
    assert_eq!(after.hits[0].noun.id, id);
}

#[test]
fn test_verb_traversal_finds_one_hop_neighbor() {
    let (_dir, db) = open_db();

    let a = db.add_noun(NewNoun { vector: Some(vec![0.0, 0.0]), ..Default::default() }).unwrap();
    let b = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.1]), ..Default::default() }).unwrap();
    let c = db.add_noun(NewNoun { vector: Some(vec![0.2, 0.2]), ..Default::default() }).unwrap();

    db.add_verb(NewVerb {
        source_id: a,
        target_id: b,
        verb_type: VerbType::RelatedTo,
        weight: None,
        confidence: None,
        vector: None,
        properties: Map::new(),
    })
    .unwrap();
    db.add_verb(NewVerb {
        source_id: b,
        target_id: c,
        verb_type: VerbType::RelatedTo,
        weight: None,
        confidence: None,
        vector: None,
        properties: Map::new(),
    })
    .unwrap();

    let query = Query {
        connected: Some(ConnectedSpec { from: a, via: Some(VerbType::RelatedTo), direction: VerbDirection::Outgoing }),
        ..Default::default()
    };
    let options = QueryOptions::from_config(&db.config().query);
    let page = db.find(query, options).unwrap();

    let ids: Vec<_> = page.hits.iter().map(|h| h.noun.id).collect();
    assert_eq!(ids, vec![b]);
    assert!(!ids.contains(&c), "c is two hops away, not one");
}

#[test]
fn test_wrong_dimension_is_rejected_and_count_unchanged() {
    let dir = tempdir().unwrap();
    let mut config = Config::ephemeral();
    config.embedding_dimension = brainy_db::EmbeddingDimension::D384;
    let db = BrainyDb::open(dir.path(), config).unwrap();

    let before = db.get_statistics(Default::default()).unwrap().noun_count;

    let result = db.add_noun(NewNoun { vector: Some(vec![0.0, 1.0]), ..Default::default() });
    assert!(result.is_err(), "384-dim database should reject a 2-dim vector");

    let after = db.get_statistics(Default::default()).unwrap().noun_count;
    assert_eq!(before, after);
}

#[test]
fn test_cursor_pagination_walks_through_all_pages() {
    let (_dir, db) = open_db();

    for i in 0..25u32 {
        db.add_noun(NewNoun {
            vector: Some(vec![i as f32, 0.0]),
            properties: props(&[("group", json!("paged"))]),
            ..Default::default()
        })
        .unwrap();
    }

    let query = Query { r#where: Some(FilterNode::Equals { field: "group".into(), value: json!("paged") }), ..Default::default() };
    let mut options = QueryOptions::from_config(&db.config().query);
    options.limit = 10;

    let page1 = db.find(query.clone(), options.clone()).unwrap();
    assert_eq!(page1.hits.len(), 10);
    assert!(page1.has_more);

    options.cursor = page1.next_cursor.clone();
    let page2 = db.find(query.clone(), options.clone()).unwrap();
    assert_eq!(page2.hits.len(), 10);
    assert!(page2.has_more);

    options.cursor = page2.next_cursor.clone();
    let page3 = db.find(query, options).unwrap();
    assert_eq!(page3.hits.len(), 5);
    assert!(!page3.has_more);

    let mut seen = std::collections::HashSet::new();
    for page in [&page1, &page2, &page3] {
        for hit in &page.hits {
            assert!(seen.insert(hit.noun.id), "duplicate noun across pages");
        }
    }
    assert_eq!(seen.len(), 25);
}
