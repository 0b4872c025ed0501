use test_log::test;

use knowledge_map::{
    config::{MapConfig, MapDocument},
    properties::{Concept, ContentItem, NodeKind, Resource},
    scene::Layer,
    KnowledgeMapError,
};

mod common;
use common::{build, calculus, EventLog};

fn two_concepts() -> MapDocument {
    MapDocument::from_json_str(
        r#"{"concepts": [
            {"id": "A", "name": "A"},
            {"id": "B", "name": "B", "dependencies": ["A"]}
        ]}"#,
    )
    .unwrap()
}

#[test]
fn removing_a_dependency_target_cascades() {
    let (mut map, scene) = build(MapConfig::default().with_graph(two_concepts()));
    assert!(map.has_dependency("B", "A"));

    map.remove_concept("A").unwrap();
    assert!(map.graph().has_node("B"));
    assert!(!map.graph().has_node("A"));
    assert!(!map.has_dependency("B", "A"));
    assert!(scene.find(Layer::Nodes, "A").is_none());
    assert_eq!(scene.len(Layer::Edges), 0);
}

#[test]
fn add_resource_slugs_its_label() {
    let (mut map, scene) = build(MapConfig::default());
    let id = map.add_resource("Hello you").unwrap();
    assert_eq!(id, "hello-you");
    let node = map.graph().node("hello-you").unwrap();
    assert_eq!(node.kind, NodeKind::Resource);
    assert_eq!(
        serde_json::to_value(node).unwrap()["type"],
        serde_json::json!("resource")
    );
    assert_eq!(
        scene.find(Layer::Nodes, "hello-you").unwrap().text.as_deref(),
        Some("Hello you")
    );
}

#[test]
fn lifecycle_events_fire_in_order() {
    let (mut map, _) = build(MapConfig::default().with_graph(calculus()));
    let log = EventLog::attach(&mut map);

    map.add_concept(Concept::new("series", "Series").with_dependencies(["sequences"]))
        .unwrap();
    map.add_content("series", ContentItem::text("Sums of sequences"))
        .unwrap();
    assert_eq!(
        log.entries(),
        vec![
            "preLayout",
            "postLayout",
            "renderGraph",
            "preLayout",
            "postLayout",
            "renderGraph"
        ]
    );
}

#[test]
fn held_mutations_render_once_on_unhold() {
    let (mut map, scene) = build(MapConfig::default().held(true));
    let log = EventLog::attach(&mut map);

    map.add_concept("Sets").unwrap();
    map.add_concept("Functions").unwrap();
    map.add_dependency("functions", "sets").unwrap();
    map.add_content("sets", ContentItem::text("Collections")).unwrap();
    map.add_resource(Resource::new("Book of Proof").teaching(["sets"]))
        .unwrap();
    assert!(log.entries().is_empty());
    assert!(scene.is_empty());
    assert_eq!(map.render_count(), 0);

    map.unhold().unwrap();
    assert_eq!(log.entries(), vec!["preLayout", "postLayout", "renderGraph"]);
    assert_eq!(map.render_count(), 1);
    assert_eq!(scene.len(Layer::Nodes), 3);
    assert_eq!(scene.len(Layer::Edges), 2);
    assert!(map.layout().node("book-of-proof").is_some());

    map.hold();
    map.remove_concept("functions").unwrap();
    assert_eq!(scene.len(Layer::Nodes), 3, "held changes stay off the scene");
}

#[test]
fn rendering_twice_keeps_every_element() {
    let (mut map, scene) = build(MapConfig::default().with_graph(calculus()));
    let mounted = scene.mount_count();
    assert_eq!(mounted, map.graph().node_count() + map.graph().edge_count());

    map.render().unwrap();
    map.render().unwrap();
    assert_eq!(scene.mount_count(), mounted);
    assert_eq!(scene.unmount_count(), 0);
}

#[test]
fn remove_concept_leaves_no_incident_edges() {
    let ids: Vec<String> = calculus().concepts.into_iter().map(|c| c.id).collect();
    for id in &ids {
        let (mut map, scene) = build(MapConfig::default().with_graph(calculus()));
        map.remove_concept(id).unwrap();

        assert!(!map.graph().nodes().any(|n| n == id.as_str()));
        assert!(map.graph().incident_edges(id).is_empty());
        assert!(map
            .graph()
            .edge_entries()
            .all(|edge| edge.source != id.as_str() && edge.target != id.as_str()));
        assert!(scene.find(Layer::Nodes, id).is_none());
        assert_eq!(scene.len(Layer::Edges), map.graph().edge_count());
    }
}

#[test]
fn dependency_edges_point_from_dependency_to_dependant() {
    let (mut map, _) = build(MapConfig::default().held(true));
    let names = ["a", "b", "c", "d"];
    for name in names {
        map.add_concept(name).unwrap();
    }
    for (i, concept) in names.iter().enumerate() {
        for dependency in &names[i + 1..] {
            map.add_dependency(concept, dependency).unwrap();
            assert!(map.graph().has_edge(&format!("{dependency}-{concept}")));
            assert!(map.has_dependency(concept, dependency));
            assert!(!map.has_dependency(dependency, concept));
        }
    }
}

#[test]
fn content_indices_shift_on_removal() {
    let (mut map, _) = build(MapConfig::default().with_graph(two_concepts()));
    map.add_content("A", ContentItem::text("first")).unwrap();
    map.add_content("A", ContentItem::text("second")).unwrap();

    map.update_content("A", 1, ContentItem::titled_text("Second", "updated"))
        .unwrap();
    let content = map.content("A").unwrap();
    assert_eq!(content[0].item, ContentItem::text("first"));
    assert_eq!(content[1].item, ContentItem::titled_text("Second", "updated"));
    let second_id = content[1].id;

    map.remove_content("A", 0).unwrap();
    let content = map.content("A").unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0].item, ContentItem::titled_text("Second", "updated"));
    assert_eq!(content[0].id, second_id);
}

#[test]
fn identical_graphs_lay_out_identically() {
    let (first, _) = build(MapConfig::default().with_graph(calculus()));
    let (second, _) = build(MapConfig::default().with_graph(calculus()));
    assert_eq!(first.layout(), second.layout());

    let sets = first.layout().node("sets").unwrap();
    let integrals = first.layout().node("integrals").unwrap();
    assert!(sets.y < integrals.y);
}

#[test]
fn initial_resources_define_their_concepts() {
    let resources = vec![
        Resource::new("Calculus Made Easy")
            .requiring(["Algebra"])
            .teaching(["Derivatives", "Integrals"]),
        Resource::new("Algebra Primer").teaching(["Algebra"]),
    ];
    let (map, scene) = build(MapConfig::default().with_resources(resources));
    for id in ["algebra", "derivatives", "integrals"] {
        assert_eq!(map.graph().node(id).unwrap().kind, NodeKind::Concept);
    }
    assert!(map.has_dependency("calculus-made-easy", "algebra"));
    assert!(map.graph().has_edge("algebra-primer-algebra"));
    assert_eq!(scene.len(Layer::Nodes), 5);
    assert_eq!(scene.len(Layer::Edges), 4);
}

#[test]
fn to_json_round_trips() {
    let (map, _) = build(MapConfig::default().with_graph(calculus()));
    let document = MapDocument::from_json_str(&map.to_json().unwrap()).unwrap();
    assert_eq!(document.concepts.len(), 6);

    let limits = document
        .concepts
        .iter()
        .find(|c| c.id == "limits")
        .unwrap();
    assert_eq!(limits.dependencies, vec!["functions", "sequences"]);
    assert_eq!(limits.content.len(), 2);

    let (reloaded, _) = build(MapConfig::default().with_graph(document.clone()));
    assert_eq!(reloaded.to_document(), document);
}

#[test]
fn unknown_dependencies_in_documents_are_rejected() {
    let document = MapDocument::from_json_str(
        r#"{"concepts": [{"id": "b", "name": "B", "dependencies": ["missing"]}]}"#,
    )
    .unwrap();
    let err = knowledge_map::map::KnowledgeMap::with_registry(
        MapConfig::default().with_graph(document),
        Box::new(knowledge_map::scene::MemoryScene::new()),
        &knowledge_map::plugin::PluginRegistry::empty(),
    )
    .unwrap_err();
    assert!(matches!(err, KnowledgeMapError::NotFound(_)));
}
