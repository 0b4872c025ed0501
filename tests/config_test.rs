use std::fs;
use tempfile::tempdir;
use test_log::test;

use knowledge_map::{
    config::{MapConfig, MapDocument},
    layout::RankDir,
    map::KnowledgeMap,
    plugin::PluginRegistry,
    scene::{Layer, MemoryScene},
    KnowledgeMapError,
};

mod common;
use common::{build, fixture};

#[test]
fn loads_toml_config_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kmap.toml");
    fs::write(
        &path,
        r##"
held = true
inside = "#knowledge-map"
plugins = ["links"]
transitionDuration = 250

[layout]
verticalSpace = 30
direction = "LR"
"##,
    )
    .unwrap();

    let config = MapConfig::from_path(&path).unwrap();
    assert!(config.held);
    assert_eq!(config.layout.direction, RankDir::LR);
    assert_eq!(config.layout.vertical_space, 30.0);
    assert_eq!(config.layout.horizontal_space, 50.0);

    let scene = MemoryScene::new();
    let map = KnowledgeMap::with_registry(
        config.with_graph(MapDocument::from_path(fixture("calculus.json")).unwrap()),
        Box::new(scene.clone()),
        &PluginRegistry::create(),
    )
    .unwrap();
    assert!(map.is_held());
    assert_eq!(scene.inside().as_deref(), Some("#knowledge-map"));
    assert_eq!(map.transition().duration.map(|d| d.as_millis()), Some(250));
    assert_eq!(map.subscriber_count("renderGraph"), 1);
}

#[test]
fn loads_json_config_files_with_an_inline_graph() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kmap.json");
    fs::write(
        &path,
        r#"{
            "transitionDuration": 0,
            "graph": {"concepts": [
                {"name": "Vectors"},
                {"name": "Matrices", "dependencies": ["vectors"]}
            ]}
        }"#,
    )
    .unwrap();

    let config = MapConfig::from_path(&path).unwrap();
    let (map, scene) = build(config);
    assert!(map.has_dependency("matrices", "vectors"));
    assert!(!map.transition().is_animated());
    assert!(!scene.find(Layer::Nodes, "matrices").unwrap().last_transition.is_animated());
}

#[test]
fn left_to_right_layouts_grow_along_x() {
    let mut config = MapConfig::default().with_graph(common::calculus());
    config.layout.direction = RankDir::LR;
    let (map, _) = build(config);
    let sets = map.layout().node("sets").unwrap();
    let functions = map.layout().node("functions").unwrap();
    assert!(sets.x < functions.x);
    assert_eq!(sets.y, functions.y);
}

#[test]
fn missing_files_are_not_found() {
    let dir = tempdir().unwrap();
    let err = MapConfig::from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, KnowledgeMapError::NotFound(_)));
}

#[test]
fn malformed_documents_are_serialization_errors() {
    let err = MapDocument::from_json_str(r#"{"concepts": [{"id": 3}]}"#).unwrap_err();
    assert!(matches!(err, KnowledgeMapError::Serialization(_)));
}

#[test]
fn graph_and_resources_together_are_rejected_at_construction() {
    let config = MapConfig::default()
        .with_graph(MapDocument::default())
        .with_resources(vec!["Book".into()]);
    let err = KnowledgeMap::with_registry(
        config,
        Box::new(MemoryScene::new()),
        &PluginRegistry::empty(),
    )
    .unwrap_err();
    assert!(matches!(err, KnowledgeMapError::Config(_)));
}
