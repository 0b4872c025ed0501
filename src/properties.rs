//! [crate::properties] contains the records that make up a knowledge map: concepts, resources,
//! their content items, and the relation kinds stored on graph edges.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern is valid"));

/// Derive a node id from a display label: lowercase, every run of non-alphanumeric characters
/// collapsed into a single `-`, with no leading or trailing `-`.
///
/// ```rust
/// assert_eq!(knowledge_map::properties::slugify("Hello you"), "hello-you");
/// ```
pub fn slugify(label: &str) -> String {
    let lowered = label.to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Stable identity of a content entry. Assigned once at creation and never reused, so edits
/// addressed by id survive removals that shift positional indices.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ContentId(Uuid);

impl ContentId {
    pub fn generate() -> Self {
        ContentId(Uuid::new_v4())
    }
}

impl Display for ContentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for ContentId {
    type Error = uuid::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(ContentId(Uuid::parse_str(value)?))
    }
}

/// A piece of learning content attached to a concept or resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentItem {
    Link {
        title: String,
        link: String,
        #[serde(default)]
        description: String,
    },
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        text: String,
    },
}

impl ContentItem {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentItem::Text {
            title: None,
            text: text.into(),
        }
    }

    pub fn titled_text<T: Into<String>, S: Into<String>>(title: T, text: S) -> Self {
        ContentItem::Text {
            title: Some(title.into()),
            text: text.into(),
        }
    }

    pub fn link<T, L, D>(title: T, link: L, description: D) -> Self
    where
        T: Into<String>,
        L: Into<String>,
        D: Into<String>,
    {
        ContentItem::Link {
            title: title.into(),
            link: link.into(),
            description: description.into(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            ContentItem::Link { title, .. } => Some(title),
            ContentItem::Text { title, .. } => title.as_deref(),
        }
    }

    /// The target of a link item, `None` for text.
    pub fn href(&self) -> Option<&str> {
        match self {
            ContentItem::Link { link, .. } => Some(link),
            ContentItem::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    #[serde(default = "ContentId::generate")]
    pub id: ContentId,
    #[serde(flatten)]
    pub item: ContentItem,
}

impl ContentEntry {
    pub fn new(item: ContentItem) -> Self {
        ContentEntry {
            id: ContentId::generate(),
            item,
        }
    }
}

impl From<ContentItem> for ContentEntry {
    fn from(item: ContentItem) -> Self {
        ContentEntry::new(item)
    }
}

/// The JSON form of a concept as found in `{"concepts": [...]}` documents.
///
/// An empty `id` is filled in from the slug of `name` when the concept enters a map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentEntry>,
}

impl Concept {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Self {
        Concept {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content<I: IntoIterator<Item = ContentItem>>(mut self, content: I) -> Self {
        self.content = content.into_iter().map(ContentEntry::new).collect();
        self
    }

    pub(crate) fn resolved_id(&self) -> String {
        if self.id.is_empty() {
            slugify(&self.name)
        } else {
            self.id.clone()
        }
    }
}

/// Either a bare concept label or a full concept record, as accepted by
/// [`crate::map::KnowledgeMap::define_concept`] and by resource `teaches`/`requires` lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConceptRef {
    Id(String),
    Record(Concept),
}

impl ConceptRef {
    /// The id this reference resolves to once defined.
    pub fn id(&self) -> String {
        match self {
            ConceptRef::Id(label) => slugify(label),
            ConceptRef::Record(concept) => concept.resolved_id(),
        }
    }
}

impl From<&str> for ConceptRef {
    fn from(label: &str) -> Self {
        ConceptRef::Id(label.to_string())
    }
}

impl From<String> for ConceptRef {
    fn from(label: String) -> Self {
        ConceptRef::Id(label)
    }
}

impl From<Concept> for ConceptRef {
    fn from(concept: Concept) -> Self {
        ConceptRef::Record(concept)
    }
}

/// A node representing learning material. `teaches` and `requires` name concepts that are
/// defined on demand when the resource is added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teaches: Vec<ConceptRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<ConceptRef>,
}

impl Resource {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Resource {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn teaching<I, C>(mut self, concepts: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConceptRef>,
    {
        self.teaches = concepts.into_iter().map(Into::into).collect();
        self
    }

    pub fn requiring<I, C>(mut self, concepts: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ConceptRef>,
    {
        self.requires = concepts.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn resolved_id(&self) -> String {
        match &self.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => slugify(&self.label),
        }
    }
}

impl From<&str> for Resource {
    fn from(label: &str) -> Self {
        Resource::new(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Concept,
    Resource,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Concept => "concept",
            NodeKind::Resource => "resource",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node data held by the graph store. Relationship lists are not stored here; they are read off
/// the edge set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub content: Vec<ContentEntry>,
}

impl MapNode {
    pub fn concept<I: Into<String>, L: Into<String>>(id: I, label: L) -> Self {
        MapNode {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Concept,
            content: Vec::new(),
        }
    }

    pub fn resource<I: Into<String>, L: Into<String>>(id: I, label: L) -> Self {
        MapNode {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Resource,
            content: Vec::new(),
        }
    }

    pub fn is_resource(&self) -> bool {
        self.kind == NodeKind::Resource
    }

    /// The first link among this node's content items.
    pub fn first_link(&self) -> Option<&str> {
        self.content.iter().find_map(|entry| entry.item.href())
    }
}

/// What an edge means. Edges always point from the thing required toward the thing that needs
/// it, or from a resource toward the concept it teaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RelationKind {
    #[default]
    Dependency,
    Teaches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Relation {
    pub kind: RelationKind,
}

impl Relation {
    pub fn dependency() -> Self {
        Relation {
            kind: RelationKind::Dependency,
        }
    }

    pub fn teaches() -> Self {
        Relation {
            kind: RelationKind::Teaches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Hello you"), "hello-you");
        assert_eq!(slugify("  Linear   Algebra!! "), "linear-algebra");
        assert_eq!(slugify("C++ & Rust"), "c-rust");
        assert_eq!(slugify("already-slugged"), "already-slugged");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn content_items_parse_by_shape() {
        let entries: Vec<ContentEntry> = serde_json::from_str(
            r#"[
                {"text": "plain"},
                {"title": "Intro", "text": "titled"},
                {"title": "Docs", "link": "https://example.org", "description": "ref"}
            ]"#,
        )
        .unwrap();

        assert_eq!(entries[0].item, ContentItem::text("plain"));
        assert_eq!(entries[1].item, ContentItem::titled_text("Intro", "titled"));
        assert_eq!(entries[2].item.href(), Some("https://example.org"));
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn content_id_survives_serialization() {
        let entry = ContentEntry::new(ContentItem::text("keep me"));
        let json = serde_json::to_string(&entry).unwrap();
        let back: ContentEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
        assert_eq!(
            ContentId::try_from(entry.id.to_string().as_str()).unwrap(),
            entry.id
        );
    }

    #[test]
    fn concept_refs_resolve_ids() {
        assert_eq!(ConceptRef::from("Set Theory").id(), "set-theory");
        let record: ConceptRef = serde_json::from_str(r#"{"name": "Group Theory"}"#).unwrap();
        assert_eq!(record.id(), "group-theory");
        let explicit: ConceptRef =
            serde_json::from_str(r#"{"id": "groups", "name": "Group Theory"}"#).unwrap();
        assert_eq!(explicit.id(), "groups");
    }

    #[test]
    fn resource_id_defaults_to_slug() {
        assert_eq!(Resource::new("Hello you").resolved_id(), "hello-you");
        let mut resource = Resource::new("Hello you");
        resource.id = Some("custom".to_string());
        assert_eq!(resource.resolved_id(), "custom");
    }
}
