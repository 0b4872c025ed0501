//! The rendering surface a knowledge map draws into.
//!
//! A [`Scene`] only knows how to mount, unmount, tag, measure, and position visual elements.
//! Everything that decides *which* elements exist lives in [`crate::reconciler`]. Browser
//! bindings implement this trait over SVG; [`MemoryScene`] keeps the element tree in memory and
//! is what tests and the `kmap` CLI use.

use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    fmt::Write as _,
    rc::Rc,
};

use crate::geometry::{Point, Size, Transition};

/// Container groups inside the scene. Edges are drawn below nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    Edges,
    Nodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

pub trait Scene {
    /// Prepare the scene inside the host mount point named by `inside` (a selector).
    fn attach(&mut self, inside: &str);
    /// Create a new, untagged element in `layer`.
    fn mount(&mut self, layer: Layer) -> ElementId;
    fn unmount(&mut self, element: ElementId);
    /// Add `class` to the element and bind it to the reconciliation `key`.
    fn tag(&mut self, element: ElementId, class: &str, key: &str);
    /// Keyed elements of `layer` carrying `class`, in mount order.
    fn select(&self, layer: Layer, class: &str) -> Vec<(String, ElementId)>;
    fn set_text(&mut self, element: ElementId, text: &str);
    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str);
    /// Bounding box of the element's current content.
    fn measure(&self, element: ElementId) -> Size;
    fn set_position(&mut self, element: ElementId, at: Point, transition: Transition);
    fn set_path(&mut self, element: ElementId, points: &[Point], transition: Transition);
}

const CHAR_WIDTH: f64 = 8.0;
const LINE_HEIGHT: f64 = 16.0;
const PADDING: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneElement {
    pub id: ElementId,
    pub layer: Layer,
    pub classes: BTreeSet<String>,
    pub key: Option<String>,
    pub text: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub position: Option<Point>,
    pub path: Vec<Point>,
    pub last_transition: Transition,
}

impl SceneElement {
    fn new(id: ElementId, layer: Layer) -> Self {
        SceneElement {
            id,
            layer,
            classes: BTreeSet::new(),
            key: None,
            text: None,
            attributes: BTreeMap::new(),
            position: None,
            path: Vec::new(),
            last_transition: Transition::immediate(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn size(&self) -> Size {
        match &self.text {
            Some(text) => Size::new(
                text.chars().count() as f64 * CHAR_WIDTH + 2.0 * PADDING,
                LINE_HEIGHT + 2.0 * PADDING,
            ),
            None => Size::default(),
        }
    }
}

#[derive(Debug, Default)]
struct SceneTree {
    inside: Option<String>,
    next_id: u64,
    elements: BTreeMap<ElementId, SceneElement>,
    mounted: usize,
    unmounted: usize,
}

/// Headless scene. Clones share the same element tree, so a caller can keep a handle while a
/// [`crate::map::KnowledgeMap`] owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryScene(Rc<RefCell<SceneTree>>);

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inside(&self) -> Option<String> {
        self.0.borrow().inside.clone()
    }

    pub fn element(&self, element: ElementId) -> Option<SceneElement> {
        self.0.borrow().elements.get(&element).cloned()
    }

    /// The element of `layer` bound to `key`, if any.
    pub fn find(&self, layer: Layer, key: &str) -> Option<SceneElement> {
        self.0
            .borrow()
            .elements
            .values()
            .find(|el| el.layer == layer && el.key.as_deref() == Some(key))
            .cloned()
    }

    pub fn elements(&self, layer: Layer) -> Vec<SceneElement> {
        self.0
            .borrow()
            .elements
            .values()
            .filter(|el| el.layer == layer)
            .cloned()
            .collect()
    }

    pub fn len(&self, layer: Layer) -> usize {
        self.0
            .borrow()
            .elements
            .values()
            .filter(|el| el.layer == layer)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().elements.is_empty()
    }

    /// Total number of `mount` calls so far.
    pub fn mount_count(&self) -> usize {
        self.0.borrow().mounted
    }

    /// Total number of `unmount` calls that removed an element.
    pub fn unmount_count(&self) -> usize {
        self.0.borrow().unmounted
    }

    /// Serialize the current tree as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let tree = self.0.borrow();
        let mut max = Point::new(0.0, 0.0);
        for el in tree.elements.values() {
            if let Some(at) = el.position {
                let size = el.size();
                max.x = max.x.max(at.x + size.width / 2.0);
                max.y = max.y.max(at.y + size.height / 2.0);
            }
            for p in &el.path {
                max.x = max.x.max(p.x);
                max.y = max.y.max(p.y);
            }
        }

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}">"#,
            (max.x + PADDING).ceil(),
            (max.y + PADDING).ceil()
        );
        svg.push_str(concat!(
            r#"<defs><marker id="arrowhead" viewBox="0 0 10 10" refX="8" refY="5" "#,
            r#"markerUnits="strokeWidth" markerWidth="8" markerHeight="5" orient="auto">"#,
            r#"<path d="M 0 0 L 10 5 L 0 10 z"/></marker></defs>"#,
            "\n"
        ));

        svg.push_str("<g class=\"edges\">\n");
        for el in tree.elements.values().filter(|el| el.layer == Layer::Edges) {
            let d = el
                .path
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}{} {}", if i == 0 { "M" } else { " L" }, p.x, p.y))
                .collect::<String>();
            let _ = writeln!(
                svg,
                r#"<g{}><path d="{}"{}/></g>"#,
                element_header(el),
                d,
                attributes(el)
            );
        }
        svg.push_str("</g>\n<g class=\"nodes\">\n");
        for el in tree.elements.values().filter(|el| el.layer == Layer::Nodes) {
            let at = el.position.unwrap_or_default();
            let size = el.size();
            let _ = writeln!(
                svg,
                r#"<g{} transform="translate({},{})"{}><rect x="{}" y="{}" width="{}" height="{}"/><text text-anchor="middle" alignment-baseline="middle">{}</text></g>"#,
                element_header(el),
                at.x,
                at.y,
                attributes(el),
                -size.width / 2.0,
                -size.height / 2.0,
                size.width,
                size.height,
                escape(el.text.as_deref().unwrap_or_default())
            );
        }
        svg.push_str("</g>\n</svg>\n");
        svg
    }
}

fn element_header(el: &SceneElement) -> String {
    let mut header = String::new();
    if !el.classes.is_empty() {
        let classes: Vec<&str> = el.classes.iter().map(String::as_str).collect();
        let _ = write!(header, r#" class="{}""#, escape(&classes.join(" ")));
    }
    if let Some(key) = &el.key {
        let _ = write!(header, r#" id="{}""#, escape(key));
    }
    header
}

fn attributes(el: &SceneElement) -> String {
    el.attributes
        .iter()
        .map(|(name, value)| format!(r#" {}="{}""#, escape(name), escape(value)))
        .collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl Scene for MemoryScene {
    fn attach(&mut self, inside: &str) {
        self.0.borrow_mut().inside = Some(inside.to_string());
    }

    fn mount(&mut self, layer: Layer) -> ElementId {
        let mut tree = self.0.borrow_mut();
        let id = ElementId(tree.next_id);
        tree.next_id += 1;
        tree.mounted += 1;
        tree.elements.insert(id, SceneElement::new(id, layer));
        id
    }

    fn unmount(&mut self, element: ElementId) {
        let mut tree = self.0.borrow_mut();
        if tree.elements.remove(&element).is_some() {
            tree.unmounted += 1;
        }
    }

    fn tag(&mut self, element: ElementId, class: &str, key: &str) {
        if let Some(el) = self.0.borrow_mut().elements.get_mut(&element) {
            el.classes.insert(class.to_string());
            el.key = Some(key.to_string());
        }
    }

    fn select(&self, layer: Layer, class: &str) -> Vec<(String, ElementId)> {
        self.0
            .borrow()
            .elements
            .values()
            .filter(|el| el.layer == layer && el.has_class(class))
            .filter_map(|el| el.key.clone().map(|key| (key, el.id)))
            .collect()
    }

    fn set_text(&mut self, element: ElementId, text: &str) {
        if let Some(el) = self.0.borrow_mut().elements.get_mut(&element) {
            el.text = Some(text.to_string());
        }
    }

    fn set_attribute(&mut self, element: ElementId, name: &str, value: &str) {
        if let Some(el) = self.0.borrow_mut().elements.get_mut(&element) {
            if name == "class" {
                el.classes
                    .extend(value.split_whitespace().map(str::to_string));
            } else {
                el.attributes.insert(name.to_string(), value.to_string());
            }
        }
    }

    fn measure(&self, element: ElementId) -> Size {
        self.0
            .borrow()
            .elements
            .get(&element)
            .map(SceneElement::size)
            .unwrap_or_default()
    }

    fn set_position(&mut self, element: ElementId, at: Point, transition: Transition) {
        if let Some(el) = self.0.borrow_mut().elements.get_mut(&element) {
            el.position = Some(at);
            el.last_transition = transition;
        }
    }

    fn set_path(&mut self, element: ElementId, points: &[Point], transition: Transition) {
        if let Some(el) = self.0.borrow_mut().elements.get_mut(&element) {
            el.path = points.to_vec();
            el.last_transition = transition;
        }
    }
}
