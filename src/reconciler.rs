//! Keyed enter/update/exit reconciliation of data against scene elements.
//!
//! A [`Renderer`] is configured with a target [`Layer`], a structural class, a key function and
//! (optionally) a make function. Each [`Renderer::run`] call:
//!
//! 1. computes the key of every datum,
//! 2. unmounts every element of the layer/class whose key is gone (exit),
//! 3. makes, tags, and binds an element for every new key (enter),
//! 4. calls every `on_new` callback with the entered set, then every `on_update` callback with
//!    every bound element (entered and retained), in registration order.
//!
//! Bindings live in the scene itself (class + key on each element), so two renderers configured
//! with the same layer, class and key function address the same elements. The render cycle uses
//! this to split "create node groups" from "position node groups".
//!
//! Keys must be unique within one call. When they are not, the last datum with a given key wins
//! and the earlier ones are skipped for that pass.

use std::{collections::HashMap, fmt, rc::Rc};

use crate::{
    error::{KnowledgeMapError, Result},
    scene::{ElementId, Layer, Scene},
};

/// Class used to tag entered elements when none is configured.
pub const DEFAULT_CLASS: &str = "km-row";

/// One datum bound to its element for the duration of a callback.
#[derive(Debug)]
pub struct Bound<'a, T> {
    pub key: &'a str,
    pub element: ElementId,
    pub datum: &'a T,
}

impl<T> Clone for Bound<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Bound<'_, T> {}

pub type Callback<T> = Rc<dyn Fn(&mut dyn Scene, &[Bound<'_, T>]) -> Result<()>>;
pub type KeyFn<T> = Rc<dyn Fn(&T) -> String>;
pub type MakeFn<T> = Rc<dyn Fn(&mut dyn Scene, Layer, &T) -> Option<ElementId>>;

/// Wrap a closure as a [`Callback`] so it can later be removed by identity.
pub fn callback<T, F>(f: F) -> Callback<T>
where
    F: Fn(&mut dyn Scene, &[Bound<'_, T>]) -> Result<()> + 'static,
{
    Rc::new(f)
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Every element bound after the pass (retained and entered), in data order.
    pub bound: Vec<(String, ElementId)>,
    /// Elements created by this pass.
    pub entered: Vec<(String, ElementId)>,
    /// Keys whose elements were unmounted.
    pub exited: Vec<String>,
}

pub struct Renderer<T> {
    layer: Option<Layer>,
    class: Option<String>,
    key: Option<KeyFn<T>>,
    make: Option<MakeFn<T>>,
    on_new: Vec<Callback<T>>,
    on_update: Vec<Callback<T>>,
}

impl<T> Default for Renderer<T> {
    fn default() -> Self {
        Renderer {
            layer: None,
            class: None,
            key: None,
            make: None,
            on_new: Vec::new(),
            on_update: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Renderer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("layer", &self.layer)
            .field("class", &self.class)
            .field("has_key", &self.key.is_some())
            .field("has_make", &self.make.is_some())
            .field("on_new", &self.on_new.len())
            .field("on_update", &self.on_update.len())
            .finish()
    }
}

impl<T> Renderer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inside(mut self, layer: Layer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn use_class<S: Into<String>>(mut self, class: S) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn key<F: Fn(&T) -> String + 'static>(mut self, f: F) -> Self {
        self.key = Some(Rc::new(f));
        self
    }

    pub fn make<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn Scene, Layer, &T) -> Option<ElementId> + 'static,
    {
        self.make = Some(Rc::new(f));
        self
    }

    pub fn layer(&self) -> Option<Layer> {
        self.layer
    }

    pub fn class(&self) -> &str {
        self.class.as_deref().unwrap_or(DEFAULT_CLASS)
    }

    pub fn on_new(&mut self, cb: Callback<T>) -> &mut Self {
        self.on_new.push(cb);
        self
    }

    /// Remove the first registration of `cb` (compared by pointer identity).
    pub fn off_new(&mut self, cb: &Callback<T>) -> &mut Self {
        if let Some(idx) = self.on_new.iter().position(|c| Rc::ptr_eq(c, cb)) {
            self.on_new.remove(idx);
        }
        self
    }

    pub fn on_update(&mut self, cb: Callback<T>) -> &mut Self {
        self.on_update.push(cb);
        self
    }

    /// Remove the first registration of `cb` (compared by pointer identity).
    pub fn off_update(&mut self, cb: &Callback<T>) -> &mut Self {
        if let Some(idx) = self.on_update.iter().position(|c| Rc::ptr_eq(c, cb)) {
            self.on_update.remove(idx);
        }
        self
    }

    pub fn new_callbacks(&self) -> usize {
        self.on_new.len()
    }

    pub fn update_callbacks(&self) -> usize {
        self.on_update.len()
    }

    pub fn run(&self, scene: &mut dyn Scene, data: &[T]) -> Result<Reconciled> {
        let key_fn = self
            .key
            .as_ref()
            .ok_or_else(|| KnowledgeMapError::Contract("renderer has no key function".into()))?;
        let layer = self
            .layer
            .ok_or_else(|| KnowledgeMapError::Contract("renderer has no target layer".into()))?;
        if self.make.is_none() && self.class.is_none() {
            return Err(KnowledgeMapError::Contract(
                "renderer has neither a make function nor a class".into(),
            ));
        }
        let class = self.class();

        let keys: Vec<String> = data.iter().map(|datum| key_fn(datum)).collect();
        let mut last: HashMap<&str, usize> = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if last.insert(key.as_str(), i).is_some() {
                tracing::warn!(
                    "[Renderer::run] duplicate key '{}' in {:?}/{}, keeping the last datum",
                    key,
                    layer,
                    class
                );
            }
        }

        let mut existing: HashMap<String, ElementId> = HashMap::new();
        let mut exited = Vec::new();
        for (key, element) in scene.select(layer, class) {
            if last.contains_key(key.as_str()) {
                existing.insert(key, element);
            } else {
                scene.unmount(element);
                exited.push(key);
            }
        }

        let mut bound_idx: Vec<(usize, ElementId)> = Vec::with_capacity(last.len());
        let mut entered_idx: Vec<(usize, ElementId)> = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            if last[key.as_str()] != i {
                continue;
            }
            if let Some(element) = existing.get(key) {
                bound_idx.push((i, *element));
                continue;
            }
            match &self.make {
                Some(make) => {
                    let element = make(&mut *scene, layer, &data[i]).ok_or_else(|| {
                        KnowledgeMapError::Contract(format!(
                            "make function returned no element for key '{key}'"
                        ))
                    })?;
                    scene.tag(element, class, key);
                    bound_idx.push((i, element));
                    entered_idx.push((i, element));
                }
                None => {
                    tracing::debug!(
                        "[Renderer::run] no element for '{}' in {:?}/{} and no make function",
                        key,
                        layer,
                        class
                    );
                }
            }
        }

        let bind = |(i, element): &(usize, ElementId)| Bound {
            key: keys[*i].as_str(),
            element: *element,
            datum: &data[*i],
        };
        let entered: Vec<Bound<'_, T>> = entered_idx.iter().map(&bind).collect();
        let bound: Vec<Bound<'_, T>> = bound_idx.iter().map(&bind).collect();

        for cb in &self.on_new {
            cb(&mut *scene, &entered)?;
        }
        for cb in &self.on_update {
            cb(&mut *scene, &bound)?;
        }

        Ok(Reconciled {
            bound: bound
                .iter()
                .map(|b| (b.key.to_string(), b.element))
                .collect(),
            entered: entered
                .iter()
                .map(|b| (b.key.to_string(), b.element))
                .collect(),
            exited,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;
    use std::cell::RefCell;
    use test_log::test;

    #[derive(Debug, Clone)]
    struct Row {
        id: &'static str,
        label: &'static str,
    }

    fn rows(items: &[(&'static str, &'static str)]) -> Vec<Row> {
        items
            .iter()
            .map(|(id, label)| Row { id, label })
            .collect()
    }

    fn renderer() -> Renderer<Row> {
        Renderer::new()
            .inside(Layer::Nodes)
            .use_class("node")
            .key(|r: &Row| r.id.to_string())
            .make(|scene, layer, _| Some(scene.mount(layer)))
    }

    fn keys(set: &[(String, ElementId)]) -> Vec<&str> {
        set.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn first_run_enters_everything() {
        let mut scene = MemoryScene::new();
        let result = renderer()
            .run(&mut scene, &rows(&[("a", "A"), ("b", "B")]))
            .unwrap();
        assert_eq!(keys(&result.entered), vec!["a", "b"]);
        assert_eq!(keys(&result.bound), vec!["a", "b"]);
        assert!(result.exited.is_empty());
        assert_eq!(scene.mount_count(), 2);
        assert!(scene.find(Layer::Nodes, "a").unwrap().has_class("node"));
    }

    #[test]
    fn rerun_with_same_keys_is_idempotent() {
        let mut scene = MemoryScene::new();
        let r = renderer();
        r.run(&mut scene, &rows(&[("a", "A"), ("b", "B")])).unwrap();
        let again = r
            .run(&mut scene, &rows(&[("a", "A2"), ("b", "B2")]))
            .unwrap();
        assert!(again.entered.is_empty());
        assert!(again.exited.is_empty());
        assert_eq!(keys(&again.bound), vec!["a", "b"]);
        assert_eq!(scene.mount_count(), 2);
        assert_eq!(scene.unmount_count(), 0);
    }

    #[test]
    fn partitions_enter_update_exit() {
        let mut scene = MemoryScene::new();
        let r = renderer();
        let first = r.run(&mut scene, &rows(&[("a", "A"), ("b", "B")])).unwrap();
        let second = r.run(&mut scene, &rows(&[("b", "B"), ("c", "C")])).unwrap();

        assert_eq!(second.exited, vec!["a".to_string()]);
        assert_eq!(keys(&second.entered), vec!["c"]);
        assert_eq!(keys(&second.bound), vec!["b", "c"]);
        assert_eq!(second.bound[0].1, first.bound[1].1, "b keeps its element");
        assert!(scene.find(Layer::Nodes, "a").is_none());
    }

    #[test]
    fn empty_data_exits_everything() {
        let mut scene = MemoryScene::new();
        let r = renderer();
        r.run(&mut scene, &rows(&[("a", "A"), ("b", "B")])).unwrap();
        let result = r.run(&mut scene, &[]).unwrap();
        assert_eq!(result.exited.len(), 2);
        assert!(result.entered.is_empty() && result.bound.is_empty());
        assert_eq!(scene.len(Layer::Nodes), 0);
    }

    #[test]
    fn duplicate_keys_keep_the_last_datum() {
        let mut scene = MemoryScene::new();
        let mut r = renderer();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        r.on_update(callback(move |_, bound: &[Bound<'_, Row>]| {
            log.borrow_mut()
                .extend(bound.iter().map(|b| b.datum.label.to_string()));
            Ok(())
        }));
        let result = r
            .run(&mut scene, &rows(&[("a", "first"), ("b", "B"), ("a", "second")]))
            .unwrap();
        assert_eq!(keys(&result.bound), vec!["b", "a"]);
        assert_eq!(*seen.borrow(), vec!["B", "second"]);
        assert_eq!(scene.len(Layer::Nodes), 2);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let mut scene = MemoryScene::new();
        let mut r = renderer();
        let calls = Rc::new(RefCell::new(Vec::new()));
        for name in ["new-1", "new-2"] {
            let calls = calls.clone();
            r.on_new(callback(move |_, entered: &[Bound<'_, Row>]| {
                calls.borrow_mut().push(format!("{name}:{}", entered.len()));
                Ok(())
            }));
        }
        let calls_update = calls.clone();
        r.on_update(callback(move |_, bound: &[Bound<'_, Row>]| {
            calls_update
                .borrow_mut()
                .push(format!("update:{}", bound.len()));
            Ok(())
        }));

        r.run(&mut scene, &rows(&[("a", "A")])).unwrap();
        r.run(&mut scene, &rows(&[("a", "A"), ("b", "B")])).unwrap();
        assert_eq!(
            *calls.borrow(),
            vec!["new-1:1", "new-2:1", "update:1", "new-1:1", "new-2:1", "update:2"]
        );
    }

    #[test]
    fn off_removes_by_identity() {
        let mut scene = MemoryScene::new();
        let mut r = renderer();
        let count = Rc::new(RefCell::new(0));
        let counter = count.clone();
        let labeler: Callback<Row> = callback(|scene: &mut dyn Scene, bound: &[Bound<'_, Row>]| {
            for b in bound {
                scene.set_text(b.element, b.datum.label);
            }
            Ok(())
        });
        let other: Callback<Row> = callback(move |_: &mut dyn Scene, _: &[Bound<'_, Row>]| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        r.on_update(labeler.clone()).on_update(other.clone());
        r.off_update(&labeler);
        assert_eq!(r.update_callbacks(), 1);

        r.run(&mut scene, &rows(&[("a", "A")])).unwrap();
        assert_eq!(*count.borrow(), 1);
        assert_eq!(scene.find(Layer::Nodes, "a").unwrap().text, None);

        r.off_update(&labeler);
        assert_eq!(r.update_callbacks(), 1, "removing an absent callback is a no-op");
    }

    #[test]
    fn renderers_sharing_a_class_share_elements() {
        let mut scene = MemoryScene::new();
        let create = renderer();
        let mut position: Renderer<Row> = Renderer::new()
            .inside(Layer::Nodes)
            .use_class("node")
            .key(|r: &Row| r.id.to_string());
        position.on_update(callback(|scene, bound: &[Bound<'_, Row>]| {
            for b in bound {
                scene.set_text(b.element, b.datum.label);
            }
            Ok(())
        }));

        let data = rows(&[("a", "A")]);
        let created = create.run(&mut scene, &data).unwrap();
        let positioned = position.run(&mut scene, &data).unwrap();
        assert!(positioned.entered.is_empty());
        assert_eq!(positioned.bound, created.bound);
        assert_eq!(scene.find(Layer::Nodes, "a").unwrap().text.as_deref(), Some("A"));
    }

    #[test]
    fn class_only_renderer_skips_unknown_keys() {
        let mut scene = MemoryScene::new();
        let position: Renderer<Row> = Renderer::new()
            .inside(Layer::Nodes)
            .use_class("node")
            .key(|r: &Row| r.id.to_string());
        let result = position.run(&mut scene, &rows(&[("a", "A")])).unwrap();
        assert!(result.bound.is_empty());
        assert_eq!(scene.mount_count(), 0);
    }

    #[test]
    fn contract_violations_are_errors() {
        let mut scene = MemoryScene::new();
        let no_key: Renderer<Row> = Renderer::new().inside(Layer::Nodes).use_class("node");
        assert!(no_key.run(&mut scene, &[]).unwrap_err().is_contract());

        let no_layer: Renderer<Row> = Renderer::new()
            .use_class("node")
            .key(|r: &Row| r.id.to_string());
        assert!(no_layer.run(&mut scene, &[]).unwrap_err().is_contract());

        let nothing_to_make: Renderer<Row> = Renderer::new()
            .inside(Layer::Nodes)
            .key(|r: &Row| r.id.to_string());
        assert!(nothing_to_make.run(&mut scene, &[]).unwrap_err().is_contract());

        let broken_make: Renderer<Row> = Renderer::new()
            .inside(Layer::Nodes)
            .key(|r: &Row| r.id.to_string())
            .make(|_, _, _| None);
        let err = broken_make
            .run(&mut scene, &rows(&[("a", "A")]))
            .unwrap_err();
        assert!(matches!(err, KnowledgeMapError::Contract(msg) if msg.contains("'a'")));
    }

    #[test]
    fn callback_errors_propagate() {
        let mut scene = MemoryScene::new();
        let mut r = renderer();
        r.on_new(callback(|_, _: &[Bound<'_, Row>]| {
            Err(KnowledgeMapError::Handler("refused".into()))
        }));
        let err = r.run(&mut scene, &rows(&[("a", "A")])).unwrap_err();
        assert_eq!(err, KnowledgeMapError::Handler("refused".into()));
    }
}
