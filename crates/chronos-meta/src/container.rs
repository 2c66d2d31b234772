//! Component container
//!
//! Holds components indexed by number (primary, ordered) and by name
//! (secondary, unique). The two indexes are updated together by every
//! mutating operation.
//!
//! Edits are copy-on-write: the first mutation deep-copies the committed
//! components into an edit buffer, all later mutations go to that buffer, and
//! [`ComponentContainer::consolidate`] swaps the buffer in as the new
//! committed state.

use chronos_common::{Error, Result};
use std::collections::{BTreeMap, HashMap};

use crate::component::{Component, DefinitionKey};

#[derive(Debug, Clone)]
struct Index<T> {
    by_number: BTreeMap<u32, T>,
    by_name: HashMap<String, u32>,
}

impl<T> Default for Index<T> {
    fn default() -> Self {
        Self {
            by_number: BTreeMap::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T: Component> Index<T> {
    fn insert(&mut self, component: T) -> Result<bool> {
        let number = component.number();
        if self.by_number.contains_key(&number) {
            return Ok(false);
        }
        if let Some(name) = component.name() {
            if let Some(&owner) = self.by_name.get(name) {
                return Err(Error::DuplicateName {
                    container: T::LABEL.to_string(),
                    name: name.to_string(),
                    owner,
                    number,
                });
            }
            self.by_name.insert(name.to_string(), number);
        }
        self.by_number.insert(number, component);
        Ok(true)
    }

    fn remove(&mut self, number: u32) -> Option<T> {
        let component = self.by_number.remove(&number)?;
        if let Some(name) = component.name()
            && self.by_name.get(name) == Some(&number)
        {
            self.by_name.remove(name);
        }
        Some(component)
    }

    fn get(&self, key: DefinitionKey<'_>) -> Option<&T> {
        match key {
            DefinitionKey::Number(number) => self.by_number.get(&number),
            DefinitionKey::Name(name) => self
                .by_name
                .get(name)
                .and_then(|number| self.by_number.get(number)),
        }
    }
}

/// Collection of components keyed by number and by unique name
#[derive(Debug, Clone)]
pub struct ComponentContainer<T> {
    committed: Index<T>,
    buffer: Option<Index<T>>,
}

impl<T> Default for ComponentContainer<T> {
    fn default() -> Self {
        Self {
            committed: Index::default(),
            buffer: None,
        }
    }
}

impl<T: Component> ComponentContainer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current view: the edit buffer while editing, the committed state otherwise
    fn view(&self) -> &Index<T> {
        self.buffer.as_ref().unwrap_or(&self.committed)
    }

    fn buffer_mut(&mut self) -> &mut Index<T> {
        self.edit();
        self.buffer.get_or_insert_with(Index::default)
    }

    pub fn len(&self) -> usize {
        self.view().by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view().by_number.is_empty()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.view().by_number.contains_key(&number)
    }

    pub fn get(&self, number: u32) -> Option<&T> {
        self.view().by_number.get(&number)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.view().get(DefinitionKey::Name(name))
    }

    pub fn lookup(&self, key: DefinitionKey<'_>) -> Option<&T> {
        self.view().get(key)
    }

    /// Components in ascending number order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.view().by_number.values()
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.view().by_number.keys().copied()
    }

    pub const fn is_editing(&self) -> bool {
        self.buffer.is_some()
    }

    /// Open the edit buffer with a deep copy of the committed components.
    ///
    /// Only the first call copies; later calls are no-ops until the buffer is
    /// consolidated or rolled back.
    pub fn edit(&mut self) {
        if self.buffer.is_none() {
            let mut buffer = self.committed.clone();
            for component in buffer.by_number.values_mut() {
                component.set_editable(true);
            }
            self.buffer = Some(buffer);
        }
    }

    /// Mutate the buffered component of the given number.
    ///
    /// Returns `Ok(None)` if there is no such component. If `f` fails, or if
    /// it renames the component onto a name owned by another component, the
    /// component is restored and the error returned.
    pub fn edit_component<R>(
        &mut self,
        number: u32,
        f: impl FnOnce(&mut T) -> Result<R>,
    ) -> Result<Option<R>> {
        let buffer = self.buffer_mut();
        let Some(component) = buffer.by_number.get_mut(&number) else {
            return Ok(None);
        };
        let before = component.clone();
        let old_name = component.name().map(str::to_owned);

        let outcome = match f(component) {
            Ok(outcome) => outcome,
            Err(e) => {
                *component = before;
                return Err(e);
            }
        };

        let new_name = component.name().map(str::to_owned);
        if new_name != old_name {
            if let Some(name) = &new_name
                && let Some(&owner) = buffer.by_name.get(name)
                && owner != number
            {
                buffer.by_number.insert(number, before);
                return Err(Error::DuplicateName {
                    container: T::LABEL.to_string(),
                    name: name.clone(),
                    owner,
                    number,
                });
            }
            if let Some(old) = old_name {
                buffer.by_name.remove(&old);
            }
            if let Some(new) = new_name {
                buffer.by_name.insert(new, number);
            }
        }
        Ok(Some(outcome))
    }

    /// Add a component.
    ///
    /// Returns `Ok(false)` without touching the container if the number is
    /// already taken, so callers decide whether that is fatal. A name already
    /// owned by another component fails with [`Error::DuplicateName`].
    pub fn add(&mut self, mut component: T) -> Result<bool> {
        component.set_editable(true);
        self.buffer_mut().insert(component)
    }

    /// Remove the component of the given number, returning whether one existed
    pub fn delete(&mut self, number: u32) -> bool {
        if !self.contains(number) {
            return false;
        }
        self.buffer_mut().remove(number).is_some()
    }

    /// Replace the component of the given number with an erasing one
    pub fn erase(&mut self, number: u32) -> Result<()> {
        let buffer = self.buffer_mut();
        buffer.remove(number);
        buffer.insert(T::erasing(number))?;
        Ok(())
    }

    /// Apply one level of definitions on top of the current view.
    ///
    /// Erasing components of the level remove the inherited component of
    /// their number before anything is merged, so a name freed by an erasure
    /// can be taken by another number of the same level. Every other
    /// component is merged into the inherited one, or into `empty(number)`
    /// when there is none.
    pub(crate) fn merge_level(
        &mut self,
        level: &Self,
        empty: impl Fn(u32) -> T,
        merge: impl Fn(&mut T, &T) -> Result<()>,
    ) -> Result<()> {
        for erased in level.iter().filter(|c| c.is_erasing()) {
            self.delete(erased.number());
        }
        for definition in level.iter().filter(|c| !c.is_erasing()) {
            let number = definition.number();
            self.add(empty(number))?;
            self.edit_component(number, |merged| merge(merged, definition))?;
        }
        Ok(())
    }

    /// Commit the edit buffer, freezing every component
    pub fn consolidate(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            for component in buffer.by_number.values_mut() {
                component.freeze();
            }
            self.committed = buffer;
        }
    }

    /// Discard the edit buffer
    pub fn rollback(&mut self) {
        self.buffer = None;
    }

    /// Whether every component in the current view is complete.
    ///
    /// # Panics
    ///
    /// Panics if complete components hide absent or duplicate names, which
    /// would mean the name index drifted from the number index.
    pub fn is_complete(&self) -> bool {
        let view = self.view();
        let complete = view.by_number.values().all(Component::is_complete);
        if complete {
            assert_eq!(
                view.by_name.len(),
                view.by_number.len(),
                "{} name index out of step with its components",
                T::LABEL
            );
        }
        complete
    }

    /// First incomplete component, for diagnostics
    pub fn first_incomplete(&self) -> Option<&T> {
        self.iter().find(|c| !c.is_complete())
    }
}

impl<T: Component + PartialEq> PartialEq for ComponentContainer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.view().by_number == other.view().by_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        number: u32,
        name: Option<String>,
        erasing: bool,
        editable: bool,
    }

    impl Item {
        fn new(number: u32, name: Option<&str>) -> Self {
            Self {
                number,
                name: name.map(str::to_string),
                erasing: false,
                editable: true,
            }
        }
    }

    impl Component for Item {
        const LABEL: &'static str = "item";

        fn erasing(number: u32) -> Self {
            Self {
                erasing: true,
                ..Self::new(number, None)
            }
        }

        fn number(&self) -> u32 {
            self.number
        }

        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn is_complete(&self) -> bool {
            !self.erasing && self.name.is_some()
        }

        fn is_erasing(&self) -> bool {
            self.erasing
        }

        fn is_editable(&self) -> bool {
            self.editable
        }

        fn set_editable(&mut self, editable: bool) {
            self.editable = editable;
        }
    }

    fn rename(name: &str) -> impl FnOnce(&mut Item) -> Result<()> + '_ {
        move |item| {
            item.name = Some(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_number_not_added() {
        let mut c = ComponentContainer::new();
        assert!(c.add(Item::new(5, Some("x"))).unwrap());
        assert!(!c.add(Item::new(5, Some("y"))).unwrap());
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(5).unwrap().name(), Some("x"));
        assert!(c.get_by_name("y").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut c = ComponentContainer::new();
        c.add(Item::new(5, Some("x"))).unwrap();
        let err = c.add(Item::new(6, Some("x"))).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateName { owner: 5, number: 6, .. }
        ));
        assert!(!c.contains(6));
    }

    #[test]
    fn test_delete_removes_name() {
        let mut c = ComponentContainer::new();
        c.add(Item::new(1, Some("a"))).unwrap();
        assert!(c.delete(1));
        assert!(!c.delete(1));
        assert!(c.get_by_name("a").is_none());
        c.add(Item::new(2, Some("a"))).unwrap();
        assert_eq!(c.get_by_name("a").unwrap().number(), 2);
    }

    #[test]
    fn test_copy_on_write() {
        let mut c = ComponentContainer::new();
        c.add(Item::new(1, Some("a"))).unwrap();
        c.consolidate();
        assert!(!c.is_editing());
        assert!(!c.get(1).unwrap().is_editable());

        let snapshot = c.clone();
        c.edit_component(1, rename("b")).unwrap().unwrap();
        assert!(c.is_editing());
        assert!(c.get(1).unwrap().is_editable());
        assert_eq!(c.get(1).unwrap().name(), Some("b"));

        c.rollback();
        assert_eq!(c, snapshot);
        assert_eq!(c.get(1).unwrap().name(), Some("a"));

        c.edit_component(1, rename("b")).unwrap();
        c.consolidate();
        assert_eq!(c.get_by_name("b").unwrap().number(), 1);
        assert!(c.get_by_name("a").is_none());
    }

    #[test]
    fn test_rename_onto_taken_name() {
        let mut c = ComponentContainer::new();
        c.add(Item::new(1, Some("a"))).unwrap();
        c.add(Item::new(2, Some("b"))).unwrap();

        let err = c.edit_component(2, rename("a")).unwrap_err();
        assert_eq!(err.key(), "container.duplicate_name");
        assert_eq!(c.get(2).unwrap().name(), Some("b"));
        assert_eq!(c.get_by_name("b").unwrap().number(), 2);
        assert_eq!(c.get_by_name("a").unwrap().number(), 1);
    }

    #[test]
    fn test_failed_edit_restores_component() {
        let mut c = ComponentContainer::new();
        c.add(Item::new(1, Some("a"))).unwrap();
        let result: Result<Option<()>> = c.edit_component(1, |item| {
            item.name = None;
            Err(Error::internal("boom"))
        });
        assert!(result.is_err());
        assert_eq!(c.get(1).unwrap().name(), Some("a"));
    }

    #[test]
    fn test_edit_missing_component() {
        let mut c: ComponentContainer<Item> = ComponentContainer::new();
        assert!(c.edit_component(9, rename("z")).unwrap().is_none());
    }

    #[test]
    fn test_erase() {
        let mut c = ComponentContainer::new();
        c.add(Item::new(3, Some("a"))).unwrap();
        c.erase(3).unwrap();
        let erased = c.get(3).unwrap();
        assert!(erased.is_erasing());
        assert!(c.get_by_name("a").is_none());
        assert!(!c.is_complete());
    }

    #[test]
    fn test_completeness() {
        let mut c = ComponentContainer::new();
        assert!(c.is_complete());
        c.add(Item::new(1, Some("a"))).unwrap();
        c.add(Item::new(2, None)).unwrap();
        assert!(!c.is_complete());
        assert_eq!(c.first_incomplete().unwrap().number(), 2);
        c.edit_component(2, rename("b")).unwrap();
        assert!(c.is_complete());
    }

    #[test]
    fn test_iteration_order() {
        let mut c = ComponentContainer::new();
        c.add(Item::new(9, None)).unwrap();
        c.add(Item::new(2, None)).unwrap();
        c.add(Item::new(5, None)).unwrap();
        assert_eq!(c.numbers().collect::<Vec<_>>(), vec![2, 5, 9]);
    }
}
