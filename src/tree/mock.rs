// src/tree/mock.rs
// In-memory TreeAdapter used by tests and by `slunk monitor --fixture`.

use super::{ElementId, Role, TreeAdapter};
use crate::error::{Result, SlunkError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A single node in a `MockTree`.
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    pub role: String,
    pub subrole: Option<String>,
    pub attributes: HashMap<String, String>,
    pub value: Option<String>,
    pub children: Vec<ElementId>,
    pub parent: Option<ElementId>,
}

impl MockElement {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A fully in-memory accessibility tree, built by the caller and walked by
/// `ConversationParser` exactly like a real platform tree.
#[derive(Debug, Default)]
pub struct MockTree {
    nodes: HashMap<ElementId, MockElement>,
    focused: Option<ElementId>,
    next_id: ElementId,
    deadline: Duration,
}

impl MockTree {
    pub fn new() -> Self {
        Self {
            deadline: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// Insert a node, optionally under `parent`, returning its id.
    pub fn insert(&mut self, element: MockElement, parent: Option<ElementId>) -> ElementId {
        let id = self.next_id;
        self.next_id += 1;
        let mut element = element;
        element.parent = parent;
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.push(id);
            }
        }
        self.nodes.insert(id, element);
        id
    }

    pub fn set_focused(&mut self, element: ElementId) {
        self.focused = Some(element);
    }

    fn get(&self, id: ElementId) -> Result<&MockElement> {
        self.nodes
            .get(&id)
            .ok_or_else(|| SlunkError::TreeUnavailable(format!("element {id} invalidated")))
    }
}

#[async_trait]
impl TreeAdapter for MockTree {
    fn default_deadline(&self) -> Duration {
        self.deadline
    }

    async fn focused_window(&self) -> Result<Option<ElementId>> {
        Ok(self.focused)
    }

    fn role(&self, element: ElementId) -> Result<Role> {
        Ok(self.get(element)?.role.clone())
    }

    fn subrole(&self, element: ElementId) -> Result<Option<String>> {
        Ok(self.get(element)?.subrole.clone())
    }

    fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        Ok(self.get(element)?.attributes.get(name).cloned())
    }

    fn children(&self, element: ElementId, max_children: usize) -> Result<Vec<ElementId>> {
        let node = self.get(element)?;
        if node.children.len() > max_children {
            return Err(SlunkError::TreeUnavailable(format!(
                "element {element} reports {} children, exceeding bound {max_children}",
                node.children.len()
            )));
        }
        Ok(node.children.clone())
    }

    fn value(&self, element: ElementId, max_value: usize) -> Result<Option<String>> {
        let node = self.get(element)?;
        match &node.value {
            Some(v) if v.chars().count() > max_value => Err(SlunkError::TreeUnavailable(
                format!("element {element} value exceeds bound {max_value} chars"),
            )),
            other => Ok(other.clone()),
        }
    }

    fn parent(&self, element: ElementId, depth: usize) -> Result<Option<ElementId>> {
        let mut current = element;
        for _ in 0..depth {
            match self.get(current)?.parent {
                Some(p) => current = p,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}
