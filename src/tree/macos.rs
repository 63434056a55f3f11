// src/tree/macos.rs
// Real macOS Accessibility backend for C1, compiled only behind
// `cfg(target_os = "macos")` + the `macos-ax` feature. This is the "read-only
// tree-walking interface" spec §1 treats as an external collaborator; Slunk
// only ever touches it through the `TreeAdapter` trait.

use super::{ElementId, Role, TreeAdapter};
use crate::error::{Result, SlunkError};
use accessibility_sys::{
    kAXChildrenAttribute, kAXFocusedUIElementAttribute, kAXParentAttribute, kAXRoleAttribute,
    kAXSubroleAttribute, kAXValueAttribute, kAXWindowAttribute, AXUIElementCopyAttributeValue,
    AXUIElementCreateSystemWide, AXUIElementRef,
};
use async_trait::async_trait;
use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFType, TCFType};
use core_foundation::string::CFString;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// `AXUIElementRef` is not `Send`/`Sync` on its own; Slunk only ever accesses
/// the system-wide element from a single worker task at a time, guarded by
/// the adapter's internal mutex, so wrapping it is sound.
struct SendableElement(AXUIElementRef);
unsafe impl Send for SendableElement {}

/// Live accessibility tree rooted at the system-wide element, with an
/// internal arena mapping opaque `ElementId`s onto AX element handles — the
/// same "short-lived handle, arena-owned" shape as `MockTree`, so the parser
/// (C2) cannot tell which backend it is walking.
pub struct AxTree {
    arena: Mutex<HashMap<ElementId, SendableElement>>,
    next_id: Mutex<ElementId>,
    deadline: Duration,
}

impl AxTree {
    pub fn new(deadline: Duration) -> Self {
        Self {
            arena: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
            deadline,
        }
    }

    fn register(&self, element: AXUIElementRef) -> ElementId {
        let mut next_id = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
        let id = *next_id;
        *next_id += 1;
        self.arena
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, SendableElement(element));
        id
    }

    fn lookup(&self, id: ElementId) -> Result<AXUIElementRef> {
        self.arena
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(|e| e.0)
            .ok_or_else(|| SlunkError::TreeUnavailable(format!("element {id} invalidated")))
    }

    fn copy_string_attribute(&self, id: ElementId, attribute: &str) -> Result<Option<String>> {
        let element = self.lookup(id)?;
        let attr_name = CFString::new(attribute);
        let mut value: core_foundation::base::CFTypeRef = std::ptr::null();
        // SAFETY: `element` was created by a prior `AXUIElementCreate*` call
        // registered in this arena, and `value` is an out-parameter per the
        // AXUIElement C API contract.
        let err = unsafe {
            AXUIElementCopyAttributeValue(element, attr_name.as_concrete_TypeRef(), &mut value)
        };
        if err != 0 || value.is_null() {
            return Ok(None);
        }
        // SAFETY: non-null `value` returned successfully is a +1 CF object.
        let cf_type = unsafe { CFType::wrap_under_create_rule(value) };
        Ok(cf_type.downcast::<CFString>().map(|s| s.to_string()))
    }

    /// Copy an element-valued attribute (`AXParent`, `AXWindow`, ...),
    /// registering the result in the arena. `None` when the attribute is
    /// absent, e.g. a root element with no parent.
    fn copy_element_attribute(&self, id: ElementId, attribute: &str) -> Result<Option<ElementId>> {
        let element = self.lookup(id)?;
        let attr_name = CFString::new(attribute);
        let mut value: core_foundation::base::CFTypeRef = std::ptr::null();
        // SAFETY: same contract as `copy_string_attribute`.
        let err = unsafe {
            AXUIElementCopyAttributeValue(element, attr_name.as_concrete_TypeRef(), &mut value)
        };
        if err != 0 || value.is_null() {
            return Ok(None);
        }
        // SAFETY: a non-null result from a `Copy` call is a +1 reference;
        // element-valued AX attributes hand back `AXUIElementRef`s.
        Ok(Some(self.register(value as AXUIElementRef)))
    }
}

#[async_trait]
impl TreeAdapter for AxTree {
    fn default_deadline(&self) -> Duration {
        self.deadline
    }

    async fn focused_window(&self) -> Result<Option<ElementId>> {
        // SAFETY: `AXUIElementCreateSystemWide` returns a new owned reference
        // to the well-known system-wide accessibility object.
        let system_wide = unsafe { AXUIElementCreateSystemWide() };
        let system_wide_id = self.register(system_wide);
        // The system-wide element only exposes the focused *UI element*, not
        // a window directly; walk from there to its containing window.
        let focused = match self.copy_element_attribute(system_wide_id, kAXFocusedUIElementAttribute)? {
            Some(id) => id,
            None => return Ok(None),
        };
        match self.copy_element_attribute(focused, kAXWindowAttribute)? {
            Some(window) => Ok(Some(window)),
            None => Ok(Some(focused)),
        }
    }

    fn role(&self, element: ElementId) -> Result<Role> {
        Ok(self
            .copy_string_attribute(element, kAXRoleAttribute)?
            .unwrap_or_default())
    }

    fn subrole(&self, element: ElementId) -> Result<Option<String>> {
        self.copy_string_attribute(element, kAXSubroleAttribute)
    }

    fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        self.copy_string_attribute(element, name)
    }

    fn children(&self, element: ElementId, max_children: usize) -> Result<Vec<ElementId>> {
        let ax_element = self.lookup(element)?;
        let attr_name = CFString::new(kAXChildrenAttribute);
        let mut value: core_foundation::base::CFTypeRef = std::ptr::null();
        // SAFETY: same contract as `copy_string_attribute`.
        let err = unsafe {
            AXUIElementCopyAttributeValue(ax_element, attr_name.as_concrete_TypeRef(), &mut value)
        };
        if err != 0 || value.is_null() {
            return Ok(Vec::new());
        }
        // SAFETY: a non-null result for `kAXChildrenAttribute` is a +1
        // CFArray of AXUIElementRefs.
        let array: CFArray<CFType> = unsafe { CFArray::wrap_under_create_rule(value as CFArrayRef) };
        let count = array.len() as usize;
        if count > max_children {
            return Err(SlunkError::TreeUnavailable(format!(
                "element {element} reports {count} children, exceeding bound {max_children}"
            )));
        }

        let mut ids = Vec::with_capacity(count);
        for item in array.iter() {
            // SAFETY: array elements are lent by the array (get rule); retain
            // before storing the handle past this call's lifetime.
            let owned = unsafe { CFType::wrap_under_get_rule(item.as_CFTypeRef()) };
            let owned_ref = owned.as_CFTypeRef();
            std::mem::forget(owned);
            ids.push(self.register(owned_ref as AXUIElementRef));
        }
        Ok(ids)
    }

    fn value(&self, element: ElementId, max_value: usize) -> Result<Option<String>> {
        let value = self.copy_string_attribute(element, kAXValueAttribute)?;
        match value {
            Some(v) if v.chars().count() > max_value => Err(SlunkError::TreeUnavailable(
                format!("element {element} value exceeds bound {max_value} chars"),
            )),
            other => Ok(other),
        }
    }

    fn parent(&self, element: ElementId, depth: usize) -> Result<Option<ElementId>> {
        let mut current = element;
        for _ in 0..depth {
            match self.copy_element_attribute(current, kAXParentAttribute)? {
                Some(parent_id) => current = parent_id,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}
