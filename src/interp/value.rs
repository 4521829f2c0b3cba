//! Runtime values
//!
//! Arrays and objects are shared, mutable handles, as in JavaScript:
//! binding one to a second name aliases it, and `===` compares identity.
//! Everything else is an immutable JSON primitive. Values enter and leave
//! the interpreter as plain JSON.

use serde_json::{Map, Value};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Error;
use crate::js_op;

/// Longest string a body may build, in bytes
pub const MAX_STRING_LEN: usize = 1 << 22;
/// Longest array a body may build
pub const MAX_ARRAY_LEN: usize = 1 << 20;

// Converting to JSON stops past this depth or approximate size in bytes,
// which also catches circular structures
const MAX_JSON_DEPTH: usize = 256;
const MAX_JSON_SIZE: usize = 1 << 26;
const NODE_SIZE: usize = 16;

pub type Items = Vec<JsValue>;
pub type Entries = BTreeMap<String, JsValue>;
pub type ArrayNode = Rc<Node<Items>>;
pub type ObjectNode = Rc<Node<Entries>>;

/// Contents of an array or object
pub trait Contents: Default {
    /// Move every contained value into `pending`.
    fn drain_into(&mut self, pending: &mut Vec<JsValue>);
}

impl Contents for Items {
    fn drain_into(&mut self, pending: &mut Vec<JsValue>) {
        pending.append(self);
    }
}

impl Contents for Entries {
    fn drain_into(&mut self, pending: &mut Vec<JsValue>) {
        pending.extend(std::mem::take(self).into_iter().map(|(_, value)| value));
    }
}

/// A shared, mutable array or object
pub struct Node<T: Contents> {
    contents: RefCell<T>,
}

impl<T: Contents> Node<T> {
    pub fn borrow(&self) -> Ref<'_, T> {
        self.contents.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.contents.borrow_mut()
    }

    fn clear(&self) {
        if let Ok(mut contents) = self.contents.try_borrow_mut() {
            drop(std::mem::take(&mut *contents));
        }
    }
}

// Nested values are freed with a work list, so a long chain such as the
// one `a = [a]` builds in a loop cannot overflow the stack.
impl<T: Contents> Drop for Node<T> {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.contents.get_mut().drain_into(&mut pending);
        while let Some(value) = pending.pop() {
            match &value {
                JsValue::Array(node) => unlink(node, &mut pending),
                JsValue::Object(node) => unlink(node, &mut pending),
                JsValue::Primitive(_) => {}
            }
        }
    }
}

/// Take the contents of a node this is the last handle to.
fn unlink<T: Contents>(node: &Rc<Node<T>>, pending: &mut Vec<JsValue>) {
    if Rc::strong_count(node) == 1 {
        if let Ok(mut contents) = node.contents.try_borrow_mut() {
            contents.drain_into(pending);
        }
    }
}

#[derive(Clone)]
pub enum JsValue {
    /// Never an array or object
    Primitive(Value),
    Array(ArrayNode),
    Object(ObjectNode),
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Contents may be circular, so only their size is shown
        match self {
            JsValue::Primitive(value) => fmt::Debug::fmt(value, f),
            JsValue::Array(node) => match node.contents.try_borrow() {
                Ok(items) => write!(f, "Array({})", items.len()),
                Err(_) => f.write_str("Array(..)"),
            },
            JsValue::Object(node) => match node.contents.try_borrow() {
                Ok(entries) => write!(f, "Object({})", entries.len()),
                Err(_) => f.write_str("Object(..)"),
            },
        }
    }
}

impl From<bool> for JsValue {
    fn from(flag: bool) -> Self {
        JsValue::Primitive(Value::Bool(flag))
    }
}

impl JsValue {
    pub fn null() -> Self {
        JsValue::Primitive(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JsValue::Primitive(Value::Null))
    }

    pub fn is_compound(&self) -> bool {
        !matches!(self, JsValue::Primitive(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            JsValue::Primitive(value) => js_op::truthy(value),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Primitive(value) => js_op::type_of(value),
            _ => "object",
        }
    }

    /// `===`: arrays and objects are only equal to themselves.
    pub fn strict_eq(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Primitive(x), JsValue::Primitive(y)) => js_op::strict_eq(x, y),
            (JsValue::Array(x), JsValue::Array(y)) => Rc::ptr_eq(x, y),
            (JsValue::Object(x), JsValue::Object(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Copy out as JSON, returning the value and its approximate size in
    /// bytes.
    pub fn to_json(&self) -> Result<(Value, usize), Error> {
        let mut size = 0;
        let json = convert(self, 0, &mut size)?;
        Ok((json, size))
    }
}

fn too_large() -> Error {
    Error::InvalidArgument {
        value: Value::Null,
        operation: "convert to JSON".into(),
        reason: "Value is circular, too deeply nested or too large".into(),
    }
}

fn convert(value: &JsValue, depth: usize, size: &mut usize) -> Result<Value, Error> {
    if depth > MAX_JSON_DEPTH || *size > MAX_JSON_SIZE {
        return Err(too_large());
    }
    *size += NODE_SIZE;
    match value {
        JsValue::Primitive(primitive) => {
            if let Value::String(s) = primitive {
                *size += s.len();
            }
            Ok(primitive.clone())
        }
        JsValue::Array(node) => node
            .borrow()
            .iter()
            .map(|item| convert(item, depth + 1, size))
            .collect::<Result<Vec<Value>, Error>>()
            .map(Value::Array),
        JsValue::Object(node) => node
            .borrow()
            .iter()
            .map(|(key, item)| -> Result<(String, Value), Error> {
                *size += key.len();
                Ok((key.clone(), convert(item, depth + 1, size)?))
            })
            .collect::<Result<Map<String, Value>, Error>>()
            .map(Value::Object),
    }
}

/// Fail if a string of `len` bytes would be too long.
pub fn check_string_len(len: usize, operation: &str) -> Result<(), Error> {
    match len > MAX_STRING_LEN {
        true => Err(Error::InvalidArgument {
            value: Value::from(len as u64),
            operation: operation.into(),
            reason: format!("Strings are limited to {} bytes", MAX_STRING_LEN),
        }),
        false => Ok(()),
    }
}

/// Fail if an array of `len` items would be too long.
pub fn check_array_len(len: usize, operation: &str) -> Result<(), Error> {
    match len > MAX_ARRAY_LEN {
        true => Err(Error::InvalidArgument {
            value: Value::from(len as u64),
            operation: operation.into(),
            reason: format!("Arrays are limited to {} items", MAX_ARRAY_LEN),
        }),
        false => Ok(()),
    }
}

/// Every array and object created during one call.
///
/// Circular structures keep themselves alive, so dropping the heap
/// empties each container that is still reachable. The heap also counts
/// the slots it hands out, which the interpreter charges as work.
#[derive(Default)]
pub struct Heap {
    arrays: Vec<Weak<Node<Items>>>,
    objects: Vec<Weak<Node<Entries>>>,
    allocated: usize,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("arrays", &self.arrays.len())
            .field("objects", &self.objects.len())
            .field("allocated", &self.allocated)
            .finish()
    }
}

impl Heap {
    /// Slots handed out so far.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Record `slots` more array items or object entries.
    pub fn account(&mut self, slots: usize) {
        self.allocated = self.allocated.saturating_add(slots);
    }

    pub fn array(&mut self, items: Items) -> Result<JsValue, Error> {
        check_array_len(items.len(), "create array")?;
        self.account(items.len() + 1);
        let node = Rc::new(Node {
            contents: RefCell::new(items),
        });
        self.arrays.push(Rc::downgrade(&node));
        Ok(JsValue::Array(node))
    }

    pub fn object(&mut self, entries: Entries) -> JsValue {
        self.account(entries.len() + 1);
        let node = Rc::new(Node {
            contents: RefCell::new(entries),
        });
        self.objects.push(Rc::downgrade(&node));
        JsValue::Object(node)
    }

    /// Bring a JSON value into the heap.
    pub fn adopt(&mut self, value: Value) -> Result<JsValue, Error> {
        match value {
            Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| self.adopt(item))
                    .collect::<Result<Items, Error>>()?;
                self.array(items)
            }
            Value::Object(map) => {
                let entries = map
                    .into_iter()
                    .map(|(key, item)| -> Result<(String, JsValue), Error> {
                        Ok((key, self.adopt(item)?))
                    })
                    .collect::<Result<Entries, Error>>()?;
                Ok(self.object(entries))
            }
            primitive => Ok(JsValue::Primitive(primitive)),
        }
    }

    /// Empty every container still alive, breaking any cycles.
    pub fn release(&mut self) {
        // Holding a strong handle to each live node first means clearing
        // one never frees another mid-walk
        let arrays: Vec<ArrayNode> = self.arrays.drain(..).filter_map(|w| w.upgrade()).collect();
        let objects: Vec<ObjectNode> = self.objects.drain(..).filter_map(|w| w.upgrade()).collect();
        arrays.iter().for_each(|node| node.clear());
        objects.iter().for_each(|node| node.clear());
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.release()
    }
}

#[cfg(test)]
mod test_value {
    use super::*;
    use serde_json::json;

    fn items(value: &JsValue) -> Items {
        match value {
            JsValue::Array(node) => node.borrow().clone(),
            other => panic!("expected an array, got {:?}", other),
        }
    }

    #[test]
    fn test_adopt_then_convert() {
        let mut heap = Heap::default();
        let cases = vec![
            json!(null),
            json!("text"),
            json!([1, [2, {"a": [3]}]]),
            json!({"b": {"c": null}, "a": 1.5}),
        ];
        cases.into_iter().for_each(|value| {
            println!("{:?}", &value);
            let adopted = heap.adopt(value.clone()).unwrap();
            assert_eq!(adopted.to_json().unwrap().0, value);
        })
    }

    #[test]
    fn test_identity() {
        let mut heap = Heap::default();
        let first = heap.adopt(json!([1])).unwrap();
        let second = heap.adopt(json!([1])).unwrap();
        let alias = first.clone();
        assert!(first.strict_eq(&alias));
        assert!(!first.strict_eq(&second));
        assert!(JsValue::Primitive(json!(1)).strict_eq(&JsValue::Primitive(json!(1.0))));
        assert!(!JsValue::Primitive(json!(1)).strict_eq(&JsValue::Primitive(json!("1"))));
    }

    #[test]
    fn test_aliases_share_contents() {
        let mut heap = Heap::default();
        let array = heap.adopt(json!([])).unwrap();
        let alias = array.clone();
        if let JsValue::Array(node) = &alias {
            node.borrow_mut().push(JsValue::from(true));
        }
        assert_eq!(items(&array).len(), 1);
    }

    #[test]
    fn test_cycles_are_refused() {
        let mut heap = Heap::default();
        let array = heap.array(Vec::new()).unwrap();
        if let JsValue::Array(node) = &array {
            node.borrow_mut().push(array.clone());
        }
        assert!(matches!(array.to_json(), Err(Error::InvalidArgument { .. })));
        assert_eq!(format!("{:?}", array), "Array(1)");
    }

    #[test]
    fn test_release_empties_cycles() {
        let mut heap = Heap::default();
        let array = heap.array(Vec::new()).unwrap();
        let weak = match &array {
            JsValue::Array(node) => {
                node.borrow_mut().push(array.clone());
                Rc::downgrade(node)
            }
            _ => unreachable!(),
        };
        drop(array);
        assert!(weak.upgrade().is_some());
        heap.release();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_long_chains_drop() {
        let mut heap = Heap::default();
        let mut chain = heap.array(Vec::new()).unwrap();
        for _ in 0..200_000 {
            chain = heap.array(vec![chain]).unwrap();
        }
        drop(chain);
    }

    #[test]
    fn test_shared_values_are_sized_per_copy() {
        let mut heap = Heap::default();
        let text = JsValue::Primitive(Value::String("x".repeat(1 << 20)));
        let inner = heap.array(vec![text]).unwrap();
        let outer = heap.array(vec![inner; 100]).unwrap();
        assert!(matches!(outer.to_json(), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_length_checks() {
        assert!(check_string_len(MAX_STRING_LEN, "s").is_ok());
        assert!(check_string_len(MAX_STRING_LEN + 1, "s").is_err());
        assert!(check_array_len(MAX_ARRAY_LEN + 1, "a").is_err());
        let mut heap = Heap::default();
        assert!(heap.array(vec![JsValue::null(); MAX_ARRAY_LEN + 1]).is_err());
        heap.object(Entries::new());
        assert_eq!(heap.allocated(), 1);
    }
}
