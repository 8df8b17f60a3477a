//! The scoped data tree.
//!
//! [`Node::build`] wraps a merged [`Mapping`] into a tree: every mapping-valued
//! entry becomes a child node that knows its dotted qualified name and its
//! root. Computed fields are evaluated on access, with their defining node's
//! siblings, the tree root and the evaluation [`Context`] in scope.
//!
//! All nodes of one tree share a single arena, so a [`Node`] is a cheap
//! handle: an `Rc` to the arena plus an index.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::context::Context;
use crate::diagnostics::{DiagnosticSink, Logger};
use crate::error::{Error, Result};
use crate::fragment;
use crate::value::{Arguments, Mapping, Value};

/// Name of the root accessor.
pub(crate) const ROOT: &str = "root";

/// Keys that may not appear in any mapping that becomes a node.
pub const RESERVED_KEYS: [&str; 2] = [ROOT, "self"];

const ROOT_INDEX: usize = 0;

struct TreeData {
    nodes: Vec<NodeData>,
    context: Option<Context>,
    sink: Rc<dyn DiagnosticSink>,
}

struct NodeData {
    qualified_name: String,
    entries: BTreeMap<String, Slot>,
}

enum Slot {
    Value(Value),
    Child(usize),
}

/// A node of the scoped data tree.
///
/// # Examples
///
/// ```
/// use strata::{mapping, Node, Value};
///
/// let root = Node::new(mapping! {
///     "hello" => "World",
///     "nest1" => mapping! { "address" => mapping! { "zip" => "49401" } },
/// })
/// .unwrap();
///
/// let nest1 = root.get("nest1").unwrap();
/// let address = nest1.as_node().unwrap().get("address").unwrap();
/// assert_eq!(address.as_node().unwrap().qualified_name(), "nest1.address.");
/// assert_eq!(root.lookup("nest1.address.zip").unwrap(), Value::from("49401"));
/// ```
#[derive(Clone)]
pub struct Node {
    tree: Rc<TreeData>,
    index: usize,
}

/// A non-owning handle to a [`Node`], held by closures created inside
/// computed fields.
#[derive(Clone, Default)]
pub(crate) struct WeakNode {
    tree: Weak<TreeData>,
    index: usize,
}

impl WeakNode {
    pub(crate) fn upgrade(&self) -> Option<Node> {
        self.tree.upgrade().map(|tree| Node {
            tree,
            index: self.index,
        })
    }
}

fn node_label(qualified_name: &str) -> &str {
    if qualified_name.is_empty() {
        ROOT
    } else {
        qualified_name.trim_end_matches('.')
    }
}

fn reject_reserved(map: &Mapping, location: &str) -> Result<()> {
    match RESERVED_KEYS.iter().find(|key| map.contains_key(**key)) {
        Some(key) => Err(Error::InvalidKey {
            key: (*key).to_string(),
            location: location.to_string(),
        }),
        None => Ok(()),
    }
}

/// Rejects reserved keys anywhere in `map`'s nested mappings.
///
/// Mappings inside lists never become nodes and are not checked.
pub(crate) fn check_reserved_keys(map: &Mapping, location: &str) -> Result<()> {
    reject_reserved(map, location)?;
    for value in map.values() {
        if let Value::Mapping(nested) = value {
            check_reserved_keys(nested, location)?;
        }
    }
    Ok(())
}

fn build_nodes(
    mapping: Mapping,
    qualified_name: String,
    nodes: &mut Vec<NodeData>,
) -> Result<usize> {
    reject_reserved(&mapping, node_label(&qualified_name))?;
    let index = nodes.len();
    nodes.push(NodeData {
        qualified_name: qualified_name.clone(),
        entries: BTreeMap::new(),
    });
    let mut entries = BTreeMap::new();
    for (key, value) in mapping {
        let slot = match value {
            Value::Mapping(child) => {
                let child_name = format!("{qualified_name}{key}.");
                Slot::Child(build_nodes(child, child_name, nodes)?)
            }
            other => Slot::Value(other),
        };
        entries.insert(key, slot);
    }
    nodes[index].entries = entries;
    Ok(index)
}

impl Node {
    /// Builds a tree with no evaluation context, reporting warnings to a
    /// default [`Logger`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if any mapping uses a reserved key.
    pub fn new(mapping: Mapping) -> Result<Self> {
        Self::build(mapping, None, Rc::new(Logger::default()))
    }

    /// Builds a tree whose computed fields see `context` and report
    /// warnings to `sink`. Returns the root node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] naming the key and the node if any
    /// mapping uses a reserved key.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::rc::Rc;
    /// use strata::{mapping, CollectingSink, Context, Error, Node};
    ///
    /// let err = Node::build(
    ///     mapping! { "a" => mapping! { "root" => 1 } },
    ///     Some(Context::new()),
    ///     Rc::new(CollectingSink::new()),
    /// )
    /// .unwrap_err();
    /// assert!(matches!(
    ///     err,
    ///     Error::InvalidKey { ref key, ref location } if key == "root" && location == "a"
    /// ));
    /// ```
    pub fn build(
        mapping: Mapping,
        context: Option<Context>,
        sink: Rc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        let mut nodes = Vec::new();
        build_nodes(mapping, String::new(), &mut nodes)?;
        Ok(Self {
            tree: Rc::new(TreeData { nodes, context, sink }),
            index: ROOT_INDEX,
        })
    }

    fn data(&self) -> &NodeData {
        &self.tree.nodes[self.index]
    }

    fn child(&self, index: usize) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
            index,
        }
    }

    fn field_name(&self, name: &str) -> String {
        format!("{}{name}", self.data().qualified_name)
    }

    fn slot(&self, name: &str) -> Result<&Slot> {
        self.data().entries.get(name).ok_or_else(|| Error::NoKey {
            name: self.field_name(name),
        })
    }

    /// Returns the value of field `name`.
    ///
    /// Computed fields are invoked with no arguments, child mappings come
    /// back as [`Value::Node`], everything else as stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoKey`] with the qualified name if the field does not
    /// exist, or any error raised while evaluating a computed field.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.call(name, &Arguments::new())
    }

    /// Invokes field `name` with `args`.
    ///
    /// A plain field called with arguments warns through the tree's
    /// diagnostic sink and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoKey`] for unknown fields and [`Error::Argument`]
    /// when `args` do not fit the computed field's parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use strata::{load_fragment_source, Arguments, Context, Node, Value};
    ///
    /// let context = Context::new();
    /// let data = load_fragment_source(
    ///     "{ base: 10, add: fn(a, b = 7, scale: 1) => (a + b + base) * scale }",
    ///     Path::new("strata_data.strata"),
    ///     &context,
    /// )
    /// .unwrap();
    /// let sink = std::rc::Rc::new(strata::Logger::default());
    /// let root = Node::build(data, Some(context), sink).unwrap();
    ///
    /// let args = Arguments::new().arg(1).named("scale", 2);
    /// assert_eq!(root.call("add", &args).unwrap(), Value::from(36));
    /// ```
    pub fn call(&self, name: &str, args: &Arguments) -> Result<Value> {
        match self.slot(name)? {
            Slot::Value(Value::Function(function)) => {
                let label = self.field_name(name);
                fragment::invoke(function, Some(self), &label, args, &self.tree.sink)
            }
            slot => {
                if !args.is_empty() {
                    self.tree.sink.warn(&format!(
                        "`{}` is not a function and ignores arguments",
                        self.field_name(name)
                    ));
                }
                Ok(match slot {
                    Slot::Child(index) => Value::Node(self.child(*index)),
                    Slot::Value(value) => value.clone(),
                })
            }
        }
    }

    /// Follows a dotted chain of field names, evaluating computed fields on
    /// the way. An empty path returns this node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoKey`] qualified by the node being queried when a
    /// segment is missing.
    pub fn lookup(&self, path: &str) -> Result<Value> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let mut current = Value::Node(self.clone());
        for (depth, segment) in segments.iter().enumerate() {
            current = match &current {
                Value::Node(node) => node.get(segment)?,
                Value::Mapping(map) => map
                    .get(*segment)
                    .cloned()
                    .ok_or_else(|| self.missing_segment(&segments[..=depth]))?,
                _ => return Err(self.missing_segment(&segments[..=depth])),
            };
        }
        Ok(current)
    }

    /// Evaluates a fragment-language expression with this node as the
    /// defining node, as a renderer would for an embedded placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] for malformed source and any access or
    /// evaluation error the expression raises.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::{mapping, Node, Value};
    ///
    /// let root = Node::new(mapping! { "course" => mapping! { "number" => 162 } }).unwrap();
    /// let value = root.evaluate(r#""CIS ${course.number}""#).unwrap();
    /// assert_eq!(value, Value::from("CIS 162"));
    /// ```
    pub fn evaluate(&self, source: &str) -> Result<Value> {
        fragment::evaluate_in(self, source, Rc::clone(&self.tree.sink))
    }

    /// The root of this node's tree. The root's root is itself.
    #[must_use]
    pub fn root(&self) -> Self {
        self.child(ROOT_INDEX)
    }

    /// True for the root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.index == ROOT_INDEX
    }

    /// Dotted prefix from the root: `""` at the root, `"a.b."` below.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.data().qualified_name
    }

    /// True if the node has a field called `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.data().entries.contains_key(name)
    }

    /// True if field `name` exists and is computed.
    #[must_use]
    pub fn is_computed(&self, name: &str) -> bool {
        matches!(self.data().entries.get(name), Some(Slot::Value(Value::Function(_))))
    }

    /// Field names in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.data().entries.keys().map(String::as_str).collect()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().entries.len()
    }

    /// True if the node has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data().entries.is_empty()
    }

    /// True if both handles refer to the same node of the same tree.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.index == other.index
    }

    /// The evaluation context the tree was built with.
    #[must_use]
    pub fn context(&self) -> Option<&Context> {
        self.tree.context.as_ref()
    }

    // NoKey for a `lookup` segment below a raw value rather than a node;
    // `walked` ends with the missing segment.
    fn missing_segment(&self, walked: &[&str]) -> Error {
        Error::NoKey {
            name: format!("{}{}", self.qualified_name(), walked.join(".")),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        WeakNode {
            tree: Rc::downgrade(&self.tree),
            index: self.index,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}) ", node_label(self.qualified_name()))?;
        let mut map = f.debug_map();
        for (key, slot) in &self.data().entries {
            match slot {
                Slot::Value(value) => map.entry(key, value),
                Slot::Child(index) => map.entry(key, &self.child(*index)),
            };
        }
        map.finish()
    }
}

/// Serializes stored entries; computed fields are not evaluated and appear
/// as `"<function>"`.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = &self.data().entries;
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, slot) in entries {
            match slot {
                Slot::Value(value) => map.serialize_entry(key, value)?,
                Slot::Child(index) => map.serialize_entry(key, &self.child(*index))?,
            }
        }
        map.end()
    }
}
