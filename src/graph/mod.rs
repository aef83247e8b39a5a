//! The editable validation graph
//!
//! A `Validation` is a sequence of nodes. A node either runs one validator
//! (a leaf) or is a parallel container whose branches are sequences of their
//! own. Nodes live in an arena and refer to each other by `NodeId`.
//!
//! Invariants kept by every edit:
//! - `prev`/`next` links are symmetric and `root`/`tail` are the ends of the
//!   top-level sequence
//! - every node of a branch points at its container, top-level nodes at none
//! - a container always holds at least two branches
//! - `index` maps exactly the names of the live leaves

mod future;
mod roadmap;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::validator::{Item, ValidatorCache, ValidatorRef, ValidatorUnit};

static CONTAINER_SEQ: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum NodeKind<T: Item> {
    Leaf(ValidatorRef<T>),
    /// Heads of the branches, in declaration order.
    Parallel(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub struct ValidatorNode<T: Item> {
    name: String,
    kind: NodeKind<T>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    container: Option<NodeId>,
    enabled: bool,
    live: bool,
}

impl<T: Item> ValidatorNode<T> {
    fn new(name: String, kind: NodeKind<T>) -> Self {
        Self {
            name,
            kind,
            prev: None,
            next: None,
            container: None,
            enabled: true,
            live: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind<T> {
        &self.kind
    }

    pub fn validator(&self) -> Option<&ValidatorRef<T>> {
        match &self.kind {
            NodeKind::Leaf(vref) => Some(vref),
            NodeKind::Parallel(_) => None,
        }
    }

    pub fn branches(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Leaf(_) => &[],
            NodeKind::Parallel(branches) => branches,
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.kind, NodeKind::Parallel(_))
    }

    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    pub fn container(&self) -> Option<NodeId> {
        self.container
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A detached chain of nodes already moved into the arena.
#[derive(Debug, Clone, Copy)]
struct Segment {
    head: NodeId,
    last: NodeId,
}

#[derive(Debug, Clone, Copy)]
enum Position {
    First,
    Last,
    Before(NodeId),
    After(NodeId),
}

#[derive(Debug, Clone, Copy)]
enum Anchor<'a> {
    First,
    Last,
    Before(&'a str),
    After(&'a str),
}

#[derive(Clone)]
pub struct Validation<T: Item> {
    nodes: Vec<ValidatorNode<T>>,
    root: Option<NodeId>,
    tail: Option<NodeId>,
    index: HashMap<String, NodeId>,
}

impl<T: Item> Validation<T> {
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            tail: None,
            index: HashMap::new(),
        }
    }

    /// A single-node validation running `V`, named after its id.
    pub fn of<V: ValidatorUnit<T>>() -> Self {
        Self::create_with(V::ID, ValidatorRef::of::<V>())
    }

    pub fn create<V: ValidatorUnit<T>>(name: impl Into<String>) -> Self {
        Self::create_with(name, ValidatorRef::of::<V>())
    }

    pub fn create_with(name: impl Into<String>, validator: ValidatorRef<T>) -> Self {
        let name = name.into();
        let id = NodeId(0);
        Self {
            nodes: vec![ValidatorNode::new(name.clone(), NodeKind::Leaf(validator))],
            root: Some(id),
            tail: Some(id),
            index: HashMap::from([(name, id)]),
        }
    }

    pub fn create_parallel(graphs: Vec<Validation<T>>) -> Result<Self> {
        let mut validation = Self::empty();
        validation.append_parallel(graphs)?;
        Ok(validation)
    }

    /// Builder form of [`append_serial`](Self::append_serial).
    pub fn then_serial(mut self, other: Validation<T>) -> Result<Self> {
        self.append_serial(other)?;
        Ok(self)
    }

    /// Builder form of [`append_parallel`](Self::append_parallel).
    pub fn then_parallel(mut self, graphs: Vec<Validation<T>>) -> Result<Self> {
        self.append_parallel(graphs)?;
        Ok(self)
    }

    pub fn append_serial(&mut self, other: Validation<T>) -> Result<&mut Self> {
        self.insert_serial(other, Anchor::Last)
    }

    /// Append the graphs as branches of one parallel container. A single graph
    /// is appended serially.
    pub fn append_parallel(&mut self, graphs: Vec<Validation<T>>) -> Result<&mut Self> {
        self.insert_parallel(graphs, Anchor::Last)
    }

    pub fn insert_serial_first(&mut self, other: Validation<T>) -> Result<&mut Self> {
        self.insert_serial(other, Anchor::First)
    }

    pub fn insert_serial_last(&mut self, other: Validation<T>) -> Result<&mut Self> {
        self.insert_serial(other, Anchor::Last)
    }

    pub fn insert_serial_before(&mut self, name: &str, other: Validation<T>) -> Result<&mut Self> {
        self.insert_serial(other, Anchor::Before(name))
    }

    pub fn insert_serial_after(&mut self, name: &str, other: Validation<T>) -> Result<&mut Self> {
        self.insert_serial(other, Anchor::After(name))
    }

    pub fn insert_parallel_first(&mut self, graphs: Vec<Validation<T>>) -> Result<&mut Self> {
        self.insert_parallel(graphs, Anchor::First)
    }

    pub fn insert_parallel_last(&mut self, graphs: Vec<Validation<T>>) -> Result<&mut Self> {
        self.insert_parallel(graphs, Anchor::Last)
    }

    pub fn insert_parallel_before(
        &mut self,
        name: &str,
        graphs: Vec<Validation<T>>,
    ) -> Result<&mut Self> {
        self.insert_parallel(graphs, Anchor::Before(name))
    }

    pub fn insert_parallel_after(
        &mut self,
        name: &str,
        graphs: Vec<Validation<T>>,
    ) -> Result<&mut Self> {
        self.insert_parallel(graphs, Anchor::After(name))
    }

    /// Remove a validator. A container left with one branch is replaced by
    /// that branch; an emptied container is removed as well.
    pub fn remove(&mut self, name: &str) -> Result<&mut Self> {
        let id = self.lookup(name)?;
        if let NodeKind::Leaf(vref) = &self.nodes[id.0].kind {
            ValidatorCache::global().evict(vref.id());
        }
        self.index.remove(name);
        self.unlink(id);
        debug!("Removed validator '{name}'");
        Ok(self)
    }

    /// Keep the node in place but skip it at run time. Evicts the cached
    /// instance so re-enabling starts fresh.
    pub fn disable(&mut self, name: &str) -> Result<&mut Self> {
        let id = self.lookup(name)?;
        let node = &mut self.nodes[id.0];
        node.enabled = false;
        if let NodeKind::Leaf(vref) = &node.kind {
            ValidatorCache::global().evict(vref.id());
        }
        debug!("Disabled validator '{name}'");
        Ok(self)
    }

    pub fn enable(&mut self, name: &str) -> Result<&mut Self> {
        let id = self.lookup(name)?;
        self.nodes[id.0].enabled = true;
        debug!("Enabled validator '{name}'");
        Ok(self)
    }

    pub fn update_validator<V: ValidatorUnit<T>>(&mut self, name: &str) -> Result<&mut Self> {
        self.update_validator_with(name, ValidatorRef::of::<V>())
    }

    /// Point a leaf at a different validator. Both the old and the new
    /// validator's cached instances are evicted.
    pub fn update_validator_with(
        &mut self,
        name: &str,
        validator: ValidatorRef<T>,
    ) -> Result<&mut Self> {
        let id = self.lookup(name)?;
        if let NodeKind::Leaf(current) = &mut self.nodes[id.0].kind {
            ValidatorCache::global().evict(current.id());
            ValidatorCache::global().evict(validator.id());
            debug!("Validator '{name}' now runs {}", validator.id());
            *current = validator;
        }
        Ok(self)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn tail(&self) -> Option<NodeId> {
        self.tail
    }

    pub fn get(&self, id: NodeId) -> Option<&ValidatorNode<T>> {
        self.nodes.get(id.0).filter(|node| node.live)
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn node(&self, name: &str) -> Option<&ValidatorNode<T>> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        let id = self.lookup(name)?;
        Ok(self.nodes[id.0].enabled)
    }

    /// Number of validator nodes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn has_parallel(&self) -> bool {
        self.nodes.iter().any(|node| node.live && node.is_parallel())
    }

    /// Validator names in execution order, branches in declaration order.
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.index.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if let Some(next) = node.next {
                stack.push(next);
            }
            match &node.kind {
                NodeKind::Leaf(_) => names.push(node.name.as_str()),
                NodeKind::Parallel(branches) => stack.extend(branches.iter().rev()),
            }
        }
        names
    }

    fn lookup(&self, name: &str) -> Result<NodeId> {
        self.id_of(name)
            .ok_or_else(|| ValidationError::NoSuchValidator {
                name: name.to_string(),
            })
    }

    fn resolve(&self, anchor: Anchor<'_>) -> Result<Position> {
        Ok(match anchor {
            Anchor::First => Position::First,
            Anchor::Last => Position::Last,
            Anchor::Before(name) => Position::Before(self.lookup(name)?),
            Anchor::After(name) => Position::After(self.lookup(name)?),
        })
    }

    fn insert_serial(&mut self, other: Validation<T>, anchor: Anchor<'_>) -> Result<&mut Self> {
        let position = self.resolve(anchor)?;
        self.check_disjoint(std::slice::from_ref(&other))?;
        if let Some(segment) = self.absorb(other) {
            self.splice(segment, position);
        }
        debug!("Inserted serial validation at {anchor:?}");
        Ok(self)
    }

    fn insert_parallel(&mut self, graphs: Vec<Validation<T>>, anchor: Anchor<'_>) -> Result<&mut Self> {
        if graphs.is_empty() {
            return Err(ValidationError::EmptyParallelGroup);
        }
        let position = self.resolve(anchor)?;
        let graphs: Vec<_> = graphs.into_iter().filter(|g| !g.is_empty()).collect();
        self.check_disjoint(&graphs)?;

        let segment = if graphs.len() > 1 {
            Some(self.build_container(graphs))
        } else {
            graphs.into_iter().next().and_then(|graph| self.absorb(graph))
        };
        if let Some(segment) = segment {
            self.splice(segment, position);
        }
        debug!("Inserted parallel validation at {anchor:?}");
        Ok(self)
    }

    /// Fails when any name occurs twice across `self` and `others`.
    fn check_disjoint(&self, others: &[Validation<T>]) -> Result<()> {
        let mut seen: HashSet<&str> = self.index.keys().map(String::as_str).collect();
        for other in others {
            for name in other.index.keys() {
                if !seen.insert(name) {
                    return Err(ValidationError::DuplicateValidator { name: name.clone() });
                }
            }
        }
        Ok(())
    }

    /// Move the live nodes of `other` into this arena. Returns its top-level
    /// sequence, still detached.
    fn absorb(&mut self, other: Validation<T>) -> Option<Segment> {
        let base = self.nodes.len();
        let mut mapping = vec![None; other.nodes.len()];
        let mut assigned = base;
        for (old, node) in other.nodes.iter().enumerate() {
            if node.live {
                mapping[old] = Some(NodeId(assigned));
                assigned += 1;
            }
        }
        let remap = |id: NodeId| mapping[id.0].unwrap_or(id);

        for mut node in other.nodes.into_iter().filter(|node| node.live) {
            node.prev = node.prev.map(remap);
            node.next = node.next.map(remap);
            node.container = node.container.map(remap);
            if let NodeKind::Parallel(branches) = &mut node.kind {
                for head in branches.iter_mut() {
                    *head = remap(*head);
                }
            }
            let id = NodeId(self.nodes.len());
            if let NodeKind::Leaf(_) = node.kind {
                self.index.insert(node.name.clone(), id);
            }
            self.nodes.push(node);
        }

        match (other.root, other.tail) {
            (Some(head), Some(last)) => Some(Segment {
                head: remap(head),
                last: remap(last),
            }),
            _ => None,
        }
    }

    fn build_container(&mut self, graphs: Vec<Validation<T>>) -> Segment {
        let container = NodeId(self.nodes.len());
        let name = format!("parallel-{}", CONTAINER_SEQ.fetch_add(1, Ordering::Relaxed));
        self.nodes
            .push(ValidatorNode::new(name, NodeKind::Parallel(Vec::new())));

        let mut heads = Vec::with_capacity(graphs.len());
        for graph in graphs {
            if let Some(segment) = self.absorb(graph) {
                self.set_container(segment, Some(container));
                heads.push(segment.head);
            }
        }
        self.nodes[container.0].kind = NodeKind::Parallel(heads);
        Segment {
            head: container,
            last: container,
        }
    }

    fn set_container(&mut self, segment: Segment, container: Option<NodeId>) {
        let mut current = Some(segment.head);
        while let Some(id) = current {
            self.nodes[id.0].container = container;
            if id == segment.last {
                break;
            }
            current = self.nodes[id.0].next;
        }
    }

    fn splice(&mut self, segment: Segment, position: Position) {
        match position {
            Position::First => match self.root {
                Some(root) => self.link_before(root, segment),
                None => self.adopt(segment),
            },
            Position::Last => match self.tail {
                Some(tail) => self.link_after(tail, segment),
                None => self.adopt(segment),
            },
            Position::Before(anchor) => self.link_before(anchor, segment),
            Position::After(anchor) => self.link_after(anchor, segment),
        }
    }

    fn adopt(&mut self, segment: Segment) {
        self.set_container(segment, None);
        self.root = Some(segment.head);
        self.tail = Some(segment.last);
    }

    fn link_before(&mut self, anchor: NodeId, segment: Segment) {
        let prev = self.nodes[anchor.0].prev;
        let container = self.nodes[anchor.0].container;
        self.set_container(segment, container);

        self.nodes[segment.last.0].next = Some(anchor);
        self.nodes[anchor.0].prev = Some(segment.last);
        self.nodes[segment.head.0].prev = prev;
        match prev {
            Some(prev) => self.nodes[prev.0].next = Some(segment.head),
            None => self.replace_head(anchor, Some(segment.head), container),
        }
    }

    fn link_after(&mut self, anchor: NodeId, segment: Segment) {
        let next = self.nodes[anchor.0].next;
        let container = self.nodes[anchor.0].container;
        self.set_container(segment, container);

        self.nodes[segment.head.0].prev = Some(anchor);
        self.nodes[anchor.0].next = Some(segment.head);
        self.nodes[segment.last.0].next = next;
        match next {
            Some(next) => self.nodes[next.0].prev = Some(segment.last),
            None if container.is_none() => self.tail = Some(segment.last),
            None => {}
        }
    }

    /// `old` headed a sequence; make `new` the head, or drop the branch when
    /// there is nothing left of it.
    fn replace_head(&mut self, old: NodeId, new: Option<NodeId>, container: Option<NodeId>) {
        let Some(container) = container else {
            self.root = new;
            return;
        };
        if let NodeKind::Parallel(branches) = &mut self.nodes[container.0].kind {
            match new {
                Some(new) => {
                    if let Some(slot) = branches.iter_mut().find(|head| **head == old) {
                        *slot = new;
                    }
                }
                None => branches.retain(|head| *head != old),
            }
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let ValidatorNode {
            prev,
            next,
            container,
            ..
        } = self.nodes[id.0];
        match prev {
            Some(prev) => self.nodes[prev.0].next = next,
            None => self.replace_head(id, next, container),
        }
        match next {
            Some(next) => self.nodes[next.0].prev = prev,
            None if container.is_none() => self.tail = prev,
            None => {}
        }
        self.retire(id);

        if let Some(container) = container {
            self.settle(container);
        }
    }

    fn settle(&mut self, container: NodeId) {
        let branches = self.nodes[container.0].branches().to_vec();
        match branches.as_slice() {
            [] => self.unlink(container),
            [only] => self.collapse(container, *only),
            _ => {}
        }
    }

    /// Replace a single-branch container with the branch itself.
    fn collapse(&mut self, container: NodeId, head: NodeId) {
        let ValidatorNode {
            prev,
            next,
            container: outer,
            ..
        } = self.nodes[container.0];

        let mut last = head;
        let mut current = Some(head);
        while let Some(id) = current {
            self.nodes[id.0].container = outer;
            last = id;
            current = self.nodes[id.0].next;
        }

        self.nodes[head.0].prev = prev;
        self.nodes[last.0].next = next;
        match prev {
            Some(prev) => self.nodes[prev.0].next = Some(head),
            None => self.replace_head(container, Some(head), outer),
        }
        match next {
            Some(next) => self.nodes[next.0].prev = Some(last),
            None if outer.is_none() => self.tail = Some(last),
            None => {}
        }
        self.retire(container);
        debug!("Collapsed parallel container into a serial link");
    }

    fn retire(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        node.live = false;
        node.prev = None;
        node.next = None;
        node.container = None;
        if let NodeKind::Parallel(branches) = &mut node.kind {
            branches.clear();
        }
    }
}

impl<T: Item> Default for Validation<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Item> fmt::Display for Validation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.roadmap())
    }
}

impl<T: Item> fmt::Debug for Validation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("validators", &self.names())
            .field("has_parallel", &self.has_parallel())
            .finish()
    }
}

#[cfg(test)]
mod tests;
