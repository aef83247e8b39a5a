use super::{NodeId, NodeKind, Validation};
use crate::validator::Item;

impl<T: Item> Validation<T> {
    /// Names of the enabled validators that may still run after `from`.
    ///
    /// Covers the rest of `from`'s sequence, then for every enclosing
    /// container the sibling branches and whatever follows the container.
    pub fn future_validators(&self, from: NodeId) -> Vec<&str> {
        let mut names = Vec::new();
        if self.get(from).is_none() {
            return names;
        }

        let mut current = from;
        loop {
            if let Some(next) = self.nodes[current.0].next {
                self.collect_enabled(next, &mut names);
            }
            let Some(container) = self.nodes[current.0].container else {
                break;
            };
            let own_branch = self.sequence_head(current);
            for head in self.nodes[container.0].branches() {
                if *head != own_branch {
                    self.collect_enabled(*head, &mut names);
                }
            }
            current = container;
        }
        names
    }

    fn sequence_head(&self, mut id: NodeId) -> NodeId {
        while let Some(prev) = self.nodes[id.0].prev {
            id = prev;
        }
        id
    }

    /// Every enabled leaf reachable from `start`, following `next` links and
    /// descending into branches.
    fn collect_enabled<'a>(&'a self, start: NodeId, names: &mut Vec<&'a str>) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if let Some(next) = node.next {
                stack.push(next);
            }
            match &node.kind {
                NodeKind::Leaf(_) if node.enabled => names.push(node.name.as_str()),
                NodeKind::Leaf(_) => {}
                NodeKind::Parallel(branches) => stack.extend(branches.iter().rev()),
            }
        }
    }
}
