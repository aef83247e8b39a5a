use super::{NodeId, NodeKind, Validation};
use crate::validator::Item;

impl<T: Item> Validation<T> {
    /// Render the graph as text, one node per line between `START` and `END`.
    ///
    /// ```text
    /// START
    /// --> amount: orders.amount
    /// --> PARALLEL
    ///     |--- stock: orders.stock
    ///     |    --> reserve: orders.reserve
    ///     |--- pricing: orders.pricing [DISABLED]
    /// END
    /// ```
    pub fn roadmap(&self) -> String {
        let mut lines = vec!["START".to_string()];
        if let Some(root) = self.root {
            self.render_sequence(root, None, &mut lines);
        }
        lines.push("END".to_string());
        lines.join("\n")
    }

    /// `indent` is `None` for the top level.
    fn render_sequence(&self, head: NodeId, indent: Option<&str>, lines: &mut Vec<String>) {
        let mut current = Some(head);
        let mut first = true;
        while let Some(id) = current {
            let node = &self.nodes[id.0];
            let prefix = match indent {
                None => "--> ".to_string(),
                Some(indent) if first => format!("{indent}|--- "),
                Some(indent) => format!("{indent}|    --> "),
            };

            match &node.kind {
                NodeKind::Leaf(vref) => {
                    let disabled = if node.enabled { "" } else { " [DISABLED]" };
                    lines.push(format!("{prefix}{}: {}{disabled}", node.name, vref.id()));
                }
                NodeKind::Parallel(branches) => {
                    lines.push(format!("{prefix}PARALLEL"));
                    let child_indent: String = prefix
                        .chars()
                        .map(|c| if c == '|' { '|' } else { ' ' })
                        .collect();
                    for branch in branches {
                        self.render_sequence(*branch, Some(&child_indent), lines);
                    }
                }
            }

            first = false;
            current = node.next;
        }
    }
}
