//! Depth-first flattened view over a gene subtree.

use crate::node::{GeneNode, NodeId};
use crate::tree::GeneTree;

/// Lazy pre-order iterator yielding `(NodeId, &GeneNode)`.
///
/// Collection templates are never visited. The view is `Clone`, so a caller
/// can restart iteration from any point.
#[derive(Clone)]
pub struct FlatView<'a, F> {
    tree: &'a GeneTree,
    stack: Vec<NodeId>,
    exclude: F,
}

impl<'a, F> FlatView<'a, F>
where
    F: Fn(&GeneNode) -> bool,
{
    pub(crate) fn new(tree: &'a GeneTree, start: NodeId, exclude: F) -> Self {
        Self {
            tree,
            stack: vec![start],
            exclude,
        }
    }
}

impl<'a, F> Iterator for FlatView<'a, F>
where
    F: Fn(&GeneNode) -> bool,
{
    type Item = (NodeId, &'a GeneNode);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            let Ok(node) = self.tree.node(id) else {
                continue;
            };
            if !(self.exclude)(node) {
                self.stack
                    .extend(node.kind.value_children().into_iter().rev());
            }
            return Some((id, node));
        }
    }
}
