use tracing::{debug, trace};

use crate::provider::ProviderError;
use crate::tree::{NodeId, Tree};

impl Tree {
    /// Aggregates the size of `target` bottom-up, without recursion.
    ///
    /// Discovery caches the children of every unfinished directory below
    /// `target` and collects leaves (and already complete nodes) as the
    /// frontier. Aggregation then folds each node's children into it exactly
    /// once and climbs to a parent as soon as all its children are final.
    ///
    /// A fault while listing leaves the partially aggregated subtree in an
    /// unspecified state.
    pub fn get_sizes(&mut self, target: NodeId) -> Result<(), ProviderError> {
        if self.node(target).is_complete() {
            trace!("Sizes of {} already final", target);
            return Ok(());
        }

        let mut frontier = Vec::new();
        let mut pending = vec![target];
        while let Some(id) = pending.pop() {
            if self.node(id).is_complete() {
                frontier.push(id);
                continue;
            }
            let children = self.cache_children(id)?;
            if children.is_empty() {
                frontier.push(id);
            } else {
                pending.extend_from_slice(children);
            }
        }
        debug!("Aggregating {} frontier nodes below {}", frontier.len(), target);

        while let Some(id) = frontier.pop() {
            if !self.node(id).is_complete() {
                let total: u64 = self
                    .children(id)
                    .unwrap_or_default()
                    .iter()
                    .map(|child| self.node(*child).size())
                    .sum();
                let node = self.node_mut(id);
                let own = node.item.size();
                node.item.set_size(own + total);
                node.complete = true;
            }

            if id == target {
                break;
            }
            let Some(parent) = self.parent(id) else {
                continue;
            };
            let parent_ready = !self.node(parent).is_complete()
                && self
                    .children(parent)
                    .unwrap_or_default()
                    .iter()
                    .all(|child| self.node(*child).is_complete());
            if parent_ready {
                frontier.push(parent);
            }
        }

        Ok(())
    }
}
