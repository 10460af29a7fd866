//! Refresh notifications for the view layer.

use std::collections::BTreeSet;

use tidy_file_index::NodeId;
use tokio::sync::mpsc;
use tracing::debug;

/// What part of the file index needs redrawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexChange {
    /// Redraw everything.
    FullRefresh,

    /// Redraw the subtree under this node.
    PartialRefresh(NodeId),
}

impl IndexChange {
    /// The change to report for a mutation's affected node.
    ///
    /// No affected node means nothing to report; the root means everything.
    pub fn from_affected(affected: Option<NodeId>, root: NodeId) -> Option<Self> {
        match affected? {
            node if node == root => Some(Self::FullRefresh),
            node => Some(Self::PartialRefresh(node)),
        }
    }
}

/// Sending half of the single-consumer change channel.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::UnboundedSender<IndexChange>,
    root: NodeId,
}

impl ChangeNotifier {
    pub fn channel(root: NodeId) -> (Self, mpsc::UnboundedReceiver<IndexChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, root }, rx)
    }

    pub fn notify(&self, change: IndexChange) {
        if self.tx.send(change).is_err() {
            debug!("No listener for {change:?}");
        }
    }

    /// Report the node a single mutation affected.
    pub fn affected(&self, affected: Option<NodeId>) {
        if let Some(change) = IndexChange::from_affected(affected, self.root) {
            self.notify(change);
        }
    }

    /// Report the nodes a batch of mutations affected.
    pub fn affected_all(&self, affected: BTreeSet<NodeId>) {
        match affected.len() {
            0 => {}
            1 => self.affected(affected.into_iter().next()),
            _ => self.notify(IndexChange::FullRefresh),
        }
    }
}
