//! Contract with the presentation layer.
//!
//! The engine hands the sink one ordered delta batch per refresh pass plus
//! the recomputed stack view and status-line strings. Sink calls happen on
//! engine tasks in emission order; a GUI host is expected to marshal them
//! onto its UI thread (typically by implementing the sink over a channel).

use std::sync::Arc;

use crate::entity::{ContainerEntity, ImageEntity, NetworkEntity, VolumeEntity};
use crate::stacks::StackView;

/// One incremental change to an identity-keyed collection.
pub enum Delta<E> {
    Added(Arc<E>),
    Updated(Arc<E>),
    Removed(String),
}

// Hand-written so the entity type needs no Clone bound; the variants only
// ever hold shared pointers.
impl<E> Clone for Delta<E> {
    fn clone(&self) -> Self {
        match self {
            Delta::Added(entity) => Delta::Added(Arc::clone(entity)),
            Delta::Updated(entity) => Delta::Updated(Arc::clone(entity)),
            Delta::Removed(id) => Delta::Removed(id.clone()),
        }
    }
}

impl<E: crate::entity::ViewEntity> Delta<E> {
    pub fn id(&self) -> &str {
        match self {
            Delta::Added(entity) | Delta::Updated(entity) => entity.id(),
            Delta::Removed(id) => id,
        }
    }
}

impl<E: crate::entity::ViewEntity> std::fmt::Debug for Delta<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Delta::Added(_) => "Added",
            Delta::Updated(_) => "Updated",
            Delta::Removed(_) => "Removed",
        };
        write!(f, "{tag}({})", self.id())
    }
}

pub trait PresentationSink: Send + Sync + 'static {
    fn containers_changed(&self, deltas: Vec<Delta<ContainerEntity>>);
    fn images_changed(&self, deltas: Vec<Delta<ImageEntity>>);
    fn volumes_changed(&self, deltas: Vec<Delta<VolumeEntity>>);
    fn networks_changed(&self, deltas: Vec<Delta<NetworkEntity>>);

    /// Full stack projection, recomputed after every container pass.
    fn stacks_changed(&self, view: StackView);

    /// Human-readable status line ("Stopped webapp-db-1", "Error: ...").
    fn status(&self, message: String);
}
