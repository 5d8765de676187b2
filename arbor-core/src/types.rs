/// Identifier for a node in a [`crate::skeleton::Skeleton`].
///
/// This is an index into the skeleton's node pool. Handles are stable for
/// the lifetime of the node and recycled through a free list after
/// [`crate::skeleton::Skeleton::recycle_node`]; holding a handle across a
/// recycle is caller misuse and trips an assertion on the next access.
pub type NodeHandle = usize;

/// Identifier for a flow (an unbranched chain of nodes) in a skeleton.
pub type FlowHandle = usize;

/// Identifier for a pipe (one vascular strand) in a [`crate::pipes::PipeGroup`].
pub type PipeHandle = usize;

/// Identifier for one segment of a pipe, one per skeleton node it passes.
pub type PipeSegmentHandle = usize;

/// Identifier for a cross-section profile in a [`crate::pipes::ProfileGroup`].
pub type ProfileHandle = usize;

/// Identifier for a cell within one profile.
pub type CellHandle = usize;

/// Identifier for a particle in a [`crate::physics_2d::ParticlePhysics2D`].
pub type ParticleHandle = usize;
