//! Vascular strand bookkeeping: pipes made of per-node segments, and the
//! per-node cross-section profiles whose cells bind segments to packing
//! particles.

use glam::Vec2;

use crate::physics_2d::ParticlePhysics2D;
use crate::types::{
    CellHandle, FlowHandle, NodeHandle, ParticleHandle, PipeHandle, PipeSegmentHandle,
    ProfileHandle,
};

/// One stop of a pipe inside one skeleton node.
#[derive(Debug, Clone)]
pub struct PipeSegment {
    handle: PipeSegmentHandle,
    pipe: PipeHandle,
    pub prev: Option<PipeSegmentHandle>,
    pub next: Option<PipeSegmentHandle>,
    /// Skeleton node this segment lies in.
    pub node: NodeHandle,
    pub flow: FlowHandle,
    /// Cell representing this segment in the node's profile.
    pub cell: CellHandle,
}

impl PipeSegment {
    pub fn handle(&self) -> PipeSegmentHandle {
        self.handle
    }

    pub fn pipe(&self) -> PipeHandle {
        self.pipe
    }
}

/// One continuous vascular strand, root to tip.
#[derive(Debug, Clone, Default)]
pub struct Pipe {
    segments: Vec<PipeSegmentHandle>,
}

impl Pipe {
    /// Segment handles ordered from the root end to the tip.
    pub fn segments(&self) -> &[PipeSegmentHandle] {
        &self.segments
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipeGroup {
    pipes: Vec<Pipe>,
    segments: Vec<PipeSegment>,
}

impl PipeGroup {
    pub fn allocate_pipe(&mut self) -> PipeHandle {
        let handle = self.pipes.len();
        self.pipes.push(Pipe::default());
        handle
    }

    /// Appends one segment at the tip of `pipe` and links it to the chain.
    pub fn extend(&mut self, pipe: PipeHandle, node: NodeHandle, flow: FlowHandle) -> PipeSegmentHandle {
        let handle = self.segments.len();
        let prev = self.pipes[pipe].segments.last().copied();
        if let Some(prev) = prev {
            self.segments[prev].next = Some(handle);
        }
        self.segments.push(PipeSegment {
            handle,
            pipe,
            prev,
            next: None,
            node,
            flow,
            cell: 0,
        });
        self.pipes[pipe].segments.push(handle);
        handle
    }

    pub fn pipe(&self, handle: PipeHandle) -> &Pipe {
        &self.pipes[handle]
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    pub fn segment(&self, handle: PipeSegmentHandle) -> &PipeSegment {
        &self.segments[handle]
    }

    pub fn segment_mut(&mut self, handle: PipeSegmentHandle) -> &mut PipeSegment {
        &mut self.segments[handle]
    }
}

/// A pipe's footprint within one profile.
#[derive(Debug, Clone)]
pub struct Cell {
    handle: CellHandle,
    pub pipe: PipeHandle,
    /// `None` for cells of the synthetic base profile, which mark pipe
    /// origins rather than segments.
    pub segment: Option<PipeSegmentHandle>,
    pub particle: ParticleHandle,
    /// Final 2-D position within the cross-section, written back after
    /// packing.
    pub offset: Vec2,
}

impl Cell {
    pub fn handle(&self) -> CellHandle {
        self.handle
    }
}

/// The packing arena attached to one skeleton node: one cell per pipe
/// passing through, each bound to one physics particle.
#[derive(Debug, Clone)]
pub struct Profile {
    handle: ProfileHandle,
    pub cell_radius: f32,
    cells: Vec<Cell>,
    pub physics: ParticlePhysics2D<CellHandle>,
}

impl Profile {
    pub fn handle(&self) -> ProfileHandle {
        self.handle
    }

    pub fn allocate_cell(&mut self, pipe: PipeHandle, segment: Option<PipeSegmentHandle>) -> CellHandle {
        let handle = self.cells.len();
        self.cells.push(Cell {
            handle,
            pipe,
            segment,
            particle: 0,
            offset: Vec2::ZERO,
        });
        handle
    }

    pub fn cell(&self, handle: CellHandle) -> &Cell {
        &self.cells[handle]
    }

    pub fn cell_mut(&mut self, handle: CellHandle) -> &mut Cell {
        &mut self.cells[handle]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cell holding `pipe`, if the pipe passes through this profile.
    pub fn cell_of_pipe(&self, pipe: PipeHandle) -> Option<CellHandle> {
        self.cells.iter().find(|c| c.pipe == pipe).map(|c| c.handle)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileGroup {
    profiles: Vec<Profile>,
}

impl ProfileGroup {
    pub fn allocate(&mut self, cell_radius: f32) -> ProfileHandle {
        let handle = self.profiles.len();
        let mut physics = ParticlePhysics2D::default();
        physics.particle_radius = cell_radius;
        self.profiles.push(Profile {
            handle,
            cell_radius,
            cells: Vec::new(),
            physics,
        });
        handle
    }

    pub fn profile(&self, handle: ProfileHandle) -> &Profile {
        &self.profiles[handle]
    }

    pub fn profile_mut(&mut self, handle: ProfileHandle) -> &mut Profile {
        &mut self.profiles[handle]
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profiles_mut(&mut self) -> &mut [Profile] {
        &mut self.profiles
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_links_segments_into_a_chain() {
        let mut group = PipeGroup::default();
        let pipe = group.allocate_pipe();
        let a = group.extend(pipe, 0, 0);
        let b = group.extend(pipe, 1, 0);
        let c = group.extend(pipe, 2, 0);

        assert_eq!(group.pipe(pipe).segments(), &[a, b, c]);
        assert_eq!(group.segment(a).prev, None);
        assert_eq!(group.segment(a).next, Some(b));
        assert_eq!(group.segment(b).prev, Some(a));
        assert_eq!(group.segment(b).next, Some(c));
        assert_eq!(group.segment(c).next, None);
        assert_eq!(group.segment(c).node, 2);
    }

    #[test]
    fn pipes_are_independent_chains() {
        let mut group = PipeGroup::default();
        let first = group.allocate_pipe();
        let second = group.allocate_pipe();
        let a = group.extend(first, 0, 0);
        let b = group.extend(second, 0, 0);
        assert_eq!(group.segment(a).next, None);
        assert_eq!(group.segment(b).prev, None);
        assert_eq!(group.segment(b).pipe(), second);
    }

    #[test]
    fn profile_cells_bind_pipes() {
        let mut profiles = ProfileGroup::default();
        let handle = profiles.allocate(0.5);
        let profile = profiles.profile_mut(handle);
        let cell = profile.allocate_cell(3, None);
        assert_eq!(profile.cell(cell).pipe, 3);
        assert_eq!(profile.cell(cell).segment, None);
        assert_eq!(profile.cell_of_pipe(3), Some(cell));
        assert_eq!(profile.cell_of_pipe(4), None);
        assert_eq!(profile.physics.particle_radius, 0.5);
    }
}
