//! Pipe-model reconstruction: one vascular strand per branch tip, traced
//! back to the root, with per-node cross-section layouts produced by the
//! 2-D packing solver and interpolated along flows.

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use tracing::{debug, trace};

use crate::params::PipeModelParameters;
use crate::pipes::{PipeGroup, ProfileGroup};
use crate::skeleton::Skeleton;
use crate::types::{FlowHandle, NodeHandle, PipeHandle, ProfileHandle};

/// Pipe bookkeeping attached to each node of the cloned skeleton.
#[derive(Debug, Clone, Default)]
pub struct PipeNodeData {
    pub profile: Option<ProfileHandle>,
    /// The pipe that terminates at this node's axis (the strand "owned" by
    /// the tip growing through it).
    pub pipe: Option<PipeHandle>,
}

pub type PipeSkeleton = Skeleton<(), (), PipeNodeData>;

/// The full pipe model of one plant: a topology clone of the grown
/// skeleton, the strand group, and one packing profile per node plus the
/// synthetic base profile at the trunk origin.
#[derive(Debug, Clone)]
pub struct TreePipeModel {
    pub skeleton: PipeSkeleton,
    pub pipes: PipeGroup,
    pub profiles: ProfileGroup,
    pub base_profile: Option<ProfileHandle>,
    /// Source skeleton node handle to cloned node handle.
    pub node_map: HashMap<NodeHandle, NodeHandle>,
}

impl Default for TreePipeModel {
    fn default() -> Self {
        Self {
            skeleton: PipeSkeleton::new(),
            pipes: PipeGroup::default(),
            profiles: ProfileGroup::default(),
            base_profile: None,
            node_map: HashMap::new(),
        }
    }
}

impl TreePipeModel {
    /// Rebuilds strands and packs every cross-section for `source`, then
    /// writes the relaxed offsets back. Equivalent to
    /// [`Self::update_pipe_models`] followed by
    /// [`Self::apply_simulation_results`].
    pub fn rebuild<S, F, N>(&mut self, source: &Skeleton<S, F, N>, params: &PipeModelParameters) {
        self.update_pipe_models(source, params);
        self.apply_simulation_results();
    }

    /// Clones the source topology, allocates one strand per vascular path
    /// and runs the packing simulation flow by flow. Previous pipe state is
    /// cleared up front, never left half-updated.
    pub fn update_pipe_models<S, F, N>(
        &mut self,
        source: &Skeleton<S, F, N>,
        params: &PipeModelParameters,
    ) {
        self.pipes = PipeGroup::default();
        self.profiles = ProfileGroup::default();
        self.base_profile = None;
        self.node_map.clear();
        let mut node_map = HashMap::new();
        self.skeleton = Skeleton::clone_topology(source, |src, dst| {
            node_map.insert(src, dst);
        });
        self.node_map = node_map;
        if self.node_map.is_empty() {
            return;
        }

        let base = self.profiles.allocate(params.profile_cell_radius);
        self.base_profile = Some(base);
        let sorted = self.skeleton.sorted_node_list().to_vec();
        for &handle in &sorted {
            let profile = self.profiles.allocate(params.profile_cell_radius);
            self.skeleton.node_mut(handle).data.profile = Some(profile);
        }

        // Strand construction, in creation order: the root starts the first
        // pipe, apical continuations carry every strand of the parent one
        // node further, lateral origins retrace a brand-new strand all the
        // way back to the root.
        for &handle in &sorted {
            let profile = self.node_profile(handle);
            let flow = self.skeleton.node(handle).flow();
            match self.skeleton.node(handle).parent() {
                None => {
                    let pipe = self.pipes.allocate_pipe();
                    self.profiles.profile_mut(base).allocate_cell(pipe, None);
                    let segment = self.pipes.extend(pipe, handle, flow);
                    let cell = self
                        .profiles
                        .profile_mut(profile)
                        .allocate_cell(pipe, Some(segment));
                    self.pipes.segment_mut(segment).cell = cell;
                    self.skeleton.node_mut(handle).data.pipe = Some(pipe);
                }
                Some(parent) if self.skeleton.node(handle).is_apical() => {
                    let parent_profile = self.node_profile(parent);
                    let carried: Vec<(PipeHandle, Vec2)> = self
                        .profiles
                        .profile(parent_profile)
                        .cells()
                        .iter()
                        .map(|cell| (cell.pipe, cell.offset))
                        .collect();
                    for (pipe, offset) in carried {
                        let segment = self.pipes.extend(pipe, handle, flow);
                        let target = self.profiles.profile_mut(profile);
                        let cell = target.allocate_cell(pipe, Some(segment));
                        // The parent's layout seeds the new cross-section.
                        target.cell_mut(cell).offset = offset;
                        self.pipes.segment_mut(segment).cell = cell;
                    }
                    let parent_pipe = self.skeleton.node(parent).data.pipe;
                    self.skeleton.node_mut(handle).data.pipe = parent_pipe;
                }
                Some(parent) => {
                    let pipe = self.pipes.allocate_pipe();
                    self.profiles.profile_mut(base).allocate_cell(pipe, None);
                    let mut chain = Vec::new();
                    let mut cursor = Some(parent);
                    while let Some(ancestor) = cursor {
                        chain.push(ancestor);
                        cursor = self.skeleton.node(ancestor).parent();
                    }
                    chain.reverse();
                    for ancestor in chain {
                        let ancestor_flow = self.skeleton.node(ancestor).flow();
                        let segment = self.pipes.extend(pipe, ancestor, ancestor_flow);
                        let ancestor_profile = self.node_profile(ancestor);
                        let cell = self
                            .profiles
                            .profile_mut(ancestor_profile)
                            .allocate_cell(pipe, Some(segment));
                        self.pipes.segment_mut(segment).cell = cell;
                    }
                    let segment = self.pipes.extend(pipe, handle, flow);
                    let cell = self
                        .profiles
                        .profile_mut(profile)
                        .allocate_cell(pipe, Some(segment));
                    self.pipes.segment_mut(segment).cell = cell;
                    self.skeleton.node_mut(handle).data.pipe = Some(pipe);
                }
            }
        }

        // One particle per cell, seeded at the cell's carried-over offset.
        for profile in self.profiles.profiles_mut() {
            profile.physics.reset(params.delta_time);
            profile.physics.particle_radius = params.profile_cell_radius;
            for index in 0..profile.cell_count() {
                let offset = profile.cell(index).offset;
                let particle = profile.physics.allocate_particle();
                {
                    let particle = profile.physics.particle_mut(particle);
                    particle.set_damping(params.damping);
                    particle.set_position(offset);
                    particle.data = index;
                }
                profile.cell_mut(index).particle = particle;
            }
        }

        // Pack deepest flows first so every branch point sees its children
        // already resolved.
        let sorted_flows = self.skeleton.sorted_flow_list().to_vec();
        for &flow in sorted_flows.iter().rev() {
            self.pack_flow_end(flow, params);
        }

        // The base profile mirrors the trunk flow's resolved layout.
        let trunk_arrangement = self.flow_arrangement(self.skeleton.root_handle());
        self.write_positions(base, &trunk_arrangement, Vec2::ZERO);

        debug!(
            pipes = self.pipes.pipe_count(),
            profiles = self.profiles.profile_count(),
            nodes = self.node_map.len(),
            "pipe model rebuilt"
        );
    }

    /// Resolves the cross-section layout at the end node of `flow`.
    fn pack_flow_end(&mut self, flow: FlowHandle, params: &PipeModelParameters) {
        let end_node = *self
            .skeleton
            .flow(flow)
            .nodes()
            .last()
            .expect("flow without nodes");
        let end_profile = self.node_profile(end_node);
        let children = self.skeleton.node(end_node).children().to_vec();

        if children.is_empty() {
            // Tip of a branch: every strand here packs at the axis.
            for particle in self
                .profiles
                .profile_mut(end_profile)
                .physics
                .particles_mut()
            {
                particle.set_position(Vec2::ZERO);
            }
            return;
        }
        if children.len() == 1 {
            // Straight passthrough, no physics needed.
            let child_arrangement = self.flow_arrangement(children[0]);
            self.write_positions(end_profile, &child_arrangement, Vec2::ZERO);
            return;
        }

        // Branch point: the apical child keeps its packed layout, lateral
        // children are pushed outward along their branching directions far
        // enough that the two clouds cannot overlap, then the whole
        // cross-section relaxes.
        let main = children
            .iter()
            .copied()
            .find(|&child| self.skeleton.node(child).is_apical())
            .unwrap_or(children[0]);
        let main_arrangement = self.flow_arrangement(main);
        self.write_positions(end_profile, &main_arrangement, Vec2::ZERO);
        let end_rotation = self.skeleton.node(end_node).info.global_rotation;
        let main_profile = self.flow_end_profile(main);
        for &child in &children {
            if child == main {
                continue;
            }
            let child_rotation = self.skeleton.node(child).info.global_rotation;
            let front = (end_rotation.inverse() * child_rotation) * Vec3::NEG_Z;
            let mut direction = Vec2::new(front.x, front.y).normalize_or_zero();
            if direction == Vec2::ZERO {
                direction = Vec2::X;
            }
            let child_profile = self.flow_end_profile(child);
            let spacing = self
                .profiles
                .profile(main_profile)
                .physics
                .distance_to_center(direction)
                + self
                    .profiles
                    .profile(child_profile)
                    .physics
                    .distance_to_center(-direction)
                + 2.0 * params.profile_cell_radius;
            let child_arrangement = self.flow_arrangement(child);
            self.write_positions(end_profile, &child_arrangement, direction * spacing);
        }

        let cell_count = self.profiles.profile(end_profile).cell_count();
        let iterations = params.simulation_iteration_cell_factor * cell_count;
        let gravity_strength = params.gravity_strength;
        let mut spent = iterations;
        for i in 0..iterations {
            let physics = &mut self.profiles.profile_mut(end_profile).physics;
            let center = physics.mass_center();
            physics.simulate(1, |particle| {
                // Keep the cloud centered and pull every strand inward; the
                // pairwise separation supplies the opposing pressure.
                particle.translate(-center);
                let position = particle.position();
                if position.length_squared() > 0.0 {
                    particle.set_acceleration(-gravity_strength * position.normalize());
                } else {
                    particle.set_acceleration(Vec2::ZERO);
                }
            });
            if i > params.minimum_simulation_iteration
                && physics.max_particle_velocity() < params.particle_stabilize_speed
            {
                spent = i + 1;
                break;
            }
        }
        trace!(flow, cells = cell_count, iterations = spent, "packed branch point");
    }

    /// Writes each flow's resolved start and end layouts into cell offsets
    /// and linearly interpolates the interior nodes per pipe. Interior
    /// cross-sections never run physics.
    pub fn apply_simulation_results(&mut self) {
        if self.node_map.is_empty() {
            return;
        }
        let sorted_flows = self.skeleton.sorted_flow_list().to_vec();
        for &flow in &sorted_flows {
            let nodes = self.skeleton.flow(flow).nodes().to_vec();
            let end_node = *nodes.last().expect("flow without nodes");
            let end_profile = self.node_profile(end_node);

            let end_arrangement: HashMap<PipeHandle, Vec2> = {
                let profile = self.profiles.profile(end_profile);
                profile
                    .cells()
                    .iter()
                    .map(|cell| (cell.pipe, profile.physics.particle(cell.particle).position()))
                    .collect()
            };
            {
                let profile = self.profiles.profile_mut(end_profile);
                for index in 0..profile.cell_count() {
                    let position = profile.physics.particle(profile.cell(index).particle).position();
                    profile.cell_mut(index).offset = position;
                }
            }
            if nodes.len() == 1 {
                continue;
            }

            // The flow's base cross-section sits where the parent branch
            // point placed it; the trunk flow starts at its own layout.
            let start_arrangement: HashMap<PipeHandle, Vec2> =
                match self.skeleton.flow(flow).parent() {
                    None => end_arrangement.clone(),
                    Some(parent_flow) => {
                        let parent_end = *self
                            .skeleton
                            .flow(parent_flow)
                            .nodes()
                            .last()
                            .expect("flow without nodes");
                        let profile = self.profiles.profile(self.node_profile(parent_end));
                        profile.cells().iter().map(|cell| (cell.pipe, cell.offset)).collect()
                    }
                };
            {
                let start_profile = self.node_profile(nodes[0]);
                let profile = self.profiles.profile_mut(start_profile);
                for index in 0..profile.cell_count() {
                    let pipe = profile.cell(index).pipe;
                    if let Some(&position) = start_arrangement.get(&pipe) {
                        profile.cell_mut(index).offset = position;
                    }
                }
            }
            if nodes.len() == 2 {
                continue;
            }
            let span = (nodes.len() - 1) as f32;
            for (i, &node) in nodes.iter().enumerate().take(nodes.len() - 1).skip(1) {
                let t = i as f32 / span;
                let profile = self.node_profile(node);
                let profile = self.profiles.profile_mut(profile);
                for index in 0..profile.cell_count() {
                    let pipe = profile.cell(index).pipe;
                    if let (Some(&start), Some(&end)) =
                        (start_arrangement.get(&pipe), end_arrangement.get(&pipe))
                    {
                        profile.cell_mut(index).offset = start.lerp(end, t);
                    }
                }
            }
        }
        if let Some(base) = self.base_profile {
            let profile = self.profiles.profile_mut(base);
            for index in 0..profile.cell_count() {
                let position = profile.physics.particle(profile.cell(index).particle).position();
                profile.cell_mut(index).offset = position;
            }
        }
    }

    fn node_profile(&self, node: NodeHandle) -> ProfileHandle {
        self.skeleton
            .node(node)
            .data
            .profile
            .expect("profile not allocated for node")
    }

    /// Profile at the end node of the flow `node` belongs to.
    fn flow_end_profile(&self, node: NodeHandle) -> ProfileHandle {
        let flow = self.skeleton.node(node).flow();
        let end = *self
            .skeleton
            .flow(flow)
            .nodes()
            .last()
            .expect("flow without nodes");
        self.node_profile(end)
    }

    /// Packed (pipe, position) pairs at the end of the flow `node` belongs
    /// to.
    fn flow_arrangement(&self, node: NodeHandle) -> Vec<(PipeHandle, Vec2)> {
        let profile = self.profiles.profile(self.flow_end_profile(node));
        profile
            .cells()
            .iter()
            .map(|cell| (cell.pipe, profile.physics.particle(cell.particle).position()))
            .collect()
    }

    /// Positions the particles of `profile` cells by pipe, shifted by
    /// `offset`. Pipes absent from the profile are skipped.
    fn write_positions(
        &mut self,
        profile: ProfileHandle,
        positions: &[(PipeHandle, Vec2)],
        offset: Vec2,
    ) {
        let profile = self.profiles.profile_mut(profile);
        for &(pipe, position) in positions {
            if let Some(cell) = profile.cell_of_pipe(pipe) {
                let particle = profile.cell(cell).particle;
                profile
                    .physics
                    .particle_mut(particle)
                    .set_position(position + offset);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    type SourceSkeleton = Skeleton<(), (), ()>;

    fn params_without_gravity() -> PipeModelParameters {
        PipeModelParameters {
            gravity_strength: 0.0,
            ..PipeModelParameters::default()
        }
    }

    /// Number of pipes with a segment inside `node`, counted independently
    /// of the profile bookkeeping.
    fn pipes_through(model: &TreePipeModel, node: NodeHandle) -> usize {
        model
            .pipes
            .pipes()
            .iter()
            .filter(|pipe| {
                pipe.segments()
                    .iter()
                    .any(|&s| model.pipes.segment(s).node == node)
            })
            .count()
    }

    #[test]
    fn single_node_skeleton_builds_one_pipe() {
        let source = SourceSkeleton::new();
        let mut model = TreePipeModel::default();
        model.rebuild(&source, &params_without_gravity());

        assert_eq!(model.pipes.pipe_count(), 1);
        let root = model.node_map[&0];
        let profile = model.profiles.profile(model.skeleton.node(root).data.profile.unwrap());
        assert_eq!(profile.cell_count(), 1);
        assert_eq!(profile.cell(0).offset, Vec2::ZERO);
        let base = model.profiles.profile(model.base_profile.unwrap());
        assert_eq!(base.cell_count(), 1);
    }

    #[test]
    fn apical_chain_has_one_cell_in_every_profile() {
        let mut source = SourceSkeleton::new();
        let mut tip = 0;
        for _ in 0..5 {
            tip = source.extend(tip, false);
        }
        let mut model = TreePipeModel::default();
        model.rebuild(&source, &params_without_gravity());

        assert_eq!(model.pipes.pipe_count(), 1);
        let sorted = model.skeleton.sorted_node_list().to_vec();
        assert_eq!(sorted.len(), 6);
        for &node in &sorted {
            let profile = model
                .profiles
                .profile(model.skeleton.node(node).data.profile.unwrap());
            assert_eq!(profile.cell_count(), 1);
            assert_eq!(pipes_through(&model, node), 1);
            assert_eq!(profile.cell(0).offset, Vec2::ZERO);
        }
        // The single pipe passes through every node exactly once.
        assert_eq!(model.pipes.pipe(0).segments().len(), 6);
    }

    #[test]
    fn profile_cell_count_matches_pipes_passing_through() {
        let mut source = SourceSkeleton::new();
        let a = source.extend(0, false);
        let b = source.extend(a, false);
        let side_1 = source.extend(a, true);
        let side_2 = source.extend(a, true);
        let _side_tip = source.extend(side_1, false);
        let _ = b;

        let mut model = TreePipeModel::default();
        model.rebuild(&source, &params_without_gravity());

        // One strand per branch tip.
        assert_eq!(model.pipes.pipe_count(), 3);
        for (&src, &dst) in &model.node_map {
            let profile = model
                .profiles
                .profile(model.skeleton.node(dst).data.profile.unwrap());
            assert_eq!(
                profile.cell_count(),
                pipes_through(&model, dst),
                "cell count diverged from strand count at source node {src}"
            );
        }
        // Trunk nodes carry all three strands.
        assert_eq!(pipes_through(&model, model.node_map[&0]), 3);
        assert_eq!(pipes_through(&model, model.node_map[&a]), 3);
        // Each lateral carries exactly its own strand.
        assert_eq!(pipes_through(&model, model.node_map[&side_2]), 1);
        // The base profile marks one origin per strand.
        assert_eq!(
            model
                .profiles
                .profile(model.base_profile.unwrap())
                .cell_count(),
            3
        );
    }

    #[test]
    fn child_cell_sets_partition_the_branch_point_profile() {
        let mut source = SourceSkeleton::new();
        let a = source.extend(0, false);
        let b = source.extend(a, false);
        let side_1 = source.extend(a, true);
        let side_2 = source.extend(a, true);

        let mut model = TreePipeModel::default();
        model.rebuild(&source, &params_without_gravity());

        let pipes_of = |node: NodeHandle| -> std::collections::HashSet<PipeHandle> {
            model
                .profiles
                .profile(model.skeleton.node(model.node_map[&node]).data.profile.unwrap())
                .cells()
                .iter()
                .map(|cell| cell.pipe)
                .collect()
        };
        let parent = pipes_of(a);
        let apical = pipes_of(b);
        let lateral_1 = pipes_of(side_1);
        let lateral_2 = pipes_of(side_2);
        assert!(apical.is_disjoint(&lateral_1));
        assert!(apical.is_disjoint(&lateral_2));
        assert!(lateral_1.is_disjoint(&lateral_2));
        let union: std::collections::HashSet<_> = apical
            .union(&lateral_1)
            .chain(&lateral_2)
            .copied()
            .collect();
        assert_eq!(union, parent);
    }

    #[test]
    fn branch_point_copies_apical_child_and_displaces_laterals() {
        let mut source = SourceSkeleton::new();
        let a = source.extend(0, false);
        let b = source.extend(a, false);
        let side_1 = source.extend(a, true);
        let side_2 = source.extend(a, true);
        // Laterals head off to +X and -X in the parent's cross-section
        // plane; the apical child keeps the parent's orientation.
        source.node_mut(side_1).info.global_rotation =
            Quat::from_rotation_y(-std::f32::consts::FRAC_PI_4);
        source.node_mut(side_2).info.global_rotation =
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);

        let params = params_without_gravity();
        let mut model = TreePipeModel::default();
        model.rebuild(&source, &params);

        let offset_of = |node: NodeHandle, pipe: PipeHandle| -> Vec2 {
            let profile = model
                .profiles
                .profile(model.skeleton.node(model.node_map[&node]).data.profile.unwrap());
            let cell = profile.cell_of_pipe(pipe).expect("pipe missing from profile");
            profile.cell(cell).offset
        };
        let trunk_pipe = model.skeleton.node(model.node_map[&b]).data.pipe.unwrap();
        let side_1_pipe = model.skeleton.node(model.node_map[&side_1]).data.pipe.unwrap();
        let side_2_pipe = model.skeleton.node(model.node_map[&side_2]).data.pipe.unwrap();

        // Passthrough: the apical child's cell offsets equal the branch
        // point's for the shared strand, with no physics displacement.
        assert_eq!(offset_of(b, trunk_pipe), offset_of(a, trunk_pipe));

        // Laterals are displaced by nonzero vectors along their branching
        // directions.
        let displacement_1 = offset_of(a, side_1_pipe) - offset_of(side_1, side_1_pipe);
        let displacement_2 = offset_of(a, side_2_pipe) - offset_of(side_2, side_2_pipe);
        assert!(displacement_1.length() > 1e-3);
        assert!(displacement_2.length() > 1e-3);
        assert!(displacement_1.x > 0.0, "expected +X push, got {displacement_1:?}");
        assert!(displacement_2.x < 0.0, "expected -X push, got {displacement_2:?}");
        assert!(displacement_1.y.abs() < 1e-4);
        assert!(displacement_2.y.abs() < 1e-4);
        // Pushed out by both extents plus one diameter: no overlap.
        assert!(displacement_1.length() >= 2.0 * params.profile_cell_radius - 1e-4);
    }

    #[test]
    fn interior_nodes_interpolate_between_flow_endpoints() {
        let mut source = SourceSkeleton::new();
        // A branch flow of four nodes hanging off the root, ending in its
        // own branch point, plus a second branch at the root. The four-node
        // flow then has distinct start and end layouts: the start comes
        // from the root's packed cross-section, the end from its own.
        let a1 = source.extend(0, true);
        let a2 = source.extend(a1, false);
        let a3 = source.extend(a2, false);
        let a4 = source.extend(a3, false);
        let _s1 = source.extend(a4, true);
        let _s2 = source.extend(a4, true);
        let _b1 = source.extend(0, true);

        let mut model = TreePipeModel::default();
        model.rebuild(&source, &params_without_gravity());

        let offsets = |node: NodeHandle| -> HashMap<PipeHandle, Vec2> {
            let profile = model
                .profiles
                .profile(model.skeleton.node(model.node_map[&node]).data.profile.unwrap());
            profile.cells().iter().map(|c| (c.pipe, c.offset)).collect()
        };
        let start = offsets(a1);
        let mid_1 = offsets(a2);
        let mid_2 = offsets(a3);
        let end = offsets(a4);
        assert_eq!(start.len(), 3);
        // The layouts genuinely differ, so the lerp is exercised.
        assert!(start.iter().any(|(pipe, s)| (*s - end[pipe]).length() > 1e-4));
        for (&pipe, &start_offset) in &start {
            let end_offset = end[&pipe];
            let expected_1 = start_offset.lerp(end_offset, 1.0 / 3.0);
            let expected_2 = start_offset.lerp(end_offset, 2.0 / 3.0);
            assert!((mid_1[&pipe] - expected_1).length() < 1e-4);
            assert!((mid_2[&pipe] - expected_2).length() < 1e-4);
        }
    }

    #[test]
    fn rebuild_resets_previous_state() {
        let mut source = SourceSkeleton::new();
        let a = source.extend(0, false);
        source.extend(a, true);
        source.extend(a, true);

        let mut model = TreePipeModel::default();
        model.rebuild(&source, &params_without_gravity());
        let pipes_before = model.pipes.pipe_count();
        assert_eq!(pipes_before, 3);

        // Rebuilding against a smaller skeleton leaves no stale strands.
        let small = SourceSkeleton::new();
        model.rebuild(&small, &params_without_gravity());
        assert_eq!(model.pipes.pipe_count(), 1);
        assert_eq!(model.node_map.len(), 1);
    }

    #[test]
    fn packing_with_default_gravity_stays_finite_and_converges() {
        let mut source = SourceSkeleton::new();
        let a = source.extend(0, false);
        let b = source.extend(a, false);
        for _ in 0..4 {
            let branch = source.extend(b, true);
            source.extend(branch, false);
        }
        let mut model = TreePipeModel::default();
        model.rebuild(&source, &PipeModelParameters::default());
        for profile in model.profiles.profiles() {
            for cell in profile.cells() {
                assert!(cell.offset.is_finite(), "non-finite offset {:?}", cell.offset);
            }
        }
    }
}
