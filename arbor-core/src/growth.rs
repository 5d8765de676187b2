//! Shoot and root skeletal growth.
//!
//! One [`TreeModel::grow`] call advances a plant by a single discrete step:
//! pruning, resource aggregation and distribution, bud fate resolution with
//! recursive tip extension, inhibitor relaxation, then the sagging/pose
//! postprocess. The step mutates the skeletons in place and is atomic only
//! in the sense that nothing else may touch the model while it runs.

use glam::{EulerRot, Mat3, Quat, Vec3};
use rand::{Rng, RngCore};
use tracing::debug;

use crate::bud::{Bud, BudStatus, BudType};
use crate::params::{RootGrowthConfig, TreeGrowthParameters};
use crate::skeleton::Skeleton;
use crate::types::NodeHandle;

/// Environment scalars consumed by one growth step, sampled by the caller
/// from its soil model.
#[derive(Debug, Clone, Copy)]
pub struct GrowthNutrients {
    pub water: f32,
}

/// Derived per-internode growth state. Everything here is recomputed every
/// step from topology, parameters and environment.
#[derive(Debug, Clone)]
pub struct InternodeGrowthData {
    pub age: u32,
    pub inhibitor: f32,
    pub inhibitor_target: f32,
    pub desired_local_rotation: Quat,
    pub sagging: f32,
    pub max_distance_to_any_branch_end: f32,
    pub child_total_biomass: f32,
    pub extra_mass: f32,
    pub root_distance: f32,
    /// Productive requirement of this node's own buds.
    pub resource_requirement: f32,
    pub descendant_resource_requirement: f32,
    pub adjusted_total_resource_requirement: f32,
    pub light_direction: Vec3,
    pub light_intensity: f32,
    pub buds: Vec<Bud>,
}

impl Default for InternodeGrowthData {
    fn default() -> Self {
        Self {
            age: 0,
            inhibitor: 0.0,
            inhibitor_target: 0.0,
            desired_local_rotation: Quat::IDENTITY,
            sagging: 0.0,
            max_distance_to_any_branch_end: 0.0,
            child_total_biomass: 0.0,
            extra_mass: 0.0,
            root_distance: 0.0,
            resource_requirement: 0.0,
            descendant_resource_requirement: 0.0,
            adjusted_total_resource_requirement: 0.0,
            light_direction: Vec3::Y,
            light_intensity: 1.0,
            buds: Vec::new(),
        }
    }
}

/// Derived per-root-internode state.
#[derive(Debug, Clone, Default)]
pub struct RootNodeGrowthData {
    pub age: u32,
    pub max_distance_to_any_branch_end: f32,
    pub child_total_biomass: f32,
    pub root_distance: f32,
}

pub type ShootSkeleton = Skeleton<(), (), InternodeGrowthData>;
pub type RootSkeleton = Skeleton<(), (), RootNodeGrowthData>;

/// Rotates `front` toward `target_dir` by `min(strength, 1)` of the angle
/// between them, about their common normal, then re-orthogonalizes `up`.
/// Near-parallel pairs are left untouched (the rotation axis degenerates).
pub fn apply_tropism(target_dir: Vec3, strength: f32, front: &mut Vec3, up: &mut Vec3) {
    let dir = target_dir.normalize_or_zero();
    if dir == Vec3::ZERO {
        return;
    }
    let dot = front.dot(dir).clamp(-1.0, 1.0);
    if dot.abs() >= 0.99 {
        return;
    }
    let axis = front.cross(dir).normalize_or_zero();
    if axis == Vec3::ZERO {
        return;
    }
    let max_angle = dot.acos();
    let angle = (max_angle * strength.min(1.0)).min(max_angle);
    let rotation = Quat::from_axis_angle(axis, angle);
    *front = (rotation * *front).normalize();
    let new_up = front.cross(*up).cross(*front);
    *up = if new_up.length_squared() > 1e-12 {
        new_up.normalize()
    } else {
        front.any_orthonormal_vector()
    };
}

/// Orientation whose local -Z axis maps onto `front`, with `up` as the
/// vertical hint (the quaternion counterpart of a look-at basis).
pub fn look_rotation(front: Vec3, up: Vec3) -> Quat {
    let back = -front.normalize_or_zero();
    if back == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let mut right = up.cross(back).normalize_or_zero();
    if right == Vec3::ZERO {
        right = back.any_orthonormal_vector();
    }
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back))
}

/// One plant: shoot skeleton above ground, root skeleton below.
#[derive(Debug, Clone)]
pub struct TreeModel {
    pub shoot_skeleton: ShootSkeleton,
    pub root_skeleton: RootSkeleton,
    pub gravity_direction: Vec3,
}

impl TreeModel {
    /// A fresh plant: one root internode carrying a single dormant apical
    /// bud, and one root-system internode.
    pub fn new<P: TreeGrowthParameters>(
        params: &P,
        root_config: &RootGrowthConfig,
        rng: &mut dyn RngCore,
    ) -> Self {
        let mut shoot_skeleton = ShootSkeleton::new();
        let first = shoot_skeleton.root_handle();
        let thickness = params.end_node_thickness(shoot_skeleton.node(first));
        let apical_angle = params
            .desired_apical_angle(shoot_skeleton.node(first), rng)
            .to_radians();
        let roll_angle = params
            .desired_roll_angle(shoot_skeleton.node(first), rng)
            .to_radians();
        {
            let node = shoot_skeleton.node_mut(first);
            node.info.thickness = thickness;
            node.data.buds.push(Bud::new(
                BudType::Apical,
                Quat::from_euler(EulerRot::XYZ, apical_angle, 0.0, roll_angle),
            ));
        }
        let mut root_skeleton = RootSkeleton::new();
        root_skeleton.node_mut(0).info.thickness = root_config.end_node_thickness;
        Self {
            shoot_skeleton,
            root_skeleton,
            gravity_direction: Vec3::new(0.0, -1.0, 0.0),
        }
    }

    /// Advances the plant by one growth step. Returns whether any structure
    /// changed (nodes added or pruned).
    pub fn grow<P: TreeGrowthParameters>(
        &mut self,
        nutrients: &GrowthNutrients,
        params: &P,
        root_config: &RootGrowthConfig,
        rng: &mut dyn RngCore,
    ) -> bool {
        let shoot_changed = self.grow_shoot_system(nutrients, params, rng);
        let root_changed = self.grow_root_system(nutrients, root_config, rng);
        shoot_changed || root_changed
    }

    fn grow_shoot_system<P: TreeGrowthParameters>(
        &mut self,
        nutrients: &GrowthNutrients,
        params: &P,
        rng: &mut dyn RngCore,
    ) -> bool {
        let gravity = self.gravity_direction;
        let skeleton = &mut self.shoot_skeleton;
        skeleton.sort_lists();
        skeleton.calculate_flows();

        // Pruning runs against the previous step's derived distances.
        let root = skeleton.root_handle();
        let max_distance = skeleton.node(root).data.max_distance_to_any_branch_end;
        let pruned = Self::low_branch_pruning(skeleton, max_distance, root, params);
        if pruned {
            skeleton.sort_lists();
            skeleton.calculate_flows();
        }

        // Resource passes over the stable pre-growth snapshot.
        let sorted = skeleton.sorted_node_list().to_vec();
        for &handle in sorted.iter().rev() {
            Self::calculate_resource_requirement(skeleton, handle, params);
        }
        Self::distribute_resources(skeleton, &sorted, params);

        // Growth. Nodes created mid-pass are not in the snapshot and are
        // only visited from the next step on.
        let mut grown = false;
        for &handle in sorted.iter().rev() {
            grown |= Self::grow_internode(skeleton, gravity, handle, nutrients, params, rng);
        }
        if grown {
            skeleton.sort_lists();
        }

        for &handle in skeleton.sorted_node_list().to_vec().iter().rev() {
            Self::calculate_sagging(skeleton, handle, params);
        }
        Self::recompute_shoot_pose(skeleton, gravity);
        skeleton.calculate_flows();

        debug!(
            nodes = skeleton.node_count(),
            flows = skeleton.flow_count(),
            pruned,
            grown,
            "shoot growth step"
        );
        pruned || grown
    }

    /// Recycles low, deeply shaded branches. Children are collected before
    /// any recursion so a pruned subtree is never descended into.
    fn low_branch_pruning<P: TreeGrowthParameters>(
        skeleton: &mut ShootSkeleton,
        max_distance: f32,
        handle: NodeHandle,
        params: &P,
    ) -> bool {
        let should_prune = {
            let node = skeleton.node(handle);
            max_distance > 5.0
                && node.order() != 0
                && node.data.root_distance / max_distance < params.low_branch_pruning(node)
        };
        if should_prune {
            skeleton.recycle_node(handle);
            return true;
        }
        let children = skeleton.node(handle).children().to_vec();
        let mut pruned = false;
        for child in children {
            pruned |= Self::low_branch_pruning(skeleton, max_distance, child, params);
        }
        pruned
    }

    fn calculate_resource_requirement<P: TreeGrowthParameters>(
        skeleton: &mut ShootSkeleton,
        handle: NodeHandle,
        params: &P,
    ) {
        let (shoot_base, shoot_productive, leaf_base, leaf_productive, fruit_base, fruit_productive) = {
            let node = skeleton.node(handle);
            (
                params.shoot_base_resource_requirement(node),
                params.shoot_productive_resource_requirement(node),
                params.leaf_base_resource_requirement(node),
                params.leaf_productive_resource_requirement(node),
                params.fruit_base_resource_requirement(node),
                params.fruit_productive_resource_requirement(node),
            )
        };
        {
            let data = &mut skeleton.node_mut(handle).data;
            let mut own = 0.0;
            for bud in &mut data.buds {
                if bud.status == BudStatus::Died {
                    bud.base_resource_requirement = 0.0;
                    bud.productive_resource_requirement = 0.0;
                    continue;
                }
                match bud.kind {
                    BudType::Apical => {
                        if bud.status == BudStatus::Dormant {
                            bud.base_resource_requirement = shoot_base;
                            bud.productive_resource_requirement = shoot_productive;
                        }
                    }
                    BudType::Leaf => {
                        bud.base_resource_requirement = leaf_base;
                        bud.productive_resource_requirement = leaf_productive;
                    }
                    BudType::Fruit => {
                        bud.base_resource_requirement = fruit_base;
                        bud.productive_resource_requirement = fruit_productive;
                    }
                    BudType::Lateral => {
                        bud.base_resource_requirement = 0.0;
                        bud.productive_resource_requirement = 0.0;
                    }
                }
                own += bud.productive_resource_requirement;
            }
            data.resource_requirement = own;
        }
        let children = skeleton.node(handle).children().to_vec();
        let mut descendant = 0.0;
        for child in children {
            let data = &skeleton.node(child).data;
            descendant += data.resource_requirement + data.descendant_resource_requirement;
        }
        skeleton.node_mut(handle).data.descendant_resource_requirement = descendant;
    }

    /// Top-down apical-control share distribution. Children's adjusted
    /// totals always sum back to the parent's descendant requirement; a
    /// parent with no descendant requirement passes everything through
    /// unchanged.
    fn distribute_resources<P: TreeGrowthParameters>(
        skeleton: &mut ShootSkeleton,
        sorted: &[NodeHandle],
        params: &P,
    ) {
        for &handle in sorted {
            if skeleton.node(handle).parent().is_none() {
                let data = &mut skeleton.node_mut(handle).data;
                data.adjusted_total_resource_requirement =
                    data.resource_requirement + data.descendant_resource_requirement;
            }
            let descendant_total = skeleton.node(handle).data.descendant_resource_requirement;
            let children = skeleton.node(handle).children().to_vec();
            if children.is_empty() || descendant_total <= 0.0 {
                continue;
            }
            let apical_control = params.apical_control(skeleton.node(handle));
            let mut weights = Vec::with_capacity(children.len());
            let mut weight_sum = 0.0;
            for &child in &children {
                let data = &skeleton.node(child).data;
                let share = (data.resource_requirement + data.descendant_resource_requirement)
                    / descendant_total;
                let weight = share.powf(apical_control);
                weights.push(weight);
                weight_sum += weight;
            }
            if weight_sum <= 0.0 {
                continue;
            }
            for (&child, &weight) in children.iter().zip(&weights) {
                let data = &mut skeleton.node_mut(child).data;
                data.adjusted_total_resource_requirement = weight / weight_sum * descendant_total;
                let total = data.resource_requirement + data.descendant_resource_requirement;
                if total <= 0.0 {
                    continue;
                }
                let factor = data.resource_requirement / total;
                data.resource_requirement *= factor;
                data.descendant_resource_requirement *= factor;
                for bud in &mut data.buds {
                    bud.productive_resource_requirement *= factor;
                }
            }
        }
    }

    fn grow_internode<P: TreeGrowthParameters>(
        skeleton: &mut ShootSkeleton,
        gravity: Vec3,
        handle: NodeHandle,
        nutrients: &GrowthNutrients,
        params: &P,
        rng: &mut dyn RngCore,
    ) -> bool {
        let mut graph_changed = false;
        {
            let decrease = params.apical_dominance_decrease(skeleton.node(handle));
            let children = skeleton.node(handle).children().to_vec();
            let mut target = 0.0;
            for child in children {
                target += skeleton.node(child).data.inhibitor * decrease;
            }
            skeleton.node_mut(handle).data.inhibitor_target = target;
        }
        let bud_count = skeleton.node(handle).data.buds.len();
        for index in 0..bud_count {
            let (kind, status) = {
                let bud = &skeleton.node(handle).data.buds[index];
                (bud.kind, bud.status)
            };
            match (kind, status) {
                (BudType::Apical, BudStatus::Dormant) => {
                    if params.apical_bud_kill_probability(skeleton.node(handle))
                        > rng.random_range(0.0..1.0)
                    {
                        skeleton.node_mut(handle).data.buds[index].status = BudStatus::Died;
                    } else {
                        let (elongation, decrease) = {
                            let node = skeleton.node(handle);
                            let received = node.data.buds[index].productive_resource_requirement
                                * nutrients.water;
                            (
                                received
                                    * params.internode_length(node)
                                    * params.growth_rate(node),
                                params.apical_dominance_decrease(node),
                            )
                        };
                        let mut collected_inhibitor = 0.0;
                        graph_changed |= Self::grow_shoots(
                            skeleton,
                            gravity,
                            elongation,
                            handle,
                            params,
                            rng,
                            &mut collected_inhibitor,
                        );
                        skeleton.node_mut(handle).data.inhibitor_target +=
                            collected_inhibitor * decrease;
                    }
                    // A node with a dormant apical bud carries no laterals;
                    // they are seeded when the apical bud flushes or dies.
                    break;
                }
                (BudType::Lateral, BudStatus::Dormant) => {
                    if params.lateral_bud_kill_probability(skeleton.node(handle))
                        > rng.random_range(0.0..1.0)
                    {
                        skeleton.node_mut(handle).data.buds[index].status = BudStatus::Died;
                        continue;
                    }
                    let flush_probability = {
                        let node = skeleton.node(handle);
                        params.lateral_bud_flushing_probability(node) * params.growth_rate(node)
                            / (1.0 + node.data.inhibitor)
                    };
                    if flush_probability >= rng.random_range(0.0..1.0) {
                        graph_changed = true;
                        skeleton.node_mut(handle).data.buds[index].status = BudStatus::Flushed;
                        let (desired, light, gravitropism, phototropism, thickness) = {
                            let node = skeleton.node(handle);
                            (
                                node.info.global_rotation * node.data.buds[index].local_rotation,
                                node.data.light_direction,
                                params.gravitropism(node),
                                params.phototropism(node),
                                params.end_node_thickness(node),
                            )
                        };
                        let apical_angle = params
                            .desired_apical_angle(skeleton.node(handle), rng)
                            .to_radians();
                        let roll_angle = params
                            .desired_roll_angle(skeleton.node(handle), rng)
                            .to_radians();
                        let mut front = desired * Vec3::NEG_Z;
                        let mut up = desired * Vec3::Y;
                        apply_tropism(gravity, gravitropism, &mut front, &mut up);
                        apply_tropism(light, phototropism, &mut front, &mut up);
                        let parent_rotation = skeleton.node(handle).info.global_rotation;
                        let new_handle = skeleton.extend(handle, true);
                        let local = parent_rotation.inverse() * look_rotation(front, up);
                        let node = skeleton.node_mut(new_handle);
                        node.info.length = 0.0;
                        node.info.thickness = thickness;
                        node.info.local_rotation = local;
                        node.info.global_rotation = parent_rotation * local;
                        node.data.desired_local_rotation = local;
                        node.data.buds.push(Bud::new(
                            BudType::Apical,
                            Quat::from_euler(EulerRot::XYZ, apical_angle, 0.0, roll_angle),
                        ));
                    }
                }
                _ => {}
            }
        }
        // Exponential smoothing rather than instantaneous assignment; damps
        // step-to-step oscillation of the dominance signal.
        let data = &mut skeleton.node_mut(handle).data;
        data.inhibitor = (data.inhibitor + data.inhibitor_target) * 0.5;
        graph_changed
    }

    /// Recursive tip extension. Adds `extend_length` to the tip internode;
    /// once it overflows one internode length the apical bud retires,
    /// lateral bud slots are distributed evenly around the tip, a new tip is
    /// created along the tropism-adjusted direction and the excess cascades
    /// into it. The dominance signal accumulated below decays once per
    /// level on its way up.
    fn grow_shoots<P: TreeGrowthParameters>(
        skeleton: &mut ShootSkeleton,
        gravity: Vec3,
        extend_length: f32,
        handle: NodeHandle,
        params: &P,
        rng: &mut dyn RngCore,
        collected_inhibitor: &mut f32,
    ) -> bool {
        let internode_length = params.internode_length(skeleton.node(handle));
        skeleton.node_mut(handle).info.length += extend_length;
        let extra_length = skeleton.node(handle).info.length - internode_length;
        if extra_length <= 0.0 {
            *collected_inhibitor += params.apical_dominance_base(skeleton.node(handle));
            return false;
        }
        skeleton.node_mut(handle).info.length = internode_length;

        let (apical_rotation, global_rotation, light, gravitropism, phototropism, lateral_count) = {
            let node = skeleton.node(handle);
            (
                node.data.buds[0].local_rotation,
                node.info.global_rotation,
                node.data.light_direction,
                params.gravitropism(node),
                params.phototropism(node),
                params.lateral_bud_count(node),
            )
        };
        skeleton.node_mut(handle).data.buds[0].status = BudStatus::Died;

        let desired = global_rotation * apical_rotation;
        let mut front = desired * Vec3::NEG_Z;
        let mut up = desired * Vec3::Y;
        apply_tropism(gravity, gravitropism, &mut front, &mut up);
        apply_tropism(light, phototropism, &mut front, &mut up);

        let turn_angle = std::f32::consts::TAU / lateral_count.max(1) as f32;
        for i in 0..lateral_count {
            let branching_angle = params
                .desired_branching_angle(skeleton.node(handle), rng)
                .to_radians();
            skeleton.node_mut(handle).data.buds.push(Bud::new(
                BudType::Lateral,
                Quat::from_euler(EulerRot::XYZ, branching_angle, 0.0, i as f32 * turn_angle),
            ));
        }

        let thickness = params.end_node_thickness(skeleton.node(handle));
        let apical_angle = params
            .desired_apical_angle(skeleton.node(handle), rng)
            .to_radians();
        let roll_angle = params
            .desired_roll_angle(skeleton.node(handle), rng)
            .to_radians();
        let new_handle = skeleton.extend(handle, false);
        {
            let local = global_rotation.inverse() * look_rotation(front, up);
            let node = skeleton.node_mut(new_handle);
            node.info.length = extra_length.min(internode_length);
            node.info.thickness = thickness;
            node.info.local_rotation = local;
            node.info.global_rotation = global_rotation * local;
            node.data.desired_local_rotation = local;
            node.data.buds.push(Bud::new(
                BudType::Apical,
                Quat::from_euler(EulerRot::XYZ, apical_angle, 0.0, roll_angle),
            ));
        }
        let dominance_base = params.apical_dominance_base(skeleton.node(new_handle));
        {
            let data = &mut skeleton.node_mut(new_handle).data;
            data.inhibitor = dominance_base;
            data.inhibitor_target = dominance_base;
        }
        if extra_length > internode_length {
            let mut child_inhibitor = 0.0;
            Self::grow_shoots(
                skeleton,
                gravity,
                extra_length - internode_length,
                new_handle,
                params,
                rng,
                &mut child_inhibitor,
            );
            child_inhibitor *= params.apical_dominance_decrease(skeleton.node(new_handle));
            *collected_inhibitor += child_inhibitor;
            skeleton.node_mut(new_handle).data.inhibitor_target = child_inhibitor;
        } else {
            *collected_inhibitor += dominance_base;
        }
        true
    }

    /// Bottom-up biomass and branch-extent aggregation. The parent's
    /// thickness is floored by the generalized mean of its children's:
    /// `(Σ t_i^(1/k))^k` for thickness control factor `k`.
    fn calculate_sagging<P: TreeGrowthParameters>(
        skeleton: &mut ShootSkeleton,
        handle: NodeHandle,
        params: &P,
    ) {
        skeleton.node_mut(handle).data.child_total_biomass = 0.0;
        if skeleton.node(handle).is_end_node() {
            return;
        }
        let thickness_factor = params.thickness_control_factor(skeleton.node(handle));
        let children = skeleton.node(handle).children().to_vec();
        let mut biomass = 0.0;
        let mut max_distance = 0.0f32;
        let mut thickness_collection = 0.0;
        for child in children {
            let child = skeleton.node(child);
            biomass += child.data.child_total_biomass + child.info.thickness * child.info.length;
            max_distance =
                max_distance.max(child.data.max_distance_to_any_branch_end + child.info.length);
            thickness_collection += child.info.thickness.powf(1.0 / thickness_factor);
        }
        {
            let node = skeleton.node_mut(handle);
            node.data.child_total_biomass = biomass;
            node.data.max_distance_to_any_branch_end = max_distance;
            node.info.thickness = node
                .info
                .thickness
                .max(thickness_collection.powf(thickness_factor));
        }
        let sagging = params.sagging(skeleton.node(handle));
        skeleton.node_mut(handle).data.sagging = sagging;
    }

    /// Top-down pose recomputation with sagging, bounding-box update and
    /// per-step aging.
    fn recompute_shoot_pose(skeleton: &mut ShootSkeleton, gravity: Vec3) {
        skeleton.min = Vec3::splat(f32::MAX);
        skeleton.max = Vec3::splat(f32::MIN);
        let sorted = skeleton.sorted_node_list().to_vec();
        for &handle in &sorted {
            match skeleton.node(handle).parent() {
                None => {
                    let node = skeleton.node_mut(handle);
                    node.info.global_position = Vec3::ZERO;
                    node.info.local_rotation = Quat::IDENTITY;
                    node.info.global_rotation =
                        Quat::from_euler(EulerRot::XYZ, std::f32::consts::FRAC_PI_2, 0.0, 0.0);
                    node.data.root_distance = node.info.length;
                }
                Some(parent) => {
                    let (parent_rotation, parent_position, parent_length, parent_distance) = {
                        let parent = skeleton.node(parent);
                        (
                            parent.info.global_rotation,
                            parent.info.global_position,
                            parent.info.length,
                            parent.data.root_distance,
                        )
                    };
                    let (desired_local, sagging) = {
                        let node = skeleton.node(handle);
                        (node.data.desired_local_rotation, node.data.sagging)
                    };
                    let rotation = parent_rotation * desired_local;
                    let mut front = rotation * Vec3::NEG_Z;
                    let mut up = rotation * Vec3::Y;
                    // Sagging pulls the axis toward gravity; already-vertical
                    // internodes are left alone.
                    let alignment = front.dot(gravity).abs();
                    apply_tropism(gravity, sagging * (1.0 - alignment), &mut front, &mut up);
                    let rotation = look_rotation(front, up);
                    let node = skeleton.node_mut(handle);
                    node.data.root_distance = parent_distance + node.info.length;
                    node.info.global_rotation = rotation;
                    node.info.local_rotation = parent_rotation.inverse() * rotation;
                    node.info.global_position =
                        parent_position + parent_length * (parent_rotation * Vec3::NEG_Z);
                }
            }
            let (start, end) = {
                let info = &skeleton.node(handle).info;
                (info.global_position, info.global_end_position())
            };
            skeleton.min = skeleton.min.min(start).min(end);
            skeleton.max = skeleton.max.max(start).max(end);
            skeleton.node_mut(handle).data.age += 1;
        }
    }

    fn grow_root_system(
        &mut self,
        nutrients: &GrowthNutrients,
        config: &RootGrowthConfig,
        rng: &mut dyn RngCore,
    ) -> bool {
        let gravity = self.gravity_direction;
        let skeleton = &mut self.root_skeleton;
        skeleton.sort_lists();
        let sorted = skeleton.sorted_node_list().to_vec();
        let mut changed = false;

        for &handle in sorted.iter().rev() {
            if !skeleton.node(handle).is_end_node() {
                continue;
            }
            let elongation = nutrients.water * config.growth_rate * config.root_internode_length;
            changed |= Self::grow_root_axis(skeleton, gravity, elongation, handle, config, rng);
        }

        // One lateral root per interior chain node at most.
        for &handle in &sorted {
            if skeleton.node(handle).children().len() != 1 {
                continue;
            }
            if config.branching_probability <= rng.random_range(0.0..1.0) {
                continue;
            }
            changed = true;
            let rotation = skeleton.node(handle).info.global_rotation;
            let branching_angle = config.branching_angle.sample(rng).to_radians();
            let roll = rng.random_range(0.0..std::f32::consts::TAU);
            let desired = rotation * Quat::from_euler(EulerRot::XYZ, branching_angle, 0.0, roll);
            let mut front = desired * Vec3::NEG_Z;
            let mut up = desired * Vec3::Y;
            apply_tropism(gravity, config.gravitropism, &mut front, &mut up);
            let new_handle = skeleton.extend(handle, true);
            let local = rotation.inverse() * look_rotation(front, up);
            let node = skeleton.node_mut(new_handle);
            node.info.thickness = config.end_node_thickness;
            node.info.local_rotation = local;
            node.info.global_rotation = rotation * local;
        }

        if changed {
            skeleton.sort_lists();
        }
        Self::recompute_root_pose(skeleton, config);
        skeleton.calculate_flows();
        debug!(
            nodes = skeleton.node_count(),
            changed, "root growth step"
        );
        changed
    }

    fn grow_root_axis(
        skeleton: &mut RootSkeleton,
        gravity: Vec3,
        extend_length: f32,
        handle: NodeHandle,
        config: &RootGrowthConfig,
        rng: &mut dyn RngCore,
    ) -> bool {
        let internode_length = config.root_internode_length;
        skeleton.node_mut(handle).info.length += extend_length;
        let extra_length = skeleton.node(handle).info.length - internode_length;
        if extra_length <= 0.0 {
            return false;
        }
        skeleton.node_mut(handle).info.length = internode_length;
        let rotation = skeleton.node(handle).info.global_rotation;
        let apical_angle = config.apical_angle.sample(rng).to_radians();
        let roll = rng.random_range(0.0..std::f32::consts::TAU);
        let desired = rotation * Quat::from_euler(EulerRot::XYZ, apical_angle, 0.0, roll);
        let mut front = desired * Vec3::NEG_Z;
        let mut up = desired * Vec3::Y;
        apply_tropism(gravity, config.gravitropism, &mut front, &mut up);
        let new_handle = skeleton.extend(handle, false);
        {
            let local = rotation.inverse() * look_rotation(front, up);
            let node = skeleton.node_mut(new_handle);
            node.info.length = extra_length.min(internode_length);
            node.info.thickness = config.end_node_thickness;
            node.info.local_rotation = local;
            node.info.global_rotation = rotation * local;
        }
        if extra_length > internode_length {
            Self::grow_root_axis(
                skeleton,
                gravity,
                extra_length - internode_length,
                new_handle,
                config,
                rng,
            );
        }
        true
    }

    fn recompute_root_pose(skeleton: &mut RootSkeleton, config: &RootGrowthConfig) {
        let sorted = skeleton.sorted_node_list().to_vec();
        for &handle in sorted.iter().rev() {
            skeleton.node_mut(handle).data.child_total_biomass = 0.0;
            if skeleton.node(handle).is_end_node() {
                continue;
            }
            let children = skeleton.node(handle).children().to_vec();
            let mut biomass = 0.0;
            let mut max_distance = 0.0f32;
            let mut thickness_collection = 0.0;
            for child in children {
                let child = skeleton.node(child);
                biomass +=
                    child.data.child_total_biomass + child.info.thickness * child.info.length;
                max_distance =
                    max_distance.max(child.data.max_distance_to_any_branch_end + child.info.length);
                thickness_collection += child
                    .info
                    .thickness
                    .powf(1.0 / config.thickness_control_factor);
            }
            let node = skeleton.node_mut(handle);
            node.data.child_total_biomass = biomass;
            node.data.max_distance_to_any_branch_end = max_distance;
            node.info.thickness = node
                .info
                .thickness
                .max(thickness_collection.powf(config.thickness_control_factor));
        }
        skeleton.min = Vec3::splat(f32::MAX);
        skeleton.max = Vec3::splat(f32::MIN);
        for &handle in &sorted {
            match skeleton.node(handle).parent() {
                None => {
                    let node = skeleton.node_mut(handle);
                    node.info.global_position = Vec3::ZERO;
                    node.info.local_rotation = Quat::IDENTITY;
                    // Root frame faces down into the soil.
                    node.info.global_rotation =
                        Quat::from_euler(EulerRot::XYZ, -std::f32::consts::FRAC_PI_2, 0.0, 0.0);
                    node.data.root_distance = node.info.length;
                }
                Some(parent) => {
                    let (parent_rotation, parent_position, parent_length, parent_distance) = {
                        let parent = skeleton.node(parent);
                        (
                            parent.info.global_rotation,
                            parent.info.global_position,
                            parent.info.length,
                            parent.data.root_distance,
                        )
                    };
                    let node = skeleton.node_mut(handle);
                    node.data.root_distance = parent_distance + node.info.length;
                    node.info.global_rotation = parent_rotation * node.info.local_rotation;
                    node.info.global_position =
                        parent_position + parent_length * (parent_rotation * Vec3::NEG_Z);
                }
            }
            let (start, end) = {
                let info = &skeleton.node(handle).info;
                (info.global_position, info.global_end_position())
            };
            skeleton.min = skeleton.min.min(start).min(end);
            skeleton.max = skeleton.max.max(start).max(end);
            skeleton.node_mut(handle).data.age += 1;
        }
    }
}
