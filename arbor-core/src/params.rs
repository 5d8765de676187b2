//! Growth policy objects.
//!
//! [`TreeGrowthParameters`] is the strategy seam of the shoot growth engine:
//! every coefficient the engine needs is a method taking the current
//! internode as context, so alternate species profiles can be swapped in
//! without touching growth logic. [`TreeGrowthConfig`] is the default
//! table-driven implementation; [`RootGrowthConfig`] and
//! [`PipeModelParameters`] are plain value objects. All three round-trip
//! through YAML field-for-field.

use std::path::Path;

use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::growth::InternodeGrowthData;
use crate::skeleton::Node;

#[derive(Debug, Error)]
pub enum ParameterIoError {
    #[error("failed to read or write parameter file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse parameters: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Mean/variance pair for a gaussian-distributed angle, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanVariance {
    pub mean: f32,
    pub variance: f32,
}

impl MeanVariance {
    pub fn new(mean: f32, variance: f32) -> Self {
        Self { mean, variance }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> f32 {
        Normal::new(self.mean, self.variance)
            .map(|normal| normal.sample(rng))
            .unwrap_or(self.mean)
    }
}

/// Per-node growth coefficients for the shoot system.
///
/// Implementations must be pure apart from the explicit `rng` parameter on
/// the stochastic angle draws.
pub trait TreeGrowthParameters {
    fn lateral_bud_count(&self, node: &Node<InternodeGrowthData>) -> usize;
    /// Angle between a lateral bud's shoot and its parent shoot, degrees.
    fn desired_branching_angle(
        &self,
        node: &Node<InternodeGrowthData>,
        rng: &mut dyn RngCore,
    ) -> f32;
    /// Roll offset between consecutive internodes, degrees.
    fn desired_roll_angle(&self, node: &Node<InternodeGrowthData>, rng: &mut dyn RngCore) -> f32;
    /// Wobble between growth direction and the apical bud, degrees.
    fn desired_apical_angle(&self, node: &Node<InternodeGrowthData>, rng: &mut dyn RngCore) -> f32;
    fn gravitropism(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn phototropism(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn internode_length(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn growth_rate(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn end_node_thickness(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn thickness_control_factor(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn lateral_bud_flushing_probability(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn apical_control(&self, node: &Node<InternodeGrowthData>) -> f32;
    /// How much inhibitor an internode emits.
    fn apical_dominance_base(&self, node: &Node<InternodeGrowthData>) -> f32;
    /// Per-internode decay of the inhibitor travelling rootward.
    fn apical_dominance_decrease(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn apical_bud_kill_probability(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn lateral_bud_kill_probability(&self, node: &Node<InternodeGrowthData>) -> f32;
    /// Relative root-distance below which a low branch self-prunes.
    fn low_branch_pruning(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn sagging(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn shoot_base_resource_requirement(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn shoot_productive_resource_requirement(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn leaf_base_resource_requirement(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn leaf_productive_resource_requirement(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn fruit_base_resource_requirement(&self, node: &Node<InternodeGrowthData>) -> f32;
    fn fruit_productive_resource_requirement(&self, node: &Node<InternodeGrowthData>) -> f32;
}

/// Default shoot growth parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeGrowthConfig {
    pub lateral_bud_count: usize,
    pub branching_angle: MeanVariance,
    pub roll_angle: MeanVariance,
    pub apical_angle: MeanVariance,
    pub gravitropism: f32,
    pub phototropism: f32,
    pub internode_length: f32,
    pub growth_rate: f32,
    pub end_node_thickness: f32,
    pub thickness_control_factor: f32,
    pub lateral_bud_flushing_probability: f32,
    /// Base and distance factor of the apical control exponent.
    pub apical_control_base: f32,
    pub apical_control_distance_factor: f32,
    /// Inhibitor emission: base amount, per-age decay, per-internode decay.
    pub apical_dominance_base: f32,
    pub apical_dominance_age_factor: f32,
    pub apical_dominance_distance_factor: f32,
    pub apical_bud_kill_probability: f32,
    pub lateral_bud_kill_probability: f32,
    pub low_branch_pruning: f32,
    /// Sagging: biomass factor, thickness reduction exponent, cap.
    pub sagging_factor: f32,
    pub sagging_thickness_reduction: f32,
    pub sagging_max: f32,
    pub shoot_base_resource_requirement: f32,
    pub shoot_productive_resource_requirement: f32,
    pub leaf_base_resource_requirement: f32,
    pub leaf_productive_resource_requirement: f32,
    pub fruit_base_resource_requirement: f32,
    pub fruit_productive_resource_requirement: f32,
}

impl Default for TreeGrowthConfig {
    fn default() -> Self {
        Self {
            lateral_bud_count: 2,
            branching_angle: MeanVariance::new(30.0, 3.0),
            roll_angle: MeanVariance::new(120.0, 2.0),
            apical_angle: MeanVariance::new(0.0, 4.0),
            gravitropism: -0.1,
            phototropism: 0.05,
            internode_length: 1.0,
            growth_rate: 1.0,
            end_node_thickness: 0.01,
            thickness_control_factor: 0.5,
            lateral_bud_flushing_probability: 0.3,
            apical_control_base: 1.1,
            apical_control_distance_factor: 0.95,
            apical_dominance_base: 0.12,
            apical_dominance_age_factor: 1.0,
            apical_dominance_distance_factor: 0.3,
            apical_bud_kill_probability: 0.0,
            lateral_bud_kill_probability: 0.03,
            low_branch_pruning: 0.2,
            sagging_factor: 6.0,
            sagging_thickness_reduction: 3.0,
            sagging_max: 0.5,
            shoot_base_resource_requirement: 1.0,
            shoot_productive_resource_requirement: 1.0,
            leaf_base_resource_requirement: 1.0,
            leaf_productive_resource_requirement: 1.0,
            fruit_base_resource_requirement: 1.0,
            fruit_productive_resource_requirement: 1.0,
        }
    }
}

impl TreeGrowthParameters for TreeGrowthConfig {
    fn lateral_bud_count(&self, _node: &Node<InternodeGrowthData>) -> usize {
        self.lateral_bud_count
    }

    fn desired_branching_angle(
        &self,
        _node: &Node<InternodeGrowthData>,
        rng: &mut dyn RngCore,
    ) -> f32 {
        self.branching_angle.sample(rng)
    }

    fn desired_roll_angle(&self, _node: &Node<InternodeGrowthData>, rng: &mut dyn RngCore) -> f32 {
        self.roll_angle.sample(rng)
    }

    fn desired_apical_angle(
        &self,
        _node: &Node<InternodeGrowthData>,
        rng: &mut dyn RngCore,
    ) -> f32 {
        self.apical_angle.sample(rng)
    }

    fn gravitropism(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.gravitropism
    }

    fn phototropism(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.phototropism
    }

    fn internode_length(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.internode_length
    }

    fn growth_rate(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.growth_rate
    }

    fn end_node_thickness(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.end_node_thickness
    }

    fn thickness_control_factor(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.thickness_control_factor
    }

    fn lateral_bud_flushing_probability(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.lateral_bud_flushing_probability
    }

    /// Stronger near the root: trunks stay dominant, outer crown relaxes.
    fn apical_control(&self, node: &Node<InternodeGrowthData>) -> f32 {
        let distance = node.data.root_distance.max(f32::EPSILON);
        self.apical_control_base
            .powf((self.apical_control_distance_factor / distance).max(1.0))
    }

    fn apical_dominance_base(&self, node: &Node<InternodeGrowthData>) -> f32 {
        self.apical_dominance_base * self.apical_dominance_age_factor.powi(node.data.age as i32)
    }

    fn apical_dominance_decrease(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.apical_dominance_distance_factor
    }

    fn apical_bud_kill_probability(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.apical_bud_kill_probability
    }

    fn lateral_bud_kill_probability(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.lateral_bud_kill_probability
    }

    fn low_branch_pruning(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.low_branch_pruning
    }

    fn sagging(&self, node: &Node<InternodeGrowthData>) -> f32 {
        let thickness_ratio = (node.info.thickness / self.end_node_thickness).max(f32::EPSILON);
        let sagging = self.sagging_factor
            * (node.data.child_total_biomass + node.data.extra_mass)
            / thickness_ratio.powf(self.sagging_thickness_reduction);
        node.data.sagging.max(sagging.min(self.sagging_max))
    }

    fn shoot_base_resource_requirement(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.shoot_base_resource_requirement
    }

    fn shoot_productive_resource_requirement(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.shoot_productive_resource_requirement
    }

    fn leaf_base_resource_requirement(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.leaf_base_resource_requirement
    }

    fn leaf_productive_resource_requirement(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.leaf_productive_resource_requirement
    }

    fn fruit_base_resource_requirement(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.fruit_base_resource_requirement
    }

    fn fruit_productive_resource_requirement(&self, _node: &Node<InternodeGrowthData>) -> f32 {
        self.fruit_productive_resource_requirement
    }
}

/// Growth parameter table for the root system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootGrowthConfig {
    pub root_internode_length: f32,
    pub growth_rate: f32,
    /// Positive values steer root tips toward gravity.
    pub gravitropism: f32,
    pub branching_probability: f32,
    pub branching_angle: MeanVariance,
    pub apical_angle: MeanVariance,
    pub end_node_thickness: f32,
    pub thickness_control_factor: f32,
}

impl Default for RootGrowthConfig {
    fn default() -> Self {
        Self {
            root_internode_length: 0.5,
            growth_rate: 0.8,
            gravitropism: 0.2,
            branching_probability: 0.1,
            branching_angle: MeanVariance::new(60.0, 5.0),
            apical_angle: MeanVariance::new(0.0, 3.0),
            end_node_thickness: 0.01,
            thickness_control_factor: 0.5,
        }
    }
}

/// Tuning knobs for the pipe-model build and cross-section relaxation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeModelParameters {
    /// Radius of one strand's footprint within a profile.
    pub profile_cell_radius: f32,
    /// Physics sub-step length for the packing simulation.
    pub delta_time: f32,
    pub damping: f32,
    /// Strength of the center-seeking force during packing.
    pub gravity_strength: f32,
    /// Iteration cap per profile: this factor times the cell count.
    pub simulation_iteration_cell_factor: usize,
    pub minimum_simulation_iteration: usize,
    /// Packing stops early once the fastest particle drops below this speed.
    pub particle_stabilize_speed: f32,
}

impl Default for PipeModelParameters {
    fn default() -> Self {
        Self {
            profile_cell_radius: 1.0,
            delta_time: 0.002,
            damping: 0.05,
            gravity_strength: 1.0,
            simulation_iteration_cell_factor: 5,
            minimum_simulation_iteration: 20,
            particle_stabilize_speed: 0.01,
        }
    }
}

pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, ParameterIoError> {
    Ok(serde_yaml::to_string(value)?)
}

pub fn from_yaml_str<T: DeserializeOwned>(text: &str) -> Result<T, ParameterIoError> {
    Ok(serde_yaml::from_str(text)?)
}

pub fn save_parameters<T: Serialize>(value: &T, path: &Path) -> Result<(), ParameterIoError> {
    std::fs::write(path, to_yaml_string(value)?)?;
    Ok(())
}

pub fn load_parameters<T: DeserializeOwned>(path: &Path) -> Result<T, ParameterIoError> {
    from_yaml_str(&std::fs::read_to_string(path)?)
}
