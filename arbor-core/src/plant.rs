//! Plant instances and batch growth.
//!
//! A [`Plant`] couples one [`TreeModel`] with its environment sources and a
//! seeded random stream. [`PlantGroup`] grows many independent plants with
//! a data-parallel loop; each plant's skeletons are only ever mutated
//! sequentially by their own step.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::environment::{LightField, SoilField};
use crate::error::GrowthError;
use crate::growth::{GrowthNutrients, TreeModel};
use crate::params::{RootGrowthConfig, TreeGrowthParameters};

pub struct Plant {
    pub model: TreeModel,
    pub soil: Option<Arc<dyn SoilField>>,
    pub climate: Option<Arc<dyn LightField>>,
    rng: StdRng,
}

impl Plant {
    pub fn new<P: TreeGrowthParameters>(
        seed: u64,
        params: &P,
        root_config: &RootGrowthConfig,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let model = TreeModel::new(params, root_config, &mut rng);
        Self {
            model,
            soil: None,
            climate: None,
            rng,
        }
    }

    /// One growth step: samples the environment, then advances the model.
    /// Fails without touching the plant when soil or climate is missing.
    pub fn grow_step<P: TreeGrowthParameters>(
        &mut self,
        params: &P,
        root_config: &RootGrowthConfig,
    ) -> Result<bool, GrowthError> {
        let soil = self.soil.as_ref().ok_or(GrowthError::MissingSoil)?.clone();
        let climate = self
            .climate
            .as_ref()
            .ok_or(GrowthError::MissingClimate)?
            .clone();

        // Illumination is sampled per node before the step runs.
        let skeleton = &mut self.model.shoot_skeleton;
        skeleton.sort_lists();
        for handle in skeleton.sorted_node_list().to_vec() {
            let position = skeleton.node(handle).info.global_position;
            let sample = climate.sample(position);
            let data = &mut skeleton.node_mut(handle).data;
            data.light_direction = sample.direction;
            data.light_intensity = sample.intensity;
        }

        let base = self.model.shoot_skeleton.node(0).info.global_position;
        let nutrients = GrowthNutrients {
            water: soil.water(base),
        };
        Ok(self
            .model
            .grow(&nutrients, params, root_config, &mut self.rng))
    }
}

#[derive(Default)]
pub struct PlantGroup {
    pub plants: Vec<Plant>,
}

impl PlantGroup {
    /// Grows every plant by one step in parallel. Returns how many plants
    /// changed structurally, or the first precondition failure.
    pub fn grow_all<P: TreeGrowthParameters + Sync>(
        &mut self,
        params: &P,
        root_config: &RootGrowthConfig,
    ) -> Result<usize, GrowthError> {
        let results: Result<Vec<bool>, GrowthError> = self
            .plants
            .par_iter_mut()
            .map(|plant| plant.grow_step(params, root_config))
            .collect();
        Ok(results?.into_iter().filter(|&changed| changed).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{DirectionalLight, UniformSoil};
    use crate::params::TreeGrowthConfig;

    fn quiet_config() -> TreeGrowthConfig {
        let mut config = TreeGrowthConfig::default();
        config.lateral_bud_kill_probability = 0.0;
        config
    }

    #[test]
    fn grow_step_without_soil_fails_and_leaves_the_plant_unchanged() {
        let config = quiet_config();
        let root_config = RootGrowthConfig::default();
        let mut plant = Plant::new(1, &config, &root_config);
        plant.climate = Some(Arc::new(DirectionalLight::default()));

        let before = plant.model.shoot_skeleton.node_count();
        let result = plant.grow_step(&config, &root_config);
        assert_eq!(result, Err(GrowthError::MissingSoil));
        assert_eq!(plant.model.shoot_skeleton.node_count(), before);
    }

    #[test]
    fn grow_step_without_climate_fails() {
        let config = quiet_config();
        let root_config = RootGrowthConfig::default();
        let mut plant = Plant::new(1, &config, &root_config);
        plant.soil = Some(Arc::new(UniformSoil { water: 1.0 }));
        assert_eq!(
            plant.grow_step(&config, &root_config),
            Err(GrowthError::MissingClimate)
        );
    }

    #[test]
    fn plants_with_environment_attached_grow() {
        let config = quiet_config();
        let root_config = RootGrowthConfig::default();
        let mut plant = Plant::new(42, &config, &root_config);
        plant.soil = Some(Arc::new(UniformSoil { water: 1.0 }));
        plant.climate = Some(Arc::new(DirectionalLight::default()));

        for _ in 0..5 {
            plant.grow_step(&config, &root_config).unwrap();
        }
        assert!(plant.model.shoot_skeleton.node_count() > 1);
    }

    #[test]
    fn identical_seeds_grow_identical_trees() {
        let config = quiet_config();
        let root_config = RootGrowthConfig::default();
        let soil: Arc<dyn SoilField> = Arc::new(UniformSoil { water: 1.0 });
        let climate: Arc<dyn LightField> = Arc::new(DirectionalLight::default());

        let mut first = Plant::new(7, &config, &root_config);
        first.soil = Some(soil.clone());
        first.climate = Some(climate.clone());
        let mut second = Plant::new(7, &config, &root_config);
        second.soil = Some(soil);
        second.climate = Some(climate);

        for _ in 0..6 {
            first.grow_step(&config, &root_config).unwrap();
            second.grow_step(&config, &root_config).unwrap();
        }
        assert_eq!(
            first.model.shoot_skeleton.node_count(),
            second.model.shoot_skeleton.node_count()
        );
        assert_eq!(
            first.model.root_skeleton.node_count(),
            second.model.root_skeleton.node_count()
        );
    }

    #[test]
    fn plant_group_grows_every_member() {
        let config = quiet_config();
        let root_config = RootGrowthConfig::default();
        let soil: Arc<dyn SoilField> = Arc::new(UniformSoil { water: 1.0 });
        let climate: Arc<dyn LightField> = Arc::new(DirectionalLight::default());

        let mut group = PlantGroup::default();
        for seed in 0..4 {
            let mut plant = Plant::new(seed, &config, &root_config);
            plant.soil = Some(soil.clone());
            plant.climate = Some(climate.clone());
            group.plants.push(plant);
        }
        // The first step only charges each tip's internode; the second one
        // overflows it and every tree gains nodes.
        group.grow_all(&config, &root_config).unwrap();
        let changed = group.grow_all(&config, &root_config).unwrap();
        assert_eq!(changed, 4);
        for plant in &group.plants {
            assert!(plant.model.shoot_skeleton.node_count() > 1);
        }
    }
}
