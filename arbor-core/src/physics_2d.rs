//! Constrained 2-D particle simulation used as a circle-packing solver.
//!
//! Particles integrate with a damped Verlet-style update: velocity is never
//! stored, it is derived from the last position delta. The caller supplies
//! accelerations per sub-step through a force callback; pairwise overlap
//! between equal-radius particles is then resolved by symmetric projection.

use glam::{Vec2, Vec4};

use crate::types::ParticleHandle;

#[derive(Debug, Clone)]
pub struct Particle<D> {
    handle: ParticleHandle,
    position: Vec2,
    last_position: Vec2,
    acceleration: Vec2,
    damping: f32,
    color: Vec4,
    pub data: D,
}

impl<D> Particle<D> {
    pub fn handle(&self) -> ParticleHandle {
        self.handle
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Teleports the particle, zeroing its derived velocity.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.last_position = position;
    }

    /// Moves the particle without touching its history; the displacement
    /// shows up as velocity on the next sub-step. Used for constraints.
    pub fn move_to(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Rigid shift of the particle and its history; derived velocity is
    /// preserved.
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
        self.last_position += delta;
    }

    /// Velocity derived from the last displacement over `delta_time`.
    pub fn velocity(&self, delta_time: f32) -> Vec2 {
        (self.position - self.last_position) / delta_time
    }

    pub fn set_velocity(&mut self, velocity: Vec2, delta_time: f32) {
        self.last_position = self.position - velocity * delta_time;
    }

    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    pub fn set_acceleration(&mut self, acceleration: Vec2) {
        self.acceleration = acceleration;
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping.clamp(0.0, 1.0);
    }

    pub fn color(&self) -> Vec4 {
        self.color
    }

    pub fn set_color(&mut self, color: Vec4) {
        self.color = color;
    }

    fn integrate(&mut self, delta_time: f32) {
        let velocity = self.position - self.last_position;
        self.last_position = self.position;
        self.position += velocity * (1.0 - self.damping) + self.acceleration * delta_time * delta_time;
        self.acceleration = Vec2::ZERO;
    }
}

/// Handle-indexed particle pool with a fixed shared radius.
#[derive(Debug, Clone)]
pub struct ParticlePhysics2D<D> {
    particles: Vec<Particle<D>>,
    delta_time: f32,
    pub particle_radius: f32,
}

impl<D: Default> Default for ParticlePhysics2D<D> {
    fn default() -> Self {
        Self::new(0.002)
    }
}

impl<D: Default> ParticlePhysics2D<D> {
    pub fn new(delta_time: f32) -> Self {
        Self {
            particles: Vec::new(),
            delta_time,
            particle_radius: 1.0,
        }
    }

    /// Frees every particle and installs a new sub-step length.
    pub fn reset(&mut self, delta_time: f32) {
        self.particles.clear();
        self.delta_time = delta_time;
    }

    pub fn allocate_particle(&mut self) -> ParticleHandle {
        let handle = self.particles.len();
        self.particles.push(Particle {
            handle,
            position: Vec2::ZERO,
            last_position: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            damping: 0.0,
            color: Vec4::ONE,
            data: D::default(),
        });
        handle
    }
}

impl<D> ParticlePhysics2D<D> {
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn particle(&self, handle: ParticleHandle) -> &Particle<D> {
        &self.particles[handle]
    }

    pub fn particle_mut(&mut self, handle: ParticleHandle) -> &mut Particle<D> {
        &mut self.particles[handle]
    }

    pub fn particles(&self) -> &[Particle<D>] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle<D>] {
        &mut self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Runs `steps` discrete sub-steps. Per sub-step: the force callback
    /// sets each particle's acceleration, positions integrate, then every
    /// overlapping pair separates. Pairs are visited in allocation order so
    /// tie resolution is deterministic.
    pub fn simulate(&mut self, steps: usize, mut force: impl FnMut(&mut Particle<D>)) {
        for _ in 0..steps {
            for particle in &mut self.particles {
                force(particle);
            }
            for particle in &mut self.particles {
                particle.integrate(self.delta_time);
            }
            self.resolve_collisions();
        }
    }

    fn resolve_collisions(&mut self) {
        let diameter = self.particle_radius * 2.0;
        let threshold = diameter * diameter;
        for i in 0..self.particles.len() {
            for j in (i + 1)..self.particles.len() {
                let delta = self.particles[i].position - self.particles[j].position;
                let distance_squared = delta.length_squared();
                if distance_squared >= threshold {
                    continue;
                }
                // Exactly coincident particles separate along a fixed axis.
                let (normal, distance) = if distance_squared > 1e-12 {
                    let distance = distance_squared.sqrt();
                    (delta / distance, distance)
                } else {
                    (Vec2::X, 0.0)
                };
                let correction = normal * (diameter - distance) * 0.5;
                self.particles[i].position += correction;
                self.particles[j].position -= correction;
            }
        }
    }

    /// Fastest particle speed over the last sub-step; the packing loops use
    /// this as their convergence signal.
    pub fn max_particle_velocity(&self) -> f32 {
        self.particles
            .iter()
            .map(|p| (p.position - p.last_position).length() / self.delta_time)
            .fold(0.0, f32::max)
    }

    pub fn mass_center(&self) -> Vec2 {
        if self.particles.is_empty() {
            return Vec2::ZERO;
        }
        self.particles.iter().map(|p| p.position).sum::<Vec2>() / self.particles.len() as f32
    }

    /// Extent of the packed cloud along `direction` (unit vector), measured
    /// from the profile origin. Empty or fully opposite clouds report zero.
    pub fn distance_to_center(&self, direction: Vec2) -> f32 {
        self.particles
            .iter()
            .map(|p| p.position.dot(direction))
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_particles_separate_to_one_diameter() {
        let mut physics: ParticlePhysics2D<()> = ParticlePhysics2D::new(0.01);
        physics.particle_radius = 1.0;
        let a = physics.allocate_particle();
        let b = physics.allocate_particle();
        physics.particle_mut(a).set_position(Vec2::new(-0.25, 0.0));
        physics.particle_mut(a).set_damping(1.0);
        physics.particle_mut(b).set_position(Vec2::new(0.25, 0.0));
        physics.particle_mut(b).set_damping(1.0);

        physics.simulate(100, |_| {});

        let distance = (physics.particle(a).position() - physics.particle(b).position()).length();
        assert!(
            (distance - 2.0).abs() < 1e-4,
            "expected separation of one diameter, got {distance}"
        );
    }

    #[test]
    fn coincident_particles_still_separate() {
        let mut physics: ParticlePhysics2D<()> = ParticlePhysics2D::new(0.01);
        physics.particle_radius = 0.5;
        let a = physics.allocate_particle();
        let b = physics.allocate_particle();
        physics.particle_mut(a).set_damping(1.0);
        physics.particle_mut(b).set_damping(1.0);

        physics.simulate(50, |_| {});

        let distance = (physics.particle(a).position() - physics.particle(b).position()).length();
        assert!((distance - 1.0).abs() < 1e-4);
    }

    #[test]
    fn velocity_is_derived_from_position_delta() {
        let mut physics: ParticlePhysics2D<()> = ParticlePhysics2D::new(0.5);
        let handle = physics.allocate_particle();
        let particle = physics.particle_mut(handle);
        particle.set_position(Vec2::ZERO);
        particle.set_velocity(Vec2::new(2.0, 0.0), 0.5);
        assert_eq!(particle.velocity(0.5), Vec2::new(2.0, 0.0));
        // One undamped, force-free step advances by one velocity increment.
        physics.simulate(1, |_| {});
        assert!(
            (physics.particle(handle).position() - Vec2::new(1.0, 0.0)).length() < 1e-6
        );
    }

    #[test]
    fn damping_bleeds_velocity_out() {
        let mut physics: ParticlePhysics2D<()> = ParticlePhysics2D::new(0.1);
        let handle = physics.allocate_particle();
        physics.particle_mut(handle).set_damping(0.5);
        physics.particle_mut(handle).set_velocity(Vec2::X, 0.1);
        physics.simulate(40, |_| {});
        assert!(physics.max_particle_velocity() < 1e-3);
    }

    #[test]
    fn acceleration_callback_moves_particles() {
        let mut physics: ParticlePhysics2D<()> = ParticlePhysics2D::new(0.1);
        let handle = physics.allocate_particle();
        physics.simulate(10, |p| p.set_acceleration(Vec2::new(0.0, 1.0)));
        assert!(physics.particle(handle).position().y > 0.0);
    }

    #[test]
    fn mass_center_and_directional_extent() {
        let mut physics: ParticlePhysics2D<()> = ParticlePhysics2D::new(0.01);
        let a = physics.allocate_particle();
        let b = physics.allocate_particle();
        physics.particle_mut(a).set_position(Vec2::new(-1.0, 0.0));
        physics.particle_mut(b).set_position(Vec2::new(3.0, 0.0));
        assert_eq!(physics.mass_center(), Vec2::new(1.0, 0.0));
        assert_eq!(physics.distance_to_center(Vec2::X), 3.0);
        assert_eq!(physics.distance_to_center(-Vec2::X), 1.0);
        assert_eq!(physics.distance_to_center(Vec2::Y), 0.0);
    }

    #[test]
    fn reset_frees_all_particles() {
        let mut physics: ParticlePhysics2D<()> = ParticlePhysics2D::new(0.01);
        physics.allocate_particle();
        physics.allocate_particle();
        physics.reset(0.005);
        assert_eq!(physics.particle_count(), 0);
        assert_eq!(physics.delta_time(), 0.005);
    }
}
