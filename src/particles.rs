use std::sync::Arc;

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Generation and spin parameters of the decorative star field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleSettings {
    pub count: usize,
    pub radius: f32,
    pub seed: u64,
    /// Radians per second around the X axis.
    pub rate_x: f32,
    /// Radians per second around the Y axis.
    pub rate_y: f32,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            count: 5000,
            radius: 1.5,
            seed: 0x5EED,
            rate_x: -1.0 / 10.0,
            rate_y: -1.0 / 15.0,
        }
    }
}

/// Points sampled uniformly inside a sphere. Shared, never regenerated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleField {
    points: Arc<[Vec3]>,
    radius: f32,
}

impl ParticleField {
    /// Samples `count` points inside a sphere of `radius`; identical seeds give identical fields.
    pub fn generate(count: usize, radius: f32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let radius = radius.max(0.0);
        let points: Vec<Vec3> = (0..count)
            .map(|_| sample_in_sphere(&mut rng) * radius)
            .collect();
        Self {
            points: points.into(),
            radius,
        }
    }

    pub fn from_settings(settings: &ParticleSettings) -> Self {
        Self::generate(settings.count, settings.radius, settings.seed)
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Cheap handle to the point set for scene nodes.
    pub fn shared_points(&self) -> Arc<[Vec3]> {
        Arc::clone(&self.points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

fn sample_in_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        );
        if candidate.length_squared() <= 1.0 {
            return candidate;
        }
    }
}

/// Rotation of the star field, in radians around X and Y.
pub type RotationAngles = Vec2;

/// Spins the particle field at constant rates, independent of configuration.
#[derive(Debug, Clone)]
pub struct ParticleAnimator {
    rate: Vec2,
    angles: RotationAngles,
}

impl ParticleAnimator {
    pub fn new(rate_x: f32, rate_y: f32) -> Self {
        Self {
            rate: Vec2::new(rate_x, rate_y),
            angles: Vec2::ZERO,
        }
    }

    pub fn from_settings(settings: &ParticleSettings) -> Self {
        Self::new(settings.rate_x, settings.rate_y)
    }

    pub fn angles(&self) -> RotationAngles {
        self.angles
    }

    pub fn update(&mut self, delta: f32) -> RotationAngles {
        if delta.is_finite() && delta > 0.0 {
            self.angles += self.rate * delta;
        }
        self.angles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_points() {
        let a = ParticleField::generate(256, 1.5, 42);
        let b = ParticleField::generate(256, 1.5, 42);
        let c = ParticleField::generate(256, 1.5, 43);
        assert_eq!(a, b);
        assert_ne!(a.points(), c.points());
    }

    #[test]
    fn points_stay_inside_the_sphere() {
        let field = ParticleField::generate(2000, 1.5, 7);
        assert_eq!(field.len(), 2000);
        assert!(field.points().iter().all(|p| p.length() <= 1.5 + 1e-5));
    }

    #[test]
    fn points_fill_the_volume() {
        let field = ParticleField::generate(4000, 1.0, 11);
        let outer = field
            .points()
            .iter()
            .filter(|p| p.length() > 0.5)
            .count() as f32;
        // The shell beyond half the radius holds 7/8 of a uniform ball's volume.
        let share = outer / field.len() as f32;
        assert!((share - 0.875).abs() < 0.03, "outer share {share}");
    }

    #[test]
    fn shared_points_do_not_copy() {
        let field = ParticleField::generate(10, 1.0, 1);
        let handle = field.shared_points();
        assert!(std::ptr::eq(handle.as_ptr(), field.points().as_ptr()));
    }

    #[test]
    fn angles_accumulate_at_independent_rates() {
        let mut animator = ParticleAnimator::new(-0.1, 0.5);
        for _ in 0..60 {
            animator.update(1.0 / 60.0);
        }
        let angles = animator.angles();
        assert!((angles.x + 0.1).abs() < 1e-4);
        assert!((angles.y - 0.5).abs() < 1e-4);
        assert_eq!(animator.update(0.0), angles);
    }
}
