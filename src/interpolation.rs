//! Easing helpers shared by every animated quantity.
//!
//! Two damping policies are available. Exponential smoothing moves a fixed
//! fraction `1 - exp(-rate * dt)` of the remaining distance per tick. The
//! spring policy advances a mass/tension/friction oscillator with its
//! closed-form solution, which stays bounded for any finite time step.

use std::ops::{Add, Mul, Sub};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Values that can be blended and measured.
pub trait Interpolate:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self>
{
    const ZERO: Self;

    fn distance(self, other: Self) -> f32;
}

impl Interpolate for f32 {
    const ZERO: Self = 0.0;

    fn distance(self, other: Self) -> f32 {
        (self - other).abs()
    }
}

impl Interpolate for Vec2 {
    const ZERO: Self = Vec2::ZERO;

    fn distance(self, other: Self) -> f32 {
        Vec2::distance(self, other)
    }
}

impl Interpolate for Vec3 {
    const ZERO: Self = Vec3::ZERO;

    fn distance(self, other: Self) -> f32 {
        Vec3::distance(self, other)
    }
}

/// Linear interpolation; `t` is not clamped.
pub fn lerp<T: Interpolate>(from: T, to: T, t: f32) -> T {
    from + (to - from) * t
}

/// Fraction of the remaining distance covered in `dt` seconds.
pub fn exponential_factor(rate: f32, dt: f32) -> f32 {
    if dt <= 0.0 || rate <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate * dt).exp()
}

/// Mass/tension/friction constants of a damped spring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpringConfig {
    pub mass: f32,
    pub tension: f32,
    pub friction: f32,
}

impl SpringConfig {
    /// Spring whose friction gives exactly critical damping.
    pub fn critically_damped(mass: f32, tension: f32) -> Self {
        Self {
            mass,
            tension,
            friction: 2.0 * (tension * mass).sqrt(),
        }
    }

    pub fn angular_frequency(&self) -> f32 {
        (self.tension / self.mass).sqrt()
    }

    pub fn damping_ratio(&self) -> f32 {
        self.friction / (2.0 * (self.tension * self.mass).sqrt())
    }

    /// Whether friction is at least the critical amount, so the spring never
    /// overshoots its rest point.
    pub fn is_overshoot_free(&self) -> bool {
        self.damping_ratio() >= 1.0 - 1e-4
    }

    /// Exponential rate, per second, of the slowest decaying mode.
    pub fn decay_rate(&self) -> f32 {
        let omega = self.angular_frequency();
        let zeta = self.damping_ratio();
        if zeta <= 1.0 {
            zeta * omega
        } else {
            omega * (zeta - (zeta * zeta - 1.0).sqrt())
        }
    }

    /// Coefficients `(a, b, c, d)` such that after `t` seconds the offset from
    /// the rest point is `a * x0 + b * v0` and the velocity is `c * x0 + d * v0`.
    fn propagate(&self, t: f32) -> (f32, f32, f32, f32) {
        let omega = self.angular_frequency();
        let zeta = self.damping_ratio();
        if (zeta - 1.0).abs() < 1e-4 {
            let decay = (-omega * t).exp();
            (
                (1.0 + omega * t) * decay,
                t * decay,
                -omega * omega * t * decay,
                (1.0 - omega * t) * decay,
            )
        } else if zeta < 1.0 {
            let omega_d = omega * (1.0 - zeta * zeta).sqrt();
            let decay = (-zeta * omega * t).exp();
            let (sin, cos) = (omega_d * t).sin_cos();
            (
                decay * (cos + zeta * omega / omega_d * sin),
                decay * sin / omega_d,
                -decay * omega * omega / omega_d * sin,
                decay * (cos - zeta * omega / omega_d * sin),
            )
        } else {
            let root = (zeta * zeta - 1.0).sqrt();
            let r1 = -omega * (zeta - root);
            let r2 = -omega * (zeta + root);
            let e1 = (r1 * t).exp();
            let e2 = (r2 * t).exp();
            let span = r2 - r1;
            (
                (r2 * e1 - r1 * e2) / span,
                (e2 - e1) / span,
                r1 * r2 * (e1 - e2) / span,
                (r2 * e2 - r1 * e1) / span,
            )
        }
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self::critically_damped(1.0, 170.0)
    }
}

/// How an [`Animated`] value approaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Damping {
    Exponential { rate: f32 },
    Spring(SpringConfig),
}

impl Default for Damping {
    fn default() -> Self {
        Damping::Exponential { rate: 5.0 }
    }
}

/// A value that is continuously driven toward a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Animated<T> {
    current: T,
    velocity: T,
    target: T,
}

pub type AnimatedScalar = Animated<f32>;
pub type AnimatedVec3 = Animated<Vec3>;

impl<T: Interpolate> Animated<T> {
    /// Starts at rest on `value`.
    pub fn new(value: T) -> Self {
        Self {
            current: value,
            velocity: T::ZERO,
            target: value,
        }
    }

    pub fn current(&self) -> T {
        self.current
    }

    pub fn velocity(&self) -> T {
        self.velocity
    }

    pub fn target(&self) -> T {
        self.target
    }

    /// Changes the target; the current value and velocity carry over.
    pub fn retarget(&mut self, target: T) {
        self.target = target;
    }

    /// Teleports to `value` and comes to rest there.
    pub fn snap(&mut self, value: T) {
        *self = Self::new(value);
    }

    pub fn is_settled(&self, epsilon: f32) -> bool {
        self.current.distance(self.target) <= epsilon
            && self.velocity.distance(T::ZERO) <= epsilon
    }

    /// Advances by `dt` seconds and returns the new current value.
    pub fn step(&mut self, dt: f32, damping: &Damping) -> T {
        if !dt.is_finite() || dt <= 0.0 {
            return self.current;
        }
        match damping {
            Damping::Exponential { rate } => {
                let previous = self.current;
                self.current = lerp(self.current, self.target, exponential_factor(*rate, dt));
                self.velocity = (self.current - previous) * (1.0 / dt);
            }
            Damping::Spring(spring) => {
                let (a, b, c, d) = spring.propagate(dt);
                let offset = self.current - self.target;
                let velocity = self.velocity;
                self.current = self.target + offset * a + velocity * b;
                self.velocity = offset * c + velocity * d;
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(value: &mut AnimatedScalar, damping: &Damping, ticks: usize, dt: f32) -> Vec<f32> {
        (0..ticks).map(|_| value.step(dt, damping)).collect()
    }

    #[test]
    fn lerp_hits_endpoints() {
        assert_eq!(lerp(2.0_f32, 6.0, 0.0), 2.0);
        assert_eq!(lerp(2.0_f32, 6.0, 1.0), 6.0);
        assert_eq!(lerp(Vec3::ZERO, Vec3::ONE, 0.5), Vec3::splat(0.5));
    }

    #[test]
    fn exponential_factor_is_bounded() {
        assert_eq!(exponential_factor(5.0, 0.0), 0.0);
        assert!(exponential_factor(5.0, 1.0 / 60.0) > 0.0);
        assert!(exponential_factor(5.0, 1.0e6) <= 1.0);
    }

    #[test]
    fn exponential_converges_without_overshoot() {
        let mut value = AnimatedScalar::new(0.0);
        value.retarget(10.0);
        let samples = run(&mut value, &Damping::Exponential { rate: 5.0 }, 180, 1.0 / 60.0);
        assert!(samples.windows(2).all(|w| w[1] >= w[0]));
        assert!(samples.iter().all(|v| *v <= 10.0 + 1e-4));
        assert!((value.current() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn critical_spring_converges_without_overshoot() {
        let mut value = AnimatedScalar::new(0.0);
        value.retarget(1.0);
        let damping = Damping::Spring(SpringConfig::default());
        let samples = run(&mut value, &damping, 240, 1.0 / 60.0);
        assert!(samples.iter().all(|v| *v <= 1.0 + 1e-4));
        assert!(value.is_settled(1e-3));
    }

    #[test]
    fn spring_stays_finite_for_huge_steps() {
        for friction in [5.0, 26.07, 80.0] {
            let damping = Damping::Spring(SpringConfig {
                mass: 1.0,
                tension: 170.0,
                friction,
            });
            let mut value = AnimatedVec3::new(Vec3::new(-4.0, 1.0, 5.0));
            value.retarget(Vec3::new(-2.0, 0.0, 2.0));
            let end = value.step(1.0e4, &damping);
            assert!(end.is_finite());
            assert!(end.distance(Vec3::new(-2.0, 0.0, 2.0)) < 1e-3);
        }
    }

    #[test]
    fn retarget_keeps_current_value() {
        let mut value = AnimatedScalar::new(0.0);
        value.retarget(1.0);
        let damping = Damping::default();
        run(&mut value, &damping, 10, 1.0 / 60.0);
        let before = value.current();
        value.retarget(-1.0);
        assert_eq!(value.current(), before);
        assert_eq!(value.target(), -1.0);
    }

    #[test]
    fn non_positive_steps_do_nothing() {
        let mut value = AnimatedScalar::new(3.0);
        value.retarget(5.0);
        assert_eq!(value.step(0.0, &Damping::default()), 3.0);
        assert_eq!(value.step(-1.0, &Damping::default()), 3.0);
        assert_eq!(value.step(f32::NAN, &Damping::default()), 3.0);
    }

    #[test]
    fn spring_decay_rate_tracks_damping() {
        let critical = SpringConfig::default();
        assert!(critical.is_overshoot_free());
        assert!((critical.decay_rate() - critical.angular_frequency()).abs() < 1e-3);

        let loose = SpringConfig {
            friction: 2.0,
            ..critical
        };
        assert!(!loose.is_overshoot_free());
        assert!((loose.decay_rate() - 1.0).abs() < 1e-4);

        let sluggish = SpringConfig {
            friction: 2000.0,
            ..critical
        };
        assert!(sluggish.is_overshoot_free());
        assert!(sluggish.decay_rate() < 0.1);
    }
}
