use std::f32::consts::{FRAC_PI_2, PI};

use log::debug;

use crate::interpolation::lerp;

/// Model yaw for the front, rear and profile showcase views.
pub const DEFAULT_ROTATIONS: [f32; 3] = [0.0, PI, FRAC_PI_2];

/// Progress gained per second of animation.
pub const DEFAULT_SPEED: f32 = 1.2;

/// Turns the model toward the yaw of the selected showcase view.
#[derive(Debug, Clone)]
pub struct ModelAnimator {
    rotations: Vec<f32>,
    speed: f32,
    current_angle: f32,
    progress: f32,
    target_index: usize,
    visible: bool,
}

impl ModelAnimator {
    pub fn new(rotations: Vec<f32>, speed: f32) -> Self {
        let rotations = if rotations.is_empty() {
            vec![0.0]
        } else {
            rotations
        };
        Self {
            current_angle: rotations[0],
            rotations,
            speed: speed.max(0.0),
            progress: 0.0,
            target_index: 0,
            visible: true,
        }
    }

    pub fn rotation_y(&self) -> f32 {
        self.current_angle
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn rotations(&self) -> &[f32] {
        &self.rotations
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Hidden animators ignore updates entirely, so no time accumulates.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Advances the rotation by `delta` seconds toward `target_index`.
    ///
    /// An index outside the rotation table keeps the previous target. A zero
    /// delta may switch the target but leaves the angle where it is.
    pub fn update(&mut self, delta: f32, target_index: usize) -> f32 {
        if !self.visible {
            return self.current_angle;
        }

        if target_index != self.target_index {
            if target_index < self.rotations.len() {
                if self.progress >= 1.0 {
                    self.progress = 0.0;
                }
                self.target_index = target_index;
            } else {
                debug!(
                    "ignoring showcase view {target_index}; only {} are defined",
                    self.rotations.len()
                );
            }
        }

        if !delta.is_finite() || delta <= 0.0 {
            return self.current_angle;
        }
        self.progress = (self.progress + delta * self.speed).min(1.0);
        let target = self.rotations[self.target_index];
        self.current_angle = if self.progress >= 1.0 {
            target
        } else {
            lerp(self.current_angle, target, self.progress)
        };
        self.current_angle
    }
}

impl Default for ModelAnimator {
    fn default() -> Self {
        Self::new(DEFAULT_ROTATIONS.to_vec(), DEFAULT_SPEED)
    }
}
