use std::collections::BTreeMap;

use glam::{Mat4, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::configuration::MenuId;
use crate::interpolation::{AnimatedVec3, Damping};

/// Distance under which a transition counts as finished.
pub const SETTLE_EPSILON: f32 = 1e-3;

/// Camera placement handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    pub fn looking_at_origin(position: Vec3) -> Self {
        Self {
            position,
            target: Vec3::ZERO,
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Combined projection and view matrix for a vertical field of view in degrees.
    pub fn view_projection(&self, aspect: f32, fov_degrees: f32) -> Mat4 {
        let projection =
            Mat4::perspective_rh(fov_degrees.to_radians(), aspect.max(0.01), 0.1, 100.0);
        projection * self.view()
    }
}

/// Fixed camera positions per menu, plus the overview used when no menu is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewpointTable {
    overview: Vec3,
    viewpoints: BTreeMap<MenuId, Vec3>,
}

impl ViewpointTable {
    pub fn new(overview: Vec3) -> Self {
        Self {
            overview,
            viewpoints: BTreeMap::new(),
        }
    }

    pub fn with_viewpoint(mut self, menu: MenuId, position: Vec3) -> Self {
        self.viewpoints.insert(menu, position);
        self
    }

    pub fn overview(&self) -> Vec3 {
        self.overview
    }

    /// Menus without an entry fall back to the overview position.
    pub fn lookup(&self, menu: Option<MenuId>) -> Vec3 {
        menu.and_then(|menu| self.viewpoints.get(&menu).copied())
            .unwrap_or(self.overview)
    }

    pub fn entries(&self) -> impl Iterator<Item = (MenuId, Vec3)> + '_ {
        self.viewpoints.iter().map(|(menu, position)| (*menu, *position))
    }
}

impl Default for ViewpointTable {
    fn default() -> Self {
        Self::new(Vec3::new(-4.0, 1.0, 5.0))
            .with_viewpoint(MenuId::Body, Vec3::new(4.0, 2.0, 5.0))
            .with_viewpoint(MenuId::Rims, Vec3::new(-2.0, 0.0, 2.0))
            .with_viewpoint(MenuId::Glass, Vec3::new(0.0, 1.6, 4.0))
    }
}

/// Whether the camera is resting or heading somewhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraState {
    Idle { position: Vec3 },
    Transitioning { from: Vec3, toward: Vec3 },
}

/// Drives the camera toward the viewpoint of the active menu.
#[derive(Debug, Clone)]
pub struct CameraController {
    viewpoints: ViewpointTable,
    damping: Damping,
    position: AnimatedVec3,
    menu: Option<MenuId>,
    state: CameraState,
}

impl CameraController {
    /// Starts at rest on the overview position.
    pub fn new(viewpoints: ViewpointTable, damping: Damping) -> Self {
        let start = viewpoints.overview();
        Self {
            viewpoints,
            damping,
            position: AnimatedVec3::new(start),
            menu: None,
            state: CameraState::Idle { position: start },
        }
    }

    pub fn viewpoints(&self) -> &ViewpointTable {
        &self.viewpoints
    }

    pub fn damping(&self) -> Damping {
        self.damping
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::looking_at_origin(self.position.current())
    }

    pub fn desired_position(&self) -> Vec3 {
        self.position.target()
    }

    /// Advances the camera by `delta` seconds toward the viewpoint of `active_menu`.
    pub fn update(&mut self, delta: f32, active_menu: Option<MenuId>) -> CameraPose {
        if active_menu != self.menu {
            let desired = self.viewpoints.lookup(active_menu);
            let from = self.position.current();
            debug!(
                "camera retargeting from {:?} to {:?} for menu {:?}",
                from, desired, active_menu
            );
            self.menu = active_menu;
            self.position.retarget(desired);
            self.state = CameraState::Transitioning {
                from,
                toward: desired,
            };
        }

        self.position.step(delta, &self.damping);

        if let CameraState::Transitioning { toward, .. } = self.state {
            if self.position.is_settled(SETTLE_EPSILON) {
                self.state = CameraState::Idle { position: toward };
            }
        }
        self.pose()
    }
}
