use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::camera::ViewpointTable;
use crate::clock::DEFAULT_MAX_DELTA;
use crate::color::Color;
use crate::configuration::{ConfigurationState, MenuId};
use crate::error::SettingsError;
use crate::interpolation::{Damping, SpringConfig};
use crate::model_animator::{DEFAULT_ROTATIONS, DEFAULT_SPEED};
use crate::particles::ParticleSettings;
use crate::scene::StageSettings;

/// Slowest camera convergence accepted from a settings document, per second.
pub const MIN_CAMERA_RATE: f32 = 0.5;

/// Upper bound on the generated star field.
pub const MAX_PARTICLES: usize = 1_000_000;

/// Named color offered by a picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swatch {
    pub name: String,
    pub color: Color,
}

impl Swatch {
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

/// Swatches offered for each configurable attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palettes {
    pub body: Vec<Swatch>,
    pub rims: Vec<Swatch>,
    pub glass: Vec<Swatch>,
}

impl Palettes {
    pub fn for_menu(&self, menu: MenuId) -> &[Swatch] {
        match menu {
            MenuId::Body => &self.body,
            MenuId::Rims => &self.rims,
            MenuId::Glass => &self.glass,
        }
    }

    fn for_menu_mut(&mut self, menu: MenuId) -> &mut Vec<Swatch> {
        match menu {
            MenuId::Body => &mut self.body,
            MenuId::Rims => &mut self.rims,
            MenuId::Glass => &mut self.glass,
        }
    }
}

impl Default for Palettes {
    fn default() -> Self {
        Self {
            body: vec![
                Swatch::new("Red", Color::rgb(0xFF, 0x00, 0x00)),
                Swatch::new("Metallic Black", Color::rgb(0x1E, 0x1E, 0x1E)),
                Swatch::new("Pearl White", Color::rgb(0xFF, 0xFF, 0xFF)),
                Swatch::new("Midnight Blue", Color::rgb(0x00, 0x00, 0x80)),
                Swatch::new("Metallic Grey", Color::rgb(0x80, 0x80, 0x80)),
                Swatch::new("Racing Green", Color::rgb(0x00, 0x64, 0x00)),
                Swatch::new("Metallic Orange", Color::rgb(0xFF, 0x45, 0x00)),
            ],
            rims: vec![
                Swatch::new("Chrome", Color::rgb(0xC0, 0xC0, 0xC0)),
                Swatch::new("Gloss Black", Color::rgb(0x11, 0x11, 0x11)),
                Swatch::new("Gold", Color::rgb(0xD4, 0xAF, 0x37)),
                Swatch::new("Gunmetal", Color::rgb(0x2A, 0x34, 0x39)),
            ],
            glass: vec![
                Swatch::new("Smoke", Color::rgb(0x33, 0x33, 0x33)),
                Swatch::new("Bronze", Color::rgb(0x8C, 0x6A, 0x3F)),
                Swatch::new("Deep Blue", Color::rgb(0x1F, 0x3A, 0x5F)),
            ],
        }
    }
}

/// Turntable yaw per showcase view and the speed of the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurntableSettings {
    /// Radians.
    pub rotations: Vec<f32>,
    pub speed: f32,
}

impl Default for TurntableSettings {
    fn default() -> Self {
        Self {
            rotations: DEFAULT_ROTATIONS.to_vec(),
            speed: DEFAULT_SPEED,
        }
    }
}

/// Every tunable of the configurator view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguratorSettings {
    pub palettes: Palettes,
    pub viewpoints: ViewpointTable,
    pub damping: Damping,
    pub turntable: TurntableSettings,
    pub particles: ParticleSettings,
    pub max_delta: f32,
    pub stage: StageSettings,
}

impl Default for ConfiguratorSettings {
    fn default() -> Self {
        Self {
            palettes: Palettes::default(),
            viewpoints: ViewpointTable::default(),
            damping: Damping::default(),
            turntable: TurntableSettings::default(),
            particles: ParticleSettings::default(),
            max_delta: DEFAULT_MAX_DELTA,
            stage: StageSettings::default(),
        }
    }
}

impl ConfiguratorSettings {
    /// Parses a `<configurator>` document. Elements that are absent keep their defaults.
    pub fn from_xml(xml: &str) -> Result<Self, SettingsError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("configurator") {
            return Err(SettingsError::UnexpectedRoot(
                root.tag_name().name().to_string(),
            ));
        }

        let mut settings = Self::default();

        for node in children(root, "palette") {
            let kind = required_attribute(&node, "kind")?;
            let menu = MenuId::from_name(kind)
                .ok_or_else(|| SettingsError::UnknownMenu(kind.to_string()))?;
            let mut swatches = Vec::new();
            for swatch in children(node, "swatch") {
                let name = required_attribute(&swatch, "name")?;
                let color = parse_color("swatch color", required_attribute(&swatch, "color")?)?;
                swatches.push(Swatch::new(name, color));
            }
            if swatches.is_empty() {
                return Err(SettingsError::EmptyPalette(menu.name()));
            }
            *settings.palettes.for_menu_mut(menu) = swatches;
        }

        let mut viewpoints = ViewpointTable::new(settings.viewpoints.overview());
        let mut custom_viewpoints = false;
        if let Some(node) = children(root, "overview").next() {
            viewpoints = ViewpointTable::new(parse_vec3("overview", node.text().unwrap_or(""))?);
            custom_viewpoints = true;
        }
        let mut table: Vec<(MenuId, Vec3)> = settings.viewpoints.entries().collect();
        for node in children(root, "viewpoint") {
            let menu_name = required_attribute(&node, "menu")?;
            let menu = MenuId::from_name(menu_name)
                .ok_or_else(|| SettingsError::UnknownMenu(menu_name.to_string()))?;
            let position = parse_vec3("viewpoint", node.text().unwrap_or(""))?;
            table.retain(|(existing, _)| *existing != menu);
            table.push((menu, position));
            custom_viewpoints = true;
        }
        if custom_viewpoints {
            settings.viewpoints = table
                .into_iter()
                .fold(viewpoints, |acc, (menu, position)| {
                    acc.with_viewpoint(menu, position)
                });
        }

        if let Some(node) = children(root, "camera").next() {
            settings.damping = parse_damping(&node, settings.damping)?;
        }

        if let Some(node) = children(root, "turntable").next() {
            let turntable = &mut settings.turntable;
            turntable.speed = attribute_f32(&node, "speed", turntable.speed)?;
            if turntable.speed <= 0.0 {
                return Err(invalid("turntable speed", turntable.speed.to_string()));
            }
            if let Some(angles) = node.attribute("angles") {
                let rotations = angles
                    .split_whitespace()
                    .map(|angle| parse_f32("turntable angle", angle).map(f32::to_radians))
                    .collect::<Result<Vec<_>, _>>()?;
                if rotations.is_empty() {
                    return Err(invalid("turntable angles", angles));
                }
                turntable.rotations = rotations;
            }
        }

        if let Some(node) = children(root, "particles").next() {
            let particles = &mut settings.particles;
            if let Some(count) = node.attribute("count") {
                particles.count = count
                    .trim()
                    .parse()
                    .ok()
                    .filter(|count| *count <= MAX_PARTICLES)
                    .ok_or_else(|| invalid("particle count", count))?;
            }
            if let Some(seed) = node.attribute("seed") {
                particles.seed = parse_seed(seed)?;
            }
            particles.radius = attribute_f32(&node, "radius", particles.radius)?;
            particles.rate_x = attribute_f32(&node, "rate-x", particles.rate_x)?;
            particles.rate_y = attribute_f32(&node, "rate-y", particles.rate_y)?;
        }

        if let Some(node) = children(root, "clock").next() {
            settings.max_delta = attribute_f32(&node, "max-delta", settings.max_delta)?;
            if settings.max_delta <= 0.0 {
                return Err(invalid("clock max-delta", settings.max_delta.to_string()));
            }
        }

        if let Some(node) = children(root, "stage").next() {
            let stage = &mut settings.stage;
            stage.background = attribute_color(&node, "background", stage.background)?;
            stage.fog_near = attribute_f32(&node, "fog-near", stage.fog_near)?;
            stage.fog_far = attribute_f32(&node, "fog-far", stage.fog_far)?;
            stage.floor.color = attribute_color(&node, "floor", stage.floor.color)?;
            stage.particle_color = attribute_color(&node, "particles", stage.particle_color)?;
        }

        Ok(settings)
    }

    /// Initial configuration: first body swatch, no rim or glass override.
    pub fn initial_state(&self) -> ConfigurationState {
        let body = self
            .palettes
            .body
            .first()
            .map_or(Color::rgb(0xFF, 0x00, 0x00), |swatch| swatch.color);
        ConfigurationState::new(body)
    }
}

fn parse_damping(node: &Node<'_, '_>, current: Damping) -> Result<Damping, SettingsError> {
    let kind = node.attribute("damping").map(str::trim);
    match kind {
        None | Some("exponential") => {
            let fallback = match current {
                Damping::Exponential { rate } => rate,
                Damping::Spring(_) => 5.0,
            };
            let rate = attribute_f32(node, "rate", fallback)?;
            if rate < MIN_CAMERA_RATE {
                return Err(invalid("camera rate", rate.to_string()));
            }
            Ok(Damping::Exponential { rate })
        }
        Some("spring") => {
            let fallback = match current {
                Damping::Spring(config) => config,
                Damping::Exponential { .. } => SpringConfig::default(),
            };
            let config = SpringConfig {
                mass: attribute_f32(node, "mass", fallback.mass)?,
                tension: attribute_f32(node, "tension", fallback.tension)?,
                friction: attribute_f32(node, "friction", fallback.friction)?,
            };
            if config.mass <= 0.0 || config.tension <= 0.0 || config.friction < 0.0 {
                return Err(invalid("camera spring", format!("{config:?}")));
            }
            if !config.is_overshoot_free() {
                return Err(invalid(
                    "camera spring friction (below critical damping)",
                    config.friction.to_string(),
                ));
            }
            if config.decay_rate() < MIN_CAMERA_RATE {
                return Err(invalid(
                    "camera spring (settles too slowly)",
                    format!("{config:?}"),
                ));
            }
            Ok(Damping::Spring(config))
        }
        Some(other) => Err(invalid("camera damping", other)),
    }
}

fn children<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |child| child.has_tag_name(tag))
}

fn required_attribute<'a>(node: &Node<'a, '_>, attribute: &str) -> Result<&'a str, SettingsError> {
    node.attribute(attribute)
        .map(str::trim)
        .ok_or_else(|| SettingsError::MissingAttribute {
            tag: node.tag_name().name().to_string(),
            attribute: attribute.to_string(),
        })
}

fn attribute_f32(node: &Node<'_, '_>, attribute: &str, default: f32) -> Result<f32, SettingsError> {
    match node.attribute(attribute) {
        Some(value) => parse_f32(attribute, value),
        None => Ok(default),
    }
}

fn attribute_color(
    node: &Node<'_, '_>,
    attribute: &str,
    default: Color,
) -> Result<Color, SettingsError> {
    match node.attribute(attribute) {
        Some(value) => parse_color(attribute, value),
        None => Ok(default),
    }
}

fn parse_f32(field: &str, value: &str) -> Result<f32, SettingsError> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| invalid(field, value))
}

fn parse_seed(value: &str) -> Result<u64, SettingsError> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| invalid("particle seed", value))
}

fn parse_color(field: &str, value: &str) -> Result<Color, SettingsError> {
    Color::parse(value).map_err(|source| SettingsError::Color {
        field: field.to_string(),
        source,
    })
}

fn parse_vec3(field: &str, value: &str) -> Result<Vec3, SettingsError> {
    let components = value
        .split_whitespace()
        .map(|component| parse_f32(field, component))
        .collect::<Result<Vec<_>, _>>()?;
    match components.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(invalid(field, value.trim())),
    }
}

fn invalid(field: &str, value: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraController;

    const SAMPLE: &str = r##"
    <configurator>
        <palette kind="rims">
            <swatch name="Bronze" color="#8C6A3F"/>
            <swatch name="Satin" color="200 200 200"/>
        </palette>
        <overview>-5 1.5 6</overview>
        <viewpoint menu="glass">0 2 3</viewpoint>
        <camera damping="spring" tension="120" friction="22"/>
        <turntable speed="0.8" angles="0 90 180 270"/>
        <particles count="1200" radius="2" seed="0x2A" rate-x="-0.2"/>
        <clock max-delta="0.05"/>
        <stage background="#000000" fog-near="8" fog-far="16"/>
    </configurator>
    "##;

    #[test]
    fn defaults_match_the_stock_configurator() {
        let settings = ConfiguratorSettings::default();
        assert_eq!(settings.palettes.body.len(), 7);
        assert_eq!(settings.palettes.body[0].name, "Red");
        assert_eq!(settings.damping, Damping::Exponential { rate: 5.0 });
        assert_eq!(settings.max_delta, 0.1);
        assert_eq!(settings.particles.count, 5000);
        assert_eq!(
            settings.initial_state().body_color,
            Color::rgb(0xFF, 0x00, 0x00)
        );
    }

    #[test]
    fn parse_settings_overrides_present_elements() {
        let settings = ConfiguratorSettings::from_xml(SAMPLE).unwrap();
        assert_eq!(settings.palettes.rims.len(), 2);
        assert_eq!(settings.palettes.rims[1].color, Color::rgb(200, 200, 200));
        assert_eq!(settings.palettes.body, Palettes::default().body);

        assert_eq!(settings.viewpoints.overview(), Vec3::new(-5.0, 1.5, 6.0));
        assert_eq!(
            settings.viewpoints.lookup(Some(MenuId::Glass)),
            Vec3::new(0.0, 2.0, 3.0)
        );
        assert_eq!(
            settings.viewpoints.lookup(Some(MenuId::Rims)),
            Vec3::new(-2.0, 0.0, 2.0)
        );

        match settings.damping {
            Damping::Spring(config) => {
                assert_eq!(config.tension, 120.0);
                assert_eq!(config.friction, 22.0);
                assert_eq!(config.mass, SpringConfig::default().mass);
            }
            other => panic!("expected spring damping, got {other:?}"),
        }

        assert_eq!(settings.turntable.rotations.len(), 4);
        assert!((settings.turntable.rotations[1] - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(settings.turntable.speed, 0.8);
        assert_eq!(settings.particles.count, 1200);
        assert_eq!(settings.particles.seed, 42);
        assert_eq!(settings.particles.rate_x, -0.2);
        assert_eq!(settings.particles.rate_y, ParticleSettings::default().rate_y);
        assert_eq!(settings.max_delta, 0.05);
        assert_eq!(settings.stage.background, Color::BLACK);
        assert_eq!(settings.stage.fog_far, 16.0);
    }

    #[test]
    fn wrong_root_is_rejected() {
        let err = ConfiguratorSettings::from_xml("<scene/>").unwrap_err();
        assert!(matches!(err, SettingsError::UnexpectedRoot(root) if root == "scene"));
    }

    #[test]
    fn malformed_values_are_errors() {
        let bad_color = r##"<configurator><stage background="#XYZ"/></configurator>"##;
        assert!(matches!(
            ConfiguratorSettings::from_xml(bad_color),
            Err(SettingsError::Color { .. })
        ));

        let bad_vec = "<configurator><overview>1 2</overview></configurator>";
        assert!(matches!(
            ConfiguratorSettings::from_xml(bad_vec),
            Err(SettingsError::InvalidValue { .. })
        ));

        let unknown_menu = r#"<configurator><viewpoint menu="roof">0 0 0</viewpoint></configurator>"#;
        assert!(matches!(
            ConfiguratorSettings::from_xml(unknown_menu),
            Err(SettingsError::UnknownMenu(menu)) if menu == "roof"
        ));

        let undamped = r#"<configurator><camera damping="spring" friction="0"/></configurator>"#;
        assert!(matches!(
            ConfiguratorSettings::from_xml(undamped),
            Err(SettingsError::InvalidValue { .. })
        ));

        let underdamped = r#"<configurator><camera damping="spring" friction="2"/></configurator>"#;
        assert!(matches!(
            ConfiguratorSettings::from_xml(underdamped),
            Err(SettingsError::InvalidValue { .. })
        ));

        let sluggish = r#"<configurator><camera damping="spring" friction="2000"/></configurator>"#;
        assert!(matches!(
            ConfiguratorSettings::from_xml(sluggish),
            Err(SettingsError::InvalidValue { .. })
        ));

        let slow_rate = r#"<configurator><camera rate="0.01"/></configurator>"#;
        assert!(matches!(
            ConfiguratorSettings::from_xml(slow_rate),
            Err(SettingsError::InvalidValue { .. })
        ));

        for speed in ["0", "-1"] {
            let xml = format!(r#"<configurator><turntable speed="{speed}"/></configurator>"#);
            assert!(matches!(
                ConfiguratorSettings::from_xml(&xml),
                Err(SettingsError::InvalidValue { field, .. }) if field == "turntable speed"
            ));
        }

        let crowded = r#"<configurator><particles count="1000000000000"/></configurator>"#;
        assert!(matches!(
            ConfiguratorSettings::from_xml(crowded),
            Err(SettingsError::InvalidValue { field, .. }) if field == "particle count"
        ));

        let empty = r#"<configurator><palette kind="body"/></configurator>"#;
        assert!(matches!(
            ConfiguratorSettings::from_xml(empty),
            Err(SettingsError::EmptyPalette("body"))
        ));
    }

    #[test]
    fn accepted_spring_settles_without_overshoot() {
        let xml = r#"<configurator><camera damping="spring" tension="120" friction="22"/></configurator>"#;
        let settings = ConfiguratorSettings::from_xml(xml).unwrap();
        let mut camera = CameraController::new(settings.viewpoints.clone(), settings.damping);
        let start = camera.pose().position;
        let target = settings.viewpoints.lookup(Some(MenuId::Rims));
        let path = target - start;

        for _ in 0..600 {
            let position = camera.update(1.0 / 60.0, Some(MenuId::Rims)).position;
            let travelled = (position - start).dot(path) / path.length_squared();
            assert!(travelled <= 1.0 + 1e-4, "overshot to {travelled}");
        }
        assert!(camera.pose().position.distance(target) < 1e-3);
    }

    #[test]
    fn swatch_requires_a_name() {
        let xml = r##"<configurator><palette kind="glass"><swatch color="#000"/></palette></configurator>"##;
        assert!(matches!(
            ConfiguratorSettings::from_xml(xml),
            Err(SettingsError::MissingAttribute { attribute, .. }) if attribute == "name"
        ));
    }
}
