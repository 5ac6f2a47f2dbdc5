use configurator_runtime::{
    CameraState, Color, ConfiguratorSettings, ConfiguratorView, HeadlessRenderer, MenuId,
    UiEvent, VehicleModel,
};
use glam::Vec3;

const DT: f32 = 1.0 / 60.0;
const OVERVIEW: Vec3 = Vec3::new(-4.0, 1.0, 5.0);
const RIMS: Vec3 = Vec3::new(-2.0, 0.0, 2.0);

fn mounted_view() -> ConfiguratorView<HeadlessRenderer, VehicleModel> {
    let mut settings = ConfiguratorSettings::default();
    settings.particles.count = 200;
    let mut view = ConfiguratorView::new(settings, VehicleModel::new(), HeadlessRenderer::new(48, 32));
    view.mount();
    view
}

#[test]
fn camera_reaches_the_rims_viewpoint_within_two_seconds() {
    let mut view = mounted_view();
    assert_eq!(view.camera_pose().position, OVERVIEW);
    assert_eq!(view.active_menu(), None);

    view.handle(UiEvent::ToggleMenu(MenuId::Rims));
    for _ in 0..120 {
        let outcome = view.frame(DT).unwrap();
        assert!(outcome.drawn);
    }

    let position = view.camera_pose().position;
    assert!(
        position.distance(RIMS) < 1e-3,
        "camera ended at {position:?}"
    );
    assert_eq!(view.camera_pose().target, Vec3::ZERO);
    assert_eq!(view.camera_state(), CameraState::Idle { position: RIMS });
}

#[test]
fn closing_the_menu_halfway_reverses_without_a_jump() {
    let mut view = mounted_view();
    view.handle(UiEvent::ToggleMenu(MenuId::Rims));

    let span = OVERVIEW.distance(RIMS);
    let mut previous = view.camera_pose().position;
    let mut largest_step = 0.0_f32;
    let mut ticks = 0;
    while previous.distance(RIMS) > 0.5 * span {
        view.frame(DT).unwrap();
        let position = view.camera_pose().position;
        largest_step = largest_step.max(position.distance(previous));
        previous = position;
        ticks += 1;
        assert!(ticks < 60, "never reached the halfway point");
    }
    assert!((8..=10).contains(&ticks), "halfway after {ticks} ticks");

    view.handle(UiEvent::ToggleMenu(MenuId::Rims));
    assert_eq!(view.active_menu(), None);

    view.frame(DT).unwrap();
    let first = view.camera_pose().position;
    assert!(
        first.distance(previous) <= largest_step + 1e-5,
        "jumped from {previous:?} to {first:?}"
    );
    assert!(first.distance(OVERVIEW) < previous.distance(OVERVIEW));
    previous = first;

    for _ in 0..240 {
        view.frame(DT).unwrap();
        let position = view.camera_pose().position;
        assert!(
            position.distance(previous) <= largest_step + 1e-5,
            "jumped from {previous:?} to {position:?}"
        );
        assert!(position.distance(OVERVIEW) <= previous.distance(OVERVIEW) + 1e-6);
        previous = position;
    }
    assert!(previous.distance(OVERVIEW) < 1e-3);
}

#[test]
fn switching_menus_keeps_exactly_one_open() {
    let mut view = mounted_view();
    view.handle(UiEvent::ToggleMenu(MenuId::Body));
    view.handle(UiEvent::ToggleMenu(MenuId::Glass));
    assert_eq!(view.active_menu(), Some(MenuId::Glass));
    view.handle(UiEvent::ToggleMenu(MenuId::Glass));
    assert_eq!(view.active_menu(), None);
}

#[test]
fn long_frames_are_clamped() {
    let mut view = mounted_view();
    let report = view.frame(5.0).unwrap().report.unwrap();
    assert!((report.delta - 0.1).abs() < 1e-6);
    assert!(report.failures.is_empty());
}

#[test]
fn particles_spin_regardless_of_configuration() {
    let mut idle = mounted_view();
    let mut busy = mounted_view();
    busy.handle(UiEvent::ToggleMenu(MenuId::Rims));
    busy.handle(UiEvent::SelectRimColor(Color::rgb(0xD4, 0xAF, 0x37)));
    busy.handle(UiEvent::SelectView(2));

    for _ in 0..90 {
        idle.frame(DT).unwrap();
        busy.frame(DT).unwrap();
    }
    let angles = idle.particle_angles();
    assert_eq!(angles, busy.particle_angles());
    assert!((angles.x - (-0.15)).abs() < 1e-4);
    assert!((angles.y - (-0.1)).abs() < 1e-4);
}

#[test]
fn unset_colors_render_identically() {
    let mut first = mounted_view();
    let mut second = mounted_view();
    second.handle(UiEvent::SelectRimColor(Color::rgb(1, 2, 3)));
    second.handle(UiEvent::ClearRimColor);

    first.frame(DT).unwrap();
    second.frame(DT).unwrap();
    let a = first.last_scene().unwrap().model().unwrap().clone();
    let b = second.last_scene().unwrap().model().unwrap().clone();
    assert_eq!(a.rims, b.rims);
    assert_eq!(a.glass, b.glass);
}

#[test]
fn hidden_view_does_not_fast_forward_the_turntable() {
    let mut view = mounted_view();
    view.handle(UiEvent::SelectView(1));
    for _ in 0..6 {
        view.frame(DT).unwrap();
    }
    let before = view.rotation_y();

    view.set_visible(false);
    for _ in 0..600 {
        assert!(view.frame(DT).unwrap().report.is_none());
    }
    assert_eq!(view.rotation_y(), before);

    view.set_visible(true);
    let report = view.frame(10.0).unwrap().report.unwrap();
    assert_eq!(report.delta, 0.0);
    assert_eq!(view.rotation_y(), before);

    view.frame(DT).unwrap();
    assert!(view.rotation_y() > before);
    assert!(view.rotation_y() < std::f32::consts::PI);
}
