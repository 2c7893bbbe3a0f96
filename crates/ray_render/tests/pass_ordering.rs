//! Frame structure of the deferred pipeline
//!
//! Checks the order passes reach the device in:
//! - Shadow maps before any camera pass
//! - Opaque depth-only, G-buffer, lights and shading, then post processes
//! - The transparent repeat, then the copy to the viewport

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::Vec3;
use ray_render::{
    Camera, CameraState, DeferredLightingPipeline, DeferredTargets, DeviceCommand, HeadlessDevice,
    Light, LightType, ParamValue, PostProcess, RenderPipelineDevice, RenderQueue, RenderSettings,
    ShadowMode, ShadowQuality,
};

struct CountingPost {
    runs: Arc<AtomicUsize>,
}

impl PostProcess for CountingPost {
    fn name(&self) -> &str {
        "ssao"
    }

    fn render(&mut self, _device: &mut dyn RenderPipelineDevice, _camera: &CameraState, _targets: &DeferredTargets) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

fn configured(settings: RenderSettings) -> (HeadlessDevice, DeferredLightingPipeline, Camera) {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut device = HeadlessDevice::new();
    let mut pipeline = DeferredLightingPipeline::for_device(settings.clone(), &device);
    pipeline.setup(&mut device).unwrap();

    let mut camera = Camera::new("main", settings.width, settings.height);
    let targets = pipeline
        .create_deferred_targets(&mut device, settings.width, settings.height)
        .unwrap();
    assert!(camera.set_deferred_targets(Some(targets)).is_none());
    (device, pipeline, camera)
}

fn markers(device: &HeadlessDevice) -> Vec<String> {
    device
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::Marker(label) => Some(label.clone()),
            _ => None,
        })
        .collect()
}

fn small_settings() -> RenderSettings {
    RenderSettings {
        width: 8,
        height: 8,
        ssao_enabled: true,
        ..RenderSettings::without_shadows()
    }
}

#[test]
fn test_opaque_post_transparent_copy_order() {
    let (mut device, mut pipeline, camera) = configured(small_settings());
    let runs = Arc::new(AtomicUsize::new(0));
    pipeline.add_post_process(Box::new(CountingPost { runs: Arc::clone(&runs) }));

    device.clear_commands();
    let lights = [Light::new("sun", LightType::Sun)];
    pipeline.render(&mut device, &camera, &lights).unwrap();

    assert_eq!(
        markers(&device),
        [
            "depth-only", "gbuffer", "lights", "shading", "ssao", "depth-only", "gbuffer", "lights",
            "shading", "copy",
        ]
    );
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let queues: Vec<(RenderQueue, bool)> = device
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::DrawQueue { queue, technique } => Some((*queue, technique.is_some())),
            _ => None,
        })
        .collect();
    assert_eq!(
        queues,
        [
            (RenderQueue::Opaque, true),
            (RenderQueue::Opaque, false),
            (RenderQueue::Transparent, true),
            (RenderQueue::Transparent, false),
        ]
    );

    let targets = camera.deferred_targets().unwrap();
    assert_eq!(
        device.commands().last(),
        Some(&DeviceCommand::Blit {
            src: targets.shading_view,
            dst: None,
        })
    );
}

#[test]
fn test_post_process_skipped_without_ssao() {
    let settings = RenderSettings {
        ssao_enabled: false,
        ..small_settings()
    };
    let (mut device, mut pipeline, camera) = configured(settings);
    let runs = Arc::new(AtomicUsize::new(0));
    pipeline.add_post_process(Box::new(CountingPost { runs: Arc::clone(&runs) }));

    pipeline.render(&mut device, &camera, &[]).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(!markers(&device).iter().any(|m| m == "ssao"));
}

#[test]
fn test_transparent_pass_keeps_opaque_depth() {
    let (mut device, mut pipeline, camera) = configured(small_settings());
    device.clear_commands();
    pipeline.render(&mut device, &camera, &[]).unwrap();

    let clears: Vec<_> = device
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::Clear { attachment: 0, flags } => Some(*flags),
            _ => None,
        })
        .collect();
    let depth_only_clears: Vec<_> = clears
        .iter()
        .filter(|f| !f.contains(ray_render::ClearFlags::COLOR))
        .collect();

    assert_eq!(depth_only_clears.len(), 2);
    assert!(depth_only_clears[0].contains(ray_render::ClearFlags::DEPTH));
    assert!(!depth_only_clears[1].contains(ray_render::ClearFlags::DEPTH));
    assert!(depth_only_clears[1].contains(ray_render::ClearFlags::STENCIL));
}

#[test]
fn test_shadow_maps_render_before_camera_passes() {
    let settings = RenderSettings {
        width: 8,
        height: 8,
        shadow_mode: ShadowMode::Hard,
        shadow_quality: ShadowQuality::Low,
        ssao_enabled: false,
    };
    let (mut device, mut pipeline, camera) = configured(settings);

    let mut sun = Light::new("sun", LightType::Sun).with_shadow(ShadowMode::Hard);
    pipeline.setup_light_shadows(&mut device, &mut sun).unwrap();
    assert_eq!(sun.shadow_cameras().len(), 1);

    device.clear_commands();
    pipeline.render(&mut device, &camera, &[sun]).unwrap();

    let commands = device.commands();
    let shadow_draw = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::DrawQueue { queue: RenderQueue::Shadow, .. }))
        .unwrap();
    let first_marker = commands
        .iter()
        .position(|c| matches!(c, DeviceCommand::Marker(_)))
        .unwrap();
    assert!(shadow_draw < first_marker);
}

#[test]
fn test_shadow_channel_counts_shadowed_lights() {
    let settings = RenderSettings {
        width: 8,
        height: 8,
        shadow_mode: ShadowMode::Hard,
        shadow_quality: ShadowQuality::Low,
        ssao_enabled: false,
    };
    let (mut device, mut pipeline, camera) = configured(settings);

    let mut first = Light::new("first", LightType::Spot).with_shadow(ShadowMode::Hard);
    let unshadowed = Light::new("plain", LightType::Point).with_color(Vec3::X, 1.0);
    let mut second = Light::new("second", LightType::Sun).with_shadow(ShadowMode::Hard);
    pipeline.setup_light_shadows(&mut device, &mut first).unwrap();
    pipeline.setup_light_shadows(&mut device, &mut second).unwrap();

    device.clear_commands();
    pipeline.render(&mut device, &camera, &[first, unshadowed, second]).unwrap();

    let shadow_channel = device
        .find_parameter(ray_render::material::paths::DEFERRED_LIGHTING, "shadowChannel")
        .unwrap();
    let channels: Vec<ParamValue> = device
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::SetParameter { parameter, value } if *parameter == shadow_channel => Some(*value),
            _ => None,
        })
        .collect();

    // Opaque and transparent light passes bind the same channels
    assert_eq!(
        channels,
        [
            ParamValue::Int(0),
            ParamValue::Int(-1),
            ParamValue::Int(1),
            ParamValue::Int(0),
            ParamValue::Int(-1),
            ParamValue::Int(1),
        ]
    );
}

#[test]
fn test_stencil_reference_follows_light_layer() {
    let (mut device, mut pipeline, camera) = configured(small_settings());
    let lights = [
        Light::new("a", LightType::Sun).with_layer(0),
        Light::new("b", LightType::Point).with_layer(3),
    ];
    device.clear_commands();
    pipeline.render(&mut device, &camera, &lights).unwrap();

    let references: Vec<u32> = device
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::SetStencilReference { reference, .. } => Some(*reference),
            _ => None,
        })
        .collect();
    assert_eq!(references, [1, 8, 1, 8]);
}

#[test]
fn test_point_light_samples_first_cube_face() {
    let settings = RenderSettings {
        width: 8,
        height: 8,
        shadow_mode: ShadowMode::Hard,
        shadow_quality: ShadowQuality::Low,
        ssao_enabled: false,
    };
    let (mut device, mut pipeline, camera) = configured(settings);

    let mut bulb = Light::new("bulb", LightType::Point).with_shadow(ShadowMode::Hard);
    pipeline.setup_light_shadows(&mut device, &mut bulb).unwrap();
    assert_eq!(bulb.shadow_cameras().len(), 6);
    let first_face = bulb.shadow_cameras()[0].linear_depth.texture;

    pipeline.render(&mut device, &camera, &[bulb]).unwrap();

    assert_eq!(
        device.parameter_value_by_name(ray_render::material::paths::DEFERRED_LIGHTING, "shadowMap"),
        Some(ParamValue::Texture(Some(first_face)))
    );
}
