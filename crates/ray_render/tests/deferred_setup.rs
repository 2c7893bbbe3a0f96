//! Deferred pipeline setup, exponential shadow maps and camera targets

use glam::Vec4;
use ray_render::material::paths;
use ray_render::semantic::snapshot;
use ray_render::{
    Camera, CameraOrder, DeferredLightingPipeline, DeviceCommand, FloatSemantic, HeadlessDevice,
    ParamValue, RenderError, RenderSettings, TextureSemantic, ESM_FACTOR,
};

fn setup_pipeline(settings: RenderSettings) -> (HeadlessDevice, DeferredLightingPipeline) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut device = HeadlessDevice::new();
    let mut pipeline = DeferredLightingPipeline::for_device(settings, &device);
    pipeline.setup(&mut device).unwrap();
    (device, pipeline)
}

#[test]
fn test_esm_factor_reaches_both_sides() {
    let (device, pipeline) = setup_pipeline(RenderSettings::default());

    assert_eq!(
        device.parameter_value_by_name(paths::DEFERRED_LIGHTING, "shadowFactor"),
        Some(ParamValue::Float(ESM_FACTOR))
    );
    assert_eq!(
        device.parameter_value_by_name(paths::DEFERRED_SHADOW, "shadowFactor"),
        Some(ParamValue::Float(ESM_FACTOR))
    );
    let registry = snapshot(pipeline.semantics());
    assert_eq!(registry.get_float(FloatSemantic::LightShadowFactor), ESM_FACTOR);
}

#[test]
fn test_missing_lighting_parameter_leaves_nothing() {
    let mut device = HeadlessDevice::new();
    device
        .library_mut()
        .remove_parameter(paths::DEFERRED_LIGHTING, "shadowMatrix");

    let mut pipeline = DeferredLightingPipeline::for_device(RenderSettings::default(), &device);
    let err = pipeline.setup(&mut device).unwrap_err();

    assert!(matches!(err, RenderError::MissingParameter { ref name, .. } if name == "shadowMatrix"));
    assert!(!pipeline.is_configured());
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_missing_esm_technique_leaves_nothing() {
    let mut device = HeadlessDevice::new();
    device
        .library_mut()
        .remove_technique(paths::DEFERRED_SHADOW, "DeferredShadowBlurX");

    let mut pipeline = DeferredLightingPipeline::for_device(RenderSettings::without_shadows(), &device);
    let err = pipeline.setup(&mut device).unwrap_err();

    assert!(matches!(err, RenderError::MissingTechnique { ref name, .. } if name == "DeferredShadowBlurX"));
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_close_releases_pipeline_but_not_targets() {
    let (mut device, mut pipeline) = setup_pipeline(RenderSettings::default());
    let targets = pipeline.create_deferred_targets(&mut device, 16, 16).unwrap();
    let with_targets = device.live_resource_count();

    pipeline.close(&mut device);
    assert!(!pipeline.is_configured());
    assert!(device.live_resource_count() < with_targets);
    assert!(device.live_resource_count() > 0);

    targets.release(&mut device);
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_targets_failure_releases_partial_family() {
    let (mut device, pipeline) = setup_pipeline(RenderSettings::without_shadows());
    let baseline = device.live_resource_count();
    device.set_texture_budget(Some(device.live_texture_count() + 2));

    let err = pipeline.create_deferred_targets(&mut device, 16, 16).unwrap_err();
    assert!(matches!(err, RenderError::TextureCreation(_)));
    assert_eq!(device.live_resource_count(), baseline);
}

#[test]
fn test_unconfigured_pipeline_refuses_work() {
    let mut device = HeadlessDevice::new();
    let mut pipeline = DeferredLightingPipeline::for_device(RenderSettings::default(), &device);
    let camera = Camera::new("main", 4, 4);

    assert!(matches!(
        pipeline.create_deferred_targets(&mut device, 4, 4),
        Err(RenderError::NotConfigured)
    ));
    assert!(matches!(
        pipeline.render(&mut device, &camera, &[]),
        Err(RenderError::NotConfigured)
    ));
}

#[test]
fn test_camera_without_targets_is_reported() {
    let (mut device, mut pipeline) = setup_pipeline(RenderSettings::without_shadows());
    let camera = Camera::new("main", 4, 4);
    let shadow_camera = Camera::new("caster", 4, 4).with_order(CameraOrder::Shadow);

    assert!(matches!(
        pipeline.render(&mut device, &camera, &[]),
        Err(RenderError::MissingTargets(ref label)) if label == "main"
    ));
    assert!(matches!(
        pipeline.render(&mut device, &shadow_camera, &[]),
        Err(RenderError::MissingTargets(_))
    ));
}

#[test]
fn test_shadow_camera_renders_exponential_map() {
    let (mut device, mut pipeline) = setup_pipeline(RenderSettings::without_shadows());
    let mut camera = Camera::new("caster", 32, 32).with_order(CameraOrder::Shadow);
    let targets = pipeline.create_shadow_camera_targets(&mut device, 32).unwrap();
    let (render, swap) = (targets.render, targets.swap);
    camera.set_shadow_targets(Some(targets));

    device.clear_commands();
    pipeline.render(&mut device, &camera, &[]).unwrap();

    let quads: Vec<&str> = device
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::DrawScreenQuad(t) => device.technique_name(*t),
            _ => None,
        })
        .collect();
    assert_eq!(quads, ["DeferredShadowBlurX", "DeferredShadowBlurY"]);

    // Caster pass clears exponential depth to one, then depth/stencil
    assert_eq!(device.read_pixel(render.texture, 3, 3), Some(Vec4::ONE));
    assert!(device.commands().contains(&DeviceCommand::Clear {
        attachment: 1,
        flags: ray_render::ClearFlags::DEPTH_STENCIL,
    }));

    // Final blur reads the swap target and writes back into the render target
    assert_eq!(
        device.parameter_value_by_name(paths::DEFERRED_SHADOW, "texSource"),
        Some(ParamValue::Texture(Some(swap.texture)))
    );
    let last_bind = device
        .commands()
        .iter()
        .rev()
        .find_map(|c| match c {
            DeviceCommand::SetFramebuffer(f) => Some(*f),
            _ => None,
        });
    assert_eq!(last_bind, Some(Some(render.framebuffer)));
}

#[test]
fn test_main_camera_publishes_gbuffer_semantics() {
    let (mut device, mut pipeline) = setup_pipeline(RenderSettings::without_shadows());
    let mut camera = Camera::new("main", 8, 4);
    camera.set_deferred_targets(Some(pipeline.create_deferred_targets(&mut device, 8, 4).unwrap()));
    pipeline.render(&mut device, &camera, &[]).unwrap();

    let targets = camera.deferred_targets().unwrap();
    let registry = snapshot(pipeline.semantics());
    assert_eq!(registry.get_texture(TextureSemantic::DeferredDepthMap), Some(targets.depth));
    assert_eq!(registry.get_texture(TextureSemantic::DeferredLightMap), Some(targets.light));
    assert_eq!(
        registry.get_float4(ray_render::Float4Semantic::ScreenDimension),
        Vec4::new(8.0, 4.0, 0.125, 0.25)
    );
    assert_eq!(
        device.parameter_value_by_name(paths::DEFERRED_LIGHTING, "texLight"),
        Some(ParamValue::Texture(Some(targets.light)))
    );
}

#[test]
fn test_resolution_change_updates_settings() {
    let (_device, mut pipeline) = setup_pipeline(RenderSettings::without_shadows());
    pipeline.on_resolution_change(0, 600);
    assert_eq!(pipeline.settings().width, 1);
    assert_eq!(pipeline.settings().height, 600);
}
