//! Process-wide semantic registry lifecycle
//!
//! Kept in its own test binary with a single test, since the global
//! registry is shared by every test in a process.

use std::sync::Arc;

use glam::Vec3;
use ray_render::semantic::{self, Float3Semantic, FloatSemantic, SemanticValue};
use ray_render::{DeferredLightingPipeline, HeadlessDevice, RenderSettings};

#[test]
fn test_global_setup_and_close() {
    assert!(semantic::global().is_none());

    let first = semantic::setup();
    let second = semantic::setup();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &semantic::global().unwrap()));

    // A pipeline and device bound to the global registry see each other's writes
    let mut device = HeadlessDevice::with_semantics(Arc::clone(&first));
    let mut pipeline = DeferredLightingPipeline::new(RenderSettings::without_shadows(), Arc::clone(&first));
    pipeline.setup(&mut device).unwrap();
    assert_eq!(
        first.read().value_by_name("LightShadowFactor"),
        Some(SemanticValue::Float(0.7))
    );

    first.write().set_float3(Float3Semantic::LightDiffuse, Vec3::new(1.0, 2.0, 3.0));
    semantic::close();
    assert!(semantic::global().is_none());

    // Outstanding handles stay usable after close
    assert_eq!(second.read().get_float3(Float3Semantic::LightDiffuse), Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(second.read().get_float(FloatSemantic::LightShadowFactor), 0.7);

    let fresh = semantic::setup();
    assert!(!Arc::ptr_eq(&fresh, &first));
    assert_eq!(fresh.read().get_float(FloatSemantic::LightShadowFactor), 0.0);
    semantic::close();

    pipeline.close(&mut device);
    assert_eq!(device.live_resource_count(), 0);
}
