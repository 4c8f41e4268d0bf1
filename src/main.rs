use std::f32::consts::FRAC_PI_2;

use inkpass::params;
use inkpass::{
    AppConfig, Camera, Frame, KeyCode, Material, OrbitCamera, ParamValue, PassParameters, Quat,
    Transform, Vec3, run_with_config,
};

/// Toggles a boolean parameter on a key press.
fn toggle(params: &mut PassParameters, name: &str) {
    if let Ok(ParamValue::Bool(on)) = params.get(name) {
        if params.set(name, ParamValue::Bool(!on)).is_ok() {
            log::info!("{name} = {}", !on);
        }
    }
}

/// Adds `delta` to a float parameter, clamped to its UI range.
fn nudge(params: &mut PassParameters, name: &str, delta: f32) {
    let (Some(spec), Ok(ParamValue::Float(v))) = (params::spec(name), params.get(name)) else {
        return;
    };
    let value = spec.clamp(ParamValue::Float(v + delta));
    if params.set(name, value).is_ok() {
        log::info!("{name} = {value:?}");
    }
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::new().title("inkpass");

    run_with_config(config, |ctx| {
        let sphere = ctx.mesh_sphere(64, 32)?;
        let cube = ctx.mesh_cube()?;
        let placement = |z: f32| {
            Transform::new()
                .position(Vec3::new(0.0, 0.0, z))
                .rotation(Quat::from_rotation_y(FRAC_PI_2))
                .uniform_scale(2.0)
        };
        ctx.scene
            .add_object(sphere, placement(-2.5), Material::color(0.85, 0.8, 0.7));
        ctx.scene
            .add_object(cube, placement(2.5), Material::color(0.6, 0.7, 0.85));

        *ctx.camera = Camera::new()
            .at([10.0, 1.0, -10.0])
            .looking_at(Vec3::ZERO)
            .with_fov(27.0)
            .with_clip(1.0, 100.0);
        let mut orbit = OrbitCamera::looking_from(ctx.camera.position, Vec3::ZERO)
            .distance_limits(4.0, 60.0);

        log::info!("O/H toggle outline/hatching, P perspective depth, [ ] border width, arrows move the light");

        Ok(move |frame: &mut Frame| {
            orbit.update(frame.input, frame.dt);
            orbit.apply(frame.camera);

            let input = frame.input;
            let params = &mut *frame.params;
            if input.key_pressed(KeyCode::KeyO) {
                toggle(params, "outline.enabled");
            }
            if input.key_pressed(KeyCode::KeyH) {
                toggle(params, "hatching.enabled");
            }
            if input.key_pressed(KeyCode::KeyP) {
                toggle(params, "outline.perspective");
            }
            if input.key_pressed(KeyCode::BracketLeft) {
                nudge(params, "outline.border_width", -0.5);
            }
            if input.key_pressed(KeyCode::BracketRight) {
                nudge(params, "outline.border_width", 0.5);
            }

            let speed = 2.0 * frame.dt;
            let light = &mut frame.light.position;
            if input.key_down(KeyCode::ArrowLeft) {
                light.x -= speed;
            }
            if input.key_down(KeyCode::ArrowRight) {
                light.x += speed;
            }
            if input.key_down(KeyCode::ArrowUp) {
                light.z -= speed;
            }
            if input.key_down(KeyCode::ArrowDown) {
                light.z += speed;
            }
        })
    })?;

    Ok(())
}
