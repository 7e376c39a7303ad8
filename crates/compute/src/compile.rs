//! Shader source assembly. Per-texel programs arrive as bare WGSL fragment
//! bodies; this module prepends the generated header (resolution constant,
//! `params` uniform, one texture/sampler pair per dependency) so the body can
//! refer to dependencies by their variable names.

use std::borrow::Cow;

/// Full-screen pass vertex stage: one oversized triangle, no vertex buffer.
/// Every texel of the attached target is covered exactly once.
pub(crate) const FULLSCREEN_VERTEX_WGSL: &str = r#"
@vertex
fn main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    var corners = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -3.0),
        vec2<f32>(3.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    return vec4<f32>(corners[index], 0.0, 1.0);
}
"#;

/// Exact copy of a source texture into the attached target. `textureLoad`
/// keeps this bit-exact and independent of float filterability.
pub(crate) const PASSTHROUGH_FRAGMENT_WGSL: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;

@fragment
fn main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(source, vec2<i32>(position.xy), 0);
}
"#;

/// Prepend the generated header to a user program body.
///
/// Dependencies are declared in list order at `@group(1)`, texture at
/// binding `2*i` and sampler at `2*i + 1`, so the bind group layout and the
/// shader agree by construction. The resolution constant carries one decimal
/// place so integer sizes still read as floats.
pub(crate) fn assemble_program(body: &str, dependencies: &[&str], width: u32, height: u32) -> String {
    let mut source = String::new();
    source.push_str(&format!(
        "const resolution: vec2<f32> = vec2<f32>({:.1}, {:.1});\n\n",
        width as f32, height as f32
    ));
    source.push_str("@group(0) @binding(0) var<uniform> params: vec4<f32>;\n");
    for (index, name) in dependencies.iter().enumerate() {
        source.push_str(&format!(
            "@group(1) @binding({}) var {name}: texture_2d<f32>;\n",
            2 * index
        ));
        source.push_str(&format!(
            "@group(1) @binding({}) var {name}_sampler: sampler;\n",
            2 * index + 1
        ));
    }
    source.push('\n');
    source.push_str(body);
    source
}

pub(crate) fn create_module(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "@fragment fn main() -> @location(0) vec4<f32> { return params; }";

    #[test]
    fn header_declares_resolution_with_one_decimal() {
        let source = assemble_program(BODY, &[], 640, 360);
        assert!(source.contains("const resolution: vec2<f32> = vec2<f32>(640.0, 360.0);"));
    }

    #[test]
    fn header_declares_params_uniform() {
        let source = assemble_program(BODY, &[], 4, 4);
        assert!(source.contains("@group(0) @binding(0) var<uniform> params: vec4<f32>;"));
    }

    #[test]
    fn dependencies_bind_in_list_order() {
        let source = assemble_program(BODY, &["position", "velocity"], 8, 8);
        assert!(source.contains("@group(1) @binding(0) var position: texture_2d<f32>;"));
        assert!(source.contains("@group(1) @binding(1) var position_sampler: sampler;"));
        assert!(source.contains("@group(1) @binding(2) var velocity: texture_2d<f32>;"));
        assert!(source.contains("@group(1) @binding(3) var velocity_sampler: sampler;"));
    }

    #[test]
    fn body_follows_header() {
        let source = assemble_program(BODY, &["heat"], 16, 16);
        let header_end = source.find(BODY).expect("body present");
        assert!(source[..header_end].contains("heat_sampler"));
        assert!(source.ends_with(BODY));
    }
}
