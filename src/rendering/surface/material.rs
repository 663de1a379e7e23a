use bevy::prelude::*;
use bevy::render::mesh::MeshVertexBufferLayoutRef;
use bevy::render::render_resource::{
    AsBindGroup, BlendState, RenderPipelineDescriptor, ShaderRef, SpecializedMeshPipelineError,
};
use bevy::sprite::{AlphaMode2d, Material2d, Material2dKey};
#[cfg(target_arch = "wasm32")]
use std::sync::OnceLock;

#[cfg(target_arch = "wasm32")]
pub(crate) static FLUID_DISPLAY_SHADER_HANDLE: OnceLock<Handle<Shader>> = OnceLock::new();

pub(crate) const FLUID_DISPLAY_SHADER_PATH: &str = "shaders/fluid_display.wgsl";

/// Shows a dye image with `alpha = max(r, g, b)`, blended `ONE, ONE_MINUS_SRC_ALPHA`.
#[derive(Asset, AsBindGroup, TypePath, Debug, Clone)]
pub struct FluidDisplayMaterial {
    #[texture(0)]
    #[sampler(1)]
    pub dye: Handle<Image>,
}

impl Material2d for FluidDisplayMaterial {
    fn fragment_shader() -> ShaderRef {
        #[cfg(target_arch = "wasm32")]
        {
            return FLUID_DISPLAY_SHADER_HANDLE
                .get()
                .cloned()
                .map(ShaderRef::Handle)
                .unwrap_or_else(|| ShaderRef::Path(FLUID_DISPLAY_SHADER_PATH.into()));
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            FLUID_DISPLAY_SHADER_PATH.into()
        }
    }

    fn alpha_mode(&self) -> AlphaMode2d {
        AlphaMode2d::Blend
    }

    fn specialize(
        descriptor: &mut RenderPipelineDescriptor,
        _layout: &MeshVertexBufferLayoutRef,
        _key: Material2dKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        if let Some(fragment) = descriptor.fragment.as_mut() {
            for target in fragment.targets.iter_mut().flatten() {
                target.blend = Some(BlendState::PREMULTIPLIED_ALPHA_BLENDING);
            }
        }
        Ok(())
    }
}
