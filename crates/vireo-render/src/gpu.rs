// crates/vireo-render/src/gpu.rs
//
// Shared GPU handles threaded through the renderer and texture code.

/// Device and queue bundle. All GPU work in this crate happens on the scene
/// thread through these handles.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue:  wgpu::Queue,
}
