// crates/vireo-render/src/lib.rs
//
// GPU side of video playback: the VideoTexture asset, the importer that
// creates it from an asset record, the per-draw playback controller, and the
// batched quad renderer that puts decoded frames on screen.

pub mod batch;
pub mod gpu;
pub mod importer;
pub mod playback;
pub mod texture;

pub use batch::VideoBatchRenderer;
pub use gpu::GpuContext;
pub use importer::{AssetMetadata, VideoTextureImporter};
pub use playback::PlaybackMode;
pub use texture::{TextureSpecification, VideoTexture};
