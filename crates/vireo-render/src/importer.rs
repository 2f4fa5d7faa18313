// crates/vireo-render/src/importer.rs
//
// Creates a VideoTexture asset from an asset record. Video open failure is
// fatal to the asset; audio open failure leaves a silent asset.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use vireo_media::VideoReader;

use crate::gpu::GpuContext;
use crate::texture::{TextureSpecification, VideoTexture};

/// The slice of asset metadata the video importer consumes.
#[derive(Clone, Debug)]
pub struct AssetMetadata {
    /// Path relative to the project asset directory.
    pub file_path: PathBuf,
}

/// Resolve a project-relative asset path against the asset directory.
pub fn resolve_asset_path(asset_directory: &Path, file_path: &Path) -> PathBuf {
    asset_directory.join(file_path)
}

pub struct VideoTextureImporter;

impl VideoTextureImporter {
    /// Open the media file behind `metadata`, wrap it in a `VideoTexture`,
    /// and preload its audio side. `None` means the video could not be
    /// opened; the caller treats that as a null asset handle.
    pub fn import_video_texture(
        ctx: &GpuContext,
        handle: Uuid,
        metadata: &AssetMetadata,
        asset_directory: &Path,
    ) -> Option<VideoTexture> {
        let full_path = resolve_asset_path(asset_directory, &metadata.file_path);

        if let Err(e) = vireo_media::init() {
            log::error!("[import] ffmpeg initialisation failed: {e}");
            return None;
        }

        let (video, info) = match VideoReader::open(&full_path) {
            Ok(opened) => opened,
            Err(e) => {
                log::error!(
                    "[import] {handle}: could not open video {}: {e}",
                    full_path.display()
                );
                return None;
            }
        };

        let spec = TextureSpecification {
            width:      info.width,
            height:     info.height,
            use_linear: true,
        };

        let mut texture = VideoTexture::new(ctx, spec, full_path, video, info);
        // Audio is optional; preload logs and moves on when absent.
        texture.preload_audio();
        Some(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_paths_resolve_against_the_project_directory() {
        let root = Path::new("/projects/demo/assets");
        let resolved = resolve_asset_path(root, Path::new("videos/intro.mp4"));
        assert_eq!(
            resolved,
            PathBuf::from("/projects/demo/assets/videos/intro.mp4")
        );
    }

    #[test]
    fn opening_a_missing_asset_fails_without_a_device() {
        // The decode layer alone rejects a bad path; no GPU involved.
        vireo_media::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mkv");
        assert!(VideoReader::open(&missing).is_err());
    }
}
