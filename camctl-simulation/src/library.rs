use async_trait::async_trait;
use camctl_core::error::{CameraError, Result};
use camctl_core::frame::SampleMetadata;
use camctl_core::traits::{AssetId, EncodedImage, MediaLibrary};
use std::sync::{Mutex, PoisonError};

/// 已保存的资源
#[derive(Debug, Clone, PartialEq)]
pub struct SavedAsset {
    pub id: AssetId,
    pub image: EncodedImage,
    pub metadata: SampleMetadata,
}

/// 内存相册
#[derive(Debug, Default)]
pub struct SimLibrary {
    assets: Mutex<Vec<SavedAsset>>,
    failure: Mutex<Option<CameraError>>,
}

impl SimLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> Vec<SavedAsset> {
        self.assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 之后每次保存都失败，传 None 恢复
    pub fn set_failure(&self, failure: Option<CameraError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = failure;
    }
}

#[async_trait]
impl MediaLibrary for SimLibrary {
    async fn save_image(&self, image: EncodedImage, metadata: SampleMetadata) -> Result<AssetId> {
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            tracing::warn!("Library refused asset: {}", err);
            return Err(err);
        }

        let mut assets = self.assets.lock().unwrap_or_else(PoisonError::into_inner);
        let id = AssetId(format!("sim-library://asset/{}", assets.len() + 1));
        tracing::debug!("Saved {} ({} bytes)", id, image.data.len());
        assets.push(SavedAsset {
            id: id.clone(),
            image,
            metadata,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camctl_core::pixel_format::FourCC;

    fn jpeg() -> EncodedImage {
        EncodedImage {
            data: vec![0xff, 0xd8, 0xff, 0xd9],
            format: FourCC::JPEG.into(),
            width: 1,
            height: 1,
        }
    }

    #[tokio::test]
    async fn saves_in_order() {
        let library = SimLibrary::new();
        let a = library.save_image(jpeg(), SampleMetadata::default()).await.unwrap();
        let b = library.save_image(jpeg(), SampleMetadata::default()).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(library.assets().len(), 2);
    }

    #[tokio::test]
    async fn failure_is_sticky_until_cleared() {
        let library = SimLibrary::new();
        library.set_failure(Some(CameraError::PersistFailed("disk full".into())));
        assert!(library.save_image(jpeg(), SampleMetadata::default()).await.is_err());
        assert!(library.save_image(jpeg(), SampleMetadata::default()).await.is_err());

        library.set_failure(None);
        assert!(library.save_image(jpeg(), SampleMetadata::default()).await.is_ok());
    }
}
