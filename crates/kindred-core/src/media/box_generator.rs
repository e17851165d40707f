//! BoxImageGenerator -- object-safe wrapper for [`ImageGenerator`].
//!
//! Lets the media service hold "some image backend or none" without a
//! type parameter.

use std::future::Future;
use std::pin::Pin;

use kindred_types::error::MediaError;

use super::generator::{GeneratedImage, ImageGenerator, ImageRequest};

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ImageGeneratorDyn: Send + Sync {
    fn name_dyn(&self) -> &str;

    fn is_available_boxed(&self) -> BoxFut<'_, bool>;

    fn list_checkpoints_boxed(&self) -> BoxFut<'_, Result<Vec<String>, MediaError>>;

    fn generate_boxed<'a>(
        &'a self,
        request: &'a ImageRequest,
    ) -> BoxFut<'a, Result<GeneratedImage, MediaError>>;
}

impl<T: ImageGenerator> ImageGeneratorDyn for T {
    fn name_dyn(&self) -> &str {
        self.name()
    }

    fn is_available_boxed(&self) -> BoxFut<'_, bool> {
        Box::pin(self.is_available())
    }

    fn list_checkpoints_boxed(&self) -> BoxFut<'_, Result<Vec<String>, MediaError>> {
        Box::pin(self.list_checkpoints())
    }

    fn generate_boxed<'a>(
        &'a self,
        request: &'a ImageRequest,
    ) -> BoxFut<'a, Result<GeneratedImage, MediaError>> {
        Box::pin(self.generate(request))
    }
}

pub struct BoxImageGenerator {
    inner: Box<dyn ImageGeneratorDyn + Send + Sync>,
}

impl BoxImageGenerator {
    pub fn new<T: ImageGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Box::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name_dyn()
    }

    pub async fn is_available(&self) -> bool {
        self.inner.is_available_boxed().await
    }

    pub async fn list_checkpoints(&self) -> Result<Vec<String>, MediaError> {
        self.inner.list_checkpoints_boxed().await
    }

    pub async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, MediaError> {
        self.inner.generate_boxed(request).await
    }
}
