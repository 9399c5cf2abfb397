use crate::errors::{EcoVisionError, TransportKind};
use crate::services::image_processor::RawImage;
use crate::services::llm_service::{VisionClient, VisionRequest};
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// PNG bytes of a small gradient, as a browser would upload them.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 90])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

pub fn raw_fixture() -> RawImage {
    RawImage::new(image::load_from_memory(&png_fixture(8, 8)).unwrap())
}

/// [`VisionClient`] answering every request with a fixed reply.
pub struct StaticVision {
    reply: String,
    calls: AtomicUsize,
    last: Mutex<Option<VisionRequest>>,
}

impl StaticVision {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<VisionRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionClient for StaticVision {
    async fn complete(&self, request: &VisionRequest) -> Result<String, EcoVisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        Ok(self.reply.clone())
    }
}

/// [`VisionClient`] that always fails with the given transport error.
pub struct FailingVision {
    kind: TransportKind,
    message: String,
    calls: AtomicUsize,
}

impl FailingVision {
    pub fn new(kind: TransportKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionClient for FailingVision {
    async fn complete(&self, _request: &VisionRequest) -> Result<String, EcoVisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EcoVisionError::transport(self.kind, self.message.clone()))
    }
}
