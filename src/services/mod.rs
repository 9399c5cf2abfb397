// src/services/mod.rs
pub mod csv_export;
pub mod image_processor;
pub mod impact_scorer;
pub mod llm_service;
pub mod session_store;

pub use image_processor::{ImageProcessor, RawImage};
pub use llm_service::{
    ConversationalDescriber, OpenAIVisionClient, SceneDescriber, VisionClient,
};
pub use session_store::SessionStore;
