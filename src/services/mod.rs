pub mod image_resolver;
pub mod llm_service;

pub use image_resolver::{HttpImageFetcher, ImageFetcher, ImageResolver, Resolved};
pub use llm_service::{AnswerProvider, AnswerService, PromptCategory};
