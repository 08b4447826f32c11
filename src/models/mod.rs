pub mod question;
pub mod settings;

pub use question::{Question, QuestionId, QuestionStats, QuizImage, Section};
pub use settings::{AiSettings, ApiProvider, CustomPrompts, Settings};
