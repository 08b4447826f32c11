pub mod extractor;
pub mod store;

pub use extractor::{
    scan, ExtractOutcome, Extraction, ExtractionSummary, LogProgress, PendingExtraction,
    ProgressObserver,
};
pub use store::{QuestionStore, StoreSnapshot};
