pub mod error;
pub mod events;
pub mod extractor;

pub use error::{Disposition, ProcessingError};
pub use events::{JobMessage, MessageError};
pub use extractor::{AudioExtractor, ExtractionError, FfmpegExtractor};
