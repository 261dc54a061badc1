pub mod context;
pub mod topics;

pub use context::{ExamContext, ExamContextDetector};
pub use topics::aggregate;
