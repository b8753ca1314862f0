//! End-to-end question answering over a document set

mod pipeline;

pub use pipeline::{Answer, QaPipeline};
