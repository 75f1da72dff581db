//! Export of walked parts to disk.

pub mod attachment;

pub use attachment::AttachmentExporter;
