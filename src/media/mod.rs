/// Image handling module
///
/// Decoding user photos and producing the full-size and thumbnail
/// JPEGs stored with each photo record.

pub mod processor;

pub use processor::{process_in_background, ImageProcessor, JpegProcessor, ProcessedImage};
