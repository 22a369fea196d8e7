//! Framing layer for the pipeline event stream.

pub mod decoder;

pub use decoder::{Frame, FrameDecoder};
