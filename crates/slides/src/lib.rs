//! Slide-context grouping.
//!
//! Captured frames are turned into slide text, matched against known slides
//! by token-subset similarity, and used to scope chat history to the slide
//! the user is looking at.

pub mod capture;
pub mod engine;
pub mod similarity;

pub use capture::{read_slide_text, CapturedFrame, FrameCapture, TextExtractor};
pub use engine::{Classification, SlideGroup, SlideGroupEngine};
pub use similarity::subset_similarity;
