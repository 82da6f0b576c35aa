//! Media classification, audio extraction and the transcoder seam.

pub mod classify;
pub mod extract;
pub mod transcoder;
