// This is free and unencumbered software released into the public domain.

//! Camera session layer: lifecycle, preview negotiation, and still capture
//! over an opaque native camera handle driven from a dedicated worker thread.

pub mod cli;
pub mod shared;
