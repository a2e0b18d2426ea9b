//! Retained-mode forward scene renderer.
//!
//! `core` wraps the GPU device, `scene` holds what is drawn, `pipeline` draws
//! it (ambient pass, one additive pass per light, shadow maps, overlays) and
//! `app` runs the frame loop.

pub mod app;
pub mod core;
pub mod geometry;
pub mod io;
pub mod pipeline;
pub mod scene;
