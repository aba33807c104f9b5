//! Image-target compilation into `.mind` databases.
//!
//! This crate builds on `mind-core`:
//!
//! - [`image_list`] rescales every source image into matching and tracking
//!   keyframes.
//! - [`compiler`] runs feature extraction over those keyframes as a
//!   [`CompileJob`] with progress reporting and cooperative cancellation.
//! - [`database`] and [`export`] define the serialized records and the
//!   MessagePack encoding.
//! - [`quality`] reports whether an image makes a good target.
//!
//! With the default `image` feature enabled, [`image`](mod@crate::image) and
//! [`app`] add `image::GrayImage` helpers and the config-driven flow used by
//! the `mindc` CLI.
//!
//! # Features
//!
//! - `image` *(default)* – `GrayImage` integration, image loading and the
//!   [`app`] layer.
//! - `rayon` – parallel descriptor computation inside `mind-core`.
//! - `tracing` – spans and events for compile stages and keyframes.

pub mod compiler;
pub mod database;
pub mod error;
pub mod export;
pub mod image_list;
pub mod quality;

#[cfg(feature = "image")]
pub mod app;
#[cfg(feature = "image")]
pub mod image;

pub use mind_core;

pub use crate::compiler::{CancelToken, CompileJob, CompileStage, Compiler, CompilerParams};
pub use crate::database::{CompiledDatabase, MatchingRecord, TargetRecord, TrackingRecord};
pub use crate::error::{CompileError, ExportError};
pub use crate::export::{decode, encode};
pub use crate::image_list::{ImageListParams, Keyframe};
pub use crate::quality::{assess_record, assess_target, TargetReport};
pub use mind_core::{ImageView, InputError};
