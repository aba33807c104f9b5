//! Core primitives for compiling image targets into feature databases.
//!
//! # Overview
//!
//! The crate turns an 8-bit grayscale keyframe into two kinds of features:
//!
//! - **matching features** ([`matching`]) – difference-of-Gaussian extrema
//!   ([`pyramid`], [`extrema`]), spread out by a bucket grid ([`prune`]),
//!   oriented ([`orientation`]) and described by 666-bit FREAK descriptors
//!   ([`freak`]). Features are split by DoG polarity and grouped with a
//!   greedy proximity clustering ([`clustering`]).
//! - **tracking features** ([`tracking`]) – high-gradient pixels on textured
//!   patches, with template statistics computed from summed-area tables
//!   ([`cumsum`]).
//!
//! Everything here is pure computation on in-memory buffers; keyframe
//! resampling, database assembly and serialization live in the
//! `mind-compiler` crate.
//!
//! # Features
//!
//! - `rayon` – computes descriptors for the keypoints of a keyframe in
//!   parallel. Results are identical to the sequential path, including
//!   their order.
//! - `tracing` – emits `tracing` spans for the pipeline stages and debug
//!   events with per-stage counts.

pub mod clustering;
pub mod cumsum;
pub mod error;
pub mod extrema;
pub mod freak;
pub mod hamming;
pub mod image;
pub mod matching;
pub mod orientation;
pub mod prune;
pub mod pyramid;
pub mod tracking;

pub use crate::clustering::{build_clusters, ClusterParams, Point2};
pub use crate::error::InputError;
pub use crate::extrema::{DetectorParams, Keypoint};
pub use crate::freak::{Descriptor, FeaturePoint, FreakParams};
pub use crate::hamming::hamming_distance;
pub use crate::image::{ImageF32, ImageView};
pub use crate::matching::{extract_matching_features, MatchingFeatures, MatchingParams};
pub use crate::orientation::{OrientationParams, OrientedKeypoint};
pub use crate::prune::PruneParams;
pub use crate::pyramid::PyramidParams;
pub use crate::tracking::{extract_tracking_features, TemplateStats, TrackingParams, TrackingPoint};
