//! Serializable records of a compiled target database.
//!
//! Field names follow the `.mind` wire format (camelCase keys). Cluster
//! entries are indices into the sibling point array of the same record.

use mind_core::{FeaturePoint, TrackingPoint};
use serde::{Deserialize, Serialize};

pub const DATABASE_VERSION: u32 = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledDatabase {
    pub v: u32,
    pub data_list: Vec<TargetRecord>,
}

impl CompiledDatabase {
    pub fn new(data_list: Vec<TargetRecord>) -> Self {
        Self {
            v: DATABASE_VERSION,
            data_list,
        }
    }
}

/// Everything compiled from one source image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub target_image: TargetImage,
    pub tracking_data: Vec<TrackingRecord>,
    pub matching_data: Vec<MatchingRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetImage {
    pub width: u32,
    pub height: u32,
}

/// Tracking points of one tracking keyframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub points: Vec<TrackingFeaturePoint>,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingFeaturePoint {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub template: TemplateRecord,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub mean: f32,
    pub sd: f32,
    pub size: u32,
}

impl From<&TrackingPoint> for TrackingFeaturePoint {
    fn from(p: &TrackingPoint) -> Self {
        Self {
            x: p.x,
            y: p.y,
            scale: p.scale,
            template: TemplateRecord {
                mean: p.template.mean,
                sd: p.template.sd,
                size: p.template.size as u32,
            },
        }
    }
}

/// Described features of one matching keyframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingRecord {
    pub maxima_points: Vec<MatchingPoint>,
    pub minima_points: Vec<MatchingPoint>,
    pub maxima_points_cluster: Vec<Vec<u32>>,
    pub minima_points_cluster: Vec<Vec<u32>>,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl MatchingRecord {
    #[inline]
    pub fn num_points(&self) -> usize {
        self.maxima_points.len() + self.minima_points.len()
    }
}

/// One described feature; `descriptors` holds the packed bits as
/// little-endian 32-bit words.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingPoint {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub angle: f32,
    pub maxima: bool,
    pub descriptors: Vec<u32>,
}

impl From<&FeaturePoint> for MatchingPoint {
    fn from(f: &FeaturePoint) -> Self {
        Self {
            x: f.x,
            y: f.y,
            scale: f.scale,
            angle: f.angle,
            maxima: f.maxima,
            descriptors: f.descriptor.to_words(),
        }
    }
}

pub(crate) fn clusters_to_u32(clusters: &[Vec<usize>]) -> Vec<Vec<u32>> {
    clusters
        .iter()
        .map(|c| c.iter().map(|&i| i as u32).collect())
        .collect()
}
