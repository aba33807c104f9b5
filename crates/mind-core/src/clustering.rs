//! Greedy proximity clustering of feature points.
//!
//! Points are visited in input order. Every point not yet assigned becomes a
//! seed and absorbs all later unassigned points strictly closer than
//! `radius` to the seed. Clusters are index lists into the input slice, so
//! every point belongs to exactly one cluster.

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::freak::FeaturePoint;

pub const CLUSTER_RADIUS: f32 = 20.0;

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterParams {
    /// Membership radius in keyframe pixels (strict).
    pub radius: f32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            radius: CLUSTER_RADIUS,
        }
    }
}

/// Anything with a planar position.
pub trait Point2 {
    fn xy(&self) -> (f32, f32);
}

impl Point2 for FeaturePoint {
    #[inline]
    fn xy(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

impl Point2 for (f32, f32) {
    #[inline]
    fn xy(&self) -> (f32, f32) {
        *self
    }
}

impl Point2 for [f32; 2] {
    #[inline]
    fn xy(&self) -> (f32, f32) {
        (self[0], self[1])
    }
}

/// Partition `points` into seed-centred clusters.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(points = points.len()))
)]
pub fn build_clusters<P: Point2>(points: &[P], params: &ClusterParams) -> Vec<Vec<usize>> {
    let r2 = params.radius * params.radius;
    let mut assigned = vec![false; points.len()];
    let mut clusters = Vec::new();

    for seed in 0..points.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let (sx, sy) = points[seed].xy();
        let mut members = vec![seed];

        for (j, p) in points.iter().enumerate().skip(seed + 1) {
            if assigned[j] {
                continue;
            }
            let (x, y) = p.xy();
            let (dx, dy) = (x - sx, y - sy);
            if dx * dx + dy * dy < r2 {
                assigned[j] = true;
                members.push(j);
            }
        }
        clusters.push(members);
    }

    clusters
}
