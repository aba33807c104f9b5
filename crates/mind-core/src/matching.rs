//! Matching-feature pipeline for one keyframe.
//!
//! detect → prune → orient → describe → split by polarity → cluster.

#[cfg(feature = "tracing")]
use tracing::{debug, instrument};

use crate::clustering::{build_clusters, ClusterParams};
use crate::extrema::{detect_extrema, DetectorParams};
use crate::freak::{describe_keypoints, FeaturePoint, FreakParams};
use crate::image::ImageView;
use crate::orientation::{assign_orientations, OrientationParams};
use crate::prune::{prune_keypoints, PruneParams};
use crate::pyramid::{build_dog_pyramid, PyramidParams};

/// Every tunable of the matching pipeline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchingParams {
    pub pyramid: PyramidParams,
    pub detector: DetectorParams,
    pub prune: PruneParams,
    pub orientation: OrientationParams,
    pub freak: FreakParams,
    pub cluster: ClusterParams,
}

/// Described features of one keyframe, split by DoG polarity. Cluster
/// entries index into the matching point list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchingFeatures {
    pub maxima: Vec<FeaturePoint>,
    pub minima: Vec<FeaturePoint>,
    pub maxima_clusters: Vec<Vec<usize>>,
    pub minima_clusters: Vec<Vec<usize>>,
}

impl MatchingFeatures {
    #[inline]
    pub fn len(&self) -> usize {
        self.maxima.len() + self.minima.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the full matching pipeline on one keyframe.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(w = img.width(), h = img.height()))
)]
pub fn extract_matching_features(img: ImageView<'_>, params: &MatchingParams) -> MatchingFeatures {
    let pyr = build_dog_pyramid(img, &params.pyramid);
    let raw = detect_extrema(&pyr, &params.detector);
    #[cfg(feature = "tracing")]
    let raw_count = raw.len();
    let pruned = prune_keypoints(raw, img.width(), img.height(), &params.prune);
    let oriented = assign_orientations(&pyr, &pruned, &params.orientation);
    let described = describe_keypoints(&pyr, &oriented, &params.freak);

    let (maxima, minima): (Vec<_>, Vec<_>) = described.into_iter().partition(|f| f.maxima);
    let maxima_clusters = build_clusters(&maxima, &params.cluster);
    let minima_clusters = build_clusters(&minima, &params.cluster);

    #[cfg(feature = "tracing")]
    debug!(
        raw = raw_count,
        pruned = pruned.len(),
        maxima = maxima.len(),
        minima = minima.len(),
        "matching features"
    );

    MatchingFeatures {
        maxima,
        minima,
        maxima_clusters,
        minima_clusters,
    }
}
