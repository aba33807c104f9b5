//! Spatial bucketing that caps the number of keypoints per grid cell.
//!
//! The keyframe plane is split into `n × n` buckets; each keeps at most
//! `max_per_bucket` keypoints, strongest `|response|` first. The total output
//! is therefore bounded by `n² · max_per_bucket` regardless of content.

use crate::extrema::Keypoint;

pub const NUM_BUCKETS_PER_DIMENSION: usize = 10;
pub const MAX_FEATURES_PER_BUCKET: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct PruneParams {
    pub buckets_per_dimension: usize,
    pub max_per_bucket: usize,
}

impl Default for PruneParams {
    fn default() -> Self {
        Self {
            buckets_per_dimension: NUM_BUCKETS_PER_DIMENSION,
            max_per_bucket: MAX_FEATURES_PER_BUCKET,
        }
    }
}

impl PruneParams {
    /// Upper bound on the pruned keypoint count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets_per_dimension * self.buckets_per_dimension * self.max_per_bucket
    }
}

/// Bucket index of a position on a `width × height` plane.
#[inline]
pub fn bucket_of(x: f32, y: f32, width: usize, height: usize, n: usize) -> usize {
    let cell = |v: f32, extent: usize| -> usize {
        if !(v > 0.0) || extent == 0 {
            return 0;
        }
        ((v * n as f32 / extent as f32) as usize).min(n - 1)
    };
    cell(y, height) * n + cell(x, width)
}

/// Keep the strongest keypoints of every bucket.
///
/// Output is bucket-major; inside a bucket entries are sorted by decreasing
/// `|response|`, with input order breaking ties.
pub fn prune_keypoints(
    keypoints: Vec<Keypoint>,
    width: usize,
    height: usize,
    params: &PruneParams,
) -> Vec<Keypoint> {
    let n = params.buckets_per_dimension.max(1);
    let mut buckets: Vec<Vec<Keypoint>> = vec![Vec::new(); n * n];
    for kp in keypoints {
        buckets[bucket_of(kp.x, kp.y, width, height, n)].push(kp);
    }

    let mut out = Vec::new();
    for mut bucket in buckets {
        // stable sort keeps earlier detections first on equal strength
        bucket.sort_by(|a, b| b.response.abs().total_cmp(&a.response.abs()));
        bucket.truncate(params.max_per_bucket);
        out.append(&mut bucket);
    }

    debug_assert!(
        out.len() <= n * n * params.max_per_bucket,
        "bucket pruning exceeded its capacity"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn kp(x: f32, y: f32, response: f32) -> Keypoint {
        Keypoint {
            x,
            y,
            scale: 2.0,
            octave: 1,
            maxima: response > 0.0,
            response,
        }
    }

    #[test]
    fn total_is_bounded_for_dense_random_input() {
        let params = PruneParams::default();
        let mut rng = StdRng::seed_from_u64(42);
        for &(w, h) in &[(64usize, 64usize), (640, 480), (13, 97)] {
            let kps: Vec<_> = (0..5000)
                .map(|_| {
                    kp(
                        rng.gen_range(0.0..w as f32),
                        rng.gen_range(0.0..h as f32),
                        rng.gen_range(-50.0..50.0),
                    )
                })
                .collect();
            let pruned = prune_keypoints(kps, w, h, &params);
            assert!(pruned.len() <= params.capacity());
            assert!(pruned.len() <= 500);

            let mut counts = vec![0usize; 100];
            for k in &pruned {
                counts[bucket_of(k.x, k.y, w, h, 10)] += 1;
            }
            assert!(counts.iter().all(|&c| c <= MAX_FEATURES_PER_BUCKET));
        }
    }

    #[test]
    fn all_points_in_one_bucket_keep_the_strongest() {
        let kps: Vec<_> = (0..12).map(|i| kp(1.0, 1.0, i as f32 - 6.0)).collect();
        let pruned = prune_keypoints(kps, 100, 100, &PruneParams::default());
        let responses: Vec<f32> = pruned.iter().map(|k| k.response).collect();
        // |-6| first, then |5| and |-5| in input order, then |4| and |-4|.
        assert_eq!(responses, vec![-6.0, -5.0, 5.0, -4.0, 4.0]);
    }

    #[test]
    fn sparse_input_is_kept_whole() {
        let kps = vec![kp(5.0, 5.0, 1.0), kp(95.0, 95.0, 2.0), kp(50.0, 5.0, -3.0)];
        let pruned = prune_keypoints(kps, 100, 100, &PruneParams::default());
        assert_eq!(pruned.len(), 3);
    }

    #[test]
    fn out_of_plane_positions_land_in_edge_buckets() {
        assert_eq!(bucket_of(-3.0, -1.0, 100, 100, 10), 0);
        assert_eq!(bucket_of(250.0, 250.0, 100, 100, 10), 99);
        assert_eq!(bucket_of(f32::NAN, 50.0, 100, 100, 10), 50);
    }
}
