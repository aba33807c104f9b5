//! Compile jobs: keyframe lists in, target database out.
//!
//! A [`CompileJob`] walks through `Idle → Matching → Tracking → Assembled →
//! Exported`. The matching stage reports progress from 0 to 50, the
//! tracking stage from 50 to 100, one tick per keyframe. The job checks its
//! [`CancelToken`] before every keyframe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument};

use mind_core::{
    extract_matching_features, extract_tracking_features, ImageView, MatchingParams,
    TrackingParams,
};

use crate::database::{
    clusters_to_u32, CompiledDatabase, MatchingRecord, TargetImage, TargetRecord, TrackingRecord,
};
use crate::error::CompileError;
use crate::export;
use crate::image_list::{build_image_list, build_tracking_image_list, ImageListParams};

/// All tunables of a compile job.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompilerParams {
    pub matching: MatchingParams,
    pub tracking: TrackingParams,
    pub image_list: ImageListParams,
}

impl CompilerParams {
    pub fn with_matching(mut self, matching: MatchingParams) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingParams) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn with_image_list(mut self, image_list: ImageListParams) -> Self {
        self.image_list = image_list;
        self
    }
}

/// Shared flag for cooperative cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStage {
    Idle,
    Matching,
    Tracking,
    Assembled,
    Exported,
}

const MATCHING_SHARE: f32 = 50.0;

/// One compilation over a batch of images.
pub struct CompileJob<'a> {
    images: Vec<ImageView<'a>>,
    params: &'a CompilerParams,
    cancel: Option<CancelToken>,
    stage: CompileStage,
    progress: f32,
    matching: Vec<Vec<MatchingRecord>>,
    tracking: Vec<Vec<TrackingRecord>>,
    database: Option<CompiledDatabase>,
}

impl<'a> CompileJob<'a> {
    /// Views are validated when they are built, so a job can always start.
    pub fn new(images: &[ImageView<'a>], params: &'a CompilerParams) -> Self {
        Self {
            images: images.to_vec(),
            params,
            cancel: None,
            stage: CompileStage::Idle,
            progress: 0.0,
            matching: Vec::new(),
            tracking: Vec::new(),
            database: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[inline]
    pub fn stage(&self) -> CompileStage {
        self.stage
    }

    #[inline]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn database(&self) -> Option<&CompiledDatabase> {
        self.database.as_ref()
    }

    pub fn into_database(self) -> Option<CompiledDatabase> {
        self.database
    }

    /// Run both extraction stages and assemble the database.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(images = self.images.len()))
    )]
    pub fn run(&mut self, mut on_progress: impl FnMut(f32)) -> Result<&CompiledDatabase, CompileError> {
        if self.stage != CompileStage::Idle {
            return Err(CompileError::InvalidStage {
                action: "run",
                stage: self.stage,
            });
        }

        self.stage = CompileStage::Matching;
        self.run_matching(&mut on_progress)?;

        self.stage = CompileStage::Tracking;
        self.run_tracking(&mut on_progress)?;

        self.assemble();
        self.report(100.0, &mut on_progress);

        #[cfg(feature = "tracing")]
        info!("compilation finished");

        self.database.as_ref().ok_or(CompileError::InvalidStage {
            action: "assemble",
            stage: self.stage,
        })
    }

    /// Encode the assembled database.
    pub fn export(&mut self) -> Result<Vec<u8>, CompileError> {
        let db = match (&self.stage, &self.database) {
            (CompileStage::Assembled | CompileStage::Exported, Some(db)) => db,
            _ => {
                return Err(CompileError::InvalidStage {
                    action: "export",
                    stage: self.stage,
                })
            }
        };
        let bytes = export::encode(db)?;
        self.stage = CompileStage::Exported;
        Ok(bytes)
    }

    fn check_cancelled(&self) -> Result<(), CompileError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(CompileError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Forward a progress value, never letting it go backwards.
    fn report(&mut self, value: f32, on_progress: &mut impl FnMut(f32)) {
        self.progress = value.clamp(0.0, 100.0).max(self.progress);
        on_progress(self.progress);
    }

    fn stage_progress(base: f32, image: usize, done: usize, total: usize, n_images: usize) -> f32 {
        let within = if total == 0 { 1.0 } else { done as f32 / total as f32 };
        base + MATCHING_SHARE * (image as f32 + within) / n_images as f32
    }

    fn run_matching(&mut self, on_progress: &mut impl FnMut(f32)) -> Result<(), CompileError> {
        let n = self.images.len();
        for i in 0..n {
            let img = self.images[i];
            let keyframes = build_image_list(img, &self.params.image_list);
            let mut records = Vec::with_capacity(keyframes.len());

            for (k, kf) in keyframes.iter().enumerate() {
                self.check_cancelled()?;
                let view = kf
                    .view()
                    .map_err(|source| CompileError::Input { index: i, source })?;
                let f = extract_matching_features(view, &self.params.matching);

                #[cfg(feature = "tracing")]
                debug!(
                    image = i,
                    scale = kf.scale,
                    maxima = f.maxima.len(),
                    minima = f.minima.len(),
                    "matching keyframe"
                );

                records.push(MatchingRecord {
                    maxima_points: f.maxima.iter().map(Into::into).collect(),
                    minima_points: f.minima.iter().map(Into::into).collect(),
                    maxima_points_cluster: clusters_to_u32(&f.maxima_clusters),
                    minima_points_cluster: clusters_to_u32(&f.minima_clusters),
                    width: kf.width as u32,
                    height: kf.height as u32,
                    scale: kf.scale,
                });
                let p = Self::stage_progress(0.0, i, k + 1, keyframes.len(), n);
                self.report(p, on_progress);
            }
            self.matching.push(records);
        }
        Ok(())
    }

    fn run_tracking(&mut self, on_progress: &mut impl FnMut(f32)) -> Result<(), CompileError> {
        let n = self.images.len();
        for i in 0..n {
            let img = self.images[i];
            let keyframes = build_tracking_image_list(img, &self.params.image_list);
            let mut records = Vec::with_capacity(keyframes.len());

            for (k, kf) in keyframes.iter().enumerate() {
                self.check_cancelled()?;
                let view = kf
                    .view()
                    .map_err(|source| CompileError::Input { index: i, source })?;
                let points = extract_tracking_features(view, &self.params.tracking);

                #[cfg(feature = "tracing")]
                debug!(image = i, scale = kf.scale, points = points.len(), "tracking keyframe");

                records.push(TrackingRecord {
                    points: points.iter().map(Into::into).collect(),
                    width: kf.width as u32,
                    height: kf.height as u32,
                    scale: kf.scale,
                });
                let p = Self::stage_progress(MATCHING_SHARE, i, k + 1, keyframes.len(), n);
                self.report(p, on_progress);
            }
            self.tracking.push(records);
        }
        Ok(())
    }

    fn assemble(&mut self) {
        let matching = std::mem::take(&mut self.matching);
        let tracking = std::mem::take(&mut self.tracking);
        let data_list = self
            .images
            .iter()
            .zip(matching.into_iter().zip(tracking))
            .map(|(img, (matching_data, tracking_data))| TargetRecord {
                target_image: TargetImage {
                    width: img.width() as u32,
                    height: img.height() as u32,
                },
                tracking_data,
                matching_data,
            })
            .collect();
        self.database = Some(CompiledDatabase::new(data_list));
        self.stage = CompileStage::Assembled;
    }
}

/// Convenience front end owning the parameters and an optional cancel
/// token.
#[derive(Clone, Debug, Default)]
pub struct Compiler {
    params: CompilerParams,
    cancel: Option<CancelToken>,
}

impl Compiler {
    pub fn new(params: CompilerParams) -> Self {
        Self {
            params,
            cancel: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn params(&self) -> &CompilerParams {
        &self.params
    }

    fn job<'a>(&'a self, images: &[ImageView<'a>]) -> CompileJob<'a> {
        let job = CompileJob::new(images, &self.params);
        match &self.cancel {
            Some(token) => job.with_cancel_token(token.clone()),
            None => job,
        }
    }

    /// Compile `images` into a database, reporting progress in `[0, 100]`.
    pub fn compile(
        &self,
        images: &[ImageView<'_>],
        on_progress: impl FnMut(f32),
    ) -> Result<CompiledDatabase, CompileError> {
        let mut job = self.job(images);
        job.run(on_progress)?;
        job.into_database().ok_or(CompileError::InvalidStage {
            action: "compile",
            stage: CompileStage::Assembled,
        })
    }

    /// Compile and encode in one go.
    pub fn compile_to_bytes(
        &self,
        images: &[ImageView<'_>],
        on_progress: impl FnMut(f32),
    ) -> Result<Vec<u8>, CompileError> {
        let mut job = self.job(images);
        job.run(on_progress)?;
        job.export()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_progress_spans_each_half() {
        assert_eq!(CompileJob::stage_progress(0.0, 0, 0, 4, 2), 0.0);
        assert_eq!(CompileJob::stage_progress(0.0, 1, 4, 4, 2), 50.0);
        assert_eq!(CompileJob::stage_progress(50.0, 0, 2, 4, 2), 62.5);
        assert_eq!(CompileJob::stage_progress(50.0, 1, 4, 4, 2), 100.0);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn export_before_run_is_rejected() {
        let params = CompilerParams::default();
        let data = vec![0u8; 16];
        let view = ImageView::from_u8_slice(4, 4, &data).unwrap();
        let mut job = CompileJob::new(&[view], &params);
        assert!(matches!(
            job.export(),
            Err(CompileError::InvalidStage { action: "export", stage: CompileStage::Idle })
        ));
    }
}
