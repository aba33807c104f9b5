//! `image::GrayImage` helpers for the compiler.
//!
//! These wrappers expose the compile entry points in terms of
//! `image::GrayImage`, which is convenient for most downstream consumers.

use image::GrayImage;
use mind_core::{ImageView, InputError};

use crate::compiler::{Compiler, CompilerParams};
use crate::database::CompiledDatabase;
use crate::error::CompileError;
use crate::quality::{assess_target, TargetReport};

/// Borrow a `GrayImage` as a validated view.
#[inline]
pub fn gray_view(img: &GrayImage) -> Result<ImageView<'_>, InputError> {
    ImageView::from_u8_slice(img.width() as usize, img.height() as usize, img.as_raw())
}

fn views(images: &[GrayImage]) -> Result<Vec<ImageView<'_>>, CompileError> {
    images
        .iter()
        .enumerate()
        .map(|(index, img)| gray_view(img).map_err(|source| CompileError::Input { index, source }))
        .collect()
}

/// Compile a batch of `GrayImage`s into a database.
pub fn compile_images(
    images: &[GrayImage],
    params: &CompilerParams,
    on_progress: impl FnMut(f32),
) -> Result<CompiledDatabase, CompileError> {
    let views = views(images)?;
    Compiler::new(params.clone()).compile(&views, on_progress)
}

/// Quality report for one `GrayImage`.
pub fn assess_image(img: &GrayImage, params: &CompilerParams) -> Result<TargetReport, CompileError> {
    let view = gray_view(img).map_err(|source| CompileError::Input { index: 0, source })?;
    assess_target(view, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn empty_gray_image_is_rejected() {
        let img = GrayImage::new(0, 5);
        assert!(matches!(gray_view(&img), Err(InputError::ZeroDimension { .. })));
    }

    #[test]
    fn batch_keeps_one_record_per_image() {
        let a = GrayImage::from_pixel(40, 40, Luma([10u8]));
        let b = GrayImage::from_pixel(30, 50, Luma([200u8]));
        let db = compile_images(&[a, b], &CompilerParams::default(), |_| {}).unwrap();
        assert_eq!(db.data_list.len(), 2);
        assert_eq!(db.data_list[0].target_image.width, 40);
        assert_eq!(db.data_list[1].target_image.height, 50);
    }

    #[test]
    fn malformed_batch_member_is_named_before_any_work() {
        let images = [GrayImage::from_pixel(16, 16, Luma([10u8])), GrayImage::new(0, 5)];
        let mut called = false;
        let res = compile_images(&images, &CompilerParams::default(), |_| called = true);
        assert!(matches!(
            res,
            Err(CompileError::Input {
                index: 1,
                source: InputError::ZeroDimension { .. }
            })
        ));
        assert!(!called);
    }
}
