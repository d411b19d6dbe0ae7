//! Named augmentation profiles
//!
//! Every profile emits a normalized `[3, 224, 224]` pixel buffer. The
//! few-shot profiles mirror the source/target recipe (random resized crop +
//! flip for training, resize + center crop for evaluation); the VTAB profile
//! is a plain resize.

use rand::rngs::StdRng;
use rand::Rng;

/// Model input side length
pub const INPUT_SIZE: usize = 224;

/// Shorter-side resize used before the evaluation center crop
const EVAL_RESIZE: usize = 256;

/// Channel normalization for the in21k-pretrained backbone
const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Augmentation pipeline selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformProfile {
    /// Few-shot training: random resized crop to 224 + horizontal flip
    FgfsTrain,
    /// Few-shot evaluation: resize shorter side to 256, center crop 224
    FgfsTest,
    /// VTAB train/eval: direct resize to 224
    Vtab,
}

impl TransformProfile {
    /// Apply the profile to one CHW image, producing `[3, 224, 224]`
    pub fn apply(
        self,
        pixels: &[f32],
        channels: usize,
        height: usize,
        width: usize,
        rng: &mut StdRng,
    ) -> Vec<f32> {
        let out = match self {
            TransformProfile::FgfsTrain => {
                let cropped = random_resized_crop(pixels, channels, height, width, rng);
                if rng.gen_range(0.0_f32..1.0_f32) < 0.5 {
                    hflip(&cropped, channels, INPUT_SIZE, INPUT_SIZE)
                } else {
                    cropped
                }
            }
            TransformProfile::FgfsTest => {
                let (resized, rh, rw) = resize_shorter_side(pixels, channels, height, width);
                center_crop(&resized, channels, rh, rw)
            }
            TransformProfile::Vtab => {
                resize(pixels, channels, height, width, INPUT_SIZE, INPUT_SIZE)
            }
        };
        normalize(out)
    }
}

/// Bilinear resize of a CHW image
fn resize(
    pixels: &[f32],
    channels: usize,
    height: usize,
    width: usize,
    out_h: usize,
    out_w: usize,
) -> Vec<f32> {
    if height == out_h && width == out_w {
        return pixels.to_vec();
    }

    let mut output = vec![0.0; channels * out_h * out_w];
    let scale_y = height as f32 / out_h as f32;
    let scale_x = width as f32 / out_w as f32;

    for c in 0..channels {
        let plane = &pixels[c * height * width..(c + 1) * height * width];
        for oy in 0..out_h {
            let sy = ((oy as f32 + 0.5) * scale_y - 0.5).max(0.0);
            let y0 = (sy as usize).min(height - 1);
            let y1 = (y0 + 1).min(height - 1);
            let fy = sy - y0 as f32;
            for ox in 0..out_w {
                let sx = ((ox as f32 + 0.5) * scale_x - 0.5).max(0.0);
                let x0 = (sx as usize).min(width - 1);
                let x1 = (x0 + 1).min(width - 1);
                let fx = sx - x0 as f32;

                let top = plane[y0 * width + x0] * (1.0 - fx) + plane[y0 * width + x1] * fx;
                let bottom = plane[y1 * width + x0] * (1.0 - fx) + plane[y1 * width + x1] * fx;
                output[c * out_h * out_w + oy * out_w + ox] = top * (1.0 - fy) + bottom * fy;
            }
        }
    }

    output
}

/// Resize so the shorter side equals `EVAL_RESIZE`, keeping aspect ratio
fn resize_shorter_side(
    pixels: &[f32],
    channels: usize,
    height: usize,
    width: usize,
) -> (Vec<f32>, usize, usize) {
    let (out_h, out_w) = if height <= width {
        let out_w = (width * EVAL_RESIZE + height / 2) / height;
        (EVAL_RESIZE, out_w.max(INPUT_SIZE))
    } else {
        let out_h = (height * EVAL_RESIZE + width / 2) / width;
        (out_h.max(INPUT_SIZE), EVAL_RESIZE)
    };
    let resized = resize(pixels, channels, height, width, out_h, out_w);
    (resized, out_h, out_w)
}

/// Crop the centered 224x224 window
fn center_crop(pixels: &[f32], channels: usize, height: usize, width: usize) -> Vec<f32> {
    let top = (height - INPUT_SIZE) / 2;
    let left = (width - INPUT_SIZE) / 2;
    crop(pixels, channels, height, width, top, left, INPUT_SIZE, INPUT_SIZE)
}

fn crop(
    pixels: &[f32],
    channels: usize,
    height: usize,
    width: usize,
    top: usize,
    left: usize,
    crop_h: usize,
    crop_w: usize,
) -> Vec<f32> {
    let mut output = vec![0.0; channels * crop_h * crop_w];
    for c in 0..channels {
        for y in 0..crop_h {
            let src = c * height * width + (top + y) * width + left;
            let dst = c * crop_h * crop_w + y * crop_w;
            output[dst..dst + crop_w].copy_from_slice(&pixels[src..src + crop_w]);
        }
    }
    output
}

/// Random resized crop: sample an area/aspect window, crop, resize to 224
fn random_resized_crop(
    pixels: &[f32],
    channels: usize,
    height: usize,
    width: usize,
    rng: &mut StdRng,
) -> Vec<f32> {
    let area = (height * width) as f32;

    for _ in 0..10 {
        let target_area = area * rng.gen_range(0.08_f32..1.0_f32);
        let log_ratio = rng.gen_range((0.75_f32).ln()..(4.0_f32 / 3.0).ln());
        let ratio = log_ratio.exp();

        let crop_w = (target_area * ratio).sqrt().round() as usize;
        let crop_h = (target_area / ratio).sqrt().round() as usize;

        if crop_w >= 1 && crop_w <= width && crop_h >= 1 && crop_h <= height {
            let top = rng.gen_range(0..=height - crop_h);
            let left = rng.gen_range(0..=width - crop_w);
            let window = crop(pixels, channels, height, width, top, left, crop_h, crop_w);
            return resize(&window, channels, crop_h, crop_w, INPUT_SIZE, INPUT_SIZE);
        }
    }

    // Fallback: full-image resize
    resize(pixels, channels, height, width, INPUT_SIZE, INPUT_SIZE)
}

/// Mirror a CHW image horizontally
fn hflip(pixels: &[f32], channels: usize, height: usize, width: usize) -> Vec<f32> {
    let mut output = vec![0.0; pixels.len()];
    for c in 0..channels {
        for y in 0..height {
            for x in 0..width {
                output[c * height * width + y * width + x] =
                    pixels[c * height * width + y * width + (width - 1 - x)];
            }
        }
    }
    output
}

/// Per-channel mean/std normalization of a `[3, 224, 224]` buffer
fn normalize(mut pixels: Vec<f32>) -> Vec<f32> {
    let plane = INPUT_SIZE * INPUT_SIZE;
    for (c, value) in pixels.iter_mut().enumerate().map(|(i, v)| (i / plane, v)) {
        *value = (*value - MEAN[c]) / STD[c];
    }
    pixels
}
