//! Dense per-voxel filter responses for feature accumulation.
//!
//! Filters run over the halo-expanded block window so responses near block
//! seams see the same context they would in a whole-volume run.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use common::Buffer3;

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Filter {
    GaussianSmoothing,
    LaplacianOfGaussian,
    GradientMagnitude,
}

impl Filter {
    pub fn apply(&self, input: &Buffer3<f32>, sigma: f64) -> Buffer3<f32> {
        match self {
            Filter::GaussianSmoothing => gaussian_smooth(input, sigma),
            Filter::LaplacianOfGaussian => laplacian(&gaussian_smooth(input, sigma)),
            Filter::GradientMagnitude => gradient_magnitude(&gaussian_smooth(input, sigma)),
        }
    }
}

/// Symmetric border reflection: -1 maps to 0, n maps to n - 1.
#[inline]
fn reflect(mut i: isize, n: isize) -> usize {
    debug_assert!(n > 0);
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as usize;
        }
    }
}

fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as isize;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    for i in -radius..=radius {
        let x = i as f64 / sigma;
        kernel.push((-0.5 * x * x).exp());
    }
    let sum: f64 = kernel.iter().sum();
    kernel.iter().map(|w| (w / sum) as f32).collect()
}

fn convolve_axis(input: &Buffer3<f32>, kernel: &[f32], axis: usize) -> Buffer3<f32> {
    let shape = input.shape();
    let radius = (kernel.len() / 2) as isize;
    let n = shape[axis] as isize;

    let mut out = Buffer3::new_default(shape);
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                let p = [z, y, x];
                let mut acc = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let mut q = p;
                    q[axis] = reflect(p[axis] as isize + k as isize - radius, n);
                    acc += w * *input.get(q);
                }
                *out.get_mut(p) = acc;
            }
        }
    }
    out
}

fn gaussian_smooth(input: &Buffer3<f32>, sigma: f64) -> Buffer3<f32> {
    let kernel = gaussian_kernel(sigma);
    let mut out = convolve_axis(input, &kernel, 0);
    out = convolve_axis(&out, &kernel, 1);
    convolve_axis(&out, &kernel, 2)
}

/// Value at the reflected neighbor one step along `axis`.
#[inline]
fn neighbor(input: &Buffer3<f32>, p: [usize; 3], axis: usize, step: isize) -> f32 {
    let n = input.shape()[axis] as isize;
    let mut q = p;
    q[axis] = reflect(p[axis] as isize + step, n);
    *input.get(q)
}

fn laplacian(input: &Buffer3<f32>) -> Buffer3<f32> {
    let shape = input.shape();
    let mut out = Buffer3::new_default(shape);
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                let p = [z, y, x];
                let center = *input.get(p);
                let mut acc = 0.0f32;
                for axis in 0..3 {
                    acc += neighbor(input, p, axis, 1) + neighbor(input, p, axis, -1)
                        - 2.0 * center;
                }
                *out.get_mut(p) = acc;
            }
        }
    }
    out
}

fn gradient_magnitude(input: &Buffer3<f32>) -> Buffer3<f32> {
    let shape = input.shape();
    let mut out = Buffer3::new_default(shape);
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                let p = [z, y, x];
                let mut acc = 0.0f32;
                for axis in 0..3 {
                    let grad =
                        0.5 * (neighbor(input, p, axis, 1) - neighbor(input, p, axis, -1));
                    acc += grad * grad;
                }
                *out.get_mut(p) = acc.sqrt();
            }
        }
    }
    out
}
