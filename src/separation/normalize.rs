//! Output shape normalization
//!
//! Separation graphs do not agree on the axis order of their output. Some
//! emit `[batch, source, time]`, others `[batch, time, source]`. This module
//! classifies a raw output, canonicalizes it to `[batch, source, time]` and
//! keeps the first `k` sources in the order the model produced them.
//!
//! Source indices carry no speaker identity: index 0 is whatever the model
//! emitted first for this input.

use crate::error::{Result, VoxsplitError};
use crate::types::SeparationOutput;
use ndarray::{s, Array3, Axis, Ix2, Ix3};
use std::fmt;
use std::str::FromStr;

/// Number of sources a separation model is expected to emit
pub const DEFAULT_SOURCE_COUNT: usize = 2;

/// Which non-batch axis holds the sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAxis {
    Axis1,
    Axis2,
}

impl FromStr for SourceAxis {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1" => Ok(SourceAxis::Axis1),
            "2" => Ok(SourceAxis::Axis2),
            other => Err(format!("source axis must be 1 or 2, got '{}'", other)),
        }
    }
}

impl fmt::Display for SourceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceAxis::Axis1 => write!(f, "1"),
            SourceAxis::Axis2 => write!(f, "2"),
        }
    }
}

/// How to classify a raw output tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapePolicy {
    /// Axis length that marks an axis as the source axis
    pub source_count: usize,
    /// Source axis to assume when both non-batch axes match `source_count`
    pub ambiguous: SourceAxis,
}

impl Default for ShapePolicy {
    fn default() -> Self {
        Self {
            source_count: DEFAULT_SOURCE_COUNT,
            ambiguous: SourceAxis::Axis1,
        }
    }
}

/// Classified layout of a raw output tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `[batch, source, time]`, already canonical
    SourcesFirst,
    /// `[batch, time, source]`, needs a permutation
    SourcesLast,
    /// `[batch, time]`, a single source
    SingleSource,
}

/// Classify a raw output shape without touching its data
pub fn classify(shape: &[usize], policy: &ShapePolicy) -> Result<Layout> {
    match *shape {
        [_, _] => Ok(Layout::SingleSource),
        [_, d1, d2] => {
            let n = policy.source_count;
            match (d1 == n, d2 == n) {
                (true, true) => Ok(match policy.ambiguous {
                    SourceAxis::Axis1 => Layout::SourcesFirst,
                    SourceAxis::Axis2 => Layout::SourcesLast,
                }),
                (true, false) => Ok(Layout::SourcesFirst),
                (false, true) => Ok(Layout::SourcesLast),
                (false, false) => Err(VoxsplitError::shape(
                    shape,
                    format!("neither axis 1 nor axis 2 has length {}", n),
                )),
            }
        }
        _ => Err(VoxsplitError::shape(
            shape,
            format!("expected a rank-2 or rank-3 tensor, got rank {}", shape.len()),
        )),
    }
}

/// Canonicalize a raw output to `[batch, source, time]` and keep the first
/// `min(num_sources, available)` sources
pub fn normalize(
    raw: SeparationOutput,
    num_sources: usize,
    policy: &ShapePolicy,
) -> Result<Array3<f32>> {
    let shape = raw.shape().to_vec();
    let layout = classify(&shape, policy)?;

    let canonical: Array3<f32> = match layout {
        Layout::SourcesFirst => raw
            .into_dimensionality::<Ix3>()
            .map_err(|e| VoxsplitError::shape(&shape, e.to_string()))?,
        Layout::SourcesLast => raw
            .into_dimensionality::<Ix3>()
            .map_err(|e| VoxsplitError::shape(&shape, e.to_string()))?
            .permuted_axes([0, 2, 1]),
        Layout::SingleSource => raw
            .into_dimensionality::<Ix2>()
            .map_err(|e| VoxsplitError::shape(&shape, e.to_string()))?
            .insert_axis(Axis(1)),
    };

    let available = canonical.len_of(Axis(1));
    let keep = num_sources.min(available);
    if keep == 0 {
        return Err(VoxsplitError::shape(&shape, "no sources available"));
    }

    Ok(canonical.slice_move(s![.., ..keep, ..]).as_standard_layout().into_owned())
}
