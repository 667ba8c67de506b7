// This is free and unencumbered software released into the public domain.

//! Format/size negotiation against hardware-advertised value sets.

use crate::shared::{FpsRange, Resolution};

/// Relative tolerance within which two aspect ratios count as equal.
pub const ASPECT_RATIO_TOLERANCE: f64 = 0.01;

pub fn aspect_ratio_matches(a: Resolution, b: Resolution) -> bool {
    (a.aspect_ratio() - b.aspect_ratio()).abs() < ASPECT_RATIO_TOLERANCE
}

/// Sort ascending by pixel count. The platform advertises sizes unordered;
/// negotiation relies on this ordering.
pub fn sort_by_pixel_count(sizes: &mut [Resolution]) {
    sizes.sort_by_key(Resolution::pixel_count);
}

/// Index of the entry closest to `target` in an ascending-sorted slice,
/// ties breaking toward the higher candidate. `None` on an empty slice.
pub fn closest_value(sorted: &[i64], target: i64) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }
    match sorted.binary_search(&target) {
        Ok(index) => Some(index),
        Err(0) => Some(0),
        Err(index) if index == sorted.len() => Some(sorted.len() - 1),
        Err(index) => {
            let below = target - sorted[index - 1];
            let above = sorted[index] - target;
            if above <= below {
                Some(index)
            } else {
                Some(index - 1)
            }
        },
    }
}

/// Choose the preview resolution for a target capture size.
///
/// An explicitly requested resolution wins when supported and within the
/// aspect tolerance of the capture size. Otherwise the largest supported
/// size with a matching aspect ratio is taken; failing that, the size
/// minimizing the aspect delta; failing that (empty set), the largest
/// supported size.
pub fn choose_preview_size(
    supported: &[Resolution],
    requested: Option<Resolution>,
    capture: Resolution,
) -> Option<Resolution> {
    if let Some(requested) = requested {
        if supported.contains(&requested) && aspect_ratio_matches(requested, capture) {
            return Some(requested);
        }
    }

    let capture_aspect = capture.aspect_ratio();
    let mut closest: Option<(f64, Resolution)> = None;
    for &size in supported.iter().rev() {
        if aspect_ratio_matches(size, capture) {
            return Some(size);
        }
        let delta = (size.aspect_ratio() - capture_aspect).abs();
        if closest.is_none_or(|(best, _)| delta < best) {
            closest = Some((delta, size));
        }
    }

    closest
        .map(|(_, size)| size)
        .or_else(|| supported.last().copied())
}

/// Clamp a requested still-capture size to the supported list: exact match
/// if present, else the entry with the closest pixel count (ties toward the
/// larger size). Unrequested picks the largest supported size.
pub fn choose_picture_size(
    supported: &[Resolution],
    requested: Option<Resolution>,
) -> Option<Resolution> {
    let Some(requested) = requested else {
        return supported.last().copied();
    };
    if supported.contains(&requested) {
        return Some(requested);
    }
    let areas: Vec<i64> = supported.iter().map(|s| s.pixel_count() as i64).collect();
    closest_value(&areas, requested.pixel_count() as i64).map(|i| supported[i])
}

/// Choose the supported fps range minimizing the summed distance to the
/// requested bounds; an unrequested bound contributes nothing. The list is
/// scanned from its end so equal scores resolve to the later entry; the
/// platform tends to list higher-fps ranges last, but that is observed
/// behavior, not a documented contract. An exact match short-circuits.
///
/// `None` when neither bound is requested: the hardware default stands.
pub fn choose_fps_range(
    supported: &[FpsRange],
    min_fps: Option<i32>,
    max_fps: Option<i32>,
) -> Option<FpsRange> {
    if min_fps.is_none() && max_fps.is_none() {
        return None;
    }

    let mut best: Option<(i64, FpsRange)> = None;
    for &range in supported.iter().rev() {
        let distance = min_fps.map_or(0, |m| i64::from((range.min - m).abs()))
            + max_fps.map_or(0, |m| i64::from((range.max - m).abs()));
        if best.is_none_or(|(score, _)| distance < score) {
            best = Some((distance, range));
            if distance == 0 {
                break;
            }
        }
    }
    best.map(|(_, range)| range)
}
