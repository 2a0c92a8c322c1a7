//! Proximity analysis
//!
//! A single whole-image OCR pass merges text blocks that touch on the same line, or
//! attributes their fragments to the wrong region. Regions packed that closely are
//! flagged so the router recognizes each one on its own crop.

use tracing::debug;

use super::Region;

/// Same-line threshold as a fraction of the pair's mean height
const SAME_LINE_RATIO: f32 = 0.5;
/// Adjacency threshold as a fraction of the pair's mean width
const ADJACENT_RATIO: f32 = 0.5;

/// Whether two regions sit on the same text line and touch horizontally
pub fn are_adjacent(a: &Region, b: &Region) -> bool {
    let (a, b) = (&a.bounds, &b.bounds);

    let (_, cy_a) = a.center();
    let (_, cy_b) = b.center();
    let avg_height = (a.height() + b.height()) / 2.0;

    if (cy_a - cy_b).abs() >= avg_height * SAME_LINE_RATIO {
        return false;
    }

    let horizontal_gap = a.x1.max(b.x1) - a.x2.min(b.x2);
    let avg_width = (a.width() + b.width()) / 2.0;

    horizontal_gap < avg_width * ADJACENT_RATIO
}

/// Flag every region that has an adjacent neighbour for isolated recognition.
///
/// Pairwise over all regions; flags are only ever set, never cleared.
/// Returns the number of adjacent pairs found.
pub fn mark_adjacent_regions(regions: &mut [Region]) -> usize {
    let mut pairs = 0;

    for i in 0..regions.len() {
        for j in (i + 1)..regions.len() {
            if !are_adjacent(&regions[i], &regions[j]) {
                continue;
            }
            regions[i].requires_isolated_recognition = true;
            regions[j].requires_isolated_recognition = true;
            pairs += 1;

            debug!(
                "'{}' and '{}' are adjacent, using isolated OCR",
                regions[i].class_label, regions[j].class_label
            );
        }
    }

    pairs
}
