//! Contiguous stake-weighted sampling slots.
//!
//! Each connected peer owns a span `[start, start + score)` on a shared u64
//! number line. Drawing a uniform point on the line and resolving it to a
//! slot samples peers proportionally to their stake. Slots whose peer lost
//! its last node are marked dead but keep their span, so the line fragments
//! over time; the manager compacts it when selection starts missing.

use serac_types::PeerId;

/// Window size below which the dichotomic search falls back to linear scan.
const LINEAR_SCAN_THRESHOLD: usize = 8;

/// A span on the sampling number line, owned by one peer or dead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    start: u64,
    score: u32,
    peer: Option<PeerId>,
}

impl Slot {
    pub fn new(start: u64, score: u32, peer: Option<PeerId>) -> Self {
        Self { start, score, peer }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// One past the last point of the span.
    pub fn stop(&self) -> u64 {
        self.start + u64::from(self.score)
    }

    pub fn peer(&self) -> Option<PeerId> {
        self.peer
    }

    pub fn is_dead(&self) -> bool {
        self.peer.is_none()
    }

    /// This slot with a different owner (or none).
    pub fn with_peer(self, peer: Option<PeerId>) -> Self {
        Self { peer, ..self }
    }

    pub fn contains(&self, point: u64) -> bool {
        self.start <= point && point < self.stop()
    }

    pub fn precedes(&self, point: u64) -> bool {
        self.stop() <= point
    }

    pub fn follows(&self, point: u64) -> bool {
        self.start > point
    }
}

/// Resolve `target` to the peer owning the slot whose span contains it.
///
/// `max` is the end of the number line (`slot_count`). Returns `None` when
/// the point falls in a gap or on a dead slot.
///
/// The search is an interpolation-biased binary search: because spans are
/// sized by score and laid out contiguously, `target`'s position within the
/// window predicts the index well, giving O(log log n) expected iterations
/// on uniform draws and O(log n) in the worst case.
pub fn select_slot(slots: &[Slot], target: u64, max: u64) -> Option<PeerId> {
    debug_assert!(target <= max);

    let mut begin = 0usize;
    let mut end = slots.len();
    let mut bottom = 0u64;
    let mut top = max;

    while end - begin > LINEAR_SCAN_THRESHOLD {
        // The point is outside the window: it lies in a gap.
        if target < bottom || target >= top {
            return None;
        }

        // Guesstimate the position of the slot.
        let i = begin + ((target - bottom) * (end - begin) as u64 / (top - bottom)) as usize;
        debug_assert!(begin <= i && i < end);

        if slots[i].contains(target) {
            return slots[i].peer();
        }

        // Undershot: everything up to and including i is before the point.
        if slots[i].precedes(target) {
            begin = i + 1;
            if begin >= end {
                return None;
            }
            bottom = slots[begin].start();
            continue;
        }

        // Overshot.
        end = i;
        top = slots[end].start();
    }

    slots[begin..end]
        .iter()
        .find(|slot| slot.contains(target))
        .and_then(Slot::peer)
}
