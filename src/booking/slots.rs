use crate::model::*;

/// Slice `window` into back-to-back `[t, t + duration)` slots starting at the
/// window's start. A trailing remainder shorter than `duration` is dropped;
/// a slot ending exactly at `window.end` is kept. Every slot starts free.
pub fn generate_slots(window: &Span, duration: Ms) -> Vec<Slot> {
    if duration <= 0 {
        return Vec::new();
    }
    let count = (window.duration_ms() / duration).max(0) as usize;
    (0..count)
        .map(|i| {
            let start = window.start + i as Ms * duration;
            Slot {
                span: Span::new(start, start + duration),
                is_free: true,
            }
        })
        .collect()
}
