//! Worker slot inference for logs that carry no thread tag.

use chrono::TimeDelta;

/// Assign each `(start, end)` interval to a 1-based worker slot.
///
/// Intervals are replayed in start order (ties keep input order). Each one
/// takes the slot that became free earliest, lowest slot number on ties, and
/// a new slot is opened only when none is free. A slot is free once its last
/// end is at most `tolerance` past the interval's start.
pub fn assign_slots(intervals: &[(TimeDelta, TimeDelta)], tolerance: TimeDelta) -> Vec<u32> {
    let mut order: Vec<usize> = (0..intervals.len()).collect();
    order.sort_by_key(|&idx| intervals[idx].0);

    // End time of the last interval placed in each slot.
    let mut slot_ends: Vec<TimeDelta> = Vec::new();
    let mut assigned = vec![0u32; intervals.len()];

    for idx in order {
        let (start, end) = intervals[idx];
        let free_slot = slot_ends
            .iter()
            .enumerate()
            .filter(|(_, slot_end)| **slot_end - tolerance <= start)
            .min_by_key(|(slot, slot_end)| (**slot_end, *slot))
            .map(|(slot, _)| slot);

        let slot = match free_slot {
            Some(slot) => {
                slot_ends[slot] = end;
                slot
            }
            None => {
                slot_ends.push(end);
                slot_ends.len() - 1
            }
        };
        assigned[idx] = slot as u32 + 1;
    }

    log::debug!("Inferred {} worker slot(s) for {} runs", slot_ends.len(), intervals.len());
    assigned
}
