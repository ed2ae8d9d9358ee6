use crate::workouts::catalog::{normalize_mood, Catalog, WorkoutItem};
use rand::Rng;

/// Catalog rows whose mood matches any of `emotions`, grouped by emotion in
/// the order given, catalog order within a group, at most `limit` rows.
pub fn select_by_emotion<S: AsRef<str>>(catalog: &Catalog, emotions: &[S], limit: usize) -> Vec<WorkoutItem> {
    let mut selected = Vec::new();

    for emotion in emotions {
        let wanted = normalize_mood(emotion.as_ref());
        selected.extend(catalog.items().iter().filter(|item| item.mood == wanted).cloned());
        if selected.len() >= limit {
            break;
        }
    }

    selected.truncate(limit);
    selected
}

/// Greedy random packing into `target_minutes`.
///
/// Draws unused items uniformly at random; an item is kept when it fits the
/// remaining budget and discarded otherwise. Results are in draw order.
pub fn select_by_duration<R: Rng + ?Sized>(catalog: &Catalog, target_minutes: u32, rng: &mut R) -> Vec<WorkoutItem> {
    let mut pool: Vec<&WorkoutItem> = catalog.items().iter().collect();
    let mut selected: Vec<WorkoutItem> = Vec::new();
    let mut remaining = target_minutes;

    while remaining > 0 && !pool.is_empty() {
        let drawn = pool.swap_remove(rng.gen_range(0..pool.len()));
        if drawn.duration_minutes <= remaining {
            remaining -= drawn.duration_minutes;
            selected.push(drawn.clone());
        }
    }

    let mut total = total_minutes(&selected);
    while total > target_minutes {
        let Some(last) = selected.pop() else { break };
        total -= last.duration_minutes;
    }

    tracing::debug!("Packed {} workouts into {}/{} minutes", selected.len(), total, target_minutes);
    selected
}

pub fn total_minutes(workouts: &[WorkoutItem]) -> u32 {
    workouts.iter().map(|w| w.duration_minutes).sum()
}
