//! Completion percentage from achievement unlocks.

use crate::domain::AchievementUnlockRecord;

/// Percentage of unlocked achievements, rounded half away from zero.
/// A title without achievements counts as 0%.
pub fn compute_progress(records: &[AchievementUnlockRecord]) -> u8 {
    let total = records.len() as u64;
    if total == 0 {
        return 0;
    }
    let achieved = records.iter().filter(|r| r.achieved).count() as u64;

    // round(100 * achieved / total) on non-negative integers
    let percent = (200 * achieved + total) / (2 * total);
    percent.min(100) as u8
}
