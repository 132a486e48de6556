//! Meal window resolution
//!
//! Maps a local time-of-day to a named meal window. Windows are half-open
//! minute ranges `[start, end)`, non-overlapping, and deliberately do not
//! cover the whole day: outside every window there is simply no meal, which
//! is a no-match, not an error.

use serde::{Deserialize, Serialize};

/// A named wall-clock meal window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealWindow {
    pub name: String,
    /// Minutes since local midnight, inclusive
    pub start_min: u32,
    /// Minutes since local midnight, exclusive
    pub end_min: u32,
}

impl MealWindow {
    pub fn new(name: impl Into<String>, start_min: u32, end_min: u32) -> Self {
        Self {
            name: name.into(),
            start_min,
            end_min,
        }
    }

    pub fn contains(&self, minutes: u32) -> bool {
        self.start_min <= minutes && minutes < self.end_min
    }
}

/// Default windows: breakfast 07:00-11:00, lunch 11:00-24:00, dinner
/// 00:00-06:00 (late-night service). 06:00-07:00 matches nothing.
pub fn default_meal_windows() -> Vec<MealWindow> {
    vec![
        MealWindow::new("breakfast", 7 * 60, 11 * 60),
        MealWindow::new("lunch", 11 * 60, 24 * 60),
        MealWindow::new("dinner", 0, 6 * 60),
    ]
}

/// Resolve the window containing `minutes`, if any
pub fn resolve_window(minutes: u32, windows: &[MealWindow]) -> Option<&str> {
    windows
        .iter()
        .find(|w| w.contains(minutes))
        .map(|w| w.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows_resolution() {
        let windows = default_meal_windows();

        assert_eq!(resolve_window(8 * 60, &windows), Some("breakfast"));
        assert_eq!(resolve_window(11 * 60, &windows), Some("lunch"));
        assert_eq!(resolve_window(23 * 60 + 59, &windows), Some("lunch"));
        assert_eq!(resolve_window(2 * 60, &windows), Some("dinner"));
    }

    #[test]
    fn test_gap_resolves_to_none() {
        let windows = default_meal_windows();
        // 06:00-07:00 belongs to no window
        assert_eq!(resolve_window(6 * 60, &windows), None);
        assert_eq!(resolve_window(6 * 60 + 30, &windows), None);
        assert_eq!(resolve_window(7 * 60 - 1, &windows), None);
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let windows = default_meal_windows();
        // Breakfast ends at 11:00 sharp; lunch takes over
        assert_eq!(resolve_window(11 * 60 - 1, &windows), Some("breakfast"));
        assert_eq!(resolve_window(11 * 60, &windows), Some("lunch"));
        // Dinner ends at 06:00 sharp
        assert_eq!(resolve_window(6 * 60 - 1, &windows), Some("dinner"));
    }
}
