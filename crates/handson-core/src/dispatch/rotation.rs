//! Round-robin provider rotation.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct RotationState {
    order: VecDeque<String>,
    rotations: u64,
}

/// Cycles through a fixed set of provider names.
///
/// Membership is fixed at construction. `get_next` returns the head and
/// moves it to the tail under a single lock, so concurrent callers never
/// observe a half-rotated order.
#[derive(Debug)]
pub struct RotationSelector {
    state: Mutex<RotationState>,
}

impl RotationSelector {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            state: Mutex::new(RotationState {
                order: names.into_iter().collect(),
                rotations: 0,
            }),
        }
    }

    /// Next provider name, or `None` when the rotation is empty.
    pub fn get_next(&self) -> Option<String> {
        let mut state = self.lock();
        let name = state.order.pop_front()?;
        state.order.push_back(name.clone());
        state.rotations += 1;
        Some(name)
    }

    pub fn get_order(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    /// Zero the rotation counter. The order is left as is.
    pub fn reset(&self) {
        self.lock().rotations = 0;
    }

    pub fn rotations(&self) -> u64 {
        self.lock().rotations
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, RotationState> {
        self.state.lock().expect("rotation state lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn selector(names: &[&str]) -> RotationSelector {
        RotationSelector::new(names.iter().map(|n| n.to_string()))
    }

    #[test]
    fn test_empty_rotation_returns_none() {
        let rotation = selector(&[]);
        assert_eq!(rotation.get_next(), None);
        assert_eq!(rotation.rotations(), 0);
    }

    #[test]
    fn test_each_name_once_per_cycle_and_cycle_repeats() {
        let rotation = selector(&["a", "b", "c"]);
        let first: Vec<String> = (0..3).filter_map(|_| rotation.get_next()).collect();
        let second: Vec<String> = (0..3).filter_map(|_| rotation.get_next()).collect();

        assert_eq!(first, vec!["a", "b", "c"]);
        assert_eq!(first, second);
        assert_eq!(rotation.rotations(), 6);
    }

    #[test]
    fn test_reset_only_clears_counter() {
        let rotation = selector(&["a", "b"]);
        rotation.get_next();
        rotation.reset();
        assert_eq!(rotation.rotations(), 0);
        assert_eq!(rotation.get_order(), vec!["b", "a"]);
        assert_eq!(rotation.get_next().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_concurrent_get_next_is_fair() {
        let names = ["a", "b", "c", "d"];
        let rotation = Arc::new(selector(&names));

        let mut handles = Vec::new();
        for _ in 0..names.len() {
            let rotation = Arc::clone(&rotation);
            handles.push(tokio::spawn(async move { rotation.get_next() }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            seen.insert(handle.await.unwrap().unwrap());
        }
        assert_eq!(seen.len(), names.len());
        assert_eq!(rotation.get_order(), names);
    }
}
