use serde::{Deserialize, Serialize};

/// Per-post like state for the current user, with the denormalized
/// aggregate counter. The counter moves by one optimistically and is
/// overwritten by the server value on reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LikeState {
    pub is_liked: bool,
    pub like_count: u32,
}

impl LikeState {
    pub fn new(is_liked: bool, like_count: u32) -> Self {
        Self {
            is_liked,
            like_count,
        }
    }

    /// Applies the local negation, returning the pre-toggle snapshot.
    pub fn toggle(&mut self) -> LikeState {
        let snapshot = *self;
        if self.is_liked {
            self.is_liked = false;
            self.like_count = self.like_count.saturating_sub(1);
        } else {
            self.is_liked = true;
            self.like_count += 1;
        }
        snapshot
    }

    /// Server-wins overwrite after a confirmed toggle.
    pub fn apply_server(&mut self, is_liked: bool, like_count: u32) {
        self.is_liked = is_liked;
        self.like_count = like_count;
    }

    /// Merges a like event originated by another user. Only the
    /// counter moves; the own flag never follows a foreign event.
    pub fn apply_external(&mut self, server_count: u32) {
        self.like_count = server_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_sequence_obeys_parity() {
        // After N toggles the flag equals initial XOR (N mod 2).
        for initial in [false, true] {
            for n in 0..6 {
                let mut state = LikeState::new(initial, 10);
                for _ in 0..n {
                    state.toggle();
                }
                assert_eq!(state.is_liked, initial ^ (n % 2 == 1), "n={n}");
            }
        }
    }

    #[test]
    fn toggle_snapshot_restores_exactly() {
        let mut state = LikeState::new(true, 5);
        let snapshot = state.toggle();
        assert_eq!(state, LikeState::new(false, 4));

        state = snapshot;
        assert_eq!(state, LikeState::new(true, 5));
    }

    #[test]
    fn external_merge_moves_only_the_counter() {
        let mut state = LikeState::new(true, 5);
        state.apply_external(9);
        assert_eq!(state, LikeState::new(true, 9));
    }

    #[test]
    fn counter_never_underflows() {
        let mut state = LikeState::new(true, 0);
        state.toggle();
        assert_eq!(state.like_count, 0);
    }
}
