//! Boomerang frame ordering.
//!
//! A cycle is the frames played forward followed by the interior frames
//! played backward. First and last frames are left out of the backward
//! pass so the seams do not show a doubled frame.

use std::sync::Arc;

use crate::video::types::{Frame, FrameSequence};

/// Positions into a list of `len` frames making up one boomerang cycle
pub fn cycle_order(len: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    if len > 2 {
        order.extend((1..len - 1).rev());
    }
    order
}

/// Length of `build_boomerang` output without building it
pub fn boomerang_len(frame_count: usize, loop_count: u32) -> usize {
    let cycle = frame_count + frame_count.saturating_sub(2);
    cycle * loop_count as usize
}

/// Build the boomerang sequence: one cycle repeated `loop_count` times.
pub fn build_boomerang(frames: &[Arc<Frame>], loop_count: u32) -> FrameSequence {
    let order = cycle_order(frames.len());
    let mut out = Vec::with_capacity(boomerang_len(frames.len(), loop_count));
    for _ in 0..loop_count {
        out.extend(order.iter().map(|&i| Arc::clone(&frames[i])));
    }
    FrameSequence::new(out)
}

/// Concatenate an already ordered sequence `loop_count` times.
pub fn repeat_sequence(frames: &[Arc<Frame>], loop_count: u32) -> FrameSequence {
    let mut out = Vec::with_capacity(frames.len() * loop_count as usize);
    for _ in 0..loop_count {
        out.extend(frames.iter().cloned());
    }
    FrameSequence::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<Arc<Frame>> {
        (0..n)
            .map(|i| Arc::new(Frame::new_filled(2, 2, [i as u8, 0, 0], i)))
            .collect()
    }

    #[test]
    fn test_five_frames_three_loops() {
        let seq = build_boomerang(&frames(5), 3);
        assert_eq!(seq.len(), 24);
        assert_eq!(&seq.indices()[..8], &[0, 1, 2, 3, 4, 3, 2, 1]);
        assert_eq!(&seq.indices()[8..16], &[0, 1, 2, 3, 4, 3, 2, 1]);
    }

    #[test]
    fn test_two_frames_have_no_reverse_pass() {
        let seq = build_boomerang(&frames(2), 3);
        assert_eq!(seq.indices(), vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_boomerang(&[], 3).is_empty());
        assert!(cycle_order(0).is_empty());
    }

    #[test]
    fn test_single_frame() {
        assert_eq!(build_boomerang(&frames(1), 4).indices(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_three_frames_reverse_only_the_middle() {
        assert_eq!(cycle_order(3), vec![0, 1, 2, 1]);
    }

    #[test]
    fn test_length_formula() {
        for n in 0..40usize {
            let input = frames(n);
            for loops in 1..6u32 {
                let seq = build_boomerang(&input, loops);
                let expected = if n > 2 {
                    loops as usize * (n + n - 2)
                } else {
                    loops as usize * n
                };
                assert_eq!(seq.len(), expected, "n={} loops={}", n, loops);
                assert_eq!(boomerang_len(n, loops), expected);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let input = frames(7);
        assert_eq!(build_boomerang(&input, 2), build_boomerang(&input, 2));
    }

    #[test]
    fn test_frames_are_shared_not_copied() {
        let input = frames(4);
        let seq = build_boomerang(&input, 2);
        assert!(Arc::ptr_eq(&seq.frames()[0], &seq.frames()[6]));
        assert!(Arc::ptr_eq(&seq.frames()[1], &seq.frames()[5]));
    }

    #[test]
    fn test_repeat_keeps_order() {
        let input = frames(10);
        let seq = repeat_sequence(&input, 2);
        assert_eq!(seq.len(), 20);
        assert_eq!(seq.indices()[10..], (0..10).collect::<Vec<_>>()[..]);
    }
}
