//! Integration tests for the LRU replacer

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::buffer::{LruReplacer, Replacer};
use strata::common::FrameId;

#[test]
fn test_lru_victim_order() {
    let replacer = LruReplacer::new(3);
    let (a, b, c) = (FrameId::new(0), FrameId::new(1), FrameId::new(2));

    replacer.unpin(a);
    replacer.unpin(b);
    replacer.unpin(c);

    assert_eq!(replacer.victim(), Some(a));
    assert_eq!(replacer.victim(), Some(b));
    assert_eq!(replacer.victim(), Some(c));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_lru_pin_removes_candidate() {
    let replacer = LruReplacer::new(3);
    let (a, b, c) = (FrameId::new(0), FrameId::new(1), FrameId::new(2));

    replacer.unpin(a);
    replacer.unpin(b);
    replacer.unpin(c);
    replacer.pin(a);
    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.victim(), Some(b));

    // Unpinning again puts `a` behind `c`
    replacer.unpin(a);
    assert_eq!(replacer.victim(), Some(c));
    assert_eq!(replacer.victim(), Some(a));
}

#[test]
fn test_lru_unpin_is_idempotent() {
    let replacer = LruReplacer::new(4);
    let (a, b) = (FrameId::new(0), FrameId::new(1));

    replacer.unpin(a);
    replacer.unpin(b);
    replacer.unpin(a);
    replacer.unpin(a);
    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.victim(), Some(a));
    assert_eq!(replacer.victim(), Some(b));
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_lru_matches_reference_model() {
    let frames = 16;
    let replacer = LruReplacer::new(frames);
    let mut model: VecDeque<FrameId> = VecDeque::new();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..2000 {
        let frame_id = FrameId::new(rng.gen_range(0..frames as u32));
        match rng.gen_range(0..3) {
            0 => {
                replacer.unpin(frame_id);
                if !model.contains(&frame_id) {
                    model.push_back(frame_id);
                }
            }
            1 => {
                replacer.pin(frame_id);
                model.retain(|&f| f != frame_id);
            }
            _ => {
                assert_eq!(replacer.victim(), model.pop_front());
            }
        }
        assert_eq!(replacer.size(), model.len());
    }
}

#[test]
fn test_lru_concurrent_unpin_then_drain() {
    let replacer = Arc::new(LruReplacer::new(64));

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..16 {
                    replacer.unpin(FrameId::new(t * 16 + i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(replacer.size(), 64);

    let mut seen = std::collections::HashSet::new();
    while let Some(frame_id) = replacer.victim() {
        assert!(seen.insert(frame_id));
    }
    assert_eq!(seen.len(), 64);
}
