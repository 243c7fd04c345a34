//! Property tests for the encode/apply pipeline.

use delta::decode_base128;
use matching::{apply_delta, make_delta, DeltaError, DeltaIndex};
use proptest::prelude::*;

/// Builds a target by splicing random edits into a copy of `source`.
fn spliced(source: &[u8], edits: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut target = source.to_vec();
    for (position, bytes) in edits {
        let at = *position as usize % (target.len() + 1);
        let end = (at + bytes.len()).min(target.len());
        target.splice(at..end, bytes.iter().copied());
    }
    target
}

proptest! {
    #[test]
    fn round_trips_random_edits(
        source in prop::collection::vec(any::<u8>(), 16..512),
        edits in prop::collection::vec(
            (any::<u16>(), prop::collection::vec(any::<u8>(), 0..24)),
            0..4
        ),
    ) {
        let target = spliced(&source, &edits);
        prop_assume!(!target.is_empty());

        let mut index = DeltaIndex::new();
        index.add_source(&source, 0).expect("indexable source");
        let delta = index.make_delta(&target, 0).expect("unlimited encode succeeds");
        prop_assert_eq!(apply_delta(&source, &delta).expect("apply"), target);
    }

    #[test]
    fn round_trips_unrelated_buffers(
        source in prop::collection::vec(any::<u8>(), 16..256),
        target in prop::collection::vec(any::<u8>(), 1..256),
    ) {
        let mut index = DeltaIndex::new();
        index.add_source(&source, 0).expect("indexable source");
        let delta = index.make_delta(&target, 0).expect("unlimited encode succeeds");
        prop_assert_eq!(apply_delta(&source, &delta).expect("apply"), target);
    }

    #[test]
    fn encoding_is_deterministic(
        source in prop::collection::vec(any::<u8>(), 16..256),
        edits in prop::collection::vec(
            (any::<u16>(), prop::collection::vec(any::<u8>(), 0..16)),
            0..3
        ),
    ) {
        let target = spliced(&source, &edits);
        prop_assume!(!target.is_empty());

        let mut index = DeltaIndex::new();
        index.add_source(&source, 0).expect("indexable source");
        let first = index.make_delta(&target, 0).expect("encode");
        let second = index.make_delta(&target, 0).expect("encode");
        prop_assert_eq!(&first, &second);

        // a separately built index over the same sources encodes the same
        let mut rebuilt = DeltaIndex::new();
        rebuilt.add_source(&source, 0).expect("indexable source");
        prop_assert_eq!(&first, &rebuilt.make_delta(&target, 0).expect("encode"));
    }

    #[test]
    fn size_limit_is_honoured(
        source in prop::collection::vec(any::<u8>(), 16..256),
        target in prop::collection::vec(any::<u8>(), 1..256),
        limit in 1usize..64,
    ) {
        let mut index = DeltaIndex::new();
        index.add_source(&source, 0).expect("indexable source");
        match index.make_delta(&target, limit) {
            Ok(delta) => prop_assert!(delta.len() <= limit),
            Err(error) => prop_assert_eq!(error, DeltaError::SizeTooBig),
        }
    }

    #[test]
    fn header_declares_true_sizes(
        source in prop::collection::vec(any::<u8>(), 16..256),
        target in prop::collection::vec(any::<u8>(), 1..256),
    ) {
        let mut index = DeltaIndex::new();
        index.add_source(&source, 0).expect("indexable source");
        let delta = index.make_delta(&target, 0).expect("encode");

        let (source_size, rest) = decode_base128(&delta).expect("source size");
        let (target_size, _) = decode_base128(rest).expect("target size");
        prop_assert_eq!(source_size, source.len() as u64);
        prop_assert_eq!(target_size, target.len() as u64);
    }

    #[test]
    fn facade_only_returns_winning_deltas(
        source in prop::collection::vec(any::<u8>(), 0..256),
        target in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        if let Some(delta) = make_delta(&source, &target) {
            prop_assert!(delta.len() <= target.len());
            prop_assert_eq!(apply_delta(&source, &delta).expect("apply"), target);
        }
    }
}
