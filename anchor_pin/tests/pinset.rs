use std::collections::HashSet;

use anchor_core::testutil::random_hashes;
use anchor_core::{BlockDag, BlockStore, DagService, Hash, Link, Node};
use anchor_pin::{Multiset, PinSetCodec, PinSetError};
use anchor_store_memory::MemoryStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

fn dag() -> BlockDag {
    BlockDag::new(BlockStore::new(MemoryStore::new()))
}

fn random_multiset(seed: u64, count: usize) -> Multiset {
    let mut rng = StdRng::seed_from_u64(seed);
    random_hashes(seed, count)
        .into_iter()
        .map(|h| (h, rng.random_range(1..5u64)))
        .collect()
}

fn ignore(_: Hash) {}

#[tokio::test(flavor = "multi_thread")]
async fn empty_mapping_is_the_empty_node() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::default();

    let mut seen = Vec::new();
    let root = codec
        .encode(&dag, Vec::<(Hash, u64)>::new(), &mut |h| seen.push(h))
        .await?;
    assert_eq!(root, Node::empty_hash());
    assert_eq!(seen, vec![Node::empty_hash()]);
    assert!(dag.has(root).await?, "empty node is written when used");

    let decoded = codec.decode_from(&dag, root, &mut ignore).await?;
    assert!(decoded.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn small_mapping_round_trips() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::default();
    let input = random_multiset(1, 50);

    let root = codec.encode(&dag, input.clone(), &mut ignore).await?;
    let top = dag.get(root).await?;
    assert_eq!(top.links.len(), 50, "fits in a single leaf");

    let decoded = codec.decode_from(&dag, root, &mut ignore).await?;
    assert_eq!(decoded, input);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn large_mapping_shards_and_round_trips() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::new(4, 3);
    let input = random_multiset(2, 300);

    let root = codec.encode(&dag, input.clone(), &mut ignore).await?;
    let top = dag.get(root).await?;
    assert_eq!(top.links.len(), 4, "top node is a bucket node");

    let decoded = codec.decode_from(&dag, root, &mut ignore).await?;
    assert_eq!(decoded, input);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_counts_are_dropped() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::default();
    let keys = random_hashes(3, 4);

    let with_zero = vec![(keys[0], 2), (keys[1], 0), (keys[2], 1), (keys[3], 0)];
    let without = vec![(keys[0], 2), (keys[2], 1)];

    let a = codec.encode(&dag, with_zero, &mut ignore).await?;
    let b = codec.encode(&dag, without, &mut ignore).await?;
    assert_eq!(a, b);

    let decoded = codec.decode_from(&dag, a, &mut ignore).await?;
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[&keys[0]], 2);
    assert!(!decoded.contains_key(&keys[1]));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn encoding_ignores_input_order() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::new(8, 4);
    let input: Vec<(Hash, u64)> = random_multiset(4, 120).into_iter().collect();

    let first = codec.encode(&dag, input.clone(), &mut ignore).await?;

    let mut shuffled = input.clone();
    shuffled.shuffle(&mut StdRng::seed_from_u64(99));
    let second = codec.encode(&dag, shuffled, &mut ignore).await?;
    assert_eq!(first, second);

    // Split counts are summed.
    let (key, count) = input[0];
    let mut split = input[1..].to_vec();
    split.push((key, 1));
    split.push((key, count - 1));
    let third = codec.encode(&dag, split, &mut ignore).await?;
    assert_eq!(first, third);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn collectors_see_every_node() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::new(4, 2);
    let input = random_multiset(5, 40);

    let mut written = HashSet::new();
    let root = codec
        .encode(&dag, input.clone(), &mut |h| {
            written.insert(h);
        })
        .await?;
    assert!(written.contains(&root));
    assert!(
        written.contains(&Node::empty_hash()),
        "sparse buckets reuse the empty node"
    );
    for hash in &written {
        assert!(dag.has(*hash).await?, "{hash} was recorded but not written");
    }
    for key in input.keys() {
        assert!(!written.contains(key), "entries are not set nodes");
    }

    let mut visited = HashSet::new();
    codec
        .decode_from(&dag, root, &mut |h| {
            visited.insert(h);
        })
        .await?;
    assert_eq!(visited, written);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn named_link_decoding() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::default();
    let keys = random_hashes(6, 3);

    let set = codec.store_set(&dag, keys.clone(), &mut ignore).await?;
    let mut holder = Node::default();
    holder.add_link("things", set);

    let loaded = codec.load_set(&dag, &holder, "things", &mut ignore).await?;
    assert_eq!(loaded, keys.iter().copied().collect::<HashSet<_>>());

    let err = codec
        .load_set(&dag, &holder, "other", &mut ignore)
        .await
        .unwrap_err();
    assert!(matches!(err, PinSetError::MissingLink(name) if name == "other"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unparsable_leaf_is_corrupt() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::default();
    let target = Hash::new(b"target");

    let bogus = dag
        .add(&Node::new(vec![0xff, 0x00, 0x13], vec![Link::unnamed(target)]))
        .await?;
    let err = codec.decode_from(&dag, bogus, &mut ignore).await.unwrap_err();
    assert!(
        matches!(&err, PinSetError::Corrupt { hash, .. } if *hash == bogus),
        "got {err:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bucket_node_with_wrong_arity_is_corrupt() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::new(4, 2);
    let root = codec
        .encode(&dag, random_multiset(7, 30), &mut ignore)
        .await?;

    let mut top = dag.get(root).await?;
    top.links.pop();
    let truncated = dag.add(&top).await?;

    let err = codec
        .decode_from(&dag, truncated, &mut ignore)
        .await
        .unwrap_err();
    assert!(matches!(err, PinSetError::Corrupt { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_bucket_fails_decode() -> anyhow::Result<()> {
    let dag = dag();
    let codec = PinSetCodec::new(4, 2);
    let root = codec
        .encode(&dag, random_multiset(8, 30), &mut ignore)
        .await?;

    let top = dag.get(root).await?;
    let bucket = top
        .links
        .iter()
        .map(|l| l.hash)
        .find(|h| *h != Node::empty_hash())
        .expect("some bucket is populated");
    dag.remove(bucket).await?;

    let err = codec.decode_from(&dag, root, &mut ignore).await.unwrap_err();
    assert!(matches!(err, PinSetError::Dag(_)), "got {err:?}");
    Ok(())
}
