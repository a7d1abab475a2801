use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use flat_collections::{CompactPrefixTree, InsertBehavior, TreeConfig};

fn greeting_tree(ignore_case: bool) -> CompactPrefixTree<i32> {
    let mut tree = CompactPrefixTree::with_config(TreeConfig::default().ignore_case(ignore_case));
    for (key, value) in &[
        ("Hell", 1),
        ("Hello", 2),
        ("Hello world", 3),
        ("Hello world!", 4),
        ("world", 5),
    ] {
        tree.insert(key, *value, InsertBehavior::Reject).unwrap();
    }
    tree
}

#[test]
fn longest_prefix_over_shared_stems() {
    let tree = greeting_tree(false);
    assert_eq!(tree.try_match_longest("Hello everyone!"), Some(("Hello", &2)));
    assert_eq!(tree.try_match_exact("Hello "), None);
    assert_eq!(tree.try_match_longest("Hello "), Some(("Hello", &2)));
    assert_eq!(tree.try_match_shortest("Hello "), Some(("Hell", &1)));
}

#[test]
fn case_insensitive_matching() {
    let tree = greeting_tree(true);
    assert_eq!(
        tree.try_match_longest("HeLLo woRld!"),
        Some(("Hello world!", &4))
    );
    assert!(tree.contains("hello"));
    assert!(tree.contains("WORLD"));
}

#[test]
fn branching_through_overflow_lists() {
    let tree = CompactPrefixTree::from_entries(vec![
        ("A", 1),
        ("Abc", 2),
        ("Aeiou", 3),
        ("fooob", 4),
        ("foobar1", 5),
        ("foobar2", 6),
    ])
    .unwrap();
    assert_eq!(tree.try_match_longest("foobar123"), Some(("foobar1", &5)));
    assert_eq!(
        tree.try_match_shortest("Aeiou and something"),
        Some(("A", &1))
    );
    assert_eq!(tree.try_match_exact("foobar123"), None);
}

#[test]
fn region_queries_equal_substring_queries() {
    let tree = greeting_tree(false);
    let text = "say Hello world! loudly";
    for start in 0..text.len() {
        for end in start..=text.len() {
            let region = &text[start..end];
            let owned = region.to_owned();
            assert_eq!(tree.try_match_longest(region), tree.try_match_longest(&owned));
            assert_eq!(tree.try_match_shortest(region), tree.try_match_shortest(&owned));
            assert_eq!(tree.try_match_exact(region), tree.try_match_exact(&owned));
        }
    }
}

fn random_keys(rng: &mut StdRng, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1, 24);
            (0..len)
                .map(|_| rng.sample(rand::distributions::Alphanumeric))
                .collect::<String>()
        })
        .unique()
        .collect()
}

#[test]
fn randomized_roundtrip_keeps_insertion_order() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let keys = random_keys(&mut rng, 2000);
    let tree =
        CompactPrefixTree::from_entries(keys.iter().enumerate().map(|(i, k)| (k.as_str(), i)))
            .unwrap();
    assert_eq!(tree.len(), keys.len());
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(tree.try_match_exact(key), Some((key.as_str(), &i)));
        assert_eq!(tree.at(i), Some((key.as_str(), &i)));
    }
    let iterated: Vec<&str> = tree.iter().map(|(k, _)| k).collect();
    assert_eq!(iterated.len(), keys.len());
    assert!(iterated.iter().zip(&keys).all(|(a, b)| *a == b.as_str()));
}

#[test]
fn longest_is_maximal_and_shortest_is_minimal() {
    let mut rng = StdRng::seed_from_u64(42);
    let keys = random_keys(&mut rng, 400);
    let tree =
        CompactPrefixTree::from_entries(keys.iter().enumerate().map(|(i, k)| (k.as_str(), i)))
            .unwrap();

    // probe with stored keys extended by random suffixes, plus fresh noise
    let mut texts: Vec<String> = keys
        .iter()
        .take(200)
        .map(|k| {
            let mut t = k.clone();
            let extra = rng.gen_range(0, 6);
            t.extend((0..extra).map(|_| rng.sample(rand::distributions::Alphanumeric)));
            t
        })
        .collect();
    texts.extend(random_keys(&mut rng, 100));

    for text in &texts {
        let prefixes: Vec<&String> = keys.iter().filter(|k| text.starts_with(k.as_str())).collect();
        let expected_longest = prefixes.iter().map(|k| k.len()).max();
        let expected_shortest = prefixes.iter().map(|k| k.len()).min();
        assert_eq!(
            tree.try_match_longest(text).map(|(k, _)| k.len()),
            expected_longest
        );
        assert_eq!(
            tree.try_match_shortest(text).map(|(k, _)| k.len()),
            expected_shortest
        );
    }
}

#[test]
fn insertion_order_independence() {
    // the same key set built shortest-first and longest-first answers alike
    let keys = ["a", "ab", "abc", "abcd", "abcde", "b", "ba", "bad"];
    let forward = CompactPrefixTree::from_entries(keys.iter().enumerate().map(|(i, k)| (*k, i)))
        .unwrap();
    let mut reversed_keys = keys;
    reversed_keys.reverse();
    let backward = CompactPrefixTree::from_entries(
        reversed_keys.iter().enumerate().map(|(i, k)| (*k, i)),
    )
    .unwrap();
    for probe in &["a", "abcdef", "bad luck", "ba", "c", "abc"] {
        assert_eq!(
            forward.try_match_longest(probe).map(|(k, _)| k),
            backward.try_match_longest(probe).map(|(k, _)| k)
        );
        assert_eq!(
            forward.try_match_shortest(probe).map(|(k, _)| k),
            backward.try_match_shortest(probe).map(|(k, _)| k)
        );
        assert_eq!(
            forward.try_match_exact(probe).is_some(),
            backward.try_match_exact(probe).is_some()
        );
    }
}
