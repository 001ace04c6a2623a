use rand::Rng;
use treap_collections::treap::Treap;

#[test]
fn int_test_treap() {
    let mut rng: rand::XorShiftRng = rand::SeedableRng::from_seed([1, 1, 1, 1]);
    let mut tree = Treap::new();
    let mut expected = Vec::new();
    for _ in 0..10_000 {
        let key = rng.gen::<u32>();

        tree.insert(key);
        expected.push(key);
    }
    tree.assert_invariants();

    expected.sort();

    assert_eq!(tree.len(), expected.len());
    assert_eq!(tree.min(), Some(&expected[0]));
    assert_eq!(tree.max(), Some(&expected[expected.len() - 1]));
    assert_eq!(tree.iter().cloned().collect::<Vec<u32>>(), expected);

    for key in &expected {
        assert!(tree.contains(key));
        assert_eq!(tree.get(key), Some(key));
    }

    let mut expected_len = expected.len();
    for key in expected {
        assert_eq!(tree.remove(&key), Some(key));
        expected_len -= 1;
        assert_eq!(tree.len(), expected_len);
    }
    assert!(tree.is_empty());
    tree.assert_invariants();
}

#[test]
fn int_test_treap_interleaved_removes() {
    let mut rng: rand::XorShiftRng = rand::SeedableRng::from_seed([3, 1, 4, 1]);
    let mut tree = Treap::new();
    let mut expected: Vec<u8> = Vec::new();
    for _ in 0..1_000 {
        let key = rng.gen::<u8>();
        if rng.gen::<bool>() {
            tree.insert(key);
            expected.push(key);
        } else {
            let removed = tree.remove(&key);
            let index = expected.iter().position(|other| *other == key);
            match index {
                Some(index) => {
                    expected.remove(index);
                    assert_eq!(removed, Some(key));
                }
                None => assert_eq!(removed, None),
            }
        }
        tree.assert_invariants();
    }

    expected.sort();
    assert_eq!(tree.iter().cloned().collect::<Vec<u8>>(), expected);
}
