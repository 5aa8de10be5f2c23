use std::collections::HashSet;

use super::skiplist::SkipList;

/// N-ary intersection of ordered skiplists.
///
/// One cursor per input starts at its front. Each round finds the maximum
/// key under the cursors; if every cursor agrees on it the entry is emitted
/// and all cursors advance, otherwise every cursor strictly below the max
/// advances. Ends as soon as any cursor is exhausted.
pub fn intersection_of<V: Clone>(lists: Vec<SkipList<V>>) -> SkipList<V> {
    if lists.is_empty() {
        return SkipList::new();
    }
    if lists.len() == 1 {
        return lists.into_iter().next().unwrap();
    }
    let mut result = SkipList::new();
    if lists.iter().any(|l| l.is_empty()) {
        return result;
    }

    let mut cursors: Vec<_> = lists.iter().map(|l| l.iter().peekable()).collect();
    loop {
        let mut max_key = 0u64;
        for cursor in cursors.iter_mut() {
            match cursor.peek() {
                Some(&(key, _)) => {
                    if key > max_key {
                        max_key = key;
                    }
                }
                None => return result,
            }
        }

        let all_equal = cursors
            .iter_mut()
            .all(|c| matches!(c.peek(), Some(&(key, _)) if key == max_key));
        if all_equal {
            let (key, value) = cursors[0].next().unwrap();
            result.insert(key, value.clone());
            for cursor in cursors.iter_mut().skip(1) {
                cursor.next();
            }
        } else {
            for cursor in cursors.iter_mut() {
                if matches!(cursor.peek(), Some(&(key, _)) if key < max_key) {
                    cursor.next();
                }
            }
        }
    }
}

/// N-ary union of ordered skiplists, deduplicated by key. The first input
/// holding a key wins.
pub fn union_of<V: Clone>(lists: Vec<SkipList<V>>) -> SkipList<V> {
    if lists.is_empty() {
        return SkipList::new();
    }
    if lists.len() == 1 {
        return lists.into_iter().next().unwrap();
    }
    let mut result = SkipList::new();
    let mut seen: HashSet<u64> = HashSet::new();
    for list in &lists {
        for (key, value) in list.iter() {
            if seen.insert(key) {
                result.insert(key, value.clone());
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(keys: &[u64]) -> SkipList<u64> {
        let mut list = SkipList::new();
        for &k in keys {
            list.insert(k, k);
        }
        list
    }

    fn keys_of(list: &SkipList<u64>) -> Vec<u64> {
        list.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_intersection_basic() {
        let out = intersection_of(vec![
            list_of(&[1, 3, 5, 7, 9]),
            list_of(&[2, 3, 5, 9, 11]),
            list_of(&[3, 4, 5, 9]),
        ]);
        assert_eq!(keys_of(&out), vec![3, 5, 9]);
    }

    #[test]
    fn test_intersection_empty_input_list() {
        let out: SkipList<u64> = intersection_of(vec![]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_intersection_single_input_is_identity() {
        let out = intersection_of(vec![list_of(&[2, 4, 6])]);
        assert_eq!(keys_of(&out), vec![2, 4, 6]);
    }

    #[test]
    fn test_intersection_with_empty_member() {
        let out = intersection_of(vec![list_of(&[1, 2]), list_of(&[])]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_intersection_disjoint() {
        let out = intersection_of(vec![list_of(&[1, 3]), list_of(&[2, 4])]);
        assert!(out.is_empty());
    }

    // Intersection equals the set-theoretic intersection of the key sets.
    #[test]
    fn test_intersection_matches_set_semantics() {
        use std::collections::BTreeSet;
        let inputs: Vec<Vec<u64>> = vec![
            vec![1, 4, 6, 8, 12, 40, 41],
            vec![2, 4, 8, 9, 12, 40, 99],
            vec![4, 5, 8, 12, 13, 40, 41, 99],
        ];
        let expected: BTreeSet<u64> = inputs
            .iter()
            .map(|v| v.iter().copied().collect::<BTreeSet<u64>>())
            .reduce(|a, b| a.intersection(&b).copied().collect())
            .unwrap();
        let out = intersection_of(inputs.iter().map(|v| list_of(v)).collect());
        assert_eq!(keys_of(&out), expected.into_iter().collect::<Vec<u64>>());
    }

    #[test]
    fn test_union_dedups_and_sorts() {
        let out = union_of(vec![list_of(&[1, 3, 5]), list_of(&[2, 3, 6]), list_of(&[5])]);
        assert_eq!(keys_of(&out), vec![1, 2, 3, 5, 6]);
    }

    #[test]
    fn test_union_with_empty_member() {
        let out = union_of(vec![list_of(&[]), list_of(&[7])]);
        assert_eq!(keys_of(&out), vec![7]);
    }
}
