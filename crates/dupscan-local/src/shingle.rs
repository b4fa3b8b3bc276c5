use std::collections::HashSet;

/// Build the set of `k`-token shingles of a token stream.
///
/// - Empty when `k == 0` or there are fewer than `k` tokens.
/// - When the stream has more than `cap` windows (and `cap > 0`), windows are sampled with
///   stride `ceil(windows / cap)`; the last window is always included so the tail of long
///   documents still takes part in comparisons.
pub fn build_shingles(tokens: &[String], k: usize, cap: usize) -> HashSet<String> {
    let mut out = HashSet::new();
    if k == 0 || tokens.len() < k {
        return out;
    }
    let windows = tokens.len() - k + 1;
    let stride = if cap == 0 || windows <= cap {
        1
    } else {
        windows.div_ceil(cap)
    };

    let mut i = 0;
    while i < windows {
        out.insert(tokens[i..i + k].join(" "));
        i += stride;
    }
    out.insert(tokens[windows - 1..].join(" "));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn toks(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("woord{i}")).collect()
    }

    #[test]
    fn short_streams_have_no_shingles() {
        assert!(build_shingles(&toks(4), 5, 1400).is_empty());
        assert!(build_shingles(&toks(10), 0, 1400).is_empty());
        assert_eq!(build_shingles(&toks(5), 5, 1400).len(), 1);
    }

    #[test]
    fn shingles_preserve_in_window_order() {
        let t: Vec<String> = ["aaa", "bbb", "ccc", "ddd"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let s = build_shingles(&t, 3, 0);
        assert!(s.contains("aaa bbb ccc"));
        assert!(s.contains("bbb ccc ddd"));
        assert!(!s.contains("ccc bbb aaa"));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn long_streams_are_sampled_but_keep_the_tail() {
        let t = toks(10_000);
        let s = build_shingles(&t, 5, 1400);
        // 9996 windows, stride 8 -> 1250 sampled windows + the final window.
        assert_eq!(s.len(), 1251);
        assert!(s.contains(&t[9995..].join(" ")));
        assert!(s.contains(&t[0..5].join(" ")));
    }

    proptest! {
        #[test]
        fn empty_iff_fewer_than_k_tokens(n in 0usize..40, k in 1usize..8) {
            let s = build_shingles(&toks(n), k, 1400);
            prop_assert_eq!(s.is_empty(), n < k);
        }

        #[test]
        fn sampled_size_is_bounded_by_cap(n in 0usize..3_000, cap in 1usize..200) {
            let s = build_shingles(&toks(n), 5, cap);
            prop_assert!(s.len() <= cap + 1);
        }
    }
}
