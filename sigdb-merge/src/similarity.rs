//! Textual similarity scoring
//!
//! Ratcliff/Obershelp ratio between two strings and the cohesion of a group
//! of symbol names. Used by the resolver to decide whether colliding records
//! name the same logical function.

/// Similarity ratio of two strings in `[0, 1]`.
///
/// `2 * M / (len(a) + len(b))`, where `M` is the number of characters covered
/// by the matching blocks found by repeatedly taking the longest common
/// substring and recursing on both sides of it.
///
/// Unlike Python's `difflib.SequenceMatcher`, no automatic junk heuristic is
/// applied to inputs of 200 or more characters, so scores for very long
/// mangled names can differ from difflib's.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let length = a.len() + b.len();
    if length == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / length as f64
}

/// Average pairwise ratio over every ordered pair of differing names.
///
/// Equal strings are never compared with each other, so a group made of a
/// single logical name (or a single entry) scores `1.0`.
pub fn cohesion<S: AsRef<str>>(names: &[S]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for k in names {
        for m in names {
            if k.as_ref() == m.as_ref() {
                continue;
            }
            sum += ratio(k.as_ref(), m.as_ref());
            count += 1;
        }
    }
    if count == 0 {
        return 1.0;
    }
    sum / count as f64
}

/// Total length of the matching blocks between `a` and `b`
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Returns `(i, j, k)` with `a[i..i+k] == b[j..j+k]`. Ties go to the block
/// starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    let width = bhi - blo;
    // run[x] is the length of the common suffix ending at (i - 1, blo + x - 1)
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let x = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[x - 1] + 1;
                cur[x] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            } else {
                cur[x] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    (best_i, best_j, best_k)
}
