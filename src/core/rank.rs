//! Rank algebra.
//!
//! Ranks are base-36 strings (`0-9a-z`) compared bytewise. They behave like
//! fractions `0.<digits>`, so a new rank can always be minted between two
//! distinct neighbours unless the upper one is the lower one padded with `0`s.

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const BASE: u32 = 36;
const MID: u32 = BASE / 2;

/// Rank given to the first item of an empty sibling set.
pub const INITIAL: &str = "h";

fn digit(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some(u32::from(b - b'0')),
        b'a'..=b'z' => Some(u32::from(b - b'a') + 10),
        _ => None,
    }
}

fn symbol(d: u32) -> char {
    char::from(ALPHABET[d as usize])
}

pub fn is_valid(rank: &str) -> bool {
    !rank.is_empty() && rank.bytes().all(|b| digit(b).is_some())
}

/// A rank strictly between `lo` and `hi`.
///
/// `None` when the inputs are invalid, not strictly ordered, or leave no room
/// (`hi` is `lo` followed only by zeros); callers then re-rank the whole set.
pub fn between(lo: &str, hi: &str) -> Option<String> {
    if !is_valid(lo) || !is_valid(hi) || lo >= hi {
        return None;
    }
    let lo = lo.as_bytes();
    let hi = hi.as_bytes();
    let mut out = String::with_capacity(hi.len() + 1);
    let mut i = 0;
    loop {
        let dh = digit(*hi.get(i)?)?;
        match lo.get(i) {
            None => {
                // Everything emitted so far equals `lo`; any digit below hi[i] fits.
                match dh {
                    0 => {
                        out.push('0');
                        i += 1;
                    }
                    1 => {
                        out.push('0');
                        out.push(symbol(MID));
                        return Some(out);
                    }
                    _ => {
                        out.push(symbol(dh / 2));
                        return Some(out);
                    }
                }
            }
            Some(&b) => {
                let dl = digit(b)?;
                if dl == dh {
                    out.push(symbol(dl));
                    i += 1;
                    continue;
                }
                if dh - dl >= 2 {
                    out.push(symbol((dl + dh) / 2));
                    return Some(out);
                }
                out.push(symbol(dl));
                out.push_str(&above(&lo[i + 1..]));
                return Some(out);
            }
        }
    }
}

/// Shortest convenient suffix strictly greater than `rest`, with no upper bound.
fn above(rest: &[u8]) -> String {
    let mut out = String::new();
    for &b in rest {
        let d = digit(b).unwrap_or(BASE - 1);
        if d < BASE - 1 {
            out.push(symbol((d + BASE) / 2));
            return out;
        }
        out.push('z');
    }
    out.push(symbol(MID));
    out
}

/// A rank strictly below `min`; `None` when `min` is all zeros or invalid.
pub fn before(min: &str) -> Option<String> {
    if !is_valid(min) {
        return None;
    }
    let mut out = String::with_capacity(min.len() + 1);
    for b in min.bytes() {
        let d = digit(b)?;
        match d {
            0 => out.push('0'),
            1 => {
                out.push('0');
                out.push(symbol(MID));
                return Some(out);
            }
            _ => {
                out.push(symbol(d - 1));
                return Some(out);
            }
        }
    }
    None
}

/// A rank strictly above `max`; `None` only when `max` is invalid.
pub fn after(max: &str) -> Option<String> {
    if !is_valid(max) {
        return None;
    }
    let mut out = String::with_capacity(max.len() + 1);
    for b in max.bytes() {
        let d = digit(b)?;
        if d < BASE - 1 {
            out.push(symbol(d + 1));
            return Some(out);
        }
        out.push('z');
    }
    out.push(symbol(MID));
    Some(out)
}

/// `n` strictly increasing ranks of equal width, evenly spaced over the rank space.
pub fn spread(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let slots = n as u128 + 1;
    let mut width = 1usize;
    let mut span = u128::from(BASE);
    while span <= slots {
        width += 1;
        span *= u128::from(BASE);
    }
    (1..=n as u128)
        .map(|i| encode(i * span / slots, width))
        .collect()
}

fn encode(mut value: u128, width: usize) -> String {
    let mut digits = vec!['0'; width];
    for slot in digits.iter_mut().rev() {
        *slot = symbol((value % u128::from(BASE)) as u32);
        value /= u128::from(BASE);
    }
    digits.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn midpoint_between_distant_neighbours() {
        assert_eq!(between("a", "c").as_deref(), Some("b"));
        assert_eq!(between("0", "z").as_deref(), Some("h"));
    }

    #[test]
    fn adjacent_neighbours_grow_a_digit() {
        let mid = between("h", "i").unwrap();
        assert!(mid.as_str() > "h" && mid.as_str() < "i", "{mid}");
        let mid = between("hz", "i").unwrap();
        assert!(mid.as_str() > "hz" && mid.as_str() < "i", "{mid}");
    }

    #[test]
    fn no_room_reports_none() {
        assert_eq!(between("h", "h"), None);
        assert_eq!(between("i", "h"), None);
        assert_eq!(between("a", "a0"), None);
        assert_eq!(before("00"), None);
    }

    #[test]
    fn endpoints_step_outward() {
        assert_eq!(after("h").as_deref(), Some("i"));
        assert_eq!(after("zz").as_deref(), Some("zzi"));
        assert_eq!(before("h").as_deref(), Some("g"));
        assert_eq!(before("1").as_deref(), Some("0i"));
    }

    #[test]
    fn spread_is_strictly_increasing() {
        assert_eq!(spread(3), vec!["9", "i", "r"]);
        let many = spread(100);
        assert_eq!(many.len(), 100);
        assert!(many.windows(2).all(|w| w[0] < w[1]));
        assert!(many.iter().all(|r| r.len() == 2));
    }

    fn rank_strategy() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[0-9a-z]{1,6}").expect("rank regex")
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn between_lands_strictly_inside(a in rank_strategy(), b in rank_strategy()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assume!(lo != hi);
            match between(&lo, &hi) {
                Some(mid) => {
                    prop_assert!(lo < mid && mid < hi, "{} < {} < {}", lo, mid, hi);
                    prop_assert!(is_valid(&mid));
                }
                None => prop_assert!(hi.ends_with('0')),
            }
        }

        #[test]
        fn endpoints_are_strict(a in rank_strategy()) {
            let up = after(&a).expect("valid rank");
            prop_assert!(up > a);
            if let Some(down) = before(&a) {
                prop_assert!(down < a);
                prop_assert!(is_valid(&down));
            } else {
                prop_assert!(a.bytes().all(|b| b == b'0'));
            }
        }
    }
}
