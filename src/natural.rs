//! Natural ("human") string ordering.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Compare two strings so that embedded numbers sort by value.
///
/// Letters compare case-insensitively and digit runs compare numerically, so
/// `"file2"` sorts before `"File10"`. Strings that differ only in case or in
/// leading zeros fall back to a plain comparison, which keeps the ordering
/// total and the sort deterministic.
///
/// ```
/// use eximgpdf::natural_cmp;
/// use std::cmp::Ordering;
///
/// assert_eq!(natural_cmp("p2.pdf", "p10.pdf"), Ordering::Less);
/// assert_eq!(natural_cmp("B.pdf", "a.pdf"), Ordering::Greater);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ordering = compare_numbers(&take_digits(&mut left), &take_digits(&mut right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

/// Compare two runs of ASCII digits by numeric value, without overflow.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut items: Vec<&str>) -> Vec<&str> {
        items.sort_by(|a, b| natural_cmp(a, b));
        items
    }

    #[test]
    fn numbers_sort_by_value() {
        assert_eq!(
            sorted(vec!["f10.pdf", "f2.pdf", "f1.pdf"]),
            vec!["f1.pdf", "f2.pdf", "f10.pdf"]
        );
    }

    #[test]
    fn letters_ignore_case() {
        assert_eq!(sorted(vec!["beta", "Alpha", "gamma"]), vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn multiple_numeric_runs() {
        assert_eq!(
            sorted(vec!["/d/v2/p10", "/d/v10/p1", "/d/v2/p9"]),
            vec!["/d/v2/p9", "/d/v2/p10", "/d/v10/p1"]
        );
    }

    #[test]
    fn huge_numbers_do_not_overflow() {
        let a = "n99999999999999999999999999";
        let b = "n100000000000000000000000000";
        assert_eq!(natural_cmp(a, b), Ordering::Less);
    }

    #[test]
    fn leading_zeros_and_case_still_give_a_total_order() {
        assert_eq!(natural_cmp("a01", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("A", "a"), Ordering::Less);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn prefix_sorts_first() {
        assert_eq!(natural_cmp("file", "file1"), Ordering::Less);
    }
}
