use assert_matches::assert_matches;

use rankscan::domain::{IdRange, ProfileId};
use rankscan::error::RankscanError;

#[test]
fn parse_range_forms() {
    let range: IdRange = "1..=5".parse().unwrap();
    assert_eq!((range.start(), range.end()), (1, 5));
    let range: IdRange = " 10-12 ".parse().unwrap();
    assert_eq!((range.start(), range.end()), (10, 12));
    assert_eq!(range.id_count(), 3);
}

#[test]
fn parse_range_invalid() {
    assert_matches!("5..=1".parse::<IdRange>(), Err(RankscanError::InvalidRange(_)));
    assert_matches!("0..=3".parse::<IdRange>(), Err(RankscanError::InvalidRange(_)));
    assert_matches!("abc".parse::<IdRange>(), Err(RankscanError::InvalidRange(_)));
    assert_matches!(ProfileId::new(0), Err(RankscanError::InvalidRange(_)));
}

#[test]
fn windows_cover_range_contiguously() {
    let range = IdRange::new(1, 5).unwrap();
    let windows: Vec<Vec<u64>> = range
        .windows(2)
        .map(|window| window.into_iter().map(ProfileId::get).collect())
        .collect();
    assert_eq!(windows, vec![vec![1, 2], vec![3, 4], vec![5]]);

    let single = IdRange::new(7, 7).unwrap();
    assert_eq!(single.windows(50).count(), 1);
}

#[test]
fn nth_id_stops_at_end() {
    let range = IdRange::new(3, 4).unwrap();
    assert_eq!(range.nth_id(0).map(ProfileId::get), Some(3));
    assert_eq!(range.nth_id(1).map(ProfileId::get), Some(4));
    assert_eq!(range.nth_id(2), None);
    assert_eq!(range.nth_id(u64::MAX), None);
}

#[test]
fn reference_appends_id() {
    let id = ProfileId::new(42).unwrap();
    assert_eq!(
        id.reference("https://example.test/profile.php?id="),
        "https://example.test/profile.php?id=42"
    );
}
