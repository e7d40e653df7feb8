//! Unit tests for the truncation law: strings over a bound are cut to
//! exactly the bound and end with the ellipsis marker; strings at or under
//! the bound pass through unchanged.

use agent_console::protocol::classify::truncate;

#[test]
fn string_under_bound_is_unchanged() {
    assert_eq!(truncate("short", 10), "short");
}

#[test]
fn string_at_bound_is_unchanged() {
    let exact = "a".repeat(10);
    assert_eq!(truncate(&exact, 10), exact);
}

#[test]
fn string_over_bound_is_cut_to_exactly_the_bound() {
    let long = "b".repeat(11);
    let cut = truncate(&long, 10);
    assert_eq!(cut.chars().count(), 10);
    assert!(cut.ends_with("..."));
    assert_eq!(cut, format!("{}...", "b".repeat(7)));
}

#[test]
fn much_longer_string_still_lands_on_the_bound() {
    let cut = truncate(&"c".repeat(10_000), 200);
    assert_eq!(cut.chars().count(), 200);
    assert!(cut.ends_with("..."));
}

#[test]
fn truncation_counts_characters_not_bytes() {
    let long: String = "é".repeat(20);
    let cut = truncate(&long, 10);
    assert_eq!(cut.chars().count(), 10);
    assert_eq!(cut, format!("{}...", "é".repeat(7)));
}

#[test]
fn empty_string_is_unchanged() {
    assert_eq!(truncate("", 5), "");
}
