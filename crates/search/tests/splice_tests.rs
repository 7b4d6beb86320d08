//! Recipient sorts over the drafts folder and mixed calendar searches.

mod common;

use common::*;
use mailstore_search::types::{ConstraintNode, ItemType, Leaf, NumericRange, SortKey, SortSpec, Window};

fn drafts() -> ConstraintNode {
    let mut leaf = Leaf::with_types([ItemType::Message]);
    leaf.add_in_folder(folder(DRAFTS), true);
    leaf.into()
}

fn rcpt_asc() -> SortSpec {
    SortSpec::asc(SortKey::Rcpt)
}

// ============================================================================
// Drafts without recipients
// ============================================================================

#[test]
fn test_drafts_without_recipients_follow_ascending() {
    let backend = drafts_backend();
    let ids = search_ids(&backend, &drafts(), rcpt_asc(), Window::all());
    let mut expected = vec![10, 11, 12];
    expected.extend(20..=31);
    assert_eq!(ids, expected);
}

#[test]
fn test_drafts_page_inside_first_list() {
    let backend = drafts_backend();
    let ids = search_ids(&backend, &drafts(), rcpt_asc(), Window::page(1, 10));
    let mut expected = vec![11, 12];
    expected.extend(20..=27);
    assert_eq!(ids, expected);
}

#[test]
fn test_drafts_short_first_list_fills_from_second() {
    let recording = RecordingBackend::new(drafts_backend());
    let ids = search_ids(&recording, &drafts(), rcpt_asc(), Window::page(0, 10));
    let mut expected = vec![10, 11, 12];
    expected.extend(20..=26);
    assert_eq!(ids, expected);

    let queries = recording.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].text.contains("mi.recipients IS NOT NULL"));
    assert!(queries[1].text.contains("mi.recipients IS NULL"));
    assert!(queries[1].text.ends_with("LIMIT 7 OFFSET 0"));
}

#[test]
fn test_drafts_page_past_first_list() {
    let recording = RecordingBackend::new(drafts_backend());
    let ids = search_ids(&recording, &drafts(), rcpt_asc(), Window::page(5, 10));
    assert_eq!(ids, (22..=31).collect::<Vec<_>>());

    // First page query, count of the first list, then the second list from
    // offset 5 - 3.
    let queries = recording.queries();
    assert_eq!(queries.len(), 3);
    assert!(queries[1].text.starts_with("SELECT COUNT(*)"));
    assert!(queries[2].text.ends_with("LIMIT 10 OFFSET 2"));
}

#[test]
fn test_drafts_without_recipients_lead_descending() {
    let backend = drafts_backend();
    let ids = search_ids(&backend, &drafts(), SortSpec::desc(SortKey::Rcpt), Window::page(10, 10));
    assert_eq!(ids, vec![21, 20, 12, 11, 10]);
}

#[test]
fn test_recipient_sort_outside_drafts_drops_empty_recipients() {
    let backend = standard_backend();
    let mut junk = Leaf::with_types([ItemType::Message]);
    junk.add_in_folder(folder(JUNK), true);
    let ids = search_ids(&backend, &junk.into(), rcpt_asc(), Window::all());
    assert_eq!(ids, vec![308]);

    // Without drafts in the tree, messages with no recipients are dropped.
    let all = search_ids(&backend, &Leaf::with_types([ItemType::Message]).into(), rcpt_asc(), Window::all());
    assert!(!all.contains(&306));
    assert!(!all.contains(&307));
}

// ============================================================================
// Calendar items
// ============================================================================

fn starting_after_jan_10(types: impl IntoIterator<Item = ItemType>) -> ConstraintNode {
    let mut leaf = Leaf::with_types(types);
    leaf.add_cal_start_range(NumericRange::new(Some(JAN_10_2025), true, None, false, true));
    leaf.into()
}

#[test]
fn test_calendar_range_on_appointments() {
    let backend = calendar_backend();
    let node = starting_after_jan_10([ItemType::Appointment, ItemType::Task]);
    let ids = search_ids(&backend, &node, SortSpec::DATE_DESC, Window::all());
    assert_eq!(ids, vec![12, 11]);
}

#[test]
fn test_calendar_range_with_messages_uses_union() {
    let recording = RecordingBackend::new(calendar_backend());
    let node = starting_after_jan_10([ItemType::Message, ItemType::Appointment]);
    let ids = search_ids(&recording, &node, SortSpec::DATE_DESC, Window::all());
    // Messages ignore the calendar range; the task is not a requested type.
    assert_eq!(ids, vec![2, 11, 1]);
    assert!(recording.queries()[0].text.contains(" UNION ALL "));

    let page = search_ids(&recording, &node, SortSpec::DATE_DESC, Window::page(1, 1));
    assert_eq!(page, vec![11]);
}

#[test]
fn test_calendar_end_range() {
    let backend = calendar_backend();
    let mut leaf = Leaf::with_types([ItemType::Appointment, ItemType::Task]);
    // Ends before Jan 20th: the Jan 1 appointment and the Jan 15 task.
    leaf.add_cal_end_range(NumericRange::new(None, false, Some(JAN_15_2025 + 5 * 86_400_000), false, true));
    let ids = search_ids(&backend, &leaf.into(), SortSpec::asc(SortKey::Date), Window::all());
    assert_eq!(ids, vec![10, 12]);
}
