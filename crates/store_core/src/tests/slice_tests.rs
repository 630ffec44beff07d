use super::*;

fn key(item: &(u32, &'static str)) -> u32 {
    item.0
}

#[test]
fn fulfilled_merge_preserves_first_insertion_order() {
    let mut slice: CollectionState<u32, (u32, &'static str)> = CollectionState::default();
    slice.begin();
    assert!(slice.try_settle(1));
    slice.apply_fulfilled(vec![(1, "a"), (2, "b"), (3, "c")], key);

    // Re-fetch delivers the same ids in a different order with one changed
    // value and one new entry.
    slice.begin();
    assert!(slice.try_settle(2));
    slice.apply_fulfilled(vec![(3, "c2"), (1, "a"), (4, "d"), (2, "b")], key);

    let values: Vec<_> = slice.iter().map(|item| item.1).collect();
    assert_eq!(values, vec!["a", "b", "c2", "d"]);
    assert_eq!(slice.len(), 4);
    assert_eq!(slice.request_state().status, RequestStatus::Succeeded);
}

#[test]
fn refetching_unchanged_collection_is_idempotent() {
    let items = vec![(1, "a"), (2, "b")];
    let mut slice: CollectionState<u32, (u32, &'static str)> = CollectionState::default();
    assert!(slice.try_settle(1));
    slice.apply_fulfilled(items.clone(), key);
    let first: Vec<_> = slice.iter().cloned().collect();

    assert!(slice.try_settle(2));
    slice.apply_fulfilled(items, key);
    let second: Vec<_> = slice.iter().cloned().collect();

    assert_eq!(first, second);
}

#[test]
fn stale_settlement_is_rejected() {
    let mut slice: CollectionState<u32, (u32, &'static str)> = CollectionState::default();
    assert!(slice.try_settle(2));
    // An older in-flight request settling afterwards must not win.
    assert!(!slice.try_settle(1));
    assert!(!slice.try_settle(2));
    assert!(slice.try_settle(3));
}

#[test]
fn rejected_fetch_keeps_existing_entries() {
    let mut slice: CollectionState<u32, (u32, &'static str)> = CollectionState::default();
    assert!(slice.try_settle(1));
    slice.apply_fulfilled(vec![(1, "a")], key);

    slice.begin();
    assert_eq!(slice.request_state().status, RequestStatus::Loading);
    assert!(slice.try_settle(2));
    slice.apply_rejected("server rejected the request with status 500".to_string());

    assert_eq!(slice.len(), 1);
    let state = slice.request_state();
    assert_eq!(state.status, RequestStatus::Failed);
    assert!(state.last_error.is_some());
}

#[test]
fn get_returns_none_for_unknown_id() {
    let slice: CollectionState<u32, (u32, &'static str)> = CollectionState::default();
    assert!(slice.get(&42).is_none());
}

#[test]
fn reset_clears_entries_but_keeps_the_settlement_gate() {
    let mut slice: CollectionState<u32, (u32, &'static str)> = CollectionState::default();
    assert!(slice.try_settle(5));
    slice.apply_fulfilled(vec![(1, "a")], key);

    slice.reset();
    assert!(slice.is_empty());
    assert_eq!(slice.request_state(), RequestState::default());
    // A settlement from before the reset still cannot apply.
    assert!(!slice.try_settle(4));
    assert!(slice.try_settle(6));
}
