use lanwatch::model::DeviceRecord;
use lanwatch::view::{SortKey, ViewState};
use std::time::{Duration, Instant};
use test_utils::create_test_device;

mod test_utils;

fn devices(reference: Instant, count: u8) -> Vec<DeviceRecord> {
    (1..=count)
        .map(|n| create_test_device(&format!("10.0.0.{}", n), reference))
        .collect()
}

fn ips(rows: &[&DeviceRecord]) -> Vec<String> {
    rows.iter().map(|d| d.ip.to_string()).collect()
}

#[test]
fn test_toggle_sort() {
    let mut view = ViewState::new();
    assert_eq!(view.sort, SortKey::Ip);
    assert!(!view.descending);

    view.toggle_sort(SortKey::Ip);
    assert!(view.descending);

    view.toggle_sort(SortKey::Rtt);
    assert_eq!(view.sort, SortKey::Rtt);
    assert!(!view.descending);
    assert_eq!(SortKey::from_key('r'), Some(SortKey::Rtt));
    assert_eq!(SortKey::from_key('x'), None);
}

#[test]
fn test_rtt_sort_puts_unknown_last() {
    let now = Instant::now();
    let mut list = devices(now, 3);
    list[0].rtt = None;
    list[1].rtt = Some(Duration::from_millis(9));
    list[2].rtt = Some(Duration::from_millis(2));

    let mut view = ViewState::new();
    view.toggle_sort(SortKey::Rtt);
    assert_eq!(ips(&view.rows(&list, now)), ["10.0.0.3", "10.0.0.2", "10.0.0.1"]);
}

#[test]
fn test_ties_fall_back_to_ip() {
    let now = Instant::now();
    let mut list = devices(now, 3);
    list.reverse();
    let mut view = ViewState::new();
    view.toggle_sort(SortKey::Device);
    assert_eq!(ips(&view.rows(&list, now)), ["10.0.0.1", "10.0.0.2", "10.0.0.3"]);

    view.toggle_sort(SortKey::Device);
    assert_eq!(ips(&view.rows(&list, now)), ["10.0.0.3", "10.0.0.2", "10.0.0.1"]);
}

#[test]
fn test_bad_filter_keeps_previous() {
    let now = Instant::now();
    let list = devices(now, 5);
    let mut view = ViewState::new();

    view.apply_filter("ip=10.0.0.1-10.0.0.2").unwrap();
    assert_eq!(view.rows(&list, now).len(), 2);
    view.apply_filter("ip=10.0.0.1-2").unwrap();
    assert_eq!(view.rows(&list, now).len(), 2);

    assert!(view.apply_filter("colour=red").is_err());
    assert!(view.filter_error().is_some());
    assert_eq!(view.filter().text(), "ip=10.0.0.1-2");
    assert_eq!(view.rows(&list, now).len(), 2);

    view.clear_filter();
    assert!(view.filter_error().is_none());
    assert_eq!(view.rows(&list, now).len(), 5);
}

#[test]
fn test_history_is_capped_and_deduplicated() {
    let mut view = ViewState::new();
    for n in 0..25 {
        view.apply_filter(&format!("host-{}", n)).unwrap();
    }
    let history: Vec<&str> = view.history().collect();
    assert_eq!(history.len(), 20);
    assert_eq!(history[0], "host-24");
    assert_eq!(history[19], "host-5");

    view.apply_filter("host-10").unwrap();
    let history: Vec<&str> = view.history().collect();
    assert_eq!(history.len(), 20);
    assert_eq!(history[0], "host-10");
    assert_eq!(history.iter().filter(|h| **h == "host-10").count(), 1);
}

#[test]
fn test_paging() {
    let mut view = ViewState::new();
    view.set_viewport(16, 6);
    assert_eq!(view.page_size(), 10);
    assert_eq!(view.page_count(25), 3);
    assert_eq!(view.page_count(0), 1);

    view.next_page(25);
    view.next_page(25);
    assert_eq!(view.page(25), 2);
    assert_eq!(view.page_range(25), 20..25);

    view.next_page(25);
    assert_eq!(view.page(25), 2);

    view.prev_page(25);
    assert_eq!(view.page(25), 1);
    assert_eq!(view.selected(25), Some(10));

    view.set_viewport(3, 6);
    assert_eq!(view.page_size(), 1);
}

#[test]
fn test_selection_is_clamped() {
    let mut view = ViewState::new();
    assert_eq!(view.selected(0), None);

    view.select_last(25);
    assert_eq!(view.selected(25), Some(24));
    view.select_down(25);
    assert_eq!(view.selected(25), Some(24));

    // The list shrank under the cursor
    assert_eq!(view.selected(5), Some(4));
    view.select_up(5);
    assert_eq!(view.selected(5), Some(3));

    view.select_first();
    view.select_up(5);
    assert_eq!(view.selected(5), Some(0));
}
