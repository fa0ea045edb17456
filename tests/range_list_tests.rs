#![cfg(feature = "range-list")]
//! Integration tests for the range list container.

use std::cell::Cell;
use std::ops::Range;
use std::rc::Rc;

use cdata::allocation::{AllocationStrategy, FailingAllocation};
use cdata::ownership::{Merge, Release, TryClone};
use cdata::range_list::{INITIAL_CAPACITY, RangeList, RangeListValue};
use cdata::{Error, ErrorKind, Result};
use rstest::{fixture, rstest};

// =============================================================================
// Test Values
// =============================================================================

/// String value whose clone, merge and release can be made to fail.
///
/// Release empties the text, so a released value reads as `""`.
#[derive(Debug)]
struct Label {
    text: String,
    released: Rc<Cell<usize>>,
    faults: Rc<Cell<Fault>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    /// Clones succeed this many more times, then fail.
    CloneAfter(usize),
    Merge,
    Release,
    /// Only the label with this text refuses release.
    ReleaseOf(&'static str),
}

impl Label {
    fn text(&self) -> &str {
        &self.text
    }
}

impl Release for Label {
    fn release(&mut self) -> Result<()> {
        match self.faults.get() {
            Fault::Release => return Err(Error::invalid_argument("label refuses release")),
            Fault::ReleaseOf(text) if text == self.text => {
                return Err(Error::invalid_argument("label refuses release"));
            }
            _ => {}
        }
        self.released.set(self.released.get() + 1);
        self.text.clear();
        Ok(())
    }
}

impl TryClone for Label {
    fn try_clone(&self) -> Result<Self> {
        if let Fault::CloneAfter(remaining) = self.faults.get() {
            if remaining == 0 {
                return Err(Error::allocation("label refuses clone"));
            }
            self.faults.set(Fault::CloneAfter(remaining - 1));
        }
        Ok(Self {
            text: self.text.clone(),
            released: Rc::clone(&self.released),
            faults: Rc::clone(&self.faults),
        })
    }
}

impl Merge for Label {
    fn merge(existing: &Self, incoming: &Self) -> Result<Self> {
        if existing.faults.get() == Fault::Merge {
            return Err(Error::allocation("label refuses merge"));
        }
        Ok(Self {
            text: format!("{}{}", existing.text, incoming.text),
            released: Rc::clone(&existing.released),
            faults: Rc::clone(&existing.faults),
        })
    }
}

struct Labels {
    released: Rc<Cell<usize>>,
    faults: Rc<Cell<Fault>>,
}

impl Labels {
    fn make(&self, text: &str) -> Label {
        Label {
            text: text.to_string(),
            released: Rc::clone(&self.released),
            faults: Rc::clone(&self.faults),
        }
    }

    fn fail(&self, fault: Fault) {
        self.faults.set(fault);
    }
}

#[fixture]
fn labels() -> Labels {
    Labels {
        released: Rc::new(Cell::new(0)),
        faults: Rc::new(Cell::new(Fault::None)),
    }
}

fn ranges<V, A: AllocationStrategy>(list: &RangeList<V, A>) -> Vec<Range<u64>> {
    list.iter().map(RangeListValue::range).collect()
}

fn texts<A: AllocationStrategy>(list: &RangeList<Label, A>) -> Vec<&str> {
    list.iter().map(|entry| entry.value().text()).collect()
}

// =============================================================================
// Initialize / Free
// =============================================================================

#[rstest]
fn test_initialize_and_free() {
    let mut list: Option<RangeList<String>> = None;
    RangeList::initialize(&mut list).unwrap();
    assert!(list.as_ref().unwrap().is_empty());

    RangeList::free(&mut list).unwrap();
    assert!(list.is_none());
}

#[rstest]
fn test_initialize_rejects_occupied_destination() {
    let mut list = Some(RangeList::<u8>::new());
    list.as_mut().unwrap().insert(0, 1, 7).unwrap();

    let error = RangeList::initialize(&mut list).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidArgument);
    assert_eq!(list.unwrap().len(), 1);
}

#[rstest]
fn test_initialize_allocation_failure() {
    let allocation = FailingAllocation::fail_at(0);
    let mut list: Option<RangeList<u8, _>> = None;

    let error = RangeList::initialize_with(&mut list, &allocation).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AllocationFailure);
    assert!(list.is_none());

    RangeList::initialize_with(&mut list, &allocation).unwrap();
    assert_eq!(allocation.requests(), 2);
}

#[rstest]
fn test_initialize_reserves_initial_capacity() {
    let allocation = FailingAllocation::new();
    let mut list: Option<RangeList<u8, _>> = None;
    RangeList::initialize_with(&mut list, &allocation).unwrap();
    let mut list = list.unwrap();

    for index in 0..INITIAL_CAPACITY as u64 {
        list.insert(index * 2, index * 2 + 1, 0).unwrap();
    }
    assert_eq!(list.len(), INITIAL_CAPACITY);
    assert_eq!(allocation.requests(), 1 + INITIAL_CAPACITY);
}

#[rstest]
fn test_free_none_is_invalid() {
    let mut list: Option<RangeList<u8>> = None;
    assert!(RangeList::free(&mut list).unwrap_err().is_invalid_argument());
}

#[rstest]
fn test_free_releases_every_value(labels: Labels) {
    let mut list = Some(RangeList::new());
    for (start, text) in [(0, "a"), (10, "b"), (20, "c")] {
        list.as_mut().unwrap().insert(start, start + 5, labels.make(text)).unwrap();
    }

    RangeList::free(&mut list).unwrap();
    assert!(list.is_none());
    assert_eq!(labels.released.get(), 3);
}

#[rstest]
fn test_free_release_failure_keeps_remaining(labels: Labels) {
    let mut list = Some(RangeList::new());
    list.as_mut().unwrap().insert(0, 5, labels.make("a")).unwrap();
    list.as_mut().unwrap().insert(5, 9, labels.make("b")).unwrap();
    labels.fail(Fault::Release);

    let error = RangeList::free(&mut list).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CallbackFailure);
    assert_eq!(list.as_ref().unwrap().len(), 2);

    labels.fail(Fault::None);
    RangeList::free(&mut list).unwrap();
    assert_eq!(labels.released.get(), 2);
}

// =============================================================================
// Insert
// =============================================================================

#[rstest]
fn test_insert_into_empty(labels: Labels) {
    let mut list = RangeList::new();
    assert_eq!(list.insert_merge(10, 20, labels.make("A")).unwrap(), 0);

    assert_eq!(list.len(), 1);
    let entry = list.get_by_index(0).unwrap();
    assert_eq!((entry.start(), entry.end(), entry.size()), (10, 20, 10));
    assert_eq!(entry.value().text(), "A");
}

#[rstest]
fn test_insert_merge_with_overlap(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(10, 20, labels.make("A")).unwrap();
    list.insert_merge(15, 25, labels.make("B")).unwrap();

    assert_eq!(ranges(&list), vec![10..25]);
    assert_eq!(texts(&list), vec!["AB"]);
}

#[rstest]
fn test_insert_merge_adjacent_coalesces(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(10, 20, labels.make("b")).unwrap();

    assert_eq!(ranges(&list), vec![0..20]);
    assert_eq!(list.get(15).unwrap().text(), "ab");
}

#[rstest]
fn test_insert_merge_bridges_gap(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(20, 30, labels.make("c")).unwrap();
    list.insert_merge(40, 50, labels.make("z")).unwrap();

    list.insert_merge(10, 20, labels.make("b")).unwrap();
    assert_eq!(ranges(&list), vec![0..30, 40..50]);
    assert_eq!(texts(&list), vec!["abc", "z"]);
}

#[rstest]
fn test_insert_merge_releases_merged_away_values(labels: Labels) {
    let mut list = Some(RangeList::new());
    let inner = list.as_mut().unwrap();
    inner.insert_merge(0, 10, labels.make("a")).unwrap();
    inner.insert_merge(10, 20, labels.make("b")).unwrap();

    // "a" was displaced and "b" folded into the result.
    assert_eq!(texts(inner), vec!["ab"]);
    assert_eq!(labels.released.get(), 2);

    RangeList::free(&mut list).unwrap();
    assert_eq!(labels.released.get(), 3);
}

#[rstest]
fn test_insert_merge_bridge_releases_intermediate_values(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(20, 30, labels.make("c")).unwrap();

    list.insert_merge(10, 20, labels.make("b")).unwrap();
    assert_eq!(texts(&list), vec!["abc"]);
    // "a", "c", the incoming "b" and the intermediate "ab".
    assert_eq!(labels.released.get(), 4);

    list.clear().unwrap();
    assert_eq!(labels.released.get(), 5);
}

#[rstest]
fn test_insert_merge_incoming_release_failure_leaves_list(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    labels.fail(Fault::ReleaseOf("b"));

    let error = list.insert_merge(10, 20, labels.make("b")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CallbackFailure);
    assert_eq!(ranges(&list), vec![0..10]);
    assert_eq!(texts(&list), vec!["a"]);
    // The unused merge result was released.
    assert_eq!(labels.released.get(), 1);
}

#[rstest]
fn test_insert_merge_displaced_release_failure_keeps_merge(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    labels.fail(Fault::ReleaseOf("a"));

    let error = list.insert_merge(10, 20, labels.make("b")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CallbackFailure);
    assert_eq!(ranges(&list), vec![0..20]);
    assert_eq!(texts(&list), vec!["ab"]);
    assert_eq!(labels.released.get(), 1);
}

#[rstest]
fn test_insert_without_merge_conflicts() {
    let mut list = RangeList::new();
    list.insert(10, 20, 1_u32).unwrap();

    let error = list.insert(15, 25, 2).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Conflict);
    assert_eq!(ranges(&list), vec![10..20]);
}

#[rstest]
fn test_insert_without_merge_keeps_adjacent_separate() {
    let mut list = RangeList::new();
    list.insert(10, 20, 1_u32).unwrap();
    assert_eq!(list.insert(20, 30, 2).unwrap(), 1);
    assert_eq!(list.insert(0, 10, 0).unwrap(), 0);

    assert_eq!(ranges(&list), vec![0..10, 10..20, 20..30]);
}

#[rstest]
#[case(5, 5)]
#[case(7, 3)]
fn test_insert_rejects_empty_interval(#[case] start: u64, #[case] end: u64) {
    let mut list = RangeList::new();
    assert!(list.insert(start, end, ()).unwrap_err().is_invalid_argument());
    assert!(list.insert_merge(start, end, ()).unwrap_err().is_invalid_argument());
}

#[rstest]
fn test_insert_merge_failure_leaves_list_unchanged(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(20, 30, labels.make("b")).unwrap();
    labels.fail(Fault::Merge);

    let error = list.insert_merge(5, 25, labels.make("x")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CallbackFailure);
    assert_eq!(ranges(&list), vec![0..10, 20..30]);
    assert_eq!(texts(&list), vec!["a", "b"]);
}

#[rstest]
fn test_insert_with_closure_merge() {
    let mut list = RangeList::new();
    let keep_max =
        |existing: &u32, incoming: &u32| -> Result<u32> { Ok(*existing.max(incoming)) };
    list.insert_with(0, 10, 4, keep_max).unwrap();
    list.insert_with(5, 15, 9, keep_max).unwrap();
    list.insert_with(12, 30, 1, keep_max).unwrap();

    assert_eq!(ranges(&list), vec![0..30]);
    assert_eq!(*list.get(0).unwrap(), 9);
}

#[rstest]
fn test_insert_allocation_failure_leaves_list_unchanged() {
    let allocation = FailingAllocation::new();
    let mut list = RangeList::with_allocation(&allocation);
    list.insert(0, 10, 1_u8).unwrap();

    allocation.arm(0);
    let error = list.insert(20, 30, 2).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AllocationFailure);
    assert_eq!(ranges(&list), vec![0..10]);

    list.insert(20, 30, 2).unwrap();
    assert_eq!(ranges(&list), vec![0..10, 20..30]);
}

#[rstest]
fn test_insert_merge_allocation_fault_sweep() {
    let allocation = FailingAllocation::new();
    let mut list = RangeList::with_allocation(&allocation);
    for start in [0, 20, 40] {
        list.insert(start, start + 10, vec![start]).unwrap();
    }

    let mut attempt = 0;
    loop {
        allocation.arm(attempt);
        let result = list.insert_merge(60, 70, vec![60]);
        if !allocation.has_failed() {
            allocation.disarm();
            result.unwrap();
            break;
        }
        assert_eq!(result.unwrap_err().kind(), ErrorKind::AllocationFailure);
        assert_eq!(ranges(&list), vec![0..10, 20..30, 40..50]);
        attempt += 1;
    }
    assert_eq!(attempt, 1);

    // Merging in place needs no allocation.
    allocation.arm(0);
    list.insert_merge(5, 45, vec![5]).unwrap();
    assert!(!allocation.has_failed());
    assert_eq!(ranges(&list), vec![0..50, 60..70]);
    assert_eq!(list.get(0).unwrap(), &vec![0, 5, 20, 40]);
}

#[rstest]
fn test_insert_range_list_merges_copies(labels: Labels) {
    let mut target = RangeList::new();
    target.insert_merge(0, 10, labels.make("a")).unwrap();
    let mut source = RangeList::new();
    source.insert_merge(10, 20, labels.make("b")).unwrap();
    source.insert_merge(40, 50, labels.make("c")).unwrap();

    target.insert_range_list(&source).unwrap();
    assert_eq!(ranges(&target), vec![0..20, 40..50]);
    assert_eq!(texts(&target), vec!["ab", "c"]);
    assert_eq!(texts(&source), vec!["b", "c"]);
}

#[rstest]
fn test_insert_range_list_failure_leaves_target(labels: Labels) {
    let mut target = RangeList::new();
    target.insert_merge(0, 10, labels.make("a")).unwrap();
    let mut source = RangeList::new();
    source.insert_merge(10, 20, labels.make("b")).unwrap();
    labels.fail(Fault::Merge);

    let error = target.insert_range_list(&source).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CallbackFailure);
    assert_eq!(ranges(&target), vec![0..10]);
    assert_eq!(texts(&target), vec!["a"]);
}

// =============================================================================
// Queries
// =============================================================================

#[rstest]
fn test_get_finds_covering_entry() {
    let mut list = RangeList::new();
    list.insert(0, 10, "low").unwrap();
    list.insert(20, 30, "high").unwrap();

    assert_eq!(*list.get(0).unwrap(), "low");
    assert_eq!(*list.get(9).unwrap(), "low");
    assert_eq!(*list.get(25).unwrap(), "high");
    assert_eq!(list.get_entry(20).unwrap().range(), 20..30);
}

#[rstest]
#[case::gap(15)]
#[case::end_is_exclusive(10)]
#[case::past_last(30)]
fn test_get_not_found(#[case] offset: u64) {
    let mut list = RangeList::new();
    list.insert(0, 10, ()).unwrap();
    list.insert(20, 30, ()).unwrap();

    assert_eq!(list.get(offset).unwrap_err().kind(), ErrorKind::NotFound);
}

#[rstest]
fn test_get_on_empty_list() {
    let list: RangeList<u8> = RangeList::new();
    assert_eq!(list.get(0).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(list.spanning_range(), None);
}

#[rstest]
fn test_range_query_and_contains() {
    let mut list = RangeList::new();
    for start in [0, 20, 40] {
        list.insert(start, start + 10, start).unwrap();
    }

    let hits: Vec<u64> = list
        .range_query(5, 25)
        .unwrap()
        .iter()
        .map(|entry| *entry.value())
        .collect();
    assert_eq!(hits, vec![0, 20]);
    assert!(list.range_query(10, 20).unwrap().is_empty());
    assert!(list.contains_range(45, 100).unwrap());
    assert!(!list.contains_range(50, 100).unwrap());
    assert!(list.contains_range(3, 3).is_err());
    assert_eq!(list.spanning_range(), Some(0..50));
}

#[rstest]
fn test_get_by_index_out_of_bounds() {
    let mut list = RangeList::new();
    list.insert(0, 1, ()).unwrap();
    assert_eq!(list.get_by_index(1).unwrap_err().kind(), ErrorKind::OutOfBounds);
    assert_eq!(list.first().map(RangeListValue::start), Some(0));
    assert_eq!(list.last().map(RangeListValue::end), Some(1));
}

// =============================================================================
// Remove
// =============================================================================

#[rstest]
fn test_remove_splits_containing_entry(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("A")).unwrap();

    let removed = list.remove(3, 7).unwrap();
    assert!(removed.is_empty());
    assert_eq!(ranges(&list), vec![0..3, 7..10]);
    assert_eq!(texts(&list), vec!["A", "A"]);
    assert_eq!(list.get(5).unwrap_err().kind(), ErrorKind::NotFound);
}

#[rstest]
fn test_remove_split_halves_own_their_values(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("A")).unwrap();
    list.remove(3, 7).unwrap();

    let mut left = list.remove(0, 3).unwrap();
    assert_eq!(left.len(), 1);
    left[0].release().unwrap();
    assert_eq!(left[0].value().text(), "");

    assert_eq!(ranges(&list), vec![7..10]);
    assert_eq!(texts(&list), vec!["A"]);
    list.clear().unwrap();
    assert_eq!(labels.released.get(), 2);
}

#[rstest]
fn test_remove_trims_partial_overlaps() {
    let mut list = RangeList::new();
    list.insert(0, 10, 'a').unwrap();
    list.insert(20, 30, 'b').unwrap();

    let removed = list.remove(5, 25).unwrap();
    assert!(removed.is_empty());
    assert_eq!(ranges(&list), vec![0..5, 25..30]);
}

#[rstest]
fn test_remove_returns_whole_entries() {
    let mut list = RangeList::new();
    list.insert(0, 10, 'a').unwrap();
    list.insert(10, 20, 'b').unwrap();
    list.insert(30, 40, 'c').unwrap();

    let removed = list.remove(0, 20).unwrap();
    let removed: Vec<(Range<u64>, char)> = removed
        .into_iter()
        .map(RangeListValue::into_parts)
        .collect();
    assert_eq!(removed, vec![(0..10, 'a'), (10..20, 'b')]);
    assert_eq!(ranges(&list), vec![30..40]);
}

#[rstest]
fn test_remove_outside_any_entry_is_noop() {
    let mut list = RangeList::new();
    list.insert(0, 10, 1_u8).unwrap();
    assert!(list.remove(10, 20).unwrap().is_empty());
    assert_eq!(ranges(&list), vec![0..10]);
    assert!(list.remove(4, 4).unwrap_err().is_invalid_argument());
}

#[rstest]
fn test_remove_split_clone_failure_leaves_list(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("A")).unwrap();
    labels.fail(Fault::CloneAfter(0));

    let error = list.remove(3, 7).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CallbackFailure);
    assert_eq!(ranges(&list), vec![0..10]);
}

#[rstest]
fn test_remove_split_allocation_failure_leaves_list() {
    let allocation = FailingAllocation::new();
    let mut list = RangeList::with_allocation(&allocation);
    list.insert(0, 10, 1_u64).unwrap();

    allocation.arm(0);
    let error = list.remove(3, 7).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AllocationFailure);
    assert_eq!(ranges(&list), vec![0..10]);

    list.remove(3, 7).unwrap();
    assert_eq!(ranges(&list), vec![0..3, 7..10]);
}

// =============================================================================
// Clone / Clear
// =============================================================================

#[rstest]
fn test_clone_is_independent(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(20, 30, labels.make("b")).unwrap();

    let mut copy = None;
    RangeList::clone_into(&mut copy, Some(&list)).unwrap();
    let mut copy = copy.unwrap();
    copy.insert_merge(10, 20, labels.make("x")).unwrap();

    assert_eq!(ranges(&list), vec![0..10, 20..30]);
    assert_eq!(ranges(&copy), vec![0..30]);
}

#[rstest]
fn test_clone_survives_freeing_source(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(20, 30, labels.make("b")).unwrap();

    let mut copy = None;
    RangeList::clone_into(&mut copy, Some(&list)).unwrap();
    let mut source = Some(list);
    RangeList::free(&mut source).unwrap();
    assert_eq!(labels.released.get(), 2);

    let copy = copy.unwrap();
    assert_eq!(ranges(&copy), vec![0..10, 20..30]);
    assert_eq!(texts(&copy), vec!["a", "b"]);
    assert_eq!(copy.get(25).unwrap().text(), "b");
}

#[rstest]
fn test_clone_of_none_stays_none() {
    let mut copy: Option<RangeList<u8>> = None;
    RangeList::clone_into(&mut copy, None).unwrap();
    assert!(copy.is_none());
}

#[rstest]
fn test_clone_rejects_occupied_destination() {
    let list: RangeList<u8> = RangeList::new();
    let mut copy = Some(RangeList::new());
    assert!(RangeList::clone_into(&mut copy, Some(&list)).unwrap_err().is_invalid_argument());
}

#[rstest]
fn test_clone_value_failure_releases_partial_copy(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(20, 30, labels.make("b")).unwrap();
    labels.fail(Fault::CloneAfter(1));

    let mut copy = None;
    let error = RangeList::clone_into(&mut copy, Some(&list)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::CallbackFailure);
    assert!(copy.is_none());
    // The copy of "a" was released again.
    assert_eq!(labels.released.get(), 1);
    assert_eq!(texts(&list), vec!["a", "b"]);
}

#[rstest]
fn test_clone_allocation_failure() {
    let allocation = FailingAllocation::new();
    let mut list = RangeList::with_allocation(&allocation);
    list.insert(0, 10, 1_u32).unwrap();

    allocation.arm(0);
    let mut copy = None;
    let error = RangeList::clone_into(&mut copy, Some(&list)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AllocationFailure);
    assert!(copy.is_none());
}

#[rstest]
fn test_clear_releases_and_empties(labels: Labels) {
    let mut list = RangeList::new();
    list.insert_merge(0, 10, labels.make("a")).unwrap();
    list.insert_merge(20, 30, labels.make("b")).unwrap();

    list.clear().unwrap();
    assert!(list.is_empty());
    assert_eq!(labels.released.get(), 2);
}
