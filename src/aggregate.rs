//! # Aggregation driver
//!
//! The driver threads an accumulation state through a sequence of calls made
//! by the host, one call per input row:
//!
//! - `accumulate(state, value, type)` - skips nulls, creates the set lazily on
//!   the first non-null value, inserts the value and applies the resize policy.
//! - `finalize(state)` - reads out the distinct count, or `None` when no
//!   non-null value was ever accumulated.
//! - `combine(state, other)` - folds a partial state (e.g. computed by another
//!   worker) into `state`.
//!
//! The state is `Option<Representation>`, owned by whatever represents one
//! accumulation sequence and dropped together with it. [`CountDistinct`]
//! bundles such a state with its policy and an optional resize observer.

use std::fmt::{Debug, Formatter};
use std::hash::Hasher;
use std::time::Instant;

use log::trace;
use wyhash::WyHash;

use crate::error::{Error, Result};
use crate::hashset::{BUCKET_LIMIT, MAX_BUCKETS};
use crate::representation::{Representation, RepresentationTrait};
use crate::stats::{ResizeEvent, ResizeObserver, TableStats};
use crate::value::{FixedWidth, ValueType};

/// Accumulation state: absent until the first non-null value arrives
pub type State<H = WyHash> = Option<Representation<H>>;

/// Decides when the driver grows a set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizePolicy {
    /// Average bucket size (floor of items / buckets) which triggers a resize
    pub bucket_limit: usize,
    /// Bucket count the table never grows past
    pub max_buckets: usize,
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self {
            bucket_limit: BUCKET_LIMIT,
            max_buckets: MAX_BUCKETS,
        }
    }
}

impl ResizePolicy {
    /// Return whether a set with given number of items and buckets must grow.
    ///
    /// Occupancy uses integer division, so a table resizes only once every
    /// bucket could hold `bucket_limit` items on average.
    #[inline]
    pub fn should_resize(&self, items: usize, buckets: usize) -> bool {
        items / buckets >= self.bucket_limit && buckets * 4 <= self.max_buckets.min(MAX_BUCKETS)
    }
}

/// Add one value to the accumulation state with the default policy.
///
/// A null `value` returns `state` unchanged. Fails when `ty` is not a
/// fixed-length by-value type or when the value width doesn't match.
pub fn accumulate<H: Hasher + Default>(
    state: State<H>,
    value: Option<&[u8]>,
    ty: ValueType,
) -> Result<State<H>> {
    accumulate_with(state, value, ty, &ResizePolicy::default(), None)
}

/// Add one value to the accumulation state, resizing according to `policy`
/// and reporting resizes to `observer`.
pub fn accumulate_with<H: Hasher + Default>(
    mut state: State<H>,
    value: Option<&[u8]>,
    ty: ValueType,
    policy: &ResizePolicy,
    observer: Option<&mut dyn ResizeObserver>,
) -> Result<State<H>> {
    accumulate_in_place(&mut state, value, ty, policy, observer)?;
    Ok(state)
}

/// Add one value to `state`. Values are validated before `state` is touched,
/// so a rejected value leaves it as it was.
fn accumulate_in_place<H: Hasher + Default>(
    state: &mut State<H>,
    value: Option<&[u8]>,
    ty: ValueType,
    policy: &ResizePolicy,
    observer: Option<&mut (dyn ResizeObserver + '_)>,
) -> Result<()> {
    // skip null values altogether, keeping whatever state was accumulated
    let Some(value) = value else {
        return Ok(());
    };

    let width = ty.fixed_width()?;
    if value.len() != width {
        return Err(Error::WidthMismatch {
            expected: width,
            actual: value.len(),
        });
    }
    check_width(state.as_ref(), width)?;

    let mut set = match state.take() {
        Some(set) => set,
        None => {
            trace!("creating distinct set for {}-byte values", width);
            Representation::new(width)?
        }
    };
    let result = insert(&mut set, value, policy, observer);
    *state = Some(set);
    result
}

/// Check that values of `width` bytes can go into `state`
#[inline]
fn check_width<H: Hasher + Default>(state: Option<&Representation<H>>, width: usize) -> Result<()> {
    match state {
        Some(set) if set.value_length() != width => Err(Error::WidthMismatch {
            expected: set.value_length(),
            actual: width,
        }),
        _ => Ok(()),
    }
}

/// Read out the distinct count of the accumulation state
#[inline]
pub fn finalize<H: Hasher + Default>(state: Option<&Representation<H>>) -> Option<i64> {
    // a set never holds more than i64::MAX values
    state.map(|set| set.len() as i64)
}

/// Fold partial state `other` into `state` with the default policy.
pub fn combine<H: Hasher + Default>(state: State<H>, other: Option<&Representation<H>>) -> Result<State<H>> {
    combine_with(state, other, &ResizePolicy::default(), None)
}

/// Fold partial state `other` into `state`, resizing according to `policy`.
pub fn combine_with<H: Hasher + Default>(
    mut state: State<H>,
    other: Option<&Representation<H>>,
    policy: &ResizePolicy,
    observer: Option<&mut dyn ResizeObserver>,
) -> Result<State<H>> {
    combine_in_place(&mut state, other, policy, observer)?;
    Ok(state)
}

/// Fold `other` into `state`, which is left as it was when widths differ
fn combine_in_place<H: Hasher + Default>(
    state: &mut State<H>,
    other: Option<&Representation<H>>,
    policy: &ResizePolicy,
    mut observer: Option<&mut (dyn ResizeObserver + '_)>,
) -> Result<()> {
    let Some(other) = other else {
        return Ok(());
    };
    let width = other.value_length();
    check_width(state.as_ref(), width)?;

    let mut set = match state.take() {
        Some(set) => set,
        None => Representation::new(width)?,
    };
    let result = other
        .to_bytes()
        .chunks_exact(width)
        .try_for_each(|value| insert(&mut set, value, policy, observer.as_deref_mut()));
    *state = Some(set);
    result
}

/// Insert value and grow the set when the policy says so
#[inline]
fn insert<H: Hasher + Default>(
    set: &mut Representation<H>,
    value: &[u8],
    policy: &ResizePolicy,
    observer: Option<&mut (dyn ResizeObserver + '_)>,
) -> Result<()> {
    set.insert_bytes(value)?;
    if policy.should_resize(set.len(), set.bucket_count()) {
        resize(set, observer)?;
    }
    Ok(())
}

/// Resize the set, notifying the observer around it
fn resize<H: Hasher + Default>(
    set: &mut Representation<H>,
    observer: Option<&mut (dyn ResizeObserver + '_)>,
) -> Result<()> {
    let Some(observer) = observer else {
        return set.resize();
    };

    let before = observer_stats(&*observer, set);
    observer.before_resize(before.as_ref());

    let old_buckets = set.bucket_count();
    let start = Instant::now();
    set.resize()?;
    let event = ResizeEvent {
        items: set.len(),
        old_buckets,
        new_buckets: set.bucket_count(),
        duration: start.elapsed(),
    };

    let after = observer_stats(&*observer, set);
    observer.after_resize(&event, after.as_ref());
    Ok(())
}

#[inline]
fn observer_stats<H: Hasher + Default>(
    observer: &dyn ResizeObserver,
    set: &Representation<H>,
) -> Option<TableStats> {
    observer.wants_stats().then(|| set.stats())
}

/// Exact `COUNT(DISTINCT ...)` accumulator for a single accumulation sequence.
///
/// ```
/// use count_distinct::CountDistinct;
///
/// let mut count: CountDistinct = CountDistinct::new();
/// for v in [Some(5i32), Some(5), None, Some(7), Some(5), Some(9)] {
///     count.insert(v).unwrap();
/// }
/// assert_eq!(count.finalize(), Some(3));
/// ```
pub struct CountDistinct<H: Hasher + Default = WyHash> {
    state: State<H>,
    policy: ResizePolicy,
    observer: Option<Box<dyn ResizeObserver + Send>>,
}

impl<H: Hasher + Default> CountDistinct<H> {
    /// Create accumulator with no state and the default resize policy
    pub fn new() -> Self {
        Self::with_policy(ResizePolicy::default())
    }

    /// Create accumulator with no state and a custom resize policy
    pub fn with_policy(policy: ResizePolicy) -> Self {
        Self {
            state: None,
            policy,
            observer: None,
        }
    }

    /// Report every resize of this accumulator's set to `observer`
    pub fn with_observer(mut self, observer: impl ResizeObserver + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Accumulate a typed value; `None` is skipped
    #[inline]
    pub fn insert<T: FixedWidth>(&mut self, value: Option<T>) -> Result<()> {
        let bytes = value.map(T::to_bytes);
        self.accumulate(bytes.as_ref().map(|b| b.as_ref()), T::value_type())
    }

    /// Accumulate raw value bytes of declared type `ty`; `None` is skipped
    pub fn accumulate(&mut self, value: Option<&[u8]>, ty: ValueType) -> Result<()> {
        let observer = self
            .observer
            .as_deref_mut()
            .map(|o| o as &mut dyn ResizeObserver);
        accumulate_in_place(&mut self.state, value, ty, &self.policy, observer)
    }

    /// Fold another accumulator's values into this one
    pub fn merge(&mut self, rhs: &Self) -> Result<()> {
        let observer = self
            .observer
            .as_deref_mut()
            .map(|o| o as &mut dyn ResizeObserver);
        combine_in_place(&mut self.state, rhs.state.as_ref(), &self.policy, observer)
    }

    /// Return the distinct count, or `None` when no non-null value was seen
    #[inline]
    pub fn finalize(&self) -> Option<i64> {
        finalize(self.state.as_ref())
    }

    /// Return accumulated set, if any
    #[inline]
    pub fn state(&self) -> Option<&Representation<H>> {
        self.state.as_ref()
    }

    /// Take accumulated set out, leaving the accumulator empty
    #[inline]
    pub fn take_state(&mut self) -> State<H> {
        self.state.take()
    }

    /// Return number of buckets of the accumulated set
    #[inline]
    pub fn bucket_count(&self) -> Option<usize> {
        self.state.as_ref().map(|set| set.bucket_count())
    }

    /// Return bucket statistics of the accumulated set
    pub fn stats(&self) -> Option<TableStats> {
        self.state.as_ref().map(|set| set.stats())
    }
}

impl<H: Hasher + Default> Default for CountDistinct<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hasher + Default> Debug for CountDistinct<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            Some(set) => write!(f, "{:?}", set),
            None => write!(f, "{{ empty }}"),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::value::TypeLength;
    use crate::Crc32;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use test_case::test_case;

    #[test]
    fn test_scenario_duplicates() {
        let mut count = CountDistinct::<WyHash>::new();
        for v in [5i32, 5, 7, 5, 9] {
            count.insert(Some(v)).unwrap();
        }
        assert_eq!(count.finalize(), Some(3));
    }

    #[test]
    fn test_only_nulls() {
        let mut state: State = None;
        for _ in 0..3 {
            state = accumulate(state, None, ValueType::fixed(4)).unwrap();
            assert!(state.is_none());
        }
        assert_eq!(finalize(state.as_ref()), None);
    }

    #[test]
    fn test_null_keeps_state() {
        let state: State = accumulate(None, Some(&[1, 0, 0, 0]), ValueType::fixed(4)).unwrap();
        let state = accumulate(state, None, ValueType::fixed(4)).unwrap();
        let set = state.as_ref().unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains_bytes(&[1, 0, 0, 0]));

        // nulls are skipped before the type is even looked at
        let state = accumulate(state, None, ValueType::varlena()).unwrap();
        assert_eq!(finalize(state.as_ref()), Some(1));
    }

    #[test_case(0 => None)]
    #[test_case(1 => Some(4))]
    #[test_case(79 => Some(4))]
    #[test_case(80 => Some(16))]
    #[test_case(319 => Some(16))]
    #[test_case(320 => Some(64))]
    #[test_case(1_280 => Some(256))]
    #[test_case(5_119 => Some(256))]
    #[test_case(5_120 => Some(1_024))]
    #[test_case(100_000 => Some(16_384))]
    fn test_bucket_growth(n: i32) -> Option<usize> {
        let mut count = CountDistinct::<WyHash>::new();
        for i in 0..n {
            count.insert(Some(i)).unwrap();
        }
        assert_eq!(count.finalize(), (n > 0).then_some(i64::from(n)));
        count.bucket_count()
    }

    #[test]
    fn test_bucket_growth_stops_at_max_buckets() {
        // a policy with a low limit reaches the bucket ceiling quickly
        let policy = ResizePolicy {
            bucket_limit: 1,
            max_buckets: MAX_BUCKETS,
        };
        let mut count = CountDistinct::<WyHash>::with_policy(policy);
        for i in 0..300_000i64 {
            count.insert(Some(i)).unwrap();
        }
        assert_eq!(count.bucket_count(), Some(MAX_BUCKETS));
        assert_eq!(count.finalize(), Some(300_000));
    }

    #[test_case(ResizePolicy::default(), 79, 4 => false)]
    #[test_case(ResizePolicy::default(), 80, 4 => true)]
    #[test_case(ResizePolicy::default(), 100, 16 => false)]
    #[test_case(ResizePolicy::default(), 5_000_000, 65_536 => true)]
    #[test_case(ResizePolicy::default(), 5_000_000, 262_144 => false)]
    #[test_case(ResizePolicy { bucket_limit: 20, max_buckets: 64 }, 320, 16 => true)]
    #[test_case(ResizePolicy { bucket_limit: 20, max_buckets: 64 }, 1_280, 64 => false)]
    fn test_should_resize(policy: ResizePolicy, items: usize, buckets: usize) -> bool {
        policy.should_resize(items, buckets)
    }

    #[test]
    fn test_random_values_match_std_hashset() {
        let mut rng = StdRng::seed_from_u64(12345);
        let mut count = CountDistinct::<Crc32>::new();
        let mut expected = std::collections::HashSet::new();
        for _ in 0..50_000 {
            let v: u16 = rng.gen();
            let v = (!rng.gen_bool(0.1)).then_some(v);
            count.insert(v).unwrap();
            expected.extend(v);
        }
        assert_eq!(count.finalize(), Some(expected.len() as i64));
    }

    #[test]
    fn test_independent_sequences() {
        let mut lhs = CountDistinct::<WyHash>::new();
        let mut rhs = CountDistinct::<WyHash>::new();
        for i in 0..1_000u64 {
            lhs.insert(Some(i % 10)).unwrap();
            rhs.insert(Some(i)).unwrap();
        }
        assert_eq!(lhs.finalize(), Some(10));
        assert_eq!(rhs.finalize(), Some(1_000));
    }

    #[test_case(ValueType::varlena())]
    #[test_case(ValueType { length: TypeLength::CString, by_value: false })]
    #[test_case(ValueType { length: TypeLength::Fixed(16), by_value: false })]
    fn test_unsupported_type(ty: ValueType) {
        let err = accumulate::<WyHash>(None, Some(&[0; 16]), ty).unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { .. }));
    }

    #[test]
    fn test_unsupported_width() {
        let err = accumulate::<WyHash>(None, Some(&[0; 3]), ValueType::fixed(3)).unwrap_err();
        assert_eq!(err, Error::UnsupportedWidth(3));
    }

    #[test]
    fn test_width_mismatch() {
        let mut count = CountDistinct::<WyHash>::new();
        for i in 0..10i32 {
            count.insert(Some(i)).unwrap();
        }
        assert_eq!(
            count.insert(Some(1i64)).unwrap_err(),
            Error::WidthMismatch {
                expected: 4,
                actual: 8
            }
        );
        assert!(count.accumulate(Some(&[0; 16]), ValueType::varlena()).is_err());

        // rejected values leave the accumulated set untouched
        assert_eq!(count.finalize(), Some(10));
        count.insert(Some(10i32)).unwrap();
        assert_eq!(count.finalize(), Some(11));

        assert_eq!(
            accumulate::<WyHash>(None, Some(&[0; 2]), ValueType::fixed(4)).unwrap_err(),
            Error::WidthMismatch {
                expected: 4,
                actual: 2
            }
        );
    }

    #[test_case(0, 0 => None)]
    #[test_case(0, 10 => Some(10))]
    #[test_case(10, 0 => Some(10))]
    #[test_case(10, 10 => Some(15))]
    #[test_case(1_000, 100_000 => Some(100_500))]
    #[test_case(100_000, 1_000 => Some(100_000))]
    fn test_merge(lhs_n: u32, rhs_n: u32) -> Option<i64> {
        // lhs holds [0, lhs_n), rhs holds [lhs_n / 2, lhs_n / 2 + rhs_n)
        let mut lhs = CountDistinct::<WyHash>::new();
        for i in 0..lhs_n {
            lhs.insert(Some(i)).unwrap();
        }
        let mut rhs = CountDistinct::<WyHash>::new();
        for i in 0..rhs_n {
            rhs.insert(Some(lhs_n / 2 + i)).unwrap();
        }

        lhs.merge(&rhs).unwrap();
        lhs.finalize()
    }

    #[test]
    fn test_merge_width_mismatch() {
        let mut lhs = CountDistinct::<WyHash>::new();
        lhs.insert(Some(1u8)).unwrap();
        let mut rhs = CountDistinct::<WyHash>::new();
        rhs.insert(Some(1u16)).unwrap();
        assert_eq!(
            lhs.merge(&rhs).unwrap_err(),
            Error::WidthMismatch {
                expected: 1,
                actual: 2
            }
        );

        assert_eq!(lhs.finalize(), Some(1));
        lhs.insert(Some(2u8)).unwrap();
        assert_eq!(lhs.finalize(), Some(2));
    }

    #[derive(Clone, Default)]
    struct RecordingObserver {
        events: Arc<Mutex<Vec<(ResizeEvent, usize)>>>,
    }

    impl ResizeObserver for RecordingObserver {
        fn wants_stats(&self) -> bool {
            true
        }

        fn after_resize(&mut self, event: &ResizeEvent, stats: Option<&TableStats>) {
            let stats = stats.expect("stats requested");
            self.events.lock().unwrap().push((event.clone(), stats.buckets));
        }
    }

    #[test]
    fn test_resize_observer() {
        let observer = RecordingObserver::default();
        let mut count = CountDistinct::<WyHash>::new().with_observer(observer.clone());
        for i in 0..1_280u32 {
            count.insert(Some(i)).unwrap();
        }

        let events = observer.events.lock().unwrap();
        let summary: Vec<_> = events
            .iter()
            .map(|(e, buckets)| (e.items, e.old_buckets, e.new_buckets, *buckets))
            .collect();
        assert_eq!(
            summary,
            vec![(80, 4, 16, 16), (320, 16, 64, 64), (1_280, 64, 256, 256)]
        );
    }

    #[test]
    fn test_debug() {
        let mut count = CountDistinct::<WyHash>::new();
        assert_eq!(format!("{:?}", count), "{ empty }");
        count.insert(Some('x')).unwrap();
        assert_eq!(format!("{:?}", count), "{ value_length: 4, len: 1, buckets: 4 }");
        assert!(count.take_state().is_some());
        assert_eq!(count.finalize(), None);
    }
}
