use count_distinct::{accumulate, combine, finalize, CountDistinct, LogObserver, State, ValueType};

fn main() {
    let mut count1: CountDistinct = CountDistinct::new().with_observer(LogObserver::default());
    for i in 0..1_000i32 {
        count1.insert(Some(i % 300)).unwrap();
    }
    count1.insert::<i32>(None).unwrap();
    println!("count1 distinct = {:?}, buckets = {:?}", count1.finalize(), count1.bucket_count());

    // the same aggregation driven the way a host calls it, one row at a time
    let ty = ValueType::fixed(4);
    let mut state: State = None;
    for i in 250..400i32 {
        state = accumulate(state, Some(&i.to_ne_bytes()), ty).unwrap();
    }
    println!("state distinct = {:?}", finalize(state.as_ref()));

    let merged = combine(state, count1.state()).unwrap();
    println!("merged distinct = {:?}", finalize(merged.as_ref()));

    let empty: State = None;
    println!("empty distinct = {:?}", finalize(empty.as_ref()));
}
