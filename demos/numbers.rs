use thread_fn_iter::{fn_iter, FnIter};

fn build_iter() -> FnIter<i32> {
    fn_iter(|emitter| {
        for i in 0..3 {
            // hand elements to the consumer via `emitter`
            emitter.emit(i)?;
        }
        Ok(())
    })
}

pub fn main() {
    let mut numbers = Vec::new();
    for number in build_iter() {
        print!("{number} ");
        numbers.push(number);
    }
    println!();
    assert_eq!(numbers, vec![0, 1, 2]);
}
