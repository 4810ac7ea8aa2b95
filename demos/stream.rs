use std::{thread, time::Duration};

use futures_util::StreamExt;
use thread_fn_iter::{fn_iter, FnIter};

fn slow_numbers() -> FnIter<u64> {
    fn_iter(|emitter| {
        for i in 0..5 {
            // blocking work stays on the generator thread, off the async runtime
            thread::sleep(Duration::from_millis(50));
            emitter.emit(i)?;
        }
        Ok(())
    })
}

#[tokio::main]
async fn main() {
    let mut stream = slow_numbers();
    let mut numbers = Vec::new();
    while let Some(number) = StreamExt::next(&mut stream).await {
        print!("{number} ");
        numbers.push(number);
    }
    println!();
    assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
}
