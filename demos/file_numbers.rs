use std::{
    env::args,
    fs::File,
    io::{BufRead, BufReader},
};

use anyhow::Context;
use thread_fn_iter::{Builder, TryFnIter};

fn main() -> Result<(), anyhow::Error> {
    let file_name = args().nth(1).context("Usage: file_numbers <FILE>")?;
    for number in read_numbers(file_name) {
        println!("number: {}", number?);
    }

    Ok(())
}

fn read_numbers(file_name: String) -> TryFnIter<i32, anyhow::Error> {
    Builder::new()
        .name("file-numbers")
        .capacity(64)
        .try_fn_iter(|emitter| {
            let file = BufReader::new(File::open(file_name).context("Failed to open file")?);
            for line in file.lines() {
                let line = line.context("Failed to read line")?;
                for token in line.split_ascii_whitespace() {
                    let number: i32 = token
                        .parse()
                        .with_context(|| format!("Failed to convert string \"{token}\" to number"))?;
                    emitter.emit(number)?;
                }
            }

            Ok(())
        })
}
