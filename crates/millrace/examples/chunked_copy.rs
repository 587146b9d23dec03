//! Copy a file through the pool in fixed-size blocks.
//!
//! Usage: cargo run --example chunked_copy -- <src> <dst>

use millrace::{block_on, AsyncFile, ExecutorPool, OpenMode, Result};
use std::env;

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let (src, dst) = match (args.next(), args.next()) {
        (Some(src), Some(dst)) => (src, dst),
        _ => {
            eprintln!("usage: chunked_copy <src> <dst>");
            std::process::exit(2);
        }
    };

    // Writes append, so start the destination from scratch.
    let _ = std::fs::remove_file(&dst);

    let pool = ExecutorPool::default();
    pool.start();

    let mut input = AsyncFile::open(&src, pool.get_executor(), OpenMode::Read)?;
    let mut output = AsyncFile::open(&dst, pool.get_executor(), OpenMode::Append)?;

    let mut buf = vec![0u8; 64 * 1024];
    let mut copied = 0u64;
    while !input.eof() {
        let n = block_on(input.read(&mut buf))?;
        block_on(output.write(&buf[..n]))?;
        copied += n as u64;
    }

    input.close()?;
    output.close()?;

    pool.stop();
    pool.join();

    println!("copied {} bytes from {} to {}", copied, src, dst);
    Ok(())
}
