use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::scan::Scanner;
use crate::hash::HASH_SIZE;
use crate::Error;

/// Async variant of [super::find_and_hash], reading from an [AsyncRead].
pub async fn find_and_hash_async<R: AsyncRead + Unpin>(
    mut r: R,
    id: &[u8],
    buf_size: usize,
) -> Result<(Vec<u64>, [u8; HASH_SIZE]), Error> {
    let mut scanner = Scanner::new(id, buf_size)?;

    loop {
        let n = read_full(&mut r, scanner.read_buf()).await?;
        if scanner.advance(n) {
            break;
        }
    }

    Ok(scanner.finish())
}

async fn read_full<R: AsyncRead + Unpin>(r: &mut R, buf: &mut [u8]) -> Result<usize, Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Read(e)),
        }
    }
    Ok(filled)
}
