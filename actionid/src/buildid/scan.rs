use bstr::Finder;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};
use tracing::trace;

use crate::hash::HASH_SIZE;
use crate::Error;

/// Number of bytes read per iteration if no size is specified.
/// Together with the lookback region, it still fits in 32 KiB.
pub const DEFAULT_BUF_SIZE: usize = 31 * 1024;

/// The lookback region in front of each read is a multiple of this.
const LOOKBACK_ALIGN: usize = 128;

/// State shared by [find_and_hash] and its async variant.
///
/// Data is read into `buf[tiny..]`. `buf[start..tiny]` holds bytes left over
/// from the previous read that have not been hashed yet, so an id split
/// across two reads is still found. `offset` is the stream offset
/// corresponding to `buf[tiny]`.
pub(crate) struct Scanner<'a> {
    finder: Finder<'a>,
    zeros: Vec<u8>,
    buf_size: usize,
    tiny: usize,
    buf: Vec<u8>,
    start: usize,
    offset: u64,
    matches: Vec<u64>,
    hasher: Sha256,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(id: &'a [u8], buf_size: usize) -> Result<Self, Error> {
        let buf_size = if buf_size == 0 {
            DEFAULT_BUF_SIZE
        } else {
            buf_size
        };
        if id.is_empty() {
            return Err(Error::InvalidArgument("no id specified"));
        }
        if id.len() > buf_size {
            return Err(Error::InvalidArgument("buffer too small"));
        }

        let tiny = id.len().next_multiple_of(LOOKBACK_ALIGN);

        Ok(Self {
            finder: Finder::new(id),
            zeros: vec![0; id.len()],
            buf_size,
            tiny,
            buf: vec![0; tiny + buf_size],
            start: tiny,
            offset: 0,
            matches: Vec::new(),
            hasher: Sha256::new(),
        })
    }

    /// The region the next read needs to fill.
    pub(crate) fn read_buf(&mut self) -> &mut [u8] {
        &mut self.buf[self.tiny..]
    }

    /// Processes `n` freshly read bytes. Returns true once the end of the
    /// stream was reached, which is the case if the read came up short.
    pub(crate) fn advance(&mut self, n: usize) -> bool {
        let id_len = self.zeros.len();
        let end = self.tiny + n;

        while let Some(i) = self.finder.find(&self.buf[self.start..end]) {
            let pos = self.offset + (self.start + i) as u64 - self.tiny as u64;
            trace!(offset = pos, "found id");
            self.matches.push(pos);

            self.hasher.update(&self.buf[self.start..self.start + i]);
            self.hasher.update(&self.zeros);
            self.start += i + id_len;
        }

        if n < self.buf_size {
            self.hasher.update(&self.buf[self.start..end]);
            return true;
        }

        // Hash everything but the final tiny bytes, which might contain the
        // beginning of an id. start may already point past that boundary, if
        // an id ended in the fringe.
        if self.start < self.buf_size {
            self.hasher.update(&self.buf[self.start..self.buf_size]);
            self.start = self.buf_size;
        }

        // Slide the fringe to the beginning of the buffer.
        self.buf.copy_within(self.buf_size.., 0);
        self.start -= self.buf_size;
        self.offset += self.buf_size as u64;

        false
    }

    pub(crate) fn finish(self) -> (Vec<u64>, [u8; HASH_SIZE]) {
        (self.matches, self.hasher.finalize().into())
    }
}

/// Reads all of `r` and returns the offsets of all occurrences of `id`.
///
/// While reading, it also computes the sha256 digest of the content of `r`,
/// but with each occurrence of `id` replaced by zero bytes. This allows
/// hashing a file that embeds its own build ID.
///
/// `r` is read `buf_size` bytes at a time. A `buf_size` of 0 selects
/// [DEFAULT_BUF_SIZE]. `id` must not be empty, and not be longer than
/// `buf_size`.
pub fn find_and_hash<R: Read>(
    mut r: R,
    id: &[u8],
    buf_size: usize,
) -> Result<(Vec<u64>, [u8; HASH_SIZE]), Error> {
    let mut scanner = Scanner::new(id, buf_size)?;

    loop {
        let n = read_full(&mut r, scanner.read_buf())?;
        if scanner.advance(n) {
            break;
        }
    }

    Ok(scanner.finish())
}

/// Reads from `r` until `buf` is full or the stream ends, returning the
/// number of bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Read(e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
        Sha256::digest(data).into()
    }

    /// Returns `data` with all occurrences of `id` zeroed out.
    fn zeroed(data: &[u8], id: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        let mut i = 0;
        while i + id.len() <= out.len() {
            if &out[i..i + id.len()] == id {
                out[i..i + id.len()].fill(0);
                i += id.len();
            } else {
                i += 1;
            }
        }
        out
    }

    /// Hands out at most `chunk` bytes per read call.
    struct ChunkedReader<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for ChunkedReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[rstest]
    #[case::chunk_5(5)]
    #[case::chunk_8(8)]
    #[case::chunk_13(13)]
    #[case::default(0)]
    fn two_occurrences(#[case] buf_size: usize) {
        let (matches, digest) =
            find_and_hash(Cursor::new(b"aaaID123bbbID123ccc"), b"ID123", buf_size)
                .expect("must succeed");

        assert_eq!(vec![3, 11], matches);
        assert_eq!(sha256(b"aaa\0\0\0\0\0bbb\0\0\0\0\0ccc"), digest);
    }

    #[test]
    fn no_occurrence() {
        let (matches, digest) =
            find_and_hash(Cursor::new(b"hello world"), b"ID123", 0).expect("must succeed");

        assert!(matches.is_empty());
        assert_eq!(sha256(b"hello world"), digest);
    }

    #[test]
    fn empty_stream() {
        let (matches, digest) = find_and_hash(Cursor::new(b""), b"ID", 0).expect("must succeed");

        assert!(matches.is_empty());
        assert_eq!(sha256(b""), digest);
    }

    #[test]
    fn id_is_whole_stream() {
        let (matches, digest) =
            find_and_hash(Cursor::new(b"ID123"), b"ID123", 5).expect("must succeed");

        assert_eq!(vec![0], matches);
        assert_eq!(sha256(&[0; 5]), digest);
    }

    #[test]
    fn adjacent_occurrences() {
        let (matches, digest) =
            find_and_hash(Cursor::new(b"abababx"), b"ab", 2).expect("must succeed");

        assert_eq!(vec![0, 2, 4], matches);
        assert_eq!(sha256(b"\0\0\0\0\0\0x"), digest);
    }

    #[test]
    fn empty_id() {
        assert!(matches!(
            find_and_hash(Cursor::new(b"abc"), b"", 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn id_longer_than_buffer() {
        assert!(matches!(
            find_and_hash(Cursor::new(b"aaaID123"), b"ID123", 4),
            Err(Error::InvalidArgument("buffer too small"))
        ));
    }

    #[test]
    fn read_error_propagates() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::BrokenPipe, "broken"))
            }
        }

        assert!(matches!(
            find_and_hash(Failing, b"ID", 0),
            Err(Error::Read(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
    }

    /// Places the id at every position around read boundaries, and reads
    /// in small chunks, so that ids are split across reads in every way.
    #[rstest]
    #[case::buf_7(7, 1)]
    #[case::buf_7_chunk_3(7, 3)]
    #[case::buf_16(16, 5)]
    #[case::buf_130(130, 64)]
    fn split_across_reads(#[case] buf_size: usize, #[case] chunk: usize) {
        let id = b"\x00buildid\xff";
        for pos in 0..(3 * buf_size) {
            let mut data = vec![b'.'; 4 * buf_size + 2 * id.len()];
            data[pos..pos + id.len()].copy_from_slice(id);
            let tail = data.len() - id.len();
            data[tail..].copy_from_slice(id);

            let r = ChunkedReader {
                data: &data,
                chunk,
            };
            let (matches, digest) = find_and_hash(r, id, buf_size.max(id.len()))
                .expect("must succeed");

            assert_eq!(vec![pos as u64, tail as u64], matches, "pos {}", pos);
            assert_eq!(sha256(&zeroed(&data, id)), digest, "pos {}", pos);
        }
    }

    #[test]
    fn large_stream() {
        let id = b"go-build-id-0123456789";
        let mut data = Vec::new();
        let mut expected = Vec::new();
        for i in 0..2000u32 {
            data.extend_from_slice(format!("chunk {} ", i).as_bytes());
            if i % 97 == 0 {
                expected.push(data.len() as u64);
                data.extend_from_slice(id);
            }
        }

        let (matches, digest) =
            find_and_hash(Cursor::new(&data), id, 1000).expect("must succeed");

        assert_eq!(expected, matches);
        assert_eq!(sha256(&zeroed(&data, id)), digest);
    }
}
