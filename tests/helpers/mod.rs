#![allow(dead_code)]

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use aio_write_verify::pattern::fill_pattern;
use aio_write_verify::AlignedBuf;

pub fn pattern_buf(size: usize) -> AlignedBuf {
    let mut buf = AlignedBuf::with_size(size).unwrap();
    fill_pattern(buf.as_mut());
    buf
}

pub fn keyed_buf(key: u8, size: usize) -> AlignedBuf {
    let mut buf = AlignedBuf::with_size(size).unwrap();
    fill_keyed(key, buf.as_mut());
    buf
}

pub fn fill_keyed(key: u8, buffer: &mut [u8]) {
    assert_eq!(buffer.len() % 2, 0);

    for index in 0..buffer.len() / 2 {
        buffer[index * 2] = key;
        buffer[index * 2 + 1] = index as u8;
    }
}

pub fn validate_keyed(key: u8, buffer: &[u8]) -> bool {
    assert_eq!(buffer.len() % 2, 0);

    (0..buffer.len() / 2)
        .all(|index| buffer[index * 2] == key && buffer[index * 2 + 1] == index as u8)
}

pub fn read_range(path: &Path, offset: u64, len: usize) -> Vec<u8> {
    let mut file = File::open(path).unwrap();
    let mut data = vec![0u8; len];

    file.seek(SeekFrom::Start(offset)).unwrap();
    file.read_exact(&mut data).unwrap();

    data
}

pub fn dir_entries(path: &Path) -> usize {
    std::fs::read_dir(path).unwrap().count()
}
