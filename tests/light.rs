use std::fs::OpenOptions;
use std::io;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tempfile::tempdir;
use tokio::time::sleep;

use aio_write_verify::{
    aio_context, AioFile, AioOpenMode, AioOpenOptionsExt, AlignedBuf, SubmitError, WriteFlags,
};

mod helpers;

use helpers::{keyed_buf, pattern_buf, read_range, validate_keyed};

const FILE_SIZE: u64 = 1024 * 512;
const BUF_CAPACITY: usize = 8192;

#[tokio::test]
async fn aio_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    let (aio, aio_handle) = aio_context(10).unwrap();
    let file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();

    let buffer = AlignedBuf::with_size(BUF_CAPACITY).unwrap();

    aio.close().await;

    assert_matches!(
        file.write_at(&aio_handle, 0, &buffer, WriteFlags::empty())
            .await
            .err()
            .unwrap(),
        SubmitError::Stopped
    );
    assert_eq!(None, aio_handle.available_slots());

    dir.close().unwrap();
}

#[tokio::test]
async fn file_create_and_set_len() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");
    std::fs::write(&path, vec![1u8; 100_000]).unwrap();

    let mut file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();
    assert_eq!(0, file.metadata().await.unwrap().len());

    file.set_len(FILE_SIZE).await.unwrap();
    assert_eq!(FILE_SIZE, file.metadata().await.unwrap().len());

    let (_aio, aio_handle) = aio_context(10).unwrap();
    let buffer = pattern_buf(BUF_CAPACITY);

    assert_eq!(
        BUF_CAPACITY as u64,
        file.write_at(&aio_handle, 0, &buffer, WriteFlags::empty())
            .await
            .unwrap()
    );

    // pre-sized region past the write reads as zeroes
    assert!(read_range(&path, BUF_CAPACITY as u64, BUF_CAPACITY)
        .iter()
        .all(|b| *b == 0));

    dir.close().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn write_block_mt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    {
        let mut file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();
        file.set_len(FILE_SIZE).await.unwrap();
        let file = Arc::new(file);

        let buffer = keyed_buf(65u8, BUF_CAPACITY);

        let (_aio, aio_handle) = aio_context(10).unwrap();

        file.write_at(&aio_handle, 16384, &buffer, WriteFlags::DSYNC)
            .await
            .unwrap();
    }

    assert!(validate_keyed(65u8, &read_range(&path, 16384, BUF_CAPACITY)));

    dir.close().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn write_blocks_at_offsets_mt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    {
        let mut open_options = OpenOptions::new();
        open_options.write(true).create_new(true);

        let file = open_options
            .aio_open(path.clone(), AioOpenMode::default())
            .await
            .unwrap();

        let (aio, aio_handle) = aio_context(2).unwrap();

        for (key, offset) in &[(65u8, 16384u64), (66, 32768), (67, 49152)] {
            let buffer = keyed_buf(*key, BUF_CAPACITY);
            file.write_at(&aio_handle, *offset, &buffer, WriteFlags::DSYNC)
                .await
                .unwrap();
        }

        assert_eq!(2, aio.available_slots());
    }

    assert!(validate_keyed(65, &read_range(&path, 16384, BUF_CAPACITY)));
    assert!(validate_keyed(66, &read_range(&path, 32768, BUF_CAPACITY)));
    assert!(validate_keyed(67, &read_range(&path, 49152, BUF_CAPACITY)));

    dir.close().unwrap();
}

#[tokio::test]
async fn concurrent_writes_share_buffer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");
    let chunks = 16u64;

    let mut file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();
    file.set_len(chunks * BUF_CAPACITY as u64).await.unwrap();

    let (aio, aio_handle) = aio_context(chunks as usize).unwrap();
    let buffer = pattern_buf(BUF_CAPACITY);

    let writes: FuturesUnordered<_> = (0..chunks)
        .map(|index| {
            file.write_at(
                &aio_handle,
                index * BUF_CAPACITY as u64,
                &buffer,
                WriteFlags::empty(),
            )
        })
        .collect();

    let results: Vec<_> = writes.collect().await;
    assert!(results
        .into_iter()
        .all(|res| res.unwrap() == BUF_CAPACITY as u64));

    assert_eq!(chunks as usize, aio.available_slots());
    mem::drop(file);

    for index in 0..chunks {
        assert_eq!(
            buffer.as_ref(),
            &read_range(&path, index * BUF_CAPACITY as u64, BUF_CAPACITY)[..]
        );
    }

    dir.close().unwrap();
}

#[tokio::test]
async fn bad_descriptor() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");
    std::fs::write(&path, b"read only").unwrap();

    let read_only = std::fs::File::open(&path).unwrap();
    let buffer = AlignedBuf::with_size(BUF_CAPACITY).unwrap();

    let (aio, aio_handle) = aio_context(4).unwrap();

    let res = aio_handle
        .submit(
            &read_only,
            aio_write_verify::WriteCommand {
                offset: 0,
                buffer: &buffer,
                flags: WriteFlags::empty(),
            },
        )
        .await;

    assert!(res.is_err());
    assert_eq!(4, aio.available_slots());

    dir.close().unwrap();
}

#[tokio::test]
async fn future_cancellation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    let mut file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();
    file.set_len(BUF_CAPACITY as u64).await.unwrap();

    let num_slots = 10;
    let (aio, aio_handle) = aio_context(num_slots).unwrap();

    {
        let buffer = pattern_buf(BUF_CAPACITY);
        let mut write = Box::pin(file.write_at(&aio_handle, 0, &buffer, WriteFlags::empty()));

        // first poll submits; the completion can't have been reaped yet
        assert!(futures::poll!(&mut write).is_pending());
        assert_eq!(num_slots - 1, aio.available_slots());

        mem::drop(write);
        mem::drop(buffer);
    }

    while aio.available_slots() != num_slots {
        sleep(Duration::from_millis(10)).await;
    }

    mem::drop(file);
    assert_eq!(
        pattern_buf(BUF_CAPACITY).as_ref(),
        &read_range(&path, 0, BUF_CAPACITY)[..]
    );

    aio.close().await;
    dir.close().unwrap();
}

#[tokio::test]
async fn started_write_outlives_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    let num_slots = 4;
    let (aio, aio_handle) = aio_context(num_slots).unwrap();

    let completion = {
        let file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();
        let buffer = pattern_buf(BUF_CAPACITY);

        file.start_write_at(&aio_handle, BUF_CAPACITY as u64, &buffer, WriteFlags::empty())
            .await
            .unwrap()
    };

    // accepted by the kernel; the slot is held until the result is consumed
    assert_eq!(num_slots - 1, aio.available_slots());

    let written = tokio::spawn(completion).await.unwrap().unwrap();
    assert_eq!(BUF_CAPACITY as u64, written);
    assert_eq!(num_slots, aio.available_slots());

    assert_eq!(
        pattern_buf(BUF_CAPACITY).as_ref(),
        &read_range(&path, BUF_CAPACITY as u64, BUF_CAPACITY)[..]
    );

    aio.close().await;
    dir.close().unwrap();
}

#[tokio::test]
async fn writes_refused_while_closing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    let (aio, aio_handle) = aio_context(2).unwrap();
    let file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();
    let buffer = pattern_buf(BUF_CAPACITY);

    let in_flight = file
        .start_write_at(&aio_handle, 0, &buffer, WriteFlags::empty())
        .await
        .unwrap();

    // close can't finish while a write holds a slot
    let closing = tokio::spawn(aio.close());
    sleep(Duration::from_millis(20)).await;
    assert!(!closing.is_finished());

    assert_matches!(
        file.start_write_at(&aio_handle, 0, &buffer, WriteFlags::empty())
            .await
            .err()
            .unwrap(),
        SubmitError::Stopped
    );

    assert_eq!(BUF_CAPACITY as u64, in_flight.await.unwrap());

    tokio::time::timeout(Duration::from_secs(5), closing)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(None, aio_handle.available_slots());

    dir.close().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn write_many_blocks_mt() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    let mut file = AioFile::create(&path, AioOpenMode::default()).await.unwrap();
    file.set_len(FILE_SIZE).await.unwrap();
    let file = Arc::new(file);

    let num_slots = 7;
    let (aio, aio_handle) = aio_context(num_slots).unwrap();

    // 20 waves of requests well above the slot limit
    for wave in 0u64..20 {
        let f = FuturesUnordered::new();

        // Each wave makes 64 requests
        for index in 0u64..64 {
            let file = file.clone();
            let aio_handle = aio_handle.clone();

            f.push(tokio::spawn(async move {
                let offset = (index * BUF_CAPACITY as u64) % FILE_SIZE;
                let buffer = keyed_buf(wave as u8, BUF_CAPACITY);

                file.write_at(&aio_handle, offset, &buffer, WriteFlags::empty())
                    .await
                    .unwrap();
            }));
        }

        for res in f.collect::<Vec<_>>().await {
            res.unwrap();
        }

        // all slots have been returned
        assert_eq!(num_slots, aio.available_slots());
    }

    for offset in (0..FILE_SIZE).step_by(BUF_CAPACITY) {
        assert!(validate_keyed(19, &read_range(&path, offset, BUF_CAPACITY)));
    }

    dir.close().unwrap();
}

#[tokio::test]
async fn direct_io_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tmp");

    let mode = AioOpenMode {
        direct: true,
        sync: false,
    };

    let mut file = match AioFile::create(&path, mode).await {
        Ok(file) => file,
        // tmpfs and some overlay setups reject O_DIRECT
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => return,
        Err(e) => panic!("open failed: {}", e),
    };
    file.set_len(4 * 4096).await.unwrap();

    let (aio, aio_handle) = aio_context(4).unwrap();
    let buffer = pattern_buf(4096);

    for index in 0..4u64 {
        match file
            .write_at(&aio_handle, index * 4096, &buffer, WriteFlags::empty())
            .await
        {
            Ok(written) => assert_eq!(4096, written),
            Err(SubmitError::BadResult(e)) if e.raw_os_error() == Some(libc::EINVAL) => return,
            Err(e) => panic!("write failed: {}", e),
        }
    }

    mem::drop(file);
    assert_eq!(buffer.as_ref(), &read_range(&path, 3 * 4096, 4096)[..]);

    aio.close().await;
    dir.close().unwrap();
}
