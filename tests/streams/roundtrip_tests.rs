/*!
 * Stream Round-Trip Tests
 */

use handle_pool::{PoolConfig, PooledFs};
use pretty_assertions::assert_eq;
use std::io::{Read, Write};
use tempfile::TempDir;

const TEXT_1: &str = "{ skiddoo : 23, meaningful : true,\nmeaning: '42', \nthing: 51 }";

fn fixture() -> (TempDir, PooledFs) {
    (TempDir::new().unwrap(), PooledFs::new(PoolConfig::default()))
}

#[test]
fn test_content_correct() {
    let (dir, fs) = fixture();
    let path = dir.path().join("text.json");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(TEXT_1.as_bytes()).unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    let mut content = String::new();
    reader.read_to_string(&mut content).unwrap();
    assert_eq!(content, TEXT_1);
}

#[test]
fn test_eleven_byte_scenario() {
    let (dir, fs) = fixture();
    let path = dir.path().join("a.txt");
    let bytes = b"{ skiddoo }";
    assert_eq!(bytes.len(), 11);

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(bytes).unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    assert_eq!(reader.available().unwrap(), 11);

    let mut read_back = Vec::new();
    reader.read_to_end(&mut read_back).unwrap();
    assert_eq!(read_back, bytes);
    assert_eq!(reader.available().unwrap(), 0);
}

#[test]
fn test_single_byte_reads() {
    let (dir, fs) = fixture();
    let path = dir.path().join("bytes.bin");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(&[0x01, 0x02, 0x03]).unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    let mut one = [0u8; 1];
    for expected in [0x01u8, 0x02, 0x03] {
        assert_eq!(reader.read(&mut one).unwrap(), 1);
        assert_eq!(one[0], expected);
    }
    assert_eq!(reader.read(&mut one).unwrap(), 0);
}

#[test]
fn test_mark_and_reset() {
    let (dir, fs) = fixture();
    let path = dir.path().join("marked.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"0123456789").unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"0123");

    reader.mark().unwrap();
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"4567");

    reader.reset().unwrap();
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"4567");
}

#[test]
fn test_reset_without_mark_fails() {
    let (dir, fs) = fixture();
    let path = dir.path().join("unmarked.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"data").unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    assert!(reader.reset().is_err());
}

#[test]
fn test_skip() {
    let (dir, fs) = fixture();
    let path = dir.path().join("skipped.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"0123456789").unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    assert_eq!(reader.skip(4).unwrap(), 4);

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b"456789");

    // Skipping past end of file moves the cursor; reads then return 0
    assert_eq!(reader.skip(100).unwrap(), 100);
    let mut buf = [0u8; 1];
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_rewrite_truncates_previous_content() {
    let (dir, fs) = fixture();
    let path = dir.path().join("rewritten.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"a much longer first version").unwrap();
    writer.close().unwrap();

    // The second writer reuses the pooled write-mode handle; stale tail
    // bytes from the longer first version must not survive.
    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"short").unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    let mut content = Vec::new();
    reader.read_to_end(&mut content).unwrap();
    assert_eq!(content, b"short");
}

#[test]
fn test_flush_forces_to_disk() {
    let (dir, fs) = fixture();
    let path = dir.path().join("flushed.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"durable").unwrap();
    writer.flush().unwrap();

    // Visible to a plain read while the writer is still open
    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk, b"durable");
    writer.close().unwrap();
}

#[test]
fn test_sequential_streams_share_pooled_handle() {
    let (dir, fs) = fixture();
    let path = dir.path().join("pooled.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"pooled bytes").unwrap();
    writer.close().unwrap();

    // Several sequential readers; the pool should hold one read handle
    for _ in 0..3 {
        let mut reader = fs.open_for_read(&path).unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"pooled bytes");
    }
    assert_eq!(
        fs.pool()
            .lease_count(&path, handle_pool::AccessFlags::read_only()),
        0
    );
    assert!(fs
        .pool()
        .contains(&path, handle_pool::AccessFlags::read_only()));
}

#[test]
fn test_close_is_idempotent() {
    let (dir, fs) = fixture();
    let path = dir.path().join("closed.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"x").unwrap();
    writer.close().unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    reader.close().unwrap();
    reader.close().unwrap();
}

#[test]
fn test_reads_after_close_fail() {
    let (dir, fs) = fixture();
    let path = dir.path().join("dead.txt");

    let mut writer = fs.open_for_write(&path).unwrap();
    writer.write_all(b"data").unwrap();
    writer.close().unwrap();

    let mut reader = fs.open_for_read(&path).unwrap();
    reader.close().unwrap();
    let mut buf = [0u8; 4];
    assert!(reader.read(&mut buf).is_err());
}
