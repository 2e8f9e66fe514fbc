//! The block I/O collaborator.

use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

/// A device exposing fixed-size logical blocks.
///
/// `read` and `write` return the number of blocks actually transferred; the engine treats a short
/// transfer as an error.
pub trait BlockDevice {
    /// Size (in bytes) of a logical block.
    fn block_size(&self) -> u32;

    /// Total number of logical blocks.
    fn block_count(&self) -> u64;

    /// Read `count` blocks starting at `lba` into `buf`.
    fn read(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> io::Result<u32>;

    /// Write `count` blocks from `buf` starting at `lba`.
    fn write(&mut self, lba: u64, count: u32, buf: &[u8]) -> io::Result<u32>;

    /// Invalidate any cached view of the partition table held above this device.
    fn notify_table_changed(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn block_size(&self) -> u32 {
        (**self).block_size()
    }

    fn block_count(&self) -> u64 {
        (**self).block_count()
    }

    fn read(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> io::Result<u32> {
        (**self).read(lba, count, buf)
    }

    fn write(&mut self, lba: u64, count: u32, buf: &[u8]) -> io::Result<u32> {
        (**self).write(lba, count, buf)
    }

    fn notify_table_changed(&mut self) -> io::Result<()> {
        (**self).notify_table_changed()
    }
}

/// Read exactly `count` blocks starting at `lba`.
pub(crate) fn read_blocks<D: BlockDevice + ?Sized>(
    device: &mut D,
    lba: u64,
    count: u32,
) -> io::Result<Vec<u8>> {
    let mut buf = vec![0; count as usize * device.block_size() as usize];
    let read = device.read(lba, count, &mut buf)?;
    if read != count {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "short read at LBA {}: {} of {} blocks",
                lba, read, count
            ),
        ));
    }

    Ok(buf)
}

/// Write `buf`, which must be a whole number of blocks, starting at `lba`.
pub(crate) fn write_blocks<D: BlockDevice + ?Sized>(
    device: &mut D,
    lba: u64,
    buf: &[u8],
) -> io::Result<()> {
    let count = (buf.len() / device.block_size() as usize) as u32;
    let written = device.write(lba, count, buf)?;
    if written != count {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!(
                "short write at LBA {}: {} of {} blocks",
                lba, written, count
            ),
        ));
    }

    Ok(())
}

/// A block device backed by anything that can be read, written and seeked: a disk image, a raw
/// block device opened as a file or an in-memory buffer.
///
/// # Examples
///
/// Basic usage:
/// ```
/// use gptcore::BlockDevice;
///
/// let data = vec![0; 100 * 512];
/// let disk = gptcore::DiskImage::new(std::io::Cursor::new(data), 512)
///     .expect("could not open disk image");
///
/// assert_eq!(disk.block_count(), 100);
/// ```
#[derive(Debug)]
pub struct DiskImage<T> {
    inner: T,
    block_size: u32,
    block_count: u64,
}

impl<T> DiskImage<T>
where
    T: Read + Write + Seek,
{
    /// Wrap `inner`, using logical blocks of `block_size` bytes. The number of blocks is taken
    /// from the current length of `inner`; a trailing partial block is not addressable.
    pub fn new(mut inner: T, block_size: u32) -> io::Result<DiskImage<T>> {
        if block_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "block size must be greater than 0",
            ));
        }

        let len = inner.seek(SeekFrom::End(0))?;

        Ok(DiskImage {
            inner,
            block_size,
            block_count: len / u64::from(block_size),
        })
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwraps this `DiskImage`, returning the underlying stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn seek_to(&mut self, lba: u64, count: u32, len: usize) -> io::Result<usize> {
        let bytes = count as usize * self.block_size as usize;
        if len < bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("buffer of {} bytes cannot hold {} blocks", len, count),
            ));
        }
        if lba
            .checked_add(u64::from(count))
            .map_or(true, |end| end > self.block_count)
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "blocks {}..{} are out of range (device has {} blocks)",
                    lba,
                    lba.saturating_add(u64::from(count)),
                    self.block_count
                ),
            ));
        }

        self.inner
            .seek(SeekFrom::Start(lba * u64::from(self.block_size)))?;

        Ok(bytes)
    }
}

impl<T> BlockDevice for DiskImage<T>
where
    T: Read + Write + Seek,
{
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> io::Result<u32> {
        let bytes = self.seek_to(lba, count, buf.len())?;
        self.inner.read_exact(&mut buf[..bytes])?;

        Ok(count)
    }

    fn write(&mut self, lba: u64, count: u32, buf: &[u8]) -> io::Result<u32> {
        let bytes = self.seek_to(lba, count, buf.len())?;
        self.inner.write_all(&buf[..bytes])?;
        self.inner.flush()?;

        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::BlockDevice;
    use std::collections::HashMap;
    use std::io;

    /// A sparse in-memory device: only blocks that have been written take memory.
    #[derive(Debug, Clone)]
    pub(crate) struct SparseDisk {
        pub block_size: u32,
        pub block_count: u64,
        blocks: HashMap<u64, Vec<u8>>,
        /// Number of successful `write` calls.
        pub writes: usize,
        /// Number of `notify_table_changed` calls.
        pub notifications: usize,
        /// Make the write call with this index (0-based) fail.
        pub fail_write: Option<usize>,
        /// Make every write return one block less than requested.
        pub short_writes: bool,
    }

    impl SparseDisk {
        pub(crate) fn new(block_size: u32, block_count: u64) -> SparseDisk {
            SparseDisk {
                block_size,
                block_count,
                blocks: HashMap::new(),
                writes: 0,
                notifications: 0,
                fail_write: None,
                short_writes: false,
            }
        }

        pub(crate) fn block(&self, lba: u64) -> Vec<u8> {
            self.blocks
                .get(&lba)
                .cloned()
                .unwrap_or_else(|| vec![0; self.block_size as usize])
        }

        pub(crate) fn set_block(&mut self, lba: u64, data: &[u8]) {
            let mut block = vec![0; self.block_size as usize];
            block[..data.len()].copy_from_slice(data);
            self.blocks.insert(lba, block);
        }

        /// Flip one byte at `offset` within block `lba`.
        pub(crate) fn corrupt(&mut self, lba: u64, offset: usize) {
            let mut block = self.block(lba);
            block[offset] ^= 0xff;
            self.blocks.insert(lba, block);
        }
    }

    impl BlockDevice for SparseDisk {
        fn block_size(&self) -> u32 {
            self.block_size
        }

        fn block_count(&self) -> u64 {
            self.block_count
        }

        fn read(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> io::Result<u32> {
            let bs = self.block_size as usize;
            for i in 0..count as usize {
                let block = self.block(lba + i as u64);
                buf[i * bs..(i + 1) * bs].copy_from_slice(&block);
            }

            Ok(count)
        }

        fn write(&mut self, lba: u64, count: u32, buf: &[u8]) -> io::Result<u32> {
            if self.fail_write == Some(self.writes) {
                return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
            }
            let count = if self.short_writes { count - 1 } else { count };
            let bs = self.block_size as usize;
            for i in 0..count as usize {
                self.blocks
                    .insert(lba + i as u64, buf[i * bs..(i + 1) * bs].to_vec());
            }
            self.writes += 1;

            Ok(count)
        }

        fn notify_table_changed(&mut self) -> io::Result<()> {
            self.notifications += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disk_image_geometry() {
        fn test(ss: u32) {
            let data = vec![0; ss as usize * 100 + 7];
            let disk = DiskImage::new(io::Cursor::new(data), ss).unwrap();
            assert_eq!(disk.block_size(), ss);
            assert_eq!(disk.block_count(), 100);
        }

        test(512);
        test(4096);
        assert!(DiskImage::new(io::Cursor::new(vec![0; 512]), 0).is_err());
    }

    #[test]
    fn disk_image_read_write() {
        let mut disk = DiskImage::new(io::Cursor::new(vec![0; 512 * 10]), 512).unwrap();

        let data = vec![0x42; 1024];
        assert_eq!(disk.write(3, 2, &data).unwrap(), 2);
        assert_eq!(read_blocks(&mut disk, 3, 2).unwrap(), data);
        assert_eq!(read_blocks(&mut disk, 5, 1).unwrap(), vec![0; 512]);

        let inner = disk.into_inner().into_inner();
        assert!(inner[3 * 512..5 * 512].iter().all(|x| *x == 0x42));
    }

    #[test]
    fn disk_image_out_of_range() {
        let mut disk = DiskImage::new(io::Cursor::new(vec![0; 512 * 10]), 512).unwrap();

        assert!(read_blocks(&mut disk, 9, 2).is_err());
        assert!(read_blocks(&mut disk, u64::max_value(), 1).is_err());
        assert!(disk.write(10, 1, &[0; 512]).is_err());
        assert!(disk.write(0, 2, &[0; 512]).is_err());
    }

    #[test]
    fn short_write_is_an_error() {
        let mut disk = testing::SparseDisk::new(512, 10);
        disk.short_writes = true;

        let err = write_blocks(&mut disk, 0, &[0; 1024]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }
}
