use crate::device::{BlockDevice, DiskImage};
use log::debug;
use std::fs;
use std::io;
use std::os::linux::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use thiserror::Error;

mod ioctl {
    use nix::{ioctl_none, ioctl_read_bad};

    ioctl_read_bad!(blksszget, 0x1268, u64);
    ioctl_none!(blkrrpart, 0x12, 95);
}

const S_IFMT: u32 = 0o170_000;
const S_IFBLK: u32 = 0o60_000;

/// Block size used for regular files (disk images).
pub const DEFAULT_BLOCK_SIZE: u32 = 512;

/// An error that can happen while doing an ioctl call with a block device
#[derive(Debug, Error)]
pub enum BlockError {
    /// An error that occurs when the device could not be opened
    #[error("failed to open device: {0}")]
    Open(io::Error),
    /// An error that occurs when the metadata of the input file couldn't be retrieved
    #[error("failed to get metadata of device fd")]
    Metadata(#[from] io::Error),
    /// An error that occurs when the partition table could not be reloaded by the OS
    #[error("failed to reload partition table of device")]
    RereadTable(#[from] nix::Error),
    /// An error that occurs when the sector size could not be retrieved from the OS
    #[error("failed to get the sector size of device: {0}")]
    GetSectorSize(nix::Error),
    /// An error that occurs when an invalid return code has been received from an ioctl call
    #[error("invalid return value of ioctl ({0} != 0)")]
    InvalidReturnValue(i32),
    /// An error that occurs when the file provided is not a block device
    #[error("not a block device")]
    NotBlock,
    /// An error that occurs when the sector size reported by the OS is not usable
    #[error("invalid sector size: {0}")]
    InvalidSectorSize(u64),
}

fn is_block_device(file: &fs::File) -> Result<bool, BlockError> {
    let metadata = file.metadata().map_err(BlockError::Metadata)?;

    Ok(metadata.st_mode() & S_IFMT == S_IFBLK)
}

/// Makes an ioctl call to make the OS reread the partition table of a block device
pub fn reread_partition_table(file: &mut fs::File) -> Result<(), BlockError> {
    if !is_block_device(file)? {
        return Err(BlockError::NotBlock);
    }

    match unsafe { ioctl::blkrrpart(file.as_raw_fd()) } {
        Err(err) => Err(BlockError::RereadTable(err)),
        Ok(0) => Ok(()),
        Ok(r) => Err(BlockError::InvalidReturnValue(r)),
    }
}

/// Makes an ioctl call to obtain the sector size of a block device
pub fn get_sector_size(file: &mut fs::File) -> Result<u64, BlockError> {
    if !is_block_device(file)? {
        return Err(BlockError::NotBlock);
    }

    let mut sector_size = u64::from(DEFAULT_BLOCK_SIZE);
    match unsafe { ioctl::blksszget(file.as_raw_fd(), &mut sector_size) } {
        Err(err) => Err(BlockError::GetSectorSize(err)),
        Ok(0) => Ok(sector_size),
        Ok(r) => Err(BlockError::InvalidReturnValue(r)),
    }
}

/// A disk image or a block device opened for reading and writing.
///
/// After a table is written, the kernel is asked to reread the partition table of a block device.
/// Nothing happens for a regular file.
#[derive(Debug)]
pub struct BlockDeviceFile {
    image: DiskImage<fs::File>,
}

impl BlockDeviceFile {
    /// Gets a reference to the underlying file.
    pub fn get_ref(&self) -> &fs::File {
        self.image.get_ref()
    }
}

/// Open a block device (or a disk image) for reading and writing.
///
/// If `block_size` is not provided, the logical sector size of a block device is obtained from
/// the OS and regular files use 512-byte blocks.
pub fn open_block_device<P: AsRef<Path>>(
    path: P,
    block_size: Option<u32>,
) -> Result<BlockDeviceFile, BlockError> {
    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path.as_ref())
        .map_err(BlockError::Open)?;

    let block_size = match block_size {
        Some(x) => x,
        None => match get_sector_size(&mut file) {
            Ok(x) => {
                if x == 0 || x > u64::from(u32::max_value()) {
                    return Err(BlockError::InvalidSectorSize(x));
                }
                x as u32
            }
            Err(BlockError::NotBlock) => DEFAULT_BLOCK_SIZE,
            Err(err) => return Err(err),
        },
    };
    debug!(
        "opened {} with a block size of {} bytes",
        path.as_ref().display(),
        block_size
    );

    Ok(BlockDeviceFile {
        image: DiskImage::new(file, block_size).map_err(BlockError::Open)?,
    })
}

impl BlockDevice for BlockDeviceFile {
    fn block_size(&self) -> u32 {
        self.image.block_size()
    }

    fn block_count(&self) -> u64 {
        self.image.block_count()
    }

    fn read(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> io::Result<u32> {
        self.image.read(lba, count, buf)
    }

    fn write(&mut self, lba: u64, count: u32, buf: &[u8]) -> io::Result<u32> {
        self.image.write(lba, count, buf)
    }

    fn notify_table_changed(&mut self) -> io::Result<()> {
        match reread_partition_table(self.image.get_mut()) {
            Ok(()) => {
                debug!("partition table reloaded by the OS");
                Ok(())
            }
            Err(BlockError::NotBlock) => Ok(()),
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
        }
    }
}
