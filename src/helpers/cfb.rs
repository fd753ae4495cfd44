//! OLE Compound File Binary (CFB) reader.
//! Legacy `.xls` workbooks keep their BIFF8 record stream inside a compound file; this
//! reader only resolves named streams, it never writes.

use crate::error::LabelError;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use thiserror::Error;

/// Largest regular sector id; everything above is a chain marker (free, end of chain, ...).
const MAX_REG_SECT: usize = 0xFFFFFFFA;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;
/// Streams shorter than this live in the mini stream.
const MINI_STREAM_CUTOFF: usize = 4096;

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid compound file structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("Broken sector chain at sector '{0}'")]
    SectorChainError(usize),

    #[error("Empty root directory")]
    RootDirectoryError,
}

/// In-memory view of a compound file: directory entries plus both allocation tables.
pub(crate) struct Cfb {
    directories: HashMap<String, Directory>,
    fat: Vec<usize>,
    sectors: Sectors,
    mini_fat: Vec<usize>,
    mini_sectors: Sectors,
}

impl Cfb {
    /// Parses a whole compound file held in memory.
    pub(crate) fn new(data: Vec<u8>) -> Result<Cfb, LabelError> {
        if data.len() < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        let header = Header::new(&data[..HEADER_SIZE])?;
        let sectors = Sectors { size: header.sector_size()?, data };
        let fat = load_fat(&sectors, &header)?;
        let directories = load_directories(&fat, &sectors, header.directory_start)?;
        let mini_fat = if header.mini_fat_count > 0 {
            to_usize_iter(&read_chain(&fat, &sectors, header.mini_fat_start)?).collect()
        } else {
            Vec::new()
        };
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => {
                let mut data = read_chain(&fat, &sectors, root.start)?;
                data.truncate(root.size);
                Sectors { data, size: MINI_SECTOR_SIZE }
            }
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE },
        };

        Ok(Cfb {
            directories,
            fat,
            sectors,
            mini_fat,
            mini_sectors,
        })
    }

    /// True if a stream with this name exists anywhere in the directory.
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Returns the bytes of a named stream, or `None` if it is absent.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, LabelError> {
        let Some(directory) = self.directories.get(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.size < MINI_STREAM_CUTOFF {
            read_chain(&self.mini_fat, &self.mini_sectors, directory.start)?
        } else {
            read_chain(&self.fat, &self.sectors, directory.start)?
        };
        bytes.truncate(directory.size);
        Ok(Some(bytes))
    }
}

/// Collects the file allocation table through the header DIFAT and the DIFAT sector chain.
fn load_fat(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, LabelError> {
    let mut difat: Vec<usize> = to_usize_iter(&sectors.data[76..HEADER_SIZE]).collect();
    let mut next = header.difat_start;
    let mut visited = 0usize;
    while next < MAX_REG_SECT {
        let sector = sectors.get(next).ok_or(CfbError::SectorChainError(next))?;
        difat.extend(to_usize_iter(sector));
        // The last entry of a DIFAT sector links to the next one.
        next = difat.pop().ok_or(CfbError::SectorChainError(next))?;
        visited += 1;
        if visited > header.difat_count {
            Err(CfbError::SectorChainError(next))?;
        }
    }

    let mut fat = Vec::new();
    for index in difat.into_iter().filter(|index| *index < MAX_REG_SECT) {
        let sector = sectors.get(index).ok_or(CfbError::SectorChainError(index))?;
        fat.extend(to_usize_iter(sector));
    }
    Ok(fat)
}

fn load_directories(fat: &[usize], sectors: &Sectors, start: usize) -> Result<HashMap<String, Directory>, LabelError> {
    let bytes = read_chain(fat, sectors, start)?;
    let directories: HashMap<String, Directory> = bytes
        .chunks_exact(DIRECTORY_ENTRY_SIZE)
        .map(Directory::new)
        .filter(|(name, _)| !name.is_empty())
        .collect();
    if directories.is_empty() {
        Err(CfbError::RootDirectoryError)?
    }
    Ok(directories)
}

/// Concatenates the sectors of a chain starting at `start`.
fn read_chain(table: &[usize], sectors: &Sectors, start: usize) -> Result<Vec<u8>, LabelError> {
    let mut content = Vec::new();
    let mut index = start;
    let mut remaining = table.len();
    while index < MAX_REG_SECT {
        let sector = sectors.get(index).ok_or(CfbError::SectorChainError(index))?;
        content.extend_from_slice(sector);
        index = *table.get(index).ok_or(CfbError::SectorChainError(index))?;
        // A chain can never be longer than its table; anything else loops.
        remaining = remaining.checked_sub(1).ok_or(CfbError::SectorChainError(index))?;
    }
    Ok(content)
}

struct Sectors {
    data: Vec<u8>,
    size: usize,
}

impl Sectors {
    /// Regular sectors are numbered after the header, mini sectors from zero.
    fn get(&self, index: usize) -> Option<&[u8]> {
        let offset = if self.size == MINI_SECTOR_SIZE { 0 } else { 1 };
        let source = (index + offset).checked_mul(self.size)?;
        let target = self.data.len().min(source + self.size);
        (source < target).then(|| &self.data[source..target])
    }
}

struct Header {
    major_version: u16,
    sector_shift: u16,
    directory_start: usize,
    mini_fat_start: usize,
    mini_fat_count: usize,
    difat_start: usize,
    difat_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, LabelError> {
        if to_u64(&data[0..8]) != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            directory_start: to_usize(&data[48..52]),
            mini_fat_start: to_usize(&data[60..64]),
            mini_fat_count: to_usize(&data[64..68]),
            difat_start: to_usize(&data[68..72]),
            difat_count: to_usize(&data[72..76]),
        })
    }

    fn sector_size(&self) -> Result<usize, LabelError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            // Version 4 pads the 512 byte header up to a full 4096 byte sector.
            (4, 0x000C) => Ok(4096),
            (major, shift) => Err(CfbError::SectorSizeError(major, shift))?,
        }
    }
}

struct Directory {
    start: usize,
    size: usize,
}

impl Directory {
    fn new(bytes: &[u8]) -> (String, Directory) {
        let length = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..length]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.into_owned(),
        };
        let start = to_usize(&bytes[116..120]);
        let size = to_u64(&bytes[120..128]) as usize;
        (name, Directory { start, size })
    }
}
