use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};
use jiff::Timestamp;
use jiff::tz::TimeZone;

/// Version 2.0: the minimum that understands data descriptors.
pub const VERSION_NEEDED: u16 = 20;

/// Host system 3 (Unix) in the high byte, so extractors read the
/// external attributes as `st_mode << 16`.
pub const VERSION_MADE_BY: u16 = (3 << 8) | VERSION_NEEDED;

/// General purpose bit 3: CRC and sizes follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// General purpose bit 11: the file name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// MS-DOS directory attribute, set alongside the Unix mode for directories.
const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
}

impl CompressionMethod {
    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
        }
    }
}

/// General purpose flags for a streamed member with the given name.
pub fn general_purpose_flags(file_name: &str) -> u16 {
    if file_name.is_ascii() {
        FLAG_DATA_DESCRIPTOR
    } else {
        FLAG_DATA_DESCRIPTOR | FLAG_UTF8
    }
}

/// Pack a Unix mode into the external attributes field.
pub fn external_attributes(unix_mode: u32, is_directory: bool) -> u32 {
    let dos = if is_directory {
        DOS_DIRECTORY_ATTRIBUTE
    } else {
        0
    };
    (unix_mode << 16) | dos
}

/// MS-DOS packed date and time.
///
/// The format has two-second resolution and covers 1980 through 2107;
/// timestamps outside that range are clamped to its ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00
    pub const MIN: Self = Self {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// 2107-12-31 23:59:58
    pub const MAX: Self = Self {
        time: (23 << 11) | (59 << 5) | 29,
        date: (127 << 9) | (12 << 5) | 31,
    };

    pub fn from_civil(year: i16, month: i8, day: i8, hour: i8, minute: i8, second: i8) -> Self {
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self::MAX;
        }

        let date = (((year - 1980) as u16) << 9) | ((month as u16) << 5) | day as u16;
        let time = ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2);
        Self { time, date }
    }

    /// Convert a filesystem timestamp to local wall-clock time.
    pub fn from_system_time(time: SystemTime) -> Self {
        let Ok(timestamp) = Timestamp::try_from(time) else {
            return Self::MIN;
        };
        let local = timestamp.to_zoned(TimeZone::system());
        Self::from_civil(
            local.year(),
            local.month(),
            local.day(),
            local.hour(),
            local.minute(),
            local.second(),
        )
    }
}

/// Local File Header (LFH) - 30 bytes plus the file name
///
/// Written in streaming mode: CRC and sizes are zero here and arrive
/// later in the member's [`DataDescriptor`].
pub struct LocalFileHeader<'a> {
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub file_name: &'a str,
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE + self.file_name.len());
        buf.put_slice(Self::SIGNATURE);
        buf.put_u16_le(VERSION_NEEDED);
        buf.put_u16_le(self.flags);
        buf.put_u16_le(self.compression_method.as_u16());
        buf.put_u16_le(self.modified.time);
        buf.put_u16_le(self.modified.date);
        buf.put_u32_le(0); // crc32
        buf.put_u32_le(0); // compressed size
        buf.put_u32_le(0); // uncompressed size
        buf.put_u16_le(self.file_name.len() as u16);
        buf.put_u16_le(0); // extra field length
        buf.put_slice(self.file_name.as_bytes());
        buf.freeze()
    }
}

/// Data Descriptor - 16 bytes, signature included
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";
    pub const SIZE: usize = 16;

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_slice(Self::SIGNATURE);
        buf.put_u32_le(self.crc32);
        buf.put_u32_le(self.compressed_size);
        buf.put_u32_le(self.uncompressed_size);
        buf.freeze()
    }
}

/// Frozen record of a finished member, written out as a
/// Central Directory File Header (CDFH) - 46 bytes plus the file name.
#[derive(Debug, Clone)]
pub struct CentralDirectoryEntry {
    pub file_name: String,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attributes: u32,
    pub lfh_offset: u32,
}

impl CentralDirectoryEntry {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const MIN_SIZE: usize = 46;

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::MIN_SIZE + self.file_name.len());
        buf.put_slice(Self::SIGNATURE);
        buf.put_u16_le(VERSION_MADE_BY);
        buf.put_u16_le(VERSION_NEEDED);
        buf.put_u16_le(self.flags);
        buf.put_u16_le(self.compression_method.as_u16());
        buf.put_u16_le(self.modified.time);
        buf.put_u16_le(self.modified.date);
        buf.put_u32_le(self.crc32);
        buf.put_u32_le(self.compressed_size);
        buf.put_u32_le(self.uncompressed_size);
        buf.put_u16_le(self.file_name.len() as u16);
        buf.put_u16_le(0); // extra field length
        buf.put_u16_le(0); // file comment length
        buf.put_u16_le(0); // disk number start
        buf.put_u16_le(0); // internal attributes
        buf.put_u32_le(self.external_attributes);
        buf.put_u32_le(self.lfh_offset);
        buf.put_slice(self.file_name.as_bytes());
        buf.freeze()
    }
}

/// End of Central Directory (EOCD) - 22 bytes, no comment
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_slice(Self::SIGNATURE);
        buf.put_u16_le(0); // number of this disk
        buf.put_u16_le(0); // disk where the central directory starts
        buf.put_u16_le(self.total_entries); // entries on this disk
        buf.put_u16_le(self.total_entries);
        buf.put_u32_le(self.cd_size);
        buf.put_u32_le(self.cd_offset);
        buf.put_u16_le(0); // comment length
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use byteorder::{LittleEndian, ReadBytesExt};

    use super::*;

    impl DosDateTime {
        /// (year, month, day)
        fn mod_date(&self) -> (u16, u8, u8) {
            let day = (self.date & 0x1F) as u8;
            let month = ((self.date >> 5) & 0x0F) as u8;
            let year = ((self.date >> 9) & 0x7F) + 1980;
            (year, month, day)
        }

        /// (hour, minute, second)
        fn mod_time(&self) -> (u8, u8, u8) {
            let second = ((self.time & 0x1F) * 2) as u8;
            let minute = ((self.time >> 5) & 0x3F) as u8;
            let hour = ((self.time >> 11) & 0x1F) as u8;
            (hour, minute, second)
        }
    }

    #[test]
    fn dos_datetime_packs_fields_and_drops_odd_seconds() {
        let dt = DosDateTime::from_civil(2024, 2, 29, 13, 45, 59);
        assert_eq!(dt.mod_date(), (2024, 2, 29));
        assert_eq!(dt.mod_time(), (13, 45, 58));
    }

    #[test]
    fn dos_datetime_clamps_out_of_range_years() {
        assert_eq!(DosDateTime::from_civil(1970, 1, 1, 0, 0, 0), DosDateTime::MIN);
        assert_eq!(DosDateTime::from_civil(2200, 6, 1, 12, 0, 0), DosDateTime::MAX);
        assert_eq!(DosDateTime::MAX.mod_date(), (2107, 12, 31));
        assert_eq!(DosDateTime::MAX.mod_time(), (23, 59, 58));
        assert_eq!(
            DosDateTime::from_system_time(SystemTime::UNIX_EPOCH),
            DosDateTime::MIN
        );
    }

    #[test]
    fn utf8_flag_only_for_non_ascii_names() {
        assert_eq!(general_purpose_flags("dir/file.txt"), FLAG_DATA_DESCRIPTOR);
        assert_eq!(
            general_purpose_flags("répertoire/naïve.txt"),
            FLAG_DATA_DESCRIPTOR | FLAG_UTF8
        );
    }

    #[test]
    fn external_attributes_carry_mode_in_high_half() {
        assert_eq!(external_attributes(0o100644, false) >> 16, 0o100644);
        assert_eq!(external_attributes(0o040755, true), (0o040755 << 16) | 0x10);
    }

    #[test]
    fn local_header_layout() {
        let header = LocalFileHeader {
            flags: FLAG_DATA_DESCRIPTOR,
            compression_method: CompressionMethod::Stored,
            modified: DosDateTime::MIN,
            file_name: "a.txt",
        }
        .to_bytes();
        assert_eq!(header.len(), LocalFileHeader::SIZE + 5);
        assert_eq!(&header[0..4], LocalFileHeader::SIGNATURE);

        let mut cursor = Cursor::new(&header[4..]);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), VERSION_NEEDED);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), FLAG_DATA_DESCRIPTOR);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), 0);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), DosDateTime::MIN.time);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), DosDateTime::MIN.date);
        // CRC and sizes are deferred to the data descriptor
        for _ in 0..3 {
            assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 0);
        }
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), 5);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), 0);
        let mut name = String::new();
        cursor.read_to_string(&mut name).unwrap();
        assert_eq!(name, "a.txt");
    }

    #[test]
    fn central_directory_header_layout() {
        let entry = CentralDirectoryEntry {
            file_name: "dir/".to_string(),
            flags: FLAG_DATA_DESCRIPTOR,
            compression_method: CompressionMethod::Stored,
            modified: DosDateTime::MIN,
            crc32: 0xDEADBEEF,
            compressed_size: 7,
            uncompressed_size: 7,
            external_attributes: external_attributes(0o040755, true),
            lfh_offset: 1234,
        };
        let bytes = entry.to_bytes();
        assert_eq!(bytes.len(), CentralDirectoryEntry::MIN_SIZE + 4);
        assert_eq!(&bytes[0..4], CentralDirectoryEntry::SIGNATURE);

        let mut cursor = Cursor::new(&bytes[4..]);
        assert_eq!(cursor.read_u16::<LittleEndian>().unwrap(), VERSION_MADE_BY);
        cursor.set_position(12);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 0xDEADBEEF);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 7);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 7);
        cursor.set_position(34);
        assert_eq!(
            cursor.read_u32::<LittleEndian>().unwrap(),
            (0o040755 << 16) | 0x10
        );
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 1234);
    }

    #[test]
    fn fixed_size_records() {
        let descriptor = DataDescriptor {
            crc32: 1,
            compressed_size: 2,
            uncompressed_size: 2,
        };
        assert_eq!(descriptor.to_bytes().len(), DataDescriptor::SIZE);

        let eocd = EndOfCentralDirectory {
            total_entries: 3,
            cd_size: 100,
            cd_offset: 200,
        }
        .to_bytes();
        assert_eq!(eocd.len(), EndOfCentralDirectory::SIZE);
        assert_eq!(&eocd[0..4], EndOfCentralDirectory::SIGNATURE);
        assert_eq!(u16::from_le_bytes([eocd[8], eocd[9]]), 3);
        assert_eq!(u16::from_le_bytes([eocd[10], eocd[11]]), 3);
        assert_eq!(u32::from_le_bytes([eocd[12], eocd[13], eocd[14], eocd[15]]), 100);
        assert_eq!(u32::from_le_bytes([eocd[16], eocd[17], eocd[18], eocd[19]]), 200);
    }
}
