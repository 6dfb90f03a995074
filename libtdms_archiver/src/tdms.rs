//! A reader for NI TDMS recordings.
//!
//! A TDMS file is a sequence of segments. Each segment starts with a fixed 28 byte lead-in,
//! optionally followed by metadata (the list of objects, their raw data indices and
//! properties) and raw data. Objects are addressed by path: `/` is the file itself,
//! `/'group'` is a group and `/'group'/'channel'` is a channel. Only the data needed to
//! pull numeric samples out of a channel is kept; everything is read into memory.
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use fxhash::FxHashMap;
use std::io::{Cursor, ErrorKind, Read};
use std::path::Path;

use super::error::TdmsError;

const LEAD_IN_SIZE: u64 = 28;
const TDMS_TAG: &[u8; 4] = b"TDSm";
const SUPPORTED_VERSIONS: [u32; 2] = [4712, 4713];

const TOC_META_DATA: u32 = 1 << 1;
const TOC_NEW_OBJ_LIST: u32 = 1 << 2;
const TOC_RAW_DATA: u32 = 1 << 3;
const TOC_INTERLEAVED_DATA: u32 = 1 << 5;
const TOC_BIG_ENDIAN: u32 = 1 << 6;
const TOC_DAQMX_RAW_DATA: u32 = 1 << 7;

const NO_RAW_DATA: u32 = 0xFFFF_FFFF;
const SAME_RAW_INDEX: u32 = 0x0000_0000;
const DAQMX_FORMAT_CHANGING: u32 = 0x6912_0000;
const DAQMX_DIGITAL_LINE: u32 = 0x6913_0000;
// Written by a crashed or still running writer
const INCOMPLETE_SEGMENT: u64 = u64::MAX;

/// The TDMS data type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Void,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    F32Unit,
    F64Unit,
    String,
    Bool,
    Timestamp,
    ComplexF32,
    ComplexF64,
}

impl DataType {
    pub fn from_code(code: u32) -> Result<Self, TdmsError> {
        Ok(match code {
            0x00 => Self::Void,
            0x01 => Self::I8,
            0x02 => Self::I16,
            0x03 => Self::I32,
            0x04 => Self::I64,
            0x05 => Self::U8,
            0x06 => Self::U16,
            0x07 => Self::U32,
            0x08 => Self::U64,
            0x09 => Self::F32,
            0x0A => Self::F64,
            0x19 => Self::F32Unit,
            0x1A => Self::F64Unit,
            0x20 => Self::String,
            0x21 => Self::Bool,
            0x44 => Self::Timestamp,
            0x08_000C => Self::ComplexF32,
            0x10_000D => Self::ComplexF64,
            _ => return Err(TdmsError::UnknownDataType(code)),
        })
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Void => 0x00,
            Self::I8 => 0x01,
            Self::I16 => 0x02,
            Self::I32 => 0x03,
            Self::I64 => 0x04,
            Self::U8 => 0x05,
            Self::U16 => 0x06,
            Self::U32 => 0x07,
            Self::U64 => 0x08,
            Self::F32 => 0x09,
            Self::F64 => 0x0A,
            Self::F32Unit => 0x19,
            Self::F64Unit => 0x1A,
            Self::String => 0x20,
            Self::Bool => 0x21,
            Self::Timestamp => 0x44,
            Self::ComplexF32 => 0x08_000C,
            Self::ComplexF64 => 0x10_000D,
        }
    }

    /// Size in bytes of one raw value. None for variable width strings.
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::Void => Some(0),
            Self::I8 | Self::U8 | Self::Bool => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 | Self::F32Unit => Some(4),
            Self::I64 | Self::U64 | Self::F64 | Self::F64Unit | Self::ComplexF32 => Some(8),
            Self::Timestamp | Self::ComplexF64 => Some(16),
            Self::String => None,
        }
    }

    /// Numeric types can be represented as a sample sequence of f64
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::F32
                | Self::F64
                | Self::F32Unit
                | Self::F64Unit
        )
    }
}

/// Value of an object property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bool(bool),
    /// Seconds since 1904-01-01 UTC plus 2^-64 fractions of a second
    Timestamp { seconds: i64, fractions: u64 },
    Complex(f64, f64),
}

pub type Properties = Vec<(String, PropertyValue)>;

fn find_property<'a>(properties: &'a Properties, name: &str) -> Option<&'a PropertyValue> {
    properties
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// A single channel and all of its samples, concatenated across segments in file order
#[derive(Debug, Clone, PartialEq)]
pub struct TdmsChannel {
    name: String,
    data_type: Option<DataType>,
    values: Vec<f64>,
    properties: Properties,
}

impl TdmsChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// None if the channel never carried raw data
    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    /// The samples of a numeric channel. Non-numeric channels return None.
    pub fn values(&self) -> Option<&[f64]> {
        match self.data_type {
            Some(dtype) if dtype.is_numeric() => Some(&self.values),
            None => Some(&self.values),
            _ => None,
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        find_property(&self.properties, name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TdmsGroup {
    name: String,
    channels: Vec<TdmsChannel>,
    properties: Properties,
}

impl TdmsGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> &[TdmsChannel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&TdmsChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        find_property(&self.properties, name)
    }
}

/// An opened TDMS recording. Groups and channels keep the order in which they first appear.
#[derive(Debug, Clone, PartialEq)]
pub struct TdmsFile {
    groups: Vec<TdmsGroup>,
    properties: Properties,
}

impl TdmsFile {
    /// Open and fully read the recording at path
    pub fn open(path: &Path) -> Result<Self, TdmsError> {
        if !path.exists() {
            return Err(TdmsError::BadFilePath(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Read a recording from any byte source
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, TdmsError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse(&bytes)
    }

    pub fn groups(&self) -> &[TdmsGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&TdmsGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    fn parse(bytes: &[u8]) -> Result<Self, TdmsError> {
        let mut state = ParseState::default();
        let file_len = bytes.len() as u64;
        let mut offset: u64 = 0;
        while offset < file_len {
            offset = match state.read_segment(bytes, offset) {
                Ok(next) => next,
                Err(TdmsError::IOError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Err(TdmsError::Truncated(offset))
                }
                Err(e) => return Err(e),
            };
        }
        Ok(state.finish())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

macro_rules! read_endian {
    ($self:ident, $method:ident) => {
        match $self.endian {
            Endian::Little => $self.inner.$method::<LittleEndian>(),
            Endian::Big => $self.inner.$method::<BigEndian>(),
        }
    };
}

/// Cursor over one segment, honoring that segment's byte order
struct SegmentCursor<'a> {
    inner: Cursor<&'a [u8]>,
    endian: Endian,
}

impl<'a> SegmentCursor<'a> {
    fn new(bytes: &'a [u8], position: u64, endian: Endian) -> Self {
        let mut inner = Cursor::new(bytes);
        inner.set_position(position);
        Self { inner, endian }
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn remaining(&self) -> u64 {
        (self.inner.get_ref().len() as u64).saturating_sub(self.inner.position())
    }

    fn skip(&mut self, n_bytes: u64) -> Result<(), TdmsError> {
        if n_bytes > self.remaining() {
            return Err(TdmsError::Truncated(self.position()));
        }
        self.inner.set_position(self.position() + n_bytes);
        Ok(())
    }

    fn u32(&mut self) -> Result<u32, TdmsError> {
        Ok(read_endian!(self, read_u32)?)
    }

    fn u64(&mut self) -> Result<u64, TdmsError> {
        Ok(read_endian!(self, read_u64)?)
    }

    fn string(&mut self) -> Result<String, TdmsError> {
        let len = self.u32()? as u64;
        if len > self.remaining() {
            return Err(TdmsError::Truncated(self.position()));
        }
        let mut buffer = vec![0u8; len as usize];
        self.inner.read_exact(&mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn timestamp(&mut self) -> Result<PropertyValue, TdmsError> {
        let (seconds, fractions) = match self.endian {
            Endian::Little => {
                let fractions = self.inner.read_u64::<LittleEndian>()?;
                (self.inner.read_i64::<LittleEndian>()?, fractions)
            }
            Endian::Big => {
                let seconds = self.inner.read_i64::<BigEndian>()?;
                (seconds, self.inner.read_u64::<BigEndian>()?)
            }
        };
        Ok(PropertyValue::Timestamp { seconds, fractions })
    }

    fn property(&mut self, dtype: DataType) -> Result<PropertyValue, TdmsError> {
        Ok(match dtype {
            DataType::I8 => PropertyValue::Int(self.inner.read_i8()? as i64),
            DataType::I16 => PropertyValue::Int(read_endian!(self, read_i16)? as i64),
            DataType::I32 => PropertyValue::Int(read_endian!(self, read_i32)? as i64),
            DataType::I64 => PropertyValue::Int(read_endian!(self, read_i64)?),
            DataType::U8 => PropertyValue::UInt(self.inner.read_u8()? as u64),
            DataType::U16 => PropertyValue::UInt(read_endian!(self, read_u16)? as u64),
            DataType::U32 => PropertyValue::UInt(read_endian!(self, read_u32)? as u64),
            DataType::U64 => PropertyValue::UInt(read_endian!(self, read_u64)?),
            DataType::F32 | DataType::F32Unit => {
                PropertyValue::Float(read_endian!(self, read_f32)? as f64)
            }
            DataType::F64 | DataType::F64Unit => PropertyValue::Float(read_endian!(self, read_f64)?),
            DataType::String => PropertyValue::String(self.string()?),
            DataType::Bool => PropertyValue::Bool(self.inner.read_u8()? != 0),
            DataType::Timestamp => self.timestamp()?,
            DataType::ComplexF32 => {
                let re = read_endian!(self, read_f32)? as f64;
                PropertyValue::Complex(re, read_endian!(self, read_f32)? as f64)
            }
            DataType::ComplexF64 => {
                let re = read_endian!(self, read_f64)?;
                PropertyValue::Complex(re, read_endian!(self, read_f64)?)
            }
            DataType::Void => {
                return Err(TdmsError::Unsupported(String::from("void property value")))
            }
        })
    }

    /// Read one raw value. Returns None (after skipping it) for values that are not samples.
    fn sample(&mut self, dtype: DataType) -> Result<Option<f64>, TdmsError> {
        Ok(Some(match dtype {
            DataType::I8 => self.inner.read_i8()? as f64,
            DataType::I16 => read_endian!(self, read_i16)? as f64,
            DataType::I32 => read_endian!(self, read_i32)? as f64,
            DataType::I64 => read_endian!(self, read_i64)? as f64,
            DataType::U8 => self.inner.read_u8()? as f64,
            DataType::U16 => read_endian!(self, read_u16)? as f64,
            DataType::U32 => read_endian!(self, read_u32)? as f64,
            DataType::U64 => read_endian!(self, read_u64)? as f64,
            DataType::F32 | DataType::F32Unit => read_endian!(self, read_f32)? as f64,
            DataType::F64 | DataType::F64Unit => read_endian!(self, read_f64)?,
            other => {
                // Sized non-numeric values; strings never reach here
                self.skip(other.size().unwrap_or(0))?;
                return Ok(None);
            }
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawIndex {
    data_type: DataType,
    n_values: u64,
    // Only meaningful for strings, where it is stored explicitly
    total_bytes: u64,
}

impl RawIndex {
    fn byte_len(&self) -> Result<u64, TdmsError> {
        match self.data_type.size() {
            Some(size) => size.checked_mul(self.n_values).ok_or_else(|| {
                TdmsError::Unsupported(format!(
                    "raw data index of {} values does not fit in 64 bits",
                    self.n_values
                ))
            }),
            None => Ok(self.total_bytes),
        }
    }
}

#[derive(Debug, Default)]
struct ObjectEntry {
    path: Vec<String>,
    index: Option<RawIndex>,
    data_type: Option<DataType>,
    values: Vec<f64>,
    properties: Properties,
}

impl ObjectEntry {
    fn set_property(&mut self, name: String, value: PropertyValue) {
        match self.properties.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((name, value)),
        }
    }
}

/// Object bookkeeping that persists from one segment to the next
#[derive(Debug, Default)]
struct ParseState {
    objects: Vec<ObjectEntry>,
    lookup: FxHashMap<String, usize>,
    active: Vec<usize>,
}

impl ParseState {
    /// Read the segment at offset, returning the offset of the following segment
    fn read_segment(&mut self, bytes: &[u8], offset: u64) -> Result<u64, TdmsError> {
        let file_len = bytes.len() as u64;
        if file_len - offset < LEAD_IN_SIZE {
            return Err(TdmsError::Truncated(offset));
        }

        // The lead-in is always little endian
        let mut lead_in = SegmentCursor::new(bytes, offset, Endian::Little);
        let mut tag = [0u8; 4];
        lead_in.inner.read_exact(&mut tag)?;
        if &tag != TDMS_TAG {
            return Err(TdmsError::BadTag(tag, offset));
        }
        let toc = lead_in.u32()?;
        let version = lead_in.u32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(TdmsError::BadVersion(version, offset));
        }
        let next_segment_offset = lead_in.u64()?;
        let raw_data_offset = lead_in.u64()?;
        let lead_in_end = offset + LEAD_IN_SIZE;

        let segment_end = if next_segment_offset == INCOMPLETE_SEGMENT {
            file_len
        } else {
            let end = lead_in_end.saturating_add(next_segment_offset);
            if end > file_len {
                spdlog::warn!(
                    "TDMS segment at offset {} claims {} bytes but the file ends early; reading what is present",
                    offset,
                    next_segment_offset
                );
                file_len
            } else {
                end
            }
        };

        if toc & TOC_DAQMX_RAW_DATA != 0 {
            return Err(TdmsError::Unsupported(String::from("DAQmx raw data")));
        }
        let endian = if toc & TOC_BIG_ENDIAN != 0 {
            Endian::Big
        } else {
            Endian::Little
        };

        if toc & TOC_NEW_OBJ_LIST != 0 {
            self.active.clear();
        }

        let mut cursor = SegmentCursor::new(&bytes[..segment_end as usize], lead_in_end, endian);
        if toc & TOC_META_DATA != 0 {
            self.read_metadata(&mut cursor)?;
        }

        if toc & TOC_RAW_DATA != 0 {
            let raw_start = lead_in_end.saturating_add(raw_data_offset);
            if raw_start > segment_end {
                return Err(TdmsError::Truncated(offset));
            }
            cursor.inner.set_position(raw_start);
            let interleaved = toc & TOC_INTERLEAVED_DATA != 0;
            self.read_raw_data(&mut cursor, offset, segment_end - raw_start, interleaved)?;
        }

        Ok(segment_end)
    }

    fn object_id(&mut self, path: String) -> Result<usize, TdmsError> {
        if let Some(id) = self.lookup.get(&path) {
            return Ok(*id);
        }
        let components = parse_object_path(&path)?;
        let id = self.objects.len();
        self.objects.push(ObjectEntry {
            path: components,
            ..Default::default()
        });
        self.lookup.insert(path, id);
        Ok(id)
    }

    fn read_metadata(&mut self, cursor: &mut SegmentCursor) -> Result<(), TdmsError> {
        let n_objects = cursor.u32()?;
        for _ in 0..n_objects {
            let path = cursor.string()?;
            let id = self.object_id(path)?;
            let index_len = cursor.u32()?;
            match index_len {
                NO_RAW_DATA => self.objects[id].index = None,
                SAME_RAW_INDEX => {
                    if self.objects[id].index.is_none() {
                        return Err(TdmsError::Unsupported(format!(
                            "object {:?} reuses a raw data index it never defined",
                            self.objects[id].path
                        )));
                    }
                }
                DAQMX_FORMAT_CHANGING | DAQMX_DIGITAL_LINE => {
                    return Err(TdmsError::Unsupported(String::from("DAQmx raw data index")))
                }
                _ => {
                    let data_type = DataType::from_code(cursor.u32()?)?;
                    let dimension = cursor.u32()?;
                    if dimension != 1 {
                        return Err(TdmsError::Unsupported(format!(
                            "array dimension {dimension}"
                        )));
                    }
                    let n_values = cursor.u64()?;
                    let total_bytes = if data_type == DataType::String {
                        cursor.u64()?
                    } else {
                        0
                    };
                    let entry = &mut self.objects[id];
                    entry.index = Some(RawIndex {
                        data_type,
                        n_values,
                        total_bytes,
                    });
                    entry.data_type = Some(data_type);
                }
            }
            if !self.active.contains(&id) {
                self.active.push(id);
            }

            let n_properties = cursor.u32()?;
            for _ in 0..n_properties {
                let name = cursor.string()?;
                let dtype = DataType::from_code(cursor.u32()?)?;
                let value = cursor.property(dtype)?;
                self.objects[id].set_property(name, value);
            }
        }
        Ok(())
    }

    fn read_raw_data(
        &mut self,
        cursor: &mut SegmentCursor,
        offset: u64,
        raw_len: u64,
        interleaved: bool,
    ) -> Result<(), TdmsError> {
        let with_data: Vec<(usize, RawIndex)> = self
            .active
            .iter()
            .filter_map(|id| {
                self.objects[*id]
                    .index
                    .filter(|index| index.n_values > 0)
                    .map(|index| (*id, index))
            })
            .collect();
        // Value counts come straight from the file; every index must fit in this segment
        let mut chunk_size: u64 = 0;
        for (_, index) in with_data.iter() {
            let len = index.byte_len()?;
            if len > raw_len {
                return Err(TdmsError::Truncated(offset));
            }
            chunk_size = chunk_size
                .checked_add(len)
                .ok_or(TdmsError::Truncated(offset))?;
        }
        if chunk_size == 0 {
            return Ok(());
        }

        let n_chunks = raw_len / chunk_size;
        if raw_len % chunk_size != 0 {
            spdlog::warn!(
                "TDMS segment has {} trailing bytes that do not form a full chunk; ignoring them",
                raw_len % chunk_size
            );
        }

        for _ in 0..n_chunks {
            if interleaved {
                self.read_interleaved_chunk(cursor, &with_data)?;
            } else {
                for (id, index) in with_data.iter() {
                    self.read_contiguous(cursor, *id, index)?;
                }
            }
        }
        Ok(())
    }

    fn read_contiguous(
        &mut self,
        cursor: &mut SegmentCursor,
        id: usize,
        index: &RawIndex,
    ) -> Result<(), TdmsError> {
        if !index.data_type.is_numeric() {
            return cursor.skip(index.byte_len()?);
        }
        let entry = &mut self.objects[id];
        for _ in 0..index.n_values {
            if let Some(value) = cursor.sample(index.data_type)? {
                entry.values.push(value);
            }
        }
        Ok(())
    }

    fn read_interleaved_chunk(
        &mut self,
        cursor: &mut SegmentCursor,
        with_data: &[(usize, RawIndex)],
    ) -> Result<(), TdmsError> {
        let n_rows = with_data[0].1.n_values;
        if with_data
            .iter()
            .any(|(_, index)| index.n_values != n_rows || index.data_type.size().is_none())
        {
            return Err(TdmsError::Unsupported(String::from(
                "interleaved data with strings or unequal channel lengths",
            )));
        }
        for _ in 0..n_rows {
            for (id, index) in with_data.iter() {
                if let Some(value) = cursor.sample(index.data_type)? {
                    self.objects[*id].values.push(value);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> TdmsFile {
        let mut file = TdmsFile {
            groups: Vec::new(),
            properties: Vec::new(),
        };
        for entry in self.objects {
            let mut path = entry.path.into_iter();
            match (path.next(), path.next()) {
                (None, _) => file.properties = entry.properties,
                (Some(group_name), None) => {
                    let group = group_mut(&mut file.groups, group_name);
                    group.properties = entry.properties;
                }
                (Some(group_name), Some(channel_name)) => {
                    let group = group_mut(&mut file.groups, group_name);
                    group.channels.push(TdmsChannel {
                        name: channel_name,
                        data_type: entry.data_type,
                        values: entry.values,
                        properties: entry.properties,
                    });
                }
            }
        }
        file
    }
}

fn group_mut(groups: &mut Vec<TdmsGroup>, name: String) -> &mut TdmsGroup {
    let position = match groups.iter().position(|g| g.name == name) {
        Some(position) => position,
        None => {
            groups.push(TdmsGroup {
                name,
                channels: Vec::new(),
                properties: Vec::new(),
            });
            groups.len() - 1
        }
    };
    &mut groups[position]
}

/// Split an object path such as `/'group'/'chan''nel'` into its unescaped components
fn parse_object_path(path: &str) -> Result<Vec<String>, TdmsError> {
    let bad_path = || TdmsError::BadObjectPath(path.to_string());
    if path == "/" {
        return Ok(Vec::new());
    }
    let mut components = Vec::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '/' || chars.next() != Some('\'') {
            return Err(bad_path());
        }
        let mut component = String::new();
        loop {
            match chars.next() {
                Some('\'') => {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        component.push('\'');
                    } else {
                        break;
                    }
                }
                Some(other) => component.push(other),
                None => return Err(bad_path()),
            }
        }
        components.push(component);
    }
    if components.len() > 2 {
        return Err(bad_path());
    }
    Ok(components)
}

/// Minimal TDMS writer for building test recordings
#[cfg(test)]
pub(crate) mod testing {
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Write;
    use std::path::Path;

    use super::*;

    fn put_string(buffer: &mut Vec<u8>, value: &str) {
        buffer.write_u32::<LittleEndian>(value.len() as u32).unwrap();
        buffer.write_all(value.as_bytes()).unwrap();
    }

    fn put_lead_in(buffer: &mut Vec<u8>, toc: u32, meta_len: u64, raw_len: u64) {
        buffer.write_all(TDMS_TAG).unwrap();
        buffer.write_u32::<LittleEndian>(toc).unwrap();
        buffer.write_u32::<LittleEndian>(4713).unwrap();
        buffer.write_u64::<LittleEndian>(meta_len + raw_len).unwrap();
        buffer.write_u64::<LittleEndian>(meta_len).unwrap();
    }

    /// A complete single segment recording of f64 channels in one group
    pub fn segment_bytes(group: &str, channels: &[(&str, &[f64])]) -> Vec<u8> {
        let mut meta = Vec::new();
        meta.write_u32::<LittleEndian>(2 + channels.len() as u32).unwrap();
        put_string(&mut meta, "/");
        meta.write_u32::<LittleEndian>(NO_RAW_DATA).unwrap();
        meta.write_u32::<LittleEndian>(0).unwrap();
        put_string(&mut meta, &format!("/'{group}'"));
        meta.write_u32::<LittleEndian>(NO_RAW_DATA).unwrap();
        meta.write_u32::<LittleEndian>(1).unwrap();
        put_string(&mut meta, "description");
        meta.write_u32::<LittleEndian>(DataType::String.code()).unwrap();
        put_string(&mut meta, "test group");
        for (name, values) in channels {
            put_string(&mut meta, &format!("/'{group}'/'{name}'"));
            meta.write_u32::<LittleEndian>(20).unwrap();
            meta.write_u32::<LittleEndian>(DataType::F64.code()).unwrap();
            meta.write_u32::<LittleEndian>(1).unwrap();
            meta.write_u64::<LittleEndian>(values.len() as u64).unwrap();
            meta.write_u32::<LittleEndian>(0).unwrap();
        }

        let mut raw = Vec::new();
        for (_, values) in channels {
            for value in values.iter() {
                raw.write_f64::<LittleEndian>(*value).unwrap();
            }
        }

        let mut buffer = Vec::new();
        put_lead_in(
            &mut buffer,
            TOC_META_DATA | TOC_NEW_OBJ_LIST | TOC_RAW_DATA,
            meta.len() as u64,
            raw.len() as u64,
        );
        buffer.extend(meta);
        buffer.extend(raw);
        buffer
    }

    /// A raw-data-only segment that reuses the previous segment's object list and indices
    pub fn continuation_bytes(channels: &[&[f64]]) -> Vec<u8> {
        let mut raw = Vec::new();
        for values in channels {
            for value in values.iter() {
                raw.write_f64::<LittleEndian>(*value).unwrap();
            }
        }
        let mut buffer = Vec::new();
        put_lead_in(&mut buffer, TOC_RAW_DATA, 0, raw.len() as u64);
        buffer.extend(raw);
        buffer
    }

    /// Overwrite the value count declared in the raw data index of one channel
    pub fn patch_value_count(bytes: &mut [u8], group: &str, channel: &str, n_values: u64) {
        let path = format!("/'{group}'/'{channel}'");
        let start = bytes
            .windows(path.len())
            .position(|window| window == path.as_bytes())
            .unwrap();
        // Index length, data type and dimension precede the count
        let at = start + path.len() + 12;
        bytes[at..at + 8].copy_from_slice(&n_values.to_le_bytes());
    }

    pub fn write_recording(path: &Path, group: &str, channels: &[(&str, &[f64])]) {
        std::fs::write(path, segment_bytes(group, channels)).unwrap();
    }
}
