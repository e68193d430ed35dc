// APE tag support
//
// APEv2 tags are used directly by Musepack, Monkey's Audio, OptimFROG and WavPack, and show
// up as leftovers in MP3 files.
//
// Tag layout (all integers little-endian):
// - Header (optional, 32 bytes) and footer (32 bytes):
//   - Signature: "APETAGEX" (8 bytes)
//   - Version: 1000 or 2000 (4 bytes)
//   - Tag size: items + footer, excluding the header (4 bytes)
//   - Item count (4 bytes)
//   - Flags (4 bytes)
//   - Reserved: zeros (8 bytes)
// - Items:
//   - Value size (4 bytes)
//   - Item flags (4 bytes): bit 0 read-only, bits 1-2 value type
//   - Key: ASCII, null-terminated
//   - Value: UTF-8 text (NUL-separated lists), binary data or a locator

pub mod file;

use std::io::{Read, Seek, SeekFrom};

use log::{debug, warn};

use crate::config::TagConfig;
use crate::error::{Result, TagError};
use crate::field_mapping::{ApeKeyStyle, FieldMappings, StandardField, ValueConverter};
use crate::picture::{Picture, PictureType};
use crate::record::TagRecord;
use crate::report::{TagWarning, WriteReport};
use crate::utils::io::{read_exact_or_short, read_u32_le, write_u32_le, SliceReader};

pub const APE_SIGNATURE: &[u8; 8] = b"APETAGEX";
pub const APE_VERSION: u32 = 2000;
const APE_HEADER_SIZE: u64 = 32;

const FLAG_HAS_HEADER: u32 = 1 << 31;
const FLAG_NO_FOOTER: u32 = 1 << 30;
const FLAG_IS_HEADER: u32 = 1 << 29;

const ITEM_READ_ONLY: u32 = 1;
const ITEM_TYPE_MASK: u32 = 0b110;
const ITEM_BINARY: u32 = 1 << 1;
const ITEM_LOCATOR: u32 = 2 << 1;

/// APE tag header or footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApeTagHeader {
    pub version: u32,
    /// Items plus footer, excluding the header
    pub tag_size: u32,
    pub item_count: u32,
    pub flags: u32,
}

impl ApeTagHeader {
    pub fn parse(buffer: &[u8; 32]) -> Result<Option<Self>> {
        if &buffer[..8] != APE_SIGNATURE {
            return Ok(None);
        }
        let header = ApeTagHeader {
            version: read_u32_le(buffer, 8)?,
            tag_size: read_u32_le(buffer, 12)?,
            item_count: read_u32_le(buffer, 16)?,
            flags: read_u32_le(buffer, 20)?,
        };
        if u64::from(header.tag_size) < APE_HEADER_SIZE {
            return Err(TagError::corrupt(format!("APE tag size {} is too small", header.tag_size)));
        }
        Ok(Some(header))
    }

    pub fn has_header(&self) -> bool {
        // APEv1 tags never have a header
        self.version >= APE_VERSION && self.flags & FLAG_HAS_HEADER != 0
    }

    pub fn is_header(&self) -> bool {
        self.flags & FLAG_IS_HEADER != 0
    }

    fn render(&self, flags: u32) -> [u8; 32] {
        let mut out = Vec::with_capacity(32);
        out.extend_from_slice(APE_SIGNATURE);
        write_u32_le(self.version, &mut out);
        write_u32_le(self.tag_size, &mut out);
        write_u32_le(self.item_count, &mut out);
        write_u32_le(flags, &mut out);
        out.resize(32, 0);
        let mut buffer = [0u8; 32];
        buffer.copy_from_slice(&out);
        buffer
    }
}

/// Where a tag sits in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApeLocation {
    /// First byte of the tag, header included
    pub start: u64,
    /// One past the last byte of the tag
    pub end: u64,
    pub header: ApeTagHeader,
    /// Offset of the first item
    pub items_start: u64,
    /// One past the last item
    pub items_end: u64,
}

/// Look for a tag whose footer ends at `end`
pub fn find_footer<R: Read + Seek>(reader: &mut R, end: u64) -> Result<Option<ApeLocation>> {
    if end < APE_HEADER_SIZE {
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(end - APE_HEADER_SIZE))?;
    let mut buffer = [0u8; 32];
    read_exact_or_short(reader, &mut buffer)?;

    let Some(footer) = ApeTagHeader::parse(&buffer)? else {
        return Ok(None);
    };
    if footer.is_header() {
        return Ok(None);
    }

    let header_size = if footer.has_header() { APE_HEADER_SIZE } else { 0 };
    let start = end
        .checked_sub(u64::from(footer.tag_size) + header_size)
        .ok_or_else(|| TagError::corrupt("APE tag is larger than the file"))?;

    Ok(Some(ApeLocation {
        start,
        end,
        header: footer,
        items_start: start + header_size,
        items_end: end - APE_HEADER_SIZE,
    }))
}

/// Look for a header-first tag at `offset`
pub fn find_header<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    file_len: u64,
) -> Result<Option<ApeLocation>> {
    if offset + APE_HEADER_SIZE > file_len {
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(offset))?;
    let mut buffer = [0u8; 32];
    read_exact_or_short(reader, &mut buffer)?;

    let Some(header) = ApeTagHeader::parse(&buffer)? else {
        return Ok(None);
    };
    if !header.is_header() {
        return Ok(None);
    }

    let end = offset + APE_HEADER_SIZE + u64::from(header.tag_size);
    if end > file_len {
        return Err(TagError::corrupt("APE tag runs past the end of the file"));
    }
    let footer_size = if header.flags & FLAG_NO_FOOTER != 0 { 0 } else { APE_HEADER_SIZE };
    Ok(Some(ApeLocation {
        start: offset,
        end,
        header,
        items_start: offset + APE_HEADER_SIZE,
        items_end: end.saturating_sub(footer_size).max(offset + APE_HEADER_SIZE),
    }))
}

/// APE item value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApeValue {
    Text(String),
    Binary(Vec<u8>),
    Locator(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApeItem {
    pub key: String,
    pub value: ApeValue,
    pub read_only: bool,
}

impl ApeItem {
    pub fn text(key: &str, value: String) -> Self {
        ApeItem {
            key: key.to_string(),
            value: ApeValue::Text(value),
            read_only: false,
        }
    }
}

/// In-memory APE tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApeTag {
    pub items: Vec<ApeItem>,
    /// An item held text that was not valid UTF-8
    pub repaired: bool,
}

impl ApeTag {
    /// Read the items of a located tag
    pub fn read<R: Read + Seek>(reader: &mut R, location: &ApeLocation, config: &TagConfig) -> Result<Self> {
        let items_len = location
            .items_end
            .checked_sub(location.items_start)
            .ok_or_else(|| TagError::corrupt("APE tag without room for its items"))?;
        let data = crate::rewrite::read_region(reader, location.items_start, items_len as usize)?;
        Self::parse_items(&data, location.header.item_count, config)
    }

    pub fn parse_items(data: &[u8], count: u32, config: &TagConfig) -> Result<Self> {
        let mut tag = ApeTag::default();
        let mut reader = SliceReader::new(data);

        for _ in 0..count {
            if reader.remaining() == 0 {
                warn!("APE tag declares more items than it holds");
                break;
            }
            let size = reader.read_u32_le()? as usize;
            let flags = reader.read_u32_le()?;
            let key = String::from_utf8_lossy(reader.read_until_nul()?).into_owned();
            if size > reader.remaining() {
                return Err(TagError::corrupt(format!("APE item \"{key}\" runs past the tag")));
            }
            let raw = reader.take(size)?;

            let value = match flags & ITEM_TYPE_MASK {
                ITEM_BINARY => ApeValue::Binary(raw.to_vec()),
                ITEM_LOCATOR => ApeValue::Locator(String::from_utf8_lossy(raw).into_owned()),
                _ => match std::str::from_utf8(raw) {
                    Ok(text) => ApeValue::Text(text.to_string()),
                    Err(_) => {
                        debug!("APE item \"{key}\" is not UTF-8, decoding as {}", config.legacy_charset.name());
                        tag.repaired = true;
                        ApeValue::Text(config.legacy_charset.decode(raw))
                    }
                },
            };

            tag.items.push(ApeItem {
                key,
                value,
                read_only: flags & ITEM_READ_ONLY != 0,
            });
        }

        Ok(tag)
    }

    pub fn get(&self, key: &str) -> Option<&ApeItem> {
        self.items.iter().find(|item| item.key.eq_ignore_ascii_case(key))
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match &self.get(key)?.value {
            ApeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Replace the item with this key, keeping its position
    pub fn insert(&mut self, item: ApeItem) {
        match self.items.iter_mut().find(|i| i.key.eq_ignore_ascii_case(&item.key)) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.items.retain(|item| !item.key.eq_ignore_ascii_case(key));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render header, items and footer
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for item in &self.items {
            let (type_flags, value): (u32, &[u8]) = match &item.value {
                ApeValue::Text(text) => (0, text.as_bytes()),
                ApeValue::Binary(data) => (ITEM_BINARY, data),
                ApeValue::Locator(url) => (ITEM_LOCATOR, url.as_bytes()),
            };
            let flags = type_flags | if item.read_only { ITEM_READ_ONLY } else { 0 };

            body.try_reserve(value.len() + item.key.len() + 9)?;
            write_u32_le(value.len() as u32, &mut body);
            write_u32_le(flags, &mut body);
            body.extend_from_slice(item.key.as_bytes());
            body.push(0);
            body.extend_from_slice(value);
        }

        let tag_size = u32::try_from(body.len() as u64 + APE_HEADER_SIZE)
            .map_err(|_| TagError::UnsupportedFeature("APE tag larger than 4 GiB".to_string()))?;
        let header = ApeTagHeader {
            version: APE_VERSION,
            tag_size,
            item_count: self.items.len() as u32,
            flags: 0,
        };

        let mut out = Vec::new();
        out.try_reserve_exact(body.len() + 2 * APE_HEADER_SIZE as usize)
            .map_err(|_| TagError::OutOfMemory("APE tag"))?;
        out.extend_from_slice(&header.render(FLAG_HAS_HEADER | FLAG_IS_HEADER));
        out.extend(body);
        out.extend_from_slice(&header.render(FLAG_HAS_HEADER));
        Ok(out)
    }

    /// Map the items onto a record
    pub fn to_record(&self, style: ApeKeyStyle, config: &TagConfig) -> TagRecord {
        let mut record = TagRecord::new();
        let separator = config.multi_value_separator.as_str();

        for field in StandardField::ALL {
            let Some(key) = FieldMappings::to_ape(field, style) else { continue };
            let Some(text) = self.get_text(key) else { continue };
            // Multiple values are NUL-separated
            let values: Vec<&str> = text.split('\0').filter(|v| !v.is_empty()).collect();
            let value = ValueConverter::join_values(&values, separator);

            match field {
                StandardField::Track | StandardField::DiscNumber => {
                    let (number, total) = value
                        .as_deref()
                        .map(ValueConverter::split_number_total)
                        .unwrap_or_default();
                    let total_field = if field == StandardField::Track {
                        StandardField::TrackTotal
                    } else {
                        StandardField::DiscTotal
                    };
                    record.set(field, ValueConverter::pad_optional(number, config.number_padding));
                    record.set(total_field, ValueConverter::pad_optional(total, config.number_padding));
                }
                _ => record.set(field, value),
            }
        }

        for item in &self.items {
            if let ApeValue::Binary(data) = &item.value {
                let Some(picture_type) = cover_art_type(&item.key) else { continue };
                match parse_cover_art(data, picture_type) {
                    Some(picture) => record.add_picture(picture),
                    None => {
                        warn!("Dropping empty APE cover art item \"{}\"", item.key);
                        record.dirty = true;
                    }
                }
            }
        }

        record.dirty |= self.repaired;
        record
    }

    /// Update the items from a record; unrelated items are kept
    pub fn apply_record(
        &mut self,
        record: &TagRecord,
        style: ApeKeyStyle,
        config: &TagConfig,
        report: &mut WriteReport,
    ) {
        let pad = |value: Option<&str>| value.map(|v| ValueConverter::pad_number(v, config.number_padding));

        for field in StandardField::ALL {
            let Some(key) = FieldMappings::to_ape(field, style) else { continue };
            let value = match field {
                StandardField::Track => ValueConverter::join_number_total(
                    pad(record.get(StandardField::Track)).as_deref(),
                    pad(record.get(StandardField::TrackTotal)).as_deref(),
                ),
                StandardField::DiscNumber => ValueConverter::join_number_total(
                    pad(record.get(StandardField::DiscNumber)).as_deref(),
                    pad(record.get(StandardField::DiscTotal)).as_deref(),
                ),
                _ => record.get(field).map(str::to_string),
            };

            match value {
                Some(value) => self.insert(ApeItem::text(key, value)),
                None => self.remove(key),
            }
        }

        self.items.retain(|item| cover_art_type(&item.key).is_none());
        let mut used = Vec::new();
        for (index, picture) in record.pictures.iter().enumerate() {
            let key = cover_art_key(picture.picture_type, style);
            if used.contains(&key) {
                report.warn(TagWarning::PictureSkipped {
                    index,
                    reason: format!("only one \"{key}\" item is allowed"),
                });
                continue;
            }
            used.push(key);
            self.items.push(ApeItem {
                key: key.to_string(),
                value: ApeValue::Binary(render_cover_art(picture)),
                read_only: false,
            });
        }
    }
}

fn cover_art_type(key: &str) -> Option<PictureType> {
    let lower = key.to_ascii_lowercase();
    match lower.as_str() {
        "cover art (front)" => Some(PictureType::CoverFront),
        "cover art (back)" => Some(PictureType::CoverBack),
        "cover art (other)" => Some(PictureType::Other),
        _ => None,
    }
}

fn cover_art_key(picture_type: PictureType, style: ApeKeyStyle) -> &'static str {
    match (picture_type, style) {
        (PictureType::CoverFront, ApeKeyStyle::Ape) => "Cover Art (Front)",
        (PictureType::CoverBack, ApeKeyStyle::Ape) => "Cover Art (Back)",
        (_, ApeKeyStyle::Ape) => "Cover Art (Other)",
        (PictureType::CoverFront, ApeKeyStyle::WavPack) => "cover art (front)",
        (PictureType::CoverBack, ApeKeyStyle::WavPack) => "cover art (back)",
        (_, ApeKeyStyle::WavPack) => "cover art (other)",
    }
}

/// Cover art items hold a file name, a NUL, then the image
fn parse_cover_art(data: &[u8], picture_type: PictureType) -> Option<Picture> {
    let (name, image) = match data.iter().position(|&b| b == 0) {
        Some(nul) => (&data[..nul], &data[nul + 1..]),
        None => (&[][..], data),
    };
    if image.is_empty() {
        return None;
    }
    let name = String::from_utf8_lossy(name).into_owned();
    let mut picture = Picture::new(picture_type, image.to_vec());
    // The generated default name is not a description
    let default_name = format!("cover.{}", picture.format().extension());
    picture.description = (!name.is_empty() && name != default_name).then_some(name);
    Some(picture)
}

fn render_cover_art(picture: &Picture) -> Vec<u8> {
    let name = match &picture.description {
        Some(description) => description.clone(),
        None => format!("cover.{}", picture.format().extension()),
    };
    let mut data = Vec::with_capacity(name.len() + 1 + picture.data.len());
    data.extend_from_slice(name.as_bytes());
    data.push(0);
    data.extend_from_slice(&picture.data);
    data
}
