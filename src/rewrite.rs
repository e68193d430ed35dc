// Container rewrite engine
//
// Every codec renders its new tag regions into memory and describes them as byte-range
// replacements. The engine picks the cheapest way to apply them:
// - every replacement keeps its size: overwrite in place
// - the only size change is at the end of the file: overwrite, then truncate or extend last
// - anything else: stream the file into a temporary sibling and rename it over the original

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use crate::error::{Result, TagError};
use crate::utils::io::copy_bytes;

/// Replace `start..end` of the original file with `data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub start: u64,
    pub end: u64,
    pub data: Vec<u8>,
}

impl Splice {
    pub fn new(start: u64, end: u64, data: Vec<u8>) -> Self {
        Splice { start, end, data }
    }

    /// Insert `data` at `offset` without removing anything
    pub fn insert(offset: u64, data: Vec<u8>) -> Self {
        Splice::new(offset, offset, data)
    }

    /// Remove `start..end`
    pub fn remove(start: u64, end: u64) -> Self {
        Splice::new(start, end, Vec::new())
    }

    fn old_len(&self) -> u64 {
        self.end - self.start
    }

    fn keeps_size(&self) -> bool {
        self.old_len() == self.data.len() as u64
    }
}

/// How a set of splices was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Unchanged,
    /// Overwrites the original file
    InPlace,
    /// Overwrites the original file, then truncates or extends it
    TailResize,
    /// Builds a temporary sibling and renames it over the original
    FullRewrite,
}

/// Apply `splices` to the file at `path`
pub fn apply_splices<P: AsRef<Path>>(path: P, mut splices: Vec<Splice>) -> Result<Strategy> {
    let path = path.as_ref();
    let file_len = fs::metadata(path)?.len();

    splices.retain(|s| !(s.start == s.end && s.data.is_empty()));
    splices.sort_by_key(|s| (s.start, s.end));
    validate(&splices, file_len)?;

    let strategy = choose_strategy(&splices, file_len);
    debug!("Applying {} splice(s) to {} using {strategy:?}", splices.len(), path.display());

    match strategy {
        Strategy::Unchanged => {}
        Strategy::InPlace => {
            let mut file = OpenOptions::new().write(true).open(path)?;
            for splice in &splices {
                file.seek(SeekFrom::Start(splice.start))?;
                file.write_all(&splice.data)?;
            }
            file.flush()?;
        }
        Strategy::TailResize => {
            let mut file = OpenOptions::new().write(true).open(path)?;
            let mut new_len = file_len;
            for splice in &splices {
                file.seek(SeekFrom::Start(splice.start))?;
                file.write_all(&splice.data)?;
                if splice.end == file_len && !splice.keeps_size() {
                    new_len = splice.start + splice.data.len() as u64;
                }
            }
            // Truncation is the last step so a failed write never loses audio data
            file.set_len(new_len)?;
            file.flush()?;
        }
        Strategy::FullRewrite => {
            replace_file(path, |source, dest| {
                let mut pos = 0;
                for splice in &splices {
                    copy_bytes(source, dest, splice.start - pos)?;
                    dest.write_all(&splice.data)?;
                    source.seek(SeekFrom::Start(splice.end))?;
                    pos = splice.end;
                }
                copy_bytes(source, dest, file_len - pos)?;
                Ok(())
            })?;
        }
    }

    Ok(strategy)
}

fn validate(splices: &[Splice], file_len: u64) -> Result<()> {
    let mut last_end = 0;
    for splice in splices {
        if splice.start > splice.end || splice.end > file_len {
            return Err(TagError::corrupt(format!(
                "tag region {}..{} lies outside the file ({file_len} bytes)",
                splice.start, splice.end
            )));
        }
        if splice.start < last_end {
            return Err(TagError::corrupt("overlapping tag regions"));
        }
        last_end = splice.end;
    }
    Ok(())
}

/// Pick how to apply validated, sorted `splices`.
///
/// Only `FullRewrite` is atomic. `InPlace` and `TailResize` write straight into the
/// original file, so an I/O error or crash part way through can leave a tag region
/// half written. The audio bytes outside the splices are never touched by those paths,
/// and `TailResize` changes the length only after every region is written.
fn choose_strategy(splices: &[Splice], file_len: u64) -> Strategy {
    if splices.is_empty() {
        return Strategy::Unchanged;
    }

    let resized: Vec<&Splice> = splices.iter().filter(|s| !s.keeps_size()).collect();
    match resized.as_slice() {
        [] => Strategy::InPlace,
        [only] if only.end == file_len => Strategy::TailResize,
        _ => Strategy::FullRewrite,
    }
}

/// Rebuild the file through `build`, which copies from the original into a temporary
/// file in the same directory. The original is replaced only once `build` succeeds.
pub fn replace_file<P, F>(path: P, build: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufReader<File>, &mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut temp = tempfile::Builder::new()
        .prefix(".tagforge-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    {
        let mut source = BufReader::new(File::open(path)?);
        let mut dest = BufWriter::new(&mut temp);
        build(&mut source, &mut dest)?;
        dest.flush()?;
    }
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), permissions)?;

    match temp.persist(path) {
        Ok(_) => Ok(()),
        Err(err) => {
            // Some platforms refuse to rename over an existing file
            debug!("Rename over {} failed ({}), retrying after removal", path.display(), err.error);
            let temp = err.file;
            fs::remove_file(path)?;
            temp.persist(path).map_err(|e| TagError::Io(e.error))?;
            Ok(())
        }
    }
}

/// Read `len` bytes at `offset`
pub fn read_region<R: Read + Seek>(reader: &mut R, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    reader.seek(SeekFrom::Start(offset))?;
    crate::utils::io::read_exact_or_short(reader, &mut buf)?;
    Ok(buf)
}
