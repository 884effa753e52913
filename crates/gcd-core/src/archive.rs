//! Archive packaging of a finished output directory.
//!
//! Layout of `{name}.sqar/`:
//! - `archive0.bin`: every member gzip-compressed on its own, back to back
//! - `metadata.txt`: one tab-separated line per member:
//!   `path  size  mtime_millis  blake3  archive_file  start  end`

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

const DATA_FILE: &str = "archive0.bin";
const METADATA_FILE: &str = "metadata.txt";

/// One member of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the archived directory, `/`-separated
    pub path: String,
    /// Uncompressed size in bytes
    pub size: u64,
    pub mtime_millis: i64,
    /// blake3 of the uncompressed bytes, hex
    pub checksum: String,
    pub archive_file: String,
    /// Byte range of the compressed member inside `archive_file`
    pub start: u64,
    pub end: u64,
}

impl ArchiveEntry {
    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.path,
            self.size,
            self.mtime_millis,
            self.checksum,
            self.archive_file,
            self.start,
            self.end
        )
    }

    fn parse_line(line: &str) -> io::Result<Self> {
        let bad = || io::Error::new(io::ErrorKind::InvalidData, format!("bad metadata line: {line}"));
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() != 7 {
            return Err(bad());
        }
        Ok(Self {
            path: cols[0].to_string(),
            size: cols[1].parse().map_err(|_| bad())?,
            mtime_millis: cols[2].parse().map_err(|_| bad())?,
            checksum: cols[3].to_string(),
            archive_file: cols[4].to_string(),
            start: cols[5].parse().map_err(|_| bad())?,
            end: cols[6].parse().map_err(|_| bad())?,
        })
    }
}

/// Result of packaging a directory
#[derive(Debug)]
pub struct ArchiveSummary {
    pub archive_dir: PathBuf,
    pub entries: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Package every regular file under `src` into the archive directory `dest`.
///
/// `dest` is replaced if it already exists. Members are written in sorted
/// path order so the same input produces the same archive.
pub fn write_archive(src: &Path, dest: &Path) -> io::Result<ArchiveSummary> {
    let mut files = Vec::new();
    collect_files(src, &mut files)?;
    files.sort();

    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;

    let mut data = BufWriter::new(File::create(dest.join(DATA_FILE))?);
    let mut entries = Vec::with_capacity(files.len());
    let mut offset = 0u64;
    let mut bytes_in = 0u64;

    for file in &files {
        let bytes = fs::read(file)?;
        let mtime_millis = fs::metadata(file)?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes)?;
        let compressed = encoder.finish()?;
        data.write_all(&compressed)?;

        let start = offset;
        offset += compressed.len() as u64;
        bytes_in += bytes.len() as u64;

        entries.push(ArchiveEntry {
            path: relative_name(src, file),
            size: bytes.len() as u64,
            mtime_millis,
            checksum: blake3::hash(&bytes).to_hex().to_string(),
            archive_file: DATA_FILE.to_string(),
            start,
            end: offset,
        });
    }
    data.flush()?;

    let mut metadata = BufWriter::new(File::create(dest.join(METADATA_FILE))?);
    for entry in &entries {
        writeln!(metadata, "{}", entry.to_line())?;
    }
    metadata.flush()?;

    log::info!(
        "Archived {} files from {} into {}",
        entries.len(),
        src.display(),
        dest.display()
    );

    Ok(ArchiveSummary {
        archive_dir: dest.to_path_buf(),
        entries: entries.len(),
        bytes_in,
        bytes_out: offset,
    })
}

/// Read the member list of an archive directory.
pub fn read_metadata(archive_dir: &Path) -> io::Result<Vec<ArchiveEntry>> {
    let reader = BufReader::new(File::open(archive_dir.join(METADATA_FILE))?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.is_empty() {
            entries.push(ArchiveEntry::parse_line(&line)?);
        }
    }
    Ok(entries)
}

/// Decompress one member and verify its checksum.
pub fn read_entry(archive_dir: &Path, entry: &ArchiveEntry) -> io::Result<Vec<u8>> {
    let data = fs::read(archive_dir.join(&entry.archive_file))?;
    let range = usize::try_from(entry.start).ok().zip(usize::try_from(entry.end).ok());
    let compressed = range
        .and_then(|(start, end)| data.get(start..end))
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, format!("{}: range out of bounds", entry.path))
        })?;

    let mut out = Vec::with_capacity(entry.size as usize);
    GzDecoder::new(compressed).read_to_end(&mut out)?;
    if blake3::hash(&out).to_hex().as_str() != entry.checksum {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: checksum mismatch", entry.path),
        ));
    }
    Ok(out)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_name(root: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(root).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
