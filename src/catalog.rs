//! Catalog of downloadable landmark models.
//!
//! A catalog is a JSON array of entries such as:
//!
//! ```json
//! [{"url": "https://example.org/sp68.dat.bz2", "name": "68 points",
//!   "hash": "9f86d0...", "id": "0", "version": "1.0", "file": "sp68.dat"}]
//! ```
//!
//! Numeric fields are accepted either as numbers or as strings. `hash` is the
//! hex digest of the extracted model file: MD5 (32 digits, as in the published
//! catalogs) or SHA-256 (64 digits).

use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bzip2::read::BzDecoder;
use log::{info, warn};
use md5::Md5;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::LandmarkDetector;
use crate::error::{Error, Result};

const BUFFER_SIZE: usize = 8192;

/// Progress callback: `(bytes_done, total_bytes)`; `total_bytes` is 0 when unknown.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Digest used for a catalog checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// Pick the algorithm from the length of a hex checksum. Anything that is
    /// not 64 digits long is treated as MD5.
    pub fn for_checksum(hex: &str) -> Self {
        if hex.len() == 64 {
            Self::Sha256
        } else {
            Self::Md5
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub url: String,
    pub name: String,
    pub hash: String,
    #[serde(deserialize_with = "number_or_string")]
    pub id: u32,
    #[serde(deserialize_with = "number_or_string")]
    pub version: f32,
    pub file: String,
}

impl ModelEntry {
    pub fn path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file)
    }

    pub fn exists(&self, dir: &Path) -> bool {
        self.path(dir).exists()
    }

    /// True when the stored file is missing or its digest differs from `hash`.
    pub fn is_corrupted(&self, dir: &Path) -> bool {
        let algorithm = HashAlgorithm::for_checksum(self.hash.trim());
        let digest = digest(&self.path(dir), algorithm);
        let corrupted = !digest.eq_ignore_ascii_case(self.hash.trim());
        if corrupted {
            warn!("model {:?} failed its integrity check", self.name);
        }
        corrupted
    }

    /// Remove the stored model file, if any.
    pub fn delete(&self, dir: &Path) -> Result<()> {
        match fs::remove_file(self.path(dir)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Verify the stored file and hand it to `detector`.
    pub fn load_into<D>(&self, detector: &mut D, dir: &Path) -> Result<()>
    where
        D: LandmarkDetector + ?Sized,
    {
        if self.is_corrupted(dir) {
            return Err(Error::InvalidModel(format!(
                "{} does not match its catalog checksum",
                self.path(dir).display()
            )));
        }
        detector.load(&self.path(dir))
    }

    /// Download the model into `dir`, decompressing `.bz2` downloads.
    ///
    /// The new file replaces the stored one only once it is complete. On
    /// failure the partial files are removed and any stored model is left as
    /// it was.
    pub fn fetch(&self, dir: &Path, progress: Option<ProgressFn>) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let dest = self.path(dir);
        let temp = dir.join(format!("{}.part", self.file));
        let extracted = dir.join(format!("{}.extracting", self.file));

        let result = download(&self.url, &temp, progress)
            .and_then(|()| {
                if self.url.ends_with(".bz2") {
                    extract_bz2(&temp, &extracted)?;
                    Ok(extracted.as_path())
                } else {
                    Ok(temp.as_path())
                }
            })
            .and_then(|complete| fs::rename(complete, &dest).map_err(Error::from));

        let _ = fs::remove_file(&temp);
        let _ = fs::remove_file(&extracted);
        match result {
            Ok(()) => {
                info!("model {:?} stored at {}", self.name, dest.display());
                Ok(dest)
            }
            Err(e) => {
                warn!("fetching model {:?} failed: {}", self.name, e);
                Err(e)
            }
        }
    }
}

/// New entries and newer versions found in a fetched catalog.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CatalogDiff {
    pub added: Vec<ModelEntry>,
    pub updated: Vec<ModelEntry>,
}

impl CatalogDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    pub models: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn get(&self, id: u32) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Compare against a newer catalog.
    pub fn diff(&self, newer: &ModelCatalog) -> CatalogDiff {
        let mut diff = CatalogDiff::default();
        for entry in &newer.models {
            match self.get(entry.id) {
                None => diff.added.push(entry.clone()),
                Some(current) if entry.version > current.version => {
                    diff.updated.push(entry.clone())
                }
                Some(_) => {}
            }
        }
        diff
    }
}

/// Hex digest of a file, or an empty string if it cannot be read.
pub fn digest(path: &Path, algorithm: HashAlgorithm) -> String {
    fn hash_file<H: Digest>(path: &Path) -> io::Result<String> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut hasher = H::new();
        let mut buf = [0u8; BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    if !path.exists() {
        return String::new();
    }
    let hashed = match algorithm {
        HashAlgorithm::Md5 => hash_file::<Md5>(path),
        HashAlgorithm::Sha256 => hash_file::<Sha256>(path),
    };
    hashed.unwrap_or_else(|e| {
        warn!("could not hash {}: {}", path.display(), e);
        String::new()
    })
}

/// Decompress a bzip2 file into `dest`.
pub fn extract_bz2(source: &Path, dest: &Path) -> Result<()> {
    let mut reader = BzDecoder::new(BufReader::new(File::open(source)?));
    let mut writer = BufWriter::new(File::create(dest)?);
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<()> {
    let download_err = |source| Error::Download {
        url: url.to_string(),
        source,
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total = response.content_length().unwrap_or(0);

    let mut writer = BufWriter::new(File::create(dest)?);
    let mut buf = [0u8; BUFFER_SIZE];
    let mut done = 0u64;
    loop {
        let n = response.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        done += n as u64;
        if let Some(ref cb) = progress {
            cb(done, total);
        }
    }
    writer.flush()?;
    Ok(())
}

fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Value(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Value(v) => Ok(v),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
