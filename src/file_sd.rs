use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use discovery::{LabelSet, Sink, TargetGroup};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("write {path:?} failed, {err}")]
    Io { path: PathBuf, err: io::Error },
    #[error("encode target groups failed, {0}")]
    Encode(#[from] serde_json::Error),
}

/// One entry of a Prometheus `file_sd_configs` file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StaticConfig {
    pub targets: Vec<String>,
    pub labels: LabelSet,
}

/// FileSd keeps the latest known target groups and mirrors them into a
/// file_sd compatible JSON file.
pub struct FileSd {
    name: String,
    path: PathBuf,
    tmp_path: PathBuf,

    groups: BTreeMap<String, StaticConfig>,
    // what the file currently holds, None until the first write
    written: Option<BTreeMap<String, StaticConfig>>,
}

impl FileSd {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".tmp");

        Self {
            name: name.into(),
            path,
            tmp_path: tmp_path.into(),
            groups: BTreeMap::new(),
            written: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merges a batch into the known groups, tombstones remove their source.
    pub fn apply(&mut self, batch: Vec<TargetGroup>) {
        for group in batch {
            let key = format!("{}:{}", self.name, group.source);

            if group.is_tombstone() {
                self.groups.remove(&key);
                continue;
            }

            let targets = group.addresses().map(str::to_string).collect();
            self.groups.insert(
                key,
                StaticConfig {
                    targets,
                    labels: group.labels,
                },
            );
        }
    }

    /// Writes the groups if they differ from what was written last time,
    /// returns whether the file was written.
    ///
    /// The content goes to a temporary file first which then replaces the
    /// output file, so readers never see a partial file.
    pub fn flush(&mut self) -> Result<bool, Error> {
        if self.written.as_ref() == Some(&self.groups) {
            return Ok(false);
        }

        let configs = self.groups.values().collect::<Vec<_>>();
        let mut data = serde_json::to_vec_pretty(&configs)?;
        data.push(b'\n');

        self.write_atomic(&data).map_err(|err| Error::Io {
            path: self.path.clone(),
            err,
        })?;

        debug!(message = "target groups written", path = ?self.path, groups = configs.len());

        self.written = Some(self.groups.clone());

        Ok(true)
    }

    fn write_atomic(&self, data: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(&self.tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&self.tmp_path, &self.path)
    }
}

impl Sink for FileSd {
    fn emit(&mut self, batch: Vec<TargetGroup>) -> discovery::Result<()> {
        self.apply(batch);
        self.flush()?;

        Ok(())
    }
}
