//! Registry of the datasets ("scales") under one root directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::dataset::{Dataset, DatasetSelector};
use crate::error::{Error, Result};
use crate::io::load_dataset;

/// Scale directories found under a root, each loaded on first use and shared after.
pub struct Catalog {
    root: PathBuf,
    scales: Vec<String>,
    loaded: FxHashMap<String, Arc<Dataset>>,
}

impl Catalog {
    /// List the scale directories under `root`, sorted by name.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = fs::read_dir(&root).map_err(|source| Error::io(&root, source))?;

        let mut scales = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::io(&root, source))?;
            if entry.path().is_dir() {
                scales.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        scales.sort();
        debug!(root = %root.display(), scales = scales.len(), "catalog opened");

        Ok(Self {
            root,
            scales,
            loaded: FxHashMap::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scale names in selection order.
    pub fn scales(&self) -> &[String] {
        &self.scales
    }

    /// The selected scale's dataset, loading it the first time it is asked for.
    pub fn dataset(&mut self, scale: &DatasetSelector) -> Result<Arc<Dataset>> {
        let name = &self.scales[scale.resolve(&self.scales, "scale")?];
        if let Some(dataset) = self.loaded.get(name) {
            return Ok(Arc::clone(dataset));
        }

        let dataset = Arc::new(load_dataset(&self.root.join(name))?);
        self.loaded.insert(name.clone(), Arc::clone(&dataset));
        Ok(dataset)
    }
}
