//! An in-memory container.

use indexmap::IndexMap;
use ndarray::ArrayD;

use crate::auxiliary::error::{GreensfError, GreensfResult};
use crate::container::{normalise_path, AttributeValue, Attributes, Container};

#[derive(Clone, Debug, Default)]
struct MemoryDataset {
    data: ArrayD<f64>,
    attributes: Attributes,
}

/// A [`Container`] whose groups and datasets live in memory.
///
/// Parent groups are created implicitly when a group, dataset or attribute is added below them.
#[derive(Clone, Debug)]
pub struct MemoryContainer {
    groups: IndexMap<String, Attributes>,
    datasets: IndexMap<String, MemoryDataset>,
}

impl Default for MemoryContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContainer {
    /// Creates an empty container holding only the root group.
    pub fn new() -> Self {
        let mut groups = IndexMap::new();
        groups.insert("/".to_string(), Attributes::new());
        Self {
            groups,
            datasets: IndexMap::new(),
        }
    }

    fn parent(path: &str) -> Option<String> {
        if path == "/" {
            None
        } else {
            let cut = path.rfind('/').unwrap_or(0);
            Some(normalise_path(&path[..cut]))
        }
    }

    /// Adds a group at `path`, together with any missing ancestors. Adding an existing group
    /// leaves it untouched.
    pub fn add_group(&mut self, path: &str) -> &mut Self {
        let path = normalise_path(path);
        if let Some(parent) = Self::parent(&path) {
            self.add_group(&parent);
        }
        self.groups.entry(path).or_default();
        self
    }

    /// Sets an attribute on the group or dataset at `path`. A group is created if there is
    /// no object at `path` yet.
    pub fn set_attribute<V: Into<AttributeValue>>(
        &mut self,
        path: &str,
        name: &str,
        value: V,
    ) -> &mut Self {
        let path = normalise_path(path);
        if let Some(dataset) = self.datasets.get_mut(&path) {
            dataset.attributes.insert(name.to_string(), value.into());
        } else {
            self.add_group(&path);
            if let Some(attributes) = self.groups.get_mut(&path) {
                attributes.insert(name.to_string(), value.into());
            }
        }
        self
    }

    /// Adds a dataset at `path`, replacing any dataset already there.
    pub fn add_dataset(&mut self, path: &str, data: ArrayD<f64>) -> &mut Self {
        let path = normalise_path(path);
        if let Some(parent) = Self::parent(&path) {
            self.add_group(&parent);
        }
        self.datasets.insert(
            path,
            MemoryDataset {
                data,
                attributes: Attributes::new(),
            },
        );
        self
    }

    /// Removes the object at `path` and everything below it.
    pub fn remove(&mut self, path: &str) -> &mut Self {
        let path = normalise_path(path);
        let prefix = format!("{path}/");
        self.groups
            .retain(|key, _| key != &path && !key.starts_with(&prefix));
        self.datasets
            .retain(|key, _| key != &path && !key.starts_with(&prefix));
        self
    }
}

impl Container for MemoryContainer {
    fn contains_group(&self, path: &str) -> bool {
        self.groups.contains_key(&normalise_path(path))
    }

    fn contains_dataset(&self, path: &str) -> bool {
        self.datasets.contains_key(&normalise_path(path))
    }

    fn read_group_attributes(&self, path: &str) -> GreensfResult<Attributes> {
        let path = normalise_path(path);
        self.groups
            .get(&path)
            .cloned()
            .ok_or(GreensfError::NotFound(path))
    }

    fn read_member_names(&self, path: &str) -> GreensfResult<Vec<String>> {
        let path = normalise_path(path);
        if !self.groups.contains_key(&path) {
            return Err(GreensfError::NotFound(path));
        }
        let children = self
            .groups
            .keys()
            .chain(self.datasets.keys())
            .filter(|key| Self::parent(key).as_deref() == Some(path.as_str()))
            .filter_map(|key| key.rsplit('/').next().map(str::to_string))
            .collect::<Vec<_>>();
        Ok(children)
    }

    fn read_dataset(&self, path: &str) -> GreensfResult<ArrayD<f64>> {
        let path = normalise_path(path);
        self.datasets
            .get(&path)
            .map(|dataset| dataset.data.clone())
            .ok_or(GreensfError::NotFound(path))
    }

    fn read_dataset_attributes(&self, path: &str) -> GreensfResult<Attributes> {
        let path = normalise_path(path);
        self.datasets
            .get(&path)
            .map(|dataset| dataset.attributes.clone())
            .ok_or(GreensfError::NotFound(path))
    }
}
