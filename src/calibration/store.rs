//! Calibration persistence over a raw key-value store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{CalibrationKey, CalibrationRecord};
use crate::chart::{ChartId, Metric, Sex};
use crate::error::{Error, Result};

/// Raw string key-value persistence supplied by the host.
pub trait KeyValueStore {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&mut self, key: &str, value: String) -> Result<()>;

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        (**self).set(key, value)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Volatile in-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Store backed by a single JSON object on disk.
///
/// The whole map is rewritten on every `set`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open a store, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;
        let written = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => std::fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| std::fs::write(&self.path, content));
        written.map_err(|err| Error::Store(format!("{}: {err}", self.path.display())))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    /// The entry is kept only once the file has been written.
    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value);
        self.write(&entries)?;
        self.entries = entries;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// Typed calibration access over a [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct CalibrationStore<S> {
    kv: S,
}

impl<S: KeyValueStore> CalibrationStore<S> {
    #[must_use]
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    /// The underlying key-value store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.kv
    }

    /// Fetch a calibration.
    ///
    /// A stored value that no longer parses is treated as absent.
    pub fn get(&self, metric: Metric, sex: Sex, chart: &ChartId) -> Result<Option<CalibrationRecord>> {
        let key = CalibrationKey::new(metric, sex, chart.clone());
        self.get_key(&key)
    }

    /// Fetch a calibration by key.
    pub fn get_key(&self, key: &CalibrationKey) -> Result<Option<CalibrationRecord>> {
        let Some(raw) = self.kv.get(&key.to_string())? else {
            return Ok(None);
        };
        match serde_json::from_str::<CalibrationRecord>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                tracing::warn!(%key, %err, "ignoring unparseable calibration record");
                Ok(None)
            }
        }
    }

    /// Replace the calibration for a key wholesale.
    ///
    /// Records that violate a calibration invariant are rejected and
    /// nothing is written.
    pub fn set(
        &mut self,
        metric: Metric,
        sex: Sex,
        chart: &ChartId,
        record: &CalibrationRecord,
    ) -> Result<()> {
        record.validate()?;
        let key = CalibrationKey::new(metric, sex, chart.clone());
        let json = serde_json::to_string(record)?;
        self.kv.set(&key.to_string(), json)?;
        tracing::debug!(%key, method = ?record.method, "stored calibration");
        Ok(())
    }

    /// Keys of every stored calibration.
    pub fn list(&self) -> Result<Vec<CalibrationKey>> {
        Ok(self
            .kv
            .keys()?
            .iter()
            .filter_map(|k| CalibrationKey::parse(k))
            .collect())
    }

    /// Copy calibrations stored under `from` to `to` where `to` has none.
    ///
    /// Used when a chart document is replaced by a pre-rendered raster so
    /// existing calibrations follow it. Returns the number of records copied.
    pub fn migrate_alias(&mut self, from: &ChartId, to: &ChartId) -> Result<usize> {
        let mut copied = 0;
        for &metric in Metric::all() {
            for &sex in Sex::all() {
                let Some(record) = self.get(metric, sex, from)? else {
                    continue;
                };
                if self.get(metric, sex, to)?.is_some() {
                    continue;
                }
                self.set(metric, sex, to, &record)?;
                tracing::debug!(%metric, %sex, %from, %to, "migrated calibration");
                copied += 1;
            }
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{AxisRange, PixelPoint, ReferencePoints};

    fn record() -> CalibrationRecord {
        CalibrationRecord::new(
            AxisRange::new(0.0, 100.0, 0.0, 50.0),
            ReferencePoints {
                origin: PixelPoint::new(10.0, 400.0),
                x_max: PixelPoint::new(510.0, 400.0),
                y_max: PixelPoint::new(10.0, 50.0),
            },
        )
    }

    fn chart() -> ChartId {
        ChartId::new("Head-circumference_Boys.pdf")
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut store = CalibrationStore::new(MemoryStore::new());
        assert!(store.get(Metric::HeadCircumference, Sex::Boys, &chart()).unwrap().is_none());

        store.set(Metric::HeadCircumference, Sex::Boys, &chart(), &record()).unwrap();
        let loaded = store.get(Metric::HeadCircumference, Sex::Boys, &chart()).unwrap();
        assert_eq!(loaded, Some(record()));

        // Different sex is a different key
        assert!(store.get(Metric::HeadCircumference, Sex::Girls, &chart()).unwrap().is_none());
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let mut store = CalibrationStore::new(MemoryStore::new());
        let mut first = record();
        first.source = Some("first".to_string());
        store.set(Metric::HeadCircumference, Sex::Boys, &chart(), &first).unwrap();

        let second = record();
        store.set(Metric::HeadCircumference, Sex::Boys, &chart(), &second).unwrap();
        let loaded = store.get(Metric::HeadCircumference, Sex::Boys, &chart()).unwrap().unwrap();
        assert_eq!(loaded.source, None);
    }

    #[test]
    fn test_degenerate_not_persisted() {
        let mut store = CalibrationStore::new(MemoryStore::new());
        let mut bad = record();
        bad.points.x_max.x = bad.points.origin.x;
        let err = store.set(Metric::HeadCircumference, Sex::Boys, &chart(), &bad);
        assert!(matches!(err, Err(Error::DegenerateCalibration(_))));
        assert!(store.inner().keys().unwrap().is_empty());
    }

    #[test]
    fn test_unparseable_is_absent() {
        let mut kv = MemoryStore::new();
        let key = CalibrationKey::new(Metric::HeadCircumference, Sex::Boys, chart());
        kv.set(&key.to_string(), "{not json".to_string()).unwrap();
        let store = CalibrationStore::new(kv);
        assert!(store.get(Metric::HeadCircumference, Sex::Boys, &chart()).unwrap().is_none());
    }

    #[test]
    fn test_list_skips_foreign_keys() {
        let mut kv = MemoryStore::new();
        kv.set("png_migration_done", "1".to_string()).unwrap();
        let mut store = CalibrationStore::new(kv);
        store.set(Metric::HeadCircumference, Sex::Girls, &chart(), &record()).unwrap();
        let keys = store.list().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].sex, Sex::Girls);
    }

    #[test]
    fn test_migrate_alias() {
        let from = ChartId::new("Weight-and-height_Boys_2-19-years.pdf");
        let to = ChartId::new("Weight-and-height_Boys_2-19-years.png");
        let mut store = CalibrationStore::new(MemoryStore::new());
        store.set(Metric::WeightForAge, Sex::Boys, &from, &record()).unwrap();
        store.set(Metric::StatureForAge, Sex::Boys, &from, &record()).unwrap();

        let mut existing = record();
        existing.source = Some("kept".to_string());
        store.set(Metric::StatureForAge, Sex::Boys, &to, &existing).unwrap();

        assert_eq!(store.migrate_alias(&from, &to).unwrap(), 1);
        assert!(store.get(Metric::WeightForAge, Sex::Boys, &to).unwrap().is_some());
        let kept = store.get(Metric::StatureForAge, Sex::Boys, &to).unwrap().unwrap();
        assert_eq!(kept.source.as_deref(), Some("kept"));

        // Second run copies nothing
        assert_eq!(store.migrate_alias(&from, &to).unwrap(), 0);
    }

    #[test]
    fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("calibrations.json");

        {
            let mut store = CalibrationStore::new(JsonFileStore::open(&path).unwrap());
            store.set(Metric::HeadCircumference, Sex::Boys, &chart(), &record()).unwrap();
        }

        let reopened = CalibrationStore::new(JsonFileStore::open(&path).unwrap());
        let loaded = reopened.get(Metric::HeadCircumference, Sex::Boys, &chart()).unwrap();
        assert_eq!(loaded, Some(record()));
        assert_eq!(reopened.inner().path(), path.as_path());
    }

    #[test]
    fn test_failed_write_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        // Parent of the store file is a regular file
        let mut store = CalibrationStore::new(JsonFileStore::open(blocker.join("calibrations.json")).unwrap());
        let err = store
            .set(Metric::HeadCircumference, Sex::Boys, &chart(), &record())
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(store.get(Metric::HeadCircumference, Sex::Boys, &chart()).unwrap(), None);
        assert!(store.list().unwrap().is_empty());
    }
}
