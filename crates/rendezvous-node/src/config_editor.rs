//! Edits to a node's persisted configuration file.
//!
//! Role drivers write what coordination produced (peers, seeds, upstream
//! endpoints, trusted checkpoints) into the node's config before starting
//! it. Sections are dotted paths (`p2p`, `header.trusted`); the empty
//! section addresses the top-level table.

use std::path::Path;
use std::path::PathBuf;

use parking_lot::Mutex;
use snafu::ResultExt;
use toml::Table;
use toml::Value;
use tracing::debug;

use crate::error::ConfigEditError;
use crate::error::NotATableSnafu;
use crate::error::ParseConfigSnafu;
use crate::error::ReadConfigSnafu;
use crate::error::RenderConfigSnafu;
use crate::error::WriteConfigSnafu;

/// Sets single parameters of a node config file.
pub trait ConfigEditor: Send + Sync {
    fn change_param(&self, path: &Path, section: &str, key: &str, value: Value) -> Result<(), ConfigEditError>;
}

/// Edits TOML files in place, creating the file and sections as needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlConfigEditor;

impl TomlConfigEditor {
    fn load(path: &Path) -> Result<Table, ConfigEditError> {
        match std::fs::read_to_string(path) {
            Ok(content) => content.parse::<Table>().context(ParseConfigSnafu { path }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Table::new()),
            Err(err) => Err(err).context(ReadConfigSnafu { path }),
        }
    }
}

impl ConfigEditor for TomlConfigEditor {
    fn change_param(&self, path: &Path, section: &str, key: &str, value: Value) -> Result<(), ConfigEditError> {
        let mut root = Self::load(path)?;

        let mut table = &mut root;
        for segment in section.split('.').filter(|segment| !segment.is_empty()) {
            let entry = table.entry(segment.to_string()).or_insert_with(|| Value::Table(Table::new()));
            table = match entry {
                Value::Table(inner) => inner,
                _ => {
                    return NotATableSnafu {
                        path,
                        section: section.to_string(),
                    }
                    .fail();
                }
            };
        }
        table.insert(key.to_string(), value);

        let rendered = toml::to_string_pretty(&root).context(RenderConfigSnafu { path })?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(WriteConfigSnafu { path })?;
        }
        std::fs::write(path, rendered).context(WriteConfigSnafu { path })?;
        debug!(path = %path.display(), section, key, "changed node config parameter");
        Ok(())
    }
}

/// One recorded [`ConfigEditor::change_param`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    pub path: PathBuf,
    pub section: String,
    pub key: String,
    pub value: Value,
}

/// Records changes in memory instead of touching the file system.
#[derive(Debug, Default)]
pub struct RecordingConfigEditor {
    changes: Mutex<Vec<ConfigChange>>,
}

impl RecordingConfigEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<ConfigChange> {
        self.changes.lock().clone()
    }

    /// Last value set for `section.key` in `path`.
    pub fn value_of(&self, path: &Path, section: &str, key: &str) -> Option<Value> {
        self.changes
            .lock()
            .iter()
            .rev()
            .find(|change| change.path == path && change.section == section && change.key == key)
            .map(|change| change.value.clone())
    }
}

impl ConfigEditor for RecordingConfigEditor {
    fn change_param(&self, path: &Path, section: &str, key: &str, value: Value) -> Result<(), ConfigEditError> {
        self.changes.lock().push(ConfigChange {
            path: path.to_path_buf(),
            section: section.to_string(),
            key: key.to_string(),
            value,
        });
        Ok(())
    }
}
