//! Control definitions for the browsing front end.
//!
//! Controls are registered in an explicit [`ControlRegistry`] owned by the
//! caller. A [`MainBlueprint`] describes the controls of the browsing view and
//! registers them in two steps: [`MainBlueprint::new`] only stores the key
//! format, [`MainBlueprint::build`] performs the registration.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// What a control does when triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Command {
    NextImage,
    PreviousImage,
    RemoveCurrent,
    BackupCurrent,
    OpenCurrent,
    CancelScan,
    Rescan,
    Quit,
}

/// How raw control names are turned into registry keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFormat {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub replace_spaces: bool,
    pub replacement_char: char,
    pub part_delimiter: String,
    pub all_upper: bool,
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self {
            prefix: None,
            suffix: None,
            replace_spaces: true,
            replacement_char: '_',
            part_delimiter: "_".to_string(),
            all_upper: true,
        }
    }
}

impl KeyFormat {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }
}

/// Formats `name` into a control key according to `format`.
///
/// `format_key("next image", &KeyFormat::default().with_prefix("main"))`
/// yields `"MAIN_NEXT_IMAGE"`.
pub fn format_key(name: &str, format: &KeyFormat) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);
    if let Some(prefix) = format.prefix.as_deref().filter(|p| !p.is_empty()) {
        parts.push(prefix.to_string());
    }
    let body = name.trim();
    let body = if format.replace_spaces {
        body.split_whitespace()
            .collect::<Vec<_>>()
            .join(&format.replacement_char.to_string())
    } else {
        body.to_string()
    };
    parts.push(body);
    if let Some(suffix) = format.suffix.as_deref().filter(|s| !s.is_empty()) {
        parts.push(suffix.to_string());
    }

    let key = parts.join(&format.part_delimiter);
    if format.all_upper {
        key.to_uppercase()
    } else {
        key
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    pub key: String,
    pub label: String,
    pub command: Command,
    /// Keyboard or mouse inputs that trigger the same command, e.g. `"n"` or `"Right"`.
    pub aliases: Vec<String>,
}

/// All controls known to a front end, keyed by their unique key.
#[derive(Debug, Clone, Default)]
pub struct ControlRegistry {
    controls: BTreeMap<String, Control>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a control. Keys and aliases must not collide with anything already registered.
    pub fn register(&mut self, control: Control) -> Result<()> {
        if self.controls.contains_key(&control.key) {
            bail!("Control key {} is already registered", control.key);
        }
        if let Some(alias) = control
            .aliases
            .iter()
            .find(|alias| self.resolve(alias).is_some())
        {
            bail!("Alias {} of {} is already taken", alias, control.key);
        }
        tracing::debug!("Registered control {}", control.key);
        self.controls.insert(control.key.clone(), control);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Control> {
        self.controls.get(key)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.values()
    }

    /// Finds the control for a key, or for an alias (aliases match case-insensitively).
    pub fn resolve(&self, input: &str) -> Option<&Control> {
        self.controls.get(input).or_else(|| {
            self.controls
                .values()
                .find(|c| c.aliases.iter().any(|a| a.eq_ignore_ascii_case(input)))
        })
    }

    /// Maps a front-end input to the command it triggers.
    pub fn handle_event(&self, input: &str) -> Option<Command> {
        let command = self.resolve(input.trim()).map(|control| control.command);
        if command.is_none() {
            tracing::debug!("No control bound to {:?}", input);
        }
        command
    }
}

/// The controls of the main browsing view.
#[derive(Debug, Clone)]
pub struct MainBlueprint {
    format: KeyFormat,
    built: bool,
}

const MAIN_CONTROLS: &[(&str, &str, Command, &[&str])] = &[
    ("next image", "Next", Command::NextImage, &["n", "Right", "ScrollDown"]),
    ("previous image", "Previous", Command::PreviousImage, &["p", "Left", "ScrollUp"]),
    ("remove image", "Remove", Command::RemoveCurrent, &["r", "Delete"]),
    ("backup image", "Backup", Command::BackupCurrent, &["b"]),
    ("open image", "Open", Command::OpenCurrent, &["o", "DoubleClick"]),
    ("cancel scan", "Cancel scan", Command::CancelScan, &["c", "Escape"]),
    ("rescan directory", "Rescan", Command::Rescan, &["s", "F5"]),
    ("quit", "Quit", Command::Quit, &["q"]),
];

impl MainBlueprint {
    pub fn new(format: KeyFormat) -> Self {
        Self {
            format,
            built: false,
        }
    }

    /// Registers every control of the view. Building twice is a no-op.
    pub fn build(&mut self, registry: &mut ControlRegistry) -> Result<()> {
        if self.built {
            return Ok(());
        }
        for (name, label, command, aliases) in MAIN_CONTROLS {
            registry.register(Control {
                key: format_key(name, &self.format),
                label: (*label).to_string(),
                command: *command,
                aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
            })?;
        }
        self.built = true;
        Ok(())
    }

    pub fn create(format: KeyFormat, registry: &mut ControlRegistry) -> Result<Self> {
        let mut blueprint = Self::new(format);
        blueprint.build(registry)?;
        Ok(blueprint)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The key this blueprint gives the control called `name`.
    pub fn key_for(&self, name: &str) -> String {
        format_key(name, &self.format)
    }
}
