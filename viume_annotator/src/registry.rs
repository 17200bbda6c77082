use crate::color::{DrawColor, UnknownColor};
use std::{
    borrow::Cow,
    collections::{btree_map, BTreeMap},
    fs::File,
    io::{self, BufRead},
    path::Path,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read labels file: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid line format at line {line_number}: {line}")]
    InvalidLine { line_number: usize, line: String },
    #[error("Invalid class id at line {line_number}: {value}")]
    InvalidClassId { line_number: usize, value: String },
    #[error("Invalid color at line {line_number}: {source}")]
    InvalidColor {
        line_number: usize,
        source: UnknownColor,
    },
    #[error("Class id {0} is defined more than once")]
    DuplicateClass(u32),
    #[error("Labels file does not define any class")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub display_name: String,
    pub color: DrawColor,
}

impl ClassInfo {
    pub fn new(display_name: impl Into<String>, color: DrawColor) -> Self {
        Self {
            display_name: display_name.into(),
            color,
        }
    }

    /// Entry used for ids that are not registered.
    pub fn unknown(class_id: u32) -> Self {
        Self::new(format!("Unknown Class {}", class_id), DrawColor::White)
    }
}

/// Static mapping from class id to display name and draw color.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRegistry {
    classes: BTreeMap<u32, ClassInfo>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The six cervical cytology classes the screening model was trained on.
    pub fn cervical_cells() -> Self {
        [
            (0, "ASC-H", DrawColor::Red),
            (1, "ASCH-US", DrawColor::Yellow),
            (2, "HSIL", DrawColor::Purple),
            (3, "LSIL", DrawColor::Green),
            (4, "Normal", DrawColor::Blue),
            (5, "SCC", DrawColor::Pink),
        ]
        .into_iter()
        .map(|(id, name, color)| (id, ClassInfo::new(name, color)))
        .collect()
    }

    /// Loads `id,name,color` lines. Blank lines and `#` comments are skipped.
    pub fn from_labels_file(path: &Path) -> Result<Self, RegistryError> {
        let file = File::open(path)?;
        Self::from_reader(io::BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line_number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
            if parts.len() != 3 || parts[1].is_empty() {
                return Err(RegistryError::InvalidLine { line_number, line });
            }

            let class_id: u32 = parts[0]
                .parse()
                .map_err(|_| RegistryError::InvalidClassId {
                    line_number,
                    value: parts[0].to_string(),
                })?;
            let color: DrawColor = parts[2]
                .parse()
                .map_err(|source| RegistryError::InvalidColor {
                    line_number,
                    source,
                })?;

            if registry
                .insert(class_id, ClassInfo::new(parts[1], color))
                .is_some()
            {
                return Err(RegistryError::DuplicateClass(class_id));
            }
        }

        if registry.is_empty() {
            return Err(RegistryError::Empty);
        }

        tracing::debug!("Loaded {} class labels", registry.len());
        Ok(registry)
    }

    pub fn insert(&mut self, class_id: u32, info: ClassInfo) -> Option<ClassInfo> {
        self.classes.insert(class_id, info)
    }

    pub fn get(&self, class_id: u32) -> Option<&ClassInfo> {
        self.classes.get(&class_id)
    }

    pub fn contains(&self, class_id: u32) -> bool {
        self.classes.contains_key(&class_id)
    }

    /// Registered entry, or the synthesized `Unknown Class {id}` entry in white.
    pub fn resolve(&self, class_id: u32) -> Cow<'_, ClassInfo> {
        match self.classes.get(&class_id) {
            Some(info) => Cow::Borrowed(info),
            None => Cow::Owned(ClassInfo::unknown(class_id)),
        }
    }

    pub fn class_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.classes.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, u32, ClassInfo> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl FromIterator<(u32, ClassInfo)> for ClassRegistry {
    fn from_iter<I: IntoIterator<Item = (u32, ClassInfo)>>(iter: I) -> Self {
        Self {
            classes: iter.into_iter().collect(),
        }
    }
}
