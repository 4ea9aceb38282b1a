use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: expected <track id>\\t<genre>")]
    MalformedLine { line: usize },
}

/// Ground-truth genres keyed by track id, in file order.
#[derive(Debug, Default, Clone)]
pub struct LabelTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl LabelTable {
    /// Load a tab-separated label file (`#` lines are comments).
    pub fn load(path: &Path) -> Result<Self, LabelTableError> {
        let file = std::fs::File::open(path)?;
        let table = Self::parse(std::io::BufReader::new(file))?;
        log::info!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self, LabelTableError> {
        let mut table = Self::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let (track_id, genre) = match (fields.next(), fields.next()) {
                (Some(id), Some(genre)) if !id.trim().is_empty() && !genre.trim().is_empty() => {
                    (id.trim(), genre.trim())
                }
                _ => return Err(LabelTableError::MalformedLine { line: i + 1 }),
            };
            table.insert(track_id, genre);
        }

        Ok(table)
    }

    fn insert(&mut self, track_id: &str, genre: &str) {
        if self.index.contains_key(track_id) {
            log::warn!("Duplicate track id {track_id}, keeping first label");
            return;
        }
        self.index.insert(track_id.to_string(), self.entries.len());
        self.entries.push((track_id.to_string(), genre.to_string()));
    }

    pub fn genre(&self, track_id: &str) -> Option<&str> {
        self.index.get(track_id).map(|&i| self.entries[i].1.as_str())
    }

    /// (track id, genre) pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, g)| (id.as_str(), g.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut table = Self::default();
        for (id, genre) in iter {
            table.insert(id, genre);
        }
        table
    }
}
