// Trend history: a bounded FIFO of samples fed by GR: tokens, persisted as one number per line
use crate::error::ChartResult;
use crate::numeric::parse_float_lenient;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub const HISTORY_CAPACITY: usize = 128;
pub const DEFAULT_TREND_COLOR: &str = "g";

/// Where the history text blob lives between runs.
pub trait HistoryStore {
    fn load(&self) -> ChartResult<Option<String>>;
    fn save(&self, contents: &str) -> ChartResult<()>;
}

/// Get the default history file path
pub fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cmd-chart")
        .join("history.txt")
}

pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self) -> ChartResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn save(&self, contents: &str) -> ChartResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// In-memory store, used for one-shot parsing and tests.
#[derive(Default)]
pub struct MemoryHistoryStore {
    contents: RefCell<Option<String>>,
}

#[cfg(test)]
impl MemoryHistoryStore {
    pub fn with_contents(contents: &str) -> Self {
        Self {
            contents: RefCell::new(Some(contents.to_string())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> ChartResult<Option<String>> {
        Ok(self.contents.borrow().clone())
    }

    fn save(&self, contents: &str) -> ChartResult<()> {
        *self.contents.borrow_mut() = Some(contents.to_string());
        Ok(())
    }
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    pub samples: Vec<f64>,
    pub trend_color: String,
}

pub struct HistoryBuffer {
    samples: VecDeque<f64>,
    trend_color: String,
    store: Box<dyn HistoryStore>,
}

impl HistoryBuffer {
    /// Create an empty buffer without touching the store.
    pub fn new(store: Box<dyn HistoryStore>) -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
            trend_color: DEFAULT_TREND_COLOR.to_string(),
            store,
        }
    }

    /// Create a buffer primed from whatever the store holds. Unreadable stores start empty.
    pub fn load(store: Box<dyn HistoryStore>) -> Self {
        let mut buffer = Self::new(store);
        match buffer.store.load() {
            Ok(Some(contents)) => buffer.samples = decode(&contents),
            Ok(None) => {}
            Err(e) => warn!("Could not load trend history: {}", e),
        }
        debug!("Loaded {} history samples", buffer.samples.len());
        buffer
    }

    /// Push a sample, evicting the oldest past capacity, then write the whole buffer through.
    /// Non-finite samples are dropped.
    pub fn append(&mut self, value: f64) {
        if !value.is_finite() {
            debug!("Ignoring non-finite trend sample {}", value);
            return;
        }
        self.samples.push_back(value);
        while self.samples.len() > HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        if let Err(e) = self.store.save(&self.encode()) {
            warn!("Could not persist trend history: {}", e);
        }
    }

    pub fn set_trend_color(&mut self, token: &str) {
        self.trend_color = token.to_string();
    }

    /// Drop every sample and persist the empty buffer.
    pub fn clear(&mut self) -> ChartResult<()> {
        self.samples.clear();
        self.store.save("")
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            samples: self.samples.iter().copied().collect(),
            trend_color: self.trend_color.clone(),
        }
    }

    fn encode(&self) -> String {
        self.samples
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn decode(contents: &str) -> VecDeque<f64> {
    let values: Vec<f64> = contents
        .lines()
        .map(parse_float_lenient)
        .filter(|v| v.is_finite())
        .collect();
    let skip = values.len().saturating_sub(HISTORY_CAPACITY);
    values.into_iter().skip(skip).collect()
}
