//! Script replay against a live cache.
//!
//! Script format, one command per line:
//!
//! ```text
//! # comment
//! put <key> <value...>   value is the rest of the line
//! get <key>
//! sleep <ms>
//! sweep                  run one idle-sweep pass now
//! ```

use std::time::Duration;

use anyhow::{Result, bail};
use memocache_core::lru_cache::{CacheStats, CacheStore, LruCache};
use serde::Serialize;

/// One parsed script command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Put { key: String, value: String },
    Get { key: String },
    Sleep(Duration),
    Sweep,
}

/// Observable result of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Outcome {
    Hit { key: String, value: String },
    Miss { key: String },
    Swept { evicted: usize },
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit { key, value } => write!(f, "hit {key} {value}"),
            Self::Miss { key } => write!(f, "miss {key}"),
            Self::Swept { evicted } => write!(f, "swept {evicted}"),
        }
    }
}

/// Everything a replay observed, in script order.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub capacity: usize,
    pub idle_ttl_ms: u64,
    pub len: usize,
    pub outcomes: Vec<Outcome>,
    /// Keys from most- to least-recently used at the end of the run.
    pub keys_mru: Vec<String>,
    pub stats: CacheStats,
}

impl ReplayReport {
    /// Plain-text rendering: one line per outcome, then a summary.
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            out.push_str(&outcome.to_string());
            out.push('\n');
        }
        let s = &self.stats;
        out.push_str(&format!(
            "len {}/{} hits {} misses {} insertions {} updates {} evictions {} expirations {}\n",
            self.len,
            self.capacity,
            s.hits,
            s.misses,
            s.insertions,
            s.updates,
            s.evictions,
            s.expirations
        ));
        out
    }
}

/// Parse a replay script. Errors name the 1-based line.
pub fn parse_script(source: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (n, raw) in source.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let step = match cmd {
            "put" => {
                let Some((key, value)) = rest.split_once(char::is_whitespace) else {
                    bail!("line {line_no}: put needs a key and a value");
                };
                Step::Put {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                }
            }
            "get" => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    bail!("line {line_no}: get takes exactly one key");
                }
                Step::Get {
                    key: rest.to_string(),
                }
            }
            "sleep" => match rest.parse::<u64>() {
                Ok(ms) => Step::Sleep(Duration::from_millis(ms)),
                Err(_) => bail!("line {line_no}: sleep needs milliseconds, got {rest:?}"),
            },
            "sweep" if rest.is_empty() => Step::Sweep,
            other => bail!("line {line_no}: unknown command {other:?}"),
        };
        steps.push(step);
    }
    Ok(steps)
}

/// Apply a put or get through the store seam. Other steps return `None`.
pub fn apply<S>(store: &S, step: &Step) -> Option<Outcome>
where
    S: CacheStore<String, String> + ?Sized,
{
    match step {
        Step::Put { key, value } => {
            store.add_or_update(key.clone(), value.clone());
            None
        }
        Step::Get { key } => Some(match store.try_get_value(key) {
            Some(value) => Outcome::Hit {
                key: key.clone(),
                value,
            },
            None => Outcome::Miss { key: key.clone() },
        }),
        Step::Sleep(_) | Step::Sweep => None,
    }
}

/// Run `steps` in order. Sleeps yield to the runtime so a background
/// sweeper keeps ticking.
pub async fn run_steps(cache: &LruCache<String, String>, steps: &[Step]) -> ReplayReport {
    let mut outcomes = Vec::new();
    for step in steps {
        match step {
            Step::Sleep(d) => tokio::time::sleep(*d).await,
            Step::Sweep => outcomes.push(Outcome::Swept {
                evicted: cache.purge_idle(),
            }),
            _ => outcomes.extend(apply(cache, step)),
        }
    }

    ReplayReport {
        capacity: cache.capacity(),
        idle_ttl_ms: cache.idle_ttl().map_or(0, |ttl| ttl.as_millis() as u64),
        len: cache.len(),
        outcomes,
        keys_mru: cache.keys_mru(),
        stats: cache.stats(),
    }
}
