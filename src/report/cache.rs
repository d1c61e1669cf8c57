use log::debug;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use survey_scoring::ResponseTable;

use crate::report::BReportResult;

/// How long a loaded table stays valid by default.
pub const DEFAULT_TTL: Duration = Duration::from_secs(180);

/// Loaded tables, kept for a bounded time.
///
/// A table is reloaded once it is older than the time to live, or after it
/// has been invalidated.
pub struct TableCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, Rc<ResponseTable>)>,
}

impl TableCache {
    pub fn new(ttl: Duration) -> TableCache {
        TableCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached table for the key, or loads it.
    ///
    /// Loading errors are returned as is and nothing is cached.
    pub fn get_or_load<F>(&mut self, key: &str, load: F) -> BReportResult<Rc<ResponseTable>>
    where
        F: FnOnce() -> BReportResult<ResponseTable>,
    {
        if let Some((loaded_at, table)) = self.entries.get(key) {
            if loaded_at.elapsed() < self.ttl {
                debug!("get_or_load: cache hit for {:?}", key);
                return Ok(table.clone());
            }
            debug!("get_or_load: expired entry for {:?}", key);
        }
        let table = Rc::new(load()?);
        self.entries
            .insert(key.to_string(), (Instant::now(), table.clone()));
        Ok(table)
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for TableCache {
    fn default() -> Self {
        TableCache::new(DEFAULT_TTL)
    }
}
