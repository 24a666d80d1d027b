//! Process-wide registry of open store data.
//!
//! Connections to the same location share one `StoreData` behind a weak
//! reference. An in-memory store therefore lives exactly as long as at
//! least one connection to it is open, and a file store opened twice sees
//! a single image rather than two competing ones.

use crate::core::Result;
use crate::store::StoreData;
use crate::store::config::StoreLocation;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::debug;

lazy_static! {
    static ref OPEN_STORES: Mutex<HashMap<StoreLocation, Weak<RwLock<StoreData>>>> =
        Mutex::new(HashMap::new());
}

/// Attaches to the live instance for `location`, or initializes one with
/// `init` and registers it. Returns the shared data and whether an
/// existing instance was joined.
pub(crate) fn attach_or_init<F>(
    location: &StoreLocation,
    init: F,
) -> Result<(Arc<RwLock<StoreData>>, bool)>
where
    F: FnOnce() -> Result<StoreData>,
{
    let mut open = OPEN_STORES.lock()?;
    open.retain(|loc, weak| {
        let alive = weak.strong_count() > 0;
        if !alive {
            debug!(location = %loc, "evicting closed store from registry");
        }
        alive
    });

    if let Some(existing) = open.get(location).and_then(Weak::upgrade) {
        debug!(location = %location, "attached to open store");
        return Ok((existing, true));
    }

    let data = Arc::new(RwLock::new(init()?));
    open.insert(location.clone(), Arc::downgrade(&data));
    debug!(location = %location, "registered new store instance");
    Ok((data, false))
}
