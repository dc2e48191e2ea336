use tracing::{info, instrument};

use crate::refresh::{RefreshRequest, RefreshSink, Surface};
use crate::store::{Store, StoreValue, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyView {
    pub count: i64,
}

pub fn tally_view(store: &dyn Store) -> anyhow::Result<TallyView> {
    Ok(TallyView {
        count: store.int_or(keys::SEBHA_COUNT, 0)?,
    })
}

#[instrument(skip(store, refresh))]
pub fn increment(store: &dyn Store, refresh: &dyn RefreshSink) -> anyhow::Result<i64> {
    let count = store.int_or(keys::SEBHA_COUNT, 0)?.saturating_add(1);
    write_count(store, refresh, count)
}

#[instrument(skip(store, refresh))]
pub fn reset(store: &dyn Store, refresh: &dyn RefreshSink) -> anyhow::Result<i64> {
    write_count(store, refresh, 0)
}

fn write_count(store: &dyn Store, refresh: &dyn RefreshSink, count: i64) -> anyhow::Result<i64> {
    store.put(keys::SEBHA_COUNT, StoreValue::Int(count))?;
    info!(count, "updated tally");
    refresh.request(RefreshRequest::all(Surface::Tally))?;
    Ok(count)
}
