//! Item metadata decoration
//!
//! Tags every item with the version of this crate and the identifier of
//! the job that produced it. The stage is a plain `map` over the backend
//! stream: one item in, one item out, nothing buffered.

use crate::backend::BackendResult;
use crate::item::{Item, JOB_ID_FIELD, VERSION_FIELD};
use crate::VERSION;
use futures_util::{Stream, StreamExt};

/// Add job metadata to every item of `stream`
///
/// Errors pass through untouched.
pub fn decorate<S>(stream: S, job_id: &str) -> impl Stream<Item = BackendResult<Item>> + Send
where
    S: Stream<Item = BackendResult<Item>> + Send,
{
    let job_id = job_id.to_string();
    stream.map(move |result| {
        result.map(|mut item| {
            item.insert(VERSION_FIELD, VERSION);
            item.insert(JOB_ID_FIELD, job_id.as_str());
            item
        })
    })
}
