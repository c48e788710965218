pub(crate) mod event;
pub(crate) mod meta;
pub(crate) mod migrate;
#[cfg(feature = "server")]
pub(crate) mod serve;
pub(crate) mod show;
pub(crate) mod sync;
