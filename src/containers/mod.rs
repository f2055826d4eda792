//! General-purpose containers the upper layers rely on (spec §4.1, §4.2).
//!
//! Both containers are specified only to the extent the schedulers depend
//! on their contracts, so neither reaches for the standard library's
//! `Vec`/`HashMap` semantics wholesale: [`DynamicSequence`] keeps explicit
//! null slots so a bucket can clear a member without shifting every other
//! member's index (spec §4.5's `remove`), and [`ChainedMap`] preserves
//! chain order and allows duplicate keys the way `sombra`'s own
//! hand-rolled containers (e.g. `storage::index::chunked`) favor explicit
//! control over layout when the contract calls for it.

mod chained_map;
mod sequence;

pub use chained_map::ChainedMap;
pub use sequence::DynamicSequence;
