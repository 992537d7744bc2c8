//! # Stages Module
//!
//! The three stages of the signing chain.
//!
//! 1. **Expand** - `light(item) ~ light(heavy(item))`, heavy calls serialized
//! 2. **Fanout** - six prefixed light digests per value, concatenated by index
//! 3. **Combine** - sort everything and join with `_`

mod combine;
mod expand;
mod fanout;

pub use combine::{combine, CombineStage, COMBINE_SEPARATOR};
pub use expand::{ExpandStage, EXPAND_SEPARATOR};
pub use fanout::{FanoutStage, FANOUT_WIDTH};
