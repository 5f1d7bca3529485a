pub mod feed;
pub mod item;
pub mod manifest;

pub use feed::CachedFeed;
pub use item::{ExtraValue, Item, RawFeed, RawItem};
pub use manifest::{Manifest, ManifestEntry, ManifestState};
