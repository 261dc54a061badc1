pub mod matcher;
pub mod youtube;

pub use matcher::{VideoCache, VideoMatcher};
pub use youtube::{VideoSearch, YoutubeClient};
