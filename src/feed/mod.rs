// Streaming price channel lifecycle
pub mod manager;
pub mod state;

pub use manager::{parse_frame, FeedManager};
pub use state::{step, ChannelEvent, ChannelState};
