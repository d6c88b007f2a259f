//! Market Feed Adapters
//!
//! Implements the client side of the market's new-listing feed:
//!
//! - **Token**: HTTP exchange of the API key for a session token
//! - **Session**: WebSocket dial, authentication and subscription
//! - **Codec**: Two-pass JSON decoding of listing frames
//! - **Heartbeat**: Read loop with a fixed keep-alive ticker
//! - **Reconnect**: Fixed-delay retry with a bounded budget

pub mod codec;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod token;

pub use codec::{CodecError, DecodedFrame, LISTING_TARGET, ListingCodec};
pub use heartbeat::{HeartbeatConfig, HeartbeatManager, HeartbeatState, PING_FRAME};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use session::{
    FeedReader, FeedSession, FeedWriter, FrameSink, FrameStream, SessionError, Stage, WsConnector,
};
pub use token::{TokenClient, TokenError, TokenResponse, parse_token_response};
