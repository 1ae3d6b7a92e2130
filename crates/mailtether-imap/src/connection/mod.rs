//! Connection handling: configuration, TLS streams, framing, the
//! type-state client and IDLE.

mod client;
mod config;
mod framed;
mod idle;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::{FramedStream, MAX_LINE_LENGTH, MAX_LITERAL_SIZE};
pub use idle::{IdleEvent, IdleHandle};
pub use stream::ImapStream;
