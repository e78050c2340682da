//! 卡牌对战服务器：对局注册表、连接路由以及 WebSocket 传输层。

pub mod config;
pub mod registry;
pub mod router;
pub mod transport;

pub use config::ServerConfig;
pub use registry::{Link, MemoryStore, Room, SessionStore};
pub use router::{ConnectionContext, ConnectionRouter};
pub use transport::{app, serve};
