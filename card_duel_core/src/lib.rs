//! # 石头剪刀布卡牌对战核心逻辑库
//!
//! 这个 `core` crate 包含了对战的所有核心状态管理、
//! 出牌裁决、发牌逻辑以及客户端-服务器通信消息的定义。
//! 它不做任何网络或异步 I/O，
//! 可以被任何上层应用（服务器、终端客户端）复用。

mod card;
mod logic;
mod message;
mod state;

pub use card::*;

pub use message::*;

pub use state::*;
