use std::collections::HashMap;
use std::sync::Arc;

use card_duel_core::{PlayerId, ServerMessage, Session, SessionConfig, SessionId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// 用于向某个连接的 WebSocket 任务发送消息的通道
pub type Link = mpsc::UnboundedSender<ServerMessage>;

/// 一场对局，以及对局中每位玩家的网络连接
pub struct Room {
    pub id: SessionId,
    state: Mutex<RoomState>,
}

pub struct RoomState {
    pub session: Session,
    // 将 PlayerId 映射到具体的网络连接
    pub links: HashMap<PlayerId, Link>,
}

impl Room {
    fn new(session: Session, host_link: Link) -> Self {
        Room {
            id: session.id.clone(),
            state: Mutex::new(RoomState {
                session,
                links: HashMap::from([(PlayerId::Player1, host_link)]),
            }),
        }
    }

    /// 对局的所有读写都在这把锁内完成，同一对局的消息因此是串行处理的
    pub fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock()
    }
}

/// 对局注册表，唯一负责对局的创建与销毁
pub trait SessionStore: Send + Sync {
    /// 创建一场新对局，创建者坐在 player1。返回的标识不会与现存对局重复。
    fn create(&self, config: SessionConfig, host_name: Option<String>, host_link: Link) -> Arc<Room>;

    fn get(&self, id: &SessionId) -> Option<Arc<Room>>;

    fn remove(&self, id: &SessionId) -> Option<Arc<Room>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 基于 DashMap 的内存注册表
#[derive(Default)]
pub struct MemoryStore {
    rooms: DashMap<SessionId, Arc<Room>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn create(&self, config: SessionConfig, host_name: Option<String>, host_link: Link) -> Arc<Room> {
        loop {
            let id = SessionId::generate();
            if let Entry::Vacant(slot) = self.rooms.entry(id.clone()) {
                let room = Arc::new(Room::new(Session::new(id, config, host_name), host_link));
                slot.insert(room.clone());
                return room;
            }
        }
    }

    fn get(&self, id: &SessionId) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|r| r.clone())
    }

    fn remove(&self, id: &SessionId) -> Option<Arc<Room>> {
        self.rooms.remove(id).map(|(_, room)| room)
    }

    fn len(&self) -> usize {
        self.rooms.len()
    }
}
