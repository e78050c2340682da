use std::collections::HashMap;
use std::sync::Arc;

use card_duel_core::{ClientMessage, Dispatch, PlayerId, Rejection, ServerMessage, Session, SessionConfig, SessionId};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::{Link, SessionStore};

/// 单个连接的上下文，在创建或加入对局后填充
pub struct ConnectionContext {
    /// 仅用于日志的连接标识
    pub id: Uuid,
    pub link: Link,
    pub seat: Option<(SessionId, PlayerId)>,
}

impl ConnectionContext {
    pub fn new(link: Link) -> Self {
        ConnectionContext { id: Uuid::new_v4(), link, seat: None }
    }
}

/// 把客户端消息翻译成对局操作，并把结果发给对局中的玩家
#[derive(Clone)]
pub struct ConnectionRouter {
    store: Arc<dyn SessionStore>,
}

impl ConnectionRouter {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        ConnectionRouter { store }
    }

    /// 核心消息处理逻辑
    pub fn handle(&self, ctx: &mut ConnectionContext, msg: ClientMessage) {
        match msg {
            ClientMessage::CreateGame { player_name, family, mode } => {
                self.release_stale_seat(ctx);
                if ctx.seat.is_some() {
                    debug!(connection = %ctx.id, "已在对局中，忽略创建请求");
                    return;
                }

                let room = self.store.create(SessionConfig::new(family, mode), player_name, ctx.link.clone());
                info!(connection = %ctx.id, game = %room.id, ?family, ?mode, "创建了新对局");
                ctx.seat = Some((room.id.clone(), PlayerId::Player1));
                send(ctx, ServerMessage::GameCreated {
                    game_id: room.id.clone(),
                    player_id: PlayerId::Player1,
                    family,
                    mode,
                });
            }
            ClientMessage::JoinGame { game_id, player_name } => {
                self.release_stale_seat(ctx);
                if ctx.seat.is_some() {
                    debug!(connection = %ctx.id, "已在对局中，忽略加入请求");
                    return;
                }
                let Some(room) = self.store.get(&game_id) else {
                    debug!(connection = %ctx.id, game = %game_id, "对局不存在");
                    return;
                };

                let mut state = room.lock();
                let dispatches = match state.session.join(player_name) {
                    Ok(dispatches) => dispatches,
                    Err(rejection) => {
                        debug!(connection = %ctx.id, game = %game_id, %rejection, "无法加入对局");
                        return;
                    }
                };
                state.links.insert(PlayerId::Player2, ctx.link.clone());
                info!(connection = %ctx.id, game = %game_id, "加入了对局");
                broadcast(&game_id, &state.links, &dispatches);
                ctx.seat = Some((game_id, PlayerId::Player2));
            }
            ClientMessage::MakeMove { game_id, token } => {
                self.act(ctx, &game_id, |session, player_id| {
                    debug!(game = %game_id, %player_id, %token, "出牌");
                    session.submit_move(player_id, token)
                });
            }
            ClientMessage::RequestRedraw { game_id } => {
                self.act(ctx, &game_id, |session, player_id| session.request_redraw(player_id));
            }
        }
    }

    /// 连接断开后的处理：结束对局、通知对手、从注册表中移除
    pub fn disconnect(&self, ctx: &mut ConnectionContext) {
        let Some((game_id, player_id)) = ctx.seat.take() else {
            return;
        };
        let Some(room) = self.store.get(&game_id) else {
            return;
        };

        info!(connection = %ctx.id, game = %game_id, %player_id, "玩家断开连接");
        {
            let mut state = room.lock();
            state.links.remove(&player_id);
            let dispatches = state.session.disconnect(player_id);
            broadcast(&game_id, &state.links, &dispatches);
        }
        self.store.remove(&game_id);
        info!(game = %game_id, "对局已移除");
    }

    /// 所在对局已结束或已被移除时，解除连接与它的绑定
    fn release_stale_seat(&self, ctx: &mut ConnectionContext) {
        let Some((game_id, _)) = &ctx.seat else {
            return;
        };
        let live = match self.store.get(game_id) {
            Some(room) => {
                let concluded = room.lock().session.is_concluded();
                !concluded
            }
            None => false,
        };
        if !live {
            debug!(connection = %ctx.id, game = %game_id, "所在对局已结束，解除绑定");
            ctx.seat = None;
        }
    }

    /// 在当前连接所属的对局上执行一个玩家操作。
    /// 连接不在该对局中时什么也不做；操作被拒绝时只通知发起者。
    fn act(
        &self,
        ctx: &ConnectionContext,
        game_id: &SessionId,
        op: impl FnOnce(&mut Session, PlayerId) -> Result<Vec<Dispatch>, Rejection>,
    ) {
        let Some((seat_game, player_id)) = &ctx.seat else {
            debug!(connection = %ctx.id, "请先加入或创建对局");
            return;
        };
        if seat_game != game_id {
            debug!(connection = %ctx.id, game = %game_id, "对局标识不匹配");
            return;
        }
        let Some(room) = self.store.get(game_id) else {
            return;
        };

        let concluded = {
            let mut state = room.lock();
            match op(&mut state.session, *player_id) {
                Ok(dispatches) => broadcast(game_id, &state.links, &dispatches),
                Err(rejection) => {
                    debug!(connection = %ctx.id, game = %game_id, %rejection, "操作被拒绝");
                    send(ctx, rejection.into());
                }
            }
            state.session.is_concluded()
        };

        if concluded {
            self.store.remove(game_id);
            info!(game = %game_id, "对局结束，已移除");
        }
    }
}

/// 把对局产生的消息发给对应的玩家
fn broadcast(game_id: &SessionId, links: &HashMap<PlayerId, Link>, dispatches: &[Dispatch]) {
    for dispatch in dispatches {
        for (player_id, link) in links {
            if dispatch.reaches(*player_id) && link.send(dispatch.message.clone()).is_err() {
                // 发送失败，说明该玩家已断开，后续由其自己的连接任务处理
                warn!(game = %game_id, %player_id, "向玩家发送消息失败（可能已断开）");
            }
        }
    }
}

fn send(ctx: &ConnectionContext, message: ServerMessage) {
    if ctx.link.send(message).is_err() {
        warn!(connection = %ctx.id, "向连接发送消息失败（可能已断开）");
    }
}
