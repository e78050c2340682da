use crate::card::{CardFamily, Hand, MoveToken, Verdict};
use crate::state::{PlayerId, RoundMoves, RoundRecord, Scores, SessionId, TurnMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- 客户端 -> 服务器 的消息 ---
// 每一帧是一个带 `type` 字段的 JSON 对象，字段名使用 camelCase。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// 创建一场新对局，创建者成为 player1
    CreateGame {
        #[serde(default)]
        player_name: Option<String>,
        #[serde(default)]
        family: CardFamily,
        #[serde(default)]
        mode: TurnMode,
    },
    /// 以 player2 的身份加入已有对局
    JoinGame {
        game_id: SessionId,
        #[serde(default)]
        player_name: Option<String>,
    },
    /// 打出一张牌
    MakeMove {
        game_id: SessionId,
        #[serde(rename = "move")]
        token: MoveToken,
    },
    /// 在换牌回合请求换一手新牌（仅基础牌组）
    RequestRedraw { game_id: SessionId },
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// 对局创建成功，只发给创建者
    GameCreated {
        game_id: SessionId,
        player_id: PlayerId,
        family: CardFamily,
        mode: TurnMode,
    },
    /// 对手已就位，对局开始。每位玩家收到的内容不同。
    GameStarted {
        game_id: SessionId,
        player_id: PlayerId,
        opponent_name: Option<String>,
        current_turn: Option<PlayerId>,
        hand: Hand,
        round: u32,
        round_limit: u32,
    },
    /// 轮流模式：轮到你出牌
    YourTurn { round: u32 },
    /// 轮流模式：等待对手出牌
    WaitTurn { round: u32 },
    /// 出牌已被接受，附带剩余手牌
    MoveMade {
        #[serde(rename = "move")]
        token: MoveToken,
        hand: Hand,
    },
    /// 同时出牌模式：对手已出牌，等待你出牌
    WaitingForMove,
    /// 一回合结算完成
    RoundComplete {
        round: u32,
        moves: RoundMoves,
        winner: Verdict,
        scores: Scores,
    },
    /// 本回合可以换牌
    RedrawAvailable { round: u32 },
    RedrawComplete { hand: Hand },
    /// 对局结束
    GameOver {
        winner: Verdict,
        scores: Scores,
        history: Vec<RoundRecord>,
    },
    /// 对手断开连接，对局终止
    PlayerDisconnected,
    /// 只发给出错的玩家
    Error { message: String },
}

/// 消息的接收方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Player(PlayerId),
    Everyone,
}

/// 对局产生的一条待发送消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Dispatch {
    pub fn to(player: PlayerId, message: ServerMessage) -> Self {
        Dispatch { audience: Audience::Player(player), message }
    }

    pub fn everyone(message: ServerMessage) -> Self {
        Dispatch { audience: Audience::Everyone, message }
    }

    pub fn reaches(&self, player: PlayerId) -> bool {
        match self.audience {
            Audience::Player(target) => target == player,
            Audience::Everyone => true,
        }
    }
}

/// 被拒绝的操作，拒绝时对局状态不变
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("对局尚未开始")]
    NotActive,
    #[error("对局已经结束")]
    Concluded,
    #[error("对局人数已满")]
    SessionFull,
    #[error("你不是该对局的玩家")]
    NotParticipant,
    #[error("还没轮到你出牌")]
    NotYourTurn,
    #[error("本回合你已经出过牌了")]
    AlreadyMoved,
    #[error("手里没有可用的 {0}")]
    CardUnavailable(MoveToken),
    #[error("{0} 不属于本局使用的牌组")]
    WrongFamily(MoveToken),
    #[error("现在不能换牌")]
    RedrawUnavailable,
}

impl From<Rejection> for ServerMessage {
    fn from(rejection: Rejection) -> Self {
        ServerMessage::Error { message: rejection.to_string() }
    }
}
