use crate::card::{CardFamily, Hand, MoveToken, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// 对局的回合上限，回合计数超过此值时对局结束
pub const ROUND_LIMIT: u32 = 10;
/// 回合计数的初始值
pub const INITIAL_ROUND: u32 = 1;
/// 允许换牌的回合
pub const REDRAW_ROUND: u32 = 5;

const SESSION_ID_LEN: usize = 10;

/// 对局中的座位，创建者总是 player1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerId {
    Player1,
    Player2,
}

/// 对局标识，一个较短的随机字符串
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

/// 出牌顺序
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnMode {
    /// 双方各自出牌，两张牌都到齐后结算
    #[default]
    Simultaneous,
    /// 双方轮流出牌，player1 先手
    Alternating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub family: CardFamily,
    pub mode: TurnMode,
    pub round_limit: u32,
    pub initial_round: u32,
    pub redraw_round: u32,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: PlayerId,
    pub name: Option<String>,
    pub hand: Hand,
    pub score: u32,
    pub redraw_used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// 只有创建者，等待对手加入
    AwaitingJoin,
    /// 双方就位，本回合还没有人出牌
    Active,
    /// 同时出牌模式下，已收到一方的牌
    RoundPending,
    /// 轮流出牌模式下，先手已出牌，等待后手
    WaitingOnOpponentTurn,
    Concluded,
}

/// 一回合双方的出牌
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundMoves {
    pub player1: MoveToken,
    pub player2: MoveToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub player1: u32,
    pub player2: u32,
}

/// 已结算回合的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub round: u32,
    pub moves: RoundMoves,
    pub winner: Verdict,
}

/// 两名玩家之间的一场对局
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub config: SessionConfig,
    pub phase: SessionPhase,
    pub round: u32,
    // 下标 0 永远是 player1
    pub players: Vec<Participant>,
    // 本回合已提交、尚未结算的出牌，结算后清空
    pub pending: BTreeMap<PlayerId, MoveToken>,
    // 仅轮流模式使用
    pub current_turn: Option<PlayerId>,
    pub history: Vec<RoundRecord>,
}

// --- 实现方法 ---

impl PlayerId {
    pub const ALL: [PlayerId; 2] = [PlayerId::Player1, PlayerId::Player2];

    pub fn opponent(self) -> PlayerId {
        match self {
            PlayerId::Player1 => PlayerId::Player2,
            PlayerId::Player2 => PlayerId::Player1,
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PlayerId::Player1 => "player1",
            PlayerId::Player2 => "player2",
        })
    }
}

impl SessionId {
    /// 生成一个新的随机标识。不保证唯一，由注册表负责避开已存在的标识。
    pub fn generate() -> SessionId {
        let mut raw = Uuid::new_v4().simple().to_string();
        raw.truncate(SESSION_ID_LEN);
        SessionId(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId(value)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            family: CardFamily::Simple,
            mode: TurnMode::Simultaneous,
            round_limit: ROUND_LIMIT,
            initial_round: INITIAL_ROUND,
            redraw_round: REDRAW_ROUND,
        }
    }
}

impl SessionConfig {
    pub fn new(family: CardFamily, mode: TurnMode) -> Self {
        SessionConfig { family, mode, ..Default::default() }
    }
}

impl Participant {
    pub fn new(id: PlayerId, name: Option<String>) -> Self {
        Participant {
            id,
            name,
            hand: Hand::default(),
            score: 0,
            redraw_used: false,
        }
    }
}

impl Session {
    /// 创建对局，创建者作为 player1 等待对手加入
    pub fn new(id: SessionId, config: SessionConfig, host_name: Option<String>) -> Self {
        Session {
            id,
            config,
            phase: SessionPhase::AwaitingJoin,
            round: config.initial_round,
            players: vec![Participant::new(PlayerId::Player1, host_name)],
            pending: BTreeMap::new(),
            current_turn: None,
            history: Vec::new(),
        }
    }

    pub fn participant(&self, id: PlayerId) -> Option<&Participant> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn participant_mut(&mut self, id: PlayerId) -> Option<&mut Participant> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() == PlayerId::ALL.len()
    }

    pub fn is_concluded(&self) -> bool {
        self.phase == SessionPhase::Concluded
    }

    /// 对局是否处于可以出牌的状态
    pub fn is_in_play(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Active | SessionPhase::RoundPending | SessionPhase::WaitingOnOpponentTurn
        )
    }

    pub fn scores(&self) -> Scores {
        let score_of = |id| self.participant(id).map_or(0, |p| p.score);
        Scores {
            player1: score_of(PlayerId::Player1),
            player2: score_of(PlayerId::Player2),
        }
    }

    /// 按当前比分判定的最终胜者，比分相同为平局
    pub fn final_verdict(&self) -> Verdict {
        let scores = self.scores();
        match scores.player1.cmp(&scores.player2) {
            std::cmp::Ordering::Greater => Verdict::Player1,
            std::cmp::Ordering::Less => Verdict::Player2,
            std::cmp::Ordering::Equal => Verdict::Tie,
        }
    }
}
