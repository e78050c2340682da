use crate::state::PlayerId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// --- 核心数据结构定义 ---

/// 一局手牌的固定总数（基础牌组）
pub const HAND_SIZE: u32 = 15;

/// 基础手势 (Shape)
/// 石头克剪刀，剪刀克布，布克石头
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Rock,
    Paper,
    Scissors,
}

/// 卡牌等级 (Tier)，仅分级牌组使用
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Regular,
    Upgraded,
}

/// 牌组类型
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardFamily {
    /// rock / paper / scissors
    #[default]
    Simple,
    /// regular-* / upgraded-* / joker
    Tiered,
}

/// 一张可以打出的牌 (MoveToken)
///
/// 线上格式为小写字符串：`rock`、`regular-paper`、`upgraded-scissors`、`joker`。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MoveToken {
    /// 基础牌组中的牌
    Plain(Shape),
    /// 分级牌组中带等级的牌
    Tiered(Tier, Shape),
    /// 分级牌组中唯一的小丑牌，没有手势
    Joker,
}

/// 一回合的裁决结果
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Player1,
    Player2,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无法识别的牌: {0:?}")]
pub struct ParseTokenError(pub String);

// --- 实现辅助功能 ---

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::Rock, Shape::Paper, Shape::Scissors];

    /// 该手势能击败的手势
    pub fn beats(self) -> Shape {
        match self {
            Shape::Rock => Shape::Scissors,
            Shape::Scissors => Shape::Paper,
            Shape::Paper => Shape::Rock,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Shape::Rock => "rock",
            Shape::Paper => "paper",
            Shape::Scissors => "scissors",
        }
    }
}

impl Tier {
    fn as_str(self) -> &'static str {
        match self {
            Tier::Regular => "regular",
            Tier::Upgraded => "upgraded",
        }
    }
}

impl MoveToken {
    /// 手势部分，小丑牌没有手势
    pub fn shape(self) -> Option<Shape> {
        match self {
            MoveToken::Plain(shape) | MoveToken::Tiered(_, shape) => Some(shape),
            MoveToken::Joker => None,
        }
    }

    pub fn family(self) -> CardFamily {
        match self {
            MoveToken::Plain(_) => CardFamily::Simple,
            MoveToken::Tiered(..) | MoveToken::Joker => CardFamily::Tiered,
        }
    }
}

impl Verdict {
    /// 获胜的玩家，平局返回 None
    pub fn winner(self) -> Option<PlayerId> {
        match self {
            Verdict::Player1 => Some(PlayerId::Player1),
            Verdict::Player2 => Some(PlayerId::Player2),
            Verdict::Tie => None,
        }
    }

    /// 交换双方位置后的结果
    pub fn swapped(self) -> Verdict {
        match self {
            Verdict::Player1 => Verdict::Player2,
            Verdict::Player2 => Verdict::Player1,
            Verdict::Tie => Verdict::Tie,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MoveToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MoveToken::Plain(shape) => write!(f, "{}", shape),
            MoveToken::Tiered(tier, shape) => write!(f, "{}-{}", tier.as_str(), shape),
            MoveToken::Joker => f.write_str("joker"),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Verdict::Player1 => "player1",
            Verdict::Player2 => "player2",
            Verdict::Tie => "tie",
        })
    }
}

impl FromStr for Shape {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shape::ALL
            .into_iter()
            .find(|shape| shape.as_str() == s)
            .ok_or_else(|| ParseTokenError(s.to_string()))
    }
}

impl FromStr for MoveToken {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "joker" {
            return Ok(MoveToken::Joker);
        }
        let tiered = match s.split_once('-') {
            None => return Ok(MoveToken::Plain(s.parse()?)),
            Some(parts) => parts,
        };
        let tier = match tiered.0 {
            "regular" => Tier::Regular,
            "upgraded" => Tier::Upgraded,
            _ => return Err(ParseTokenError(s.to_string())),
        };
        let shape = tiered.1.parse().map_err(|_| ParseTokenError(s.to_string()))?;
        Ok(MoveToken::Tiered(tier, shape))
    }
}

impl TryFrom<String> for MoveToken {
    type Error = ParseTokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MoveToken> for String {
    fn from(token: MoveToken) -> Self {
        token.to_string()
    }
}

// --- 胜负裁决 ---

/// 裁决一回合：`first` 是 player1 的牌，`second` 是 player2 的牌。
///
/// 分级牌组的规则按以下顺序匹配，先匹配者生效：
/// 1. 相同的牌为平局
/// 2. 小丑牌击败任意升级牌
/// 3. 任意普通牌击败小丑牌
/// 4. 同手势时升级牌击败普通牌
/// 5. 其余情况只比较手势（忽略等级）
///
/// 基础牌组的牌视为普通等级。
pub fn resolve(first: MoveToken, second: MoveToken) -> Verdict {
    use MoveToken::{Joker, Plain, Tiered};

    match (first, second) {
        _ if first == second => Verdict::Tie,
        (Joker, Tiered(Tier::Upgraded, _)) => Verdict::Player1,
        (Tiered(Tier::Upgraded, _), Joker) => Verdict::Player2,
        (Joker, _) => Verdict::Player2,
        (_, Joker) => Verdict::Player1,
        (Tiered(Tier::Upgraded, a), Tiered(Tier::Regular, b)) if a == b => Verdict::Player1,
        (Tiered(Tier::Regular, a), Tiered(Tier::Upgraded, b)) if a == b => Verdict::Player2,
        (Plain(a) | Tiered(_, a), Plain(b) | Tiered(_, b)) => compare_shapes(a, b),
    }
}

fn compare_shapes(a: Shape, b: Shape) -> Verdict {
    if a == b {
        Verdict::Tie
    } else if a.beats() == b {
        Verdict::Player1
    } else {
        Verdict::Player2
    }
}

// --- 手牌 ---

/// 玩家手牌：每种牌的剩余数量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hand {
    cards: BTreeMap<MoveToken, u32>,
}

impl Hand {
    pub fn from_counts(counts: impl IntoIterator<Item = (MoveToken, u32)>) -> Hand {
        Hand { cards: counts.into_iter().collect() }
    }

    pub fn count(&self, token: MoveToken) -> u32 {
        self.cards.get(&token).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.cards.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// 打出一张牌。数量不足时返回 false，手牌不变。
    pub fn take(&mut self, token: MoveToken) -> bool {
        match self.cards.get_mut(&token) {
            Some(count) if *count >= 1 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MoveToken, u32)> + '_ {
        self.cards.iter().map(|(token, count)| (*token, *count))
    }
}

// --- 随机发牌 ---

/// 为基础牌组发一手新牌
pub fn allocate() -> Hand {
    allocate_with(&mut rand::rng())
}

/// 按 rock -> paper -> scissors 的顺序依次分配 `HAND_SIZE` 张牌。
/// 除最后一类外，每类从 `[1, 剩余 - 之后的类别数]` 中均匀抽取，
/// 最后一类拿走剩下的全部，保证每类至少一张且总数恰好为 `HAND_SIZE`。
pub fn allocate_with<R: Rng>(rng: &mut R) -> Hand {
    let mut remaining = HAND_SIZE;
    let mut hand = Hand::default();

    for (idx, shape) in Shape::ALL.into_iter().enumerate() {
        let categories_left = (Shape::ALL.len() - idx - 1) as u32;
        let count = if categories_left == 0 {
            remaining
        } else {
            rng.random_range(1..=remaining - categories_left)
        };
        hand.cards.insert(MoveToken::Plain(shape), count);
        remaining -= count;
    }

    hand
}

/// 分级牌组的固定手牌：普通牌各 3 张，升级牌各 1 张，小丑牌 1 张
pub fn allocate_tiered() -> Hand {
    let mut hand = Hand::default();
    for shape in Shape::ALL {
        hand.cards.insert(MoveToken::Tiered(Tier::Regular, shape), 3);
        hand.cards.insert(MoveToken::Tiered(Tier::Upgraded, shape), 1);
    }
    hand.cards.insert(MoveToken::Joker, 1);
    hand
}

pub fn allocate_for(family: CardFamily) -> Hand {
    match family {
        CardFamily::Simple => allocate(),
        CardFamily::Tiered => allocate_tiered(),
    }
}

// --- 单元测试 ---
