use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use card_duel_core::{CardFamily, ClientMessage, MoveToken, ServerMessage, SessionId, TurnMode};

const DEFAULT_SERVER: &str = "ws://127.0.0.1:8080/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let url = Url::parse(&server)?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 当前所在的对局，用于补全出牌消息中的 gameId
    let game_id: Arc<Mutex<Option<SessionId>>> = Arc::new(Mutex::new(None));
    let tracked_id = game_id.clone();

    // 启动一个任务来处理从服务器接收的消息
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(server_msg) => {
                        track_game(&tracked_id, &server_msg);
                        println!("\n<-- {}\n", describe(&server_msg));
                        print!("> ");
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => eprintln!("解析服务器消息失败: {}", e),
                },
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
        println!("与服务器的连接已断开");
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- 石头剪刀布卡牌对战 ---");
    println!("可用命令:");
    println!("  create [昵称] [simple|tiered] [simultaneous|alternating]  - 创建对局");
    println!("  join <对局ID> [昵称]      - 加入对局");
    println!("  play <牌>                 - 出牌，例如 rock、upgraded-paper、joker");
    println!("  redraw                    - 在换牌回合换一手新牌");
    println!("  exit                      - 退出");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let parts: Vec<&str> = line.split_whitespace().collect();

        let client_msg = match parts.first().copied() {
            Some("create") => {
                let player_name = parts.get(1).map(|s| s.to_string());
                let family = match parts.get(2).copied() {
                    Some("tiered") => CardFamily::Tiered,
                    _ => CardFamily::Simple,
                };
                let mode = match parts.get(3).copied() {
                    Some("alternating") => TurnMode::Alternating,
                    _ => TurnMode::Simultaneous,
                };
                ClientMessage::CreateGame { player_name, family, mode }
            }
            Some("join") => {
                let Some(id) = parts.get(1) else {
                    println!("用法: join <对局ID> [昵称]");
                    continue;
                };
                ClientMessage::JoinGame {
                    game_id: SessionId::from(*id),
                    player_name: parts.get(2).map(|s| s.to_string()),
                }
            }
            Some("play") => {
                let Some(current) = current_game(&game_id) else {
                    println!("请先创建或加入对局");
                    continue;
                };
                let token = match parts.get(1).map(|s| s.parse::<MoveToken>()) {
                    Some(Ok(token)) => token,
                    Some(Err(e)) => {
                        println!("{}", e);
                        continue;
                    }
                    None => {
                        println!("用法: play <牌>");
                        continue;
                    }
                };
                ClientMessage::MakeMove { game_id: current, token }
            }
            Some("redraw") => {
                let Some(current) = current_game(&game_id) else {
                    println!("请先创建或加入对局");
                    continue;
                };
                ClientMessage::RequestRedraw { game_id: current }
            }
            Some("exit") => {
                println!("正在断开连接...");
                break;
            }
            _ => {
                println!("未知命令: {}", line);
                continue;
            }
        };

        let payload = serde_json::to_string(&client_msg)?;
        write.send(Message::Text(payload.into())).await?;
    }

    Ok(())
}

fn current_game(game_id: &Mutex<Option<SessionId>>) -> Option<SessionId> {
    game_id.lock().ok().and_then(|current| current.clone())
}

/// 根据服务器的确认消息更新当前对局：创建或开局时记下，结束或对手离开时清空
fn track_game(game_id: &Mutex<Option<SessionId>>, msg: &ServerMessage) {
    let Ok(mut current) = game_id.lock() else {
        return;
    };
    match msg {
        ServerMessage::GameCreated { game_id, .. } | ServerMessage::GameStarted { game_id, .. } => {
            *current = Some(game_id.clone());
        }
        ServerMessage::GameOver { .. } | ServerMessage::PlayerDisconnected => *current = None,
        _ => {}
    }
}

/// 把服务器消息转成一行可读的文字
fn describe(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::GameCreated { game_id, player_id, family, mode } => {
            format!("对局已创建，ID: {} （你是 {}，{:?}/{:?}），把ID发给对手吧", game_id, player_id, family, mode)
        }
        ServerMessage::GameStarted { opponent_name, hand, round, round_limit, .. } => format!(
            "对局开始！对手: {}，第 {}/{} 回合，手牌: {}",
            opponent_name.as_deref().unwrap_or("匿名玩家"),
            round,
            round_limit,
            format_hand(hand)
        ),
        ServerMessage::YourTurn { round } => format!("第 {} 回合，轮到你出牌", round),
        ServerMessage::WaitTurn { round } => format!("第 {} 回合，等待对手出牌", round),
        ServerMessage::MoveMade { token, hand } => format!("你打出了 {}，剩余手牌: {}", token, format_hand(hand)),
        ServerMessage::WaitingForMove => "对手已出牌，等待你出牌".to_string(),
        ServerMessage::RoundComplete { round, moves, winner, scores } => format!(
            "第 {} 回合: {} vs {}，胜者: {}，比分 {}:{}",
            round, moves.player1, moves.player2, winner, scores.player1, scores.player2
        ),
        ServerMessage::RedrawAvailable { round } => format!("第 {} 回合可以换牌，输入 redraw", round),
        ServerMessage::RedrawComplete { hand } => format!("换牌完成，新手牌: {}", format_hand(hand)),
        ServerMessage::GameOver { winner, scores, .. } => {
            format!("对局结束！胜者: {}，最终比分 {}:{}", winner, scores.player1, scores.player2)
        }
        ServerMessage::PlayerDisconnected => "对手已断开连接，对局结束".to_string(),
        ServerMessage::Error { message } => format!("错误: {}", message),
    }
}

fn format_hand(hand: &card_duel_core::Hand) -> String {
    hand.iter()
        .map(|(token, count)| format!("{}x{}", token, count))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_duel_core::{Hand, PlayerId, Scores, Verdict};

    fn started(id: &str) -> ServerMessage {
        ServerMessage::GameStarted {
            game_id: SessionId::from(id),
            player_id: PlayerId::Player2,
            opponent_name: None,
            current_turn: None,
            hand: Hand::default(),
            round: 1,
            round_limit: 10,
        }
    }

    #[test]
    fn test_game_id_follows_server() {
        let game_id = Mutex::new(None);

        // 加入失败时服务器不会回复，当前对局保持为空
        track_game(&game_id, &ServerMessage::Error { message: "x".into() });
        assert_eq!(current_game(&game_id), None);

        track_game(&game_id, &started("abc"));
        assert_eq!(current_game(&game_id), Some(SessionId::from("abc")));

        track_game(&game_id, &ServerMessage::WaitingForMove);
        assert_eq!(current_game(&game_id), Some(SessionId::from("abc")));

        track_game(&game_id, &ServerMessage::GameOver {
            winner: Verdict::Tie,
            scores: Scores { player1: 0, player2: 0 },
            history: Vec::new(),
        });
        assert_eq!(current_game(&game_id), None);

        track_game(&game_id, &started("def"));
        track_game(&game_id, &ServerMessage::PlayerDisconnected);
        assert_eq!(current_game(&game_id), None);
    }
}
