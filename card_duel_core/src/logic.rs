use crate::card::*;
use crate::message::*;
use crate::state::*;

// --- 对局流程 ---

impl Session {
    /// 第二位玩家加入对局
    ///
    /// 加入后双方各发一手牌，对局进入 Active。
    /// 轮流模式下由 player1 先出牌。
    pub fn join(&mut self, name: Option<String>) -> Result<Vec<Dispatch>, Rejection> {
        match self.phase {
            SessionPhase::AwaitingJoin => {}
            SessionPhase::Concluded => return Err(Rejection::Concluded),
            _ => return Err(Rejection::SessionFull),
        }

        self.players.push(Participant::new(PlayerId::Player2, name));
        for player in &mut self.players {
            player.hand = allocate_for(self.config.family);
        }

        self.phase = SessionPhase::Active;
        self.round = self.config.initial_round;
        self.current_turn = match self.config.mode {
            TurnMode::Alternating => Some(PlayerId::Player1),
            TurnMode::Simultaneous => None,
        };

        let mut out: Vec<Dispatch> = self
            .players
            .iter()
            .map(|player| {
                let opponent_name = self
                    .participant(player.id.opponent())
                    .and_then(|p| p.name.clone());
                Dispatch::to(player.id, ServerMessage::GameStarted {
                    game_id: self.id.clone(),
                    player_id: player.id,
                    opponent_name,
                    current_turn: self.current_turn,
                    hand: player.hand.clone(),
                    round: self.round,
                    round_limit: self.config.round_limit,
                })
            })
            .collect();
        out.extend(self.turn_notices());
        Ok(out)
    }

    /// 处理一次出牌
    ///
    /// 合法的出牌会立即从手牌中扣除并放入本回合的缓冲区；
    /// 双方的牌都到齐后立刻结算本回合。
    /// 任何不合法的出牌都不会改变对局状态。
    pub fn submit_move(&mut self, player_id: PlayerId, token: MoveToken) -> Result<Vec<Dispatch>, Rejection> {
        match self.phase {
            SessionPhase::Active | SessionPhase::RoundPending | SessionPhase::WaitingOnOpponentTurn => {}
            SessionPhase::AwaitingJoin => return Err(Rejection::NotActive),
            SessionPhase::Concluded => return Err(Rejection::Concluded),
        }
        if token.family() != self.config.family {
            return Err(Rejection::WrongFamily(token));
        }
        if self.config.mode == TurnMode::Alternating && self.current_turn != Some(player_id) {
            return Err(Rejection::NotYourTurn);
        }
        if self.pending.contains_key(&player_id) {
            return Err(Rejection::AlreadyMoved);
        }

        let player = self.participant_mut(player_id).ok_or(Rejection::NotParticipant)?;
        if !player.hand.take(token) {
            return Err(Rejection::CardUnavailable(token));
        }
        let hand = player.hand.clone();
        self.pending.insert(player_id, token);

        let mut out = vec![Dispatch::to(player_id, ServerMessage::MoveMade { token, hand })];

        if self.pending.len() < self.players.len() {
            let opponent = player_id.opponent();
            match self.config.mode {
                TurnMode::Simultaneous => {
                    self.phase = SessionPhase::RoundPending;
                    out.push(Dispatch::to(opponent, ServerMessage::WaitingForMove));
                }
                TurnMode::Alternating => {
                    self.phase = SessionPhase::WaitingOnOpponentTurn;
                    self.current_turn = Some(opponent);
                    out.extend(self.turn_notices());
                }
            }
            return Ok(out);
        }

        out.extend(self.resolve_round());
        Ok(out)
    }

    /// 在换牌回合用一手新牌替换当前手牌，每位玩家只能换一次
    pub fn request_redraw(&mut self, player_id: PlayerId) -> Result<Vec<Dispatch>, Rejection> {
        if self.is_concluded() {
            return Err(Rejection::Concluded);
        }
        if !self.is_in_play() {
            return Err(Rejection::NotActive);
        }
        if self.config.family != CardFamily::Simple || self.round != self.config.redraw_round {
            return Err(Rejection::RedrawUnavailable);
        }

        let player = self.participant_mut(player_id).ok_or(Rejection::NotParticipant)?;
        if player.redraw_used {
            return Err(Rejection::RedrawUnavailable);
        }
        player.hand = allocate();
        player.redraw_used = true;

        Ok(vec![Dispatch::to(player_id, ServerMessage::RedrawComplete {
            hand: player.hand.clone(),
        })])
    }

    /// 回合计数超过上限时结束对局，并向双方公布最终结果
    pub fn check_termination(&mut self) -> Vec<Dispatch> {
        if self.is_concluded() || self.round <= self.config.round_limit {
            return Vec::new();
        }
        self.conclude();
        vec![Dispatch::everyone(ServerMessage::GameOver {
            winner: self.final_verdict(),
            scores: self.scores(),
            history: self.history.clone(),
        })]
    }

    /// 玩家断开连接，对局立即结束并通知对手
    pub fn disconnect(&mut self, player_id: PlayerId) -> Vec<Dispatch> {
        if self.is_concluded() || self.participant(player_id).is_none() {
            return Vec::new();
        }
        self.conclude();

        let opponent = player_id.opponent();
        if self.participant(opponent).is_some() {
            vec![Dispatch::to(opponent, ServerMessage::PlayerDisconnected)]
        } else {
            Vec::new()
        }
    }

    // --- 辅助逻辑函数 ---

    /// 结算缓冲区中双方的出牌
    fn resolve_round(&mut self) -> Vec<Dispatch> {
        let (Some(&first), Some(&second)) = (
            self.pending.get(&PlayerId::Player1),
            self.pending.get(&PlayerId::Player2),
        ) else {
            return Vec::new();
        };

        let winner = resolve(first, second);
        if let Some(id) = winner.winner() {
            if let Some(player) = self.participant_mut(id) {
                player.score += 1;
            }
        }

        let moves = RoundMoves { player1: first, player2: second };
        self.history.push(RoundRecord { round: self.round, moves, winner });
        let mut out = vec![Dispatch::everyone(ServerMessage::RoundComplete {
            round: self.round,
            moves,
            winner,
            scores: self.scores(),
        })];

        self.pending.clear();
        self.round += 1;
        self.phase = SessionPhase::Active;
        if self.config.mode == TurnMode::Alternating {
            self.current_turn = Some(PlayerId::Player1);
        }

        out.extend(self.check_termination());
        if self.is_concluded() {
            return out;
        }

        if self.config.family == CardFamily::Simple && self.round == self.config.redraw_round {
            out.extend(
                self.players
                    .iter()
                    .filter(|p| !p.redraw_used)
                    .map(|p| Dispatch::to(p.id, ServerMessage::RedrawAvailable { round: self.round })),
            );
        }
        out.extend(self.turn_notices());
        out
    }

    /// 轮流模式下告知双方轮到谁出牌
    fn turn_notices(&self) -> Vec<Dispatch> {
        let Some(current) = self.current_turn else {
            return Vec::new();
        };
        vec![
            Dispatch::to(current, ServerMessage::YourTurn { round: self.round }),
            Dispatch::to(current.opponent(), ServerMessage::WaitTurn { round: self.round }),
        ]
    }

    fn conclude(&mut self) {
        self.phase = SessionPhase::Concluded;
        self.pending.clear();
        self.current_turn = None;
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use MoveToken::{Joker, Plain, Tiered};
    use Shape::*;

    fn setup_session(family: CardFamily, mode: TurnMode) -> Session {
        let mut session = Session::new(
            SessionId::from("test"),
            SessionConfig::new(family, mode),
            Some("Alice".to_string()),
        );
        session.join(Some("Bob".to_string())).unwrap();
        session
    }

    /// 把双方手牌设为固定值，避免随机发牌影响断言
    fn set_hands(session: &mut Session, hand: Hand) {
        for player in &mut session.players {
            player.hand = hand.clone();
        }
    }

    fn plenty() -> Hand {
        Hand::from_counts(Shape::ALL.into_iter().map(|s| (Plain(s), 5)))
    }

    fn play_round(session: &mut Session, first: MoveToken, second: MoveToken) -> Vec<Dispatch> {
        let mut out = session.submit_move(PlayerId::Player1, first).unwrap();
        out.extend(session.submit_move(PlayerId::Player2, second).unwrap());
        out
    }

    fn messages_for(out: &[Dispatch], player: PlayerId) -> Vec<ServerMessage> {
        out.iter().filter(|d| d.reaches(player)).map(|d| d.message.clone()).collect()
    }

    #[test]
    fn test_new_session_awaits_join() {
        let session = Session::new(SessionId::from("s"), SessionConfig::default(), None);
        assert_eq!(session.phase, SessionPhase::AwaitingJoin);
        assert_eq!(session.players.len(), 1);
        assert_eq!(session.players[0].id, PlayerId::Player1);
        assert!(session.players[0].hand.is_empty());
        assert_eq!(session.round, INITIAL_ROUND);
    }

    #[test]
    fn test_join_deals_hands_and_starts() {
        let mut session = Session::new(SessionId::from("s"), SessionConfig::default(), Some("Alice".into()));
        let out = session.join(Some("Bob".into())).unwrap();

        assert_eq!(session.phase, SessionPhase::Active);
        assert_eq!(session.current_turn, None);
        for player in &session.players {
            assert_eq!(player.hand.total(), HAND_SIZE);
        }

        let to_p2 = messages_for(&out, PlayerId::Player2);
        assert_eq!(to_p2.len(), 1);
        match &to_p2[0] {
            ServerMessage::GameStarted { player_id, opponent_name, .. } => {
                assert_eq!(*player_id, PlayerId::Player2);
                assert_eq!(opponent_name.as_deref(), Some("Alice"));
            }
            other => panic!("expected GameStarted, got {other:?}"),
        }
    }

    #[test]
    fn test_join_full_session_rejected() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        assert_eq!(session.join(None), Err(Rejection::SessionFull));
        assert_eq!(session.players.len(), 2);
    }

    #[test]
    fn test_move_before_join_rejected() {
        let mut session = Session::new(SessionId::from("s"), SessionConfig::default(), None);
        assert_eq!(session.submit_move(PlayerId::Player1, Plain(Rock)), Err(Rejection::NotActive));
        assert!(session.pending.is_empty());
    }

    #[test]
    fn test_simultaneous_round() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        set_hands(&mut session, plenty());

        let out = session.submit_move(PlayerId::Player1, Plain(Rock)).unwrap();
        assert_eq!(session.phase, SessionPhase::RoundPending);
        assert_eq!(session.round, INITIAL_ROUND);
        assert_eq!(session.players[0].hand.count(Plain(Rock)), 4);
        assert_eq!(messages_for(&out, PlayerId::Player2), vec![ServerMessage::WaitingForMove]);

        let out = session.submit_move(PlayerId::Player2, Plain(Scissors)).unwrap();
        assert_eq!(session.phase, SessionPhase::Active);
        assert_eq!(session.round, INITIAL_ROUND + 1);
        assert!(session.pending.is_empty());
        assert_eq!(session.scores(), Scores { player1: 1, player2: 0 });
        assert_eq!(session.history.len(), 1);

        let result = out
            .iter()
            .find(|d| matches!(d.message, ServerMessage::RoundComplete { .. }))
            .unwrap();
        assert_eq!(result.audience, Audience::Everyone);
        match &result.message {
            ServerMessage::RoundComplete { round, winner, .. } => {
                assert_eq!(*round, INITIAL_ROUND);
                assert_eq!(*winner, Verdict::Player1);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_tie_does_not_score() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        set_hands(&mut session, plenty());
        play_round(&mut session, Plain(Paper), Plain(Paper));
        assert_eq!(session.scores(), Scores::default());
        assert_eq!(session.history[0].winner, Verdict::Tie);
    }

    #[test]
    fn test_double_move_rejected() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        set_hands(&mut session, plenty());
        session.submit_move(PlayerId::Player1, Plain(Rock)).unwrap();
        assert_eq!(session.submit_move(PlayerId::Player1, Plain(Paper)), Err(Rejection::AlreadyMoved));
        assert_eq!(session.pending.len(), 1);
        assert_eq!(session.players[0].hand.count(Plain(Paper)), 5);
    }

    #[test]
    fn test_depleted_card_rejected() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        set_hands(&mut session, Hand::from_counts([(Plain(Rock), 0), (Plain(Paper), 15)]));
        assert_eq!(
            session.submit_move(PlayerId::Player1, Plain(Rock)),
            Err(Rejection::CardUnavailable(Plain(Rock)))
        );
        assert!(session.pending.is_empty());
        assert_eq!(session.phase, SessionPhase::Active);
    }

    #[test]
    fn test_wrong_family_rejected() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        assert_eq!(session.submit_move(PlayerId::Player1, Joker), Err(Rejection::WrongFamily(Joker)));

        let mut session = setup_session(CardFamily::Tiered, TurnMode::Simultaneous);
        assert_eq!(
            session.submit_move(PlayerId::Player1, Plain(Rock)),
            Err(Rejection::WrongFamily(Plain(Rock)))
        );
    }

    #[test]
    fn test_alternating_turn_order() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Alternating);
        set_hands(&mut session, plenty());
        assert_eq!(session.current_turn, Some(PlayerId::Player1));

        assert_eq!(session.submit_move(PlayerId::Player2, Plain(Rock)), Err(Rejection::NotYourTurn));

        let out = session.submit_move(PlayerId::Player1, Plain(Rock)).unwrap();
        assert_eq!(session.phase, SessionPhase::WaitingOnOpponentTurn);
        assert_eq!(session.current_turn, Some(PlayerId::Player2));
        assert!(messages_for(&out, PlayerId::Player2).contains(&ServerMessage::YourTurn { round: 1 }));
        assert!(messages_for(&out, PlayerId::Player1).contains(&ServerMessage::WaitTurn { round: 1 }));

        assert_eq!(session.submit_move(PlayerId::Player1, Plain(Paper)), Err(Rejection::NotYourTurn));

        let out = session.submit_move(PlayerId::Player2, Plain(Paper)).unwrap();
        assert_eq!(session.current_turn, Some(PlayerId::Player1));
        assert_eq!(session.scores(), Scores { player1: 0, player2: 1 });
        assert!(messages_for(&out, PlayerId::Player1).contains(&ServerMessage::YourTurn { round: 2 }));
    }

    #[test]
    fn test_round_limit_concludes() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        set_hands(&mut session, Hand::from_counts([(Plain(Rock), 10), (Plain(Scissors), 10)]));

        for _ in 0..ROUND_LIMIT - 1 {
            play_round(&mut session, Plain(Rock), Plain(Scissors));
        }
        assert_eq!(session.round, ROUND_LIMIT);
        assert!(!session.is_concluded());

        let out = play_round(&mut session, Plain(Rock), Plain(Rock));
        assert!(session.is_concluded());
        assert_eq!(session.round, ROUND_LIMIT + 1);

        let over = out.last().unwrap();
        assert_eq!(over.audience, Audience::Everyone);
        match &over.message {
            ServerMessage::GameOver { winner, scores, history } => {
                assert_eq!(*winner, Verdict::Player1);
                assert_eq!(scores.player1, ROUND_LIMIT - 1);
                assert_eq!(history.len(), ROUND_LIMIT as usize);
            }
            other => panic!("expected GameOver, got {other:?}"),
        }

        // 结束后任何出牌都无效
        let before = session.players[0].hand.clone();
        assert_eq!(session.submit_move(PlayerId::Player1, Plain(Rock)), Err(Rejection::Concluded));
        assert_eq!(session.players[0].hand, before);
        assert!(session.check_termination().is_empty());
    }

    #[test]
    fn test_final_verdict_tie() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        set_hands(&mut session, Hand::from_counts([(Plain(Rock), 10), (Plain(Scissors), 10)]));
        play_round(&mut session, Plain(Rock), Plain(Scissors));
        play_round(&mut session, Plain(Scissors), Plain(Rock));
        assert_eq!(session.final_verdict(), Verdict::Tie);
    }

    #[test]
    fn test_redraw_offered_and_applied_once() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        set_hands(&mut session, plenty());

        assert_eq!(session.request_redraw(PlayerId::Player1), Err(Rejection::RedrawUnavailable));

        let mut last = Vec::new();
        while session.round < REDRAW_ROUND {
            last = play_round(&mut session, Plain(Rock), Plain(Paper));
        }
        assert_eq!(
            messages_for(&last, PlayerId::Player1)
                .iter()
                .filter(|m| matches!(m, ServerMessage::RedrawAvailable { .. }))
                .count(),
            1
        );

        let out = session.request_redraw(PlayerId::Player1).unwrap();
        assert_eq!(session.players[0].hand.total(), HAND_SIZE);
        assert!(session.players[0].redraw_used);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].audience, Audience::Player(PlayerId::Player1));

        assert_eq!(session.request_redraw(PlayerId::Player1), Err(Rejection::RedrawUnavailable));
        // 对手的换牌机会不受影响
        assert!(session.request_redraw(PlayerId::Player2).is_ok());

        play_round(&mut session, Plain(Rock), Plain(Paper));
        assert_eq!(session.players[0].hand.total(), HAND_SIZE - 1);
    }

    #[test]
    fn test_redraw_not_available_for_tiered() {
        let mut session = setup_session(CardFamily::Tiered, TurnMode::Simultaneous);
        let card = Tiered(Tier::Regular, Rock);
        let out = play_round(&mut session, card, card);
        assert!(!out.iter().any(|d| matches!(d.message, ServerMessage::RedrawAvailable { .. })));

        session.round = REDRAW_ROUND;
        assert_eq!(session.request_redraw(PlayerId::Player1), Err(Rejection::RedrawUnavailable));
        assert!(!session.players[0].redraw_used);
    }

    #[test]
    fn test_tiered_hand_is_not_replenished() {
        let mut session = setup_session(CardFamily::Tiered, TurnMode::Simultaneous);
        play_round(&mut session, Joker, Tiered(Tier::Upgraded, Paper));
        assert_eq!(session.scores(), Scores { player1: 1, player2: 0 });
        assert_eq!(session.players[0].hand.count(Joker), 0);
        assert_eq!(
            session.submit_move(PlayerId::Player1, Joker),
            Err(Rejection::CardUnavailable(Joker))
        );
    }

    #[test]
    fn test_disconnect_notifies_opponent_once() {
        let mut session = setup_session(CardFamily::Simple, TurnMode::Simultaneous);
        let out = session.disconnect(PlayerId::Player1);
        assert_eq!(out, vec![Dispatch::to(PlayerId::Player2, ServerMessage::PlayerDisconnected)]);
        assert!(session.is_concluded());
        assert!(session.disconnect(PlayerId::Player2).is_empty());
    }

    #[test]
    fn test_disconnect_while_waiting_for_join() {
        let mut session = Session::new(SessionId::from("s"), SessionConfig::default(), None);
        assert!(session.disconnect(PlayerId::Player1).is_empty());
        assert!(session.is_concluded());
        assert_eq!(session.join(None), Err(Rejection::Concluded));
    }
}
