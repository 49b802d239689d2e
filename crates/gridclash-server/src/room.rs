use std::collections::HashMap;

use gridclash_core::color::PlayerColor;
use gridclash_core::grid::Grid;
use gridclash_core::player::{Player, PlayerId, Position};
use gridclash_core::protocol::ScoreEntry;

/// Seconds between the ready gate firing and the round going live.
pub const COUNTDOWN_SECS: u64 = 3;
/// Round length in seconds.
pub const GAME_SECS: u64 = 30;

/// Room state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Lobby,
    Starting,
    Active,
    Ended,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    #[error("Room not found")]
    NotFound,
    #[error("Game already started")]
    AlreadyStarted,
    #[error("Room is full")]
    RoomFull,
    #[error("Only the host can restart")]
    NotHost,
}

/// Result of a ready toggle for a known member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyOutcome {
    pub ready: bool,
    /// True exactly once per satisfying edge: the toggle that moved the
    /// room from Lobby into Starting.
    pub starting: bool,
}

/// Cell-ownership half of a move, present when the move changed the grid.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub color: PlayerColor,
    pub scores: Vec<ScoreEntry>,
}

/// Result of an applied move. Position and capture are broadcast together
/// so observers never see one without the other.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub position: Position,
    pub capture: Option<CaptureOutcome>,
}

/// Result of removing a member.
#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub player: Player,
    pub new_host: Option<PlayerId>,
    /// A started round was left with a single player and must end early.
    pub end_game: bool,
}

/// Final standings of a round.
#[derive(Debug, Clone)]
pub struct EndOutcome {
    pub scores: Vec<ScoreEntry>,
    pub winner: Option<PlayerId>,
}

/// One game session. All mutation rules and invariants live here; the
/// dispatcher translates the returned outcomes into broadcasts.
#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub phase: RoomPhase,
    players: HashMap<PlayerId, Player>,
    /// Join order; drives host migration, score tables, and tie-breaks.
    order: Vec<PlayerId>,
    pub grid: Grid,
    pub time_left: u64,
    /// Timer ownership token. Scheduled timer tasks capture the epoch at
    /// spawn time and stand down when it no longer matches (see
    /// `AppState::rearm_timer`).
    pub timer_epoch: u64,
}

impl Room {
    pub fn new(code: String) -> Self {
        Room {
            code,
            phase: RoomPhase::Lobby,
            players: HashMap::new(),
            order: Vec::new(),
            grid: Grid::new(),
            time_left: GAME_SECS,
            timer_epoch: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.players.values().find(|p| p.is_host).map(|p| p.id)
    }

    /// Member ids in join order.
    pub fn member_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.order.iter().copied()
    }

    /// Full member list in join order, for the joiner's snapshot.
    pub fn players_snapshot(&self) -> Vec<Player> {
        self.order
            .iter()
            .filter_map(|id| self.players.get(id))
            .cloned()
            .collect()
    }

    /// Add a member. The first player in becomes host; colors are drawn
    /// uniquely, so the room is full once the palette is exhausted.
    pub fn add_player(&mut self, id: PlayerId, name: String) -> Result<Player, RoomError> {
        if self.phase != RoomPhase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        let taken: Vec<PlayerColor> = self.players.values().map(|p| p.color).collect();
        let color = PlayerColor::draw(&taken).ok_or(RoomError::RoomFull)?;

        let name = if name.trim().is_empty() {
            format!("player-{}", id)
        } else {
            name
        };
        let player = Player::new(id, name, color, self.players.is_empty());
        self.players.insert(id, player.clone());
        self.order.push(id);
        Ok(player)
    }

    /// Toggle a member's ready flag. Unknown members are a silent no-op.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> Option<ReadyOutcome> {
        let player = self.players.get_mut(&id)?;
        player.ready = ready;

        let starting = self.phase == RoomPhase::Lobby
            && self.players.len() >= 2
            && self.players.values().all(|p| p.ready);
        if starting {
            self.phase = RoomPhase::Starting;
        }
        Some(ReadyOutcome { ready, starting })
    }

    /// Apply a move: clamp, update position, resolve capture. Ignored
    /// outside Active or for unknown members.
    pub fn apply_move(&mut self, id: PlayerId, x: i64, y: i64) -> Option<MoveOutcome> {
        if self.phase != RoomPhase::Active {
            return None;
        }
        let pos = Position::clamped(x, y);
        let color = {
            let player = self.players.get_mut(&id)?;
            player.position = pos;
            player.color
        };

        if self.grid.owner(pos) == Some(color) {
            // Already ours: position still moves, scores untouched.
            return Some(MoveOutcome {
                position: pos,
                capture: None,
            });
        }

        let previous = self.grid.paint(pos, color);
        if let Some(prev_color) = previous {
            // The previous owner may have disconnected mid-round, in which
            // case the cell just flips with no decrement.
            if let Some(owner) = self.players.values_mut().find(|p| p.color == prev_color) {
                owner.score -= 1;
            }
        }
        if let Some(player) = self.players.get_mut(&id) {
            player.score += 1;
        }

        Some(MoveOutcome {
            position: pos,
            capture: Some(CaptureOutcome {
                color,
                scores: self.score_table(),
            }),
        })
    }

    /// Remove a member, migrating the host flag to the earliest-joined
    /// survivor when the host left. Unknown members are a silent no-op.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<RemoveOutcome> {
        let player = self.players.remove(&id)?;
        self.order.retain(|&p| p != id);

        let mut new_host = None;
        if player.is_host {
            if let Some(&next) = self.order.first() {
                if let Some(promoted) = self.players.get_mut(&next) {
                    promoted.is_host = true;
                    new_host = Some(next);
                }
            }
        }

        // A round cannot be won alone: a started game left with a single
        // player ends early. An emptied room is torn down by the caller
        // instead.
        let end_game = self.phase != RoomPhase::Lobby && self.players.len() == 1;

        Some(RemoveOutcome {
            player,
            new_host,
            end_game,
        })
    }

    /// Host-only: reset the room to a fresh lobby without touching
    /// membership or host assignment.
    pub fn restart(&mut self, id: PlayerId) -> Result<(), RoomError> {
        match self.players.get(&id) {
            Some(p) if p.is_host => {
                self.reset_round();
                Ok(())
            }
            _ => Err(RoomError::NotHost),
        }
    }

    /// Countdown expiry: the round goes live on a fresh grid.
    pub fn start_active(&mut self) {
        self.phase = RoomPhase::Active;
        self.grid.clear();
        self.time_left = GAME_SECS;
    }

    /// One second of game time. Returns the remaining seconds.
    pub fn tick(&mut self) -> u64 {
        self.time_left = self.time_left.saturating_sub(1);
        self.time_left
    }

    /// End the round: final table, winner, then back to a replayable
    /// lobby. The winner is the earliest-joined player holding the
    /// maximal score.
    pub fn end_game(&mut self) -> EndOutcome {
        self.phase = RoomPhase::Ended;
        let scores = self.score_table();

        let mut winner = None;
        let mut best: Option<u32> = None;
        for id in &self.order {
            if let Some(p) = self.players.get(id) {
                if best.is_none_or(|b| p.score > b) {
                    best = Some(p.score);
                    winner = Some(p.id);
                }
            }
        }

        self.reset_round();
        EndOutcome { scores, winner }
    }

    /// Current score table in join order.
    pub fn score_table(&self) -> Vec<ScoreEntry> {
        self.order
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|p| ScoreEntry {
                player_id: p.id,
                color: p.color,
                score: p.score,
            })
            .collect()
    }

    fn reset_round(&mut self) {
        self.phase = RoomPhase::Lobby;
        self.grid.clear();
        self.time_left = GAME_SECS;
        for p in self.players.values_mut() {
            p.ready = false;
            p.score = 0;
            p.position = Position::ORIGIN;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_with_players(n: u64) -> Room {
        let mut room = Room::new("ABCD".into());
        for id in 1..=n {
            room.add_player(id, format!("p{}", id)).unwrap();
        }
        room
    }

    fn start_round(room: &mut Room) {
        let ids: Vec<PlayerId> = room.member_ids().collect();
        for id in ids {
            room.set_ready(id, true).unwrap();
        }
        assert_eq!(room.phase, RoomPhase::Starting);
        room.start_active();
    }

    #[test]
    fn first_player_is_host() {
        let room = room_with_players(2);
        assert!(room.player(1).unwrap().is_host);
        assert!(!room.player(2).unwrap().is_host);
        assert_eq!(room.host_id(), Some(1));
    }

    #[test]
    fn colors_are_unique_and_seventh_join_is_rejected() {
        let mut room = room_with_players(6);
        let mut colors: Vec<_> = (1..=6).map(|id| room.player(id).unwrap().color).collect();
        colors.sort_by_key(|c| c.hex());
        colors.dedup();
        assert_eq!(colors.len(), 6);

        assert_eq!(room.add_player(7, "p7".into()), Err(RoomError::RoomFull));
    }

    #[test]
    fn join_after_start_is_rejected() {
        let mut room = room_with_players(2);
        room.set_ready(1, true).unwrap();
        room.set_ready(2, true).unwrap();
        assert_eq!(
            room.add_player(3, "late".into()),
            Err(RoomError::AlreadyStarted)
        );
    }

    #[test]
    fn ready_gate_fires_exactly_once() {
        let mut room = room_with_players(2);

        let first = room.set_ready(1, true).unwrap();
        assert!(!first.starting);

        let second = room.set_ready(2, true).unwrap();
        assert!(second.starting);
        assert_eq!(room.phase, RoomPhase::Starting);

        // Re-toggling while Starting must not re-trigger the edge.
        let again = room.set_ready(1, true).unwrap();
        assert!(again.ready);
        assert!(!again.starting);
        assert_eq!(room.phase, RoomPhase::Starting);
    }

    #[test]
    fn ready_gate_needs_two_members() {
        let mut room = room_with_players(1);
        let outcome = room.set_ready(1, true).unwrap();
        assert!(!outcome.starting);
        assert_eq!(room.phase, RoomPhase::Lobby);
    }

    #[test]
    fn ready_from_unknown_member_is_silent() {
        let mut room = room_with_players(2);
        assert!(room.set_ready(99, true).is_none());
    }

    #[test]
    fn round_goes_live_with_full_clock_and_empty_grid() {
        let mut room = room_with_players(2);
        start_round(&mut room);
        assert_eq!(room.phase, RoomPhase::Active);
        assert_eq!(room.time_left, GAME_SECS);
        assert!(room.grid.is_empty());
    }

    #[test]
    fn moves_are_ignored_outside_active() {
        let mut room = room_with_players(2);
        assert!(room.apply_move(1, 3, 3).is_none());
        assert_eq!(room.player(1).unwrap().score, 0);
    }

    #[test]
    fn moves_from_unknown_members_are_ignored() {
        let mut room = room_with_players(2);
        start_round(&mut room);
        assert!(room.apply_move(99, 3, 3).is_none());
        assert!(room.grid.is_empty());
    }

    #[test]
    fn out_of_range_moves_are_clamped() {
        let mut room = room_with_players(2);
        start_round(&mut room);

        let outcome = room.apply_move(1, 999, -4).unwrap();
        assert_eq!(outcome.position, Position { x: 15, y: 0 });
        assert_eq!(room.player(1).unwrap().position, Position { x: 15, y: 0 });
    }

    #[test]
    fn capture_transfers_ownership_and_score() {
        let mut room = room_with_players(2);
        start_round(&mut room);

        let first = room.apply_move(1, 3, 3).unwrap();
        let capture = first.capture.expect("unowned cell should be captured");
        assert_eq!(capture.color, room.player(1).unwrap().color);
        assert_eq!(room.player(1).unwrap().score, 1);
        assert_eq!(room.grid.owned_count(), 1);

        let second = room.apply_move(2, 3, 3).unwrap();
        assert!(second.capture.is_some());
        assert_eq!(room.player(1).unwrap().score, 0);
        assert_eq!(room.player(2).unwrap().score, 1);
        assert_eq!(room.grid.owned_count(), 1);
        assert_eq!(
            room.grid.owner(Position { x: 3, y: 3 }),
            Some(room.player(2).unwrap().color)
        );
    }

    #[test]
    fn repainting_own_cell_changes_nothing() {
        let mut room = room_with_players(2);
        start_round(&mut room);

        room.apply_move(1, 5, 5).unwrap();
        let outcome = room.apply_move(1, 5, 5).unwrap();
        assert!(outcome.capture.is_none());
        assert_eq!(room.player(1).unwrap().score, 1);
        assert_eq!(room.grid.owned_count(), 1);
    }

    #[test]
    fn score_sum_matches_owned_cells_after_any_move_sequence() {
        let mut room = room_with_players(3);
        start_round(&mut room);

        let moves = [
            (1, 0, 0),
            (2, 0, 0),
            (3, 0, 0),
            (1, 15, 15),
            (2, 15, 15),
            (1, 7, 3),
            (3, 7, 3),
            (2, 200, -200),
            (1, 0, 0),
            (3, 1, 1),
        ];
        for (id, x, y) in moves {
            room.apply_move(id, x, y).unwrap();
            let total: u32 = room.score_table().iter().map(|e| e.score).sum();
            assert_eq!(total, room.grid.owned_count());
        }
    }

    #[test]
    fn host_migrates_to_earliest_joined_survivor() {
        let mut room = room_with_players(3);

        let outcome = room.remove_player(1).unwrap();
        assert_eq!(outcome.new_host, Some(2));
        assert!(room.player(2).unwrap().is_host);

        // Exactly one host remains.
        let hosts = room
            .players_snapshot()
            .iter()
            .filter(|p| p.is_host)
            .count();
        assert_eq!(hosts, 1);
    }

    #[test]
    fn non_host_departure_keeps_host() {
        let mut room = room_with_players(3);
        let outcome = room.remove_player(2).unwrap();
        assert_eq!(outcome.new_host, None);
        assert_eq!(room.host_id(), Some(1));
    }

    #[test]
    fn removing_unknown_member_is_silent() {
        let mut room = room_with_players(2);
        assert!(room.remove_player(99).is_none());
        assert_eq!(room.len(), 2);
    }

    #[test]
    fn started_round_ends_early_when_one_player_remains() {
        let mut room = room_with_players(2);
        start_round(&mut room);

        let outcome = room.remove_player(2).unwrap();
        assert!(outcome.end_game);
    }

    #[test]
    fn lobby_departure_does_not_end_game() {
        let mut room = room_with_players(2);
        let outcome = room.remove_player(2).unwrap();
        assert!(!outcome.end_game);
    }

    #[test]
    fn emptied_room_reports_no_early_end() {
        let mut room = room_with_players(1);
        let outcome = room.remove_player(1).unwrap();
        assert!(!outcome.end_game);
        assert!(room.is_empty());
    }

    #[test]
    fn restart_is_host_only() {
        let mut room = room_with_players(2);
        start_round(&mut room);
        room.apply_move(2, 4, 4).unwrap();

        assert_eq!(room.restart(2), Err(RoomError::NotHost));
        assert_eq!(room.phase, RoomPhase::Active);

        room.restart(1).unwrap();
        assert_eq!(room.phase, RoomPhase::Lobby);
        assert!(room.grid.is_empty());
        for p in room.players_snapshot() {
            assert_eq!(p.score, 0);
            assert_eq!(p.position, Position::ORIGIN);
            assert!(!p.ready);
        }
        // Membership and host survive the restart.
        assert_eq!(room.len(), 2);
        assert_eq!(room.host_id(), Some(1));
    }

    #[test]
    fn tick_counts_down_to_zero() {
        let mut room = room_with_players(2);
        start_round(&mut room);
        for expected in (0..GAME_SECS).rev() {
            assert_eq!(room.tick(), expected);
        }
        assert_eq!(room.tick(), 0);
    }

    #[test]
    fn end_game_reports_winner_and_resets_to_lobby() {
        let mut room = room_with_players(2);
        start_round(&mut room);

        // P1 takes five cells, P2 takes three.
        for x in 0..5 {
            room.apply_move(1, x, 0).unwrap();
        }
        for x in 0..3 {
            room.apply_move(2, x, 1).unwrap();
        }

        let outcome = room.end_game();
        assert_eq!(outcome.winner, Some(1));
        assert_eq!(outcome.scores[0].score, 5);
        assert_eq!(outcome.scores[1].score, 3);

        assert_eq!(room.phase, RoomPhase::Lobby);
        assert!(room.grid.is_empty());
        for p in room.players_snapshot() {
            assert_eq!(p.score, 0);
            assert!(!p.ready);
        }
    }

    #[test]
    fn tied_winner_is_earliest_joined() {
        let mut room = room_with_players(3);
        start_round(&mut room);

        // P2 and P3 tie at one cell each; P1 never scores.
        room.apply_move(2, 0, 0).unwrap();
        room.apply_move(3, 1, 0).unwrap();

        let outcome = room.end_game();
        assert_eq!(outcome.winner, Some(2));
    }

    #[test]
    fn score_table_is_in_join_order() {
        let mut room = room_with_players(3);
        room.remove_player(2).unwrap();
        room.add_player(9, "p9".into()).unwrap();

        let ids: Vec<PlayerId> = room.score_table().iter().map(|e| e.player_id).collect();
        assert_eq!(ids, vec![1, 3, 9]);
    }
}
