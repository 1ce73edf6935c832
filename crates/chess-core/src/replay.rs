//! Game replay: turns a serialized move record into the ordered sequence of
//! positions the analysis pipeline walks.
//!
//! Replay is lazy and restartable: [`GameReplay::plies`] hands out a fresh
//! iterator that replays from the starting position each time.

use chess::{Board, ChessMove, Color, File, MoveGen, Piece, Rank, Square};
use thiserror::Error;

use crate::game_data::Side;
use crate::pgn;

/// A move record that cannot be parsed or replayed against the rules.
/// Not retried: a malformed record is a data problem, not a transient one.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty move record")]
    EmptyRecord,

    #[error("invalid move {san:?} at ply {ply}: {reason}")]
    InvalidMove {
        ply: usize,
        san: String,
        reason: String,
    },
}

/// One ply of a replayed game.
#[derive(Debug, Clone)]
pub struct Ply {
    /// 0-based index into the move record.
    pub ply: usize,
    /// 1-based full-move number as it appears on a score sheet.
    pub move_number: u32,
    pub fen_before: String,
    pub fen_after: String,
    pub san: String,
    pub uci: String,
    pub side_to_move: Side,
    /// True iff the side to move at this ply is the side the user played.
    pub is_user_move: bool,
}

/// A parsed game ready for replay.
pub struct GameReplay {
    moves: Vec<String>,
    user_color: Side,
}

impl GameReplay {
    /// Parse a move record. Token extraction is eager so an empty record
    /// fails up front; rule-checking happens lazily during iteration.
    pub fn new(movetext: &str, user_color: Side) -> Result<Self, DecodeError> {
        let moves = pgn::extract_moves(movetext);
        if moves.is_empty() {
            return Err(DecodeError::EmptyRecord);
        }
        Ok(Self { moves, user_color })
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// Iterator over plies in play order, starting from the initial
    /// position. Call again to restart.
    pub fn plies(&self) -> Plies<'_> {
        Plies {
            moves: &self.moves,
            user_color: self.user_color,
            board: Board::default(),
            next: 0,
            failed: false,
        }
    }
}

/// Lazy replay iterator. Fuses after the first invalid move.
pub struct Plies<'a> {
    moves: &'a [String],
    user_color: Side,
    board: Board,
    next: usize,
    failed: bool,
}

impl Iterator for Plies<'_> {
    type Item = Result<Ply, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.moves.len() {
            return None;
        }

        let ply = self.next;
        let san = &self.moves[ply];
        let side_to_move = if self.board.side_to_move() == Color::White {
            Side::White
        } else {
            Side::Black
        };

        let chess_move = match resolve_san(&self.board, san) {
            Ok(m) => m,
            Err(reason) => {
                self.failed = true;
                return Some(Err(DecodeError::InvalidMove {
                    ply,
                    san: san.clone(),
                    reason,
                }));
            }
        };

        let fen_before = self.board.to_string();
        self.board = self.board.make_move_new(chess_move);
        self.next += 1;

        Some(Ok(Ply {
            ply,
            move_number: (ply / 2 + 1) as u32,
            fen_before,
            fen_after: self.board.to_string(),
            san: san.clone(),
            uci: uci_string(chess_move),
            side_to_move,
            is_user_move: side_to_move == self.user_color,
        }))
    }
}

/// Format a move as UCI (e.g. `e2e4`, `e7e8q`).
pub fn uci_string(m: ChessMove) -> String {
    format!(
        "{}{}{}",
        m.get_source(),
        m.get_dest(),
        match m.get_promotion() {
            Some(Piece::Queen) => "q",
            Some(Piece::Rook) => "r",
            Some(Piece::Bishop) => "b",
            Some(Piece::Knight) => "n",
            _ => "",
        }
    )
}

/// Resolve a SAN token against the legal moves of `board`.
fn resolve_san(board: &Board, san: &str) -> Result<ChessMove, String> {
    let clean = san.trim_end_matches(|c: char| c == '+' || c == '#' || c == '!' || c == '?');
    if clean.is_empty() {
        return Err("empty move token".to_string());
    }

    let legal_moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();

    // Castling: the king travels two files.
    if clean == "O-O" || clean == "0-0" {
        return find_castle(board, &legal_moves, true)
            .ok_or_else(|| "no legal kingside castle".to_string());
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        return find_castle(board, &legal_moves, false)
            .ok_or_else(|| "no legal queenside castle".to_string());
    }

    let bytes = clean.as_bytes();
    let (piece, rest) = if bytes[0].is_ascii_uppercase() {
        let p = match bytes[0] {
            b'K' => Piece::King,
            b'Q' => Piece::Queen,
            b'R' => Piece::Rook,
            b'B' => Piece::Bishop,
            b'N' => Piece::Knight,
            other => return Err(format!("unknown piece letter {:?}", other as char)),
        };
        (p, &clean[1..])
    } else {
        (Piece::Pawn, clean)
    };

    // Promotion suffix
    let (rest, promotion) = match rest.find('=') {
        Some(eq) => {
            let promo = match rest.as_bytes().get(eq + 1) {
                Some(b'Q') => Some(Piece::Queen),
                Some(b'R') => Some(Piece::Rook),
                Some(b'B') => Some(Piece::Bishop),
                Some(b'N') => Some(Piece::Knight),
                _ => return Err("invalid promotion piece".to_string()),
            };
            (&rest[..eq], promo)
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    let rest_bytes = rest.as_bytes();
    if rest_bytes.len() < 2 {
        return Err("move token too short".to_string());
    }

    let dest_file = rest_bytes[rest_bytes.len() - 2];
    let dest_rank = rest_bytes[rest_bytes.len() - 1];
    if !(b'a'..=b'h').contains(&dest_file) || !(b'1'..=b'8').contains(&dest_rank) {
        return Err("invalid destination square".to_string());
    }

    let dest = Square::make_square(
        Rank::from_index((dest_rank - b'1') as usize),
        File::from_index((dest_file - b'a') as usize),
    );

    let mut candidates: Vec<ChessMove> = legal_moves
        .into_iter()
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .collect();

    if candidates.len() > 1 {
        // Disambiguate by source file and/or rank
        let disambig = &rest[..rest.len() - 2];
        candidates.retain(|m| {
            let src = m.get_source();
            disambig.bytes().all(|b| match b {
                b'a'..=b'h' => src.get_file().to_index() == (b - b'a') as usize,
                b'1'..=b'8' => src.get_rank().to_index() == (b - b'1') as usize,
                _ => false,
            })
        });
    }

    match candidates.len() {
        1 => Ok(candidates[0]),
        0 => Err("no legal move matches".to_string()),
        n => Err(format!("ambiguous ({n} candidates)")),
    }
}

fn find_castle(board: &Board, legal_moves: &[ChessMove], kingside: bool) -> Option<ChessMove> {
    legal_moves.iter().copied().find(|m| {
        if board.piece_on(m.get_source()) != Some(Piece::King) {
            return false;
        }
        let src = m.get_source().get_file().to_index() as i32;
        let dst = m.get_dest().get_file().to_index() as i32;
        if kingside {
            dst - src == 2
        } else {
            src - dst == 2
        }
    })
}
