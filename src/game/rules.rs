//! The legality oracle the board consults, and its `chess` crate adapter.
//!
//! Move generation and check detection belong to the rules library; this
//! module only translates positions in and out of it using FEN, and keeps
//! the bookkeeping the library does not track (clocks, en passant target).

use chess::{Board, BoardStatus, ChessMove, MoveGen};
use std::str::FromStr;
use thiserror::Error;

use super::position::{Position, MAX_COUNTER};
use super::types::{Color, Move, Piece, PieceKind, Square};

/// The rules library could not accept a position.
#[derive(Debug, Clone, Error)]
#[error("rules library rejected position {fen}: {reason}")]
pub struct OracleError {
    pub fen: String,
    pub reason: String,
}

/// Why a game ended in a draw without a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    InsufficientMaterial,
    SeventyFiveMoves,
    FivefoldRepetition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    None,
    /// Carries the winning color.
    Checkmate(Color),
    Stalemate,
    DrawOther(DrawReason),
}

impl TerminalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TerminalStatus::None)
    }
}

/// Source of truth for chess legality.
pub trait RulesOracle: Send + Sync {
    fn legal_moves(&self, position: &Position) -> Result<Vec<Move>, OracleError>;

    fn is_legal(&self, position: &Position, mv: &Move) -> Result<bool, OracleError> {
        Ok(self.legal_moves(position)?.contains(mv))
    }

    /// The position after `mv`, or `None` when the move is illegal.
    fn apply(&self, position: &Position, mv: &Move) -> Result<Option<Position>, OracleError>;

    /// Checkmate, stalemate or dead position, judged on the position alone.
    fn status(&self, position: &Position) -> Result<TerminalStatus, OracleError>;
}

/// Oracle backed by the `chess` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

impl ChessRules {
    fn board(position: &Position) -> Result<Board, OracleError> {
        let fen = position.to_string();
        Board::from_str(&fen).map_err(|e| OracleError {
            fen: fen.clone(),
            reason: e.to_string(),
        })
    }
}

impl RulesOracle for ChessRules {
    fn legal_moves(&self, position: &Position) -> Result<Vec<Move>, OracleError> {
        let board = Self::board(position)?;
        Ok(MoveGen::new_legal(&board).map(from_chess_move).collect())
    }

    fn apply(&self, position: &Position, mv: &Move) -> Result<Option<Position>, OracleError> {
        let board = Self::board(position)?;
        let chess_move = ChessMove::new(
            to_chess_square(mv.from),
            to_chess_square(mv.to),
            mv.promotion.map(to_chess_piece),
        );

        // Check if the move is legal
        if !MoveGen::new_legal(&board).any(|m| m == chess_move) {
            return Ok(None);
        }

        let after = board.make_move_new(chess_move);
        Ok(Some(next_position(position, mv, &after)))
    }

    fn status(&self, position: &Position) -> Result<TerminalStatus, OracleError> {
        let board = Self::board(position)?;
        let status = match board.status() {
            BoardStatus::Checkmate => {
                // The side to move is mated
                TerminalStatus::Checkmate(from_chess_color(!board.side_to_move()))
            }
            BoardStatus::Stalemate => TerminalStatus::Stalemate,
            BoardStatus::Ongoing if has_insufficient_material(position) => {
                TerminalStatus::DrawOther(DrawReason::InsufficientMaterial)
            }
            BoardStatus::Ongoing => TerminalStatus::None,
        };
        Ok(status)
    }
}

/// Build our position from the library's board after `mv`, advancing the
/// counters and en passant target from the position before it.
fn next_position(before: &Position, mv: &Move, after: &Board) -> Position {
    let mut next = Position::empty();
    for square in Square::all() {
        let chess_square = to_chess_square(square);
        if let (Some(piece), Some(color)) = (after.piece_on(chess_square), after.color_on(chess_square)) {
            next.put(
                square,
                Some(Piece::new(from_chess_color(color), from_chess_piece(piece))),
            );
        }
    }
    next.side_to_move = from_chess_color(after.side_to_move());
    for color in [Color::White, Color::Black] {
        let rights = after.castle_rights(to_chess_color(color));
        next.castling
            .set(color, rights.has_kingside(), rights.has_queenside());
    }

    let mover = before.piece_at(mv.from);
    let is_pawn = matches!(mover, Some(p) if p.kind == PieceKind::Pawn);
    let is_capture = before.piece_at(mv.to).is_some()
        || (is_pawn && mv.from.file() != mv.to.file());

    next.en_passant = if is_pawn && mv.from.rank().abs_diff(mv.to.rank()) == 2 {
        Square::new(mv.from.file(), (mv.from.rank() + mv.to.rank()) / 2)
    } else {
        None
    };
    next.halfmove_clock = if is_pawn || is_capture {
        0
    } else {
        before.halfmove_clock.saturating_add(1).min(MAX_COUNTER)
    };
    next.fullmove_number = match before.side_to_move {
        Color::Black => before.fullmove_number.saturating_add(1).min(MAX_COUNTER),
        Color::White => before.fullmove_number,
    };
    next
}

/// Check if the position has insufficient material for checkmate
pub fn has_insufficient_material(position: &Position) -> bool {
    let mut minors: Vec<(Color, PieceKind, Square)> = Vec::new();
    for (square, piece) in position.pieces() {
        match piece.kind {
            PieceKind::King => {}
            PieceKind::Knight | PieceKind::Bishop => minors.push((piece.color, piece.kind, square)),
            // Pawns, rooks and queens can always mate
            _ => return false,
        }
    }

    match minors.as_slice() {
        // King vs King
        [] => true,
        // King and minor piece vs King
        [_] => true,
        // King and Bishop vs King and Bishop, bishops on the same color
        [(c1, PieceKind::Bishop, s1), (c2, PieceKind::Bishop, s2)] => {
            c1 != c2 && s1.is_light() == s2.is_light()
        }
        _ => false,
    }
}

fn to_chess_square(square: Square) -> chess::Square {
    chess::Square::make_square(
        chess::Rank::from_index(square.rank() as usize),
        chess::File::from_index(square.file() as usize),
    )
}

fn from_chess_square(square: chess::Square) -> Square {
    Square::new(
        square.get_file().to_index() as u8,
        square.get_rank().to_index() as u8,
    )
    .unwrap_or_else(|| unreachable!("chess square {square} off board"))
}

fn to_chess_color(color: Color) -> chess::Color {
    match color {
        Color::White => chess::Color::White,
        Color::Black => chess::Color::Black,
    }
}

fn from_chess_color(color: chess::Color) -> Color {
    match color {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

fn to_chess_piece(kind: PieceKind) -> chess::Piece {
    match kind {
        PieceKind::Pawn => chess::Piece::Pawn,
        PieceKind::Knight => chess::Piece::Knight,
        PieceKind::Bishop => chess::Piece::Bishop,
        PieceKind::Rook => chess::Piece::Rook,
        PieceKind::Queen => chess::Piece::Queen,
        PieceKind::King => chess::Piece::King,
    }
}

fn from_chess_piece(piece: chess::Piece) -> PieceKind {
    match piece {
        chess::Piece::Pawn => PieceKind::Pawn,
        chess::Piece::Knight => PieceKind::Knight,
        chess::Piece::Bishop => PieceKind::Bishop,
        chess::Piece::Rook => PieceKind::Rook,
        chess::Piece::Queen => PieceKind::Queen,
        chess::Piece::King => PieceKind::King,
    }
}

fn from_chess_move(m: ChessMove) -> Move {
    Move::with_promotion(
        from_chess_square(m.get_source()),
        from_chess_square(m.get_dest()),
        m.get_promotion().map(from_chess_piece),
    )
}
