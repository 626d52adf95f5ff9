//! A complete chess position and its FEN codec.
//!
//! FEN is the interchange format with the rules library and the persisted
//! form of a game's starting point.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::types::{CastlingRights, Color, Piece, PieceKind, Square};

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Largest halfmove clock or fullmove number a FEN may carry.
pub const MAX_COUNTER: u32 = u16::MAX as u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("expected 6 fields, found {0}")]
    FieldCount(usize),
    #[error("bad piece placement: {0}")]
    Placement(String),
    #[error("bad side to move: {0}")]
    SideToMove(String),
    #[error("bad castling field: {0}")]
    Castling(String),
    #[error("bad en passant field: {0}")]
    EnPassant(String),
    #[error("bad move counter: {0}")]
    Counter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    squares: [Option<Piece>; 64],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Position {
    pub fn empty() -> Self {
        Self {
            squares: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::none(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn starting() -> Self {
        let mut position = Self::empty();
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, kind) in back_rank.into_iter().enumerate() {
            let file = file as u8;
            position.put(sq(file, 0), Some(Piece::new(Color::White, kind)));
            position.put(sq(file, 1), Some(Piece::new(Color::White, PieceKind::Pawn)));
            position.put(sq(file, 6), Some(Piece::new(Color::Black, PieceKind::Pawn)));
            position.put(sq(file, 7), Some(Piece::new(Color::Black, kind)));
        }
        position.castling = CastlingRights::all();
        position
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    pub fn put(&mut self, square: Square, piece: Option<Piece>) {
        self.squares[square.index()] = piece;
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |s| self.piece_at(s).map(|p| (s, p)))
    }

    /// The first FEN field.
    pub fn placement(&self) -> String {
        let mut out = String::with_capacity(64);
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                match self.piece_at(sq(file, rank)) {
                    Some(piece) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }

    /// Identity of the position for repetition counting.
    ///
    /// The en passant square only counts when an enemy pawn stands next to
    /// the pawn that just advanced two squares.
    pub fn repetition_key(&self) -> String {
        let ep = match self.en_passant.filter(|target| self.en_passant_capturable(*target)) {
            Some(target) => target.to_string(),
            None => "-".to_string(),
        };
        format!(
            "{} {} {} {}",
            self.placement(),
            side_letter(self.side_to_move),
            self.castling,
            ep
        )
    }

    fn en_passant_capturable(&self, target: Square) -> bool {
        // The advanced pawn sits one rank beyond the target, from the mover's view.
        let pawn_rank = match self.side_to_move {
            Color::White => target.rank().checked_sub(1),
            Color::Black => Some(target.rank() + 1),
        };
        let Some(pawn_rank) = pawn_rank else {
            return false;
        };
        let capturer = Piece::new(self.side_to_move, PieceKind::Pawn);
        [target.file().checked_sub(1), Some(target.file() + 1)]
            .into_iter()
            .flatten()
            .filter_map(|file| Square::new(file, pawn_rank))
            .any(|s| self.piece_at(s) == Some(capturer))
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::starting()
    }
}

fn sq(file: u8, rank: u8) -> Square {
    Square::new(file, rank).unwrap_or_else(|| unreachable!("square {file},{rank} off board"))
}

fn side_letter(color: Color) -> char {
    match color {
        Color::White => 'w',
        Color::Black => 'b',
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ",
            self.placement(),
            side_letter(self.side_to_move),
            self.castling
        )?;
        match self.en_passant {
            Some(target) => write!(f, "{target}")?,
            None => f.write_str("-")?,
        }
        write!(f, " {} {}", self.halfmove_clock, self.fullmove_number)
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(fen: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::FieldCount(fields.len()));
        }

        let mut position = Position::empty();

        // Piece placement, rank 8 first
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::Placement(fields[0].to_string()));
        }
        for (i, rank_text) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file: u8 = 0;
            for c in rank_text.chars() {
                if let Some(run) = c.to_digit(10) {
                    if run == 0 || run > 8 {
                        return Err(FenError::Placement(rank_text.to_string()));
                    }
                    file += run as u8;
                } else {
                    let piece = Piece::from_fen_char(c)
                        .ok_or_else(|| FenError::Placement(rank_text.to_string()))?;
                    let square = Square::new(file, rank)
                        .ok_or_else(|| FenError::Placement(rank_text.to_string()))?;
                    position.put(square, Some(piece));
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::Placement(rank_text.to_string()));
                }
            }
            if file != 8 {
                return Err(FenError::Placement(rank_text.to_string()));
            }
        }

        position.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        if fields[2] != "-" {
            for c in fields[2].chars() {
                let flag = match c {
                    'K' => &mut position.castling.white_kingside,
                    'Q' => &mut position.castling.white_queenside,
                    'k' => &mut position.castling.black_kingside,
                    'q' => &mut position.castling.black_queenside,
                    _ => return Err(FenError::Castling(fields[2].to_string())),
                };
                if *flag {
                    return Err(FenError::Castling(fields[2].to_string()));
                }
                *flag = true;
            }
        }

        position.en_passant = match fields[3] {
            "-" => None,
            text => {
                let target: Square = text
                    .parse()
                    .map_err(|_| FenError::EnPassant(text.to_string()))?;
                if target.rank() != 2 && target.rank() != 5 {
                    return Err(FenError::EnPassant(text.to_string()));
                }
                Some(target)
            }
        };

        // Counters beyond any real game are refused so moves can never overflow them
        position.halfmove_clock = match fields[4].parse::<u32>() {
            Ok(n) if n <= MAX_COUNTER => n,
            _ => return Err(FenError::Counter(fields[4].to_string())),
        };
        position.fullmove_number = match fields[5].parse::<u32>() {
            Ok(n) if n > 0 && n <= MAX_COUNTER => n,
            _ => return Err(FenError::Counter(fields[5].to_string())),
        };

        Ok(position)
    }
}
