//! Implements `Position`, a mailbox board with just enough bookkeeping to validate moves.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use std::str::FromStr;
use std::convert::TryFrom;
use super::{Color, Piece, File, Rank, Square, Move};
use super::moves::MoveKind;
use super::error::{Error, Result};

/// The standard starting position in Forsyth-Edwards Notation
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const CASTLE_KING_SIDE: u8 = 0x01;
const CASTLE_QUEEN_SIDE: u8 = 0x02;

const KNIGHT_OFFSETS: [(i8, i8); 8] =
    [(1, 2), (2, 1), (2, -1), (1, -2), (-1, -2), (-2, -1), (-2, 1), (-1, 2)];
const KING_OFFSETS: [(i8, i8); 8] =
    [(0, 1), (1, 1), (1, 0), (1, -1), (0, -1), (-1, -1), (-1, 0), (-1, 1)];
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A chess position, including the side to move, castling rights, the en-passant square, and
/// the move clocks.
///
/// Positions are immutable. `make` returns the successor position reached by a `Move` which
/// was validated against this position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    board: [[Option<(Color, Piece)>; Rank::COUNT]; File::COUNT],
    turn: Color,
    castling: [u8; Color::COUNT],
    en_passant: Option<Square>,
    draw_plies: u32,
    move_num: u32,
}

impl Position {
    /// Returns the standard starting position.
    pub fn new() -> Position {
        START_FEN.parse().expect("INFALLIBLE")
    }

    /// Returns the contents of `sq`.
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.board[usize::from(sq.file())][usize::from(sq.rank())]
    }

    /// Returns the color whose turn it is to move.
    pub fn turn(&self) -> Color {
        self.turn
    }

    /// Returns the square onto which an en-passant capture is possible, if there is one.
    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant
    }

    /// Returns true if `color` retains the right to castle on the king's side.
    pub fn can_castle_king_side(&self, color: Color) -> bool {
        self.castling[usize::from(color)] & CASTLE_KING_SIDE != 0
    }

    /// Returns true if `color` retains the right to castle on the queen's side.
    pub fn can_castle_queen_side(&self, color: Color) -> bool {
        self.castling[usize::from(color)] & CASTLE_QUEEN_SIDE != 0
    }

    /// Returns the number of half-moves played since the start of the game, derived from the
    /// fullmove number and the side to move. Saturates when a board description carries a
    /// fullmove number too large for the count.
    pub fn ply_count(&self) -> u32 {
        (self.move_num - 1).saturating_mul(2)
            .saturating_add(if self.turn == Color::Black { 1 } else { 0 })
    }

    /// Returns true if any piece of color `by` attacks `sq`.
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        // pawns attack one rank toward their opponent
        let pawn_rank_offset = match by {
            Color::White => -1,
            Color::Black => 1,
        };
        for &file_offset in &[-1, 1] {
            if let Some(from) = sq.offset(file_offset, pawn_rank_offset) {
                if self.piece_at(from) == Some((by, Piece::Pawn)) {
                    return true;
                }
            }
        }

        for &(files, ranks) in &KNIGHT_OFFSETS {
            if let Some(from) = sq.offset(files, ranks) {
                if self.piece_at(from) == Some((by, Piece::Knight)) {
                    return true;
                }
            }
        }

        for &(files, ranks) in &KING_OFFSETS {
            if let Some(from) = sq.offset(files, ranks) {
                if self.piece_at(from) == Some((by, Piece::King)) {
                    return true;
                }
            }
        }

        self.ray_attack(sq, by, &ROOK_DIRECTIONS, Piece::Rook)
            || self.ray_attack(sq, by, &BISHOP_DIRECTIONS, Piece::Bishop)
    }

    /// Returns true if the king of `color` is under attack.
    pub fn in_check(&self, color: Color) -> bool {
        self.is_attacked(self.king_square(color), !color)
    }

    /// Returns the successor position reached by playing `mv`, which must have been validated
    /// against this position with [`Move::from_coord`].
    ///
    /// [`Move::from_coord`]: struct.Move.html#method.from_coord
    pub fn make(&self, mv: &Move) -> Position {
        let mut next = self.clone();
        let mover = self.turn;
        let orig = mv.origin();
        let dest = mv.destination();

        next.set(orig, None);
        match mv.kind {
            MoveKind::EnPassant => {
                // the captured pawn stands beside the destination, not on it
                next.set(Square::from_coord(dest.file(), orig.rank()), None);
            },
            MoveKind::Castling => {
                let rank = orig.rank();
                let (rook_orig, rook_dest) = if dest.file() == File::G {
                    (File::H, File::F)
                } else {
                    (File::A, File::D)
                };
                next.set(Square::from_coord(rook_orig, rank), None);
                next.set(Square::from_coord(rook_dest, rank), Some((mover, Piece::Rook)));
            },
            MoveKind::Normal | MoveKind::Advance2 => {},
        }
        next.set(dest, Some((mover, mv.promotion().unwrap_or(mv.piece))));

        if mv.piece == Piece::King {
            next.castling[usize::from(mover)] = 0;
        }
        for &(file, rank, color, side) in &[
            (File::H, Rank::R1, Color::White, CASTLE_KING_SIDE),
            (File::A, Rank::R1, Color::White, CASTLE_QUEEN_SIDE),
            (File::H, Rank::R8, Color::Black, CASTLE_KING_SIDE),
            (File::A, Rank::R8, Color::Black, CASTLE_QUEEN_SIDE),
        ] {
            let corner = Square::from_coord(file, rank);
            if orig == corner || dest == corner {
                next.castling[usize::from(color)] &= !side;
            }
        }

        next.en_passant = if mv.kind == MoveKind::Advance2 {
            let skipped = match mover {
                Color::White => Rank::R3,
                Color::Black => Rank::R6,
            };
            Some(Square::from_coord(orig.file(), skipped))
        } else {
            None
        };

        if mv.piece == Piece::Pawn || mv.captured.is_some() {
            next.draw_plies = 0;
        } else {
            next.draw_plies = next.draw_plies.saturating_add(1);
        }
        if mover == Color::Black {
            next.move_num = next.move_num.saturating_add(1);
        }
        next.turn = !mover;

        next
    }

    /// Returns true if every square strictly between `from` and `to` is empty. The squares
    /// must share a file, rank or diagonal.
    pub(crate) fn path_is_open(&self, from: Square, to: Square) -> bool {
        let files = (to.file() as i8 - from.file() as i8).signum();
        let ranks = (to.rank() as i8 - from.rank() as i8).signum();

        let mut sq = from;
        loop {
            sq = match sq.offset(files, ranks) {
                Some(sq) => sq,
                None => return false,
            };
            if sq == to {
                return true;
            }
            if self.piece_at(sq).is_some() {
                return false;
            }
        }
    }

    fn king_square(&self, color: Color) -> Square {
        for file in 0..File::COUNT {
            for rank in 0..Rank::COUNT {
                if self.board[file][rank] == Some((color, Piece::King)) {
                    return Square::from_coord(
                        File::try_from(file).expect("INFALLIBLE"),
                        Rank::try_from(rank).expect("INFALLIBLE"));
                }
            }
        }
        // a `Position` cannot be constructed without both kings
        unreachable!();
    }

    fn ray_attack(&self, sq: Square, by: Color, directions: &[(i8, i8)], slider: Piece) -> bool {
        for &(files, ranks) in directions {
            let mut from = sq;
            while let Some(next) = from.offset(files, ranks) {
                from = next;
                match self.piece_at(from) {
                    Some((color, piece)) => {
                        if color == by && (piece == slider || piece == Piece::Queen) {
                            return true;
                        }
                        break;
                    },
                    None => {},
                }
            }
        }

        false
    }

    fn set(&mut self, sq: Square, value: Option<(Color, Piece)>) {
        self.board[usize::from(sq.file())][usize::from(sq.rank())] = value;
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new()
    }
}

impl FromStr for Position {
    type Err = Error;

    /// Parses a position in Forsyth-Edwards Notation. The two move clocks may be omitted, in
    /// which case they default to zero half-moves and move one; fields beyond the sixth are
    /// ignored.
    fn from_str(s: &str) -> Result<Self> {
        let mut fields = s.split_whitespace();
        let board_str = fields.next().ok_or(Error::ParseError)?;
        let turn = fields.next().ok_or(Error::ParseError)?.parse()?;
        let castling_str = fields.next().ok_or(Error::ParseError)?;
        let en_passant_str = fields.next().ok_or(Error::ParseError)?;
        let draw_plies = match fields.next() {
            Some(s) => s.parse().map_err(|_| Error::ParseError)?,
            None => 0,
        };
        let move_num: u32 = match fields.next() {
            Some(s) => s.parse().map_err(|_| Error::ParseError)?,
            None => 1,
        };

        let mut board = [[None; Rank::COUNT]; File::COUNT];
        let ranks: Vec<_> = board_str.split('/').collect();
        if ranks.len() != Rank::COUNT {
            return Err(Error::ParseError);
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = Rank::try_from(Rank::COUNT - 1 - i).expect("INFALLIBLE");
            let mut file = 0;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip < 1 || skip > 8 {
                        return Err(Error::ParseError);
                    }
                    file += skip as usize;
                } else {
                    let piece = c.to_string().parse()?;
                    let color = if c.is_uppercase() { Color::White } else { Color::Black };
                    if file >= File::COUNT {
                        return Err(Error::ParseError);
                    }
                    board[file][usize::from(rank)] = Some((color, piece));
                    file += 1;
                }
            }
            if file != File::COUNT {
                return Err(Error::ParseError);
            }
        }

        for &color in &[Color::White, Color::Black] {
            let kings = board.iter()
                .flatten()
                .filter(|&&p| p == Some((color, Piece::King)))
                .count();
            if kings != 1 {
                return Err(Error::InvalidPosition);
            }
        }

        let mut castling = [0; Color::COUNT];
        if castling_str != "-" {
            for c in castling_str.chars() {
                match c {
                    'K' => castling[usize::from(Color::White)] |= CASTLE_KING_SIDE,
                    'Q' => castling[usize::from(Color::White)] |= CASTLE_QUEEN_SIDE,
                    'k' => castling[usize::from(Color::Black)] |= CASTLE_KING_SIDE,
                    'q' => castling[usize::from(Color::Black)] |= CASTLE_QUEEN_SIDE,
                    _ => return Err(Error::ParseError),
                }
            }
        }

        let en_passant = if en_passant_str == "-" {
            None
        } else {
            Some(en_passant_str.parse()?)
        };

        Ok(Position {
            board,
            turn,
            castling,
            en_passant,
            draw_plies,
            move_num: move_num.max(1),
        })
    }
}

impl fmt::Display for Position {
    /// Formats the position in Forsyth-Edwards Notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..Rank::COUNT {
            let rank = Rank::COUNT - 1 - i;
            if i > 0 {
                write!(f, "/")?;
            }
            let mut empty = 0;
            for file in 0..File::COUNT {
                match self.board[file][rank] {
                    Some((color, piece)) => {
                        if empty > 0 {
                            write!(f, "{}", empty)?;
                            empty = 0;
                        }
                        match color {
                            Color::White => write!(f, "{}", piece)?,
                            Color::Black => write!(f, "{}", piece.to_string().to_lowercase())?,
                        }
                    },
                    None => empty += 1,
                }
            }
            if empty > 0 {
                write!(f, "{}", empty)?;
            }
        }

        write!(f, " {} ", self.turn)?;

        if self.castling == [0, 0] {
            write!(f, "-")?;
        } else {
            if self.can_castle_king_side(Color::White) { write!(f, "K")?; }
            if self.can_castle_queen_side(Color::White) { write!(f, "Q")?; }
            if self.can_castle_king_side(Color::Black) { write!(f, "k")?; }
            if self.can_castle_queen_side(Color::Black) { write!(f, "q")?; }
        }

        match self.en_passant {
            Some(sq) => write!(f, " {}", sq)?,
            None => write!(f, " -")?,
        }

        write!(f, " {} {}", self.draw_plies, self.move_num)
    }
}
