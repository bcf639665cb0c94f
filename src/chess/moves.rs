//! Implements `Move`, a single move resolved and validated against the position it is
//! played from.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use super::{Color, Piece, File, Rank, Square, Position};
use super::error::{Error, Result};

////////////////////////////////////////////////////////////////////////////////////////////////////
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum MoveKind {
    Normal,
    Advance2,
    EnPassant,
    Castling,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A fully legal chess move.
///
/// A `Move` can only be obtained through [`from_coord`], which resolves coordinate notation
/// against a position and checks complete legality, including the safety of the moving
/// side's king. Applying the move to any other position is not meaningful.
///
/// [`from_coord`]: #method.from_coord
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Move {
    pub(crate) piece: Piece,
    orig: Square,
    dest: Square,
    promotion: Option<Piece>,
    pub(crate) captured: Option<Piece>,
    pub(crate) kind: MoveKind,
}

impl Move {
    /// Resolves `s`, a move in coordinate notation such as `e2e4` or `a7a8q`, against `pos`.
    ///
    /// Fails with `Error::ParseError` if `s` is not syntactically a coordinate move, and with
    /// `Error::IllegalMove` if the move is not legal in `pos`.
    pub fn from_coord(pos: &Position, s: &str) -> Result<Move> {
        let orig: Square = s.get(0..2).ok_or(Error::ParseError)?.parse()?;
        let dest: Square = s.get(2..4).ok_or(Error::ParseError)?.parse()?;
        let promotion = match s.get(4..) {
            None | Some("") => None,
            Some(p) => {
                let piece: Piece = p.parse()?;
                match piece {
                    Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen => Some(piece),
                    _ => return Err(Error::ParseError),
                }
            },
        };

        let color = pos.turn();
        let (owner, piece) = pos.piece_at(orig).ok_or(Error::IllegalMove)?;
        if owner != color {
            return Err(Error::IllegalMove);
        }
        let mut captured = match pos.piece_at(dest) {
            Some((c, _)) if c == color => return Err(Error::IllegalMove),
            Some((_, Piece::King)) => return Err(Error::IllegalMove),
            Some((_, p)) => Some(p),
            None => None,
        };
        if piece != Piece::Pawn && promotion.is_some() {
            return Err(Error::IllegalMove);
        }

        let files = dest.file() as i8 - orig.file() as i8;
        let ranks = dest.rank() as i8 - orig.rank() as i8;
        let mut kind = MoveKind::Normal;

        match piece {
            Piece::Pawn => {
                let forward: i8 = match color {
                    Color::White => 1,
                    Color::Black => -1,
                };
                let home = match color {
                    Color::White => Rank::R2,
                    Color::Black => Rank::R7,
                };
                if files == 0 && ranks == forward && captured.is_none() {
                    // plain advance
                } else if files == 0 && ranks == 2*forward && orig.rank() == home
                        && captured.is_none() {
                    let step = orig.offset(0, forward).expect("INFALLIBLE");
                    if pos.piece_at(step).is_some() {
                        return Err(Error::IllegalMove);
                    }
                    kind = MoveKind::Advance2;
                } else if files.abs() == 1 && ranks == forward {
                    if captured.is_some() {
                        // ordinary capture
                    } else if pos.en_passant_square() == Some(dest) {
                        kind = MoveKind::EnPassant;
                        captured = Some(Piece::Pawn);
                    } else {
                        return Err(Error::IllegalMove);
                    }
                } else {
                    return Err(Error::IllegalMove);
                }

                let last = match color {
                    Color::White => Rank::R8,
                    Color::Black => Rank::R1,
                };
                // promotion is required on the last rank and forbidden anywhere else
                if (dest.rank() == last) != promotion.is_some() {
                    return Err(Error::IllegalMove);
                }
            },
            Piece::Knight => {
                if !((files.abs() == 1 && ranks.abs() == 2)
                        || (files.abs() == 2 && ranks.abs() == 1)) {
                    return Err(Error::IllegalMove);
                }
            },
            Piece::Bishop => {
                if files.abs() != ranks.abs() || files == 0 || !pos.path_is_open(orig, dest) {
                    return Err(Error::IllegalMove);
                }
            },
            Piece::Rook => {
                if !((files == 0) ^ (ranks == 0)) || !pos.path_is_open(orig, dest) {
                    return Err(Error::IllegalMove);
                }
            },
            Piece::Queen => {
                let straight = (files == 0) ^ (ranks == 0);
                let diagonal = files.abs() == ranks.abs() && files != 0;
                if !(straight || diagonal) || !pos.path_is_open(orig, dest) {
                    return Err(Error::IllegalMove);
                }
            },
            Piece::King => {
                if files.abs() <= 1 && ranks.abs() <= 1 && (files, ranks) != (0, 0) {
                    // ordinary king move
                } else if ranks == 0 && files.abs() == 2 && captured.is_none() {
                    validate_castling(pos, color, orig, dest)?;
                    kind = MoveKind::Castling;
                } else {
                    return Err(Error::IllegalMove);
                }
            },
        }

        let mv = Move { piece, orig, dest, promotion, captured, kind };
        if pos.make(&mv).in_check(color) {
            return Err(Error::IllegalMove);
        }

        Ok(mv)
    }

    /// Returns the square the piece moved from.
    pub fn origin(self) -> Square {
        self.orig
    }

    /// Returns the square the piece moved to.
    pub fn destination(self) -> Square {
        self.dest
    }

    /// Returns the piece a pawn was promoted to, if the move is a promotion.
    pub fn promotion(self) -> Option<Piece> {
        self.promotion
    }
}

impl fmt::Display for Move {
    /// Formats the move in coordinate notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.orig, self.dest)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.to_string().to_lowercase())?;
        }
        Ok(())
    }
}

fn validate_castling(pos: &Position, color: Color, orig: Square, dest: Square) -> Result<()> {
    let home = match color {
        Color::White => Rank::R1,
        Color::Black => Rank::R8,
    };
    if orig != Square::from_coord(File::E, home) || pos.in_check(color) {
        return Err(Error::IllegalMove);
    }

    let (allowed, rook_file, empty_files, crossed_file) = if dest.file() == File::G {
        (pos.can_castle_king_side(color), File::H, vec![File::F], File::F)
    } else {
        (pos.can_castle_queen_side(color), File::A, vec![File::B, File::C, File::D], File::D)
    };

    if !allowed {
        return Err(Error::IllegalMove);
    }
    if pos.piece_at(Square::from_coord(rook_file, home)) != Some((color, Piece::Rook)) {
        return Err(Error::IllegalMove);
    }
    for file in empty_files {
        if pos.piece_at(Square::from_coord(file, home)).is_some() {
            return Err(Error::IllegalMove);
        }
    }
    // the destination square is covered by the normal king-safety check afterward
    if pos.is_attacked(Square::from_coord(crossed_file, home), !color) {
        return Err(Error::IllegalMove);
    }

    Ok(())
}
