//! The adapter's shadow replay of the game described by `position` commands.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use crate::chess;
use crate::chess::{Move, Position};
use crate::protocol::uci::PositionParams;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The adapter's own replay of the game in progress.
///
/// The stored position only ever advances through full legality checking, so it is always
/// reachable from a valid starting description by legal moves alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayer {
    pos: Position,
}

impl Replayer {
    /// Creates a replayer holding the usual starting position.
    pub fn new() -> Replayer {
        Replayer { pos: Position::new() }
    }

    /// Returns the replayed position.
    pub fn position(&self) -> &Position {
        &self.pos
    }

    /// Returns the number of plies played since the start of the game.
    pub fn ply_count(&self) -> u32 {
        self.pos.ply_count()
    }

    /// Returns to the usual starting position.
    pub fn reset(&mut self) {
        self.pos = Position::new();
    }

    /// Replaces the position from a `position` command's parameters: the given FEN, or the
    /// usual starting position when there is none, with the move list played out on top.
    ///
    /// A FEN which does not parse leaves the previous position in place. A move token which
    /// is not legal stops the replay there, keeping the position reached by the tokens
    /// before it. Either way the error is returned.
    pub fn load(&mut self, params: &PositionParams) -> chess::Result<()> {
        let mut pos = match &params.fen {
            Some(fen) => fen.parse()?,
            None => Position::new(),
        };

        for token in &params.moves {
            match Move::from_coord(&pos, token) {
                Ok(mv) => pos = pos.make(&mv),
                Err(err) => {
                    self.pos = pos;
                    return Err(err);
                },
            }
        }
        self.pos = pos;

        Ok(())
    }
}

impl Default for Replayer {
    fn default() -> Self {
        Replayer::new()
    }
}
