//! The opening book: a weighted table mapping positions to known-good moves.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use log::warn;
use rand::Rng;
use crate::chess;
use crate::chess::{Move, Position};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A source of opening moves.
pub trait Book: fmt::Debug {
    /// Looks up a move for `pos`, in coordinate notation. When `random` is set the choice is
    /// weighted-random among the known moves; otherwise the heaviest known move is returned.
    /// Returns `None` when the book has nothing to say about `pos`.
    fn probe(&self, pos: &Position, random: bool) -> Option<String>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One move known for a position, with its selection weight.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BookEntry {
    mv: String,
    weight: u32,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// An in-memory opening book built from move-sequence lines.
///
/// Positions are keyed by the first four fields of their FEN, so the move clocks do not
/// affect lookups. Every position along an added line gets that line's move recorded, with
/// weights from repeated lines accumulating.
#[derive(Debug, Clone, Default)]
pub struct MemoryBook {
    entries: HashMap<String, Vec<BookEntry>>,
}

impl MemoryBook {
    /// Creates an empty book.
    pub fn new() -> MemoryBook {
        MemoryBook::default()
    }

    /// Loads a book from a YAML file mapping move-sequence lines to weights.
    pub fn from_yaml_file(path: &Path) -> Result<MemoryBook, Error> {
        MemoryBook::from_yaml(&fs::read_to_string(path)?)
    }

    /// Parses a book from YAML text mapping move-sequence lines to weights, such as
    ///
    /// ```yaml
    /// e2e4 e7e5 g1f3: 4
    /// d2d4 d7d5: 1
    /// ```
    ///
    /// Lines which do not describe a sequence of legal moves from the starting position are
    /// logged and discarded. Lines are applied in sorted order, so ties between moves of
    /// equal weight break the same way across runs.
    pub fn from_yaml(text: &str) -> Result<MemoryBook, Error> {
        let lines: HashMap<String, u32> = serde_yaml::from_str(text)?;
        let mut lines: Vec<_> = lines.into_iter().collect();
        lines.sort();

        let mut book = MemoryBook::new();
        for (line, weight) in lines {
            if let Err(err) = book.add_line_weighted(&line, weight) {
                warn!("discarding book line \"{}\": {}", line, err);
            }
        }

        Ok(book)
    }

    /// Adds one line of play with a weight of one. See [`add_line_weighted`].
    ///
    /// [`add_line_weighted`]: #method.add_line_weighted
    pub fn add_line(&mut self, line: &str) -> Result<(), Error> {
        self.add_line_weighted(line, 1)
    }

    /// Adds one line of play, given as whitespace-separated coordinate moves from the
    /// starting position. Each position along the line gets the move played from it
    /// recorded with the given weight. Fails without changing the book if any token is
    /// not a legal move.
    pub fn add_line_weighted(&mut self, line: &str, weight: u32) -> Result<(), Error> {
        let mut pos = Position::new();
        let mut additions = Vec::new();

        for token in line.split_whitespace() {
            let mv = Move::from_coord(&pos, token).map_err(Error::Line)?;
            additions.push((MemoryBook::key(&pos), mv.to_string()));
            pos = pos.make(&mv);
        }

        for (key, mv) in additions {
            let entries = self.entries.entry(key).or_insert_with(Vec::new);
            match entries.iter_mut().find(|entry| entry.mv == mv) {
                Some(entry) => entry.weight = entry.weight.saturating_add(weight),
                None => entries.push(BookEntry { mv, weight }),
            }
        }

        Ok(())
    }

    /// Returns the number of positions the book knows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the book knows no positions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(pos: &Position) -> String {
        let fen = pos.to_string();
        let fields: Vec<&str> = fen.split_whitespace().take(4).collect();

        fields.join(" ")
    }

    // Selects the entry holding the `pick`th weight unit. Entries with zero weight can
    // never be selected.
    fn nth_by_weight(entries: &[BookEntry], mut pick: u64) -> Option<String> {
        for entry in entries {
            let weight = u64::from(entry.weight);
            if pick < weight {
                return Some(entry.mv.clone());
            }
            pick -= weight;
        }

        None
    }

    fn heaviest(entries: &[BookEntry]) -> Option<String> {
        let mut best: Option<&BookEntry> = None;
        for entry in entries {
            if entry.weight > 0 && best.map_or(true, |b| entry.weight > b.weight) {
                best = Some(entry);
            }
        }

        best.map(|entry| entry.mv.clone())
    }
}

impl Book for MemoryBook {
    fn probe(&self, pos: &Position, random: bool) -> Option<String> {
        let entries = self.entries.get(&MemoryBook::key(pos))?;

        if random {
            let total: u64 = entries.iter().map(|entry| u64::from(entry.weight)).sum();
            if total == 0 {
                return None;
            }
            MemoryBook::nth_by_weight(entries, rand::thread_rng().gen_range(0, total))
        } else {
            MemoryBook::heaviest(entries)
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Error type for book loading
#[derive(Debug)]
pub enum Error {
    /// The book file could not be read
    Io(io::Error),
    /// The book file is not a mapping of move-sequence lines to weights
    Yaml(serde_yaml::Error),
    /// A line is not a sequence of legal moves from the starting position
    Line(chess::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "cannot read book: {}", err),
            Error::Yaml(err) => write!(f, "book is not a mapping of lines to weights: {}", err),
            Error::Line(err) => write!(f, "not a legal line of play: {}", err),
        }
    }
}

impl std::error::Error for Error { }

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}
