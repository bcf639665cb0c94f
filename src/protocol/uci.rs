//! Classifies controller commands and formats the responses the adapter synthesizes, per the
//! Universal Chess Interface.
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
use regex::{Regex, RegexSet};
use lazy_static::lazy_static;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The parsed payload of a `position` command.
///
/// The payload is scanned for the literal markers `"fen "` and `"moves "`. Text between the
/// two markers (or after `"fen "` when there is no move list) is the board description; a
/// missing board description means the standard starting position. The move list is split
/// into fixed-width tokens of four characters, plus a fifth promotion character when the
/// token is not followed by a space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PositionParams {
    /// The board description in Forsyth-Edwards Notation, if one was given.
    pub fen: Option<String>,
    /// The moves to play from the board description, in coordinate notation.
    pub moves: Vec<String>,
}

impl PositionParams {
    /// Extracts the board description and move tokens from everything following the
    /// `position` keyword. The scan is best-effort and cannot fail; nonsense degrades into
    /// tokens which later fail move validation.
    pub fn from_payload(payload: &str) -> PositionParams {
        let fen_start = payload.find("fen ").map(|ind| ind + "fen ".len());
        let moves_start = payload.find("moves ").map(|ind| ind + "moves ".len());

        let fen = fen_start.map(|start| {
            let end = match payload.find("moves ") {
                Some(end) if end > start => end,
                _ => payload.len(),
            };
            payload[start..end].trim().to_string()
        });

        let moves = match moves_start {
            Some(start) => split_move_tokens(&payload[start..]),
            None => Vec::new(),
        };

        PositionParams { fen, moves }
    }
}

/// Splits a move list into fixed-width tokens: four characters each, plus a fifth promotion
/// character when the next character is not a space.
fn split_move_tokens(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut token = String::new();
        for _ in 0..4 {
            match chars.next() {
                Some(c) => token.push(c),
                None => break,
            }
        }
        if let Some(&c) = chars.peek() {
            if c != ' ' {
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    tokens
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The parsed payload of a `go` command.
///
/// Only the tokens which steer book interception are extracted; the search limits
/// themselves are either rewritten wholesale or forwarded untouched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GoParams {
    /// The command contains the `infinite` token.
    pub infinite: bool,
    /// The command contains the `ponder` token.
    pub ponder: bool,
}

impl GoParams {
    /// Scans everything following the `go` keyword for the tokens of interest.
    pub fn from_payload(payload: &str) -> GoParams {
        let mut params = GoParams::default();
        for token in payload.split_whitespace() {
            match token {
                "infinite" => params.infinite = true,
                "ponder" => params.ponder = true,
                _ => { },
            }
        }

        params
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Commands from the controller which the adapter interprets.
///
/// Any line which does not parse as one of these is forwarded to the backend engine
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Asks the engine to identify itself and announce its options.
    ///
    /// ```text
    /// uci
    /// ```
    Uci,

    /// Sets the value of an option. Options under the adapter's namespace are applied
    /// locally; everything else belongs to the backend engine.
    ///
    /// ```text
    /// setoption name NAME value VALUE
    /// ```
    ///
    /// NAME may contain spaces. The form without a `value` clause (used for button options)
    /// is deliberately not matched here, since the adapter owns no buttons.
    SetOption {
        /// The name of the option, which may contain spaces.
        name: String,
        /// The new value.
        value: String,
    },

    /// Replaces the game state with the given board description and move list.
    ///
    /// ```text
    /// position [startpos | fen FEN] [moves MOVE...]
    /// ```
    Position(PositionParams),

    /// Starts a search. The payload carries the tokens relevant to book interception.
    ///
    /// ```text
    /// go [LIMIT...]
    /// ```
    Go(GoParams),

    /// Reports that the opponent played the expected ponder move.
    ///
    /// ```text
    /// ponderhit
    /// ```
    PonderHit,

    /// Halts the current search.
    ///
    /// ```text
    /// stop
    /// ```
    Stop,

    /// Announces that the next position belongs to a new game.
    ///
    /// ```text
    /// ucinewgame
    /// ```
    NewGame,

    /// Ends the session.
    ///
    /// ```text
    /// quit
    /// ```
    Quit,
}

const COMMANDS: [&str; 8] = [
    r"^uci\s*$",
    r"^setoption\s+name\s+(.+?)\s+value\s+(.*)$",
    r"^position(?:\s+(.*))?$",
    r"^go(?:\s+(.*))?$",
    r"^ponderhit\s*$",
    r"^stop\s*$",
    r"^ucinewgame\s*$",
    r"^quit\s*$",
];

lazy_static! {
    static ref COMMAND_SET: RegexSet = RegexSet::new(&COMMANDS).expect("INFALLIBLE");
    static ref COMMAND_VEC: Vec<Regex> = {
        let mut cmd_vec = Vec::new();
        for cmd in &COMMANDS {
            cmd_vec.push(Regex::new(cmd).expect("INFALLIBLE"));
        }
        cmd_vec
    };
}

impl FromStr for Command {
    type Err = UciError;

    fn from_str(s: &str) -> Result<Self, UciError> {
        use Command::*;

        if let Some(ind) = COMMAND_SET.matches(s).iter().next() {
            let args = COMMAND_VEC[ind].captures(s).expect("INFALLIBLE");

            match ind {
                0 => Ok(Uci),
                1 => {
                    let name = args.get(1).expect("INFALLIBLE").as_str().to_string();
                    let value = args.get(2).expect("INFALLIBLE").as_str().to_string();
                    Ok(SetOption{ name, value })
                },
                2 => {
                    let payload = args.get(1).map_or("", |arg| arg.as_str());
                    Ok(Position(PositionParams::from_payload(payload)))
                },
                3 => {
                    let payload = args.get(1).map_or("", |arg| arg.as_str());
                    Ok(Go(GoParams::from_payload(payload)))
                },
                4 => Ok(PonderHit),
                5 => Ok(Stop),
                6 => Ok(NewGame),
                7 => Ok(Quit),
                _ => Err(UciError),
            }
        } else {
            Err(UciError)
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Responses the adapter synthesizes toward the controller, plus the identification lines it
/// captures from the backend engine during the startup handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Identifies the engine by name.
    ///
    /// ```text
    /// id name NAME
    /// ```
    IdName(String),

    /// Identifies the engine's author.
    ///
    /// ```text
    /// id author AUTHOR
    /// ```
    IdAuthor(String),

    /// Ends the option announcement.
    ///
    /// ```text
    /// uciok
    /// ```
    UciOk,

    /// A search progress report. The adapter only ever synthesizes the fixed shape which
    /// accompanies a book move.
    ///
    /// ```text
    /// info depth D time T nodes N nps P cpuload C
    /// ```
    Info {
        /// Nominal search depth.
        depth: u32,
        /// Time spent searching, in milliseconds.
        time: u32,
        /// Number of positions visited.
        nodes: u64,
        /// Positions visited per second.
        nps: u64,
        /// Processor load in permill.
        cpuload: u32,
    },

    /// Delivers the chosen move.
    ///
    /// ```text
    /// bestmove MOVE
    /// ```
    BestMove(String),
}

impl Response {
    /// The progress report which precedes a book move.
    pub fn book_info() -> Response {
        Response::Info { depth: 1, time: 0, nodes: 0, nps: 0, cpuload: 0 }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Response::*;

        match self {
            IdName(name) => write!(f, "id name {}", name),
            IdAuthor(author) => write!(f, "id author {}", author),
            UciOk => write!(f, "uciok"),
            Info { depth, time, nodes, nps, cpuload } => {
                write!(f, "info depth {} time {} nodes {} nps {} cpuload {}",
                    depth, time, nodes, nps, cpuload)
            },
            BestMove(mv) => write!(f, "bestmove {}", mv),
        }
    }
}

const RESPONSES: [&str; 3] = [
    r"^id\s+name\s+(.*)$",
    r"^id\s+author\s+(.*)$",
    r"^uciok\s*$",
];

lazy_static! {
    static ref RESPONSE_SET: RegexSet = RegexSet::new(&RESPONSES).expect("INFALLIBLE");
    static ref RESPONSE_VEC: Vec<Regex> = {
        let mut resp_vec = Vec::new();
        for resp in &RESPONSES {
            resp_vec.push(Regex::new(resp).expect("INFALLIBLE"));
        }
        resp_vec
    };
}

impl FromStr for Response {
    type Err = UciError;

    /// Parses the subset of engine responses the handshake consumes: `id name`, `id author`
    /// and `uciok`. Everything else, including `info` and `bestmove` lines, is relayed
    /// without interpretation and fails to parse here.
    fn from_str(s: &str) -> Result<Self, UciError> {
        use Response::*;

        if let Some(ind) = RESPONSE_SET.matches(s).iter().next() {
            let args = RESPONSE_VEC[ind].captures(s).expect("INFALLIBLE");

            match ind {
                0 => Ok(IdName(args.get(1).expect("INFALLIBLE").as_str().trim().to_string())),
                1 => Ok(IdAuthor(args.get(1).expect("INFALLIBLE").as_str().trim().to_string())),
                2 => Ok(UciOk),
                _ => Err(UciError),
            }
        } else {
            Err(UciError)
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Error type for UCI parsing
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UciError;

////////////////////////////////////////////////////////////////////////////////////////////////////
// ***************************************** UNIT TESTS ***************************************** //
////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_command() {
        use Command::*;

        assert_eq!("uci".parse(), Ok(Uci));
        assert_eq!("ponderhit".parse(), Ok(PonderHit));
        assert_eq!("stop".parse(), Ok(Stop));
        assert_eq!("ucinewgame".parse(), Ok(NewGame));
        assert_eq!("quit".parse(), Ok(Quit));

        assert_eq!(
            "setoption name Hash value 64".parse(),
            Ok(SetOption{ name: "Hash".to_string(), value: "64".to_string() })
        );
        assert_eq!(
            "setoption name Bookman BookDepth value 30".parse(),
            Ok(SetOption{ name: "Bookman BookDepth".to_string(), value: "30".to_string() })
        );
        assert_eq!(
            "setoption name NalimovPath value C:\\tb 3;C:\\tb 4".parse(),
            Ok(SetOption{
                name: "NalimovPath".to_string(),
                value: "C:\\tb 3;C:\\tb 4".to_string()
            })
        );

        // commands the adapter does not interpret are not recognized
        assert_eq!("isready".parse::<Command>(), Err(UciError));
        assert_eq!("debug on".parse::<Command>(), Err(UciError));
        assert_eq!("setoption name Clear Hash".parse::<Command>(), Err(UciError));
        assert_eq!("".parse::<Command>(), Err(UciError));
    }

    #[test]
    fn parse_position_command() {
        use Command::*;

        assert_eq!("position startpos".parse(), Ok(Position(PositionParams::default())));
        assert_eq!("position".parse(), Ok(Position(PositionParams::default())));

        assert_eq!(
            "position startpos moves e2e4 e7e5".parse(),
            Ok(Position(PositionParams{
                fen: None,
                moves: vec!["e2e4".to_string(), "e7e5".to_string()],
            }))
        );
        assert_eq!(
            "position fen 4k3/P7/8/8/8/8/8/4K3 w - - 0 1 moves a7a8q".parse(),
            Ok(Position(PositionParams{
                fen: Some("4k3/P7/8/8/8/8/8/4K3 w - - 0 1".to_string()),
                moves: vec!["a7a8q".to_string()],
            }))
        );
        assert_eq!(
            "position fen 4k3/P7/8/8/8/8/8/4K3 w - - 0 1".parse(),
            Ok(Position(PositionParams{
                fen: Some("4k3/P7/8/8/8/8/8/4K3 w - - 0 1".to_string()),
                moves: vec![],
            }))
        );
    }

    #[test]
    fn parse_go_command() {
        use Command::*;

        assert_eq!("go".parse(), Ok(Go(GoParams{ infinite: false, ponder: false })));
        assert_eq!("go depth 10".parse(), Ok(Go(GoParams{ infinite: false, ponder: false })));
        assert_eq!("go infinite".parse(), Ok(Go(GoParams{ infinite: true, ponder: false })));
        assert_eq!(
            "go wtime 300000 btime 300000 ponder".parse(),
            Ok(Go(GoParams{ infinite: false, ponder: true }))
        );
        assert_eq!(
            "go ponder infinite".parse(),
            Ok(Go(GoParams{ infinite: true, ponder: true }))
        );
    }

    #[test]
    fn move_tokens_are_fixed_width() {
        assert_eq!(split_move_tokens("e2e4 e7e5 g1f3"), ["e2e4", "e7e5", "g1f3"]);
        assert_eq!(split_move_tokens("  e2e4   e7e5 "), ["e2e4", "e7e5"]);
        assert_eq!(split_move_tokens("a7a8q b8c6"), ["a7a8q", "b8c6"]);
        assert_eq!(split_move_tokens(""), Vec::<String>::new());
        // malformed input degrades into tokens that fail validation later
        assert_eq!(split_move_tokens("e2e4 e7"), ["e2e4", "e7"]);
        assert_eq!(split_move_tokens("e2e4q9 e7e5"), ["e2e4q", "9 e7e", "5"]);
    }

    #[test]
    fn format_response() {
        use Response::*;

        assert_eq!(IdName("Fruit 2.1".to_string()).to_string(), "id name Fruit 2.1");
        assert_eq!(IdAuthor("Fabien Letouzey".to_string()).to_string(),
            "id author Fabien Letouzey");
        assert_eq!(UciOk.to_string(), "uciok");
        assert_eq!(Response::book_info().to_string(),
            "info depth 1 time 0 nodes 0 nps 0 cpuload 0");
        assert_eq!(BestMove("g1f3".to_string()).to_string(), "bestmove g1f3");
    }

    #[test]
    fn parse_response() {
        use Response::*;

        assert_eq!("id name Fruit 2.1".parse(), Ok(IdName("Fruit 2.1".to_string())));
        assert_eq!("id author Fabien Letouzey".parse(),
            Ok(IdAuthor("Fabien Letouzey".to_string())));
        assert_eq!("uciok".parse(), Ok(UciOk));

        assert_eq!("readyok".parse::<Response>(), Err(UciError));
        assert_eq!("info depth 8 nodes 12345".parse::<Response>(), Err(UciError));
        assert_eq!("bestmove e2e4".parse::<Response>(), Err(UciError));
    }
}
