//! The session state machine: routes each line between the controller and the backend
//! engine, answering from the opening book where it can.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use log::{error, info, warn};
use crate::book::Book;
use crate::chess::Move;
use crate::limits::Overrides;
use crate::options::{Options, NAMESPACE};
use crate::protocol::uci::{Command, GoParams, Response};
use crate::replay::Replayer;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A line the session wants sent, tagged with its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A line for the controller.
    Gui(String),
    /// A line for the backend engine.
    Engine(String),
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// One adapter session: the shadow replay of the game, the option registry, the opening
/// book, and the single slot for a book answer deferred by a ponder search.
///
/// The session owns no I/O. Each inbound line goes through [`handle_gui_line`] or
/// [`handle_engine_line`], which return the lines to send on. The two entry points must be
/// called from a single dispatching thread.
///
/// [`handle_gui_line`]: #method.handle_gui_line
/// [`handle_engine_line`]: #method.handle_engine_line
#[derive(Debug)]
pub struct Session {
    replayer: Replayer,
    options: Options,
    book: Box<dyn Book>,
    pending: Option<String>,
    init: bool,
    quitting: bool,
}

impl Session {
    /// Creates a session over the given settings and book.
    pub fn new(options: Options, book: Box<dyn Book>) -> Session {
        Session {
            replayer: Replayer::new(),
            options,
            book,
            pending: None,
            init: true,
            quitting: false,
        }
    }

    /// Returns false once the controller has asked the session to quit.
    pub fn running(&self) -> bool {
        !self.quitting
    }

    /// Handles one line from the controller, returning the lines to send on.
    ///
    /// Lines which are not recognized commands belong to the backend engine and are
    /// forwarded verbatim.
    pub fn handle_gui_line(&mut self, line: &str) -> Vec<Outbound> {
        match line.parse::<Command>() {
            Ok(Command::Uci) => self.announce(),
            Ok(Command::SetOption { name, value }) => self.set_option(line, &name, &value),
            Ok(Command::Position(params)) => {
                self.init = false;
                if let Err(err) = self.replayer.load(&params) {
                    warn!("position not fully replayed: {}", err);
                }
                vec![Outbound::Engine(line.to_string())]
            },
            Ok(Command::Go(params)) => self.go(line, &params),
            Ok(Command::PonderHit) | Ok(Command::Stop) => self.finish_pondering(line),
            Ok(Command::NewGame) => {
                self.replayer.reset();
                self.pending = None;
                self.init = true;
                vec![Outbound::Engine(line.to_string())]
            },
            Ok(Command::Quit) => {
                info!("quit received from the controller");
                self.quitting = true;
                vec![Outbound::Engine(line.to_string())]
            },
            Err(_) => vec![Outbound::Engine(line.to_string())],
        }
    }

    /// Handles one line from the backend engine. Engine output is relayed to the controller
    /// without interpretation.
    pub fn handle_engine_line(&mut self, line: &str) -> Vec<Outbound> {
        vec![Outbound::Gui(line.to_string())]
    }

    // Answers `uci` on the backend's behalf: its identification and options as captured at
    // startup, then the adapter's own options, then the ready marker.
    fn announce(&self) -> Vec<Outbound> {
        let version = self.options.get_int("UCIVersion");
        let name = self.options.engine_name().unwrap_or("Bookman");
        let author = self.options.engine_author().unwrap_or("unknown");

        let mut out = vec![
            Outbound::Gui(Response::IdName(name.to_string()).to_string()),
            Outbound::Gui(Response::IdAuthor(author.to_string()).to_string()),
        ];
        for entry in self.options.iter() {
            out.push(Outbound::Gui(entry.to_wire(version)));
        }
        out.push(Outbound::Gui(Response::UciOk.to_string()));

        out
    }

    // Applies a namespaced `setoption` locally; anything else is the backend's business.
    // A rejected value is kept out of the registry and answered with silence, as the
    // protocol has no failure reply.
    fn set_option(&mut self, line: &str, name: &str, value: &str) -> Vec<Outbound> {
        if name.starts_with(NAMESPACE) {
            let name = &name[NAMESPACE.len()..];
            if let Err(err) = self.options.set(name, value) {
                warn!("setoption \"{}\" rejected: {}", name, err);
            }
            Vec::new()
        } else {
            vec![Outbound::Engine(line.to_string())]
        }
    }

    fn go(&mut self, line: &str, params: &GoParams) -> Vec<Outbound> {
        if self.init {
            self.replayer.reset();
            self.init = false;
        }
        if self.pending.take().is_some() {
            error!("a deferred book move was never collected; dropping it");
        }

        let overrides = Overrides::from_options(&self.options);

        // An infinite search normally goes to the engine, but a configured override limit
        // means the search will end on its own, so the book may answer it after all.
        if (!params.infinite || overrides.any())
                && i64::from(self.replayer.ply_count()) < self.options.get_int("BookDepth") {
            let random = self.options.get_bool("BookRandom");
            if let Some(text) = self.book.probe(self.replayer.position(), random) {
                match Move::from_coord(self.replayer.position(), &text) {
                    Ok(mv) => {
                        if params.ponder {
                            self.pending = Some(mv.to_string());
                            return Vec::new();
                        }
                        return Session::book_reply(&mv.to_string());
                    },
                    Err(err) => warn!("book move {} is not legal here: {}", text, err),
                }
            }
        }

        match overrides.winning_limit() {
            Some(limit) => {
                info!("search limits rewritten to \"{}\"", limit);
                vec![Outbound::Engine(format!("go {}", limit))]
            },
            None => vec![Outbound::Engine(line.to_string())],
        }
    }

    fn finish_pondering(&mut self, line: &str) -> Vec<Outbound> {
        match self.pending.take() {
            Some(mv) => Session::book_reply(&mv),
            None => vec![Outbound::Engine(line.to_string())],
        }
    }

    // Controllers expect at least one info line ahead of a best move, so a canned one goes
    // out in place of real search output.
    fn book_reply(mv: &str) -> Vec<Outbound> {
        info!("answering from the book: {}", mv);

        vec![
            Outbound::Gui(Response::book_info().to_string()),
            Outbound::Gui(Response::BestMove(mv.to_string()).to_string()),
        ]
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// ***************************************** UNIT TESTS ***************************************** //
////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod test {
    use super::*;
    use crate::book::MemoryBook;
    use crate::chess::Position;
    use crate::options::OptionEntry;

    fn session_with_lines(lines: &[(&str, u32)]) -> Session {
        let mut book = MemoryBook::new();
        for (line, weight) in lines {
            book.add_line_weighted(line, *weight).unwrap();
        }
        Session::new(Options::new(), Box::new(book))
    }

    fn to_engine(line: &str) -> Vec<Outbound> {
        vec![Outbound::Engine(line.to_string())]
    }

    fn book_reply(mv: &str) -> Vec<Outbound> {
        vec![
            Outbound::Gui("info depth 1 time 0 nodes 0 nps 0 cpuload 0".to_string()),
            Outbound::Gui(format!("bestmove {}", mv)),
        ]
    }

    // A book that recommends the same move no matter the position.
    #[derive(Debug)]
    struct FixedBook(&'static str);

    impl Book for FixedBook {
        fn probe(&self, _: &Position, _: bool) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn announce_ends_with_uciok_and_goes_only_to_the_gui() {
        let mut options = Options::new();
        options.set_engine_name("Stockfish 11");
        options.set_engine_author("the Stockfish developers");
        options.insert(OptionEntry::from_wire(
            "option name Hash type spin default 16 min 1 max 33554432").unwrap());

        let mut session = Session::new(options, Box::new(MemoryBook::new()));
        let out = session.handle_gui_line("uci");

        assert_eq!(out[0], Outbound::Gui("id name Stockfish 11".to_string()));
        assert_eq!(out[1], Outbound::Gui("id author the Stockfish developers".to_string()));
        assert_eq!(out[2], Outbound::Gui(
            "option name Hash type spin default 16 min 1 max 33554432".to_string()));
        assert!(out.contains(&Outbound::Gui(
            "option name Bookman BookDepth type spin default 256 min 0 max 256".to_string())));
        assert_eq!(*out.last().unwrap(), Outbound::Gui("uciok".to_string()));
        assert!(out.iter().all(|o| match o { Outbound::Gui(_) => true, _ => false }));
    }

    #[test]
    fn announce_has_fallbacks_for_a_silent_engine() {
        let mut session = session_with_lines(&[]);
        let out = session.handle_gui_line("uci");
        assert_eq!(out[0], Outbound::Gui("id name Bookman".to_string()));
        assert_eq!(out[1], Outbound::Gui("id author unknown".to_string()));
    }

    #[test]
    fn announce_normalizes_types_by_protocol_version() {
        let mut options = Options::new();
        options.insert(OptionEntry::from_wire(
            "option name Log File type string file default log.txt").unwrap());
        let mut session = Session::new(options, Box::new(MemoryBook::new()));

        let out = session.handle_gui_line("uci");
        assert!(out.contains(&Outbound::Gui(
            "option name Log File type string default log.txt".to_string())));

        assert_eq!(session.handle_gui_line("setoption name Bookman UCIVersion value 3"),
            vec![]);
        let out = session.handle_gui_line("uci");
        assert!(out.contains(&Outbound::Gui(
            "option name Log File type string file default log.txt".to_string())));
    }

    #[test]
    fn adapter_setoptions_are_consumed() {
        let mut session = session_with_lines(&[]);
        assert_eq!(session.handle_gui_line("setoption name Bookman BookDepth value 12"),
            vec![]);

        let out = session.handle_gui_line("uci");
        assert!(out.contains(&Outbound::Gui(
            "option name Bookman BookDepth type spin default 12 min 0 max 256".to_string())));
    }

    #[test]
    fn rejected_adapter_setoptions_keep_the_prior_value() {
        let mut session = session_with_lines(&[]);
        session.handle_gui_line("setoption name Bookman BookDepth value 12");
        assert_eq!(session.handle_gui_line("setoption name Bookman BookDepth value 999"),
            vec![]);
        assert_eq!(session.handle_gui_line("setoption name Bookman NoSuchOption value 1"),
            vec![]);

        let out = session.handle_gui_line("uci");
        assert!(out.contains(&Outbound::Gui(
            "option name Bookman BookDepth type spin default 12 min 0 max 256".to_string())));
    }

    #[test]
    fn engine_setoptions_are_forwarded() {
        let mut session = session_with_lines(&[]);
        assert_eq!(session.handle_gui_line("setoption name Hash value 128"),
            to_engine("setoption name Hash value 128"));
        // the button form has no value clause and passes through unparsed
        assert_eq!(session.handle_gui_line("setoption name Clear Hash"),
            to_engine("setoption name Clear Hash"));
    }

    #[test]
    fn position_commands_are_forwarded_verbatim() {
        let mut session = session_with_lines(&[]);
        let line = "position startpos moves e2e4 e7e5";
        assert_eq!(session.handle_gui_line(line), to_engine(line));
    }

    #[test]
    fn unknown_commands_pass_through() {
        let mut session = session_with_lines(&[]);
        assert_eq!(session.handle_gui_line("isready"), to_engine("isready"));
        assert_eq!(session.handle_gui_line("debug on"), to_engine("debug on"));
    }

    #[test]
    fn engine_output_is_relayed_untouched() {
        let mut session = session_with_lines(&[]);
        assert_eq!(session.handle_engine_line("info depth 22 score cp 31"),
            vec![Outbound::Gui("info depth 22 score cp 31".to_string())]);
        assert_eq!(session.handle_engine_line("bestmove e7e5 ponder g1f3"),
            vec![Outbound::Gui("bestmove e7e5 ponder g1f3".to_string())]);
    }

    #[test]
    fn the_book_answers_without_the_backend() {
        let mut session = session_with_lines(&[("g1f3", 1)]);
        session.handle_gui_line("position startpos");
        assert_eq!(session.handle_gui_line("go wtime 300000 btime 300000"),
            book_reply("g1f3"));
    }

    #[test]
    fn the_book_follows_the_replayed_position() {
        let mut session = session_with_lines(&[("e2e4 c7c5 g1f3", 1)]);
        session.handle_gui_line("position startpos moves e2e4 c7c5");
        assert_eq!(session.handle_gui_line("go movetime 1000"), book_reply("g1f3"));
    }

    #[test]
    fn go_before_any_position_plays_from_the_start() {
        let mut session = session_with_lines(&[("e2e4", 1)]);
        assert_eq!(session.handle_gui_line("go wtime 500 btime 500"), book_reply("e2e4"));
    }

    #[test]
    fn book_depth_zero_disables_the_book() {
        let mut session = session_with_lines(&[("e2e4 e7e5 g1f3", 1)]);
        session.handle_gui_line("setoption name Bookman BookDepth value 0");
        session.handle_gui_line("position startpos moves e2e4 e7e5");
        assert_eq!(session.handle_gui_line("go depth 10"), to_engine("go depth 10"));
    }

    #[test]
    fn book_depth_is_a_strict_bound() {
        let mut session = session_with_lines(&[("e2e4 e7e5 g1f3", 1)]);
        session.handle_gui_line("position startpos moves e2e4 e7e5");

        session.handle_gui_line("setoption name Bookman BookDepth value 2");
        assert_eq!(session.handle_gui_line("go movetime 1000"), to_engine("go movetime 1000"));

        session.handle_gui_line("setoption name Bookman BookDepth value 3");
        assert_eq!(session.handle_gui_line("go movetime 1000"), book_reply("g1f3"));
    }

    #[test]
    fn a_huge_fullmove_counter_skips_the_book() {
        let mut session = session_with_lines(&[("e2e4", 1)]);
        session.handle_gui_line("position fen 4k3/8/8/8/8/8/8/4K3 w - - 0 3000000000");
        assert_eq!(session.handle_gui_line("go movetime 100"), to_engine("go movetime 100"));
        assert!(session.running());
    }

    #[test]
    fn infinite_searches_skip_the_book_unless_overridden() {
        let mut session = session_with_lines(&[("e2e4", 1)]);
        session.handle_gui_line("position startpos");
        assert_eq!(session.handle_gui_line("go infinite"), to_engine("go infinite"));

        session.handle_gui_line("setoption name Bookman DepthLimit value 8");
        assert_eq!(session.handle_gui_line("go infinite"), book_reply("e2e4"));
    }

    #[test]
    fn overrides_rewrite_the_go_command() {
        let mut session = session_with_lines(&[]);
        session.handle_gui_line("position startpos moves e2e4");

        session.handle_gui_line("setoption name Bookman NodesLimit value 500000");
        assert_eq!(session.handle_gui_line("go wtime 1000 btime 1000"),
            to_engine("go nodes 500000"));

        session.handle_gui_line("setoption name Bookman Movetime value 2500");
        assert_eq!(session.handle_gui_line("go wtime 1000 btime 1000"),
            to_engine("go movetime 2500"));

        session.handle_gui_line("setoption name Bookman AverageMovetime value 1000");
        session.handle_gui_line("setoption name Bookman AverageMovetimeWindow value 20");
        assert_eq!(session.handle_gui_line("go wtime 1000 btime 1000"),
            to_engine("go wtime 20000 btime 20000 movestogo 20"));
    }

    #[test]
    fn time_overrides_respect_the_host_performance_factor() {
        let mut session = session_with_lines(&[]);
        session.handle_gui_line("position startpos moves e2e4");
        session.handle_gui_line("setoption name Bookman Movetime value 1001");
        session.handle_gui_line("setoption name Bookman HostPerformanceFactor value 0.5");
        assert_eq!(session.handle_gui_line("go infinite"), to_engine("go movetime 500"));
    }

    #[test]
    fn extreme_time_settings_saturate_the_rewrite() {
        let mut session = session_with_lines(&[]);
        session.handle_gui_line(
            "setoption name Bookman AverageMovetime value 10000000000000000000");
        session.handle_gui_line("position startpos");
        assert_eq!(session.handle_gui_line("go infinite"),
            to_engine("go wtime 9223372036854775807 btime 9223372036854775807 movestogo 10"));
    }

    #[test]
    fn ponder_defers_the_book_answer() {
        let mut session = session_with_lines(&[("d2d4", 1)]);
        session.handle_gui_line("position startpos");

        assert_eq!(session.handle_gui_line("go ponder wtime 60000 btime 60000"), vec![]);
        assert_eq!(session.handle_gui_line("ponderhit"), book_reply("d2d4"));

        // the slot is empty again, so the next ponderhit is the backend's business
        assert_eq!(session.handle_gui_line("ponderhit"), to_engine("ponderhit"));
    }

    #[test]
    fn stop_also_collects_the_deferred_answer() {
        let mut session = session_with_lines(&[("d2d4", 1)]);
        session.handle_gui_line("position startpos");

        assert_eq!(session.handle_gui_line("go ponder wtime 60000 btime 60000"), vec![]);
        assert_eq!(session.handle_gui_line("stop"), book_reply("d2d4"));
        assert_eq!(session.handle_gui_line("stop"), to_engine("stop"));
    }

    #[test]
    fn a_new_search_drops_an_uncollected_deferred_answer() {
        let mut session = session_with_lines(&[("d2d4", 1)]);
        session.handle_gui_line("position startpos");
        session.handle_gui_line("go ponder wtime 60000 btime 60000");

        session.handle_gui_line("setoption name Bookman BookDepth value 0");
        assert_eq!(session.handle_gui_line("go movetime 100"), to_engine("go movetime 100"));
        assert_eq!(session.handle_gui_line("stop"), to_engine("stop"));
    }

    #[test]
    fn ucinewgame_resets_the_session() {
        let mut session = session_with_lines(&[("e2e4", 1)]);
        session.handle_gui_line("position startpos moves e2e4 e7e5");
        assert_eq!(session.handle_gui_line("ucinewgame"), to_engine("ucinewgame"));
        assert_eq!(session.handle_gui_line("go wtime 500 btime 500"), book_reply("e2e4"));
    }

    #[test]
    fn an_illegal_book_move_falls_through_to_the_backend() {
        let mut session = Session::new(Options::new(), Box::new(FixedBook("e2e5")));
        session.handle_gui_line("position startpos");
        assert_eq!(session.handle_gui_line("go movetime 100"), to_engine("go movetime 100"));
    }

    #[test]
    fn a_partial_replay_still_answers_from_its_prefix() {
        let mut session = session_with_lines(&[("e2e4 e7e5", 1)]);
        session.handle_gui_line("position startpos moves e2e4 a7a9");
        assert_eq!(session.handle_gui_line("go movetime 100"), book_reply("e7e5"));
    }

    #[test]
    fn quit_marks_the_session_done() {
        let mut session = session_with_lines(&[]);
        assert!(session.running());
        assert_eq!(session.handle_gui_line("quit"), to_engine("quit"));
        assert!(!session.running());
    }
}
