//! A UCI adapter that answers opening moves from a book on behalf of a backend chess engine.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
#![warn(missing_docs, missing_debug_implementations, unused_extern_crates)]
#![warn(clippy::unimplemented, clippy::todo)]
#![warn(clippy::option_unwrap_used, clippy::result_unwrap_used)]

use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use clap::{App, AppSettings, Arg, SubCommand, crate_version};
use log::{debug, info, warn};
use simplelog::{WriteLogger, LevelFilter, Config};
use bookman::book::MemoryBook;
use bookman::chess::{Move, Position};
use bookman::options::{OptionEntry, Options};
use bookman::protocol::io::{Engine, Event, Gui};
use bookman::protocol::uci::Response;
use bookman::session::{Outbound, Session};

fn main() -> Result<(), Error> {
    let app_dir = dirs::home_dir()
        .map(|home| { home.join(".bookman") })
        .unwrap_or_else(|| PathBuf::from("."));

    let matches =
        App::new("Bookman")
            .version(crate_version!())
            .author("Mike Leany")
            .setting(AppSettings::SubcommandsNegateReqs)
            .setting(AppSettings::TrailingVarArg)
            .arg(Arg::with_name("engine")
                .value_name("ENGINE")
                .required(true)
                .help("Path of the backend engine to run"))
            .arg(Arg::with_name("args")
                .value_name("ARGS")
                .multiple(true)
                .help("Arguments passed through to the backend engine"))
            .arg(Arg::with_name("book")
                .long("book")
                .short("b")
                .value_name("BOOK_FILE")
                .takes_value(true)
                .help("Sets the opening book file"))
            .arg(Arg::with_name("option")
                .long("option")
                .short("o")
                .value_name("NAME=VALUE")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Presets one of the adapter's own options"))
            .arg(Arg::with_name("log")
                .long("log")
                .short("l")
                .global(true)
                .help("Turns on logging"))
            .arg(Arg::with_name("log-file")
                .long("log-file")
                .global(true)
                .value_name("LOG_FILE")
                .takes_value(true)
                .default_value("bookman.log")
                .help("Sets the log file if logging is turned on"))
            .arg(Arg::with_name("log-level")
                .long("log-level")
                .global(true)
                .value_name("LEVEL")
                .takes_value(true)
                .default_value("info")
                .help("Sets the log level if logging is turned on"))
            .subcommand(SubCommand::with_name("make-book")
                .about("Compiles text files of opening lines into a book file. Each input \
                        line is a\nwhitespace-separated sequence of coordinate moves from the \
                        starting position.")
                .arg(Arg::with_name("out")
                    .long("out")
                    .short("o")
                    .value_name("BOOK_FILE")
                    .takes_value(true)
                    .default_value("book.yaml")
                    .help("File to write the book to"))
                .arg(Arg::with_name("max-plies")
                    .long("max-plies")
                    .value_name("PLIES")
                    .takes_value(true)
                    .default_value("1024")
                    .help("Truncates each line to at most this many moves"))
                .arg(Arg::with_name("files")
                    .value_name("FILE")
                    .required(true)
                    .multiple(true)
                    .help("Input files of opening lines")))
            .get_matches();

    let log_file = PathBuf::from(matches.value_of_os("log-file").expect("INFALLIBLE"));
    let log_level = match matches.value_of("log-level") {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some(level) => return Err(Error(format!("{}: invalid log level", level))),
        None => unreachable!(),
    };

    let _logger = if matches.is_present("log") {
        WriteLogger::init(
            log_level,
            Config::default(),
            File::create(&log_file).map_err(|err| {
                Error(format!("{}: {}", log_file.display(), err))
            })?)
    } else {
        WriteLogger::init(LevelFilter::Off, Config::default(), std::io::sink())
    };

    match matches.subcommand() {
        (_, None) => run(&matches, &app_dir),
        ("make-book", Some(matches)) => make_book(matches),
        _ => unreachable!(),
    }
}

// Runs an adapter session: spawns the backend, performs its startup handshake, then shuttles
// lines between the controller and the backend until one of them is done.
fn run(matches: &clap::ArgMatches<'_>, app_dir: &Path) -> Result<(), Error> {
    let engine_cmd = matches.value_of("engine").expect("INFALLIBLE");
    let engine_args: Vec<&str> = matches.values_of("args")
        .map_or_else(Vec::new, |args| args.collect());

    let mut options = Options::new();
    if let Some(presets) = matches.values_of("option") {
        for preset in presets {
            let mut parts = preset.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(name), Some(value)) => {
                    if let Err(err) = options.set(name, value) {
                        warn!("ignoring --option {}: {}", preset, err);
                    }
                },
                _ => warn!("ignoring --option {}: expected NAME=VALUE", preset),
            }
        }
    }

    let book = match matches.value_of_os("book") {
        Some(path) => load_book(&PathBuf::from(path))?,
        None => {
            let path = app_dir.join("book.yaml");
            if path.is_file() {
                load_book(&path)?
            } else {
                MemoryBook::new()
            }
        },
    };
    info!("book knows {} positions", book.len());
    if let Ok(host) = hostname::get() {
        info!("running on {}", host.to_string_lossy());
    }
    info!("host performance factor is {}", options.get_float("HostPerformanceFactor"));

    let (events, inbox) = mpsc::channel();
    let mut engine = Engine::start(engine_cmd, &engine_args, events.clone())
        .map_err(|err| Error(format!("{}: {}", engine_cmd, err)))?;

    // capture the backend's identification and options before speaking to the controller
    engine.send("uci");
    loop {
        match inbox.recv() {
            Ok(Event::FromEngine(line)) => {
                if let Some(entry) = OptionEntry::from_wire(&line) {
                    options.insert(entry);
                } else {
                    match line.parse() {
                        Ok(Response::IdName(name)) => options.set_engine_name(&name),
                        Ok(Response::IdAuthor(author)) => options.set_engine_author(&author),
                        Ok(Response::UciOk) => break,
                        _ => debug!("ignoring handshake line: {}", line),
                    }
                }
            },
            Ok(Event::EngineClosed) => {
                return Err(Error(format!("{}: engine exited during startup", engine_cmd)));
            },
            Ok(_) => { },
            Err(_) => return Err(Error("event channel closed".to_string())),
        }
    }

    Gui::connect(events);
    let mut session = Session::new(options, Box::new(book));

    while session.running() {
        let outbound = match inbox.recv() {
            Ok(Event::FromGui(line)) => session.handle_gui_line(&line),
            Ok(Event::FromEngine(line)) => session.handle_engine_line(&line),
            Ok(Event::GuiClosed) => {
                info!("controller went away");
                engine.send("quit");
                break;
            },
            Ok(Event::EngineClosed) => {
                return Err(Error(format!("{}: engine exited unexpectedly", engine_cmd)));
            },
            Err(_) => break,
        };

        for line in outbound {
            match line {
                Outbound::Gui(line) => Gui::send(&line),
                Outbound::Engine(line) => engine.send(&line),
            }
        }
    }

    Ok(())
}

fn load_book(path: &Path) -> Result<MemoryBook, Error> {
    MemoryBook::from_yaml_file(path)
        .map_err(|err| Error(format!("{}: {}", path.display(), err)))
}

// Compiles text files of opening lines into the YAML book format, counting repeated lines
// into their weights.
fn make_book(matches: &clap::ArgMatches<'_>) -> Result<(), Error> {
    let out = PathBuf::from(matches.value_of_os("out").expect("INFALLIBLE"));
    let max_plies: usize = matches.value_of("max-plies")
        .expect("INFALLIBLE")
        .parse()
        .map_err(|_| Error("max-plies must be numeric".to_owned()))?;

    let mut weights: HashMap<String, u32> = HashMap::new();
    let mut discarded = 0;
    for path in matches.values_of_os("files").expect("INFALLIBLE") {
        let path = PathBuf::from(path);
        let text = fs::read_to_string(&path)
            .map_err(|err| Error(format!("{}: {}", path.display(), err)))?;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match normalize_line(line, max_plies) {
                Some(normalized) => {
                    let weight = weights.entry(normalized).or_insert(0);
                    *weight = weight.saturating_add(1);
                },
                None => discarded += 1,
            }
        }
    }
    if discarded > 0 {
        println!("discarded {} lines which were not legal move sequences", discarded);
    }

    let yaml = serde_yaml::to_string(&weights)
        .map_err(|err| Error(format!("cannot write book: {}", err)))?;
    fs::write(&out, yaml).map_err(|err| Error(format!("{}: {}", out.display(), err)))?;
    println!("wrote {} lines to {}", weights.len(), out.display());

    Ok(())
}

// Validates one opening line, returning its moves in normalized form, truncated to
// `max_plies`, or `None` if it does not describe legal play from the starting position.
fn normalize_line(line: &str, max_plies: usize) -> Option<String> {
    let mut pos = Position::new();
    let mut tokens = Vec::new();

    for token in line.split_whitespace().take(max_plies) {
        let mv = Move::from_coord(&pos, token).ok()?;
        tokens.push(mv.to_string());
        pos = pos.make(&mv);
    }

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

struct Error(String);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Error { }

////////////////////////////////////////////////////////////////////////////////////////////////////
// ***************************************** UNIT TESTS ***************************************** //
////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn legal_lines_are_normalized() {
        assert_eq!(normalize_line("E2E4  e7e5", 1024), Some("e2e4 e7e5".to_string()));
        assert_eq!(normalize_line("g1f3", 1024), Some("g1f3".to_string()));
    }

    #[test]
    fn long_lines_are_truncated() {
        assert_eq!(normalize_line("e2e4 e7e5 g1f3 b8c6", 2), Some("e2e4 e7e5".to_string()));
    }

    #[test]
    fn illegal_and_empty_lines_are_rejected() {
        assert_eq!(normalize_line("e2e4 e2e4", 1024), None);
        assert_eq!(normalize_line("resign", 1024), None);
        assert_eq!(normalize_line("", 1024), None);
    }
}
