//! Handles the adapter's input and output with the controller and with the backend engine.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::io::{stdin, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::Duration;
use std::sync::mpsc::Sender;
use log::{debug, info, warn, error};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A line received by the adapter, or the loss of one of its connections.
///
/// Both reader threads feed a single channel of events, which serializes the two line
/// streams while preserving the arrival order within each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A line sent by the controller.
    FromGui(String),
    /// A line sent by the backend engine.
    FromEngine(String),
    /// The controller closed its end of the connection.
    GuiClosed,
    /// The backend engine closed its end of the connection.
    EngineClosed,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The adapter's side of the controller connection, using stdin and stdout. All traffic is
/// logged using the log crate (assuming a logger is set up).
#[derive(Debug)]
pub struct Gui;

impl Gui {
    /// Spawns the thread which forwards controller input to `events`, one line per event.
    pub fn connect(events: Sender<Event>) {
        thread::spawn(move || {
            Self::thread(events);
        });
    }

    /// Sends a line to the controller.
    pub fn send(s: &str) {
        println!("{}", s);
        info!("adapter -> gui: {}", s);
    }

    fn thread(events: Sender<Event>) {
        let stdin = stdin();

        loop {
            let mut line = String::new();

            match stdin.read_line(&mut line) {
                Ok(0) => {
                    debug!("controller closed its connection");
                    let _ = events.send(Event::GuiClosed);
                    return;
                },
                Ok(_) => { },
                Err(err) => {
                    error!("controller io error: {}", err);
                    let _ = events.send(Event::GuiClosed);
                    return;
                },
            }

            let line = line.trim().to_string();
            info!("gui -> adapter: {}", line);
            if events.send(Event::FromGui(line)).is_err() {
                return;
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The adapter's side of the backend engine connection. The engine runs as a child process
/// with its standard input and output piped through the adapter. All traffic is logged.
///
/// Dropping the `Engine` reaps the child process, killing it if it does not exit on its own
/// within a grace period.
#[derive(Debug)]
pub struct Engine {
    child: Child,
    stdin: ChildStdin,
}

impl Engine {
    /// Starts `cmd` with the arguments `args` and spawns the thread which forwards the
    /// engine's output to `events`, one line per event.
    pub fn start(cmd: &str, args: &[&str], events: Sender<Event>) -> std::io::Result<Engine> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        // both pipes were requested just above
        let stdin = child.stdin.take().expect("INFALLIBLE");
        let stdout = child.stdout.take().expect("INFALLIBLE");
        thread::spawn(move || {
            Self::thread(stdout, events);
        });

        Ok(Engine { child, stdin })
    }

    /// Sends a line to the engine.
    pub fn send(&mut self, s: &str) {
        info!("adapter -> engine: {}", s);
        let result = writeln!(self.stdin, "{}", s).and_then(|_| self.stdin.flush());
        if let Err(err) = result {
            error!("engine io error: {}", err);
        }
    }

    fn thread(stdout: ChildStdout, events: Sender<Event>) {
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => {
                    let line = line.trim().to_string();
                    info!("engine -> adapter: {}", line);
                    if events.send(Event::FromEngine(line)).is_err() {
                        return;
                    }
                },
                Err(err) => {
                    error!("engine io error: {}", err);
                    break;
                },
            }
        }

        debug!("engine closed its connection");
        let _ = events.send(Event::EngineClosed);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for _ in 0..50 {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("engine exited with {}", status);
                    return;
                },
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(err) => {
                    error!("failed to wait for the engine: {}", err);
                    break;
                },
            }
        }

        warn!("engine did not exit on its own, killing it");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
