//! The adapter's two ends of the Universal Chess Interface.
//!
//! The [`uci`] module classifies and formats protocol lines; the [`io`] module carries them
//! between the controller (a GUI attached to stdin and stdout) and the backend engine (a
//! child process with piped standard streams).
//!
//! [`uci`]: uci/index.html
//! [`io`]: io/index.html
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////

pub mod io;
pub mod uci;
