//! The option registry: the adapter's own settings, the option declarations captured from
//! the backend engine, and the announcement formatting between them.
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

/// The namespace prefix under which the adapter's own options are announced. A `setoption`
/// whose name starts with this prefix is applied locally instead of being forwarded.
pub const NAMESPACE: &str = "Bookman ";

/// The sentinel value which marks a limit override as unset.
pub const UNSET: &str = "<empty>";

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The coarse UCI type of an option, classified from its declared type text.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Kind {
    Check,
    Spin,
    Combo,
    Button,
    String,
}

impl Kind {
    /// Classifies a declared type text by case-insensitive keyword. Unrecognized types
    /// behave as strings, which lets their values pass through untouched.
    fn classify(decl: &str) -> Kind {
        let lower = decl.to_lowercase();
        if lower.contains("spin") {
            Kind::Spin
        } else if lower.contains("check") {
            Kind::Check
        } else if lower.contains("combo") {
            Kind::Combo
        } else if lower.contains("button") {
            Kind::Button
        } else {
            Kind::String
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Who answers for an option: the adapter itself, or the backend engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Owner {
    Adapter,
    Engine,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A single option: its declaration as announced, its current value, and its owner.
///
/// The declared type text is kept verbatim since newer protocol versions allow refinements
/// such as `string file`; the announcement collapses it back to the coarse keyword for older
/// controllers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    name: String,
    decl: String,
    kind: Kind,
    value: String,
    min: Option<i64>,
    max: Option<i64>,
    vars: Vec<String>,
    owner: Owner,
}

impl OptionEntry {
    /// Parses a backend `option` declaration. Returns `None` if `line` is not an option
    /// declaration or is missing its name or type.
    pub fn from_wire(line: &str) -> Option<OptionEntry> {
        let mut words = line.split_whitespace();
        if words.next() != Some("option") {
            return None;
        }

        let mut name = String::new();
        let mut decl = String::new();
        let mut default = String::new();
        let mut min_text = String::new();
        let mut max_text = String::new();
        let mut vars: Vec<String> = Vec::new();
        let mut field = "";

        for word in words {
            match word {
                "name" | "type" | "default" | "min" | "max" => field = word,
                "var" => {
                    field = word;
                    vars.push(String::new());
                },
                _ => {
                    let dst = match field {
                        "name" => &mut name,
                        "type" => &mut decl,
                        "default" => &mut default,
                        "min" => &mut min_text,
                        "max" => &mut max_text,
                        // "var" pushed an element just above
                        "var" => vars.last_mut().expect("INFALLIBLE"),
                        _ => continue,
                    };
                    if !dst.is_empty() {
                        dst.push(' ');
                    }
                    dst.push_str(word);
                },
            }
        }

        if name.is_empty() || decl.is_empty() {
            return None;
        }

        let kind = Kind::classify(&decl);
        Some(OptionEntry {
            name,
            kind,
            decl,
            value: default,
            min: min_text.parse().ok(),
            max: max_text.parse().ok(),
            vars,
            owner: Owner::Engine,
        })
    }

    /// Formats the announcement line for this entry. Adapter-owned entries are announced
    /// under the [`NAMESPACE`] prefix. Under protocol version 2 or older the declared type
    /// text of string, spin and button options is collapsed to the coarse keyword; checks
    /// and combos pass through unchanged, as does everything under newer versions.
    ///
    /// The current value is announced as the default, so that a controller which asks again
    /// mid-session sees the settings in effect.
    ///
    /// [`NAMESPACE`]: constant.NAMESPACE.html
    pub fn to_wire(&self, uci_version: i64) -> String {
        let mut line = String::from("option name ");
        if self.owner == Owner::Adapter {
            line.push_str(NAMESPACE);
        }
        line.push_str(&self.name);
        line.push_str(" type ");
        line.push_str(self.wire_type(uci_version));

        if self.kind != Kind::Button {
            line.push_str(" default ");
            line.push_str(&self.value);
        }
        if self.kind == Kind::Spin {
            if let Some(min) = self.min {
                line.push_str(&format!(" min {}", min));
            }
            if let Some(max) = self.max {
                line.push_str(&format!(" max {}", max));
            }
        }
        for var in &self.vars {
            line.push_str(&format!(" var {}", var));
        }

        line
    }

    /// Returns the option's name, without the namespace prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the option's current value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the option's owner.
    pub fn owner(&self) -> Owner {
        self.owner
    }

    fn adapter(name: &str, decl: &str, value: &str) -> OptionEntry {
        OptionEntry {
            name: name.to_string(),
            decl: decl.to_string(),
            kind: Kind::classify(decl),
            value: value.to_string(),
            min: None,
            max: None,
            vars: Vec::new(),
            owner: Owner::Adapter,
        }
    }

    fn adapter_spin(name: &str, value: &str, min: i64, max: i64) -> OptionEntry {
        OptionEntry {
            min: Some(min),
            max: Some(max),
            ..OptionEntry::adapter(name, "spin", value)
        }
    }

    fn wire_type(&self, uci_version: i64) -> &str {
        if uci_version <= 2 {
            match self.kind {
                Kind::String => "string",
                Kind::Spin => "spin",
                Kind::Button => "button",
                Kind::Check | Kind::Combo => &self.decl,
            }
        } else {
            &self.decl
        }
    }

    fn set_value(&mut self, value: &str) -> Result<(), Error> {
        match self.kind {
            Kind::Check => {
                if value != "true" && value != "false" {
                    return Err(Error::BadValue);
                }
            },
            Kind::Spin => {
                let n: i64 = value.trim().parse().map_err(|_| Error::BadValue)?;
                if self.min.map_or(false, |min| n < min)
                        || self.max.map_or(false, |max| n > max) {
                    return Err(Error::OutOfRange);
                }
            },
            Kind::Combo => {
                if !self.vars.iter().any(|var| var == value) {
                    return Err(Error::BadValue);
                }
            },
            Kind::Button => return Err(Error::BadValue),
            Kind::String => { },
        }

        self.value = value.to_string();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The option registry, holding the adapter's own settings and the declarations captured
/// from the backend engine, along with the engine's identification.
#[derive(Debug, Clone)]
pub struct Options {
    engine_name: Option<String>,
    engine_author: Option<String>,
    entries: Vec<OptionEntry>,
}

impl Options {
    /// Creates the registry with the adapter's own options at their defaults.
    pub fn new() -> Options {
        let entries = vec![
            OptionEntry::adapter_spin("BookDepth", "256", 0, 256),
            OptionEntry::adapter("BookRandom", "check", "true"),
            OptionEntry::adapter("NodesLimit", "string", UNSET),
            OptionEntry::adapter("DepthLimit", "string", UNSET),
            OptionEntry::adapter("Movetime", "string", UNSET),
            OptionEntry::adapter("AverageMovetime", "string", UNSET),
            OptionEntry::adapter_spin("AverageMovetimeWindow", "10", 1, 200),
            OptionEntry::adapter("HostPerformanceFactor", "string", "1.0"),
            OptionEntry::adapter_spin("UCIVersion", "2", 1, 3),
        ];

        Options {
            engine_name: None,
            engine_author: None,
            entries,
        }
    }

    /// Records an option declared by the backend engine, replacing any previous declaration
    /// of the same name.
    pub fn insert(&mut self, entry: OptionEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name && e.owner == entry.owner) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Sets the value of the adapter-owned option `name`. On failure the prior value is
    /// retained.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        match self.entries.iter_mut().find(|e| e.owner == Owner::Adapter && e.name == name) {
            Some(entry) => entry.set_value(value),
            None => Err(Error::UnknownOption),
        }
    }

    /// Returns the current value of the adapter-owned option `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter()
            .find(|e| e.owner == Owner::Adapter && e.name == name)
            .map(|e| e.value())
    }

    /// Returns the value of `name` as an integer. Parsing is lenient: the longest numeric
    /// prefix counts, and an absent or unreadable value is zero.
    pub fn get_int(&self, name: &str) -> i64 {
        self.get(name).map_or(0, leading_number)
    }

    /// Returns true if the value of `name` is `true`.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }

    /// Returns the value of `name` as a float. Parsing is lenient in the same way as
    /// [`get_int`](#method.get_int).
    pub fn get_float(&self, name: &str) -> f64 {
        self.get(name).map_or(0.0, leading_number)
    }

    /// Iterates the entries in announcement order: the backend engine's options first, then
    /// the adapter's own, each group in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionEntry> {
        self.entries.iter().filter(|e| e.owner == Owner::Engine)
            .chain(self.entries.iter().filter(|e| e.owner == Owner::Adapter))
    }

    /// Records the name the backend engine reported for itself.
    pub fn set_engine_name(&mut self, name: &str) {
        self.engine_name = Some(name.to_string());
    }

    /// Records the author the backend engine reported.
    pub fn set_engine_author(&mut self, author: &str) {
        self.engine_author = Some(author.to_string());
    }

    /// Returns the name the backend engine reported for itself, if it has.
    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_ref().map(|s| s.as_str())
    }

    /// Returns the author the backend engine reported, if it has.
    pub fn engine_author(&self) -> Option<&str> {
        self.engine_author.as_ref().map(|s| s.as_str())
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Reads the longest numeric prefix of `value`, ignoring whatever trails it. Text with no
/// readable number at all reads as zero.
pub(crate) fn leading_number<T: FromStr + Default>(value: &str) -> T {
    let value = value.trim();

    for end in (1..=value.len()).rev() {
        if value.is_char_boundary(end) {
            if let Ok(parsed) = value[..end].parse() {
                return parsed;
            }
        }
    }

    T::default()
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// Error type for option handling
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// No adapter-owned option has the given name
    UnknownOption,
    /// The value cannot be parsed as the option's type
    BadValue,
    /// The value is outside the option's declared range
    OutOfRange,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownOption => "no option with that name",
            Error::BadValue => "value does not fit the option's type",
            Error::OutOfRange => "value is outside the option's range",
        }.fmt(f)
    }
}

impl std::error::Error for Error { }
