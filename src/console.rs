//! Interactive command session.
//!
//! Each input line is split on whitespace; the first token is looked up in
//! [`COMMANDS`], the remaining tokens are checked against the command's
//! required arguments and handed to its handler. Every state command goes to
//! the currently targeted device.

use crate::device::{Device, FLIGHT_CONTROLLER};
use colored::*;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Instant;
use tracing::{debug, warn};

pub const PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

type Handler = fn(&mut CommandSession<'_>, &[&str], &mut dyn Write) -> io::Result<Outcome>;

pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub about: &'static str,
    /// One message per required positional argument, printed when it is missing.
    required: &'static [&'static str],
    handler: Handler,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "cc",
        usage: "cc",
        about: "Show the device currently being commanded",
        required: &[],
        handler: show_target,
    },
    CommandSpec {
        name: "lc",
        usage: "lc",
        about: "List all available devices",
        required: &[],
        handler: list_devices,
    },
    CommandSpec {
        name: "sc",
        usage: "sc <device>",
        about: "Switch the device being commanded",
        required: &["Need to specify a device to command"],
        handler: switch_target,
    },
    CommandSpec {
        name: "rs",
        usage: "rs <field>",
        about: "Read a state field",
        required: &["Need to specify a state field to read"],
        handler: read_state,
    },
    CommandSpec {
        name: "ws",
        usage: "ws <field> <value>",
        about: "Write a state field",
        required: &["Need to specify a state field to set", "Need to specify the value to set"],
        handler: write_state,
    },
    CommandSpec {
        name: "os",
        usage: "os <field> <value>",
        about: "Override a state field in simulation",
        required: &[
            "Need to specify a state field to override",
            "Need to specify the value to override with",
        ],
        handler: override_state,
    },
    CommandSpec {
        name: "ro",
        usage: "ro <field>",
        about: "Release the override of a state field",
        required: &["Need to specify a state field to release"],
        handler: release_override,
    },
    CommandSpec {
        name: "help",
        usage: "help",
        about: "List available commands",
        required: &[],
        handler: help,
    },
    CommandSpec {
        name: "quit",
        usage: "quit",
        about: "End the run and disconnect from every device",
        required: &[],
        handler: quit,
    },
    CommandSpec {
        name: "exit",
        usage: "exit",
        about: "Same as quit",
        required: &[],
        handler: quit,
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Dispatches commands against a borrowed device map.
pub struct CommandSession<'a> {
    devices: &'a mut BTreeMap<String, Device>,
    target: String,
}

impl<'a> CommandSession<'a> {
    /// Targets the flight controller if there is one, otherwise the first
    /// device. Returns `None` when there is nothing to command.
    pub fn new(devices: &'a mut BTreeMap<String, Device>) -> Option<Self> {
        let target = if devices.contains_key(FLIGHT_CONTROLLER) {
            FLIGHT_CONTROLLER.to_string()
        } else {
            devices.keys().next()?.clone()
        };
        Some(Self { devices, target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> io::Result<Outcome> {
        let mut tokens = line.split_whitespace();
        let name = match tokens.next() {
            Some(name) => name,
            None => return Ok(Outcome::Continue),
        };
        let args: Vec<&str> = tokens.collect();

        let spec = match lookup(name) {
            Some(spec) => spec,
            None => {
                writeln!(
                    out,
                    "{} Unknown command '{}'. Type 'help' for a list of commands.",
                    "❌".red(),
                    name
                )?;
                return Ok(Outcome::Continue);
            }
        };

        if let Some(missing) = spec.required.get(args.len()) {
            writeln!(out, "{}", missing.yellow())?;
            return Ok(Outcome::Continue);
        }

        debug!("{} -> {} {:?}", self.target, spec.name, args);
        (spec.handler)(self, &args, out)
    }

    fn device(&mut self) -> io::Result<&mut Device> {
        let target = &self.target;
        self.devices.get_mut(target).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("device {} is not configured", target))
        })
    }
}

fn show_target(session: &mut CommandSession<'_>, _args: &[&str], out: &mut dyn Write) -> io::Result<Outcome> {
    writeln!(out, "Currently interacting with {}", session.target.bright_cyan())?;
    Ok(Outcome::Continue)
}

fn list_devices(session: &mut CommandSession<'_>, _args: &[&str], out: &mut dyn Write) -> io::Result<Outcome> {
    writeln!(out, "Available devices:")?;
    for name in session.devices.keys() {
        writeln!(out, "{}", name)?;
    }
    Ok(Outcome::Continue)
}

fn switch_target(session: &mut CommandSession<'_>, args: &[&str], out: &mut dyn Write) -> io::Result<Outcome> {
    let name = args[0];
    if !session.devices.contains_key(name) {
        writeln!(out, "{} Invalid device specified: {}", "❌".red(), name)?;
        return Ok(Outcome::Continue);
    }
    session.target = name.to_string();
    writeln!(out, "Switched to {}", session.target.bright_cyan())?;
    Ok(Outcome::Continue)
}

fn read_state(session: &mut CommandSession<'_>, args: &[&str], out: &mut dyn Write) -> io::Result<Outcome> {
    let start = Instant::now();
    let result = session.device()?.session.read_state(args[0]);
    let elapsed_us = start.elapsed().as_micros();

    match result {
        Ok(value) => writeln!(out, "{} \t\t\t\t\t\t(Completed in {} us)", value, elapsed_us)?,
        Err(e) => writeln!(
            out,
            "{} {} \t\t\t\t\t\t(Completed in {} us)",
            "Failed:".red(),
            e,
            elapsed_us
        )?,
    }
    Ok(Outcome::Continue)
}

fn write_state(session: &mut CommandSession<'_>, args: &[&str], out: &mut dyn Write) -> io::Result<Outcome> {
    let start = Instant::now();
    let result = session.device()?.session.write_state(args[0], args[1]);
    let elapsed_us = start.elapsed().as_micros();
    report_outcome(out, "write", args[0], result.map_err(|e| e.to_string()), elapsed_us)
}

fn override_state(session: &mut CommandSession<'_>, args: &[&str], out: &mut dyn Write) -> io::Result<Outcome> {
    let start = Instant::now();
    let result = session.device()?.session.override_state(args[0], args[1]);
    let elapsed_us = start.elapsed().as_micros();
    report_outcome(out, "override", args[0], result.map_err(|e| e.to_string()), elapsed_us)
}

fn release_override(session: &mut CommandSession<'_>, args: &[&str], _out: &mut dyn Write) -> io::Result<Outcome> {
    let target = session.target.clone();
    if let Err(e) = session.device()?.session.release_override(args[0]) {
        warn!("{}: releasing override of '{}' failed: {}", target, args[0], e);
    }
    Ok(Outcome::Continue)
}

fn help(_session: &mut CommandSession<'_>, _args: &[&str], out: &mut dyn Write) -> io::Result<Outcome> {
    writeln!(out, "{}", "Commands:".bright_blue().bold())?;
    for spec in COMMANDS {
        writeln!(out, "  {:<20} {}", spec.usage, spec.about)?;
    }
    Ok(Outcome::Continue)
}

fn quit(_session: &mut CommandSession<'_>, _args: &[&str], _out: &mut dyn Write) -> io::Result<Outcome> {
    Ok(Outcome::Quit)
}

fn report_outcome(
    out: &mut dyn Write,
    action: &str,
    field: &str,
    result: Result<(), String>,
    elapsed_us: u128,
) -> io::Result<Outcome> {
    match result {
        Ok(()) => writeln!(out, "{} \t\t\t\t\t\t(Completed in {} us)", "Succeeded".green(), elapsed_us)?,
        Err(reason) => {
            debug!("{} of '{}' failed: {}", action, field, reason);
            writeln!(out, "{} \t\t\t\t\t\t(Completed in {} us)", "Failed".red(), elapsed_us)?;
        }
    }
    Ok(Outcome::Continue)
}
