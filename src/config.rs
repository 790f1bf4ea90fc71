//! Line settings, command-line options and logging setup for the two tools.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::frame::Geometry;
use crate::transport;

/// Used when no port is given and none is detected.
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Title embedded into screenshots unless `--no-title` is given.
pub const DEFAULT_TITLE: &str = "NanoVNA screenshot";

// The device shell accepts lines of up to this many bytes.
const MAX_COMMAND_LEN: usize = 256;
const MAX_JOIN_START: usize = 250;

/// Serial line parameters. Framing is always 8N1 without flow control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud: u32,
    /// Inter-byte read timeout in tenths of a second.
    pub timeout_tenths: u8,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud: 115_200,
            timeout_tenths: 1,
        }
    }
}

impl LineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_tenths) * 100)
    }
}

/// Options of the `nanovna` command tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub port: Option<String>,
    /// Write the response here instead of stdout.
    pub out: Option<PathBuf>,
    /// The space-joined command line.
    pub command: String,
    /// Talk to the built-in simulator instead of a serial port.
    pub simulate: bool,
    pub help: bool,
}

impl CommandOptions {
    pub const USAGE: &'static str = "\
usage: nanovna [-p PORT] [-o FILE] CMD [ARG ...]

Send a shell command to the analyzer and print its response.

  -p, --port PORT   serial port (default: auto-detect, then /dev/ttyACM0)
  -o, --out FILE    write the response to FILE instead of stdout
      --simulate    talk to the built-in simulator instead of a device
  -h, --help        show this help
";

    /// Parses the arguments following the program name. Everything from the
    /// first command word on belongs to the command, dashes included.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut options = Self::default();
        let mut words = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if !words.is_empty() {
                words.push(arg);
                continue;
            }
            match arg.as_str() {
                "-p" | "--port" | "-d" | "--device" => {
                    options.port = Some(value_for(&arg, args.next())?)
                }
                "-o" | "--out" => options.out = Some(value_for(&arg, args.next())?.into()),
                "--simulate" => options.simulate = true,
                "-h" | "--help" => options.help = true,
                "--" => words.extend(args.by_ref()),
                s if s.starts_with('-') && s.len() > 1 => {
                    return Err(Error::Usage(format!("unknown option '{}'", s)))
                }
                _ => words.push(arg),
            }
        }
        if words.is_empty() && !options.help {
            return Err(Error::Usage("no command given".to_string()));
        }
        options.command = join_command(&words);
        Ok(options)
    }
}

/// Options of the `nanovna_capture` screenshot tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    pub device: Option<String>,
    pub out: Option<PathBuf>,
    pub title: Option<String>,
    /// Screen size of the selected model.
    pub geometry: Geometry,
    pub invert: bool,
    pub simulate: bool,
    pub help: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            device: None,
            out: None,
            title: Some(DEFAULT_TITLE.to_string()),
            geometry: Geometry::NANOVNA,
            invert: false,
            simulate: false,
            help: false,
        }
    }
}

impl CaptureOptions {
    pub const USAGE: &'static str = "\
usage: nanovna_capture [-d DEVICE] [--h4 | --ultra] [-i] [-t TITLE | --no-title] [[-o] FILE]

Fetch the analyzer's screen and store it as PNG, or as PPM if FILE ends
in .ppm. Without FILE a NanoVNA_YYYYMMDD_HHMMSS.png stamped with the local
time is written.

  -d, --device PATH  serial port (default: auto-detect, then /dev/ttyACM0)
  -n, --nanovna      320x240 screen of the NanoVNA-H (default)
      --h4           480x320 screen of the NanoVNA-H4
  -u, --ultra        480x320 screen of the tinySA Ultra
  -i, --invert       invert the colors, e.g. for printing
  -o, --out FILE     output file
  -t, --title TEXT   title stored in the image (default: \"NanoVNA screenshot\")
      --no-title     store no title
      --simulate     capture the built-in simulator instead of a device
  -h, --help         show this help
";

    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-d" | "--device" | "-p" | "--port" => {
                    options.device = Some(value_for(&arg, args.next())?)
                }
                "-o" | "--out" => set_output(&mut options.out, value_for(&arg, args.next())?)?,
                "-t" | "--title" => options.title = Some(value_for(&arg, args.next())?),
                "--no-title" => options.title = None,
                "-n" | "--nanovna" => options.geometry = Geometry::NANOVNA,
                "--h4" | "--nanovna-h4" | "-u" | "--ultra" => {
                    options.geometry = Geometry::NANOVNA_H4
                }
                "-i" | "--invert" => options.invert = true,
                "--simulate" => options.simulate = true,
                "-h" | "--help" => options.help = true,
                s if s.starts_with('-') && s.len() > 1 => {
                    return Err(Error::Usage(format!("unknown option '{}'", s)))
                }
                _ => set_output(&mut options.out, arg)?,
            }
        }
        Ok(options)
    }
}

fn value_for(flag: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::Usage(format!("option '{}' needs a value", flag)))
}

fn set_output(out: &mut Option<PathBuf>, value: String) -> Result<()> {
    if out.is_some() {
        return Err(Error::Usage("only one output file may be given".to_string()));
    }
    *out = Some(value.into());
    Ok(())
}

/// Joins command words with single spaces, keeping the line within what the
/// device shell accepts. Words that would start past the join limit are
/// dropped.
pub fn join_command(words: &[String]) -> String {
    let mut line = String::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            if line.len() >= MAX_JOIN_START {
                continue;
            }
            line.push(' ');
        }
        let room = MAX_COMMAND_LEN - line.len();
        line.push_str(truncate_at_boundary(word, room));
    }
    line
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Picks the port to open: the explicit one, else the first detected
/// analyzer, else [`DEFAULT_PORT`].
pub fn resolve_port(explicit: Option<String>) -> String {
    if let Some(port) = explicit {
        return port;
    }
    match transport::find_device() {
        Ok(port) => {
            info!(port = %port, "detected analyzer");
            port
        }
        Err(e) => {
            debug!("{}, falling back to {}", e, DEFAULT_PORT);
            DEFAULT_PORT.to_string()
        }
    }
}

/// `NanoVNA_YYYYMMDD_HHMMSS.png`, stamped with the wall-clock time of `now`.
/// Pass `chrono::Local::now()` to get the operator's local time.
pub fn default_capture_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    now.format("NanoVNA_%Y%m%d_%H%M%S.png").to_string()
}

/// Installs the stderr log subscriber, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
