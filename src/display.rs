use std::fmt::Display;
use std::io::{self, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::TimeZone;

use crate::session::{SessionId, Sessions, Transcript};

/// Sessions ordered by their last command, oldest first. Empty transcripts
/// have no last command and go to the end; equal keys fall back to the
/// session id.
pub fn sorted_sessions(sessions: &Sessions) -> Vec<(&SessionId, &Transcript)> {
    let mut items: Vec<_> = sessions.iter().collect();
    items.sort_by_key(|(id, transcript)| {
        let last = transcript.last_timestamp();
        (last.is_none(), last, **id)
    });
    items
}

pub fn is_valid_time_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

pub struct SessionPrinter<'a, Tz: TimeZone> {
    tz: Tz,
    time_format: &'a str,
}

impl<'a, Tz> SessionPrinter<'a, Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn new(tz: Tz, time_format: &'a str) -> Self {
        Self { tz, time_format }
    }

    pub fn print<W: Write>(&self, out: &mut W, sessions: &Sessions) -> io::Result<()> {
        for (id, transcript) in sorted_sessions(sessions) {
            writeln!(out, "# --- SESSION {id} --- #")?;
            for entry in &transcript.entries {
                writeln!(
                    out,
                    "{}\t{}",
                    self.format_timestamp(entry.timestamp),
                    entry.command
                )?;
            }
            writeln!(out, "# --- END SESSION {id} --- #")?;
        }
        Ok(())
    }

    pub fn format_timestamp(&self, timestamp: i64) -> String {
        match self.tz.timestamp_opt(timestamp, 0).single() {
            Some(dt) => dt.format(self.time_format).to_string(),
            None => timestamp.to_string(),
        }
    }
}
