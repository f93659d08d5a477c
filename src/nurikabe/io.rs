use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::common::P;
use crate::io::ParseError;

use super::field::Field;
use super::State;

/// Tokenizes a puzzle description. A run of digits is one number, a
/// space is an unknown cell, newlines are ignored, and anything else is
/// an error. A literal `0` counts as an unknown cell too.
pub(super) fn parse_clues(s: &str) -> Result<Vec<i32>, ParseError> {
    let mut v = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => {
                let mut n = (c as u8 - b'0') as i32;
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    n = n * 10 + (d as u8 - b'0') as i32;
                    chars.next();
                }
                v.push(n);
            }
            ' ' => v.push(0),
            '\n' => {}
            _ => return Err(ParseError::BadCharacter(c)),
        }
    }

    Ok(v)
}

pub fn format_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 0.001 {
        format!("{:.3} microseconds", secs * 1_000_000.0)
    } else if secs < 1.0 {
        format!("{:.3} milliseconds", secs * 1_000.0)
    } else {
        format!("{:.3} seconds", secs)
    }
}

const HEADER: &str = "<!DOCTYPE html>\n\
<html>\n\
  <head>\n\
    <meta http-equiv=\"Content-Type\" content=\"text/html;charset=utf-8\" />\n\
    <style type=\"text/css\">\n\
      body {\n\
        font-family: Verdana, sans-serif;\n\
        line-height: 1.4;\n\
      }\n\
      table {\n\
        border: solid 3px #000000;\n\
        border-collapse: collapse;\n\
      }\n\
      td {\n\
        border: solid 1px #000000;\n\
        text-align: center;\n\
        width: 20px;\n\
        height: 20px;\n\
      }\n\
      td.unknown   { background-color: #C0C0C0; }\n\
      td.white.new { background-color: #FFFF00; }\n\
      td.white.old { }\n\
      td.black.new { background-color: #008080; }\n\
      td.black.old { background-color: #808080; }\n\
      td.number    { }\n\
      td.failed    { border: solid 3px #000000; }\n\
    </style>\n\
    <title>Nurikabe</title>\n\
  </head>\n\
  <body>\n";

const FOOTER: &str = "  </body>\n</html>\n";

impl Field {
    /// Renders the solving log as a standalone HTML document, one table
    /// per log entry, with updated cells highlighted and failed guesses
    /// outlined.
    pub fn write<W: Write>(&self, out: &mut W, start: Instant, finish: Instant) -> io::Result<()> {
        out.write_all(HEADER.as_bytes())?;

        let mut old = start;
        for step in self.steps() {
            writeln!(
                out,
                "{} ({})",
                step.message,
                format_time(step.at.saturating_duration_since(old))
            )?;
            if step.failed_guesses == 1 {
                writeln!(out, "<br/>1 guess failed.")?;
            } else if step.failed_guesses > 0 {
                writeln!(out, "<br/>{} guesses failed.", step.failed_guesses)?;
            }
            old = step.at;

            writeln!(out, "<table>")?;
            for y in 0..self.height() {
                write!(out, "<tr>")?;
                for x in 0..self.width() {
                    let pos = P(y, x);
                    write!(
                        out,
                        "<td class=\"{}",
                        if step.updated.contains(&pos) {
                            "new "
                        } else {
                            "old "
                        }
                    )?;
                    if step.failed_coords.contains(&pos) {
                        write!(out, "failed ")?;
                    }
                    match step.snapshot[pos] {
                        State::Unknown => write!(out, "unknown\"> ")?,
                        State::White => write!(out, "white\">.")?,
                        State::Black => write!(out, "black\">#")?,
                        State::Numbered(n) => write!(out, "number\">{}", n)?,
                    }
                    write!(out, "</td>")?;
                }
                writeln!(out, "</tr>")?;
            }
            writeln!(out, "</table><br/>")?;
        }

        writeln!(
            out,
            "Total: {}",
            format_time(finish.saturating_duration_since(start))
        )?;
        out.write_all(FOOTER.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::SitRep;
    use super::*;

    #[test]
    fn test_parse_clues() {
        assert_eq!(parse_clues("2  12\n 3").unwrap(), vec![2, 0, 0, 12, 0, 3]);
        assert_eq!(parse_clues("").unwrap(), vec![]);
        assert_eq!(parse_clues("\n\n").unwrap(), vec![]);
        // a literal zero is an unknown cell, same as a space
        assert_eq!(parse_clues("0 1").unwrap(), vec![0, 0, 1]);
        assert_eq!(parse_clues("1\t2").unwrap_err(), ParseError::BadCharacter('\t'));
        assert_eq!(parse_clues("a").unwrap_err(), ParseError::BadCharacter('a'));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(
            format_time(Duration::from_micros(500)),
            "500.000 microseconds"
        );
        assert_eq!(
            format_time(Duration::from_millis(20)),
            "20.000 milliseconds"
        );
        assert_eq!(format_time(Duration::from_secs(2)), "2.000 seconds");
    }

    #[test]
    fn test_write_html() {
        let start = Instant::now();
        let mut f = Field::new(1, 1, "1").unwrap();
        assert_eq!(f.solve(true, true), SitRep::SolutionFound);
        let finish = Instant::now();

        let mut out = Vec::new();
        f.write(&mut out, start, finish).unwrap();
        let html = String::from_utf8(out).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("td.unknown   { background-color: #C0C0C0; }"));
        assert!(html.contains("I'm okay to go!"));
        assert!(html.contains("I'm done!"));
        assert!(html.contains("number\">1"));
        assert!(html.contains("Total: "));
        assert!(html.ends_with("  </body>\n</html>\n"));
    }
}
