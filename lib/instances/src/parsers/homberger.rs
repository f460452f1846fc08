use std::path::Path;
use tracing::*;
use crate::{Error, Result};
use crate::config::LayoutConfig;
use crate::raw::homberger::*;
use super::{
  ParseInstance,
  common::*,
};

/// An instance file on disk.
#[derive(Debug, Copy, Clone)]
pub struct HombergerFmt<P>(pub P);

/// Instance text already in memory.
#[derive(Debug, Copy, Clone)]
pub struct HombergerText<'a>(pub &'a str);

impl<P: AsRef<Path>> ParseInstance<HombergerFmt<P>> for Homberger {
  type Options = LayoutConfig;

  fn parse(input: HombergerFmt<P>, cfg: &LayoutConfig) -> Result<Homberger> {
    let path = input.0.as_ref();
    let bytes = std::fs::read(path)?;
    let data = std::str::from_utf8(&bytes).map_err(|e| {
      let line = bytes[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
      std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{:?}: invalid UTF-8 on line {}", path, line),
      )
    })?;
    Homberger::parse(HombergerText(data), cfg)
  }
}

impl<'a> ParseInstance<HombergerText<'a>> for Homberger {
  type Options = LayoutConfig;

  fn parse(input: HombergerText<'a>, cfg: &LayoutConfig) -> Result<Homberger> {
    parsers::homberger(input.0, cfg)
  }
}

/// Picks the layout for a list of trimmed, non-blank lines. The landmark layout wins
/// whenever a line starts with the sentinel token.
pub fn detect_layout(lines: &[&str], cfg: &LayoutConfig) -> Layout {
  lines.iter()
    .position(|l| l.split_whitespace().next() == Some(cfg.sentinel.as_str()))
    .map(|sentinel_line| Layout::Landmark { sentinel_line })
    .unwrap_or(Layout::FixedOffset)
}

mod parsers {
  use super::*;

  const ROW_FIELDS: usize = 7;

  //   0      70         70          0          0       1351          0
  fn parse_row(line: usize, text: &str, tokens: &[&str]) -> Result<RawRow> {
    if tokens.len() != ROW_FIELDS {
      return Err(Error::MalformedRow {
        line,
        reason: format!("expected {} fields, found {}", ROW_FIELDS, tokens.len()),
      });
    }
    let bad = |field: &str| Error::MalformedRow {
      line,
      reason: format!("cannot read field '{}' of \"{}\"", field, text),
    };
    let int = |k: usize, field: &str| int_token(tokens[k]).ok_or_else(|| bad(field));
    let float = |k: usize, field: &str| float_token(tokens[k]).ok_or_else(|| bad(field));

    Ok(RawRow {
      line,
      id: int(0, "id")?,
      x: float(1, "x")?,
      y: float(2, "y")?,
      demand: int(3, "demand")?,
      tw_start: int(4, "tw_start")?,
      tw_end: int(5, "tw_end")?,
      service_time: int(6, "service_time")?,
    })
  }

  fn tokens(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
  }

  /// Capacity must fit the `Q` column; zero or negative capacity is left to
  /// parameter derivation.
  fn check_counts((n, q): (i64, i64)) -> Result<(i64, i64)> {
    if n < 0 {
      return Err(Error::MalformedHeader(format!("negative point count {}", n)));
    }
    if q > u32::MAX as i64 {
      return Err(Error::MalformedHeader(format!("capacity {} does not fit a 32-bit count", q)));
    }
    Ok((n, q))
  }

  /// `declared_point_count capacity`, trailing tokens ignored.
  fn header_counts(text: &str) -> Option<(i64, i64)> {
    let mut tokens = text.split_whitespace();
    let n = int_token(tokens.next()?)?;
    let q = int_token(tokens.next()?)?;
    Some((n, q))
  }

  pub fn homberger(input: &str, cfg: &LayoutConfig) -> Result<Homberger> {
    let (numbers, lines): (Vec<usize>, Vec<&str>) = input.lines()
      .enumerate()
      .map(|(k, l)| (k + 1, l.trim()))
      .filter(|(_, l)| !l.is_empty())
      .unzip();

    let identifier = match lines.first() {
      Some(l) => l.to_string(),
      None => return Err(Error::MalformedHeader("input has no non-blank lines".to_string())),
    };

    let layout = detect_layout(&lines, cfg);
    debug!(?layout, %identifier, "detected layout");

    let mut skipped_rows = 0;
    let mut rows = Vec::new();

    let (declared_points, capacity) = match layout {
      Layout::Landmark { sentinel_line } => {
        let counts = sentinel_line.checked_sub(1)
          .and_then(|k| header_counts(lines[k]))
          .ok_or_else(|| Error::MalformedHeader(format!(
            "line before '{}' (line {}) does not hold 'count capacity'",
            cfg.sentinel, numbers[sentinel_line]
          )))
          .and_then(check_counts)?;

        for (&line, &text) in numbers.iter().zip(&lines).skip(sentinel_line + 1) {
          let fields = tokens(text);
          if fields.len() == ROW_FIELDS {
            rows.push(parse_row(line, text, &fields)?);
          } else {
            trace!(line, text, "skipped annotation line");
            skipped_rows += 1;
          }
        }

        if rows.len() as i64 != counts.0 {
          warn!(declared = counts.0, found = rows.len(), %identifier, "declared point count differs from rows found");
        }
        counts
      }

      Layout::FixedOffset => {
        let (n, q) = lines.get(cfg.header_line)
          .and_then(|l| header_counts(l))
          .ok_or_else(|| Error::MalformedHeader(format!(
            "no '{}' line and line {} of the non-blank lines does not hold 'count capacity'",
            cfg.sentinel, cfg.header_line + 1
          )))
          .and_then(check_counts)?;

        let end = cfg.first_row_line + n as usize;
        for k in cfg.first_row_line..end {
          let (line, text) = match (numbers.get(k), lines.get(k)) {
            (Some(&line), Some(&text)) => (line, text),
            _ => {
              let line = numbers.last().map_or(1, |l| l + 1);
              return Err(Error::MalformedRow {
                line,
                reason: format!("expected {} point rows, input ends after {}", n, k.saturating_sub(cfg.first_row_line)),
              });
            }
          };
          rows.push(parse_row(line, text, &tokens(text))?);
        }
        (n, q)
      }
    };

    if skipped_rows > 0 {
      debug!(skipped_rows, %identifier, "skipped lines with unexpected token count");
    }

    Ok(Homberger {
      header: InstanceHeader { identifier, declared_points, capacity },
      layout,
      rows,
      skipped_rows,
    })
  }
}
