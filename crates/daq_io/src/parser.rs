//! Parser for waveform table text.
//!
//! Each line is parsed with nom into either a sample or nothing (blank or
//! comment-only). Anything else is an error naming the 1-based line number.

use anyhow::{Result, bail};
use daq_common::adc::MAX_COUNT;
use nom::IResult;
use nom::character::complete::{char, space0, u32 as count};
use nom::combinator::{all_consuming, opt, rest};
use nom::sequence::{delimited, preceded, terminated};

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), rest)(input)
}

/// Parses one line into an optional sample.
fn table_line(input: &str) -> IResult<&str, Option<u32>> {
    all_consuming(terminated(
        delimited(space0, opt(count), space0),
        opt(comment),
    ))(input)
}

/// Parses a whole table.
///
/// # Arguments
///
/// * `text` - Table contents, LF or CRLF line endings
///
/// # Returns
///
/// The samples in file order, or an error if a line is malformed, a sample
/// exceeds the converter range, or the table holds no samples at all.
pub fn parse_table(text: &str) -> Result<Vec<u32>> {
    let mut samples = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        match table_line(raw) {
            Ok((_, Some(value))) if value > MAX_COUNT => {
                bail!("line {line_no}: sample {value} exceeds converter maximum {MAX_COUNT}")
            }
            Ok((_, Some(value))) => samples.push(value),
            Ok((_, None)) => {}
            Err(_) => bail!(
                "line {line_no}: expected one unsigned sample, found {:?}",
                raw.trim()
            ),
        }
    }

    if samples.is_empty() {
        bail!("waveform table contains no samples");
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_comments_and_blank_lines() {
        let text = "# ramp\n0\n\n  1  \n2 # third\r\n   # indented comment\n3\n";
        assert_eq!(parse_table(text).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn rejects_garbage_with_line_number() {
        let err = parse_table("10\n20\nabc\n").unwrap_err();
        assert!(err.to_string().starts_with("line 3:"), "{err}");

        let err = parse_table("10 20\n").unwrap_err();
        assert!(err.to_string().starts_with("line 1:"), "{err}");
    }

    #[test]
    fn rejects_negative_and_out_of_range_samples() {
        assert!(parse_table("-1\n").is_err());

        let err = parse_table("4095\n4096\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
        assert!(parse_table("99999999999\n").is_err());
    }

    #[test]
    fn rejects_empty_table() {
        assert!(parse_table("").is_err());
        assert!(parse_table("# only a header\n\n").is_err());
    }
}
