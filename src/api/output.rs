use std::io::Write;

use crate::{
    common::data::ExpectationSnapshot,
    server::{
        matchers::{Diff, Mismatch},
        state::ClosestMatch,
    },
};

use tabwriter::TabWriter;

#[cfg(feature = "color")]
use colored::Colorize;

/// Renders the differences between an unmatched request and the most similar live
/// expectation.
pub fn render_closest_match(closest_match: &ClosestMatch) -> String {
    let mut output = format!(
        "Most similar expectation for {} {} is #{} ({}, matched {} of min {} times).\n\n",
        closest_match.request.method(),
        closest_match.request.url(),
        closest_match.expectation.id,
        closest_match.expectation.route(),
        closest_match.expectation.stats.count,
        closest_match.expectation.stats.min,
    );

    for (idx, mismatch) in closest_match.mismatches.iter().enumerate() {
        output.push_str(&create_mismatch_output(idx, mismatch));
    }

    output
}

pub fn create_mismatch_output(idx: usize, mismatch: &Mismatch) -> String {
    render(|tw| {
        writeln!(tw, "{}", &"-".repeat(60))?;
        writeln!(tw, "{} : {}", idx + 1, mismatch.title)?;
        writeln!(tw, "{}", &"-".repeat(60))?;
        writeln!(tw, "Expected:\t{}", quote_if_whitespace(&mismatch.expected))?;
        writeln!(tw, "Received:\t{}", quote_if_whitespace(&mismatch.actual))?;

        if let Some(diff) = &mismatch.diff {
            writeln!(tw)?;
            writeln!(tw, "{}", create_diff_output(diff))?;
        }

        writeln!(tw)
    })
}

/// One row per expectation with its route and repetition statistics.
pub fn render_expectations(expectations: &[ExpectationSnapshot]) -> String {
    render(|tw| {
        writeln!(tw, "ID\tROUTE\tMATCHED\tMIN\tMAX")?;
        for e in expectations {
            let max = e
                .stats
                .max
                .map_or_else(|| "unbounded".to_string(), |max| max.to_string());
            writeln!(
                tw,
                "{}\t{}\t{}\t{}\t{}",
                e.id,
                e.route(),
                e.stats.count,
                e.stats.min,
                max
            )?;
        }
        Ok(())
    })
}

fn render<F>(write: F) -> String
where
    F: FnOnce(&mut TabWriter<Vec<u8>>) -> std::io::Result<()>,
{
    let mut tw = TabWriter::new(vec![]);
    if let Err(err) = write(&mut tw).and_then(|_| tw.flush()) {
        return format!("<cannot render output: {}>", err);
    }

    match tw.into_inner() {
        Ok(buf) => String::from_utf8_lossy(&buf).to_string(),
        Err(_) => "<cannot render output>".to_string(),
    }
}

fn create_diff_output(differences: &[Diff]) -> String {
    let mut output = String::from("Diff:");
    if differences.is_empty() {
        output.push_str("<empty>");
    }
    output.push('\n');

    for (idx, d) in differences.iter().enumerate() {
        if idx > 0 {
            output.push('\n');
        }

        match d {
            Diff::Same(edit) => {
                for line in remove_trailing_linebreak(edit).split('\n') {
                    output.push_str(&format!("   | {}", line));
                }
            }
            Diff::Add(edit) => {
                for line in remove_trailing_linebreak(edit).split('\n') {
                    #[cfg(feature = "color")]
                    output.push_str(&format!("+++| {}", line).green().to_string());
                    #[cfg(not(feature = "color"))]
                    output.push_str(&format!("+++| {}", line));
                }
            }
            Diff::Rem(edit) => {
                for line in remove_trailing_linebreak(edit).split('\n') {
                    #[cfg(feature = "color")]
                    output.push_str(&format!("---| {}", line).red().to_string());
                    #[cfg(not(feature = "color"))]
                    output.push_str(&format!("---| {}", line));
                }
            }
        }
    }

    output
}

fn quote_if_whitespace(s: &str) -> String {
    if s.is_empty() || s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
        format!("\"{}\"", s)
    } else {
        s.to_string()
    }
}

fn remove_trailing_linebreak(s: &str) -> &str {
    let s = s.strip_suffix('\n').unwrap_or(s);
    s.strip_suffix('\r').unwrap_or(s)
}
