//! Check command implementation - segmentation without execution.

use std::path::PathBuf;

use miette::{IntoDiagnostic, Result, WrapErr};

use open_sas_engine::segment::strip_comments;
use open_sas_engine::{segment_script, BlockKind};
use open_sas_lang_core::{normalize_line_endings, PreprocessedSource};

use crate::output::{print_json, BlockEntry, CheckOutput, OutputFormat};

/// Segment a script and list its blocks. Fails when a block is left open at
/// the end of the script.
pub fn run(input: PathBuf, format: OutputFormat) -> Result<()> {
    let script = std::fs::read_to_string(&input)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read script: {}", input.display()))?;

    tracing::info!("Checking {}", input.display());

    // Comment stripping keeps line breaks, so offsets map to source lines.
    let source = PreprocessedSource::new(&strip_comments(&normalize_line_endings(&script)));
    let blocks: Vec<BlockEntry> = segment_script(&script)
        .iter()
        .map(|block| {
            let lead = block.text.len() - block.text.trim_start().len();
            BlockEntry {
                kind: kind_name(block.kind).to_string(),
                line: source.line_of(block.span.start + lead as u32),
                terminated: block.terminated,
                text: first_line(&block.text),
            }
        })
        .collect();

    let open = blocks.iter().filter(|b| !b.terminated).count();
    let status = if open == 0 { "success" } else { "error" };

    if format.is_json() {
        print_json(&CheckOutput { status: status.to_string(), blocks });
    } else {
        for block in &blocks {
            let marker = if block.terminated { "" } else { "  (unterminated)" };
            println!("{:>4}  {:<12} {}{}", block.line, block.kind, block.text, marker);
        }
        println!("{} block(s)", blocks.len());
    }

    if open > 0 {
        return Err(miette::miette!("{} block(s) not terminated in {}", open, input.display()));
    }
    Ok(())
}

fn kind_name(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::DataStep => "data",
        BlockKind::Proc => "proc",
        BlockKind::Libname => "libname",
        BlockKind::MacroLet => "%let",
        BlockKind::MacroPut => "%put",
        BlockKind::Run => "run",
        BlockKind::Unrecognized => "unrecognized",
    }
}

fn first_line(text: &str) -> String {
    text.trim_start().lines().next().unwrap_or_default().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("\n  data a;\n x = 1;\nrun;"), "data a;");
        assert_eq!(first_line("   "), "");
    }
}
