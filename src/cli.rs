use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{
    ConvertOptions, DecodeSource, HeaderStyle, ReadOptions, DEFAULT_PREVIEW_ROWS,
};

/// Convert Stata .dta files to CSV with labelled columns and decoded values
#[derive(Parser, Debug)]
#[command(name = "dta-decode")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write <stem>.csv, <stem>_metadata.csv and <stem>_decoded.csv
    Convert(ConvertArgs),

    /// Print file metadata as JSON
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input .dta file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the CSV outputs
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Skip writing the decoded table
    #[arg(long, default_value_t = false)]
    pub no_decode: bool,

    /// Metadata field used to decode values
    #[arg(long, value_enum, default_value_t = DecodeSource::LabelSets)]
    pub decode_from: DecodeSource,

    /// Name of the first metadata column
    #[arg(long, value_enum, default_value_t = HeaderStyle::ColumnLabels)]
    pub metadata_headers: HeaderStyle,

    /// Keep %td/%tc variables as raw numbers
    #[arg(long, default_value_t = false)]
    pub no_dates: bool,

    /// Log the first N rows of each table
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_PREVIEW_ROWS)]
    pub preview: Option<usize>,
}

impl ConvertArgs {
    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            output_dir: self.out_dir.clone(),
            decode: !self.no_decode,
            decode_source: self.decode_from,
            header_style: self.metadata_headers,
            read: read_options(self.no_dates),
            preview_rows: self.preview.unwrap_or(0),
        }
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input .dta file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output JSON file path (stdout if not specified)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Keep %td/%tc variables as raw numbers
    #[arg(long, default_value_t = false)]
    pub no_dates: bool,
}

impl InspectArgs {
    pub fn read_options(&self) -> ReadOptions {
        read_options(self.no_dates)
    }
}

fn read_options(no_dates: bool) -> ReadOptions {
    ReadOptions {
        convert_dates: !no_dates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn convert_args(cli: Cli) -> ConvertArgs {
        match cli.command {
            Commands::Convert(args) => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_convert_defaults() {
        let cli = parse(&["dta-decode", "convert", "--input", "survey.dta"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);

        let args = convert_args(cli);
        assert_eq!(args.input, PathBuf::from("survey.dta"));
        let options = args.options();
        assert_eq!(options.output_dir, PathBuf::from("."));
        assert!(options.decode);
        assert_eq!(options.decode_source, DecodeSource::LabelSets);
        assert_eq!(options.header_style, HeaderStyle::ColumnLabels);
        assert!(options.read.convert_dates);
        assert_eq!(options.preview_rows, 0);
    }

    #[test]
    fn test_convert_flags() {
        let cli = parse(&[
            "dta-decode",
            "-vv",
            "convert",
            "-i",
            "survey.dta",
            "-o",
            "out",
            "--no-decode",
            "--decode-from",
            "variables",
            "--metadata-headers",
            "variable-labels",
            "--no-dates",
            "--preview",
            "3",
        ]);
        assert_eq!(cli.verbose, 2);

        let options = convert_args(cli).options();
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert!(!options.decode);
        assert_eq!(options.decode_source, DecodeSource::Variables);
        assert_eq!(options.header_style, HeaderStyle::VariableLabels);
        assert!(!options.read.convert_dates);
        assert_eq!(options.preview_rows, 3);
    }

    #[test]
    fn test_preview_without_count_uses_default() {
        let cli = parse(&["dta-decode", "convert", "-i", "a.dta", "--preview"]);
        assert_eq!(convert_args(cli).options().preview_rows, 5);
        assert_eq!(DEFAULT_PREVIEW_ROWS.parse::<usize>().unwrap(), 5);
    }

    #[test]
    fn test_inspect() {
        let cli = parse(&["dta-decode", "-q", "inspect", "-i", "a.dta", "--out", "m.json"]);
        assert!(cli.quiet);
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.input, PathBuf::from("a.dta"));
                assert_eq!(args.out.as_deref(), Some(Path::new("m.json")));
                assert!(args.read_options().convert_dates);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_invocations() {
        assert!(Cli::try_parse_from(["dta-decode", "convert"]).is_err());
        assert!(Cli::try_parse_from(["dta-decode", "-q", "-v", "inspect", "-i", "a.dta"]).is_err());
        assert!(Cli::try_parse_from([
            "dta-decode",
            "convert",
            "-i",
            "a.dta",
            "--decode-from",
            "nothing"
        ])
        .is_err());
    }
}
