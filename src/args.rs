use clap::Parser;

/// This program scores nominee reviews with a language model and ranks the nominees.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the run: input, output, criteria, model and rules.
    /// For more information about the file format, read the manual of the nominee_scoring crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) The Excel file containing the reviews (columns Nominee, Attribute, Summary).
    /// Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, optional) The Excel file in which the scores will be written.
    /// Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the scores will be written in JSON format to the given
    /// location.
    #[clap(long, value_parser)]
    pub json_out: Option<String>,

    /// (file path) A reference file containing the JSON summary of a previous run. If provided, nomscore will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path) A JSON file mapping each attribute to a recorded model answer. If provided, the model
    /// is not called and no API key is required.
    #[clap(long, value_parser)]
    pub responses: Option<String>,

    /// (default: the first worksheet) When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (default gpt-4o) The name of the model to use.
    #[clap(long, value_parser)]
    pub model: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
