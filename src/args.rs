use clap::Parser;

/// Section scores for quality surveys.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the report: data sources, modalities and scope.
    /// See the manual of the survey_scoring crate for the format.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference summary in JSON format. If provided, the program checks
    /// that the computed summary matches the reference and prints the differences.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the summary in JSON format.
    /// Setting this option overrides the output directory of the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) Where to write the answers that could not be converted,
    /// in CSV format. Overrides the audit file of the configuration.
    #[clap(long, value_parser)]
    pub audit_out: Option<String>,

    /// (institutional, academicDirection or director) The audience of the report.
    /// Overrides the view of the configuration.
    #[clap(long, value_parser)]
    pub view: Option<String>,

    /// The program (career) to restrict the report to. Required for the director view.
    #[clap(long, value_parser)]
    pub program: Option<String>,

    /// (YYYY-MM-DD) First day of responses to include.
    #[clap(long, value_parser)]
    pub date_start: Option<String>,

    /// (YYYY-MM-DD) Last day of responses to include.
    #[clap(long, value_parser)]
    pub date_end: Option<String>,

    /// The id of the survey application to report on, as listed in the applications sheet.
    #[clap(long, value_parser)]
    pub application: Option<String>,

    /// Only consider the applications that started this year.
    #[clap(long, value_parser)]
    pub year: Option<i32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
