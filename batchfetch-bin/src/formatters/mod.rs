pub(crate) mod duration;
pub(crate) mod log;
pub(crate) mod output;

use self::output::OutputFormatter;
use crate::options::OutputFormat;

/// Create a formatter for the per-URL results and the summary
pub(crate) fn get_output_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Plain => Box::new(output::Plain::new()),
        OutputFormat::Json => Box::new(output::Json::new()),
    }
}
