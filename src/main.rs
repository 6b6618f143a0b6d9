use std::process::ExitCode;
use tap_mux::cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Run the merge; fatal resolution errors surface on stderr, outside
    // the document's own success/failure vocabulary.
    match cli::run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
