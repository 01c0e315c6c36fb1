use std::process::ExitCode;

fn main() -> ExitCode {
    match droidlink::run() {
        Ok(exit) => exit.into(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            droidlink::Exit::Failed.into()
        }
    }
}
