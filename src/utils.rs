use std::io::{BufRead, Write};
use std::time::Instant;

use indicatif::ProgressStyle;
use log::info;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Logs how long a scope took when dropped.
pub struct ScopedTimer {
    what: &'static str,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        info!("{} in {:.2?}", self.what, self.start.elapsed());
    }
}

/// Print `prompt` and read one trimmed line. `None` at end of input.
pub fn read_line<R: BufRead>(input: &mut R, prompt: &str) -> std::io::Result<Option<String>> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}
