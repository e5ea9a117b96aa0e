//! Replays the `CF_TRACE` file into the log.

use std::path::Path;

use crate::error::Result;
use crate::files::FileSystem;

/// Logs every line of the trace file. A missing file is only a warning.
/// Returns the number of lines written.
pub fn dump(path: &Path, fs: &dyn FileSystem) -> Result<usize> {
    tracing::info!("### START OF CF CLI TRACE OUTPUT ###");
    let mut count = 0;
    if fs.exists(path)? {
        let content = fs.read_to_string(path)?;
        for line in content.lines() {
            tracing::info!(target: "deploystep::cf_trace", "{}", line);
            count += 1;
        }
    } else {
        tracing::warn!("No trace file found at '{}'", path.display());
    }
    tracing::info!("### END OF CF CLI TRACE OUTPUT ###");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFiles;

    #[test]
    fn counts_trace_lines() {
        let fs = MemoryFiles::default().with_file("cf.log", "REQUEST\nRESPONSE\n");
        assert_eq!(dump(Path::new("cf.log"), &fs).unwrap(), 2);
    }

    #[test]
    fn missing_trace_is_not_an_error() {
        let fs = MemoryFiles::default();
        assert_eq!(dump(Path::new("cf.log"), &fs).unwrap(), 0);
    }
}
