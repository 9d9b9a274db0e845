//! Load the mock collection from a directory of JSON files.

use std::path::Path;

use super::{build_mock_from_json, Mock};
use crate::{files, Error, Result};

/// Read every `*.json` under the mocks directory (recursively, sorted
/// lexicographically so load order is reproducible) and build a mock from
/// each. Any failure is load-time fatal.
pub fn create_mock_collection_from_folder(
    mocks_dir: &Path,
    bodies_dir: Option<&Path>,
) -> Result<Vec<Mock>> {
    let paths = files::find_all_files(mocks_dir, "json")?;

    let mut mocks = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read(&path)
            .map_err(|e| Error::mock(format!("cannot read mock file {path:?}: {e}")))?;
        let mock = build_mock_from_json(&content, bodies_dir)
            .map_err(|e| Error::mock(format!("mock file {path:?}: {e}")))?;
        tracing::debug!(
            mock_name = %mock.name(),
            mock_conf = %String::from_utf8_lossy(mock.json_bytes()),
            "mock loaded"
        );
        mocks.push(mock);
    }
    Ok(mocks)
}
