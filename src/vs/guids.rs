//! Well-known Visual Studio project type identifiers

use uuid::{uuid, Uuid};

/// Web Application Project, declared in a project file's `<ProjectTypeGuids>`
pub const WEB_APPLICATION_PROJECT: Uuid = uuid!("349c5851-65df-11da-9384-00065b846f21");

/// Website project, declared as the type of a solution entry
pub const WEB_SITE_PROJECT: Uuid = uuid!("e24c65dc-7377-472b-9aba-bc803b73c61a");

/// Solution folder, a grouping node with no files of its own
pub const SOLUTION_FOLDER: Uuid = uuid!("2150e333-8fdc-42a3-9474-1a3956d46de8");

/// Parses a GUID in any of the forms solution and project files use
/// (`{...}`, hyphenated, any case). Returns `None` for malformed input.
pub fn parse_guid(raw: &str) -> Option<Uuid> {
    let trimmed = raw.trim();
    let bare = trimmed
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(trimmed);
    Uuid::parse_str(bare).ok()
}

/// Parses a `;`-separated GUID list, skipping malformed entries
pub fn parse_guid_list(raw: &str) -> Vec<Uuid> {
    let mut guids = Vec::new();
    for guid in raw.split(';').filter_map(parse_guid) {
        if !guids.contains(&guid) {
            guids.push(guid);
        }
    }
    guids
}
