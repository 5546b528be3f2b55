//! Built-in source definitions embedded in the binary
//!
//! Lets callers say `--source kobo` instead of pointing at a YAML file.

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Built-in source YAML definitions by name
static BUILTIN_SOURCES: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = BTreeMap::new();

    // Data collection
    m.insert("kobo", include_str!("../sources/kobo.yaml"));
    m.insert("unidata", include_str!("../sources/unidata.yaml"));

    // Health information systems
    m.insert("dhis2", include_str!("../sources/dhis2.yaml"));
    m.insert("dhis2-basic", include_str!("../sources/dhis2-basic.yaml"));

    // Humanitarian data
    m.insert("reliefweb", include_str!("../sources/reliefweb.yaml"));
    m.insert("acled", include_str!("../sources/acled.yaml"));

    // Service desk / reporting
    m.insert("topdesk", include_str!("../sources/topdesk.yaml"));
    m.insert("powerbi", include_str!("../sources/powerbi.yaml"));

    m
});

/// Get a built-in source by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_SOURCES.get(name).copied()
}

/// Check if a name refers to a built-in source
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_SOURCES.contains_key(name)
}

/// Names of all built-in sources, sorted
pub fn list_builtin() -> Vec<&'static str> {
    BUILTIN_SOURCES.keys().copied().collect()
}
