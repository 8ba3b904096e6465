use std::sync::OnceLock;

/// Every environment variable the CLI reads starts with it.
pub const ENV_PREFIX: &str = "IPSIFT_";

// Set by build.rs via vergen and vergen-gitcl.
const BUILD_DATE: &str = env!("VERGEN_BUILD_DATE");
const GIT_SHA: &str = env!("VERGEN_GIT_SHA");
const GIT_DESCRIBE: &str = env!("VERGEN_GIT_DESCRIBE");

const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// First 7 chars of the commit hash, or the whole thing if it's a placeholder.
fn short_sha() -> &'static str {
    GIT_SHA.get(..7).unwrap_or(GIT_SHA)
}

/// The string printed by "--version".
pub fn version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();

    VERSION.get_or_init(|| {
        let dirty = match GIT_DESCRIBE.contains("dirty") {
            true => " (dirty)",
            false => "",
        };
        format!("v{}, git: {}{}, built: {}", PKG_VERSION, short_sha(), dirty, BUILD_DATE)
    })
}
