//! Build metadata reported by `/health` and the daemon banner.

pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git branch at build time, or "unknown" outside a checkout.
pub const GIT_BRANCH: &str = match option_env!("VERGEN_GIT_BRANCH") {
    Some(branch) => branch,
    None => "unknown",
};

/// Full git commit SHA at build time, or "unknown" outside a checkout.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

const SHORT_SHA_LEN: usize = 7;

pub fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

/// `{version}+{branch}.{sha7}`, with `.dirty` appended for modified trees.
///
/// Builds from a source tarball report `0.3.0+unknown.unknown`.
pub fn version_string() -> String {
    let mut version = format!("{PKG_VERSION}+{GIT_BRANCH}.{}", short_sha(GIT_SHA));
    if git_dirty() {
        version.push_str(".dirty");
    }
    version
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_layout() {
        let version = version_string();
        assert!(version.starts_with(&format!("{PKG_VERSION}+{GIT_BRANCH}.")));
        assert_eq!(version.ends_with(".dirty"), git_dirty());
    }

    #[test]
    fn short_sha_truncates_only_long_values() {
        assert_eq!(short_sha("0123456789abcdef"), "0123456");
        assert_eq!(short_sha("unknown"), "unknown");
        assert_eq!(short_sha("abc"), "abc");
    }
}
