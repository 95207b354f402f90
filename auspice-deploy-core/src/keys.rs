//! Object key and public URL construction.
//!
//! The key patterns are an interoperability contract with the rest of the
//! Nextstrain pipeline and must be reproduced exactly.

/// Bucket holding mutable "latest" staging copies of builds.
pub const STAGING_BUCKET: &str = "nextstrain-staging";
/// Bucket holding the public production copies and dated snapshots.
pub const PRODUCTION_BUCKET: &str = "nextstrain-data";
/// Public site serving the builds.
pub const SITE: &str = "https://nextstrain.org";
/// Local directory that `--staging` pushes builds from.
pub const LOCAL_AUSPICE_DIR: &str = "auspice";

/// Key of the mutable "latest" main document: `{prefix}_{build}.json`.
pub fn latest_key(prefix: &str, build: &str) -> String {
    format!("{}_{}.json", prefix, build)
}

/// Key of the companion root-sequence document for the latest build.
pub fn latest_root_sequence_key(prefix: &str, build: &str) -> String {
    format!("{}_{}_root-sequence.json", prefix, build)
}

/// Key of the immutable dated snapshot: `{prefix}_{build}_{date}.json`.
pub fn dated_key(prefix: &str, build: &str, date: &str) -> String {
    format!("{}_{}_{}.json", prefix, build, date)
}

/// Key of the companion root-sequence document for a dated snapshot.
pub fn dated_root_sequence_key(prefix: &str, build: &str, date: &str) -> String {
    format!("{}_{}_{}_root-sequence.json", prefix, build, date)
}

/// Human-readable URL of a build on the public site.
///
/// Underscores in prefix and build name become path separators; dated
/// snapshots get a trailing date segment and staging builds live under
/// `/staging/`.
pub fn build_url(prefix: &str, build: &str, date: Option<&str>, staging: bool) -> String {
    let mut url = String::from(SITE);
    url.push('/');
    if staging {
        url.push_str("staging/");
    }
    url.push_str(&prefix.replace('_', "/"));
    url.push('/');
    url.push_str(&build.replace('_', "/"));
    url.push('/');
    if let Some(date) = date {
        url.push_str(date);
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_keys_match_pipeline_convention() {
        assert_eq!(latest_key("nextstrain", "flu_seasonal"), "nextstrain_flu_seasonal.json");
        assert_eq!(
            latest_root_sequence_key("nextstrain", "flu_seasonal"),
            "nextstrain_flu_seasonal_root-sequence.json"
        );
    }

    #[test]
    fn dated_keys_match_pipeline_convention() {
        assert_eq!(
            dated_key("nextstrain", "flu_seasonal", "2024-03-01"),
            "nextstrain_flu_seasonal_2024-03-01.json"
        );
        assert_eq!(
            dated_root_sequence_key("nextstrain", "flu_seasonal", "2024-03-01"),
            "nextstrain_flu_seasonal_2024-03-01_root-sequence.json"
        );
    }

    #[test]
    fn urls_replace_underscores_with_slashes() {
        assert_eq!(
            build_url("flu_seasonal", "h3n2_ha", None, false),
            "https://nextstrain.org/flu/seasonal/h3n2/ha/"
        );
        assert_eq!(
            build_url("flu_seasonal", "h3n2_ha", Some("2024-03-01"), false),
            "https://nextstrain.org/flu/seasonal/h3n2/ha/2024-03-01/"
        );
        assert_eq!(
            build_url("flu_seasonal", "h3n2_ha", None, true),
            "https://nextstrain.org/staging/flu/seasonal/h3n2/ha/"
        );
    }
}
