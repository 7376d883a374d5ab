//! Platform lookup tables.
//!
//! Both tables are ordered: lookups that scan them return the first hit.
//! Update them when new platforms ship.

/// Platform code (as found in archive names) to canonical platform identifier.
pub const PLATFORM_MAPPING: &[(&str, &str)] = &[
    // Base codes from archive names
    ("8000", "8000"),
    ("8101", "8101-32H"),
    ("8102", "8102-64H"),
    ("8122", "8122-64EHF-O"),
    ("8201", "8201-32FH"),
    ("8202", "8202"),
    ("8212", "8212-48FH-M"),
    ("8711", "8711-32FH-M"),
    // Distributed
    ("8804", "8804"),
    ("8808", "8800-lc-36fh-m"),
    // Compound variants
    ("8101-32FH", "8101-32FH"),
    ("8101-32H", "8101-32H"),
    ("8102-64H", "8102-64H"),
    ("8111-32EH", "8111-32EH"),
    ("8122-64EHF-O", "8122-64EHF-O"),
    ("8201-24H8FH", "8201-24H8FH"),
    ("8201-sys", "8201-sys"),
    ("8201-32FH", "8201-32FH"),
    ("8202-32FH-M", "8202-32FH-M"),
    ("8212-48FH-M", "8212-48FH-M"),
    ("8711-32FH-M", "8711-32FH-M"),
    ("ncs1010", "ncs1010"),
];

/// Disk image stem (version suffix removed) to canonical platform identifier.
pub const QCOW2_TO_PLATFORM: &[(&str, &str)] = &[
    // The 8000 image backs the 8201 system variants.
    ("8000-x64", "8201-sys"),
    ("8101-x64", "8101-32H"),
    ("8101-32FH-x64", "8101-32FH"),
    ("8102-x64", "8102-64H"),
    ("8111-32EH-x64", "8111-32EH"),
    ("8122-64EHF-O-x64", "8122-64EHF-O"),
    ("8201-x64", "8201-32FH"),
    ("8202-x64", "8202"),
    ("8202-32FH-M-x64", "8202-32FH-M"),
    ("8212-48FH-M-x64", "8212-48FH-M"),
    ("8711-32FH-M-x64", "8711-32FH-M"),
];

/// Look up `code` in [`PLATFORM_MAPPING`].
pub fn platform_for_code(code: &str) -> Option<&'static str> {
    lookup(PLATFORM_MAPPING, code)
}

pub(crate) fn lookup(
    table: &'static [(&'static str, &'static str)],
    key: &str,
) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, platform)| *platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        for table in [PLATFORM_MAPPING, QCOW2_TO_PLATFORM] {
            let keys: HashSet<_> = table.iter().map(|(k, _)| *k).collect();
            assert_eq!(keys.len(), table.len());
        }
    }

    #[test]
    fn distributed_8808_maps_to_line_card() {
        assert_eq!(platform_for_code("8808"), Some("8800-lc-36fh-m"));
        assert_eq!(platform_for_code("9999"), None);
    }
}
