//! Locating the image the build script reports.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

fn saved_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)saving docker image,?.*?to\s+(.+\.tar)")
            .expect("static regex must compile")
    })
}

/// Path from the first "Saving docker image ... to <path>.tar" line.
pub fn docker_image_path(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .find_map(|line| saved_image_re().captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str().trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_saved_image() {
        let output = "step 1\n\
                      [INFO] Saving docker image, ovxr-8101:latest to /data/out/ovxr-8101.tar\n\
                      done\n";
        assert_eq!(
            docker_image_path(output),
            Some(PathBuf::from("/data/out/ovxr-8101.tar"))
        );
    }

    #[test]
    fn match_is_case_insensitive_and_first_wins() {
        let output = "SAVING DOCKER IMAGE img TO /a/one.tar\nsaving docker image, x to /b/two.tar\n";
        assert_eq!(docker_image_path(output), Some(PathBuf::from("/a/one.tar")));
    }

    #[test]
    fn no_line_means_no_path() {
        assert_eq!(docker_image_path("Saving docker image, x to /a/b.tgz\n"), None);
        assert_eq!(docker_image_path(""), None);
    }
}
