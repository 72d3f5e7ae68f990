use std::path::Path;

use serde_json::json;

use super::MockFetcher;
use crate::update::UpdateTargets;

/// Public key the fixture build is signed with.
pub const RELEASE_KEY: &str = include_str!("../../tests/fixtures/signing/release.pub");
/// A second, untrusted key.
pub const ROGUE_KEY: &str = include_str!("../../tests/fixtures/signing/rogue.pub");
/// The fixture "executable".
pub const BUILD: &[u8] = include_bytes!("../../tests/fixtures/signing/build.bin");
/// Signature of [`BUILD`] by [`RELEASE_KEY`].
pub const BUILD_SIG: &str = include_str!("../../tests/fixtures/signing/build.bin.minisig");
/// Signature of [`BUILD`] by [`ROGUE_KEY`].
pub const ROGUE_SIG: &str = include_str!("../../tests/fixtures/signing/rogue.minisig");
/// Key id of [`RELEASE_KEY`].
pub const BUILD_SIGNER: &str = "0807060504030201";

/// A published release with one signed executable, served by a [`MockFetcher`].
#[derive(Debug, Clone)]
pub struct ReleaseFixture {
    pub executable_name: String,
    pub release_url: String,
    pub public_key_url: String,
    pub executable_url: String,
    pub signature_url: String,
}

impl ReleaseFixture {
    pub fn new(executable_name: &str) -> Self {
        let base = "https://releases.example.test";
        Self {
            executable_name: executable_name.to_string(),
            release_url: format!("{base}/repos/acme/tool/releases/latest"),
            public_key_url: "https://keys.example.test/release.pub".to_string(),
            executable_url: format!("{base}/download/v2/{executable_name}"),
            signature_url: format!("{base}/download/v2/{executable_name}.sig"),
        }
    }

    /// Release JSON listing the executable, its signature and an unrelated asset.
    pub fn metadata(&self) -> String {
        json!({
            "tag_name": "v2.0.0",
            "assets": [
                {
                    "name": "checksums.txt",
                    "browser_download_url": "https://releases.example.test/download/v2/checksums.txt"
                },
                {
                    "name": format!("{}.sig", self.executable_name),
                    "browser_download_url": self.signature_url,
                },
                {
                    "name": self.executable_name,
                    "browser_download_url": self.executable_url,
                }
            ]
        })
        .to_string()
    }

    /// Serve the release, the signed build and the trusted key.
    pub fn publish(&self, fetcher: &MockFetcher) {
        fetcher
            .serve(&self.release_url, self.metadata())
            .serve(&self.executable_url, BUILD)
            .serve(&self.signature_url, BUILD_SIG)
            .serve(&self.public_key_url, RELEASE_KEY);
    }

    pub fn targets(&self, install_dir: &Path) -> UpdateTargets {
        UpdateTargets::new(
            &self.release_url,
            &self.public_key_url,
            install_dir,
            &self.executable_name,
        )
    }
}
