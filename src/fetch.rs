//! # Remote fetch support
//!
//! A basename can carry a list of remote source directories, inferred from rules or set
//! manually. When a furnish operation needs a file with no local binding, the configured
//! [`Fetcher`] is given those sources as a last resort; everything else about retries,
//! mirrors, and caching policy belongs to the collaborator behind the trait.
//!
//! The built-in [`HttpFetcher`] is only compiled with the `fetch` feature, so the core
//! never requires network access.

use camino::{Utf8Path, Utf8PathBuf};

use crate::spicerack_errors::Result;

/// Interface for retrieving a missing kernel file from remote sources.
pub trait Fetcher {
    /// Try each source directory in order and store the file under `dest_dir`,
    /// returning the path of the downloaded file.
    fn fetch(&self, sources: &[String], basename: &str, dest_dir: &Utf8Path)
        -> Result<Utf8PathBuf>;
}

#[cfg(feature = "fetch")]
pub use http::HttpFetcher;

#[cfg(feature = "fetch")]
mod http {
    use std::io::Write;
    use std::time::Duration;

    use camino::{Utf8Path, Utf8PathBuf};
    use tracing::debug;
    use ureq::Agent;

    use super::Fetcher;
    use crate::spicerack_errors::{Result, SpiceRackError};

    /// HTTP implementation of [`Fetcher`] with a persistent client and a global timeout.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        agent: Agent,
    }

    impl Default for HttpFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HttpFetcher {
        pub fn new() -> Self {
            let config = Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(60)))
                .build();
            HttpFetcher {
                agent: config.into(),
            }
        }
    }

    impl Fetcher for HttpFetcher {
        fn fetch(
            &self,
            sources: &[String],
            basename: &str,
            dest_dir: &Utf8Path,
        ) -> Result<Utf8PathBuf> {
            std::fs::create_dir_all(dest_dir)?;
            let dest = dest_dir.join(basename);

            let mut last_error = String::new();
            for source in sources {
                let url = format!("{}/{}", source.trim_end_matches('/'), basename);
                debug!(url = %url, "fetching kernel file");

                let response = match self.agent.get(&url).call() {
                    Ok(response) => response,
                    Err(error) => {
                        last_error = format!("{url}: {error}");
                        continue;
                    }
                };

                let mut body = response.into_body();
                let bytes = match body.read_to_vec() {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        last_error = format!("{url}: {error}");
                        continue;
                    }
                };

                let mut file = std::fs::File::create(&dest)?;
                file.write_all(&bytes)?;
                return Ok(dest);
            }

            Err(SpiceRackError::Fetch(if last_error.is_empty() {
                format!("{basename}: no sources to fetch from")
            } else {
                last_error
            }))
        }
    }
}
