use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, error, info};

use super::error::UpdateError;
use super::fetcher::Fetcher;
use super::graph::{GraphError, GraphOutcome, Halt, Handle, TaskGraph};
use super::release::ReleaseMetadata;
use super::signature::{Comparison, UP_TO_DATE, compare};
use super::store::LocalStore;
use super::verification::{SignatureVerifier, SignerId};

/// Where the pipeline reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTargets {
    /// Release-listing endpoint returning the JSON metadata.
    pub release_url: String,
    /// Trusted public key, configured independently of the release.
    pub public_key_url: String,
    /// Release asset holding the executable.
    pub executable_asset: String,
    /// Release asset holding the executable's detached signature.
    pub signature_asset: String,
    /// Local executable.
    pub executable: PathBuf,
    /// Local sidecar signature.
    pub signature: PathBuf,
}

impl UpdateTargets {
    /// Targets for `install_dir/executable_name`, with the signature stored and
    /// published as `<executable_name>.sig`.
    pub fn new(
        release_url: impl Into<String>,
        public_key_url: impl Into<String>,
        install_dir: &Path,
        executable_name: &str,
    ) -> Self {
        let signature_name = format!("{executable_name}.sig");
        Self {
            release_url: release_url.into(),
            public_key_url: public_key_url.into(),
            executable_asset: executable_name.to_string(),
            executable: install_dir.join(executable_name),
            signature: install_dir.join(&signature_name),
            signature_asset: signature_name,
        }
    }
}

/// What a successful update wrote to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Key id of the verified signer.
    pub signer: SignerId,
    pub executable: PathBuf,
    /// Size of the new executable in bytes.
    pub size: usize,
    /// `sha256:<hex>` digest of the new executable.
    pub sha256: String,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// A new build was verified and persisted. Launch it.
    Updated(UpdateReport),
    /// The local build is current. Launch it.
    Skipped {
        reason: String,
    },
    /// Something went wrong. Launch nothing.
    Failed {
        node: &'static str,
        error: UpdateError,
    },
}

impl UpdateOutcome {
    /// Whether the caller may go on to run the local executable.
    pub fn should_launch(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

type Step<T> = Result<T, Halt<UpdateError>>;

struct Plan {
    graph: TaskGraph<UpdateError>,
    signer: Handle<SignerId>,
    content: Handle<Arc<Vec<u8>>>,
}

/// Checks a release feed and replaces the local executable with a newer,
/// verified build.
///
/// The work is laid out as a [`TaskGraph`]: the binary and public key are
/// only fetched after the remote and local signatures were found to differ,
/// and nothing is written before the verifier accepted the download.
///
/// Logging goes to the injected [`Dispatch`]; [`Updater::new`] captures the
/// current default, tests usually pass [`Dispatch::none`].
pub struct Updater<F> {
    fetcher: Arc<F>,
    store: LocalStore,
    verifier: SignatureVerifier,
    log: Dispatch,
}

impl<F> Updater<F>
where
    F: Fetcher + 'static,
{
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            store: LocalStore::new(),
            verifier: SignatureVerifier::new(),
            log: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Send this updater's logs to `log`.
    pub fn with_logger(mut self, log: Dispatch) -> Self {
        self.log = log;
        self
    }

    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Run the update pipeline once.
    pub async fn run(&self, targets: &UpdateTargets) -> UpdateOutcome {
        let log = self.log.clone();
        self.execute(targets).with_subscriber(log).await
    }

    async fn execute(&self, targets: &UpdateTargets) -> UpdateOutcome {
        info!(
            release = %targets.release_url,
            executable = %targets.executable.display(),
            "Checking for update"
        );

        let Plan {
            graph,
            signer,
            content,
        } = match self.plan(targets) {
            Ok(plan) => plan,
            Err(error) => {
                error!(error = %error, "Update failed");
                return UpdateOutcome::Failed {
                    node: "<plan>",
                    error: error.into(),
                };
            }
        };

        match graph.run().await {
            GraphOutcome::Completed => match (signer.get(), content.get()) {
                (Some(signer), Some(content)) => {
                    let report = UpdateReport {
                        signer: signer.clone(),
                        executable: targets.executable.clone(),
                        size: content.len(),
                        sha256: format!("sha256:{:x}", Sha256::digest(content.as_slice())),
                    };
                    info!(
                        signer = %report.signer,
                        sha256 = %report.sha256,
                        bytes = report.size,
                        "Update Success"
                    );
                    UpdateOutcome::Updated(report)
                }
                _ => UpdateOutcome::Failed {
                    node: "verification",
                    error: GraphError::UnresolvedInput {
                        node: "<report>",
                        input: "verification",
                    }
                    .into(),
                },
            },
            GraphOutcome::Skipped {
                reason,
                ..
            } => {
                info!("Update Skipped");
                UpdateOutcome::Skipped {
                    reason,
                }
            }
            GraphOutcome::Failed {
                node,
                error,
            } => {
                error!(node, error = %error, "Update failed");
                UpdateOutcome::Failed {
                    node,
                    error,
                }
            }
        }
    }

    fn plan(&self, targets: &UpdateTargets) -> Result<Plan, GraphError> {
        let mut graph = TaskGraph::<UpdateError>::new();
        let store = self.store;
        let verifier = self.verifier;

        let metadata = graph.add("metadata", (), {
            let fetcher = Arc::clone(&self.fetcher);
            let url = targets.release_url.clone();
            move |()| async move { fetcher.fetch_text(&url).await.map_err(Halt::Fail) }
        })?;

        let release = graph.add("release", (metadata,), |(document,): (String,)| async move {
            ReleaseMetadata::parse(&document).map(Arc::new).map_err(Halt::Fail)
        })?;

        let remote_sig_url = graph.add("remote_sig_url", (release.clone(),), {
            let name = targets.signature_asset.clone();
            move |(release,): (Arc<ReleaseMetadata>,)| async move {
                release.asset_url(&name).map(str::to_owned).map_err(Halt::Fail)
            }
        })?;

        let remote_exe_url = graph.add("remote_exe_url", (release, remote_sig_url.clone()), {
            let name = targets.executable_asset.clone();
            move |(release, _): (Arc<ReleaseMetadata>, String)| async move {
                release.asset_url(&name).map(str::to_owned).map_err(Halt::Fail)
            }
        })?;

        let remote_sig = graph.add("remote_sig", (remote_exe_url.clone(), remote_sig_url), {
            let fetcher = Arc::clone(&self.fetcher);
            move |(_, sig_url): (String, String)| async move {
                fetcher.fetch_text(&sig_url).await.map_err(Halt::Fail)
            }
        })?;

        let local_sig = graph.add("local_sig", (remote_sig.clone(),), {
            let path = targets.signature.clone();
            move |_: (String,)| async move { store.read(&path, "").await.map_err(Halt::Fail) }
        })?;

        let comparison = graph.add(
            "comparison",
            (remote_sig.clone(), local_sig),
            |(remote, local): (String, String)| async move {
                match compare(&remote, &local) {
                    Comparison::Match => Step::<()>::Err(Halt::Skip(UP_TO_DATE.to_string())),
                    Comparison::Differ => Ok(()),
                }
            },
        )?;

        let exe_content = graph.add("exe_content", (comparison.clone(), remote_exe_url), {
            let fetcher = Arc::clone(&self.fetcher);
            move |(_, exe_url): ((), String)| async move {
                fetcher.fetch_binary(&exe_url).await.map(Arc::new).map_err(Halt::Fail)
            }
        })?;

        let public_key = graph.add("public_key", (comparison,), {
            let fetcher = Arc::clone(&self.fetcher);
            let url = targets.public_key_url.clone();
            move |_: ((),)| async move { fetcher.fetch_text(&url).await.map_err(Halt::Fail) }
        })?;

        let verification = graph.add(
            "verification",
            (remote_sig.clone(), exe_content.clone(), public_key),
            move |(signature, content, key): (String, Arc<Vec<u8>>, String)| async move {
                verifier
                    .verify(&signature, &content, &key)
                    .map_err(|e| Halt::Fail(UpdateError::from(e)))
            },
        )?;

        let persist_exe = graph.add("persist_exe", (verification.clone(), exe_content.clone()), {
            let path = targets.executable.clone();
            move |(_, content): (SignerId, Arc<Vec<u8>>)| async move {
                store.write_executable(&path, &content).await.map_err(Halt::Fail)
            }
        })?;

        // The signature is the commit marker: it only lands once the
        // executable it describes is in place.
        graph.add("persist_sig", (verification.clone(), remote_sig, persist_exe), {
            let path = targets.signature.clone();
            move |(_, signature, ()): (SignerId, String, ())| async move {
                store.write(&path, signature.as_bytes()).await.map_err(Halt::Fail)
            }
        })?;

        Ok(Plan {
            graph,
            signer: verification,
            content: exe_content,
        })
    }
}
