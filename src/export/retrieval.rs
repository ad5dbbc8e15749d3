//! Bounded-retry loading of a delivered STL artifact.
//!
//! The export service writes the STL in a background task, so the file is
//! commonly missing or half-written right after the response arrives. Each
//! attempt fetches and decodes; failures wait `delay` and try again until the
//! attempt budget runs out.

use std::time::Duration;

use super::ExportError;
use crate::geom::{GeomMesh, GeomMeshDiagnostics, StlError, Vec3, parse_stl};
use crate::scene::{Fragment, FragmentKind, Material, SceneSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },
}

/// Transport for artifact bytes.
#[allow(async_fn_in_trait)]
pub trait ArtifactSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Timed wait between attempts.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// What to do with an artifact that was fetched but does not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedArtifact {
    /// Treat it like a transient failure; the file may still be being written.
    #[default]
    Retry,
    /// Give up on the first decode failure.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub malformed: MalformedArtifact,
}

impl RetryPolicy {
    /// Budget used right after an export request.
    pub const EXPORT: Self = Self::new(12, Duration::from_millis(1000));

    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            malformed: MalformedArtifact::Retry,
        }
    }

    #[must_use]
    pub const fn fail_fast(mut self) -> Self {
        self.malformed = MalformedArtifact::FailFast;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(800))
    }
}

/// Lifecycle of one retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Requested,
    Loading { attempt: u32 },
    Ready { attempts: u32 },
    Failed { attempts: u32 },
}

/// A decoded artifact, already recentred and ready to publish.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub url: String,
    pub attempts: u32,
    pub fragment: Fragment,
    pub diagnostics: GeomMeshDiagnostics,
}

impl LoadedArtifact {
    /// A snapshot holding this artifact as its only fragment.
    #[must_use]
    pub fn into_snapshot(self) -> SceneSnapshot {
        let mut snapshot = SceneSnapshot::from_artifact(self.fragment);
        snapshot.diagnostics = self.diagnostics;
        snapshot
    }
}

enum AttemptError {
    Fetch(FetchError),
    Decode(StlError),
}

impl AttemptError {
    fn describe(&self) -> String {
        match self {
            Self::Fetch(error) => error.to_string(),
            Self::Decode(error) => format!("artifact did not decode: {error}"),
        }
    }
}

pub async fn load_with_retry<A, S>(
    source: &A,
    sleeper: &S,
    url: &str,
    policy: RetryPolicy,
) -> Result<LoadedArtifact, ExportError>
where
    A: ArtifactSource,
    S: Sleeper,
{
    load_with_retry_observed(source, sleeper, url, policy, |_| {}).await
}

/// Like [`load_with_retry`], reporting every state change to `observe`.
pub async fn load_with_retry_observed<A, S, F>(
    source: &A,
    sleeper: &S,
    url: &str,
    policy: RetryPolicy,
    mut observe: F,
) -> Result<LoadedArtifact, ExportError>
where
    A: ArtifactSource,
    S: Sleeper,
    F: FnMut(&ArtifactState),
{
    let max_attempts = policy.max_attempts.max(1);
    observe(&ArtifactState::Requested);

    let mut last_error = String::new();
    for attempt in 1..=max_attempts {
        observe(&ArtifactState::Loading { attempt });

        let result = match source.fetch(url).await {
            Ok(bytes) => parse_stl(&bytes).map_err(AttemptError::Decode),
            Err(error) => Err(AttemptError::Fetch(error)),
        };

        match result {
            Ok((mesh, diagnostics)) => {
                log::info!("artifact {url} loaded on attempt {attempt}: {}", diagnostics.summary());
                observe(&ArtifactState::Ready { attempts: attempt });
                let fragment = Fragment::new(
                    FragmentKind::Artifact,
                    recenter_artifact(mesh),
                    Material::ARTIFACT,
                );
                return Ok(LoadedArtifact {
                    url: url.to_string(),
                    attempts: attempt,
                    fragment,
                    diagnostics,
                });
            }
            Err(error) => {
                last_error = error.describe();
                log::debug!("attempt {attempt}/{max_attempts} for {url} failed: {last_error}");
                if let (AttemptError::Decode(stl), MalformedArtifact::FailFast) =
                    (&error, policy.malformed)
                {
                    observe(&ArtifactState::Failed { attempts: attempt });
                    return Err(ExportError::Decode(stl.to_string()));
                }
            }
        }

        if attempt < max_attempts {
            sleeper.sleep(policy.delay).await;
        }
    }

    log::warn!("giving up on {url} after {max_attempts} attempts");
    observe(&ArtifactState::Failed {
        attempts: max_attempts,
    });
    Err(ExportError::ArtifactUnavailable {
        attempts: max_attempts,
        last_error,
    })
}

/// Moves `mesh` so its footprint is centred on the origin and it rests on
/// Z = 0.
#[must_use]
pub fn recenter_artifact(mut mesh: GeomMesh) -> GeomMesh {
    if let Some(bbox) = mesh.bbox() {
        let center = bbox.center();
        mesh.translate(Vec3::new(-center.x, -center.y, -bbox.min.z));
    }
    mesh
}

// ─────────────────────────────────────────────────────────────────────────────
// Native implementations
// ─────────────────────────────────────────────────────────────────────────────

/// Reads artifacts from the local file system; `file://` prefixes are accepted.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

#[cfg(not(target_arch = "wasm32"))]
impl ArtifactSource for FileSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        std::fs::read(path).map_err(|error| FetchError::Network {
            url: url.to_string(),
            reason: error.to_string(),
        })
    }
}

/// Blocks the current thread. Fine for the CLI and tests.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

#[cfg(not(target_arch = "wasm32"))]
impl Sleeper for ThreadSleeper {
    async fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::time::{Duration, Instant};

    use approx::assert_relative_eq;

    use super::{
        ArtifactSource, ArtifactState, FetchError, MalformedArtifact, RetryPolicy, Sleeper,
        ThreadSleeper, load_with_retry, load_with_retry_observed, recenter_artifact,
    };
    use crate::export::ExportError;
    use crate::geom::parse_stl;
    use crate::geom::tests::fixtures::ascii_cube_stl;
    use crate::scene::FragmentKind;

    /// Fails `failures` times, then serves `body`.
    struct FlakySource {
        failures: u32,
        calls: Cell<u32>,
        body: Vec<u8>,
    }

    impl FlakySource {
        fn new(failures: u32, body: Vec<u8>) -> Self {
            Self {
                failures,
                calls: Cell::new(0),
                body,
            }
        }
    }

    impl ArtifactSource for FlakySource {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call <= self.failures {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            } else {
                Ok(self.body.clone())
            }
        }
    }

    #[derive(Default)]
    struct VirtualSleeper {
        elapsed: Cell<Duration>,
        waits: RefCell<Vec<Duration>>,
    }

    impl Sleeper for VirtualSleeper {
        async fn sleep(&self, duration: Duration) {
            self.elapsed.set(self.elapsed.get() + duration);
            self.waits.borrow_mut().push(duration);
        }
    }

    fn policy(attempts: u32, delay_ms: u64) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(delay_ms))
    }

    #[test]
    fn succeeds_on_third_attempt_after_two_waits() {
        let source = FlakySource::new(2, ascii_cube_stl().into_bytes());
        let sleeper = VirtualSleeper::default();

        let artifact =
            pollster::block_on(load_with_retry(&source, &sleeper, "cube.stl", policy(3, 50)))
                .expect("third attempt succeeds");

        assert_eq!(artifact.attempts, 3);
        assert_eq!(source.calls.get(), 3);
        assert!(sleeper.elapsed.get() >= Duration::from_millis(100));
        assert_eq!(artifact.fragment.kind, FragmentKind::Artifact);
    }

    #[test]
    fn real_waits_take_at_least_the_delay() {
        let source = FlakySource::new(2, ascii_cube_stl().into_bytes());
        let started = Instant::now();

        let artifact =
            pollster::block_on(load_with_retry(&source, &ThreadSleeper, "cube.stl", policy(3, 50)))
                .expect("third attempt succeeds");

        assert_eq!(artifact.attempts, 3);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn always_failing_source_is_terminal_after_budget() {
        let source = FlakySource::new(u32::MAX, Vec::new());
        let sleeper = VirtualSleeper::default();

        let error = pollster::block_on(load_with_retry(&source, &sleeper, "gone.stl", policy(3, 50)))
            .expect_err("never succeeds");

        assert!(matches!(error, ExportError::ArtifactUnavailable { attempts: 3, .. }));
        assert_eq!(source.calls.get(), 3);
        assert_eq!(sleeper.waits.borrow().len(), 2);
    }

    #[test]
    fn malformed_artifact_is_retried_by_default() {
        let source = FlakySource::new(0, b"solid half\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\n".to_vec());
        let sleeper = VirtualSleeper::default();
        let mut states = Vec::new();

        let error = pollster::block_on(load_with_retry_observed(
            &source,
            &sleeper,
            "half.stl",
            policy(4, 10),
            |state| states.push(state.clone()),
        ))
        .expect_err("never decodes");

        assert!(matches!(error, ExportError::ArtifactUnavailable { attempts: 4, .. }));
        assert_eq!(source.calls.get(), 4);
        assert_eq!(states.first(), Some(&ArtifactState::Requested));
        assert_eq!(states.last(), Some(&ArtifactState::Failed { attempts: 4 }));
    }

    #[test]
    fn fail_fast_stops_on_first_malformed_artifact() {
        let source = FlakySource::new(1, b"not an stl".to_vec());
        let sleeper = VirtualSleeper::default();
        let policy = policy(5, 10).fail_fast();
        assert_eq!(policy.malformed, MalformedArtifact::FailFast);

        let error = pollster::block_on(load_with_retry(&source, &sleeper, "bad.stl", policy))
            .expect_err("malformed");

        // The 404 is still retried; the decode failure is not.
        assert!(matches!(error, ExportError::Decode(_)));
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn recentering_centres_footprint_and_grounds_base() {
        let (mesh, _) = parse_stl(ascii_cube_stl().as_bytes()).expect("cube decodes");
        let bbox = recenter_artifact(mesh).bbox().expect("non-empty");

        assert_relative_eq!(bbox.min.x, -5.0, epsilon = 1e-5);
        assert_relative_eq!(bbox.max.y, 5.0, epsilon = 1e-5);
        assert_relative_eq!(bbox.min.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(bbox.max.z, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn export_policy_defaults() {
        assert_eq!(RetryPolicy::EXPORT.max_attempts, 12);
        assert_eq!(RetryPolicy::EXPORT.delay, Duration::from_millis(1000));
        assert_eq!(RetryPolicy::default().max_attempts, 10);
        assert_eq!(RetryPolicy::default().malformed, MalformedArtifact::Retry);
    }
}
